use uuid::Uuid;

/// How a shared value appears in the stream.
///
/// A shared value is written in full the first time it occurs in an entry
/// and referenced by id afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefMarker {
    /// The value with this id follows inline.
    Inline(u64),
    /// The value with this id was already written earlier in the entry.
    Back(u64),
}

impl RefMarker {
    pub fn id(&self) -> u64 {
        match self {
            Self::Inline(id) | Self::Back(id) => *id,
        }
    }
}

/// Append-only writer of protocol primitives.
///
/// Multi-byte fixed-width integers are big-endian. Lengths and counts are
/// LEB128 varints.
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Encode a u64 as a variable-length integer.
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value > 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Encode a signed integer as a zig-zag varint.
    pub fn write_i64(&mut self, value: i64) {
        self.write_varint(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Length-prefixed byte block.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    /// Raw bytes without a length prefix; the reader must know the length.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Back-reference marker: `varint(id << 1 | inline)`.
    pub fn write_ref(&mut self, marker: RefMarker) {
        let encoded = match marker {
            RefMarker::Inline(id) => (id << 1) | 1,
            RefMarker::Back(id) => id << 1,
        };
        self.write_varint(encoded);
    }
}
