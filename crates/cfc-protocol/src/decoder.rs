use uuid::Uuid;

use crate::encoder::RefMarker;
use crate::error::{ProtocolError, ProtocolResult};

/// Cursor over an encoded byte slice.
///
/// Every `read_*` consumes exactly the bytes the matching
/// [`Encoder`](crate::Encoder) method produced. Running out of input is a
/// [`ProtocolError::CorruptEntry`].
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail if any bytes are left unread.
    pub fn expect_end(&self) -> ProtocolResult<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(ProtocolError::corrupt(
                self.pos,
                format!("{} trailing bytes", self.remaining()),
            ))
        }
    }

    /// Borrow the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ProtocolError::corrupt(
                self.pos,
                format!("need {len} bytes, {} remaining", self.remaining()),
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> ProtocolResult<bool> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::corrupt(offset, format!("invalid bool byte {other}"))),
        }
    }

    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> ProtocolResult<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Decode a variable-length integer.
    pub fn read_varint(&mut self) -> ProtocolResult<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = match self.data.get(self.pos) {
                Some(byte) => *byte,
                None => return Err(ProtocolError::corrupt(start, "truncated varint")),
            };
            self.pos += 1;
            if shift == 63 && byte > 1 {
                return Err(ProtocolError::corrupt(start, "varint overflow"));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(ProtocolError::corrupt(start, "varint overflow"));
            }
        }
    }

    pub fn read_i64(&mut self) -> ProtocolResult<i64> {
        let raw = self.read_varint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read a length prefix and check it fits the remaining input.
    pub fn read_len(&mut self) -> ProtocolResult<usize> {
        let offset = self.pos;
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(ProtocolError::corrupt(
                offset,
                format!(
                    "length prefix {len} exceeds {} remaining bytes",
                    self.remaining()
                ),
            ));
        }
        Ok(len as usize)
    }

    pub fn read_bytes(&mut self) -> ProtocolResult<&'a [u8]> {
        let len = self.read_len()?;
        self.read_slice(len)
    }

    pub fn read_str(&mut self) -> ProtocolResult<&'a str> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::corrupt(offset, format!("invalid UTF-8: {e}")))
    }

    pub fn read_string(&mut self) -> ProtocolResult<String> {
        self.read_str().map(str::to_owned)
    }

    pub fn read_uuid(&mut self) -> ProtocolResult<Uuid> {
        Ok(Uuid::from_bytes(self.read_array()?))
    }

    pub fn read_ref(&mut self) -> ProtocolResult<RefMarker> {
        let raw = self.read_varint()?;
        let id = raw >> 1;
        Ok(if raw & 1 == 1 {
            RefMarker::Inline(id)
        } else {
            RefMarker::Back(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use proptest::prelude::*;

    #[test]
    fn reads_consume_exactly_what_was_written() {
        let mut enc = Encoder::new();
        enc.write_u8(7);
        enc.write_bool(true);
        enc.write_u32(0xDEAD_BEEF);
        enc.write_u64(u64::MAX - 1);
        enc.write_varint(1_000_000);
        enc.write_i64(-42);
        enc.write_str("app:app:1.0");
        enc.write_bytes(&[1, 2, 3]);
        enc.write_ref(RefMarker::Inline(5));
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_u8().unwrap(), 7);
        assert!(dec.read_bool().unwrap());
        assert_eq!(dec.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(dec.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(dec.read_varint().unwrap(), 1_000_000);
        assert_eq!(dec.read_i64().unwrap(), -42);
        assert_eq!(dec.read_str().unwrap(), "app:app:1.0");
        assert_eq!(dec.read_bytes().unwrap(), &[1, 2, 3]);
        assert_eq!(dec.read_ref().unwrap(), RefMarker::Inline(5));
        dec.expect_end().unwrap();
    }

    #[test]
    fn truncated_varint() {
        let err = Decoder::new(&[0x80]).read_varint().unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptEntry { offset: 0, .. }));
    }

    #[test]
    fn overlong_varint() {
        let data = [0xFF; 11];
        let err = Decoder::new(&data).read_varint().unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptEntry { .. }));
    }

    #[test]
    fn length_prefix_beyond_input() {
        let mut enc = Encoder::new();
        enc.write_str("configuration");
        let bytes = enc.into_bytes();
        let truncated = &bytes[..bytes.len() - 3];
        let err = Decoder::new(truncated).read_str().unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptEntry { offset: 0, .. }));
    }

    #[test]
    fn huge_length_prefix_does_not_allocate() {
        let mut enc = Encoder::new();
        enc.write_varint(u64::MAX >> 1);
        let bytes = enc.into_bytes();
        assert!(Decoder::new(&bytes).read_bytes().is_err());
    }

    #[test]
    fn invalid_utf8() {
        let mut enc = Encoder::new();
        enc.write_bytes(&[0xFF, 0xFE]);
        let bytes = enc.into_bytes();
        assert!(Decoder::new(&bytes).read_str().is_err());
    }

    #[test]
    fn invalid_bool() {
        let err = Decoder::new(&[2]).read_bool().unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptEntry { .. }));
    }

    #[test]
    fn fixed_width_truncated() {
        assert!(Decoder::new(&[0, 0, 1]).read_u32().is_err());
    }

    #[test]
    fn trailing_bytes_detected() {
        let mut dec = Decoder::new(&[1, 2]);
        dec.read_u8().unwrap();
        assert!(dec.expect_end().is_err());
        assert_eq!(dec.remaining(), 1);
    }

    #[test]
    fn uuid_roundtrip() {
        let id = Uuid::new_v4();
        let mut enc = Encoder::new();
        enc.write_uuid(&id);
        let bytes = enc.into_bytes();
        assert_eq!(Decoder::new(&bytes).read_uuid().unwrap(), id);
    }

    proptest! {
        #[test]
        fn varint_roundtrip(value in any::<u64>()) {
            let mut enc = Encoder::new();
            enc.write_varint(value);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.read_varint().unwrap(), value);
            prop_assert!(dec.is_exhausted());
        }

        #[test]
        fn i64_roundtrip(value in any::<i64>()) {
            let mut enc = Encoder::new();
            enc.write_i64(value);
            let bytes = enc.into_bytes();
            prop_assert_eq!(Decoder::new(&bytes).read_i64().unwrap(), value);
        }

        #[test]
        fn string_roundtrip(value in ".*") {
            let mut enc = Encoder::new();
            enc.write_str(&value);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.read_str().unwrap(), value.as_str());
            prop_assert!(dec.is_exhausted());
        }

        #[test]
        fn any_truncation_is_an_error(value in "[a-z]{1,32}", cut in 1usize..8) {
            let mut enc = Encoder::new();
            enc.write_str(&value);
            let bytes = enc.into_bytes();
            let cut = cut.min(bytes.len());
            let mut dec = Decoder::new(&bytes[..bytes.len() - cut]);
            prop_assert!(dec.read_str().is_err());
        }
    }
}
