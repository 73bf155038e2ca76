//! Write and read contexts: the explicit state threaded through every codec
//! call.
//!
//! A context owns the byte stream of one cache entry, the entry-local view of
//! the session identity tables, its isolate stack, and the build host. Every
//! entry starts with the id of the write session that produced it.

use std::any::{self, Any};
use std::collections::HashSet;
use std::sync::Arc;

use cfc_protocol::{
    Decoder, Encoder, ReadIdentities, RefMarker, SessionId, SharedValue, WriteIdentities,
};

use crate::codec::TypeTag;
use crate::error::{CodecError, CodecResult};
use crate::host::BuildHost;
use crate::isolate::{IsolateContext, IsolateStack};

/// Context for encoding one cache entry.
pub struct WriteContext {
    encoder: Encoder,
    identities: Arc<WriteIdentities>,
    inlined: HashSet<u64>,
    isolates: IsolateStack,
    host: Arc<dyn BuildHost>,
}

impl WriteContext {
    pub fn new(identities: Arc<WriteIdentities>, host: Arc<dyn BuildHost>) -> Self {
        let mut encoder = Encoder::new();
        encoder.write_uuid(identities.session().as_uuid());
        Self {
            encoder,
            identities,
            inlined: HashSet::new(),
            isolates: IsolateStack::new(),
            host,
        }
    }

    /// Direct access to the primitive stream.
    pub fn encoder(&mut self) -> &mut Encoder {
        &mut self.encoder
    }

    pub fn host(&self) -> &dyn BuildHost {
        self.host.as_ref()
    }

    pub fn session(&self) -> SessionId {
        self.identities.session()
    }

    /// Write a value through the codec registered for its type, preceded by
    /// the codec's tag.
    pub fn write<T: Any>(&mut self, value: &T) -> CodecResult<()> {
        self.write_erased(value, any::type_name::<T>())
    }

    /// Write a value whose concrete type is only known at runtime.
    pub fn write_any(&mut self, value: &dyn Any) -> CodecResult<()> {
        self.write_erased(value, "<dynamic value>")
    }

    fn write_erased(&mut self, value: &dyn Any, type_name: &str) -> CodecResult<()> {
        let (tag, codec) = self
            .codecs()?
            .encoder_for(value.type_id())
            .ok_or_else(|| CodecError::UnsupportedType {
                type_name: type_name.to_string(),
            })?;
        self.encoder.write_varint(u64::from(tag.value()));
        codec.encode_erased(self, value)
    }

    pub fn write_null(&mut self) {
        self.encoder.write_varint(u64::from(TypeTag::NULL.value()));
    }

    pub fn write_nullable<T: Any>(&mut self, value: Option<&T>) -> CodecResult<()> {
        match value {
            Some(value) => self.write(value),
            None => {
                self.write_null();
                Ok(())
            }
        }
    }

    pub fn write_option<T: Any>(&mut self, value: &Option<T>) -> CodecResult<()> {
        self.write_nullable(value.as_ref())
    }

    /// Write a count followed by each element through the registry.
    pub fn write_list<T: Any>(&mut self, values: &[T]) -> CodecResult<()> {
        self.encoder.write_varint(values.len() as u64);
        values.iter().try_for_each(|value| self.write(value))
    }

    pub fn write_pair<A: Any, B: Any>(&mut self, first: &A, second: &B) -> CodecResult<()> {
        self.write(first)?;
        self.write(second)
    }

    /// Write a shared value so that every reference to the same object reads
    /// back as one instance.
    ///
    /// The value is written in full at its first occurrence in this entry and
    /// as a back-reference afterwards.
    pub fn write_shared<T: Any + Send + Sync>(&mut self, value: &Arc<T>) -> CodecResult<()> {
        let erased: SharedValue = value.clone();
        let id = self.identities.identify(&erased);
        if self.inlined.insert(id) {
            self.encoder.write_ref(RefMarker::Inline(id));
            self.write(value.as_ref())
        } else {
            self.encoder.write_ref(RefMarker::Back(id));
            Ok(())
        }
    }

    /// The encoded entry.
    pub fn finish(self) -> Vec<u8> {
        self.encoder.into_bytes()
    }
}

impl IsolateContext for WriteContext {
    fn isolates(&self) -> &IsolateStack {
        &self.isolates
    }

    fn isolates_mut(&mut self) -> &mut IsolateStack {
        &mut self.isolates
    }
}

/// Context for decoding one cache entry.
pub struct ReadContext<'a> {
    decoder: Decoder<'a>,
    session: SessionId,
    identities: Arc<ReadIdentities>,
    inlined: HashSet<u64>,
    isolates: IsolateStack,
    host: Arc<dyn BuildHost>,
}

impl<'a> ReadContext<'a> {
    pub fn new(
        data: &'a [u8],
        identities: Arc<ReadIdentities>,
        host: Arc<dyn BuildHost>,
    ) -> CodecResult<Self> {
        let mut decoder = Decoder::new(data);
        let session = SessionId::from_uuid(decoder.read_uuid()?);
        Ok(Self {
            decoder,
            session,
            identities,
            inlined: HashSet::new(),
            isolates: IsolateStack::new(),
            host,
        })
    }

    /// Direct access to the primitive stream.
    pub fn decoder(&mut self) -> &mut Decoder<'a> {
        &mut self.decoder
    }

    pub fn host(&self) -> &dyn BuildHost {
        self.host.as_ref()
    }

    /// The write session that produced this entry.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Read a non-null value of type `T`.
    pub fn read<T: Any>(&mut self) -> CodecResult<T> {
        self.read_nullable()?.ok_or(CodecError::UnexpectedNull {
            expected: any::type_name::<T>(),
        })
    }

    /// Read a value that may be null.
    pub fn read_nullable<T: Any>(&mut self) -> CodecResult<Option<T>> {
        let Some((value, found)) = self.read_tagged()? else {
            return Ok(None);
        };
        value
            .downcast::<T>()
            .map(|value| Some(*value))
            .map_err(|_| CodecError::TypeMismatch {
                expected: any::type_name::<T>(),
                found: found.to_string(),
            })
    }

    pub fn read_option<T: Any>(&mut self) -> CodecResult<Option<T>> {
        self.read_nullable()
    }

    /// Read a value of whatever type the stream names.
    pub fn read_any(&mut self) -> CodecResult<Option<Box<dyn Any + Send>>> {
        Ok(self.read_tagged()?.map(|(value, _)| value))
    }

    fn read_tagged(&mut self) -> CodecResult<Option<(Box<dyn Any + Send>, &'static str)>> {
        let raw = self.decoder.read_varint()?;
        if raw == u64::from(TypeTag::NULL.value()) {
            return Ok(None);
        }
        let tag = u16::try_from(raw)
            .map(TypeTag)
            .map_err(|_| CodecError::UnknownFormat { tag: raw })?;
        let codec = self
            .codecs()?
            .decoder_for(tag)
            .ok_or(CodecError::UnknownFormat { tag: raw })?;
        let value = codec.decode_erased(self)?;
        Ok(Some((value, codec.type_name())))
    }

    pub fn read_list<T: Any>(&mut self) -> CodecResult<Vec<T>> {
        // Every element takes at least one byte, so the count is bounded by
        // the remaining input.
        let count = self.decoder.read_len()?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read()?);
        }
        Ok(values)
    }

    pub fn read_pair<A: Any, B: Any>(&mut self) -> CodecResult<(A, B)> {
        let first = self.read()?;
        let second = self.read()?;
        Ok((first, second))
    }

    /// Read a value written by [`WriteContext::write_shared`].
    ///
    /// Within one read session every occurrence of the same written object
    /// yields the same instance, across entries as well as within one.
    pub fn read_shared<T: Any + Send + Sync>(&mut self) -> CodecResult<Arc<T>> {
        let offset = self.decoder.position();
        let shared = match self.decoder.read_ref()? {
            RefMarker::Inline(id) => {
                let value: T = self.read()?;
                self.inlined.insert(id);
                self.identities
                    .insert_or_get(self.session, id, Arc::new(value))
            }
            RefMarker::Back(id) => {
                let known = self
                    .inlined
                    .contains(&id)
                    .then(|| self.identities.get(self.session, id))
                    .flatten();
                known.ok_or_else(|| {
                    CodecError::corrupt(
                        offset,
                        format!("back-reference to shared value {id} not written in this entry"),
                    )
                })?
            }
        };
        shared.downcast::<T>().map_err(|_| CodecError::TypeMismatch {
            expected: any::type_name::<T>(),
            found: "shared value of another type".to_string(),
        })
    }

    /// Check that the entry was consumed completely.
    pub fn finish(self) -> CodecResult<()> {
        self.decoder.expect_end()?;
        Ok(())
    }
}

impl IsolateContext for ReadContext<'_> {
    fn isolates(&self) -> &IsolateStack {
        &self.isolates
    }

    fn isolates_mut(&mut self) -> &mut IsolateStack {
        &mut self.isolates
    }
}
