//! Registry mapping runtime types to codecs and wire tags to codecs.
//!
//! The registry is assembled once, before the first serialization operation,
//! and is immutable afterwards. Encoding looks a codec up by the
//! [`TypeId`] of the value; decoding looks it up by the [`TypeTag`] read from
//! the stream.

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, Erased, ErasedCodec, TypeTag};
use crate::error::{CodecError, CodecResult};

#[derive(Clone)]
struct Registration {
    tag: TypeTag,
    codec: Arc<dyn ErasedCodec>,
}

/// An immutable set of codecs.
pub struct CodecRegistry {
    by_type: HashMap<TypeId, Registration>,
    by_tag: HashMap<TypeTag, Arc<dyn ErasedCodec>>,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// Start a new builder holding every codec of this registry.
    pub fn to_builder(&self) -> CodecRegistryBuilder {
        CodecRegistryBuilder {
            by_type: self.by_type.clone(),
            by_tag: self.by_tag.clone(),
        }
    }

    /// Tag assigned to values of type `T`.
    pub fn tag_of<T: Any>(&self) -> Option<TypeTag> {
        self.by_type.get(&TypeId::of::<T>()).map(|r| r.tag)
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn contains_tag(&self, tag: TypeTag) -> bool {
        self.by_tag.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub(crate) fn encoder_for(&self, type_id: TypeId) -> Option<(TypeTag, Arc<dyn ErasedCodec>)> {
        self.by_type
            .get(&type_id)
            .map(|r| (r.tag, Arc::clone(&r.codec)))
    }

    pub(crate) fn decoder_for(&self, tag: TypeTag) -> Option<Arc<dyn ErasedCodec>> {
        self.by_tag.get(&tag).cloned()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self
            .by_tag
            .iter()
            .map(|(tag, codec)| (tag.0, codec.type_name()))
            .collect();
        tags.sort();
        f.debug_struct("CodecRegistry").field("codecs", &tags).finish()
    }
}

/// Collects codec registrations and freezes them into a [`CodecRegistry`].
#[derive(Default)]
pub struct CodecRegistryBuilder {
    by_type: HashMap<TypeId, Registration>,
    by_tag: HashMap<TypeTag, Arc<dyn ErasedCodec>>,
}

impl CodecRegistryBuilder {
    /// Register `codec` for its value type under `tag`.
    ///
    /// Each tag and each value type may be registered once.
    pub fn register<C: Codec>(&mut self, tag: TypeTag, codec: C) -> CodecResult<&mut Self> {
        let type_name = any::type_name::<C::Value>();
        if tag == TypeTag::NULL
            || self.by_tag.contains_key(&tag)
            || self.by_type.contains_key(&TypeId::of::<C::Value>())
        {
            return Err(CodecError::DuplicateRegistration { tag, type_name });
        }
        let codec: Arc<dyn ErasedCodec> = Arc::new(Erased(codec));
        self.by_type.insert(
            TypeId::of::<C::Value>(),
            Registration {
                tag,
                codec: Arc::clone(&codec),
            },
        );
        self.by_tag.insert(tag, codec);
        Ok(self)
    }

    pub fn build(self) -> Arc<CodecRegistry> {
        debug!(codecs = self.by_tag.len(), "codec registry built");
        Arc::new(CodecRegistry {
            by_type: self.by_type,
            by_tag: self.by_tag,
        })
    }
}
