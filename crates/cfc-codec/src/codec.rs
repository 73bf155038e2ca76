use std::any::{self, Any};
use std::fmt;

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};

/// Wire tag selecting the codec for a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub u16);

impl TypeTag {
    /// Written in place of an absent value.
    pub const NULL: TypeTag = TypeTag(0);

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bidirectional handler for one value type.
///
/// `decode` must consume exactly what `encode` wrote. Fields that are not
/// needed to reconstruct the value may be dropped by `encode` and rebuilt with
/// defaults by `decode`.
pub trait Codec: Send + Sync + 'static {
    type Value: Any + Send;

    fn encode(&self, ctx: &mut WriteContext, value: &Self::Value) -> CodecResult<()>;

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Self::Value>;
}

/// Object-safe view of a [`Codec`], used by the registry for dispatch on
/// runtime types.
pub(crate) trait ErasedCodec: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn encode_erased(&self, ctx: &mut WriteContext, value: &dyn Any) -> CodecResult<()>;

    fn decode_erased(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Box<dyn Any + Send>>;
}

pub(crate) struct Erased<C>(pub C);

impl<C: Codec> ErasedCodec for Erased<C> {
    fn type_name(&self) -> &'static str {
        any::type_name::<C::Value>()
    }

    fn encode_erased(&self, ctx: &mut WriteContext, value: &dyn Any) -> CodecResult<()> {
        let value = value
            .downcast_ref::<C::Value>()
            .ok_or_else(|| CodecError::UnsupportedType {
                type_name: format!("value passed to the codec for {}", self.type_name()),
            })?;
        self.0.encode(ctx, value)
    }

    fn decode_erased(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Box<dyn Any + Send>> {
        Ok(Box::new(self.0.decode(ctx)?))
    }
}
