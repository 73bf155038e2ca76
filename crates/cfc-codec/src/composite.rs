//! Generic codecs for container types.
//!
//! Each composite writes its structure and hands every component back to the
//! registry, so registering a leaf type makes it usable inside any container.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::Codec;
use crate::context::{ReadContext, WriteContext};
use crate::error::CodecResult;

macro_rules! marker_codec {
    ($(#[$doc:meta])* $name:ident<$($param:ident),+>) => {
        $(#[$doc])*
        pub struct $name<$($param),+>(PhantomData<fn() -> ($($param,)+)>);

        impl<$($param),+> $name<$($param),+> {
            pub fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<$($param),+> Default for $name<$($param),+> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<$($param),+> fmt::Debug for $name<$($param),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };
}

marker_codec!(
    /// `Option<T>`: the null tag or a tagged `T`.
    OptionCodec<T>
);

marker_codec!(
    /// `Vec<T>`: a count followed by each tagged element.
    ListCodec<T>
);

marker_codec!(
    /// `(A, B)`: both components, tagged, in order.
    PairCodec<A, B>
);

marker_codec!(
    /// `Arc<T>` with identity preserved through the session identity tables.
    SharedCodec<T>
);

impl<T: Any + Send> Codec for OptionCodec<T> {
    type Value = Option<T>;

    fn encode(&self, ctx: &mut WriteContext, value: &Option<T>) -> CodecResult<()> {
        ctx.write_option(value)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Option<T>> {
        ctx.read_option()
    }
}

impl<T: Any + Send> Codec for ListCodec<T> {
    type Value = Vec<T>;

    fn encode(&self, ctx: &mut WriteContext, value: &Vec<T>) -> CodecResult<()> {
        ctx.write_list(value)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Vec<T>> {
        ctx.read_list()
    }
}

impl<A: Any + Send, B: Any + Send> Codec for PairCodec<A, B> {
    type Value = (A, B);

    fn encode(&self, ctx: &mut WriteContext, value: &(A, B)) -> CodecResult<()> {
        ctx.write_pair(&value.0, &value.1)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<(A, B)> {
        ctx.read_pair()
    }
}

impl<T: Any + Send + Sync> Codec for SharedCodec<T> {
    type Value = Arc<T>;

    fn encode(&self, ctx: &mut WriteContext, value: &Arc<T>) -> CodecResult<()> {
        ctx.write_shared(value)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Arc<T>> {
        ctx.read_shared()
    }
}
