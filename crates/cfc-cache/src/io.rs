//! Factory for the serialization contexts of one cache session.

use std::fmt;
use std::sync::Arc;

use cfc_codec::{
    BuildHost, CodecRegistry, CodecResult, IsolateContext, ReadContext, WriteContext,
};
use cfc_protocol::{ReadIdentities, WriteIdentities};
use cfc_types::IsolateOwner;

/// Creates writer and reader contexts that share the session's identity
/// tables, codec set, and build host.
///
/// Values written through contexts of one `CacheIo` keep their sharing when
/// read back through contexts of the same `CacheIo`, across entries.
pub struct CacheIo {
    codecs: Arc<CodecRegistry>,
    host: Arc<dyn BuildHost>,
    write_identities: Arc<WriteIdentities>,
    read_identities: Arc<ReadIdentities>,
}

impl CacheIo {
    pub fn new(codecs: Arc<CodecRegistry>, host: Arc<dyn BuildHost>) -> Self {
        Self {
            codecs,
            host,
            write_identities: Arc::new(WriteIdentities::new()),
            read_identities: Arc::new(ReadIdentities::new()),
        }
    }

    /// The user-types codec set.
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    pub fn host(&self) -> &Arc<dyn BuildHost> {
        &self.host
    }

    /// A fresh context for encoding one entry. No isolate is pushed yet.
    pub fn writer_context(&self) -> WriteContext {
        WriteContext::new(Arc::clone(&self.write_identities), Arc::clone(&self.host))
    }

    /// A fresh context for decoding the entry in `bytes`. No isolate is
    /// pushed yet.
    pub fn reader_context<'a>(&self, bytes: &'a [u8]) -> CodecResult<ReadContext<'a>> {
        ReadContext::new(bytes, Arc::clone(&self.read_identities), Arc::clone(&self.host))
    }

    /// Encode one entry with `operation` running in an isolate for `owner`.
    pub fn write_entry(
        &self,
        owner: IsolateOwner,
        operation: impl FnOnce(&mut WriteContext) -> CodecResult<()>,
    ) -> CodecResult<Vec<u8>> {
        let mut ctx = self.writer_context();
        ctx.run_in_isolate(owner, Arc::clone(&self.codecs), operation)?;
        Ok(ctx.finish())
    }

    /// Decode one entry with `operation` running in an isolate for `owner`.
    ///
    /// Fails unless `operation` consumes the entry completely.
    pub fn read_entry<T>(
        &self,
        bytes: &[u8],
        owner: IsolateOwner,
        operation: impl FnOnce(&mut ReadContext<'_>) -> CodecResult<T>,
    ) -> CodecResult<T> {
        let mut ctx = self.reader_context(bytes)?;
        let value = ctx.run_in_isolate(owner, Arc::clone(&self.codecs), operation)?;
        ctx.finish()?;
        Ok(value)
    }
}

impl fmt::Debug for CacheIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheIo")
            .field("session", &self.write_identities.session())
            .field("codecs", &self.codecs.len())
            .field("shared_written", &self.write_identities.len())
            .field("shared_read", &self.read_identities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_codec::{Codecs, ProjectRegistry};
    use cfc_types::{ModuleVersionIdentifier, ProjectPath};

    fn io() -> CacheIo {
        CacheIo::new(
            Codecs::new().unwrap().user_types(),
            Arc::new(ProjectRegistry::root()),
        )
    }

    #[test]
    fn entry_roundtrip() {
        let io = io();
        let owner = IsolateOwner::project(ProjectPath::parse(":app").unwrap());
        let bytes = io
            .write_entry(owner.clone(), |ctx| {
                ctx.write(&ProjectPath::parse(":app:lib").unwrap())?;
                ctx.write(&7u64)
            })
            .unwrap();
        let (path, n) = io
            .read_entry(&bytes, owner, |ctx| {
                Ok((ctx.read::<ProjectPath>()?, ctx.read::<u64>()?))
            })
            .unwrap();
        assert_eq!(path.to_string(), ":app:lib");
        assert_eq!(n, 7);
    }

    #[test]
    fn identity_is_shared_between_entries_of_one_session() {
        let io = io();
        let shared = Arc::new(ModuleVersionIdentifier::parse("app:app:1.0").unwrap());
        let first = io
            .write_entry(IsolateOwner::root_build(), |ctx| ctx.write_shared(&shared))
            .unwrap();
        let second = io
            .write_entry(IsolateOwner::root_build(), |ctx| ctx.write_shared(&shared))
            .unwrap();

        let read = |bytes: &[u8]| {
            io.read_entry(bytes, IsolateOwner::root_build(), |ctx| {
                ctx.read_shared::<ModuleVersionIdentifier>()
            })
            .unwrap()
        };
        let a = read(&first);
        let b = read(&second);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn separate_sessions_do_not_share() {
        let writer = io();
        let shared = Arc::new(ModuleVersionIdentifier::parse("app:app:1.0").unwrap());
        let bytes = writer
            .write_entry(IsolateOwner::root_build(), |ctx| ctx.write_shared(&shared))
            .unwrap();

        let read_in = |session: &CacheIo| {
            session
                .read_entry(&bytes, IsolateOwner::root_build(), |ctx| {
                    ctx.read_shared::<ModuleVersionIdentifier>()
                })
                .unwrap()
        };
        let a = read_in(&io());
        let b = read_in(&io());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn leftover_bytes_fail_the_read() {
        let io = io();
        let bytes = io
            .write_entry(IsolateOwner::root_build(), |ctx| {
                ctx.write(&1u64)?;
                ctx.write(&2u64)
            })
            .unwrap();
        assert!(io
            .read_entry(&bytes, IsolateOwner::root_build(), |ctx| ctx.read::<u64>())
            .is_err());
    }
}
