//! Scoped owner/codec environments for serialization operations.
//!
//! Every read or write runs inside an [`Isolate`]: the owner the operation is
//! performed for and the codec set that applies. Isolates form a stack per
//! context; the innermost one wins and popping it restores the outer one.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use cfc_types::IsolateOwner;

use crate::error::{CodecError, CodecResult};
use crate::registry::CodecRegistry;

/// An owner together with the codecs legal for it.
#[derive(Clone, Debug)]
pub struct Isolate {
    pub owner: IsolateOwner,
    pub codecs: Arc<CodecRegistry>,
}

impl Isolate {
    pub fn new(owner: IsolateOwner, codecs: Arc<CodecRegistry>) -> Self {
        Self { owner, codecs }
    }
}

/// Stack of isolates belonging to one serialization session.
#[derive(Clone, Debug, Default)]
pub struct IsolateStack {
    frames: Vec<Isolate>,
}

impl IsolateStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, isolate: Isolate) {
        self.frames.push(isolate);
    }

    pub fn pop(&mut self) -> Option<Isolate> {
        self.frames.pop()
    }

    /// The innermost isolate.
    pub fn current(&self) -> Option<&Isolate> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A context that carries an isolate stack.
pub trait IsolateContext: Sized {
    fn isolates(&self) -> &IsolateStack;

    fn isolates_mut(&mut self) -> &mut IsolateStack;

    /// Push an isolate; it is popped when the returned guard is dropped,
    /// whether the enclosed operation returns normally, fails, or unwinds.
    fn push(&mut self, owner: IsolateOwner, codecs: Arc<CodecRegistry>) -> IsolateGuard<'_, Self> {
        self.isolates_mut().push(Isolate::new(owner, codecs));
        IsolateGuard { ctx: self }
    }

    /// Run `operation` inside an isolate for `owner`.
    fn run_in_isolate<R>(
        &mut self,
        owner: IsolateOwner,
        codecs: Arc<CodecRegistry>,
        operation: impl FnOnce(&mut Self) -> CodecResult<R>,
    ) -> CodecResult<R> {
        let mut scope = self.push(owner, codecs);
        operation(&mut scope)
    }

    /// Owner of the innermost isolate.
    fn owner(&self) -> CodecResult<&IsolateOwner> {
        self.isolates()
            .current()
            .map(|isolate| &isolate.owner)
            .ok_or(CodecError::NoIsolate)
    }

    /// Codec set of the innermost isolate.
    fn codecs(&self) -> CodecResult<&Arc<CodecRegistry>> {
        self.isolates()
            .current()
            .map(|isolate| &isolate.codecs)
            .ok_or(CodecError::NoIsolate)
    }
}

/// Keeps an isolate pushed for as long as it lives.
///
/// Derefs to the context so serialization calls go through the guard.
pub struct IsolateGuard<'a, C: IsolateContext> {
    ctx: &'a mut C,
}

impl<C: IsolateContext> Deref for IsolateGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctx
    }
}

impl<C: IsolateContext> DerefMut for IsolateGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: IsolateContext> Drop for IsolateGuard<'_, C> {
    fn drop(&mut self) {
        self.ctx.isolates_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_types::ProjectPath;

    #[derive(Default)]
    struct Bare {
        isolates: IsolateStack,
    }

    impl IsolateContext for Bare {
        fn isolates(&self) -> &IsolateStack {
            &self.isolates
        }

        fn isolates_mut(&mut self) -> &mut IsolateStack {
            &mut self.isolates
        }
    }

    fn codecs() -> Arc<CodecRegistry> {
        CodecRegistry::builder().build()
    }

    fn project(path: &str) -> IsolateOwner {
        IsolateOwner::project(ProjectPath::parse(path).unwrap())
    }

    #[test]
    fn empty_stack_has_no_owner() {
        let ctx = Bare::default();
        assert!(matches!(ctx.owner(), Err(CodecError::NoIsolate)));
        assert!(matches!(ctx.codecs(), Err(CodecError::NoIsolate)));
    }

    #[test]
    fn nested_push_shadows_and_restores() {
        let mut ctx = Bare::default();
        {
            let mut outer = ctx.push(IsolateOwner::root_build(), codecs());
            assert_eq!(outer.owner().unwrap(), &IsolateOwner::root_build());
            {
                let inner = outer.push(project(":app"), codecs());
                assert_eq!(inner.owner().unwrap(), &project(":app"));
                assert_eq!(inner.isolates().depth(), 2);
            }
            assert_eq!(outer.owner().unwrap(), &IsolateOwner::root_build());
        }
        assert!(ctx.isolates().is_empty());
    }

    #[test]
    fn pop_happens_on_error() {
        let mut ctx = Bare::default();
        let result: CodecResult<()> = ctx.run_in_isolate(project(":app"), codecs(), |scoped| {
            assert_eq!(scoped.isolates().depth(), 1);
            Err(CodecError::NoIsolate)
        });
        assert!(result.is_err());
        assert!(ctx.isolates().is_empty());
    }

    #[test]
    fn pop_happens_on_panic() {
        let mut ctx = Bare::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ctx.push(project(":app"), codecs());
            panic!("codec failure");
        }));
        assert!(outcome.is_err());
        assert!(ctx.isolates().is_empty());
    }

    #[test]
    fn run_in_isolate_returns_value() {
        let mut ctx = Bare::default();
        let depth = ctx
            .run_in_isolate(IsolateOwner::root_build(), codecs(), |scoped| {
                Ok(scoped.isolates().depth())
            })
            .unwrap();
        assert_eq!(depth, 1);
    }
}
