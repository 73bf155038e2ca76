//! Collection of cache problems that were not allowed to fail the build.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::{CacheError, CacheResult};

/// Build-scoped collector of suppressed cache failures.
///
/// When suppression is on, a failure routed through [`collect`](Self::collect)
/// is recorded and swallowed; when it is off the failure is passed on.
#[derive(Debug)]
pub struct ExceptionCollector {
    suppressed: bool,
    problems: Mutex<Vec<Arc<CacheError>>>,
}

impl ExceptionCollector {
    pub fn new(suppressed: bool) -> Self {
        Self {
            suppressed,
            problems: Mutex::new(Vec::new()),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn add(&self, problem: CacheError) {
        self.problems
            .lock()
            .expect("lock poisoned")
            .push(Arc::new(problem));
    }

    /// Snapshot of the problems recorded so far.
    pub fn problems(&self) -> Vec<Arc<CacheError>> {
        self.problems.lock().expect("lock poisoned").clone()
    }

    /// Pass `result` through, or record its error and yield `None` when
    /// suppression is on.
    pub fn collect<T>(&self, result: CacheResult<T>) -> CacheResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.suppressed => {
                warn!(error = %e, "configuration cache problem suppressed");
                self.add(e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Forget every recorded problem.
    pub fn stop(&self) {
        self.problems.lock().expect("lock poisoned").clear();
    }
}

impl Default for ExceptionCollector {
    fn default() -> Self {
        Self::new(true)
    }
}
