//! The host interpreter lock
//!
//! Entry points crossing into the evaluator scope-acquire this lock and
//! release it on every exit path; the guard's `Drop` makes that automatic.
//! The lock is reentrant because the call protocol re-enters the evaluator
//! recursively while already holding it.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;

/// Global interpreter lock handle
#[derive(Clone, Default)]
pub struct Gil {
    inner: Arc<ReentrantMutex<()>>,
}

/// Scope guard for the interpreter lock
pub type GilGuard<'a> = ReentrantMutexGuard<'a, ()>;

impl Gil {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for the current scope.
    pub fn lock(&self) -> GilGuard<'_> {
        self.inner.lock()
    }
}
