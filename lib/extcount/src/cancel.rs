use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelCause {
    Requested,
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Requested => f.write_str("cancellation requested"),
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// A cooperative cancellation signal threaded through every stage of a run.
///
/// Clones share the same flag. A [`child`](CancelToken::child) is cancelled
/// when either it or any of its ancestors is, but cancelling a child leaves
/// the parent untouched.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { inner: Arc::new(Inner { deadline: Some(deadline), ..Inner::default() }) }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn child(&self) -> Self {
        Self { inner: Arc::new(Inner { parent: Some(self.clone()), ..Inner::default() }) }
    }

    /// A child that additionally fires once `timeout` has elapsed.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(Instant::now() + timeout),
                parent: Some(self.clone()),
                ..Inner::default()
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    pub fn cause(&self) -> Option<CancelCause> {
        if self.inner.requested.load(Ordering::SeqCst) {
            return Some(CancelCause::Requested);
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelCause::DeadlineExceeded);
        }
        self.inner.parent.as_ref().and_then(CancelToken::cause)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause().is_some()
    }

    /// Returns `Err(Error::Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<()> {
        match self.cause() {
            None => Ok(()),
            Some(cause) => Err(Error::Cancelled { cause }),
        }
    }
}
