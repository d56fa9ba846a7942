//! Cooperative cancellation for simulated executions.
//!
//! A [`CancelToken`] is cancelled at most once and may be linked to a parent token and to a
//! deadline. A running engine observes it through [`CancelToken::poll`], which also turns an
//! expired deadline into a [`CancelReason::Timeout`] cancellation. No background thread is
//! involved, so nothing can outlive the request.

use core::time::Duration;
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Instant,
};

/// Why a token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CancelReason {
    /// Cancelled explicitly by the owner of the token.
    Requested = 1,
    /// The deadline of the token elapsed.
    Timeout = 2,
    /// The scope owning the token was closed.
    ScopeClosed = 3,
}

impl CancelReason {
    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Requested),
            2 => Some(Self::Timeout),
            3 => Some(Self::ScopeClosed),
            _ => None,
        }
    }
}

const LIVE: u8 = 0;

#[derive(Debug, Default)]
struct Inner {
    state: AtomicU8,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
}

/// Shared, cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a root token with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child token. The child is cancelled when the parent is, and additionally when
    /// `deadline` passes.
    pub fn child(&self, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(LIVE),
                deadline,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancels the token. Returns `true` if this call performed the cancellation, `false` if the
    /// token was already cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.inner
            .state
            .compare_exchange(LIVE, reason as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the cancellation reason of this token or, failing that, of its closest cancelled
    /// ancestor. Does not look at the clock.
    pub fn reason(&self) -> Option<CancelReason> {
        CancelReason::from_u8(self.inner.state.load(Ordering::Acquire))
            .or_else(|| self.inner.parent.as_ref().and_then(Self::reason))
    }

    /// Returns `true` if this token or an ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Like [`Self::is_cancelled`], but first cancels every token on the chain whose deadline
    /// has passed.
    pub fn poll(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        self.expire(Instant::now())
    }

    fn expire(&self, now: Instant) -> bool {
        let parent_expired = self.inner.parent.as_ref().is_some_and(|parent| parent.expire(now));
        if self.inner.deadline.is_some_and(|deadline| now >= deadline) {
            self.cancel(CancelReason::Timeout);
            return true;
        }
        parent_expired
    }

    /// Returns the deadline of this token, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }
}

/// An execution-scoped child token that is cancelled when the scope is dropped.
///
/// With a non-zero timeout the scope also cancels itself once the timeout elapses. With a zero
/// timeout, or one too large to express as a deadline, it is only cancelled through the parent.
#[derive(Debug)]
pub struct CancelScope {
    token: CancelToken,
    timeout: Duration,
}

impl CancelScope {
    /// Opens a scope under `parent`.
    pub fn new(parent: &CancelToken, timeout: Duration) -> Self {
        let deadline =
            if timeout.is_zero() { None } else { Instant::now().checked_add(timeout) };
        Self { token: parent.child(deadline), timeout }
    }

    /// The token handed to the execution engine.
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// The configured timeout. Zero means no timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        self.token.cancel(CancelReason::ScopeClosed);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_cancel_happens_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel(CancelReason::Requested));
        assert!(!token.cancel(CancelReason::Timeout));
        assert_eq!(token.reason(), Some(CancelReason::Requested));
    }

    #[test]
    fn test_parent_cancellation_reaches_child() {
        let parent = CancelToken::new();
        let child = parent.child(None);
        parent.cancel(CancelReason::Requested);
        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some(CancelReason::Requested));
    }

    #[test]
    fn test_child_cancellation_does_not_reach_parent() {
        let parent = CancelToken::new();
        let child = parent.child(None);
        child.cancel(CancelReason::Requested);
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_deadline_is_observed_by_poll() {
        let scope = CancelScope::new(&CancelToken::new(), Duration::from_millis(10));
        assert!(!scope.token().poll());
        thread::sleep(Duration::from_millis(20));
        assert!(!scope.token().is_cancelled());
        assert!(scope.token().poll());
        assert_eq!(scope.token().reason(), Some(CancelReason::Timeout));
    }

    #[test]
    fn test_zero_timeout_never_expires() {
        let scope = CancelScope::new(&CancelToken::new(), Duration::ZERO);
        assert!(scope.token().deadline().is_none());
        assert!(!scope.token().poll());
    }

    #[test]
    fn test_unrepresentable_timeout_has_no_deadline() {
        let parent = CancelToken::new();
        let scope = CancelScope::new(&parent, Duration::MAX);
        assert!(scope.token().deadline().is_none());
        assert!(!scope.token().poll());
        assert_eq!(scope.timeout(), Duration::MAX);

        parent.cancel(CancelReason::Requested);
        assert!(scope.token().is_cancelled());
    }

    #[test]
    fn test_scope_drop_cancels_token() {
        let parent = CancelToken::new();
        let token = {
            let scope = CancelScope::new(&parent, Duration::ZERO);
            scope.token().clone()
        };
        assert_eq!(token.reason(), Some(CancelReason::ScopeClosed));
        assert!(!parent.is_cancelled());
    }
}
