//! Cross-task liveness signal for one connection.
//!
//! The reader polls [`Liveness::is_alive`] after every bounded read; the
//! heartbeat awaits [`Liveness::revoked`] between writes so it wakes at once
//! instead of finishing its sleep.  Revocation is one-way: a connection that
//! has been declared lost is never revived, the next one gets a fresh signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    alive: AtomicBool,
    notify: Notify,
}

/// Shared "this link may still be used" flag.
#[derive(Debug, Clone)]
pub struct Liveness {
    inner: Arc<Inner>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                alive: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Marks the link dead and wakes every waiter.
    ///
    /// Returns `true` if this call did the revoking.
    pub fn revoke(&self) -> bool {
        let was_alive = self.inner.alive.swap(false, Ordering::AcqRel);
        self.inner.notify.notify_waiters();
        was_alive
    }

    /// Completes once the link has been revoked.
    pub async fn revoked(&self) {
        loop {
            // A `Notified` receives `notify_waiters` from the moment it is
            // created, so the flag check below cannot miss a revoke.
            let notified = self.inner.notify.notified();
            if !self.is_alive() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_liveness_is_alive() {
        assert!(Liveness::new().is_alive());
    }

    #[test]
    fn test_only_first_revoke_reports_true() {
        let liveness = Liveness::new();
        assert!(liveness.revoke());
        assert!(!liveness.revoke());
        assert!(!liveness.is_alive());
    }

    #[test]
    fn test_clones_share_state() {
        let a = Liveness::new();
        let b = a.clone();
        b.revoke();
        assert!(!a.is_alive());
    }

    #[tokio::test]
    async fn test_revoked_wakes_waiter_promptly() {
        // Arrange
        let liveness = Liveness::new();
        let waiter = {
            let liveness = liveness.clone();
            tokio::spawn(async move { liveness.revoked().await })
        };
        tokio::task::yield_now().await;

        // Act
        liveness.revoke();

        // Assert
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(joined.is_ok(), "waiter must wake after revoke");
    }

    #[tokio::test]
    async fn test_revoked_returns_immediately_when_already_revoked() {
        let liveness = Liveness::new();
        liveness.revoke();

        let result = tokio::time::timeout(Duration::from_millis(100), liveness.revoked()).await;

        assert!(result.is_ok());
    }
}
