//! Component H: [`CancellationBroker`], cooperative per-operation cancel
//! tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A cooperative cancel flag shared by every task spawned for one
/// operation. Checked, never polled via a signal — §5: "any in-flight
/// fetch observing a cancel completes its own continuation with an
/// operation-cancelled error".
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Mark this token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Has this token been cancelled?
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Associates host-supplied operation ids with their [`CancelToken`].
#[derive(Clone, Default)]
pub struct CancellationBroker {
    tokens: Arc<Mutex<HashMap<String, CancelToken>>>,
}

impl CancellationBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `operation_id`, replacing any previous
    /// token registered under the same id.
    pub fn register(&self, operation_id: impl Into<String>) -> CancelToken {
        let token = CancelToken::default();
        self.tokens
            .lock()
            .unwrap()
            .insert(operation_id.into(), token.clone());
        token
    }

    /// Signal the token registered for `operation_id`, if any is still
    /// registered. Returns `true` if a token was found and cancelled.
    pub fn cancel(&self, operation_id: &str) -> bool {
        match self.tokens.lock().unwrap().get(operation_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the bookkeeping entry for `operation_id` once the operation has
    /// completed (cancelled or not). Outstanding clones of its token remain
    /// valid; only the broker's own lookup entry is removed.
    pub fn release(&self, operation_id: &str) {
        self.tokens.lock().unwrap().remove(operation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn broker_cancel_reaches_cloned_token() {
        let broker = CancellationBroker::new();
        let token = broker.register("op-1");
        assert!(!token.is_cancelled());
        assert!(broker.cancel("op-1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_on_unknown_operation_is_a_noop() {
        let broker = CancellationBroker::new();
        assert!(!broker.cancel("missing"));
    }

    #[test]
    fn release_does_not_affect_outstanding_clones() {
        let broker = CancellationBroker::new();
        let token = broker.register("op-1");
        broker.release("op-1");
        assert!(!broker.cancel("op-1"));
        assert!(!token.is_cancelled());
    }
}
