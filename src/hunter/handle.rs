use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Cancellation handle for one execution attempt.
///
/// Cancelling fails once the attempt has finished, so a cancel racing a
/// completed job is resolved by the handle rather than the hunter's state.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHandle {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl ExecutionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the attempt already finished.
    pub fn cancel(&self) -> bool {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_before_finish() {
        let handle = ExecutionHandle::new();
        assert!(!handle.is_cancelled());
        assert!(handle.cancel());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_after_finish_fails() {
        let handle = ExecutionHandle::new();
        handle.clone().mark_finished();
        assert!(!handle.cancel());
        assert!(!handle.is_cancelled());
    }
}
