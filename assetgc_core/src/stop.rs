//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag asking a running collection to wind down.
///
/// Clones observe the same flag, so a handle can be moved to another thread
/// (a signal handler, an operator console) while the run holds its own copy.
/// The run polls the flag before every page fetch.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a token that is not stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Clear a previous stop request.
    pub(crate) fn reset(&self) {
        self.stopped.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_flag() {
        let token = StopToken::new();
        let handle = token.clone();
        assert!(!token.is_stopped());

        handle.stop();
        assert!(token.is_stopped());

        token.reset();
        assert!(!handle.is_stopped());
    }

    #[test]
    fn test_stop_from_other_thread() {
        let token = StopToken::new();
        let handle = token.clone();

        thread::spawn(move || handle.stop()).join().unwrap();

        assert!(token.is_stopped());
    }
}
