//! Cooperative shutdown flag.
//!
//! Every pipeline thread polls `ShutdownFlag::is_running()` in its loop
//! condition, exactly as the original devices poll `CheckCurrentState(RUNNING)`.
//! On shutdown every queue's `stop()` is called first (so blocked threads wake
//! up and drain), then every thread is joined, matching spec.md §5's
//! cancellation contract: shared memory is only released after every thread
//! has been joined.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        ShutdownFlag(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Installs a SIGINT/SIGTERM handler that requests shutdown. Best-effort:
    /// failures to register are logged and otherwise ignored, since the
    /// process still works, just without graceful Ctrl-C handling.
    pub fn install_signal_handler(&self) {
        let flag = self.clone();
        let result = unsafe {
            signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
                flag.request_shutdown();
            })
        };
        if let Err(err) = result {
            tracing::warn!("failed to install SIGINT handler: {err}");
        }

        let flag = self.clone();
        let result = unsafe {
            signal_hook::low_level::register(signal_hook::consts::SIGTERM, move || {
                flag.request_shutdown();
            })
        };
        if let Err(err) = result {
            tracing::warn!("failed to install SIGTERM handler: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_can_be_stopped() {
        let flag = ShutdownFlag::new();
        assert!(flag.is_running());
        flag.request_shutdown();
        assert!(!flag.is_running());
    }

    #[test]
    fn clones_share_state() {
        let a = ShutdownFlag::new();
        let b = a.clone();
        a.request_shutdown();
        assert!(!b.is_running());
    }
}
