//! Movable, non-copyable owning handles to transport payloads.
//!
//! Mirrors the design note in spec.md §9: in the original system a payload is
//! an owning handle to a message whose backing memory may live inside the
//! shared-memory arena (C1). Dropping the handle must post the address and
//! size back to the arena's free-shm channel so the superpage can eventually
//! be reclaimed (§4.1's "every outstanding sub-buffer returns").
//!
//! `PayloadHandle` models that with an owned byte buffer plus an optional
//! disposer callback run on drop. Handles are `Send` but intentionally not
//! `Clone` -- every payload is owned exactly once (invariant 1 of spec.md §3).

use bytes::Bytes;

/// Runs once, when the last owner of a payload's bytes is dropped.
pub type Disposer = Box<dyn FnOnce() + Send>;

pub struct PayloadHandle {
    bytes: Bytes,
    disposer: Option<Disposer>,
}

impl PayloadHandle {
    /// A handle with no special teardown, e.g. payloads constructed directly
    /// from network bytes that were never backed by the arena.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        PayloadHandle {
            bytes: bytes.into(),
            disposer: None,
        }
    }

    /// A handle whose bytes are backed by arena memory; `disposer` returns
    /// the underlying sub-buffer when the handle is dropped.
    pub fn with_disposer(bytes: impl Into<Bytes>, disposer: Disposer) -> Self {
        PayloadHandle {
            bytes: bytes.into(),
            disposer: Some(disposer),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        // Dropping `self` after extracting `bytes` still runs the disposer:
        // the underlying memory is released once, when the handle (in
        // whichever form) stops being held.
        self.bytes.clone()
    }
}

impl std::fmt::Debug for PayloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadHandle")
            .field("len", &self.bytes.len())
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

impl Drop for PayloadHandle {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn disposer_runs_exactly_once_on_drop() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let handle = PayloadHandle::with_disposer(
            Bytes::from_static(b"hello"),
            Box::new(move || ran2.store(true, Ordering::SeqCst)),
        );
        assert!(!ran.load(Ordering::SeqCst));
        drop(handle);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn from_bytes_has_no_disposer() {
        let handle = PayloadHandle::from_bytes(&b"abc"[..]);
        assert_eq!(handle.as_bytes(), b"abc");
    }
}
