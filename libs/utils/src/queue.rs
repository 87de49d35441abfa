//! A bounded, mutex+condvar guarded FIFO with cooperative shutdown.
//!
//! This is the queue type threaded between every producer/consumer pair in
//! the pipeline (receiver -> serializer, serializer -> sender, receiver ->
//! merger, ...). It plays the role of `Common/ConcurrentQueue.h`'s
//! `ConcurrentFifo` in the original system: a `push`/`pop` pair where `pop`
//! blocks until an item is available or the queue is stopped, and `stop()`
//! wakes every blocked waiter so threads can join during shutdown.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct State<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// FIFO queue shared between exactly one family of producer threads and one
/// family of consumer threads.
pub struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        BoundedQueue {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::new(),
                stopped: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Push an item, blocking while the queue is full. Returns `Err(item)` if
    /// the queue was stopped before the item could be enqueued.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if guard.stopped {
                return Err(item);
            }
            if guard.items.len() < self.capacity {
                guard.items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            guard = self.not_full.wait(guard).unwrap();
        }
    }

    /// Pop the next item, blocking until one is available or the queue is
    /// stopped and drained. Returns `None` only once the queue is both
    /// stopped and empty.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.stopped {
                return None;
            }
            guard = self.not_empty.wait(guard).unwrap();
        }
    }

    /// Pop the next item, waiting at most `timeout`. Used by threads that
    /// must also perform periodic work (timeout sweeps, heartbeats) while
    /// idle.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.stopped {
                return None;
            }
            let (next_guard, result) = self.not_empty.wait_timeout(guard, timeout).unwrap();
            guard = next_guard;
            if result.timed_out() {
                return None;
            }
        }
    }

    /// Signal stop: remaining items can still be popped (drained), but no
    /// new pushes are accepted and every blocked waiter wakes up.
    pub fn stop(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.stopped = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_preserves_order() {
        let q = BoundedQueue::new(4);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn stop_drains_then_returns_none() {
        let q = BoundedQueue::new(4);
        q.push(1).unwrap();
        q.stop();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
        assert!(q.push(2).is_err());
    }

    #[test]
    fn pop_wakes_on_stop() {
        let q = Arc::new(BoundedQueue::<u32>::new(1));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(50));
        q.stop();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let q = BoundedQueue::<u32>::new(1);
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
    }
}
