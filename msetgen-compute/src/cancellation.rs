//! Cooperative cancellation, polled once per row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled by the generator before each row.
pub trait CancellationSignal {
    fn is_cancelled(&self) -> bool;
}

/// Runs every request to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A shared flag another thread can raise to stop the current block.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    flag: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a flag owned elsewhere, e.g. by a worker pool.
    pub fn shared(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clear the flag so the next request runs.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

impl CancellationSignal for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Cancels after a fixed number of polls. Useful for stopping a block at a
/// known row.
#[derive(Debug)]
pub struct CancelAfterPolls {
    remaining: std::cell::Cell<usize>,
}

impl CancelAfterPolls {
    pub fn new(polls: usize) -> Self {
        Self {
            remaining: std::cell::Cell::new(polls),
        }
    }
}

impl CancellationSignal for CancelAfterPolls {
    fn is_cancelled(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return true;
        }
        self.remaining.set(remaining - 1);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_cancel_is_never_set() {
        let signal = NeverCancel;
        assert!(!signal.is_cancelled());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn flag_follows_cancel_and_reset() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn clones_share_one_flag() {
        let raw = Arc::new(AtomicBool::new(false));
        let a = CancellationFlag::shared(Arc::clone(&raw));
        let b = a.clone();

        b.cancel();
        assert!(a.is_cancelled());
        assert!(raw.load(Ordering::Relaxed));
    }

    #[test]
    fn cancel_after_polls_counts_down() {
        let signal = CancelAfterPolls::new(2);
        assert!(!signal.is_cancelled());
        assert!(!signal.is_cancelled());
        assert!(signal.is_cancelled());
        assert!(signal.is_cancelled());
    }
}
