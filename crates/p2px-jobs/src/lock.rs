//! Process-wide mutual exclusion for background passes.
//!
//! The reconciler and the expiry sweeper both mutate funded orders. If a sweep
//! offered a seller the refund path while a reconciliation pass told the buyer
//! to send fiat, the seller could collect both. Holding this lock for the full
//! pass rules that interleaving out. User commands do not take it.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Non-reentrant, fail-fast lock. A caller that cannot acquire it skips its
/// tick instead of queuing.
#[derive(Debug, Default)]
pub struct GlobalOrdersLock {
    held: AtomicBool,
}

impl GlobalOrdersLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the caller now holds the lock.
    pub fn acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Acquire and release on drop, so an early return or `?` cannot leak it.
    pub fn try_guard(&self) -> Option<OrdersLockGuard<'_>> {
        if self.acquire() {
            Some(OrdersLockGuard { lock: self })
        } else {
            debug!("Orders lock busy");
            None
        }
    }
}

#[must_use]
pub struct OrdersLockGuard<'a> {
    lock: &'a GlobalOrdersLock,
}

impl Drop for OrdersLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_second_acquire_fails_until_release() {
        let lock = GlobalOrdersLock::new();
        assert!(lock.acquire());
        assert!(!lock.acquire());
        lock.release();
        assert!(lock.acquire());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = GlobalOrdersLock::new();
        {
            let _guard = lock.try_guard().unwrap();
            assert!(lock.is_held());
            assert!(lock.try_guard().is_none());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let lock = Arc::new(GlobalOrdersLock::new());
        let barrier = Arc::new(Barrier::new(8));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if lock.acquire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(lock.is_held());
    }

    #[test]
    fn test_instances_are_independent() {
        let a = GlobalOrdersLock::new();
        let b = GlobalOrdersLock::new();
        assert!(a.acquire());
        assert!(b.acquire());
    }
}
