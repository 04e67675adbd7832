use std::{
    cell::Cell, process, sync::atomic::fence, sync::atomic::AtomicUsize,
    sync::atomic::Ordering::Acquire, sync::atomic::Ordering::Relaxed,
    sync::atomic::Ordering::Release,
};

use crossbeam::utils::Backoff;

/// Counts above this are treated as a leak of handles and abort the process, like
/// [`std::rc::Rc`] does on overflow.
const MAX_COUNT: usize = isize::MAX as usize;

/// The value a counter holds while [`Counter::lock_unique`] has it. Never a real count.
pub(crate) const LOCKED: usize = usize::MAX;

/// One of the two reference counts stored in a control block.
///
/// The counter flavour is chosen through the `C` type parameter of [`Strong`] and [`Weak`]:
/// [`Local`] for handles that stay on one thread, [`Atomic`] for handles shared across threads.
///
/// # Safety
///
/// Implementations must behave like a single integer: `decrement` returns the value held right
/// after the decrement, `increment_if_nonzero` never moves the counter away from zero, and
/// `release_unique` only succeeds on the transition from exactly one to zero. While locked by
/// `lock_unique`, `increment` must wait for `unlock_unique` instead of counting past the lock.
///
/// [`Strong`]: crate::Strong
/// [`Weak`]: crate::Weak
pub unsafe trait Counter: Sized {
    /// Creates a counter holding `n`.
    fn new(n: usize) -> Self;

    /// Reads the current value.
    fn get(&self) -> usize;

    /// Increments the counter. Aborts on overflow.
    fn increment(&self);

    /// Decrements the counter and returns the new value.
    fn decrement(&self) -> usize;

    /// Increments the counter unless it is zero. Returns whether the increment happened.
    fn increment_if_nonzero(&self) -> bool;

    /// Moves the counter from one to zero. Returns `false` and leaves the counter untouched if it
    /// held any other value.
    fn release_unique(&self) -> bool;

    /// Moves the counter from one to a locked state in which increments wait. Returns `false`
    /// and leaves the counter untouched if it held any other value.
    fn lock_unique(&self) -> bool;

    /// Moves a counter locked by [`Counter::lock_unique`] back to one.
    fn unlock_unique(&self);
}

/// Marker for counters that may be mutated from several threads at once. Handles using such a
/// counter are `Send` and `Sync` when the pointee is.
///
/// # Safety
///
/// Every operation of the [`Counter`] must be atomic.
pub unsafe trait SyncCounter: Counter + Send + Sync {}

/// A plain integer counter.
///
/// Handles over `Local` are neither `Send` nor `Sync`, so a control block using it can only ever be
/// touched from a single thread.
#[derive(Debug)]
pub struct Local(Cell<usize>);

unsafe impl Counter for Local {
    fn new(n: usize) -> Self {
        Local(Cell::new(n))
    }

    fn get(&self) -> usize {
        self.0.get()
    }

    fn increment(&self) {
        let n = self.0.get();
        if n >= MAX_COUNT {
            process::abort();
        }
        self.0.set(n + 1);
    }

    fn decrement(&self) -> usize {
        let n = self.0.get();
        debug_assert!(n > 0);
        self.0.set(n - 1);
        n - 1
    }

    fn increment_if_nonzero(&self) -> bool {
        if self.0.get() == 0 {
            return false;
        }
        self.increment();
        true
    }

    fn release_unique(&self) -> bool {
        if self.0.get() != 1 {
            return false;
        }
        self.0.set(0);
        true
    }

    fn lock_unique(&self) -> bool {
        if self.0.get() != 1 {
            return false;
        }
        self.0.set(LOCKED);
        true
    }

    fn unlock_unique(&self) {
        debug_assert!(self.0.get() == LOCKED);
        self.0.set(1);
    }
}

/// An atomic counter, for handles that are shared between threads.
#[derive(Debug)]
pub struct Atomic(AtomicUsize);

unsafe impl Counter for Atomic {
    fn new(n: usize) -> Self {
        Atomic(AtomicUsize::new(n))
    }

    fn get(&self) -> usize {
        self.0.load(Acquire)
    }

    fn increment(&self) {
        // a new handle can only be made from an existing one, which keeps the count positive. the
        // only thing to wait for is a uniqueness check holding the lock.
        let backoff = Backoff::new();
        let mut n = self.0.load(Relaxed);
        loop {
            if n == LOCKED {
                backoff.snooze();
                n = self.0.load(Relaxed);
                continue;
            }
            if n >= MAX_COUNT {
                process::abort();
            }

            match self.0.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => return,
                Err(current) => n = current,
            }
        }
    }

    fn decrement(&self) -> usize {
        let n = self.0.fetch_sub(1, Release) - 1;
        if n == 0 {
            // whoever observes zero is about to free something; every other decrement must be
            // visible to it first.
            fence(Acquire);
        }
        n
    }

    fn increment_if_nonzero(&self) -> bool {
        let backoff = Backoff::new();
        let mut n = self.0.load(Relaxed);
        loop {
            if n == 0 {
                return false;
            }
            if n >= MAX_COUNT {
                process::abort();
            }

            match self.0.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => return true,
                Err(current) => {
                    n = current;
                    backoff.spin();
                }
            }
        }
    }

    fn release_unique(&self) -> bool {
        self.0.compare_exchange(1, 0, Acquire, Relaxed).is_ok()
    }

    fn lock_unique(&self) -> bool {
        self.0.compare_exchange(1, LOCKED, Acquire, Relaxed).is_ok()
    }

    fn unlock_unique(&self) {
        self.0.store(1, Release);
    }
}

unsafe impl SyncCounter for Atomic {}
