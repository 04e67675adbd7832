use std::{fmt, hash::Hash, marker::PhantomData, mem};

use tracing::debug;

use crate::{
    block::Raw,
    count::{Counter, Local, SyncCounter},
    strong::Strong,
};

/// A non-owning observer of a value owned by [`Strong`] handles.
///
/// A `Weak` keeps the control block alive but never the value. To access the value it must be
/// [`lock`][Weak::lock]ed, which creates a new owner if the value still exists.
pub struct Weak<T, C = Local>
where
    C: Counter,
{
    raw: Raw<T, C>,
    _observes: PhantomData<*const T>,
}

impl<T, C> Drop for Weak<T, C>
where
    C: Counter,
{
    fn drop(&mut self) {
        // Safety: a non-null `raw` in a `Weak` always carries one weak count.
        unsafe { self.raw.release_weak() }
    }
}

unsafe impl<T, C> Send for Weak<T, C>
where
    T: Send + Sync,
    C: SyncCounter,
{
}

unsafe impl<T, C> Sync for Weak<T, C>
where
    T: Send + Sync,
    C: SyncCounter,
{
}

impl<T, C> fmt::Debug for Weak<T, C>
where
    T: fmt::Debug,
    C: Counter,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strong = self.lock();
        match strong.get() {
            Some(value) => f.debug_tuple("Weak").field(value).finish(),
            None => f.write_str("Weak(<expired>)"),
        }
    }
}

impl<T, C> Weak<T, C>
where
    C: Counter,
{
    /// Creates an empty observer. It is expired from the start.
    pub const fn new() -> Self {
        Weak {
            raw: Raw::null(),
            _observes: PhantomData,
        }
    }

    /// Returns `true` if the value is gone, or if this observer never referred to one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(5);
    /// let w = s.downgrade();
    /// assert!(!w.expired());
    ///
    /// drop(s);
    /// assert!(w.expired());
    /// ```
    pub fn expired(&self) -> bool {
        self.raw
            .block()
            .map_or(true, |block| block.strong_count() == 0)
    }

    /// Creates a new owner of the value. Returns an empty [`Strong`] if the value is gone.
    ///
    /// With [`Atomic`][crate::Atomic] counters the expiry check and the increment are a single
    /// compare-exchange, so a lock racing the last owner either wins a share of the value or
    /// fails cleanly.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(*w.lock() == 5);
    ///
    /// drop(s);
    /// assert!(w.lock().is_empty());
    /// ```
    pub fn lock(&self) -> Strong<T, C> {
        let Some(block) = self.raw.block() else {
            return Strong::empty();
        };

        if !block.strong().increment_if_nonzero() {
            debug!(raw = ?self.raw, "lock on an expired weak handle");
            return Strong::empty();
        }

        Strong::from_counted(self.raw)
    }

    /// Gets a raw pointer to the value. Null for an empty observer, dangling once expired.
    pub fn as_ptr(&self) -> *const T {
        self.raw.value_ptr()
    }

    /// Gets the number of [`Strong`] handles owning the value.
    pub fn strong_count(&self) -> usize {
        self.raw.block().map_or(0, |block| block.strong_count())
    }

    /// Gets the number of observers of the value, `self` included.
    pub fn weak_count(&self) -> usize {
        self.raw.block().map_or(0, |block| block.weak_count())
    }

    /// Returns `true` if both observers share a control block, or if both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.same_block(&other.raw)
    }

    /// Leaves `self` empty and returns what it held, without touching any count.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Exchanges the contents of two observers, without touching any count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Stops observing and leaves `self` empty. Never drops the value.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    fn share(raw: Raw<T, C>) -> Self {
        if let Some(block) = raw.block() {
            block.weak().increment();
        }

        Weak {
            raw,
            _observes: PhantomData,
        }
    }
}

impl<T, C> Default for Weak<T, C>
where
    C: Counter,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> Clone for Weak<T, C>
where
    C: Counter,
{
    fn clone(&self) -> Self {
        Weak::share(self.raw)
    }

    /// Copy-and-swap, see [`Strong::clone_from`][Clone::clone_from].
    fn clone_from(&mut self, source: &Self) {
        let mut tmp = source.clone();
        self.swap(&mut tmp);
    }
}

impl<T, C> From<&Strong<T, C>> for Weak<T, C>
where
    C: Counter,
{
    fn from(strong: &Strong<T, C>) -> Self {
        Weak::share(strong.raw())
    }
}

impl<T, C> PartialEq for Weak<T, C>
where
    C: Counter,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T, C> Eq for Weak<T, C> where C: Counter {}

impl<T, C> Hash for Weak<T, C>
where
    C: Counter,
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Hash::hash(&self.raw.block_addr(), state)
    }
}
