use std::{fmt, hash::Hash, marker::PhantomData, mem, ops::Deref, ptr::NonNull};

use crate::{
    block::Raw,
    count::{Counter, Local, SyncCounter},
    error::PromotionError,
    weak::Weak,
};

/// An owning reference counted pointer, similar to [`std::rc::Rc`].
///
/// Unlike `Rc` a `Strong` may be empty. An empty handle owns nothing and has no control block;
/// [`Default`], [`Strong::take`] and [`Weak::lock`] on an expired observer produce one.
///
/// The pointee is dropped when the last `Strong` to it is dropped or [`reset`][Strong::reset],
/// regardless of how many [`Weak`] handles still observe it.
pub struct Strong<T, C = Local>
where
    C: Counter,
{
    raw: Raw<T, C>,
    _owns: PhantomData<T>,
}

impl<T, C> Drop for Strong<T, C>
where
    C: Counter,
{
    fn drop(&mut self) {
        // Safety: a non-null `raw` in a `Strong` always carries one strong count.
        unsafe { self.raw.release_strong() }
    }
}

unsafe impl<T, C> Send for Strong<T, C>
where
    T: Send + Sync,
    C: SyncCounter,
{
}

unsafe impl<T, C> Sync for Strong<T, C>
where
    T: Send + Sync,
    C: SyncCounter,
{
}

impl<T, C> fmt::Debug for Strong<T, C>
where
    T: fmt::Debug,
    C: Counter,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Strong").field(value).finish(),
            None => f.write_str("Strong(<empty>)"),
        }
    }
}

impl<T> Strong<T> {
    /// Moves `value` to the heap and creates the first owner of it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(5);
    /// assert!(*s == 5);
    /// assert!(s.strong_count() == 1);
    /// ```
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T, C> Strong<T, C>
where
    C: Counter,
{
    /// Creates an empty handle. No control block is allocated.
    pub const fn empty() -> Self {
        Strong {
            raw: Raw::null(),
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a boxed value.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::{Strong, SyncStrong};
    /// let s: SyncStrong<String> = Strong::from_box(Box::new(String::from("a")));
    /// assert!(s.get().unwrap() == "a");
    /// ```
    pub fn from_box(value: Box<T>) -> Self {
        // Safety: the box gives up its ownership right here.
        let raw = unsafe { Raw::adopt(NonNull::from(Box::leak(value))) };

        Strong {
            raw,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a raw pointer. A null pointer gives an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`Box::into_raw`] and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(value) => Strong {
                raw: unsafe { Raw::adopt(value) },
                _owns: PhantomData,
            },
            None => Self::empty(),
        }
    }

    /// Wraps a `raw` whose strong count has already been taken for the new handle.
    pub(crate) fn from_counted(raw: Raw<T, C>) -> Self {
        Strong {
            raw,
            _owns: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> Raw<T, C> {
        self.raw
    }

    /// Returns `true` if this handle owns a value.
    pub fn is_some(&self) -> bool {
        !self.raw.is_null()
    }

    /// Returns `true` if this handle is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.is_null()
    }

    /// Gets a reference to the value, or `None` for an empty handle.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(5);
    /// assert!(s.get() == Some(&5));
    ///
    /// let e = Strong::<i32>::default();
    /// assert!(e.get().is_none());
    /// ```
    pub fn get(&self) -> Option<&T> {
        // Safety: while `self` holds a strong count the pointee is alive.
        unsafe { self.raw.value_ptr().as_ref() }
    }

    /// Gets a mutable reference to the value if this is the only owner and nothing observes it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let mut s = Strong::new(5);
    /// *s.get_mut().unwrap() += 1;
    /// assert!(*s == 6);
    ///
    /// let w = s.downgrade();
    /// assert!(s.get_mut().is_none());
    /// # drop(w);
    /// ```
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let block = self.raw.block()?;

        // a stored weak count of one is the owners' own reference, so no observer exists. holding
        // it locked keeps new observers out while the strong count is read.
        if !block.weak().lock_unique() {
            return None;
        }
        let unique = block.strong_count() == 1;
        block.weak().unlock_unique();

        if !unique {
            return None;
        }

        // Safety: while the weak count was locked `self` was the only owner and nothing observed
        // the pointee. no new handle can be made without borrowing `self`.
        unsafe { self.raw.value_ptr().as_mut() }
    }

    /// Gets a raw pointer to the value. Null for an empty handle.
    pub fn as_ptr(&self) -> *const T {
        self.raw.value_ptr()
    }

    /// Gets the number of owners of the value, `self` included. Zero for an empty handle.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::mem::drop;
    /// # use ptrwrap::Strong;
    /// let s1 = Strong::new(5);
    /// let s2 = s1.clone();
    /// assert!(s1.strong_count() == 2);
    ///
    /// drop(s2);
    /// assert!(s1.strong_count() == 1);
    /// ```
    pub fn strong_count(&self) -> usize {
        self.raw.block().map_or(0, |block| block.strong_count())
    }

    /// Gets the number of [`Weak`] handles observing the value.
    pub fn weak_count(&self) -> usize {
        self.raw.block().map_or(0, |block| block.weak_count())
    }

    /// Returns `true` if both handles share a control block, or if both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.same_block(&other.raw)
    }

    /// Creates a new observer of the value. Downgrading an empty handle gives an empty observer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(s.as_ptr() == w.as_ptr());
    /// assert!(s.weak_count() == 1);
    /// ```
    pub fn downgrade(&self) -> Weak<T, C> {
        Weak::from(self)
    }

    /// Leaves `self` empty and returns what it held, without touching any count.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let mut s1 = Strong::new(1);
    /// let s2 = s1.take();
    ///
    /// assert!(s1.is_empty());
    /// assert!(*s2 == 1);
    /// assert!(s2.strong_count() == 1);
    /// ```
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Exchanges the contents of two handles, without touching any count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Gives up ownership and leaves `self` empty. Drops the value if this was the last owner.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Returns ownership of the contained value. Returns `Err` if the handle is empty or if there
    /// are other owners of the value. Observers of the value become expired.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ptrwrap::Strong;
    /// let s = Strong::new(String::from("a"));
    /// let w = s.downgrade();
    ///
    /// assert!(s.into_inner().unwrap() == "a");
    /// assert!(w.expired());
    /// ```
    pub fn into_inner(self) -> Result<T, Self> {
        let Some(block) = self.raw.block() else {
            return Err(self);
        };

        if !block.strong().release_unique() {
            return Err(self);
        }

        let raw = self.raw;
        mem::forget(self);

        // Safety: the strong count held by `self` was just moved to zero without dropping the
        // pointee, and `self` is gone.
        match unsafe { raw.take_released() } {
            Some(value) => Ok(value),
            None => unreachable!("a handle with a control block always has a pointee"),
        }
    }
}

impl<T, C> Default for Strong<T, C>
where
    C: Counter,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, C> Clone for Strong<T, C>
where
    C: Counter,
{
    fn clone(&self) -> Self {
        if let Some(block) = self.raw.block() {
            block.strong().increment();
        }

        Strong::from_counted(self.raw)
    }

    /// Copies `source` into a temporary first, so `self` is never left half updated. The old
    /// contents of `self` are released when the temporary is dropped.
    fn clone_from(&mut self, source: &Self) {
        let mut tmp = source.clone();
        self.swap(&mut tmp);
    }
}

impl<T, C> Deref for Strong<T, C>
where
    C: Counter,
{
    type Target = T;

    /// # Panics
    ///
    /// If the handle is empty. Check [`Strong::is_some`] or use [`Strong::get`] instead.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty `Strong`"),
        }
    }
}

impl<T, C> From<Box<T>> for Strong<T, C>
where
    C: Counter,
{
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T, C> From<Option<Box<T>>> for Strong<T, C>
where
    C: Counter,
{
    fn from(value: Option<Box<T>>) -> Self {
        match value {
            Some(value) => Self::from_box(value),
            None => Self::empty(),
        }
    }
}

impl<T, C> TryFrom<&Weak<T, C>> for Strong<T, C>
where
    C: Counter,
{
    type Error = PromotionError;

    /// Promotes an observer, failing instead of returning an empty handle when it has expired.
    fn try_from(weak: &Weak<T, C>) -> Result<Self, Self::Error> {
        let strong = weak.lock();
        if strong.is_empty() {
            return Err(PromotionError::Expired);
        }

        Ok(strong)
    }
}

impl<T, C> PartialEq for Strong<T, C>
where
    C: Counter,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T, C> Eq for Strong<T, C> where C: Counter {}

impl<T, C> Hash for Strong<T, C>
where
    C: Counter,
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Hash::hash(&self.raw.block_addr(), state)
    }
}
