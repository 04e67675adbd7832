use std::{fmt, ptr::NonNull};

use tracing::trace;

use crate::count::{Counter, LOCKED};

/// The control block shared by every handle to one pointee.
///
/// `weak` counts the live observers plus one reference held collectively by the owners for as
/// long as `strong` is positive. The pointee is freed when `strong` reaches zero, the block itself
/// when `weak` does. The pointee lives in its own allocation, so the owners give up their weak
/// reference before dropping it and the block may already be gone while the pointee drops.
pub(crate) struct Block<C> {
    strong: C,
    weak: C,
}

impl<C> Block<C>
where
    C: Counter,
{
    fn allocate() -> NonNull<Self> {
        NonNull::from(Box::leak(Box::new(Block {
            strong: C::new(1),
            weak: C::new(1),
        })))
    }

    pub(crate) fn strong(&self) -> &C {
        &self.strong
    }

    pub(crate) fn weak(&self) -> &C {
        &self.weak
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// The number of live observers, without the owners' shared reference.
    pub(crate) fn weak_count(&self) -> usize {
        let weak = self.weak.get();
        if weak == LOCKED {
            // only taken by a uniqueness check, which needs zero observers.
            return 0;
        }

        let owners = usize::from(self.strong.get() > 0);
        weak.saturating_sub(owners)
    }
}

/// The state shared by [`Strong`] and [`Weak`]: a pointer to the pointee and a pointer to its
/// control block. Either both are present or neither is.
///
/// A `Raw` is plain data. The handle storing it is responsible for the count it represents.
///
/// [`Strong`]: crate::Strong
/// [`Weak`]: crate::Weak
pub(crate) struct Raw<T, C> {
    parts: Option<Parts<T, C>>,
}

struct Parts<T, C> {
    value: NonNull<T>,
    block: NonNull<Block<C>>,
}

impl<T, C> Clone for Parts<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C> Copy for Parts<T, C> {}

impl<T, C> Clone for Raw<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C> Copy for Raw<T, C> {}

impl<T, C> fmt::Debug for Raw<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts {
            Some(parts) => f
                .debug_struct("Raw")
                .field("value", &parts.value)
                .field("block", &parts.block)
                .finish(),
            None => f.write_str("Raw(null)"),
        }
    }
}

impl<T, C> Raw<T, C>
where
    C: Counter,
{
    pub(crate) const fn null() -> Self {
        Raw { parts: None }
    }

    /// Takes ownership of `value` and allocates a control block for it with one owner.
    ///
    /// # Safety
    ///
    /// `value` must come from [`Box::into_raw`] (or [`Box::leak`]) and must not be owned by
    /// anything else.
    pub(crate) unsafe fn adopt(value: NonNull<T>) -> Self {
        let block = Block::allocate();
        trace!(?value, ?block, "allocated control block");

        Raw {
            parts: Some(Parts { value, block }),
        }
    }

    pub(crate) fn is_null(&self) -> bool {
        self.parts.is_none()
    }

    /// The pointee, or null. The pointer dangles once the strong count has reached zero.
    pub(crate) fn value_ptr(&self) -> *mut T {
        match self.parts {
            Some(parts) => parts.value.as_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    /// The control block, if any.
    pub(crate) fn block(&self) -> Option<&Block<C>> {
        // Safety: every `Raw` stored in a live handle holds a count on its block, which keeps the
        // block allocated for at least as long as the handle, and thus for the returned borrow.
        self.parts
            .map(|parts| unsafe { &*parts.block.as_ptr() })
    }

    pub(crate) fn same_block(&self, other: &Self) -> bool {
        self.block_addr() == other.block_addr()
    }

    pub(crate) fn block_addr(&self) -> usize {
        match self.parts {
            Some(parts) => parts.block.as_ptr() as usize,
            None => 0,
        }
    }

    /// Gives up one strong count. Drops the pointee when it was the last one.
    ///
    /// # Safety
    ///
    /// `self` must hold a strong count that has not been released yet.
    pub(crate) unsafe fn release_strong(self) {
        let Some(parts) = self.parts else {
            return;
        };

        if unsafe { parts.block.as_ref() }.strong.decrement() > 0 {
            return;
        }

        // the owners' shared weak reference goes first, so the pointee's destructor sees only the
        // live observers. the block is not touched again after this.
        unsafe { self.release_weak() };

        trace!(value = ?parts.value, "dropping pointee");
        drop(unsafe { Box::from_raw(parts.value.as_ptr()) });
    }

    /// Gives up one weak count. Frees the control block when it was the last one.
    ///
    /// # Safety
    ///
    /// `self` must hold a weak count that has not been released yet.
    pub(crate) unsafe fn release_weak(self) {
        let Some(parts) = self.parts else {
            return;
        };

        if unsafe { parts.block.as_ref() }.weak.decrement() > 0 {
            return;
        }

        trace!(block = ?parts.block, "freeing control block");
        drop(unsafe { Box::from_raw(parts.block.as_ptr()) });
    }

    /// Takes the pointee out after the strong count has been moved to zero by
    /// [`Counter::release_unique`], and gives up the owners' shared weak reference.
    ///
    /// # Safety
    ///
    /// The caller must be the owner that released the strong count, and must not have released it
    /// through [`Raw::release_strong`].
    pub(crate) unsafe fn take_released(self) -> Option<T> {
        let parts = self.parts?;
        unsafe { self.release_weak() };

        Some(*unsafe { Box::from_raw(parts.value.as_ptr()) })
    }
}
