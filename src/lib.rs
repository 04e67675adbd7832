//! A reference counted owning [`Strong`] and observing [`Weak`] pointer pair.
//!
//! The provided types are very similar to [`std::rc::Rc`] and [`std::rc::Weak`]. A `Strong` owns
//! a heap value and a `Weak` observes it; both refer to a shared control block holding a strong
//! and a weak count. The value is dropped as soon as the last `Strong` goes away, the control
//! block once the last handle of either kind does. A `Weak` can be [`lock`][Weak::lock]ed to
//! obtain a new `Strong` for as long as the value is alive.
//!
//! Unlike the standard library types, both handles can be empty. An empty `Strong` owns nothing
//! and dereferencing it panics, so check [`Strong::is_some`] or use [`Strong::get`] first.
//!
//! The counters are chosen through a type parameter. [`Local`] is the default and uses plain
//! integers, which keeps the handles on a single thread. [`Atomic`] uses atomic integers and
//! makes the handles `Send` and `Sync`; [`SyncStrong`] and [`SyncWeak`] name that flavour.
//!
//! ```
//! # use std::mem::drop;
//! # use ptrwrap::Strong;
//! let a = Strong::new(1);
//! let w = a.downgrade();
//! assert!(*w.lock() == 1);
//!
//! drop(a);
//! assert!(w.expired());
//! assert!(w.lock().is_empty());
//! ```

mod block;
mod count;
mod error;
mod strong;
mod weak;

pub use crate::{
    count::{Atomic, Counter, Local, SyncCounter},
    error::PromotionError,
    strong::Strong,
    weak::Weak,
};

/// A [`Strong`] with atomic counters.
pub type SyncStrong<T> = Strong<T, Atomic>;

/// A [`Weak`] with atomic counters.
pub type SyncWeak<T> = Weak<T, Atomic>;
