use thiserror::Error;

/// Returned when converting an expired [`Weak`] into a [`Strong`] with [`TryFrom`].
///
/// [`Strong`]: crate::Strong
/// [`Weak`]: crate::Weak
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PromotionError {
    /// The last owner is gone, or the observer never referred to a value.
    #[error("cannot promote an expired weak handle")]
    Expired,
}
