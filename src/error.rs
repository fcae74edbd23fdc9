use core::fmt;

/// The error returned when a [`SharedPtr`] cannot be minted from a weak
/// reference.
///
/// [`SharedPtr`]: crate::SharedPtr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadWeakPtr {
    /// The referenced object was already destroyed because no strong
    /// references to it exist anymore.
    Expired,
    /// The object was never owned by a [`SharedPtr`], so it has no weak
    /// reference to itself to promote. This is the result of calling
    /// [`shared_from_this`] on a value that lives on the stack or inside a
    /// [`UniquePtr`].
    ///
    /// [`SharedPtr`]: crate::SharedPtr
    /// [`UniquePtr`]: crate::UniquePtr
    /// [`shared_from_this`]: crate::EnableSharedFromThis::shared_from_this
    Unlinked,
}

impl fmt::Display for BadWeakPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Expired => f.write_str("dangling weak reference: object was already destroyed"),
            Self::Unlinked => f.write_str("object is not owned by any SharedPtr"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BadWeakPtr {}
