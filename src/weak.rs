use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

use crate::block::ControlBlock;
use crate::shared::{addr, SharedPtr};

/// A non-owning reference to an object managed by [`SharedPtr`].
///
/// `WeakPtr` counts toward the weak count of the object's control block, so
/// the block outlives it, but never keeps the object itself alive. Call
/// [`lock`] to obtain a `SharedPtr` while the object is still around.
///
/// Weak pointers break ownership cycles: a parent can own its children
/// through `SharedPtr`s while the children refer back to the parent through
/// `WeakPtr`s.
///
/// [`lock`]: WeakPtr::lock
///
/// # Examples
///
/// ```
/// use tether::SharedPtr;
///
/// let strong = SharedPtr::new("tether");
/// let weak = SharedPtr::downgrade(&strong);
/// assert!(!weak.expired());
/// assert_eq!(*weak.lock(), "tether");
///
/// drop(strong);
/// assert!(weak.expired());
/// assert!(weak.lock().is_null());
/// ```
pub struct WeakPtr<T: ?Sized> {
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) block: Option<NonNull<ControlBlock>>,
    projected: bool,
    phantom: PhantomData<T>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// Constructs a `WeakPtr` that observes nothing. It is always expired.
    ///
    /// ```
    /// use tether::WeakPtr;
    ///
    /// let empty: WeakPtr<i64> = WeakPtr::new();
    /// assert!(empty.expired());
    /// assert!(empty.lock().is_null());
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ptr: None,
            block: None,
            projected: false,
            phantom: PhantomData,
        }
    }

    /// Assemble a handle without touching the counts; the handle takes over
    /// one weak reference.
    #[inline]
    pub(crate) const unsafe fn from_parts(
        ptr: Option<NonNull<T>>,
        block: Option<NonNull<ControlBlock>>,
        projected: bool,
    ) -> Self {
        Self {
            ptr,
            block,
            projected,
            phantom: PhantomData,
        }
    }

    /// Returns `true` if the observed object was destroyed, or if this
    /// pointer never observed anything.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Returns the number of [`SharedPtr`]s that own the observed object.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, |block| unsafe { block.as_ref().strong() })
    }

    /// Returns the number of `WeakPtr`s observing the object, this one
    /// included.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, |block| unsafe { block.as_ref().weak() })
    }

    /// Attempts to obtain a [`SharedPtr`] to the observed object.
    ///
    /// Returns a null `SharedPtr` if the object was already destroyed. Never
    /// fails otherwise; see [`SharedPtr::from_weak`] for a promotion that
    /// reports expiry as an error.
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let strong = SharedPtr::new(1);
    /// let weak = SharedPtr::downgrade(&strong);
    /// let locked = weak.lock();
    /// assert_eq!(locked.use_count(), 2);
    /// ```
    #[must_use]
    pub fn lock(&self) -> SharedPtr<T> {
        match (self.ptr, self.block) {
            (Some(ptr), Some(block)) if !self.expired() => unsafe {
                block.as_ref().increase_strong();
                let mut shared = SharedPtr::from_parts(ptr, block);
                shared.projected = self.projected;
                shared
            },
            _ => SharedPtr::null(),
        }
    }

    /// Stops observing the object.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Exchanges the contents of two pointers without touching any counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns `true` if both pointers observe the same address.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        addr(this.ptr) == addr(other.ptr)
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    /// Makes a clone of the `WeakPtr` that observes the same object,
    /// increasing the weak reference count.
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            unsafe {
                block.as_ref().increase_weak();
            }
        }
        Self {
            ptr: self.ptr,
            block: self.block,
            projected: self.projected,
            phantom: PhantomData,
        }
    }

    /// Assigning a pointer that already observes the same address does
    /// nothing.
    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) && self.block == source.block {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    /// Drops the `WeakPtr`.
    ///
    /// This decrements the weak reference count. The control block is freed
    /// once no `SharedPtr` or `WeakPtr` refers to it.
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let foo = SharedPtr::new(5);
    /// let weak_foo = SharedPtr::downgrade(&foo);
    /// let other_weak_foo = weak_foo.clone();
    ///
    /// drop(weak_foo);
    /// assert!(!other_weak_foo.expired());
    ///
    /// drop(foo);
    /// assert!(other_weak_foo.expired());
    /// ```
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe {
                ControlBlock::drop_weak(block);
            }
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    /// Constructs a `WeakPtr` that observes nothing.
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        SharedPtr::downgrade(shared)
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakPtr)")
    }
}

impl<T: ?Sized> fmt::Pointer for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&addr(self.ptr), f)
    }
}
