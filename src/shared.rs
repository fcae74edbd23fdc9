use alloc::alloc::Layout;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::block::ControlBlock;
use crate::error::BadWeakPtr;
use crate::weak::WeakPtr;


/// A single-threaded reference-counting pointer.
///
/// `SharedPtr<T>` provides shared ownership of a value of type `T`. Cloning
/// a `SharedPtr` produces a new pointer to the same value and bumps the
/// strong count in the value's control block. When the last `SharedPtr` to a
/// given value is dropped, the value is dropped as well; the control block
/// lives on until the last [`WeakPtr`] is gone.
///
/// A `SharedPtr` may be null. Null pointers own nothing and carry no control
/// block, so creating one never allocates. Dereferencing a null `SharedPtr`
/// panics; use [`get`] to observe a possibly null pointer.
///
/// Equality, ordering and hashing compare the pointed-to addresses, not the
/// pointed-to values.
///
/// `SharedPtr` is neither `Send` nor `Sync`.
///
/// [`get`]: SharedPtr::get
///
/// # Examples
///
/// ```
/// use tether::SharedPtr;
///
/// let five = SharedPtr::new(5);
/// let also_five = five.clone();
/// assert_eq!(five.use_count(), 2);
/// assert_eq!(five, also_five);
/// drop(also_five);
/// assert_eq!(five.use_count(), 1);
/// ```
pub struct SharedPtr<T: ?Sized> {
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) block: Option<NonNull<ControlBlock>>,
    /// Set when `ptr` may front something other than the object the control
    /// block owns.
    pub(crate) projected: bool,
    phantom: PhantomData<T>,
}

impl<T: ?Sized> SharedPtr<T> {
    /// Constructs a null `SharedPtr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let empty = SharedPtr::<u8>::null();
    /// assert!(empty.is_null());
    /// assert_eq!(empty.use_count(), 0);
    /// ```
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            block: None,
            projected: false,
            phantom: PhantomData,
        }
    }

    /// Takes ownership of a boxed value.
    ///
    /// The control block is allocated separately from the value. Prefer
    /// [`SharedPtr::new`] when the value is not already boxed.
    ///
    /// Boxes of unsized types are accepted, which is how a `SharedPtr` to a
    /// trait object is built. The concrete type is dropped when the last
    /// strong reference goes away.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::fmt::Display;
    /// use tether::SharedPtr;
    ///
    /// let shown: SharedPtr<dyn Display> = SharedPtr::from_box(Box::new(42_u8));
    /// assert_eq!(shown.to_string(), "42");
    /// ```
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        // SAFETY: the pointer comes straight from `Box::into_raw`.
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Takes ownership of a raw pointer. A null `ptr` yields a null
    /// `SharedPtr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`], and nothing else
    /// may own it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => Self::from_parts(ptr, ControlBlock::adopt(ptr)),
            None => Self::null(),
        }
    }

    /// Assemble a handle from a pointer and a block without touching the
    /// counts; the handle takes over one strong reference.
    #[inline]
    pub(crate) const unsafe fn from_parts(ptr: NonNull<T>, block: NonNull<ControlBlock>) -> Self {
        Self {
            ptr: Some(ptr),
            block: Some(block),
            projected: false,
            phantom: PhantomData,
        }
    }

    /// Constructs a `SharedPtr` that points at `ptr` but shares ownership
    /// with `owner`.
    ///
    /// The result keeps everything `owner` owns alive, and increments the
    /// strong count of `owner`'s control block. If `owner` owns nothing, the
    /// result owns nothing either.
    ///
    /// See [`SharedPtr::project`] for a safe variant.
    ///
    /// The result never gives the owned object up through
    /// [`SharedPtr::try_unwrap`], even if it points at the owned object.
    ///
    /// # Safety
    ///
    /// `ptr` must remain valid for as long as the object owned by `owner` is
    /// alive.
    ///
    /// The result must not outlive any borrow held by the object owned by
    /// `owner`: the last strong reference drops that object, so every
    /// lifetime in `U` must still be live when the result is dropped.
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: NonNull<T>) -> Self {
        if let Some(block) = owner.block {
            block.as_ref().increase_strong();
        }
        Self {
            ptr: Some(ptr),
            block: owner.block,
            projected: true,
            phantom: PhantomData,
        }
    }

    /// Constructs a `SharedPtr` to a part of the value owned by `this`.
    ///
    /// The returned pointer fronts whatever `f` returns while sharing `this`'s
    /// control block, so the whole value stays alive for as long as either
    /// pointer does. Projecting a null pointer yields a null pointer.
    ///
    /// This is an associated function that needs to be used as
    /// `SharedPtr::project(...)`. A method would interfere with methods of the
    /// same name on the contents of a `SharedPtr` used through `Deref`.
    ///
    /// The returned pointer may be the one that drops the owned object, so
    /// the owned object must not borrow anything, which is what the
    /// `T: 'static` bound enforces. Use [`SharedPtr::aliasing`] to project
    /// out of borrowing objects.
    ///
    /// ```compile_fail
    /// use tether::SharedPtr;
    ///
    /// struct Holder<'a> {
    ///     name: &'a str,
    ///     id: u8,
    /// }
    ///
    /// let id;
    /// {
    ///     let name = String::from("scoped");
    ///     let owner = SharedPtr::new(Holder { name: &name, id: 1 });
    ///     id = SharedPtr::project(&owner, |holder| &holder.id);
    /// }
    /// // `Holder` would be dropped here, after `name` is gone.
    /// drop(id);
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// struct Config {
    ///     name: String,
    /// }
    ///
    /// let config = SharedPtr::new(Config { name: "tether".to_string() });
    /// let name = SharedPtr::project(&config, |config| config.name.as_str());
    /// drop(config);
    /// // `name` keeps the whole `Config` alive.
    /// assert_eq!(&*name, "tether");
    /// ```
    pub fn project<U, F>(this: &Self, f: F) -> SharedPtr<U>
    where
        T: 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        match this.get() {
            // SAFETY: `f` borrows from the value owned by `this`, which the
            // returned pointer keeps alive.
            Some(value) => unsafe { SharedPtr::aliasing(this, NonNull::from(f(value))) },
            None => SharedPtr::null(),
        }
    }

    /// Promotes a [`WeakPtr`].
    ///
    /// # Errors
    ///
    /// Returns [`BadWeakPtr::Expired`] if the object `weak` points to was
    /// already destroyed.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::{BadWeakPtr, SharedPtr};
    ///
    /// let strong = SharedPtr::new(7);
    /// let weak = SharedPtr::downgrade(&strong);
    /// assert_eq!(*SharedPtr::from_weak(&weak).unwrap(), 7);
    /// drop(strong);
    /// assert_eq!(SharedPtr::from_weak(&weak), Err(BadWeakPtr::Expired));
    /// ```
    pub fn from_weak(weak: &WeakPtr<T>) -> Result<Self, BadWeakPtr> {
        if weak.expired() {
            debug!("tether refused to promote an expired WeakPtr");
            return Err(BadWeakPtr::Expired);
        }
        Ok(weak.lock())
    }

    /// Creates a new [`WeakPtr`] to this object.
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let five = SharedPtr::new(5);
    /// let weak_five = SharedPtr::downgrade(&five);
    /// assert_eq!(weak_five.use_count(), 1);
    /// ```
    #[must_use]
    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        if let Some(block) = this.block {
            unsafe {
                block.as_ref().increase_weak();
            }
        }
        // SAFETY: the weak count was bumped above for the new handle.
        unsafe { WeakPtr::from_parts(this.ptr, this.block, this.projected) }
    }

    /// Releases ownership and makes this pointer null.
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Releases ownership and takes ownership of `value` instead.
    pub fn reset_to(&mut self, value: Box<T>) {
        *self = Self::from_box(value);
    }

    /// Exchanges the contents of two pointers without touching any counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns a reference to the pointed-to value, or `None` if null.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-null pointer is kept alive by this handle.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Returns a mutable reference to the pointed-to value if no other
    /// `SharedPtr` or [`WeakPtr`] shares its control block.
    ///
    /// This is an associated function that needs to be used as
    /// `SharedPtr::get_mut(...)`.
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let mut x = SharedPtr::new(3);
    /// *SharedPtr::get_mut(&mut x).unwrap() = 4;
    /// assert_eq!(*x, 4);
    ///
    /// let _y = x.clone();
    /// assert!(SharedPtr::get_mut(&mut x).is_none());
    /// ```
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let block = this.block?;
        let unique = unsafe { block.as_ref().strong() == 1 && block.as_ref().weak() == 0 };
        if unique {
            // SAFETY: no other handle can observe the value.
            this.ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Returns the raw pointer, or `None` if null.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns `true` if this pointer does not point to anything.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns the number of `SharedPtr`s sharing ownership of the value, or
    /// zero if this pointer is null.
    #[must_use]
    pub fn use_count(&self) -> usize {
        match (self.ptr, self.block) {
            (Some(_), Some(block)) => unsafe { block.as_ref().strong() },
            _ => 0,
        }
    }

    /// Returns the number of [`WeakPtr`]s observing the value.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, |block| unsafe { block.as_ref().weak() })
    }

    /// Returns `true` if both pointers share the same control block, even if
    /// they point to different addresses because one of them was built by
    /// [`SharedPtr::project`] or [`SharedPtr::aliasing`].
    ///
    /// Two pointers that own nothing never share an owner.
    #[must_use]
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &SharedPtr<U>) -> bool {
        match (this.block, other.block) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const u8 {
        addr(self.ptr)
    }
}

impl<T> SharedPtr<T> {
    /// Returns the inner value if this is the only `SharedPtr` to it.
    ///
    /// Otherwise, or if this pointer was built by [`SharedPtr::project`] or
    /// [`SharedPtr::aliasing`], an [`Err`] is returned with the same
    /// `SharedPtr` that was passed in. Outstanding [`WeakPtr`]s do not prevent unwrapping; they
    /// expire.
    ///
    /// # Errors
    ///
    /// Returns `this` unchanged when the value cannot be moved out.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let x = SharedPtr::new(3);
    /// assert_eq!(SharedPtr::try_unwrap(x), Ok(3));
    ///
    /// let x = SharedPtr::new(4);
    /// let _y = x.clone();
    /// assert_eq!(*SharedPtr::try_unwrap(x).unwrap_err(), 4);
    /// ```
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        let (Some(ptr), Some(block)) = (this.ptr, this.block) else {
            return Err(this);
        };
        if this.projected {
            debug!("tether refused to unwrap a projected SharedPtr");
            return Err(this);
        }
        let control = unsafe { block.as_ref() };
        if control.strong() != 1 {
            return Err(this);
        }
        let released = unsafe { control.release_payload(addr(this.ptr), Layout::new::<T>()) };
        if !released {
            return Err(this);
        }
        // SAFETY: the block no longer owns the payload and it is not shared.
        let value = unsafe {
            if control.is_single_allocation() {
                ptr::read(ptr.as_ptr())
            } else {
                *Box::from_raw(ptr.as_ptr())
            }
        };
        mem::forget(this);
        unsafe {
            ControlBlock::drop_strong(block);
        }
        Ok(value)
    }
}

#[inline]
pub(crate) fn addr<T: ?Sized>(ptr: Option<NonNull<T>>) -> *const u8 {
    ptr.map_or(ptr::null(), |ptr| ptr.as_ptr().cast::<u8>().cast_const())
}

#[cold]
#[inline(never)]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null SharedPtr");
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    /// Makes a clone of the `SharedPtr` pointer.
    ///
    /// This creates another pointer to the same allocation, increasing the
    /// strong reference count.
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            unsafe {
                block.as_ref().increase_strong();
            }
        }
        Self {
            ptr: self.ptr,
            block: self.block,
            projected: self.projected,
            phantom: PhantomData,
        }
    }

    /// Assigning a pointer to the object `self` already points to does
    /// nothing, so the object is never dropped and reacquired.
    fn clone_from(&mut self, source: &Self) {
        if self.addr() == source.addr() && self.block == source.block {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    /// Creates a null `SharedPtr`.
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = BadWeakPtr;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self, Self::Error> {
        Self::from_weak(weak)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    /// Two `SharedPtr`s are equal if they point to the same address.
    #[inline]
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized, U: ?Sized> PartialOrd<SharedPtr<U>> for SharedPtr<T> {
    fn partial_cmp(&self, other: &SharedPtr<U>) -> Option<Ordering> {
        Some(self.addr().cmp(&other.addr()))
    }
}

impl<T: ?Sized> Ord for SharedPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T: ?Sized> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.addr(), f)
    }
}

impl<T: ?Sized> AsRef<T> for SharedPtr<T> {
    fn as_ref(&self) -> &T {
        self
    }
}
