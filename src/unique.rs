use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::NonNull;

use crate::pair::CompressedPair;
use crate::shared::{addr, SharedPtr};

/// A policy that disposes of the object owned by a [`UniquePtr`].
///
/// Every `FnMut(NonNull<T>)` closure is a `Deleter<T>`, which makes it easy to
/// hand ownership of memory that was not allocated by a `Box` to a
/// `UniquePtr`.
pub trait Deleter<T: ?Sized> {
    /// Dispose of the object at `ptr`.
    ///
    /// A `UniquePtr` calls this at most once per owned pointer and never with
    /// a pointer it has released.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live object that this policy knows how to dispose of,
    /// and it must not be used afterward.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// The default [`Deleter`]: reconstitutes and drops the `Box<T>` the pointer
/// came from.
///
/// `DefaultDelete` is zero-sized, so a `UniquePtr<T>` is exactly as large as a
/// `Box<T>`. It handles slices like any other unsized type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr);
    }
}

/// A pointer with exclusive ownership of a heap object.
///
/// `UniquePtr<T, D>` owns the object it points to and disposes of it with the
/// [`Deleter`] `D` when the `UniquePtr` is dropped or reset. It cannot be
/// cloned; moving it moves ownership. A `UniquePtr` may be null, in which case
/// there is nothing to dispose of and the deleter is never called.
///
/// Single objects dereference with `*` and `.`; slices owned through
/// `UniquePtr<[T], D>` are indexed instead.
///
/// `Deref` is only implemented for sized objects, because stable Rust cannot
/// implement it for every unsized type except slices. Reach other unsized
/// objects, such as `UniquePtr<dyn Trait>` or `UniquePtr<str>`, through
/// [`get`] and [`get_mut`]:
///
/// ```
/// use core::fmt::Display;
///
/// use tether::UniquePtr;
///
/// let shown: UniquePtr<dyn Display> = UniquePtr::new(Box::new(7));
/// assert_eq!(shown.get().map(ToString::to_string).as_deref(), Some("7"));
///
/// let mut name: UniquePtr<str> = UniquePtr::new(String::from("tether").into_boxed_str());
/// if let Some(name) = name.get_mut() {
///     name.make_ascii_uppercase();
/// }
/// assert_eq!(name.get(), Some("TETHER"));
/// ```
///
/// [`get`]: UniquePtr::get
/// [`get_mut`]: UniquePtr::get_mut
///
/// # Examples
///
/// ```
/// use tether::UniquePtr;
///
/// let mut answer = UniquePtr::new(Box::new(41));
/// *answer += 1;
/// assert_eq!(*answer, 42);
///
/// let mut squares = UniquePtr::new(vec![0, 1, 4].into_boxed_slice());
/// squares[2] = 9;
/// assert_eq!(squares.len(), 3);
/// assert_eq!(squares[2], 9);
/// ```
pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    pair: CompressedPair<Option<NonNull<T>>, D>,
    phantom: PhantomData<T>,
}

// `UniquePtr` owns its object like a `Box` does.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniquePtr<T, D> {}
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniquePtr<T, D> {}

impl<T: ?Sized> UniquePtr<T> {
    /// Takes ownership of a boxed value.
    #[must_use]
    pub fn new(value: Box<T>) -> Self {
        Self {
            pair: CompressedPair::new(Some(NonNull::from(Box::leak(value))), DefaultDelete),
            phantom: PhantomData,
        }
    }

    /// Takes ownership of a raw pointer. A null `ptr` yields a null
    /// `UniquePtr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`], and nothing else
    /// may own it.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::with_deleter(NonNull::new(ptr), DefaultDelete)
    }

    /// Gives up ownership and returns the object as a `Box`, or `None` if
    /// this pointer is null.
    ///
    /// ```
    /// use tether::UniquePtr;
    ///
    /// let unique = UniquePtr::new(Box::new("boxed"));
    /// assert_eq!(unique.into_box().as_deref(), Some(&"boxed"));
    /// ```
    #[must_use]
    pub fn into_box(mut self) -> Option<Box<T>> {
        // SAFETY: `DefaultDelete` pointers come from `Box::into_raw`.
        self.release().map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> UniquePtr<T, D> {
    /// Constructs a null `UniquePtr` with a default deleter.
    #[must_use]
    pub fn null() -> Self {
        Self {
            pair: CompressedPair::new(None, D::default()),
            phantom: PhantomData,
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// Takes ownership of `ptr`, to be disposed of by `deleter`.
    ///
    /// ```
    /// use std::ptr::NonNull;
    /// use tether::UniquePtr;
    ///
    /// let raw = Box::into_raw(Box::new(String::from("freed by a closure")));
    /// let deleter = |ptr: NonNull<String>| unsafe { drop(Box::from_raw(ptr.as_ptr())) };
    /// let unique = unsafe { UniquePtr::with_deleter(NonNull::new(raw), deleter) };
    /// assert_eq!(unique.len(), 18);
    /// ```
    ///
    /// # Safety
    ///
    /// If `ptr` is not `None`, it must be a live object that `deleter` can
    /// dispose of, and nothing else may own it.
    #[must_use]
    pub unsafe fn with_deleter(ptr: Option<NonNull<T>>, deleter: D) -> Self {
        Self {
            pair: CompressedPair::new(ptr, deleter),
            phantom: PhantomData,
        }
    }

    /// Gives up ownership without disposing of the object and leaves this
    /// pointer null.
    ///
    /// The caller becomes responsible for the returned object.
    ///
    /// ```
    /// use tether::UniquePtr;
    ///
    /// let mut unique = UniquePtr::new(Box::new(5));
    /// let raw = unique.release().unwrap();
    /// assert!(unique.is_null());
    /// drop(unsafe { Box::from_raw(raw.as_ptr()) });
    /// ```
    #[must_use = "the released object is leaked unless it is disposed of"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.pair.first_mut().take()
    }

    /// Takes ownership of `ptr` and disposes of the object owned before.
    ///
    /// Resetting to the pointer that is already owned does nothing.
    ///
    /// # Safety
    ///
    /// If `ptr` is not `None` and differs from the owned pointer, it must be a
    /// live object that the deleter can dispose of, and nothing else may own
    /// it.
    pub unsafe fn reset(&mut self, ptr: Option<NonNull<T>>) {
        if addr(*self.pair.first()) == addr(ptr) {
            return;
        }
        if let Some(old) = mem::replace(self.pair.first_mut(), ptr) {
            self.delete(old);
        }
    }

    /// Disposes of the owned object, if any, and leaves this pointer null.
    pub fn clear(&mut self) {
        if let Some(old) = self.release() {
            // SAFETY: `old` was owned by this pointer until now.
            unsafe {
                self.delete(old);
            }
        }
    }

    /// Exchanges the objects and deleters of two pointers.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns a reference to the owned object, or `None` if null.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the object is owned by this pointer.
        self.pair.first().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Returns a mutable reference to the owned object, or `None` if null.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the object is owned exclusively by this pointer.
        self.pair.first().map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// Returns the raw pointer, or `None` if null.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        *self.pair.first()
    }

    /// Returns `true` if this pointer does not own anything.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.pair.first().is_none()
    }

    /// Returns the deleter.
    #[must_use]
    pub fn deleter(&self) -> &D {
        self.pair.second()
    }

    /// Returns the deleter mutably.
    #[must_use]
    pub fn deleter_mut(&mut self) -> &mut D {
        self.pair.second_mut()
    }

    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        trace!("tether UniquePtr applying deleter to {:p}", ptr);
        self.pair.second_mut().delete(ptr);
    }
}

impl<T, D: Deleter<[T]>> UniquePtr<[T], D> {
    /// Returns the number of elements in the owned slice, or zero if null.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pair.first().map_or(0, NonNull::len)
    }

    /// Returns `true` if the owned slice has no elements or this pointer is
    /// null.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null UniquePtr");
}

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, D: Deleter<T>> Deref for UniquePtr<T, D> {
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

impl<T, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    #[inline]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for UniquePtr<[T], D> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        match self.get() {
            Some(slice) => &slice[index],
            None => null_deref(),
        }
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for UniquePtr<[T], D> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut() {
            Some(slice) => &mut slice[index],
            None => null_deref(),
        }
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    /// Creates a null `UniquePtr`.
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<UniquePtr<T>> for SharedPtr<T> {
    /// Moves the object owned by a `UniquePtr` into a new control block.
    ///
    /// ```
    /// use tether::{SharedPtr, UniquePtr};
    ///
    /// let unique = UniquePtr::new(Box::new(3));
    /// let shared = SharedPtr::from(unique);
    /// assert_eq!(shared.use_count(), 1);
    /// assert_eq!(*shared, 3);
    /// ```
    fn from(mut unique: UniquePtr<T>) -> Self {
        match unique.release() {
            // SAFETY: `DefaultDelete` pointers come from `Box::into_raw`.
            Some(ptr) => unsafe { SharedPtr::from_raw(ptr.as_ptr()) },
            None => SharedPtr::null(),
        }
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Pointer for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&addr(*self.pair.first()), f)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use core::mem::size_of;
    use core::ptr::NonNull;
    use std::rc::Rc;

    use crate::{DefaultDelete, SharedPtr, UniquePtr};

    struct Noisy(Rc<Cell<usize>>);

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn noisy(drops: &Rc<Cell<usize>>) -> Box<Noisy> {
        Box::new(Noisy(Rc::clone(drops)))
    }

    #[test]
    fn default_deleter_adds_no_size() {
        assert_eq!(size_of::<UniquePtr<u64>>(), size_of::<*mut u64>());
        assert_eq!(size_of::<UniquePtr<[u64]>>(), size_of::<*mut [u64]>());
        assert_eq!(size_of::<DefaultDelete>(), 0);
    }

    #[test]
    fn drop_deletes_once() {
        let drops = Rc::new(Cell::new(0));
        let unique = UniquePtr::new(noisy(&drops));
        assert!(!unique.is_null());
        drop(unique);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn null_has_nothing_to_delete() {
        let mut unique = UniquePtr::<u8>::null();
        assert!(unique.is_null());
        assert!(unique.get().is_none());
        assert!(unique.release().is_none());
        unique.clear();
        assert!(UniquePtr::<u8>::default().is_null());
    }

    #[test]
    fn release_suppresses_deleter() {
        let drops = Rc::new(Cell::new(0));
        let mut unique = UniquePtr::new(noisy(&drops));
        let raw = unique.release().unwrap();
        assert!(unique.is_null());
        drop(unique);
        assert_eq!(drops.get(), 0);
        drop(unsafe { Box::from_raw(raw.as_ptr()) });
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_to_same_pointer_is_noop() {
        let drops = Rc::new(Cell::new(0));
        let mut unique = UniquePtr::new(noisy(&drops));
        let same = unique.as_ptr();
        unsafe {
            unique.reset(same);
        }
        assert_eq!(drops.get(), 0);
        assert_eq!(unique.as_ptr(), same);
        drop(unique);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_deletes_previous_object() {
        let drops = Rc::new(Cell::new(0));
        let mut unique = UniquePtr::new(noisy(&drops));
        let next = NonNull::new(Box::into_raw(noisy(&drops)));
        unsafe {
            unique.reset(next);
        }
        assert_eq!(drops.get(), 1);
        assert_eq!(unique.as_ptr(), next);
        unique.clear();
        assert_eq!(drops.get(), 2);
        assert!(unique.is_null());
    }

    #[test]
    fn assignment_deletes_overwritten_object() {
        let drops = Rc::new(Cell::new(0));
        let mut unique = UniquePtr::new(noisy(&drops));
        assert!(!unique.is_null());
        unique = UniquePtr::new(noisy(&drops));
        assert_eq!(drops.get(), 1);
        drop(unique);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn closure_deleter_runs_once_per_pointer() {
        let deletions = Cell::new(0);
        let deleter = |ptr: NonNull<u32>| {
            deletions.set(deletions.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };
        let first = NonNull::new(Box::into_raw(Box::new(1_u32)));
        let second = NonNull::new(Box::into_raw(Box::new(2_u32)));
        let mut unique = unsafe { UniquePtr::with_deleter(first, deleter) };
        assert_eq!(*unique, 1);
        unsafe {
            unique.reset(second);
        }
        assert_eq!(deletions.get(), 1);
        assert_eq!(*unique, 2);
        drop(unique);
        assert_eq!(deletions.get(), 2);
    }

    #[test]
    fn stateful_deleter_is_reachable() {
        struct Counting(usize);

        impl super::Deleter<u8> for Counting {
            unsafe fn delete(&mut self, ptr: NonNull<u8>) {
                self.0 += 1;
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }

        let raw = NonNull::new(Box::into_raw(Box::new(9_u8)));
        let mut unique = unsafe { UniquePtr::with_deleter(raw, Counting(0)) };
        assert_eq!(unique.deleter().0, 0);
        unique.clear();
        assert_eq!(unique.deleter().0, 1);
        unique.deleter_mut().0 = 10;
        assert_eq!(unique.deleter().0, 10);
    }

    #[test]
    fn slice_indexing() {
        let mut unique = UniquePtr::new(vec![1, 2, 3].into_boxed_slice());
        assert_eq!(unique.len(), 3);
        assert!(!unique.is_empty());
        unique[0] = 10;
        assert_eq!(unique[0], 10);
        assert_eq!(unique.get(), Some(&[10, 2, 3][..]));

        let empty = UniquePtr::<[i32]>::null();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn slice_index_out_of_bounds_panics() {
        let unique = UniquePtr::new(vec![1, 2, 3].into_boxed_slice());
        assert_eq!(unique[3], 0);
    }

    #[test]
    #[should_panic(expected = "dereferenced a null UniquePtr")]
    fn null_deref_panics() {
        let unique = UniquePtr::<i32>::null();
        assert_eq!(*unique, 0);
    }

    #[test]
    fn swap_exchanges_objects() {
        let mut a = UniquePtr::new(Box::new('a'));
        let mut b = UniquePtr::new(Box::new('b'));
        a.swap(&mut b);
        assert_eq!(*a, 'b');
        assert_eq!(*b, 'a');
    }

    #[test]
    fn into_shared() {
        let drops = Rc::new(Cell::new(0));
        let shared = SharedPtr::from(UniquePtr::new(noisy(&drops)));
        assert_eq!(shared.use_count(), 1);
        let again = shared.clone();
        drop(shared);
        assert_eq!(drops.get(), 0);
        drop(again);
        assert_eq!(drops.get(), 1);

        assert!(SharedPtr::from(UniquePtr::<u8>::null()).is_null());
    }

    #[test]
    fn into_box_gives_up_ownership() {
        let drops = Rc::new(Cell::new(0));
        let boxed = UniquePtr::new(noisy(&drops)).into_box();
        assert_eq!(drops.get(), 0);
        drop(boxed);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn debug_shows_object() {
        assert_eq!(format!("{:?}", UniquePtr::new(Box::new(5))), "5");
        assert_eq!(format!("{:?}", UniquePtr::<i32>::null()), "null");
    }

    #[test]
    fn unsized_objects_are_reached_through_get() {
        trait Tally {
            fn bump(&mut self) -> usize;
        }

        struct Counted(usize, Noisy);

        impl Tally for Counted {
            fn bump(&mut self) -> usize {
                self.0 += 1;
                self.0
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut tally: UniquePtr<dyn Tally> =
            UniquePtr::new(Box::new(Counted(0, Noisy(Rc::clone(&drops)))));
        assert_eq!(tally.get_mut().map(Tally::bump), Some(1));
        assert_eq!(tally.get_mut().map(Tally::bump), Some(2));
        drop(tally);
        assert_eq!(drops.get(), 1);

        let mut word: UniquePtr<str> = UniquePtr::new(Box::from("tether"));
        assert_eq!(word.get().map(str::len), Some(6));
        word.clear();
        assert!(word.get().is_none());
    }
}
