use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};

/// Type-erased teardown for the payload of a [`ControlBlock`].
///
/// The control block does not know the type of the object it keeps alive.
/// It holds one of these instead, built once when the first `SharedPtr` to
/// the object is created.
///
/// [`ControlBlock`]: crate::block::ControlBlock
pub(crate) trait Destroy {
    /// Drop the payload and free its `Box` allocation, then free the boxed
    /// destroyer itself.
    ///
    /// # Safety
    ///
    /// The destroyer must have been allocated with `Box`. Unless released,
    /// the payload must be live and must have been allocated with `Box`.
    unsafe fn deallocate(self: Box<Self>);

    /// Run the payload's destructor in place without freeing any memory.
    ///
    /// # Safety
    ///
    /// Unless released, the payload must be live. It is dead afterward.
    unsafe fn destruct(&mut self);

    /// Forget the payload without destroying it, provided `ptr` and `layout`
    /// identify the payload this destroyer owns. Returns whether the payload
    /// was released.
    ///
    /// # Safety
    ///
    /// Unless already released, the payload must be live.
    unsafe fn release(&mut self, ptr: *const u8, layout: Layout) -> bool;
}

/// The one [`Destroy`] implementation: a typed pointer to the payload.
pub(crate) struct Adapter<X: ?Sized> {
    ptr: Option<NonNull<X>>,
}

impl<X: ?Sized> Adapter<X> {
    #[inline]
    pub(crate) const fn new(ptr: NonNull<X>) -> Self {
        Self { ptr: Some(ptr) }
    }
}

impl<X: ?Sized> Destroy for Adapter<X> {
    unsafe fn deallocate(self: Box<Self>) {
        if let Some(ptr) = self.ptr {
            drop(Box::from_raw(ptr.as_ptr()));
        }
    }

    unsafe fn destruct(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            ptr::drop_in_place(ptr.as_ptr());
        }
    }

    unsafe fn release(&mut self, ptr: *const u8, layout: Layout) -> bool {
        let Some(owned) = self.ptr else {
            return false;
        };
        let same_address = ptr::eq(owned.as_ptr().cast::<u8>().cast_const(), ptr);
        if !same_address || Layout::for_value(owned.as_ref()) != layout {
            return false;
        }
        self.ptr = None;
        true
    }
}

/// Widen the lifetime of a destroyer so it can be stored in a control block,
/// which is not generic over the payload.
///
/// # Safety
///
/// The destroyer must not be used after `'a` ends. Handles carry a
/// `PhantomData` of the payload type, so every handle, and with it every use
/// of the control block, is confined to the payload's lifetime.
#[inline]
pub(crate) unsafe fn erase<'a>(destroyer: NonNull<dyn Destroy + 'a>) -> NonNull<dyn Destroy> {
    mem::transmute::<NonNull<dyn Destroy + 'a>, NonNull<dyn Destroy>>(destroyer)
}
