use alloc::alloc::{dealloc, Layout};
use core::cell::Cell;
use core::fmt;
use core::ptr::{self, NonNull};
use std::process::abort;

use crate::destroy::{self, Adapter, Destroy};

/// How the memory behind a [`ControlBlock`] was obtained, which decides how
/// it is given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Allocation {
    /// The block was boxed on its own; the payload lives in a separate `Box`.
    Separate,
    /// The block, its destroyer and the payload share one buffer with this
    /// layout.
    Combined(Layout),
}

/// Shared bookkeeping for all `SharedPtr`s and `WeakPtr`s of one object.
///
/// `strong` counts live `SharedPtr`s and `weak` counts live `WeakPtr`s. When
/// `strong` reaches zero the payload is torn down; when both counts are zero
/// the block itself is freed by whichever handle observed it.
pub(crate) struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>,
    destroyer: Cell<Option<NonNull<dyn Destroy>>>,
    allocation: Allocation,
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("strong", &self.strong.get())
            .field("weak", &self.weak.get())
            .field("allocation", &self.allocation)
            .finish()
    }
}

impl ControlBlock {
    /// Allocate a block that takes ownership of a boxed payload. The strong
    /// count starts at one.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Box::into_raw`] and must not be owned by
    /// anything else.
    pub(crate) unsafe fn adopt<X: ?Sized>(ptr: NonNull<X>) -> NonNull<Self> {
        let adapter: Box<dyn Destroy + '_> = Box::new(Adapter::new(ptr));
        let destroyer = destroy::erase(NonNull::new_unchecked(Box::into_raw(adapter)));
        let block = Box::new(Self {
            strong: Cell::new(1),
            weak: Cell::new(0),
            destroyer: Cell::new(Some(destroyer)),
            allocation: Allocation::Separate,
        });
        NonNull::from(Box::leak(block))
    }

    /// Build the block of a single-allocation `SharedPtr`. The strong count
    /// starts at one.
    ///
    /// `destroyer` must live in the same buffer, which has `layout`.
    pub(crate) const fn combined(destroyer: NonNull<dyn Destroy>, layout: Layout) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(0),
            destroyer: Cell::new(Some(destroyer)),
            allocation: Allocation::Combined(layout),
        }
    }

    #[inline]
    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    #[inline]
    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    #[inline]
    pub(crate) fn is_single_allocation(&self) -> bool {
        matches!(self.allocation, Allocation::Combined(_))
    }

    #[inline]
    pub(crate) fn increase_strong(&self) {
        // We want to abort on overflow instead of dropping the value.
        let strong = self.strong();
        if strong == usize::MAX {
            abort();
        }
        self.strong.set(strong + 1);
    }

    /// Give up one strong reference, tearing the payload down if it was the
    /// last one.
    ///
    /// Returns `true` if the block is now unreferenced and must be released
    /// with [`ControlBlock::free`].
    #[must_use]
    pub(crate) fn decrease_strong(&self) -> bool {
        let strong = self.strong();
        if strong == 1 {
            self.strong.set(0);
            // The payload may own weak handles into this very block, like the
            // link stored in a `WeakThis`. Hold an extra weak reference while
            // it is torn down so dropping those never frees the block.
            self.increase_weak();
            unsafe {
                self.destroy_payload();
            }
            self.weak.set(self.weak() - 1);
        } else {
            self.strong.set(strong.saturating_sub(1));
        }
        self.strong() == 0 && self.weak() == 0
    }

    #[inline]
    pub(crate) fn increase_weak(&self) {
        // We want to abort on overflow instead of dropping the value.
        let weak = self.weak();
        if weak == usize::MAX {
            abort();
        }
        self.weak.set(weak + 1);
    }

    /// Give up one weak reference.
    ///
    /// Returns `true` if the block is now unreferenced and must be released
    /// with [`ControlBlock::free`].
    #[must_use]
    #[inline]
    pub(crate) fn decrease_weak(&self) -> bool {
        self.weak.set(self.weak().saturating_sub(1));
        self.strong() == 0 && self.weak() == 0
    }

    /// Detach the payload at `ptr` with `layout` from this block so that the
    /// final strong release does not destroy it.
    ///
    /// # Safety
    ///
    /// The strong count must be nonzero.
    pub(crate) unsafe fn release_payload(&self, ptr: *const u8, layout: Layout) -> bool {
        match self.destroyer.get() {
            Some(destroyer) => (*destroyer.as_ptr()).release(ptr, layout),
            None => false,
        }
    }

    unsafe fn destroy_payload(&self) {
        let Some(destroyer) = self.destroyer.take() else {
            return;
        };
        match self.allocation {
            Allocation::Separate => {
                trace!("tether deallocating payload of control block {:p}", self);
                Box::from_raw(destroyer.as_ptr()).deallocate();
            }
            Allocation::Combined(_) => {
                trace!("tether destructing in-place payload of control block {:p}", self);
                let destroyer = destroyer.as_ptr();
                (*destroyer).destruct();
                ptr::drop_in_place(destroyer);
            }
        }
    }

    /// Release the memory of an unreferenced block.
    ///
    /// # Safety
    ///
    /// Both counts must be zero, as reported by `decrease_strong` or
    /// `decrease_weak`, and `block` must not be used afterward.
    pub(crate) unsafe fn free(block: NonNull<Self>) {
        match block.as_ref().allocation {
            Allocation::Separate => {
                trace!("tether deallocating separate control block {:p}", block);
                drop(Box::from_raw(block.as_ptr()));
            }
            Allocation::Combined(layout) => {
                trace!(
                    "tether deallocating single-allocation buffer {:p} of {} bytes",
                    block,
                    layout.size()
                );
                dealloc(block.as_ptr().cast(), layout);
            }
        }
    }

    /// Drop one strong reference held by a handle.
    ///
    /// # Safety
    ///
    /// The caller must own a strong reference to `block`.
    #[inline]
    pub(crate) unsafe fn drop_strong(block: NonNull<Self>) {
        if block.as_ref().decrease_strong() {
            Self::free(block);
        }
    }

    /// Drop one weak reference held by a handle.
    ///
    /// # Safety
    ///
    /// The caller must own a weak reference to `block`.
    #[inline]
    pub(crate) unsafe fn drop_weak(block: NonNull<Self>) {
        if block.as_ref().decrease_weak() {
            Self::free(block);
        }
    }
}
