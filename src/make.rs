use alloc::alloc::{alloc, handle_alloc_error, Layout};
use core::ptr::{self, NonNull};

use crate::block::ControlBlock;
use crate::destroy::{self, Adapter, Destroy};
use crate::this::EnableSharedFromThis;
use crate::SharedPtr;

/// The single allocation behind [`SharedPtr::new`].
///
/// `repr(C)` pins `block` at offset zero, so a pointer to the block is also a
/// pointer to the whole buffer.
#[repr(C)]
struct Combined<T> {
    block: ControlBlock,
    destroyer: Adapter<T>,
    value: T,
}

impl<T> SharedPtr<T> {
    /// Constructs a new `SharedPtr<T>` with a single allocation.
    ///
    /// The control block, the type-erased destroyer and `value` are placed
    /// side by side in one heap buffer. When the last strong reference is
    /// dropped, `value` is dropped in place; the buffer is freed once no
    /// [`WeakPtr`] refers to it either.
    ///
    /// [`WeakPtr`]: crate::WeakPtr
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// let five = SharedPtr::new(5);
    /// assert_eq!(*five, 5);
    /// assert_eq!(five.use_count(), 1);
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        let layout = Layout::new::<Combined<T>>();
        unsafe {
            // `layout` is never zero-sized because it contains a block.
            let Some(buffer) = NonNull::new(alloc(layout).cast::<Combined<T>>()) else {
                handle_alloc_error(layout)
            };
            let buffer = buffer.as_ptr();

            let value_ptr = ptr::addr_of_mut!((*buffer).value);
            value_ptr.write(value);
            let value_ptr = NonNull::new_unchecked(value_ptr);

            let destroyer_ptr = ptr::addr_of_mut!((*buffer).destroyer);
            destroyer_ptr.write(Adapter::new(value_ptr));
            let destroyer: NonNull<dyn Destroy + '_> = NonNull::new_unchecked(destroyer_ptr);

            let block_ptr = ptr::addr_of_mut!((*buffer).block);
            block_ptr.write(ControlBlock::combined(destroy::erase(destroyer), layout));

            trace!(
                "tether placed block, destroyer and value in one buffer {:p} of {} bytes",
                buffer,
                layout.size()
            );
            Self::from_parts(value_ptr, NonNull::new_unchecked(block_ptr))
        }
    }
}

/// Constructs a `SharedPtr<T>` with a single allocation.
///
/// This is the same as [`SharedPtr::new`].
///
/// ```
/// use tether::make_shared;
///
/// let greeting = make_shared(String::from("hello"));
/// assert_eq!(greeting.len(), 5);
/// ```
#[must_use]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

/// Constructs a `SharedPtr<T>` with a single allocation and links the
/// value's [`WeakThis`] to it, enabling [`shared_from_this`].
///
/// [`WeakThis`]: crate::WeakThis
/// [`shared_from_this`]: EnableSharedFromThis::shared_from_this
///
/// # Examples
///
/// ```
/// use tether::{make_shared_with_this, EnableSharedFromThis, WeakThis};
///
/// struct Session {
///     this: WeakThis<Session>,
/// }
///
/// impl EnableSharedFromThis for Session {
///     fn weak_this(&self) -> &WeakThis<Self> {
///         &self.this
///     }
/// }
///
/// let session = make_shared_with_this(Session { this: WeakThis::new() });
/// let again = session.shared_from_this().unwrap();
/// assert!(session == again);
/// assert_eq!(session.use_count(), 2);
/// ```
#[must_use]
pub fn make_shared_with_this<T: EnableSharedFromThis>(value: T) -> SharedPtr<T> {
    let this = SharedPtr::new(value);
    this.link_this();
    this
}
