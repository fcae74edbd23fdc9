use crate::block::ControlBlock;
use crate::SharedPtr;

impl<T: ?Sized> Drop for SharedPtr<T> {
    /// Drops the [`SharedPtr`].
    ///
    /// This will decrement the strong reference count. If the strong reference
    /// count reaches zero then the only other references (if any) are
    /// [`WeakPtr`], so we `drop` the inner value.
    ///
    /// [`WeakPtr`]: crate::WeakPtr
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::SharedPtr;
    ///
    /// struct Foo;
    ///
    /// impl Drop for Foo {
    ///     fn drop(&mut self) {
    ///         println!("dropped!");
    ///     }
    /// }
    ///
    /// let foo  = SharedPtr::new(Foo);
    /// let foo2 = SharedPtr::clone(&foo);
    ///
    /// drop(foo);    // Doesn't print anything
    /// drop(foo2);   // Prints "dropped!"
    /// ```
    ///
    /// # Teardown and Deallocation
    ///
    /// The last strong reference tears the value down through the type-erased
    /// destroyer stored in the control block. How that happens depends on how
    /// the `SharedPtr` was created:
    ///
    /// - [`SharedPtr::from_box`] and [`SharedPtr::from_raw`] allocate the
    ///   control block separately from the value. The value's `Box` is dropped
    ///   and freed right away.
    /// - [`SharedPtr::new`] places the control block, the destroyer and the
    ///   value in one buffer. The value is dropped in place and the buffer stays
    ///   allocated for as long as any [`WeakPtr`] still refers to the control
    ///   block. The buffer is then freed with a single deallocation.
    ///
    /// In both cases the control block is freed exactly once, by whichever
    /// handle, strong or weak, is dropped last.
    ///
    /// A value may hold weak references to itself, for example through a
    /// [`WeakThis`]. The control block is pinned while the value is torn down,
    /// so dropping those references never frees the block out from under the
    /// teardown, and [`WeakPtr::lock`] called from the value's `Drop` returns a
    /// null pointer instead of resurrecting it.
    ///
    /// [`WeakPtr::lock`]: crate::WeakPtr::lock
    /// [`WeakThis`]: crate::WeakThis
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe {
                ControlBlock::drop_strong(block);
            }
        }
    }
}
