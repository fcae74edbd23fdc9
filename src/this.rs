use core::cell::RefCell;
use core::fmt;

use crate::error::BadWeakPtr;
use crate::{SharedPtr, WeakPtr};

/// The hidden weak reference an object keeps to itself.
///
/// Embed a `WeakThis<Self>` in a type and implement [`EnableSharedFromThis`]
/// to let the type hand out [`SharedPtr`]s and [`WeakPtr`]s to itself from
/// inside its own methods.
///
/// A `WeakThis` starts out unlinked. It is linked by
/// [`SharedPtr::from_box_with_this`] or [`make_shared_with_this`], right after
/// the object is placed on the heap and before the `SharedPtr` is handed to
/// the caller. Linking an object again, after it was moved out with
/// [`SharedPtr::try_unwrap`], replaces the old link. Because the link is weak
/// it never keeps the object alive.
///
/// Cloning a `WeakThis` yields an unlinked one: a clone of an object is a new
/// object that no `SharedPtr` owns yet.
///
/// [`make_shared_with_this`]: crate::make_shared_with_this
pub struct WeakThis<T: ?Sized> {
    this: RefCell<WeakPtr<T>>,
}

impl<T: ?Sized> WeakThis<T> {
    /// Constructs an unlinked `WeakThis`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            this: RefCell::new(WeakPtr::new()),
        }
    }

    /// Returns `true` once a [`SharedPtr`] has taken ownership of the object.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.this.borrow().block.is_some()
    }

    /// Promotes the link to a [`SharedPtr`].
    ///
    /// # Errors
    ///
    /// Returns [`BadWeakPtr::Unlinked`] if no `SharedPtr` ever owned the
    /// object and [`BadWeakPtr::Expired`] if the object is being torn down.
    pub fn upgrade(&self) -> Result<SharedPtr<T>, BadWeakPtr> {
        if !self.is_linked() {
            debug!("tether shared_from_this called on an object no SharedPtr owns");
            return Err(BadWeakPtr::Unlinked);
        }
        SharedPtr::from_weak(&self.this.borrow())
    }

    /// Returns a copy of the link, or an expired [`WeakPtr`] if unlinked.
    #[must_use]
    pub fn downgrade(&self) -> WeakPtr<T> {
        self.this.borrow().clone()
    }

    fn link(&self, owner: &SharedPtr<T>) {
        let stale = self.this.replace(SharedPtr::downgrade(owner));
        if stale.block.is_some() {
            debug!("tether replaced the link of a re-adopted object");
        }
    }
}

impl<T: ?Sized> Default for WeakThis<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for WeakThis<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakThis<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakThis")
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// Mint [`SharedPtr`]s and [`WeakPtr`]s to `self` from inside `self`.
///
/// Implementors store a [`WeakThis<Self>`] and return it from
/// [`weak_this`]. The link is only set up when the object is created with
/// [`SharedPtr::from_box_with_this`] or [`make_shared_with_this`].
///
/// Calling [`shared_from_this`] on an object that lives on the stack or in a
/// [`UniquePtr`] is a programming error, reported as
/// [`BadWeakPtr::Unlinked`].
///
/// Only those two constructors link the object. [`SharedPtr::new`],
/// [`SharedPtr::from_box`], [`make_shared`] and converting a [`UniquePtr`]
/// into a `SharedPtr` take ownership without linking, and `shared_from_this`
/// on such an object also reports [`BadWeakPtr::Unlinked`].
///
/// [`make_shared`]: crate::make_shared
/// [`weak_this`]: EnableSharedFromThis::weak_this
/// [`shared_from_this`]: EnableSharedFromThis::shared_from_this
/// [`make_shared_with_this`]: crate::make_shared_with_this
/// [`UniquePtr`]: crate::UniquePtr
///
/// # Examples
///
/// ```
/// use tether::{make_shared_with_this, EnableSharedFromThis, SharedPtr, WeakThis};
///
/// struct Member {
///     this: WeakThis<Member>,
/// }
///
/// impl EnableSharedFromThis for Member {
///     fn weak_this(&self) -> &WeakThis<Self> {
///         &self.this
///     }
/// }
///
/// impl Member {
///     fn me(&self) -> SharedPtr<Member> {
///         self.shared_from_this().expect("members are always shared")
///     }
/// }
///
/// let member = make_shared_with_this(Member { this: WeakThis::new() });
/// let me = member.me();
/// assert_eq!(member.use_count(), 2);
/// drop(me);
/// assert_eq!(member.use_count(), 1);
///
/// // The stored link is weak: dropping the last strong owner destroys the
/// // member.
/// let weak = member.weak_from_this();
/// drop(member);
/// assert!(weak.expired());
/// ```
pub trait EnableSharedFromThis {
    /// Returns the [`WeakThis`] stored in `self`.
    fn weak_this(&self) -> &WeakThis<Self>;

    /// Returns a new [`SharedPtr`] that shares ownership of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`BadWeakPtr::Unlinked`] if `self` was never owned by a
    /// `SharedPtr` and [`BadWeakPtr::Expired`] if `self` is being dropped.
    fn shared_from_this(&self) -> Result<SharedPtr<Self>, BadWeakPtr> {
        self.weak_this().upgrade()
    }

    /// Returns a new [`WeakPtr`] to `self`. The result is expired if `self`
    /// was never owned by a `SharedPtr`.
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().downgrade()
    }
}

impl<T: ?Sized + EnableSharedFromThis> SharedPtr<T> {
    /// Takes ownership of a boxed value like [`SharedPtr::from_box`] and links
    /// the value's [`WeakThis`] to the new `SharedPtr`.
    ///
    /// ```
    /// use tether::{EnableSharedFromThis, SharedPtr, WeakThis};
    ///
    /// struct Job {
    ///     this: WeakThis<Job>,
    /// }
    ///
    /// impl EnableSharedFromThis for Job {
    ///     fn weak_this(&self) -> &WeakThis<Self> {
    ///         &self.this
    ///     }
    /// }
    ///
    /// let job = SharedPtr::from_box_with_this(Box::new(Job { this: WeakThis::new() }));
    /// assert_eq!(job.weak_count(), 1);
    /// assert!(job.shared_from_this().is_ok());
    /// ```
    #[must_use]
    pub fn from_box_with_this(value: Box<T>) -> Self {
        let this = Self::from_box(value);
        this.link_this();
        this
    }

    pub(crate) fn link_this(&self) {
        if let Some(value) = self.get() {
            value.weak_this().link(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use std::rc::Rc;

    use crate::{
        make_shared_with_this, BadWeakPtr, EnableSharedFromThis, SharedPtr, UniquePtr, WeakThis,
    };

    struct Node {
        this: WeakThis<Node>,
        drops: Rc<Cell<usize>>,
    }

    impl Node {
        fn new(drops: &Rc<Cell<usize>>) -> Self {
            Self {
                this: WeakThis::new(),
                drops: Rc::clone(drops),
            }
        }
    }

    impl EnableSharedFromThis for Node {
        fn weak_this(&self) -> &WeakThis<Self> {
            &self.this
        }
    }

    impl Drop for Node {
        fn drop(&mut self) {
            // Owned nodes are torn down with the strong count already at zero.
            assert!(self.shared_from_this().is_err());
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn teardown_sees_expired_link() {
        struct Watcher {
            this: WeakThis<Watcher>,
            seen: Rc<Cell<Option<BadWeakPtr>>>,
        }

        impl EnableSharedFromThis for Watcher {
            fn weak_this(&self) -> &WeakThis<Self> {
                &self.this
            }
        }

        impl Drop for Watcher {
            fn drop(&mut self) {
                self.seen.set(self.shared_from_this().err());
                assert!(self.weak_from_this().lock().is_null());
            }
        }

        let seen = Rc::new(Cell::new(None));
        let watcher = make_shared_with_this(Watcher {
            this: WeakThis::new(),
            seen: Rc::clone(&seen),
        });
        drop(watcher);
        assert_eq!(seen.get(), Some(BadWeakPtr::Expired));
    }

    #[test]
    fn shared_from_this_adds_one_owner() {
        let drops = Rc::new(Cell::new(0));
        let node = make_shared_with_this(Node::new(&drops));
        let before = node.use_count();
        let again = node.shared_from_this().unwrap();
        assert_eq!(again.use_count(), before + 1);
        assert!(node == again);
        drop(again);
        drop(node);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn link_is_weak() {
        let drops = Rc::new(Cell::new(0));
        let node = SharedPtr::from_box_with_this(Box::new(Node::new(&drops)));
        assert_eq!(node.use_count(), 1);
        assert_eq!(node.weak_count(), 1);
        let weak = node.weak_from_this();
        assert_eq!(node.weak_count(), 2);
        drop(node);
        assert_eq!(drops.get(), 1);
        assert!(weak.expired());
    }

    #[test]
    fn stack_value_is_unlinked() {
        let drops = Rc::new(Cell::new(0));
        let node = Node::new(&drops);
        assert!(!node.this.is_linked());
        assert_eq!(node.shared_from_this().err(), Some(BadWeakPtr::Unlinked));
        assert!(node.weak_from_this().expired());
        drop(node);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn unique_value_is_unlinked() {
        let drops = Rc::new(Cell::new(0));
        let node = UniquePtr::new(Box::new(Node::new(&drops)));
        assert_eq!(node.shared_from_this().err(), Some(BadWeakPtr::Unlinked));
        drop(node);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn plain_constructors_do_not_link() {
        let drops = Rc::new(Cell::new(0));
        let node = SharedPtr::new(Node::new(&drops));
        assert!(!node.this.is_linked());
        assert_eq!(node.shared_from_this().err(), Some(BadWeakPtr::Unlinked));
        let boxed = SharedPtr::from_box(Box::new(Node::new(&drops)));
        assert_eq!(boxed.shared_from_this().err(), Some(BadWeakPtr::Unlinked));
        let converted = SharedPtr::from(UniquePtr::new(Box::new(Node::new(&drops))));
        assert_eq!(converted.shared_from_this().err(), Some(BadWeakPtr::Unlinked));
        drop((node, boxed, converted));
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn unwrapped_value_can_be_shared_again() {
        let drops = Rc::new(Cell::new(0));
        let first = make_shared_with_this(Node::new(&drops));
        let Ok(node) = SharedPtr::try_unwrap(first) else {
            panic!("sole owner must unwrap");
        };
        assert_eq!(node.shared_from_this().err(), Some(BadWeakPtr::Expired));

        let second = make_shared_with_this(node);
        let again = second.shared_from_this().unwrap();
        assert!(second == again);
        assert_eq!(second.use_count(), 2);
        assert_eq!(second.weak_count(), 1);
        drop(again);

        let Ok(node) = SharedPtr::try_unwrap(second) else {
            panic!("sole owner must unwrap");
        };
        let third = SharedPtr::from_box_with_this(Box::new(node));
        assert!(third.shared_from_this().unwrap() == third);
        drop(third);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn cloned_link_is_unlinked() {
        let drops = Rc::new(Cell::new(0));
        let node = make_shared_with_this(Node::new(&drops));
        assert!(node.this.is_linked());
        assert!(!node.this.clone().is_linked());
    }
}
