//! `Tether` can be used to implement data structures whose members refer to
//! each other without leaking.
//!
//! A strong reference cycle of [`SharedPtr`]s is never freed. The structures
//! below own their members in one direction only and point back with
//! [`WeakPtr`]s.
//!
//! [`SharedPtr`]: crate::SharedPtr
//! [`WeakPtr`]: crate::WeakPtr
//!
//! # Doubly-linked List
//!
//! The following implements a doubly-linked list that is fully deallocated once
//! the `list` binding is dropped. Every node owns its successor and observes
//! its predecessor.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::iter;
//!
//! use tether::{SharedPtr, WeakPtr};
//!
//! struct Node<T> {
//!     pub prev: WeakPtr<RefCell<Self>>,
//!     pub next: SharedPtr<RefCell<Self>>,
//!     pub data: T,
//! }
//!
//! struct List<T> {
//!     pub head: SharedPtr<RefCell<Node<T>>>,
//! }
//!
//! impl<T> List<T> {
//!     fn pop(&mut self) -> Option<SharedPtr<RefCell<Node<T>>>> {
//!         if self.head.is_null() {
//!             return None;
//!         }
//!         let head = std::mem::take(&mut self.head);
//!         let next = std::mem::take(&mut head.borrow_mut().next);
//!         if let Some(next) = next.get() {
//!             next.borrow_mut().prev.reset();
//!         }
//!         self.head = next;
//!         Some(head)
//!     }
//! }
//!
//! impl<T> From<Vec<T>> for List<T> {
//!     fn from(list: Vec<T>) -> Self {
//!         let mut head = SharedPtr::null();
//!         for data in list.into_iter().rev() {
//!             let node = SharedPtr::new(RefCell::new(Node {
//!                 prev: WeakPtr::new(),
//!                 next: head,
//!                 data,
//!             }));
//!             if let Some(next) = node.borrow().next.get() {
//!                 next.borrow_mut().prev = SharedPtr::downgrade(&node);
//!             }
//!             head = node;
//!         }
//!         Self { head }
//!     }
//! }
//!
//! let list = iter::repeat(())
//!     .map(|_| "a".repeat(1024 * 1024))
//!     .take(10)
//!     .collect::<Vec<_>>();
//! let mut list = List::from(list);
//!
//! let head = list.pop().unwrap();
//! assert_eq!(head.use_count(), 1);
//! assert!(head.borrow().data.starts_with('a'));
//!
//! // The new head of the list is owned once, by the list itself, and
//! // observed once, by the `prev` pointer of its successor.
//! assert_eq!(list.head.use_count(), 1);
//! assert_eq!(list.head.weak_count(), 1);
//!
//! // The popped head is no longer part of the list and can be safely dropped
//! // and deallocated.
//! let weak = SharedPtr::downgrade(&head);
//! drop(head);
//! assert!(weak.lock().is_null());
//!
//! drop(list);
//! // all memory consumed by the list nodes is reclaimed.
//! ```
//!
//! Dropping a long list this way recurses once per node. Lists with many
//! thousands of nodes should unlink them in a loop, the way `pop` does.
//!
//! # Tree with Parent Links
//!
//! Nodes that know their own [`SharedPtr`] can register themselves with their
//! parent. [`make_shared_with_this`] links each node's [`WeakThis`] before
//! the node is handed out.
//!
//! [`make_shared_with_this`]: crate::make_shared_with_this
//! [`WeakThis`]: crate::WeakThis
//!
//! ```rust
//! use std::cell::RefCell;
//!
//! use tether::{make_shared_with_this, EnableSharedFromThis, SharedPtr, WeakPtr, WeakThis};
//!
//! struct Dir {
//!     this: WeakThis<Dir>,
//!     name: String,
//!     parent: RefCell<WeakPtr<Dir>>,
//!     children: RefCell<Vec<SharedPtr<Dir>>>,
//! }
//!
//! impl EnableSharedFromThis for Dir {
//!     fn weak_this(&self) -> &WeakThis<Self> {
//!         &self.this
//!     }
//! }
//!
//! impl Dir {
//!     fn new(name: &str) -> SharedPtr<Dir> {
//!         make_shared_with_this(Dir {
//!             this: WeakThis::new(),
//!             name: name.to_string(),
//!             parent: RefCell::new(WeakPtr::new()),
//!             children: RefCell::new(Vec::new()),
//!         })
//!     }
//!
//!     fn mkdir(&self, name: &str) -> SharedPtr<Dir> {
//!         let child = Dir::new(name);
//!         *child.parent.borrow_mut() = self.weak_from_this();
//!         self.children.borrow_mut().push(child.clone());
//!         child
//!     }
//!
//!     fn path(&self) -> String {
//!         match SharedPtr::from_weak(&*self.parent.borrow()) {
//!             Ok(parent) => format!("{}/{}", parent.path(), self.name),
//!             Err(_) => self.name.clone(),
//!         }
//!     }
//! }
//!
//! let root = Dir::new("");
//! let usr = root.mkdir("usr");
//! let bin = usr.mkdir("bin");
//! assert_eq!(bin.path(), "/usr/bin");
//!
//! // Each directory is owned by its parent and by the local binding.
//! assert_eq!(usr.use_count(), 2);
//! // Each directory is observed by its own `WeakThis` and by its children.
//! assert_eq!(usr.weak_count(), 2);
//!
//! drop(usr);
//! drop(root);
//! // `bin` outlives its ancestors and now has no parent.
//! assert_eq!(bin.path(), "bin");
//! ```
