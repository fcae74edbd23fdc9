#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::inline_always)]
#![allow(clippy::option_if_let_else)]
#![allow(unknown_lints)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]

//! Single-threaded ownership handles backed by an explicit control block.
//!
//! Tether provides three pointer types over heap objects:
//!
//! - [`UniquePtr<T, D>`] owns its object exclusively and disposes of it with
//!   a pluggable [`Deleter`] policy when dropped or reset.
//! - [`SharedPtr<T>`] shares ownership of its object. Cloning a `SharedPtr`
//!   bumps the strong count in the object's control block; the object is
//!   dropped exactly once, when the last `SharedPtr` goes away.
//! - [`WeakPtr<T>`] observes an object owned by `SharedPtr`s without keeping
//!   it alive. [`WeakPtr::lock`] yields a `SharedPtr` while the object is
//!   still around and a null `SharedPtr` afterward.
//!
//! [`UniquePtr<T, D>`]: crate::UniquePtr
//! [`SharedPtr<T>`]: crate::SharedPtr
//! [`WeakPtr<T>`]: crate::WeakPtr
//!
//! # Control blocks
//!
//! Every non-null `SharedPtr` is backed by a control block holding the strong
//! and weak counts and a type-erased destroyer for the object. The block is
//! created when a `SharedPtr` first takes ownership of an object and is freed
//! when both counts drop to zero, which can be well after the object itself
//! was dropped.
//!
//! [`SharedPtr::from_box`] allocates the control block next to an existing
//! `Box`. [`SharedPtr::new`] and [`make_shared`] place the control block and
//! the object in a single allocation instead.
//!
//! Because the control block owns the destroyer, a `SharedPtr` may front a
//! different pointer than the one it keeps alive. [`SharedPtr::project`]
//! hands out a pointer to a field of the owned object that keeps the whole
//! object alive.
//!
//! # Shared from this
//!
//! Types that embed a [`WeakThis`] and implement [`EnableSharedFromThis`] can
//! mint `SharedPtr`s to themselves from inside their own methods, provided
//! they were created with [`make_shared_with_this`] or
//! [`SharedPtr::from_box_with_this`]. The stored reference is weak, so it
//! never keeps the object alive.
//!
//! # Tether vs. `std::rc`
//!
//! `SharedPtr` and `WeakPtr` play the roles of [`std::rc::Rc`] and
//! [`std::rc::Weak`]. The differences:
//!
//! - Handles may be null. Null handles own nothing and never allocate.
//! - Equality, ordering and hashing of `SharedPtr` compare addresses, not
//!   values.
//! - A `SharedPtr` can alias a part of the object it owns.
//! - Weak promotion is available both as [`WeakPtr::lock`], which returns a
//!   null pointer on expiry, and [`SharedPtr::from_weak`], which returns a
//!   [`BadWeakPtr`] error.
//!
//! Like [`std::rc`], [`SharedPtr`] and [`WeakPtr`] are not `Send` and are not
//! `Sync`. Cycles of `SharedPtr`s leak; break them with `WeakPtr`s.
//!
//! [`std::rc`]: https://doc.rust-lang.org/stable/std/rc/index.html
//! [`std::rc::Rc`]: https://doc.rust-lang.org/stable/std/rc/struct.Rc.html
//! [`std::rc::Weak`]: https://doc.rust-lang.org/stable/std/rc/struct.Weak.html
//!
//! # Crate features
//!
//! - **std** - Enabled by default. Implements [`std::error::Error`] for
//!   [`BadWeakPtr`].

#![doc(html_root_url = "https://docs.rs/tether/0.1.0")]

// Ensure code blocks in README.md compile
#[cfg(doctest)]
#[doc = include_str!("../README.md")]
mod readme {}

extern crate alloc;
#[macro_use]
extern crate log;

mod block;
mod destroy;
mod drop;
mod error;
mod make;
mod pair;
mod shared;
mod this;
mod unique;
mod weak;

// Doc modules
#[cfg(any(doctest, docsrs))]
#[path = "doc/implementing_self_referential_data_structures.rs"]
/// Examples of implementing self-referential data structures with Tether.
pub mod implementing_self_referential_data_structures;

pub use error::BadWeakPtr;
pub use make::{make_shared, make_shared_with_this};
pub use shared::SharedPtr;
pub use this::{EnableSharedFromThis, WeakThis};
pub use unique::{DefaultDelete, Deleter, UniquePtr};
pub use weak::WeakPtr;
