#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;

use tether::{SharedPtr, UniquePtr};

struct Slot {
    drops: Rc<Cell<usize>>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[test]
fn unique_ownership() {
    env_logger::Builder::from_env("TETHER_LOG").init();

    let drops = Rc::new(Cell::new(0));
    let deletions = Cell::new(0);

    // A pool that hands out slots and takes them back through the deleter.
    let returned: RefCell<Vec<Box<Slot>>> = RefCell::new(Vec::new());
    let deleter = |ptr: NonNull<Slot>| {
        deletions.set(deletions.get() + 1);
        returned.borrow_mut().push(unsafe { Box::from_raw(ptr.as_ptr()) });
    };

    let slot = Box::into_raw(Box::new(Slot {
        drops: Rc::clone(&drops),
    }));
    let mut unique = unsafe { UniquePtr::with_deleter(NonNull::new(slot), deleter) };

    // release hands the object back without running the deleter
    let released = unique.release();
    assert!(unique.is_null());
    assert_eq!(deletions.get(), 0);

    unsafe {
        unique.reset(released);
        // resetting to the owned pointer is a no-op
        unique.reset(released);
    }
    assert_eq!(deletions.get(), 0);

    let next = Box::into_raw(Box::new(Slot {
        drops: Rc::clone(&drops),
    }));
    unsafe {
        unique.reset(NonNull::new(next));
    }
    assert_eq!(deletions.get(), 1);
    assert_eq!(returned.borrow().len(), 1);
    assert_eq!(drops.get(), 0);

    drop(unique);
    assert_eq!(deletions.get(), 2);
    returned.borrow_mut().clear();
    assert_eq!(drops.get(), 2);

    // boxed slices are indexed
    let mut samples = UniquePtr::new(vec![0.5_f64; 16].into_boxed_slice());
    samples[15] = 1.5;
    assert_eq!(samples.len(), 16);
    assert!((samples[15] - 1.5).abs() < f64::EPSILON);

    // ownership can be handed over to a `SharedPtr`
    let counted = UniquePtr::new(Box::new(Slot {
        drops: Rc::clone(&drops),
    }));
    let shared = SharedPtr::from(counted);
    let weak = SharedPtr::downgrade(&shared);
    drop(shared);
    assert!(weak.expired());
    assert_eq!(drops.get(), 3);
}
