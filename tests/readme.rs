use std::cell::RefCell;

use tether::{SharedPtr, WeakPtr};

struct Node {
    parent: RefCell<WeakPtr<Node>>,
    children: RefCell<Vec<SharedPtr<Node>>>,
    data: i32,
}

impl Node {
    fn new(data: i32) -> SharedPtr<Self> {
        SharedPtr::new(Node {
            parent: RefCell::new(WeakPtr::new()),
            children: RefCell::new(Vec::new()),
            data,
        })
    }
}

#[test]
fn readme() {
    let root = Node::new(123);
    let leaf = Node::new(456);

    // the parent owns the child and the child observes the parent
    *leaf.parent.borrow_mut() = SharedPtr::downgrade(&root);
    root.children.borrow_mut().push(SharedPtr::clone(&leaf));

    let parent = leaf.parent.borrow().lock();
    // this prints:
    //
    // > leaf 456 has parent 123
    println!("leaf {} has parent {}", leaf.data, parent.data);
    assert_eq!(parent.data, 123);
    drop(parent);

    assert_eq!(root.use_count(), 1);
    assert_eq!(leaf.use_count(), 2);

    drop(root);
    // The root is deallocated, and the leaf now observes an expired parent.
    assert!(leaf.parent.borrow().expired());
    assert_eq!(leaf.use_count(), 1);
}
