//! Association tree: the binding table of a single scope frame.
//!
//! An unbalanced binary search tree keyed by symbol text (plain lexicographic
//! `str` ordering). Each node owns a [`Slot`], a shared mutable cell holding the
//! bound value. Lookups hand out the slot itself rather than a copy of the
//! value, which is what makes `set!` visible to every closure that captured the
//! frame.
//!
//! Redefinition of a key that is already present overwrites the existing slot
//! in place: descent compares against every node on the path and stops at an
//! exact match. The tree is never rebalanced and entries are never removed.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::Value;

/// A shared, mutable binding cell
pub type Slot = Rc<RefCell<Value>>;

#[derive(Debug)]
struct Node {
    key: Rc<str>,
    slot: Slot,
    left: AssocTree,
    right: AssocTree,
}

/// One scope frame's bindings
#[derive(Debug, Default)]
pub struct AssocTree {
    root: Option<Box<Node>>,
}

impl AssocTree {
    pub fn new() -> Self {
        AssocTree { root: None }
    }

    /// Build a frame from positional `(name, value)` bindings
    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (Rc<str>, Value)>,
    {
        let mut tree = AssocTree::new();
        for (key, value) in bindings {
            tree.insert(key, value);
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Find the slot bound to `key`
    pub fn find(&self, key: &str) -> Option<Slot> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left.root.as_deref(),
                Ordering::Greater => node.right.root.as_deref(),
                Ordering::Equal => return Some(Rc::clone(&node.slot)),
            };
        }
        None
    }

    /// Bind `key` to `value` and return the slot holding it. An existing
    /// binding for the same key is overwritten in place.
    pub fn insert(&mut self, key: Rc<str>, value: Value) -> Slot {
        let mut link = &mut self.root;
        while let Some(node) = link {
            match key.as_ref().cmp(&node.key) {
                Ordering::Less => link = &mut node.left.root,
                Ordering::Greater => link = &mut node.right.root,
                Ordering::Equal => {
                    *node.slot.borrow_mut() = value;
                    return Rc::clone(&node.slot);
                }
            }
        }
        let slot = Rc::new(RefCell::new(value));
        *link = Some(Box::new(Node {
            key,
            slot: Rc::clone(&slot),
            left: AssocTree::new(),
            right: AssocTree::new(),
        }));
        slot
    }

    /// In-order traversal: bindings sorted by key
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }
}

// Sorted definitions degenerate the tree into a list, so teardown walks it
// with an explicit stack.
impl Drop for AssocTree {
    fn drop(&mut self) {
        let mut pending: Vec<Box<Node>> = self.root.take().into_iter().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.left.root.take());
            pending.extend(node.right.root.take());
        }
    }
}

/// In-order iterator over `(key, slot)` pairs
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.root.as_deref();
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Slot);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.root.as_deref());
        Some((&*node.key, &node.slot))
    }
}
