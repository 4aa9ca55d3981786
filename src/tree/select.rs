//! Customization points for descending through a [`Tree`]
//!
//! There are two kinds of descent: insertion, where a [`BranchSelector`] picks which child to move
//! into until an empty slot is found, and searching, where a [`FindSelector`] makes a three-way
//! decision at each node. Both are given only what they need to make the decision -- the values
//! involved, and (for searching) the synthesized data of the node and its children.
//!
//! [`Tree`]: super::Tree

use std::cmp::Ordering;
use std::marker::PhantomData;

/// One of the two child slots of a node
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A policy for choosing where a new value is placed by [`Tree::insert_with`]
///
/// [`Tree::insert_with`]: super::Tree::insert_with
pub trait BranchSelector<T> {
    /// Returns which child of the node holding `current` the descent for `inserting` should
    /// continue into
    fn select_insert(&mut self, current: &T, inserting: &T) -> Side;
}

/// The view of a single node given to a [`FindSelector`]
pub struct NodeView<'a, T, D> {
    pub value: &'a T,
    /// The synthesized data of the node itself, covering its whole subtree
    pub data: &'a D,
    pub left: Option<&'a D>,
    pub right: Option<&'a D>,
}

/// A policy for searching with [`Tree::find_custom`]
///
/// At each node, `select_find` returns `Less` to continue into the left subtree, `Greater` for
/// the right subtree, or `Equal` if the node is the one being searched for. The selector is
/// allowed to update its own state as it goes; the [`IndexFinder`] uses this to keep track of how
/// much of its target remains after skipping subtrees.
///
/// [`Tree::find_custom`]: super::Tree::find_custom
/// [`IndexFinder`]: super::IndexFinder
pub trait FindSelector<T, D> {
    fn select_find(&mut self, node: NodeView<'_, T, D>) -> Ordering;
}

/// A [`BranchSelector`] that keeps the tree ordered by the values' implementation of `Ord`
///
/// Values equal to an existing one are placed after it.
pub struct ByOrd;

impl<T: Ord> BranchSelector<T> for ByOrd {
    fn select_insert(&mut self, current: &T, inserting: &T) -> Side {
        match inserting < current {
            true => Side::Left,
            false => Side::Right,
        }
    }
}

/// A [`FindSelector`] for trees ordered with [`ByOrd`], searching for a value equal to the key
pub struct KeyFinder<'k, K, T> {
    key: &'k K,
    marker: PhantomData<fn(&T)>,
}

impl<'k, K, T> KeyFinder<'k, K, T> {
    pub fn new(key: &'k K) -> Self {
        KeyFinder {
            key,
            marker: PhantomData,
        }
    }
}

impl<K, T, D> FindSelector<T, D> for KeyFinder<'_, K, T>
where
    T: PartialOrd<K>,
{
    fn select_find(&mut self, node: NodeView<'_, T, D>) -> Ordering {
        // `partial_cmp` gives the ordering of the node relative to the key, which is the reverse
        // of the direction we need to go in.
        match node.value.partial_cmp(self.key) {
            Some(Ordering::Less) => Ordering::Greater,
            Some(Ordering::Greater) => Ordering::Less,
            Some(Ordering::Equal) => Ordering::Equal,
            None => panic!("`KeyFinder` requires a total order between values and keys"),
        }
    }
}
