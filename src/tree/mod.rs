//! Wrapper module for [`Tree`], an augmented red-black tree
//!
//! The tree is intended as a building block: it imposes no ordering of its own. Values are placed
//! either by a [`BranchSelector`] (e.g. [`ByOrd`], for a classic sorted tree) or positionally,
//! relative to an existing node with [`insert_before`] and [`insert_after`]. Every node also
//! carries the data produced by the tree's [`Synthesizer`], which describes the node's entire
//! subtree and is kept up to date through all rotations and value changes. Searching is done with
//! a [`FindSelector`], which gets to look at that data while descending; that's what makes
//! order-statistics queries (through [`IndexFinder`]) run in logarithmic time.
//!
//! Nodes are stored in an arena owned by the tree and referred to by [`NodeId`]s. An id stays
//! valid (and refers to the same value) until that node is erased, regardless of any other
//! insertions or removals. Using an id after its node has been erased is a logic error; it will
//! either panic or refer to some unrelated node.
//!
//! [`insert_before`]: Tree::insert_before
//! [`insert_after`]: Tree::insert_after

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt::Debug;
use std::marker::PhantomData;

mod select;
mod synth;

pub use select::{BranchSelector, ByOrd, FindSelector, KeyFinder, NodeView, Side};
pub use synth::{IndexFinder, NoSynth, Sum, SumData, SumProperty, Synthesizer};

/// A handle to a single node in a [`Tree`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

struct Node<T, D> {
    value: T,
    data: D,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    color: Color,
}

/// A red-black tree with synthesized subtree data
///
/// For more information, refer to the [module-level documentation](self).
pub struct Tree<T, S: Synthesizer<T>> {
    nodes: Vec<Option<Node<T, S::Data>>>,
    // Slots in `nodes` that are currently empty, available for reuse
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
    marker: PhantomData<fn() -> S>,
}

impl Side {
    fn flip(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl<T, S: Synthesizer<T>> Default for Tree<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: Synthesizer<T>> Tree<T, S> {
    /// Creates a new, empty tree
    pub fn new() -> Self {
        Tree {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            marker: PhantomData,
        }
    }

    /// Constructs a balanced tree from the values, keeping their order
    ///
    /// This runs in linear time, which makes it the preferred way to create a tree from existing
    /// values.
    pub fn build<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut values: Vec<Option<T>> = values.into_iter().map(Some).collect();
        let mut tree = Tree::new();
        if values.is_empty() {
            return tree;
        }

        // A median split gives a tree where every level except possibly the deepest is full. The
        // nodes on that deepest, partial level are colored red, which gives every path the same
        // number of black nodes.
        let n = values.len();
        let red_depth = (usize::BITS - 1 - (n + 1).leading_zeros()) as usize;

        tree.nodes.reserve(n);
        tree.root = tree.build_range(&mut values, 0, red_depth);
        tree.len = n;
        tree
    }

    fn build_range(
        &mut self,
        values: &mut [Option<T>],
        depth: usize,
        red_depth: usize,
    ) -> Option<NodeId> {
        if values.is_empty() {
            return None;
        }

        let mid = values.len() / 2;
        let left = self.build_range(&mut values[..mid], depth + 1, red_depth);
        let right = self.build_range(&mut values[mid + 1..], depth + 1, red_depth);

        let value = values[mid].take().expect("each value is placed exactly once");
        let data = S::synthesize(
            &value,
            left.map(|l| &self.node(l).data),
            right.map(|r| &self.node(r).data),
        );

        let color = match depth == red_depth {
            true => Color::Red,
            false => Color::Black,
        };

        let id = self.alloc(Node {
            value,
            data,
            parent: None,
            left,
            right,
            color,
        });

        for child in left.into_iter().chain(right) {
            self.node_mut(child).parent = Some(id);
        }

        Some(id)
    }

    /// Returns the number of values in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes all values from the tree, invalidating every [`NodeId`]
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the synthesized data for the entire tree, if there's anything in it
    pub fn root_data(&self) -> Option<&S::Data> {
        self.root.map(|r| &self.node(r).data)
    }

    fn node(&self, id: NodeId) -> &Node<T, S::Data> {
        self.nodes[id.idx()].as_ref().expect("dangling node handle")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T, S::Data> {
        self.nodes[id.idx()].as_mut().expect("dangling node handle")
    }

    /// Returns a reference to the value of the node
    ///
    /// ## Panics
    ///
    /// This method panics if the node has been erased.
    pub fn get(&self, id: NodeId) -> &T {
        &self.node(id).value
    }

    /// Returns a mutable reference to the value of the node
    ///
    /// Any change that affects the synthesized data must be followed by a call to [`refresh`],
    /// before the tree is used for anything else. [`update`] does both.
    ///
    /// [`refresh`]: Self::refresh
    /// [`update`]: Self::update
    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.node_mut(id).value
    }

    /// Re-synthesizes the data for the node and all of its ancestors
    pub fn refresh(&mut self, id: NodeId) {
        self.refresh_path(Some(id));
    }

    /// Modifies the value of the node in place, refreshing the synthesized data afterwards
    pub fn update<R>(&mut self, id: NodeId, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.node_mut(id).value);
        self.refresh(id);
        result
    }

    /// Returns the synthesized data of the subtree rooted at the node
    pub fn data(&self, id: NodeId) -> &S::Data {
        &self.node(id).data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    fn child(&self, id: NodeId, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.node(id).left,
            Side::Right => self.node(id).right,
        }
    }

    fn set_child(&mut self, id: NodeId, side: Side, child: Option<NodeId>) {
        let node = self.node_mut(id);
        match side {
            Side::Left => node.left = child,
            Side::Right => node.right = child,
        }
    }

    /// Returns which child of `parent` the node `child` is
    fn side_of(&self, parent: NodeId, child: Option<NodeId>) -> Side {
        match self.node(parent).left == child {
            true => Side::Left,
            false => Side::Right,
        }
    }

    /// Returns the first node in the tree, in order
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|r| self.extreme(r, Side::Left))
    }

    /// Returns the last node in the tree, in order
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|r| self.extreme(r, Side::Right))
    }

    /// Returns the furthest node in the subtree, following children on `side`
    fn extreme(&self, mut id: NodeId, side: Side) -> NodeId {
        while let Some(c) = self.child(id, side) {
            id = c;
        }
        id
    }

    /// Returns the node immediately after this one, in order
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.step(id, Side::Right)
    }

    /// Returns the node immediately before this one, in order
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.step(id, Side::Left)
    }

    fn step(&self, id: NodeId, side: Side) -> Option<NodeId> {
        if let Some(c) = self.child(id, side) {
            return Some(self.extreme(c, side.flip()));
        }

        let mut child = id;
        let mut parent = self.parent(id);
        while let Some(p) = parent {
            if self.child(p, side) != Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.parent(p);
        }

        None
    }

    /// Produces an in-order iterator over the values in the tree, alongside their ids
    pub fn iter(&self) -> Iter<T, S> {
        Iter {
            tree: self,
            next: self.first(),
            remaining: self.len,
        }
    }

    /// Searches the tree, returning the node the selector settles on
    ///
    /// For the meaning of the selector's decisions, see [`FindSelector`].
    pub fn find_custom<F: FindSelector<T, S::Data>>(&self, selector: &mut F) -> Option<NodeId> {
        let mut current = self.root;

        while let Some(id) = current {
            let node = self.node(id);
            let view = NodeView {
                value: &node.value,
                data: &node.data,
                left: node.left.map(|l| &self.node(l).data),
                right: node.right.map(|r| &self.node(r).data),
            };

            current = match selector.select_find(view) {
                Ordering::Less => node.left,
                Ordering::Equal => return Some(id),
                Ordering::Greater => node.right,
            };
        }

        None
    }

    /// Finds a node with a value equal to the key, in a tree ordered by [`ByOrd`]
    pub fn find<K>(&self, key: &K) -> Option<NodeId>
    where
        T: PartialOrd<K>,
    {
        self.find_custom(&mut KeyFinder::new(key))
    }

    /// Inserts the value at the position chosen by the selector, returning the new node
    pub fn insert_with<B: BranchSelector<T>>(&mut self, selector: &mut B, value: T) -> NodeId {
        let mut parent = None;
        let mut side = Side::Left;
        let mut current = self.root;

        while let Some(id) = current {
            side = selector.select_insert(&self.node(id).value, &value);
            parent = Some(id);
            current = self.child(id, side);
        }

        self.link_leaf(parent, side, value)
    }

    /// Inserts the value immediately before the given node, or at the end if `at` is `None`
    pub fn insert_before(&mut self, at: Option<NodeId>, value: T) -> NodeId {
        match at {
            None => match self.last() {
                Some(last) => self.link_leaf(Some(last), Side::Right, value),
                None => self.link_leaf(None, Side::Left, value),
            },
            Some(id) => match self.left(id) {
                None => self.link_leaf(Some(id), Side::Left, value),
                Some(l) => {
                    let parent = self.extreme(l, Side::Right);
                    self.link_leaf(Some(parent), Side::Right, value)
                }
            },
        }
    }

    /// Inserts the value immediately after the given node, or at the start if `at` is `None`
    pub fn insert_after(&mut self, at: Option<NodeId>, value: T) -> NodeId {
        match at {
            None => match self.first() {
                Some(first) => self.link_leaf(Some(first), Side::Left, value),
                None => self.link_leaf(None, Side::Left, value),
            },
            Some(id) => match self.right(id) {
                None => self.link_leaf(Some(id), Side::Right, value),
                Some(r) => {
                    let parent = self.extreme(r, Side::Left);
                    self.link_leaf(Some(parent), Side::Left, value)
                }
            },
        }
    }

    /// Removes the node from the tree, returning its value
    ///
    /// The ids of all other nodes remain valid.
    pub fn erase(&mut self, id: NodeId) -> T {
        let (left, right) = (self.left(id), self.right(id));

        // `x` is the node that moves into the position of the one that was physically removed
        // from its place. It's tracked alongside its parent because it may be nil.
        let (x, x_parent, removed_color) = match (left, right) {
            (None, _) => {
                let parent = self.parent(id);
                self.transplant(id, right);
                (right, parent, self.node(id).color)
            }
            (Some(_), None) => {
                let parent = self.parent(id);
                self.transplant(id, left);
                (left, parent, self.node(id).color)
            }
            (Some(l), Some(r)) => {
                // Splice the in-order successor into the node's place. The successor is moved,
                // not copied, so that no ids change.
                let succ = self.extreme(r, Side::Left);
                let succ_color = self.node(succ).color;
                let x = self.right(succ);

                let x_parent = if self.parent(succ) == Some(id) {
                    succ
                } else {
                    let parent = self.parent(succ);
                    self.transplant(succ, x);
                    self.node_mut(succ).right = Some(r);
                    self.node_mut(r).parent = Some(succ);
                    parent.expect("successor below the right child has a parent")
                };

                self.transplant(id, Some(succ));
                self.node_mut(succ).left = Some(l);
                self.node_mut(l).parent = Some(succ);
                let color = self.node(id).color;
                self.node_mut(succ).color = color;

                (x, Some(x_parent), succ_color)
            }
        };

        self.refresh_path(x_parent);
        if removed_color == Color::Black {
            self.erase_fixup(x, x_parent);
        }

        self.len -= 1;
        self.free(id)
    }

    fn alloc(&mut self, node: Node<T, S::Data>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.idx()] = Some(node);
                id
            }
            None => {
                let id = u32::try_from(self.nodes.len()).expect("tree node count overflowed");
                self.nodes.push(Some(node));
                NodeId(id)
            }
        }
    }

    fn free(&mut self, id: NodeId) -> T {
        let node = self.nodes[id.idx()].take().expect("dangling node handle");
        self.free.push(id);
        node.value
    }

    fn synthesize(&mut self, id: NodeId) {
        let node = self.node(id);
        let data = S::synthesize(
            &node.value,
            node.left.map(|l| &self.node(l).data),
            node.right.map(|r| &self.node(r).data),
        );
        self.node_mut(id).data = data;
    }

    fn refresh_path(&mut self, mut current: Option<NodeId>) {
        while let Some(id) = current {
            self.synthesize(id);
            current = self.parent(id);
        }
    }

    /// Replaces `old` as the child of `parent` with `new`, where a `parent` of `None` refers to
    /// the root
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let side = self.side_of(p, Some(old));
                self.set_child(p, side, new);
            }
        }
    }

    /// Replaces the subtree at `old` with the one at `new`
    fn transplant(&mut self, old: NodeId, new: Option<NodeId>) {
        let parent = self.parent(old);
        self.replace_child(parent, old, new);
        if let Some(n) = new {
            self.node_mut(n).parent = parent;
        }
    }

    /// Rotates the tree around `x`, so that `x` moves down to become the `side` child of its
    /// current child on the opposite side
    fn rotate(&mut self, x: NodeId, side: Side) {
        let other = side.flip();
        let y = self.child(x, other).expect("rotation requires a child to move up");

        let inner = self.child(y, side);
        self.set_child(x, other, inner);
        if let Some(i) = inner {
            self.node_mut(i).parent = Some(x);
        }

        let parent = self.parent(x);
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, Some(y));

        self.set_child(y, side, Some(x));
        self.node_mut(x).parent = Some(y);

        // `x` is now below `y`, so it has to go first. Everything above `y` covers the same set
        // of values as before.
        self.synthesize(x);
        self.synthesize(y);
    }

    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.map(|i| self.node(i).color == Color::Red).unwrap_or(false)
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        self.node_mut(id).color = color;
    }

    fn link_leaf(&mut self, parent: Option<NodeId>, side: Side, value: T) -> NodeId {
        let data = S::synthesize(&value, None, None);
        let id = self.alloc(Node {
            value,
            data,
            parent,
            left: None,
            right: None,
            color: Color::Red,
        });

        match parent {
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(id);
            }
            Some(p) => {
                debug_assert!(self.child(p, side).is_none());
                self.set_child(p, side, Some(id));
            }
        }

        self.refresh_path(parent);
        self.insert_fixup(id);
        self.len += 1;
        id
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while let Some(p) = self.parent(z).filter(|&p| self.is_red(Some(p))) {
            let g = self.parent(p).expect("red node is never the root");
            let side = self.side_of(g, Some(p));

            match self.child(g, side.flip()).filter(|&u| self.is_red(Some(u))) {
                Some(uncle) => {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                }
                None => {
                    let mut p = p;
                    if self.child(p, side.flip()) == Some(z) {
                        self.rotate(p, side);
                        z = p;
                        p = self.parent(z).expect("rotated node has a parent");
                    }

                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate(g, side.flip());
                }
            }
        }

        if let Some(r) = self.root {
            self.set_color(r, Color::Black);
        }
    }

    fn erase_fixup(&mut self, mut x: Option<NodeId>, mut parent: Option<NodeId>) {
        while x != self.root && !self.is_red(x) {
            let p = match parent {
                Some(p) => p,
                None => break,
            };

            let side = self.side_of(p, x);
            let other = side.flip();
            let mut w = self.child(p, other).expect("doubly black node has a sibling");

            if self.is_red(Some(w)) {
                self.set_color(w, Color::Black);
                self.set_color(p, Color::Red);
                self.rotate(p, side);
                w = self.child(p, other).expect("doubly black node has a sibling");
            }

            let (near, far) = (self.child(w, side), self.child(w, other));
            if !self.is_red(near) && !self.is_red(far) {
                self.set_color(w, Color::Red);
                x = Some(p);
                parent = self.parent(p);
                continue;
            }

            if !self.is_red(far) {
                if let Some(n) = near {
                    self.set_color(n, Color::Black);
                }
                self.set_color(w, Color::Red);
                self.rotate(w, other);
                w = self.child(p, other).expect("doubly black node has a sibling");
            }

            let color = self.node(p).color;
            self.set_color(w, color);
            self.set_color(p, Color::Black);
            if let Some(f) = self.child(w, other) {
                self.set_color(f, Color::Black);
            }
            self.rotate(p, side);
            x = self.root;
            break;
        }

        if let Some(x) = x {
            self.set_color(x, Color::Black);
        }
    }

    /// Checks that the internal structure of the tree is valid
    ///
    /// This checks parent links, red-black coloring, and that every node's synthesized data
    /// matches what would be produced from its value and children.
    ///
    /// ## Panics
    ///
    /// This method panics on the first problem found.
    pub fn check_integrity(&self)
    where
        S::Data: PartialEq + Debug,
    {
        let count = match self.root {
            None => 0,
            Some(r) => {
                assert!(self.parent(r).is_none(), "root has a parent");
                assert_eq!(self.node(r).color, Color::Black, "root is red");
                self.check_subtree(r).0
            }
        };

        assert_eq!(count, self.len, "tree length is out of sync");
        assert_eq!(
            self.nodes.len() - self.free.len(),
            self.len,
            "arena has leaked nodes"
        );
    }

    /// Returns the number of nodes in the subtree, and its black height
    fn check_subtree(&self, id: NodeId) -> (usize, usize)
    where
        S::Data: PartialEq + Debug,
    {
        let node = self.node(id);
        let mut count = 1;
        let mut heights = [1, 1];

        for (i, child) in [node.left, node.right].iter().enumerate() {
            if let Some(c) = *child {
                assert_eq!(self.parent(c), Some(id), "broken parent link");
                if node.color == Color::Red {
                    assert_eq!(self.node(c).color, Color::Black, "red node has a red child");
                }

                let (n, h) = self.check_subtree(c);
                count += n;
                heights[i] = h;
            }
        }

        assert_eq!(heights[0], heights[1], "unequal black heights");

        let expected = S::synthesize(
            &node.value,
            node.left.map(|l| &self.node(l).data),
            node.right.map(|r| &self.node(r).data),
        );
        assert_eq!(node.data, expected, "stale synthesized data");

        let own = match node.color {
            Color::Black => 1,
            Color::Red => 0,
        };
        (count, heights[0] + own)
    }
}

/// An in-order iterator over the values of a [`Tree`]
///
/// This is created by the [`iter`](Tree::iter) method.
pub struct Iter<'a, T, S: Synthesizer<T>> {
    tree: &'a Tree<T, S>,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a, T, S: Synthesizer<T>> Iterator for Iter<'a, T, S> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.tree.next(id);
        self.remaining -= 1;
        Some((id, self.tree.get(id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::{ByOrd, IndexFinder, NoSynth, NodeId, Sum, SumData, SumProperty, Tree};
    use itertools::Itertools;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    struct Count;

    impl SumProperty<u32> for Count {
        type Value = usize;

        fn get(_: &u32) -> usize {
            1
        }
    }

    type CountTree = Tree<u32, Sum<Count>>;

    fn count_of(d: &SumData<usize>) -> SumData<usize> {
        *d
    }

    fn values<S: super::Synthesizer<u32>>(tree: &Tree<u32, S>) -> Vec<u32> {
        tree.iter().map(|(_, v)| *v).collect()
    }

    fn nth(tree: &CountTree, idx: usize) -> Option<NodeId> {
        tree.find_custom(&mut IndexFinder::new(idx, count_of))
    }

    #[test]
    fn sorted_insertion_any_order() {
        for order in (0..6_u32).permutations(6) {
            let mut tree: Tree<u32, NoSynth> = Tree::new();
            for &v in &order {
                tree.insert_with(&mut ByOrd, v);
                tree.check_integrity();
            }

            assert_eq!(values(&tree), (0..6).collect::<Vec<_>>());
            for v in 0..6 {
                let id = tree.find(&v).expect("value was inserted");
                assert_eq!(*tree.get(id), v);
            }
            assert!(tree.find(&6).is_none());
        }
    }

    #[test]
    fn erase_any_order() {
        for order in (0..6_u32).permutations(6) {
            let mut tree: CountTree = Tree::build(0..6);
            let mut remaining: Vec<u32> = (0..6).collect();

            for &v in &order {
                let id = tree.find(&v).expect("value not yet erased");
                assert_eq!(tree.erase(id), v);
                tree.check_integrity();

                remaining.retain(|&r| r != v);
                assert_eq!(values(&tree), remaining);
            }

            assert!(tree.is_empty());
            assert!(tree.root().is_none());
        }
    }

    #[test]
    fn build_is_balanced() {
        for n in 0..130 {
            let tree: CountTree = Tree::build(0..n);
            tree.check_integrity();
            assert_eq!(tree.len(), n as usize);
            assert_eq!(values(&tree), (0..n).collect::<Vec<_>>());
            assert_eq!(tree.root_data().map(|d| d.total).unwrap_or(0), n as usize);
        }
    }

    #[test]
    fn next_and_prev() {
        let tree: CountTree = Tree::build(0..20);
        let forward: Vec<_> = std::iter::successors(tree.first(), |&id| tree.next(id))
            .map(|id| *tree.get(id))
            .collect();
        let backward: Vec<_> = std::iter::successors(tree.last(), |&id| tree.prev(id))
            .map(|id| *tree.get(id))
            .collect();

        assert_eq!(forward, (0..20).collect::<Vec<_>>());
        assert_eq!(backward, (0..20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn positional_insertion() {
        let mut tree: CountTree = Tree::new();
        let b = tree.insert_before(None, 1);
        let d = tree.insert_before(None, 3);
        tree.insert_after(None, 0);
        tree.insert_after(Some(b), 2);
        tree.insert_before(Some(d), 100);
        tree.insert_after(Some(d), 4);
        tree.check_integrity();

        assert_eq!(values(&tree), vec![0, 1, 2, 100, 3, 4]);
    }

    #[test]
    fn ids_survive_other_changes() {
        let mut tree: CountTree = Tree::build(0..50);
        let ids: Vec<_> = tree.iter().map(|(id, _)| id).collect();

        // Erase every other node; the remaining ids must still refer to the same values
        for id in ids.iter().step_by(2) {
            tree.erase(*id);
        }
        tree.check_integrity();

        for (i, id) in ids.iter().enumerate().skip(1).step_by(2) {
            assert_eq!(*tree.get(*id), i as u32);
        }
    }

    #[test]
    fn random_operations_match_vec() {
        let mut rng = SmallRng::seed_from_u64(0x7265_6462_6c61_636b);
        let mut tree: CountTree = Tree::new();
        let mut model: Vec<u32> = Vec::new();

        for step in 0..2000_u32 {
            let erase = !model.is_empty() && rng.gen_ratio(2, 5);
            if erase {
                let idx = rng.gen_range(0..model.len());
                let id = nth(&tree, idx).expect("index is in bounds");
                assert_eq!(tree.erase(id), model.remove(idx));
            } else if rng.gen_bool(0.5) {
                let idx = rng.gen_range(0..=model.len());
                tree.insert_before(nth(&tree, idx), step);
                model.insert(idx, step);
            } else {
                let idx = rng.gen_range(0..=model.len());
                let at = idx.checked_sub(1).and_then(|i| nth(&tree, i));
                tree.insert_after(at, step);
                model.insert(idx, step);
            }

            tree.check_integrity();
            assert_eq!(tree.len(), model.len());
        }

        assert_eq!(values(&tree), model);
        for (i, v) in model.iter().enumerate() {
            let id = nth(&tree, i).unwrap();
            assert_eq!(tree.get(id), v);
            assert_eq!(tree.prefix_sum(id, count_of), i);
        }
    }

    #[test]
    fn clear_resets() {
        let mut tree: CountTree = Tree::build(0..10);
        tree.clear();
        tree.check_integrity();
        assert!(tree.is_empty());
        assert!(tree.first().is_none());

        tree.insert_before(None, 7);
        tree.check_integrity();
        assert_eq!(values(&tree), vec![7]);
    }
}
