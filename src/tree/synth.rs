//! Synthesized subtree data, and the "sum" protocol built on top of it
//!
//! Every node in a [`Tree`] stores a piece of synthesized data, produced by the tree's
//! [`Synthesizer`] from the node's own value and the data of its two children. The tree keeps this
//! up to date after every change, so that each node's data always describes its entire subtree.
//!
//! The most common use is summing some scalar property of the values -- e.g. the byte length of
//! each chunk in a piece table. That's what [`Sum`] provides: declaring a [`SumProperty`] gives a
//! synthesizer that stores the node's own value of the property next to the total for the
//! subtree. With that, the [`IndexFinder`] can find the node covering an offset into the
//! concatenation of all properties in a single descent.
//!
//! Multiple synthesizers can be combined with a tuple; `(Sum<A>, Sum<B>)` tracks both properties,
//! with the data stored as the pair `(SumData<_>, SumData<_>)`.

use super::select::{FindSelector, NodeView};
use super::{NodeId, Tree};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::{Add, Sub};

/// The policy for producing a node's synthesized data
///
/// `synthesize` is called whenever a node or either of its children changes, with the children's
/// data already correct. It's expected to run in constant time.
pub trait Synthesizer<T> {
    type Data: Clone + Default;

    fn synthesize(value: &T, left: Option<&Self::Data>, right: Option<&Self::Data>) -> Self::Data;
}

/// A synthesizer for trees that don't need any synthesized data
pub struct NoSynth;

impl<T> Synthesizer<T> for NoSynth {
    type Data = ();

    fn synthesize(_value: &T, _left: Option<&()>, _right: Option<&()>) {}
}

/// A scalar property of a value, tracked by [`Sum`]
pub trait SumProperty<T> {
    /// The type of the property
    ///
    /// `Default` must give the additive identity, and values are expected to never be "negative"
    /// -- i.e. adding a value never produces something smaller.
    type Value: Copy + Default + Ord + Add<Output = Self::Value> + Sub<Output = Self::Value>;

    fn get(value: &T) -> Self::Value;
}

/// The data stored by [`Sum`]: the node-local value of the property, and its total over the
/// subtree
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SumData<V> {
    pub own: V,
    pub total: V,
}

/// A [`Synthesizer`] summing the [`SumProperty`] `P` over each subtree
pub struct Sum<P>(PhantomData<fn() -> P>);

impl<T, P: SumProperty<T>> Synthesizer<T> for Sum<P> {
    type Data = SumData<P::Value>;

    fn synthesize(value: &T, left: Option<&Self::Data>, right: Option<&Self::Data>) -> Self::Data {
        let own = P::get(value);
        let mut total = own;
        if let Some(l) = left {
            total = total + l.total;
        }
        if let Some(r) = right {
            total = total + r.total;
        }

        SumData { own, total }
    }
}

impl<T, A: Synthesizer<T>, B: Synthesizer<T>> Synthesizer<T> for (A, B) {
    type Data = (A::Data, B::Data);

    fn synthesize(value: &T, left: Option<&Self::Data>, right: Option<&Self::Data>) -> Self::Data {
        let a = A::synthesize(value, left.map(|d| &d.0), right.map(|d| &d.0));
        let b = B::synthesize(value, left.map(|d| &d.1), right.map(|d| &d.1));
        (a, b)
    }
}

/// A [`FindSelector`] locating the node whose range of a summed property contains a target
///
/// Treating the tree as the concatenation of each node's property, the node found is the one
/// covering the half-open range `[start, start + own)` that contains the target. After a
/// successful search, [`remaining`] gives the target's offset from the start of that node.
///
/// Because `project` is given the full synthesized data of each node, the same finder works with
/// any synthesizer that includes a [`Sum`] somewhere inside it.
///
/// [`remaining`]: Self::remaining
pub struct IndexFinder<V, F> {
    remaining: V,
    project: F,
}

impl<V: Copy, F> IndexFinder<V, F> {
    pub fn new(target: V, project: F) -> Self {
        IndexFinder {
            remaining: target,
            project,
        }
    }

    /// Returns how much of the target is left after the nodes that were skipped
    pub fn remaining(&self) -> V {
        self.remaining
    }
}

impl<T, D, V, F> FindSelector<T, D> for IndexFinder<V, F>
where
    V: Copy + Ord + Sub<Output = V>,
    F: Fn(&D) -> SumData<V>,
{
    fn select_find(&mut self, node: NodeView<'_, T, D>) -> Ordering {
        if let Some(l) = node.left {
            let left_total = (self.project)(l).total;
            if self.remaining < left_total {
                return Ordering::Less;
            }
            self.remaining = self.remaining - left_total;
        }

        let own = (self.project)(node.data).own;
        if self.remaining < own {
            return Ordering::Equal;
        }

        self.remaining = self.remaining - own;
        Ordering::Greater
    }
}

impl<T, S: Synthesizer<T>> Tree<T, S> {
    /// Returns the sum of a property over every node strictly before `id`, in order
    ///
    /// This is the inverse of the [`IndexFinder`]: for the node it finds, `prefix_sum` gives the
    /// start of the node's range.
    pub fn prefix_sum<V, F>(&self, id: NodeId, project: F) -> V
    where
        V: Copy + Default + Add<Output = V>,
        F: Fn(&S::Data) -> SumData<V>,
    {
        let mut sum = self.left(id).map(|l| project(self.data(l)).total).unwrap_or_default();

        let mut child = id;
        while let Some(parent) = self.parent(child) {
            if self.right(parent) == Some(child) {
                sum = sum + project(self.data(parent)).own;
                if let Some(l) = self.left(parent) {
                    sum = sum + project(self.data(l)).total;
                }
            }
            child = parent;
        }

        sum
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexFinder, Sum, SumData, SumProperty};
    use crate::tree::Tree;

    struct Len;

    impl SumProperty<&'static str> for Len {
        type Value = usize;

        fn get(value: &&'static str) -> usize {
            value.len()
        }
    }

    fn len_of(d: &SumData<usize>) -> SumData<usize> {
        *d
    }

    #[test]
    fn finds_covering_node() {
        let words = ["foo", "", "quux", "a", "bc"];
        let tree: Tree<&'static str, Sum<Len>> = Tree::build(words.iter().copied());
        tree.check_integrity();

        let text: String = words.concat();
        for target in 0..text.len() {
            let mut finder = IndexFinder::new(target, len_of);
            let id = tree.find_custom(&mut finder).expect("target is in range");

            let start = tree.prefix_sum(id, len_of);
            let word = *tree.get(id);
            assert!(!word.is_empty());
            assert_eq!(start + finder.remaining(), target);
            assert_eq!(word.as_bytes()[finder.remaining()], text.as_bytes()[target]);
        }

        let mut past_end = IndexFinder::new(text.len(), len_of);
        assert!(tree.find_custom(&mut past_end).is_none());
    }

    #[test]
    fn totals_follow_values() {
        let mut tree: Tree<&'static str, Sum<Len>> = Tree::build(vec!["ab", "cde", "f"]);
        assert_eq!(tree.root_data().map(|d| d.total), Some(6));

        let first = tree.first().unwrap();
        tree.update(first, |w| *w = "abcdefgh");
        tree.check_integrity();
        assert_eq!(tree.root_data().map(|d| d.total), Some(12));

        let last = tree.last().unwrap();
        tree.erase(last);
        tree.check_integrity();
        assert_eq!(tree.root_data().map(|d| d.total), Some(11));
    }
}
