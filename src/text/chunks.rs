//! Wrapper module for [`ChunkTree`]

use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use crate::tree::{IndexFinder, NodeId, Sum, SumData, SumProperty, Tree};

/// The bounds on the sizes of chunks in a [`ChunkTree`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkLimits {
    /// The maximum number of bytes in a single chunk
    pub max_chunk_size: usize,
    /// Adjacent chunks are merged whenever their combined length is below this
    pub merge_threshold: usize,
}

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4096;

impl Default for ChunkLimits {
    fn default() -> Self {
        ChunkLimits {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            merge_threshold: DEFAULT_MAX_CHUNK_SIZE / 2,
        }
    }
}

impl ChunkLimits {
    /// Creates a new set of limits
    ///
    /// ## Panics
    ///
    /// This function panics if `max_chunk_size` is zero or `merge_threshold` is larger than it.
    pub fn new(max_chunk_size: usize, merge_threshold: usize) -> Self {
        assert!(max_chunk_size > 0, "chunks must be allowed to hold at least one byte");
        assert!(
            merge_threshold <= max_chunk_size,
            "merge threshold {} exceeds the maximum chunk size {}",
            merge_threshold,
            max_chunk_size,
        );

        ChunkLimits {
            max_chunk_size,
            merge_threshold,
        }
    }
}

/// A single piece of the text, along with the cached number of line breaks inside it
///
/// Chunks stored in a [`ChunkTree`] are never empty.
#[derive(Clone, Default)]
struct Chunk {
    bytes: Vec<u8>,
    newlines: usize,
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

impl Chunk {
    fn from_slice(bytes: &[u8]) -> Chunk {
        Chunk {
            bytes: bytes.to_vec(),
            newlines: count_newlines(bytes),
        }
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Splits the chunk in two, returning everything from `at` onwards
    fn split_off(&mut self, at: usize) -> Chunk {
        let bytes = self.bytes.split_off(at);
        let newlines = count_newlines(&bytes);
        self.newlines -= newlines;
        Chunk { bytes, newlines }
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
        self.newlines += count_newlines(bytes);
    }

    fn append(&mut self, other: Chunk) {
        self.bytes.extend(other.bytes);
        self.newlines += other.newlines;
    }

    fn remove_range(&mut self, range: Range<usize>) {
        self.newlines -= self.bytes.drain(range).filter(|&b| b == b'\n').count();
    }

    fn truncate(&mut self, len: usize) {
        self.remove_range(len..self.len());
    }

    fn remove_prefix(&mut self, len: usize) {
        self.remove_range(0..len);
    }
}

struct ByteLength;
struct LineBreaks;

impl SumProperty<Chunk> for ByteLength {
    type Value = usize;

    fn get(chunk: &Chunk) -> usize {
        chunk.len()
    }
}

impl SumProperty<Chunk> for LineBreaks {
    type Value = usize;

    fn get(chunk: &Chunk) -> usize {
        chunk.newlines
    }
}

type ChunkSynth = (Sum<ByteLength>, Sum<LineBreaks>);
type ChunkData = (SumData<usize>, SumData<usize>);

fn byte_sum(data: &ChunkData) -> SumData<usize> {
    data.0
}

fn line_sum(data: &ChunkData) -> SumData<usize> {
    data.1
}

/// The byte-wise storage for the content of a buffer
///
/// Internally, the bytes are split into chunks of bounded size (see: [`ChunkLimits`]), each stored
/// as a node in a [`Tree`] that tracks the total number of bytes and line breaks in every subtree.
/// Finding the chunk containing a particular byte (or line) is therefore `O(log(k))` for `k`
/// chunks, as are insertions and removals that only touch a few chunks.
///
/// Small neighboring chunks are merged back together after every change, so that the number of
/// chunks remains proportional to the length of the text, not the number of edits.
pub struct ChunkTree {
    tree: Tree<Chunk, ChunkSynth>,
    limits: ChunkLimits,
}

/// (*Internal*) A resolved byte position
///
/// `node` is `None` only for the position immediately after the last byte.
#[derive(Copy, Clone, Debug)]
struct Position {
    node: Option<NodeId>,
    offset: usize,
    chunk_start: usize,
}

impl Default for ChunkTree {
    fn default() -> Self {
        ChunkTree::new(ChunkLimits::default())
    }
}

impl Debug for ChunkTree {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ChunkTree")
            .field("len", &self.len())
            .field("chunks", &self.chunk_count())
            .field("limits", &self.limits)
            .finish()
    }
}

impl ChunkTree {
    /// Creates a new, empty `ChunkTree`
    pub fn new(limits: ChunkLimits) -> Self {
        ChunkTree {
            tree: Tree::new(),
            limits,
        }
    }

    /// Constructs a `ChunkTree` holding the bytes, splitting them into full chunks
    pub fn from_bytes(bytes: &[u8], limits: ChunkLimits) -> Self {
        let chunks = bytes.chunks(limits.max_chunk_size).map(Chunk::from_slice);

        ChunkTree {
            tree: Tree::build(chunks),
            limits,
        }
    }

    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    /// Returns the total length of the text, in bytes
    pub fn len(&self) -> usize {
        self.tree.root_data().map(|d| byte_sum(d).total).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of chunks the text is currently split into
    pub fn chunk_count(&self) -> usize {
        self.tree.len()
    }

    /// Produces an iterator over the chunks, as byte slices
    pub fn chunks(&self) -> impl '_ + Iterator<Item = &[u8]> {
        self.tree.iter().map(|(_, c)| c.bytes.as_slice())
    }

    /// Copies the entire text into a single vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.chunks().for_each(|c| out.extend_from_slice(c));
        out
    }

    /// (*Internal*) Finds the chunk containing the byte at `pos`
    ///
    /// ## Panics
    ///
    /// This method panics if `pos` is greater than the length of the text.
    fn locate(&self, pos: usize) -> Position {
        let len = self.len();
        assert!(
            pos <= len,
            "index out of bounds: the len is {} but the index is {}",
            len,
            pos
        );

        let mut finder = IndexFinder::new(pos, byte_sum);
        match self.tree.find_custom(&mut finder) {
            Some(node) => Position {
                node: Some(node),
                offset: finder.remaining(),
                chunk_start: pos - finder.remaining(),
            },
            None => Position {
                node: None,
                offset: 0,
                chunk_start: pos,
            },
        }
    }

    /// Returns an iterator positioned at the byte with the given index
    ///
    /// The index may be equal to the length of the text, in which case the iterator is at the
    /// end.
    ///
    /// ## Panics
    ///
    /// This method panics if `pos` is greater than the length of the text.
    pub fn at(&self, pos: usize) -> Iter {
        let p = self.locate(pos);

        Iter {
            chunks: self,
            node: p.node,
            offset: p.offset,
            chunk_start: p.chunk_start,
        }
    }

    /// Copies out the bytes between the two iterators
    ///
    /// ## Panics
    ///
    /// This method panics if `begin` is positioned after `end`.
    pub fn get_clip(&self, begin: &Iter, end: &Iter) -> Vec<u8> {
        let (start, stop) = (begin.position(), end.position());
        assert!(
            start <= stop,
            "clip start {} is after its end {}",
            start,
            stop
        );

        let mut out = Vec::with_capacity(stop - start);
        let mut node = begin.node;
        let mut offset = begin.offset;
        let mut remaining = stop - start;

        while remaining > 0 {
            let id = node.expect("clip extends past the end of the text");
            let bytes = &self.tree.get(id).bytes[offset..];
            let take = remaining.min(bytes.len());

            out.extend_from_slice(&bytes[..take]);
            remaining -= take;
            offset = 0;
            node = self.tree.next(id);
        }

        out
    }

    /// Copies out the bytes in the range
    ///
    /// ## Panics
    ///
    /// This method panics if the range is decreasing or extends past the end of the text.
    pub fn clip(&self, range: Range<usize>) -> Vec<u8> {
        self.get_clip(&self.at(range.start), &self.at(range.end))
    }

    /// Inserts the bytes so that the first of them ends up at index `pos`
    ///
    /// ## Panics
    ///
    /// This method panics if `pos` is greater than the length of the text.
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) {
        let at = self.locate(pos);
        if bytes.is_empty() {
            return;
        }

        let max = self.limits.max_chunk_size;

        // `head` is the chunk immediately before the insertion point (which we can extend), and
        // `before` is the chunk immediately after it. If the insertion point is inside of a
        // chunk, we split it, and the bytes after the split are carried as `tail`.
        let (head, tail, before) = match at.node {
            Some(node) if at.offset > 0 => {
                let tail = self.tree.update(node, |c| c.split_off(at.offset));
                (Some(node), Some(tail), self.tree.next(node))
            }
            Some(node) => (self.tree.prev(node), None, Some(node)),
            None => (self.tree.last(), None, None),
        };

        let mut rest = bytes;
        if let Some(h) = head {
            let room = max.saturating_sub(self.tree.get(h).len());
            let (fill, remaining) = rest.split_at(room.min(rest.len()));
            if !fill.is_empty() {
                self.tree.update(h, |c| c.extend(fill));
            }
            rest = remaining;
        }

        let mut pending: Vec<Chunk> = rest.chunks(max).map(Chunk::from_slice).collect();
        if let Some(tail) = tail {
            match pending.last_mut() {
                Some(last) if last.len() + tail.len() <= max => last.append(tail),
                Some(_) => pending.push(tail),
                None => {
                    // Everything fit into the head; we might be able to undo the split.
                    let h = head.expect("split chunk is always the head");
                    match self.tree.get(h).len() + tail.len() <= max {
                        true => self.tree.update(h, |c| c.append(tail)),
                        false => pending.push(tail),
                    }
                }
            }
        }

        let mut last_new = None;
        for chunk in pending {
            last_new = Some(self.tree.insert_before(before, chunk));
        }

        log::trace!(
            "inserted {} bytes at {}, now {} chunks",
            bytes.len(),
            pos,
            self.chunk_count()
        );

        let hi = last_new
            .or(head)
            .expect("non-empty insertion produces or extends a chunk");
        let lo = match head {
            Some(h) => h,
            None => self.tree.first().expect("tree is non-empty after insertion"),
        };
        let lo = self.tree.prev(lo).unwrap_or(lo);
        self.merge_range(lo, hi);
    }

    /// Removes the bytes in the range
    ///
    /// ## Panics
    ///
    /// This method panics if the range is decreasing or extends past the end of the text.
    pub fn erase(&mut self, range: Range<usize>) {
        assert!(
            range.start <= range.end,
            "range start {} is after its end {}",
            range.start,
            range.end
        );

        let end = self.locate(range.end);
        if range.start == range.end {
            return;
        }

        let start = self.locate(range.start);
        let start_node = start
            .node
            .expect("start of a non-empty range is inside the text");

        // The chunks immediately on either side of the removed bytes, once we're done
        let (left, right);

        if Some(start_node) == end.node {
            self.tree
                .update(start_node, |c| c.remove_range(start.offset..end.offset));
            left = Some(start_node);
            right = Some(start_node);
        } else {
            let mut current = if start.offset > 0 {
                self.tree.update(start_node, |c| c.truncate(start.offset));
                left = Some(start_node);
                self.tree.next(start_node)
            } else {
                left = self.tree.prev(start_node);
                Some(start_node)
            };

            while current != end.node {
                let id = current.expect("end of the range is after its start");
                current = self.tree.next(id);
                self.tree.erase(id);
            }

            if let Some(e) = end.node {
                if end.offset > 0 {
                    self.tree.update(e, |c| c.remove_prefix(end.offset));
                }
            }
            right = end.node;
        }

        log::trace!(
            "erased bytes {}..{}, now {} chunks",
            range.start,
            range.end,
            self.chunk_count()
        );

        if let Some(lo) = left.or(right) {
            let hi = right.or(left).unwrap_or(lo);
            let lo = self.tree.prev(lo).unwrap_or(lo);
            self.merge_range(lo, hi);
        }
    }

    /// (*Internal*) Merges undersized neighbors, for each adjacent pair whose first chunk lies
    /// between `lo` and `hi`, inclusive
    ///
    /// `hi` must not come before `lo`.
    fn merge_range(&mut self, lo: NodeId, mut hi: NodeId) {
        let threshold = self.limits.merge_threshold;
        let mut current = lo;

        loop {
            let next = match self.tree.next(current) {
                Some(n) => n,
                None => return,
            };

            let combined = self.tree.get(current).len() + self.tree.get(next).len();
            if combined < threshold {
                let absorbed = self.tree.erase(next);
                self.tree.update(current, |c| c.append(absorbed));
                log::debug!("merged adjacent chunks into one of {} bytes", combined);

                if next == hi {
                    hi = current;
                }
            } else if current == hi {
                return;
            } else {
                current = next;
            }
        }
    }

    /// Returns the number of lines in the text
    ///
    /// This is always one more than the number of line breaks; an empty text has a single empty
    /// line.
    pub fn line_count(&self) -> usize {
        self.newlines() + 1
    }

    fn newlines(&self) -> usize {
        self.tree.root_data().map(|d| line_sum(d).total).unwrap_or(0)
    }

    /// Returns the byte index of the start of the line
    ///
    /// ## Panics
    ///
    /// This method panics if `line` is not less than [`line_count`](Self::line_count).
    pub fn line_start(&self, line: usize) -> usize {
        let count = self.line_count();
        assert!(
            line < count,
            "line out of bounds: the line count is {} but the line is {}",
            count,
            line
        );

        if line == 0 {
            return 0;
        }

        // Lines start immediately after the line break that ends the previous line
        let mut finder = IndexFinder::new(line - 1, line_sum);
        let node = self
            .tree
            .find_custom(&mut finder)
            .expect("line break is within the text");

        let idx = self
            .tree
            .get(node)
            .bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(finder.remaining())
            .map(|(i, _)| i)
            .expect("chunk contains the counted line break");

        self.tree.prefix_sum(node, byte_sum) + idx + 1
    }

    /// Returns the index of the line containing the byte at `pos`
    ///
    /// ## Panics
    ///
    /// This method panics if `pos` is greater than the length of the text.
    pub fn line_of(&self, pos: usize) -> usize {
        let p = self.locate(pos);
        match p.node {
            None => self.newlines(),
            Some(node) => {
                let before = self.tree.prefix_sum(node, line_sum);
                before + count_newlines(&self.tree.get(node).bytes[..p.offset])
            }
        }
    }

    /// Checks the internal consistency of the tree and all of its chunks
    ///
    /// ## Panics
    ///
    /// This method panics if any issue is found.
    pub fn check_integrity(&self) {
        self.tree.check_integrity();

        for (_, chunk) in self.tree.iter() {
            assert!(!chunk.bytes.is_empty(), "empty chunk");
            assert!(
                chunk.len() <= self.limits.max_chunk_size,
                "chunk of {} bytes exceeds the maximum of {}",
                chunk.len(),
                self.limits.max_chunk_size
            );
            assert_eq!(
                chunk.newlines,
                count_newlines(&chunk.bytes),
                "stale line break count"
            );
        }
    }
}

/// A byte-wise cursor into a [`ChunkTree`]
///
/// Dereferencing and stepping are constant-time. The iterator borrows the tree, so it can't be
/// held across any change to the text.
#[derive(Clone)]
pub struct Iter<'a> {
    chunks: &'a ChunkTree,
    node: Option<NodeId>,
    offset: usize,
    chunk_start: usize,
}

impl<'a> Iter<'a> {
    /// Returns the index of the byte the iterator is at
    pub fn position(&self) -> usize {
        self.chunk_start + self.offset
    }

    /// Returns whether the iterator is positioned after the last byte
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Returns the byte at the current position, or `None` at the end
    pub fn get(&self) -> Option<u8> {
        self.node
            .map(|n| self.chunks.tree.get(n).bytes[self.offset])
    }

    /// Moves the iterator forward by a byte, returning false if it was already at the end
    pub fn move_next(&mut self) -> bool {
        let node = match self.node {
            Some(n) => n,
            None => return false,
        };

        let len = self.chunks.tree.get(node).len();
        self.offset += 1;
        if self.offset == len {
            self.chunk_start += len;
            self.offset = 0;
            self.node = self.chunks.tree.next(node);
        }

        true
    }

    /// Moves the iterator back by a byte, returning false if it was already at the start
    pub fn move_prev(&mut self) -> bool {
        if self.offset > 0 {
            self.offset -= 1;
            return true;
        }

        let prev = match self.node {
            Some(n) => self.chunks.tree.prev(n),
            None => self.chunks.tree.last(),
        };

        match prev {
            None => false,
            Some(p) => {
                let len = self.chunks.tree.get(p).len();
                self.node = Some(p);
                self.chunk_start -= len;
                self.offset = len - 1;
                true
            }
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = self.get()?;
        self.move_next();
        Some(byte)
    }
}

impl Debug for Iter<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Iter")
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkLimits, ChunkTree};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn small() -> ChunkLimits {
        ChunkLimits::new(8, 4)
    }

    fn random_bytes(rng: &mut SmallRng, max_len: usize) -> Vec<u8> {
        let len = rng.gen_range(0..=max_len);
        (0..len)
            .map(|_| match rng.gen_ratio(1, 6) {
                true => b'\n',
                false => rng.gen_range(b'a'..=b'z'),
            })
            .collect()
    }

    fn assert_matches(chunks: &ChunkTree, model: &[u8]) {
        chunks.check_integrity();
        assert_eq!(chunks.len(), model.len());
        assert_eq!(chunks.to_vec(), model);
    }

    #[test]
    fn from_bytes_respects_limits() {
        let text: Vec<u8> = (0..100).map(|i| b'a' + (i % 26) as u8).collect();
        let chunks = ChunkTree::from_bytes(&text, small());
        assert_matches(&chunks, &text);
        assert_eq!(chunks.chunk_count(), 13);

        let empty = ChunkTree::from_bytes(b"", small());
        assert_matches(&empty, b"");
        assert!(empty.is_empty());
        assert!(empty.at(0).is_end());
    }

    #[test]
    fn insert_splits_full_chunk() {
        let mut chunks = ChunkTree::from_bytes(b"abcdefgh", small());
        chunks.insert(4, b"XYZ");
        assert_matches(&chunks, b"abcdXYZefgh");
        assert_eq!(chunks.chunk_count(), 2);

        chunks.insert(0, b"0123456789");
        assert_matches(&chunks, b"0123456789abcdXYZefgh");

        chunks.insert(chunks.len(), b"!");
        assert_matches(&chunks, b"0123456789abcdXYZefgh!");
    }

    #[test]
    fn erase_merges_small_neighbors() {
        let text = b"aaaaaaaabbbbbbbbcccccccc";
        let mut chunks = ChunkTree::from_bytes(text, small());
        assert_eq!(chunks.chunk_count(), 3);

        // Leaves "a" and "cc" on either side, which should be merged
        chunks.erase(1..22);
        assert_matches(&chunks, b"acc");
        assert_eq!(chunks.chunk_count(), 1);

        chunks.erase(0..3);
        assert_matches(&chunks, b"");
        assert_eq!(chunks.chunk_count(), 0);
    }

    #[test]
    fn empty_changes_are_no_ops() {
        let mut chunks = ChunkTree::from_bytes(b"hello", small());
        chunks.insert(5, b"");
        chunks.erase(2..2);
        assert_matches(&chunks, b"hello");
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn insert_past_end_panics() {
        let mut chunks = ChunkTree::from_bytes(b"hello", small());
        chunks.insert(6, b"!");
    }

    #[test]
    #[should_panic]
    fn erase_past_end_panics() {
        let mut chunks = ChunkTree::from_bytes(b"hello", small());
        chunks.erase(3..6);
    }

    #[test]
    fn iterators_cross_chunks() {
        let text: Vec<u8> = (0..40).map(|i| b'a' + (i % 26) as u8).collect();
        let chunks = ChunkTree::from_bytes(&text, small());

        for pos in 0..=text.len() {
            let iter = chunks.at(pos);
            assert_eq!(iter.position(), pos);
            assert_eq!(iter.get(), text.get(pos).copied());
            assert_eq!(iter.collect::<Vec<_>>(), &text[pos..]);
        }

        let mut iter = chunks.at(text.len());
        let mut backwards = Vec::new();
        while iter.move_prev() {
            backwards.push(iter.get().unwrap());
        }
        backwards.reverse();
        assert_eq!(backwards, text);
        assert_eq!(iter.position(), 0);
        assert!(!iter.move_prev());
    }

    #[test]
    fn clips() {
        let text: Vec<u8> = (0..50).map(|i| b'A' + (i % 26) as u8).collect();
        let chunks = ChunkTree::from_bytes(&text, small());

        for start in 0..=text.len() {
            for end in start..=text.len() {
                assert_eq!(chunks.clip(start..end), &text[start..end]);
            }
        }
    }

    #[test]
    fn lines() {
        let text = b"first\nsecond line\n\nlast";
        let chunks = ChunkTree::from_bytes(text, small());

        assert_eq!(chunks.line_count(), 4);
        assert_eq!(chunks.line_start(0), 0);
        assert_eq!(chunks.line_start(1), 6);
        assert_eq!(chunks.line_start(2), 18);
        assert_eq!(chunks.line_start(3), 19);

        assert_eq!(chunks.line_of(0), 0);
        assert_eq!(chunks.line_of(5), 0);
        assert_eq!(chunks.line_of(6), 1);
        assert_eq!(chunks.line_of(18), 2);
        assert_eq!(chunks.line_of(text.len()), 3);

        assert_eq!(ChunkTree::default().line_count(), 1);
    }

    #[test]
    fn random_edits_match_vec() {
        let mut rng = SmallRng::seed_from_u64(0x6368_756e_6b73);
        let mut chunks = ChunkTree::new(small());
        let mut model: Vec<u8> = Vec::new();

        for _ in 0..3000 {
            if !model.is_empty() && rng.gen_ratio(2, 5) {
                let start = rng.gen_range(0..model.len());
                let end = rng.gen_range(start..=model.len().min(start + 30));
                chunks.erase(start..end);
                model.drain(start..end);
            } else {
                let pos = rng.gen_range(0..=model.len());
                let bytes = random_bytes(&mut rng, 20);
                chunks.insert(pos, &bytes);
                let after = model.split_off(pos);
                model.extend(bytes);
                model.extend(after);
            }

            assert_matches(&chunks, &model);

            let pos = rng.gen_range(0..=model.len());
            assert_eq!(chunks.at(pos).get(), model.get(pos).copied());

            let newlines = model.iter().filter(|&&b| b == b'\n').count();
            assert_eq!(chunks.line_count(), newlines + 1);
            let line_of = model[..pos].iter().filter(|&&b| b == b'\n').count();
            assert_eq!(chunks.line_of(pos), line_of);
        }

        // Chunks only get merged when they're small enough, so the count stays reasonable
        assert!(chunks.chunk_count() <= model.len() / 2 + 1);
    }
}
