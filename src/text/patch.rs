//! Remapping of positions across an edit
//!
//! Anything that stores positions into a buffer's text (cursors, highlighted ranges, etc.) needs
//! to update them after each edit. The [`PositionPatcher`] does this for a sorted batch of
//! positions at a time, given the [`PatchRange`]s reported with the edit.

use super::Modification;

/// The region of text affected by a single modification
///
/// Within a list of ranges, `position` is given relative to the text after all earlier ranges in
/// the list have been applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PatchRange {
    pub position: usize,
    pub removed_len: usize,
    pub added_len: usize,
}

impl PatchRange {
    fn of(m: &Modification) -> PatchRange {
        PatchRange {
            position: m.position,
            removed_len: m.removed.len(),
            added_len: m.added.len(),
        }
    }

    fn diff(&self) -> isize {
        self.added_len as isize - self.removed_len as isize
    }

    /// Produces the sorted list of ranges corresponding to the modifications, in the order they
    /// were applied
    ///
    /// Modifications that were applied in increasing order of position are used as-is. Those
    /// applied in decreasing order (as happens when an edit is undone) are re-expressed from
    /// front to back.
    pub fn from_applied(modifications: &[Modification]) -> Vec<PatchRange> {
        let ranges: Vec<_> = modifications.iter().map(PatchRange::of).collect();

        let ascending = ranges
            .windows(2)
            .all(|w| w[1].position >= w[0].position + w[0].added_len);
        if ascending {
            return ranges;
        }

        let descending = ranges
            .windows(2)
            .all(|w| w[1].position + w[1].removed_len <= w[0].position);
        if !descending {
            log::warn!(
                "modifications are neither ascending nor descending; reporting them unsorted: {:?}",
                ranges
            );
            return ranges;
        }

        // Each range only moved the ones applied before it -- which are all after it in the text.
        let mut shift = 0_isize;
        let mut sorted = Vec::with_capacity(ranges.len());
        for r in ranges.iter().rev() {
            sorted.push(PatchRange {
                position: (r.position as isize + shift) as usize,
                ..*r
            });
            shift += r.diff();
        }

        sorted
    }
}

/// What to do with positions inside of a removed range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Move to the start of the replacement
    Front,
    /// Move to the end of the replacement
    Back,
    /// Keep the same distance from the start of the range, as long as that stays within the
    /// replacement
    TryKeep,
}

/// A stateful remapping of positions through a list of [`PatchRange`]s
///
/// Positions must be given in non-decreasing order; the patcher only ever moves forward through
/// the ranges.
#[derive(Clone, Debug)]
pub struct PositionPatcher<'a> {
    ranges: &'a [PatchRange],
    next: usize,
    offset: isize,
    strategy: Strategy,
    last: Option<usize>,
}

impl<'a> PositionPatcher<'a> {
    pub fn new(ranges: &'a [PatchRange], strategy: Strategy) -> Self {
        PositionPatcher {
            ranges,
            next: 0,
            offset: 0,
            strategy,
            last: None,
        }
    }

    /// Returns the position in the new text corresponding to `old`
    ///
    /// ## Panics
    ///
    /// This method panics if `old` is less than the position given in the previous call.
    pub fn patch_next(&mut self, old: usize) -> usize {
        assert!(
            self.last.map(|l| l <= old).unwrap_or(true),
            "positions must be patched in non-decreasing order: {:?} came before {}",
            self.last,
            old,
        );
        self.last = Some(old);

        // Where `old` is, relative to the text after the ranges consumed so far
        let mut adjusted = (old as isize + self.offset) as usize;

        while let Some(r) = self.ranges.get(self.next) {
            if r.position + r.removed_len > adjusted {
                break;
            }

            self.offset += r.diff();
            adjusted = (old as isize + self.offset) as usize;
            self.next += 1;
        }

        let r = match self.ranges.get(self.next) {
            Some(r) if r.position <= adjusted => r,
            _ => return adjusted,
        };

        match self.strategy {
            Strategy::Front => r.position,
            Strategy::Back => r.position + r.added_len,
            Strategy::TryKeep => r.position + (adjusted - r.position).min(r.added_len),
        }
    }

    /// Patches all of the positions in place
    ///
    /// ## Panics
    ///
    /// This method panics if the positions aren't sorted.
    pub fn patch_all(&mut self, positions: &mut [usize]) {
        for p in positions {
            *p = self.patch_next(*p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PatchRange, PositionPatcher, Strategy};
    use crate::text::Modification;

    fn range(position: usize, removed_len: usize, added_len: usize) -> PatchRange {
        PatchRange {
            position,
            removed_len,
            added_len,
        }
    }

    fn patch(ranges: &[PatchRange], strategy: Strategy, positions: &[usize]) -> Vec<usize> {
        let mut patcher = PositionPatcher::new(ranges, strategy);
        positions.iter().map(|&p| patcher.patch_next(p)).collect()
    }

    #[test]
    fn boundary_strategies() {
        let ranges = [range(5, 3, 1)];
        let old = [0, 5, 6, 7, 8, 20];

        assert_eq!(patch(&ranges, Strategy::Front, &old), vec![0, 5, 5, 5, 6, 18]);
        assert_eq!(patch(&ranges, Strategy::Back, &old), vec![0, 6, 6, 6, 6, 18]);
        assert_eq!(patch(&ranges, Strategy::TryKeep, &old), vec![0, 5, 6, 6, 6, 18]);
    }

    #[test]
    fn multiple_ranges() {
        // "0123456789" -> insert "ab" at 2 -> "01ab23456789" -> erase 8..10 -> "01ab234589"
        let ranges = [range(2, 0, 2), range(8, 2, 0)];
        let mut positions = vec![0, 1, 2, 5, 6, 7, 8, 10];

        PositionPatcher::new(&ranges, Strategy::Front).patch_all(&mut positions);
        assert_eq!(positions, vec![0, 1, 4, 7, 8, 8, 8, 10]);
    }

    #[test]
    fn ranges_from_undo() {
        let m = |position, removed: &str, added: &str| Modification {
            position,
            removed: removed.into(),
            added: added.into(),
        };

        let applied = [m(2, "ab", "xyz"), m(10, "", "Q")];
        assert_eq!(
            PatchRange::from_applied(&applied),
            vec![range(2, 2, 3), range(10, 0, 1)]
        );

        let undone = [m(10, "Q", ""), m(2, "xyz", "ab")];
        assert_eq!(
            PatchRange::from_applied(&undone),
            vec![range(2, 3, 2), range(9, 1, 0)]
        );
    }

    #[test]
    #[should_panic(expected = "non-decreasing order")]
    fn decreasing_positions_panic() {
        let ranges = [range(5, 3, 1)];
        let mut patcher = PositionPatcher::new(&ranges, Strategy::Front);
        patcher.patch_next(6);
        patcher.patch_next(2);
    }

    #[test]
    #[should_panic(expected = "non-decreasing order")]
    fn unsorted_batch_panics() {
        let ranges = [range(2, 0, 2)];
        let mut positions = vec![4, 9, 3];
        PositionPatcher::new(&ranges, Strategy::Back).patch_all(&mut positions);
    }
}
