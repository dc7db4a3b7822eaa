//! The subsumption preorder on obligations.
//!
//! `X` dominates `Y` when both are trivial and `Y.first ⊆ X.first`, or when
//! neither is trivial and, after splitting each pair into its common part
//! and two remainders, every component of `Y` is contained in the matching
//! component of `X`.

use crate::tree::Pair;
use bisim_net::Marking;

/// Reusable buffers for dominance checks. The six markings are reset and
/// overwritten by every call to [`Scratch::dominates`].
#[derive(Debug, Clone)]
pub struct Scratch {
    x_common: Marking,
    x_first_rem: Marking,
    x_second_rem: Marking,
    y_common: Marking,
    y_first_rem: Marking,
    y_second_rem: Marking,
}

impl Scratch {
    pub fn new(places: usize) -> Self {
        Self {
            x_common: Marking::zeros(places),
            x_first_rem: Marking::zeros(places),
            x_second_rem: Marking::zeros(places),
            y_common: Marking::zeros(places),
            y_first_rem: Marking::zeros(places),
            y_second_rem: Marking::zeros(places),
        }
    }

    /// Does `x` dominate `y`?
    ///
    /// When both pairs are non-trivial and the answer is yes, the buffers
    /// hold the split of `x` and `y` until the next call, which is what
    /// [`Scratch::reduced_second`] reads.
    pub fn dominates(&mut self, x: &Pair, y: &Pair) -> bool {
        self.compare(x, &y.first, &y.second)
    }

    /// Does `x` dominate `y` read with its two sides exchanged?
    pub fn dominates_swapped(&mut self, x: &Pair, y: &Pair) -> bool {
        self.compare(x, &y.second, &y.first)
    }

    fn compare(&mut self, x: &Pair, y_first: &Marking, y_second: &Marking) -> bool {
        match (x.is_trivial(), y_first == y_second) {
            (true, true) => y_first.subset_of(&x.first),
            (true, false) | (false, true) => false,
            (false, false) => {
                Marking::split_intersection_into(
                    &x.first,
                    &x.second,
                    &mut self.x_common,
                    &mut self.x_first_rem,
                    &mut self.x_second_rem,
                );
                Marking::split_intersection_into(
                    y_first,
                    y_second,
                    &mut self.y_common,
                    &mut self.y_first_rem,
                    &mut self.y_second_rem,
                );
                self.y_common.subset_of(&self.x_common)
                    && self.y_first_rem.subset_of(&self.x_first_rem)
                    && self.y_second_rem.subset_of(&self.x_second_rem)
            }
        }
    }

    /// Second side of the reduced obligation after a successful
    /// [`Scratch::dominates`] or [`Scratch::dominates_swapped`] between two
    /// non-trivial pairs.
    pub fn reduced_second(&self) -> Marking {
        Marking::reduce_child(
            &self.x_common,
            &self.y_second_rem,
            &self.x_second_rem,
            &self.y_first_rem,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &[u64], b: &[u64]) -> Pair {
        Pair::new(Marking::new(a.to_vec()), Marking::new(b.to_vec()))
    }

    #[test]
    fn test_trivial_pairs_compare_by_subset() {
        let mut s = Scratch::new(2);
        assert!(s.dominates(&pair(&[2, 1], &[2, 1]), &pair(&[1, 1], &[1, 1])));
        assert!(!s.dominates(&pair(&[1, 1], &[1, 1]), &pair(&[2, 1], &[2, 1])));
    }

    #[test]
    fn test_trivial_and_non_trivial_are_incomparable() {
        let mut s = Scratch::new(2);
        let trivial = pair(&[5, 5], &[5, 5]);
        let other = pair(&[1, 0], &[0, 1]);
        assert!(!s.dominates(&trivial, &other));
        assert!(!s.dominates(&other, &trivial));
    }

    #[test]
    fn test_componentwise_domination() {
        let mut s = Scratch::new(3);
        // x = common [1,0,1] + ([1,0,0], [0,2,0]); y = common [1,0,0] + ([1,0,0], [0,1,0])
        let x = pair(&[2, 0, 1], &[1, 2, 1]);
        let y = pair(&[2, 0, 0], &[1, 1, 0]);
        assert!(s.dominates(&x, &y));
        assert!(!s.dominates(&y, &x));
        assert!(s.dominates(&x, &x));
    }

    #[test]
    fn test_same_power_but_shifted_remainder() {
        let mut s = Scratch::new(2);
        assert!(!s.dominates(&pair(&[1, 0], &[0, 1]), &pair(&[0, 1], &[1, 0])));
    }

    #[test]
    fn test_reduced_second_uses_matched_buffers() {
        let mut s = Scratch::new(2);
        // x = ([0, 3], [1, 2]) splits into common [0, 2], rems [0, 1] / [1, 0]
        // y = ([0, 2], [1, 1]) splits into common [0, 1], rems [0, 1] / [1, 0]
        let x = pair(&[0, 3], &[1, 2]);
        let y = pair(&[0, 2], &[1, 1]);
        assert!(s.dominates(&x, &y));
        // common(x) + max(0, y2 - x2) + y1 = [0, 2] + [0, 0] + [0, 1]
        assert_eq!(s.reduced_second(), Marking::new(vec![0, 3]));
    }

    #[test]
    fn test_swapped_comparison_reads_other_sides() {
        let mut s = Scratch::new(2);
        let x = pair(&[1, 0], &[0, 1]);
        let y = pair(&[0, 1], &[1, 0]);
        assert!(!s.dominates(&x, &y));
        assert!(s.dominates_swapped(&x, &y));
        // x common [0, 0], rems [1, 0] / [0, 1]; swapped y the same.
        assert_eq!(s.reduced_second(), Marking::new(vec![1, 0]));
    }

    #[test]
    fn test_swapped_trivial_pairs_compare_by_subset() {
        let mut s = Scratch::new(2);
        assert!(s.dominates_swapped(&pair(&[2, 2], &[2, 2]), &pair(&[1, 2], &[1, 2])));
        assert!(!s.dominates_swapped(&pair(&[2, 0], &[0, 2]), &pair(&[1, 1], &[1, 1])));
    }
}
