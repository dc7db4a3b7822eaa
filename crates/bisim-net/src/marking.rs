//! Markings: fixed-dimension multisets of tokens over the place set.

use crate::net::Transition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token count at a single place.
pub type Count = u64;

/// Largest count accepted from input. Each proof step adds at most one
/// transition's output to a place, so sums stay far below `Count::MAX`.
pub const MAX_COUNT: Count = u32::MAX as Count;

/// A marking is a vector of token counts indexed by place.
/// The total token count ("power") is cached at construction time and kept
/// in sync by every mutating helper, so comparisons can reject on it first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Count>", into = "Vec<Count>")]
pub struct Marking {
    counts: Vec<Count>,
    power: Count,
}

impl PartialEq for Marking {
    fn eq(&self, other: &Self) -> bool {
        self.power == other.power && self.counts == other.counts
    }
}

impl Eq for Marking {}

impl From<Vec<Count>> for Marking {
    fn from(counts: Vec<Count>) -> Self {
        Marking::new(counts)
    }
}

impl From<Marking> for Vec<Count> {
    fn from(marking: Marking) -> Self {
        marking.counts
    }
}

impl Marking {
    /// Create a marking from per-place counts.
    pub fn new(counts: Vec<Count>) -> Self {
        let power = counts.iter().sum();
        Self { counts, power }
    }

    /// Create the empty marking over `places` places.
    pub fn zeros(places: usize) -> Self {
        Self {
            counts: vec![0; places],
            power: 0,
        }
    }

    /// Number of places (the dimension P).
    #[inline]
    pub fn places(&self) -> usize {
        self.counts.len()
    }

    /// Total number of tokens.
    #[inline]
    pub fn power(&self) -> Count {
        self.power
    }

    #[inline]
    pub fn counts(&self) -> &[Count] {
        &self.counts
    }

    #[inline]
    pub fn get(&self, place: usize) -> Count {
        self.counts[place]
    }

    /// Zero every place in place, keeping the dimension. Used to recycle
    /// scratch buffers between comparisons.
    pub fn reset(&mut self) {
        self.counts.fill(0);
        self.power = 0;
    }

    /// Write `value` into a place that currently holds zero.
    #[inline]
    fn put(&mut self, place: usize, value: Count) {
        debug_assert_eq!(self.counts[place], 0);
        self.counts[place] = value;
        self.power += value;
    }

    /// Elementwise `self <= other`.
    pub fn subset_of(&self, other: &Marking) -> bool {
        if self.power > other.power {
            return false;
        }
        self.counts
            .iter()
            .zip(&other.counts)
            .all(|(mine, theirs)| mine <= theirs)
    }

    /// Split two markings into their common part and the two remainders:
    /// `left = intersect + left_rem`, `right = intersect + right_rem`.
    pub fn split_intersection(left: &Marking, right: &Marking) -> (Marking, Marking, Marking) {
        let places = left.places();
        let mut intersect = Marking::zeros(places);
        let mut left_rem = Marking::zeros(places);
        let mut right_rem = Marking::zeros(places);
        Self::split_intersection_into(left, right, &mut intersect, &mut left_rem, &mut right_rem);
        (intersect, left_rem, right_rem)
    }

    /// Buffer-reusing form of [`Marking::split_intersection`]. The three
    /// output markings are reset before being written.
    pub fn split_intersection_into(
        left: &Marking,
        right: &Marking,
        intersect: &mut Marking,
        left_rem: &mut Marking,
        right_rem: &mut Marking,
    ) {
        intersect.reset();
        left_rem.reset();
        right_rem.reset();
        for (place, (&l, &r)) in left.counts.iter().zip(&right.counts).enumerate() {
            let common = l.min(r);
            intersect.put(place, common);
            left_rem.put(place, l - common);
            right_rem.put(place, r - common);
        }
    }

    /// Propose firing `delta` from `init`, borrowing any missing input tokens
    /// from the surrounding context:
    /// `result[i] = max(init[i], before[i]) - before[i] + after[i]`.
    pub fn weak_transition(init: &Marking, delta: &Transition) -> Marking {
        let counts = init
            .counts
            .iter()
            .zip(delta.before.counts())
            .zip(delta.after.counts())
            .map(|((&have, &need), &produce)| have.max(need) - need + produce)
            .collect();
        Marking::new(counts)
    }

    /// Try to answer `delta`, fired from `prev`, with `gamma` fired from
    /// `init`. The tokens `delta` borrowed from the context are lent to
    /// `init` as well. Returns false if `gamma` would still be short of
    /// tokens at some place; `result` holds garbage in that case.
    pub fn mirror_transition(
        init: &Marking,
        prev: &Marking,
        delta: &Transition,
        gamma: &Transition,
        result: &mut Marking,
    ) -> bool {
        result.reset();
        for place in 0..init.places() {
            let borrowed = delta.before.get(place).saturating_sub(prev.get(place));
            let available = borrowed + init.get(place);
            let need = gamma.before.get(place);
            if available < need {
                return false;
            }
            result.put(place, available - need + gamma.after.get(place));
        }
        true
    }

    /// Build the contracted second side used by the reduce rule:
    /// `result[i] = intersect[i] + max(0, other_second_rem[i] - second_rem[i]) + first_rem[i]`.
    pub fn reduce_child(
        intersect: &Marking,
        other_second_rem: &Marking,
        second_rem: &Marking,
        first_rem: &Marking,
    ) -> Marking {
        let counts = (0..intersect.places())
            .map(|place| {
                intersect.get(place)
                    + other_second_rem
                        .get(place)
                        .saturating_sub(second_rem.get(place))
                    + first_rem.get(place)
            })
            .collect();
        Marking::new(counts)
    }

    /// Signed elementwise difference `self - other`.
    pub fn difference(&self, other: &Marking) -> Vec<i64> {
        self.counts
            .iter()
            .zip(&other.counts)
            .map(|(&a, &b)| a as i64 - b as i64)
            .collect()
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, count) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", count)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(counts: &[Count]) -> Marking {
        Marking::new(counts.to_vec())
    }

    fn t(before: &[Count], after: &[Count]) -> Transition {
        Transition::new("t", "a", m(before), m(after))
    }

    #[test]
    fn test_power_is_cached() {
        let a = m(&[1, 2, 3]);
        assert_eq!(a.power(), 6);
        assert_eq!(a.places(), 3);
        assert_eq!(Marking::zeros(4).power(), 0);
    }

    #[test]
    fn test_equality() {
        assert_eq!(m(&[1, 0]), m(&[1, 0]));
        assert_ne!(m(&[1, 0]), m(&[0, 1]));
        assert_ne!(m(&[1, 0]), m(&[1, 1]));
    }

    #[test]
    fn test_subset_of() {
        assert!(m(&[1, 0]).subset_of(&m(&[1, 2])));
        assert!(m(&[1, 2]).subset_of(&m(&[1, 2])));
        assert!(!m(&[2, 0]).subset_of(&m(&[1, 5])));
        // Same power, incomparable.
        assert!(!m(&[1, 0]).subset_of(&m(&[0, 1])));
    }

    #[test]
    fn test_reset_keeps_dimension() {
        let mut a = m(&[4, 5]);
        a.reset();
        assert_eq!(a, Marking::zeros(2));
        assert_eq!(a.places(), 2);
    }

    #[test]
    fn test_split_intersection() {
        let (inter, l, r) = Marking::split_intersection(&m(&[3, 0, 2]), &m(&[1, 4, 2]));
        assert_eq!(inter, m(&[1, 0, 2]));
        assert_eq!(l, m(&[2, 0, 0]));
        assert_eq!(r, m(&[0, 4, 0]));
    }

    #[test]
    fn test_split_intersection_into_overwrites_buffers() {
        let mut inter = m(&[9, 9]);
        let mut l = m(&[9, 9]);
        let mut r = m(&[9, 9]);
        Marking::split_intersection_into(&m(&[2, 1]), &m(&[1, 1]), &mut inter, &mut l, &mut r);
        assert_eq!(inter, m(&[1, 1]));
        assert_eq!(l, m(&[1, 0]));
        assert_eq!(r, m(&[0, 0]));
        assert_eq!(inter.power(), 2);
    }

    #[test]
    fn test_weak_transition_enabled() {
        let res = Marking::weak_transition(&m(&[2, 0]), &t(&[1, 0], &[0, 1]));
        assert_eq!(res, m(&[1, 1]));
    }

    #[test]
    fn test_weak_transition_borrows_missing_tokens() {
        // Nothing in place 0: the deficiency is capped at zero.
        let res = Marking::weak_transition(&m(&[0, 2]), &t(&[1, 0], &[0, 1]));
        assert_eq!(res, m(&[0, 3]));
    }

    #[test]
    fn test_mirror_transition() {
        let delta = t(&[1, 0], &[0, 1]);
        let gamma = t(&[0, 1], &[1, 0]);
        let mut out = Marking::zeros(2);
        assert!(Marking::mirror_transition(
            &m(&[0, 1]),
            &m(&[1, 0]),
            &delta,
            &gamma,
            &mut out
        ));
        assert_eq!(out, m(&[1, 0]));

        // delta itself cannot answer from [0, 1]
        assert!(!Marking::mirror_transition(
            &m(&[0, 1]),
            &m(&[1, 0]),
            &delta,
            &delta,
            &mut out
        ));
    }

    #[test]
    fn test_mirror_transition_lends_borrowed_tokens() {
        // delta borrows one token at place 0 from the context; the responder
        // gets the same token and can fire delta too.
        let delta = t(&[1, 0], &[0, 1]);
        let mut out = Marking::zeros(2);
        assert!(Marking::mirror_transition(
            &m(&[0, 0]),
            &m(&[0, 3]),
            &delta,
            &delta,
            &mut out
        ));
        assert_eq!(out, m(&[0, 1]));
    }

    #[test]
    fn test_reduce_child() {
        let res = Marking::reduce_child(&m(&[1, 0]), &m(&[0, 3]), &m(&[0, 1]), &m(&[2, 0]));
        assert_eq!(res, m(&[3, 2]));
        let res = Marking::reduce_child(&m(&[1, 0]), &m(&[0, 1]), &m(&[0, 3]), &m(&[0, 0]));
        assert_eq!(res, m(&[1, 0]));
    }

    #[test]
    fn test_difference() {
        assert_eq!(m(&[0, 1]).difference(&m(&[1, 0])), vec![-1, 1]);
    }

    #[test]
    fn test_display() {
        assert_eq!(m(&[42, 0, 7]).to_string(), "[42, 0, 7]");
        assert_eq!(Marking::zeros(0).to_string(), "[]");
    }

    #[test]
    fn test_serde_as_plain_vector() {
        let json = serde_json::to_string(&m(&[1, 0, 2])).unwrap();
        assert_eq!(json, "[1,0,2]");
        let back: Marking = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m(&[1, 0, 2]));
        assert_eq!(back.power(), 3);
    }

    #[test]
    fn test_algebra_at_the_count_limit() {
        let full = m(&[MAX_COUNT, MAX_COUNT]);
        let grow = t(&[MAX_COUNT, 0], &[MAX_COUNT, MAX_COUNT]);
        let weak = Marking::weak_transition(&full, &grow);
        assert_eq!(weak, m(&[MAX_COUNT, 2 * MAX_COUNT]));

        let mut answer = Marking::zeros(2);
        assert!(Marking::mirror_transition(
            &full,
            &m(&[0, 0]),
            &grow,
            &grow,
            &mut answer
        ));
        assert_eq!(answer, m(&[2 * MAX_COUNT, 2 * MAX_COUNT]));

        let reduced = Marking::reduce_child(&full, &full, &m(&[0, 0]), &full);
        assert_eq!(reduced, m(&[3 * MAX_COUNT, 3 * MAX_COUNT]));
    }
}
