//! Labelled transitions and the read-only transition table.

use crate::marking::Marking;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single labelled rewrite rule: consumes `before`, produces `after`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Identifier, only used when exporting.
    pub id: String,
    /// Observable label; transitions sharing a label can answer each other.
    pub label: String,
    pub before: Marking,
    pub after: Marking,
}

impl Transition {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        before: Marking,
        after: Marking,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            before,
            after,
        }
    }

    /// Net effect `after - before`.
    pub fn effect(&self) -> Vec<i64> {
        self.after.difference(&self.before)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, [", self.id, self.label)?;
        for (i, d) in self.effect().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// All transitions of a net, in input order, plus a label index.
///
/// Input order is significant: it fixes the order in which the prover tries
/// moves and, within a label, the order in which it tries counterparts.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    transitions: Vec<Transition>,
    /// Label -> positions in `transitions`, ascending.
    by_label: BTreeMap<String, Vec<usize>>,
    places: usize,
}

impl TransitionTable {
    /// Build a table. The place count is taken from the first transition;
    /// callers are expected to have checked that every vector agrees.
    pub fn new(transitions: Vec<Transition>) -> Self {
        let places = transitions.first().map_or(0, |t| t.before.places());
        let mut by_label: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, t) in transitions.iter().enumerate() {
            by_label.entry(t.label.clone()).or_default().push(idx);
        }
        Self {
            transitions,
            by_label,
            places,
        }
    }

    /// Number of places, or 0 for an empty table.
    pub fn places(&self) -> usize {
        self.places
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[inline]
    pub fn get(&self, idx: usize) -> &Transition {
        &self.transitions[idx]
    }

    /// Ordered positions of all transitions carrying `label`.
    pub fn candidates(&self, label: &str) -> &[usize] {
        self.by_label.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ordered positions of the transitions that may answer transition `idx`.
    #[inline]
    pub fn candidates_for(&self, idx: usize) -> &[usize] {
        self.candidates(&self.transitions[idx].label)
    }

    /// Distinct labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.by_label.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str, label: &str, before: &[u64], after: &[u64]) -> Transition {
        Transition::new(
            id,
            label,
            Marking::new(before.to_vec()),
            Marking::new(after.to_vec()),
        )
    }

    #[test]
    fn test_effect_and_display() {
        let tr = t("t1", "a", &[1, 0], &[0, 2]);
        assert_eq!(tr.effect(), vec![-1, 2]);
        assert_eq!(tr.to_string(), "t1, a, [-1, 2]");
    }

    #[test]
    fn test_label_index_preserves_input_order() {
        let table = TransitionTable::new(vec![
            t("x", "b", &[1, 0], &[0, 0]),
            t("y", "a", &[0, 1], &[0, 0]),
            t("z", "b", &[0, 0], &[1, 0]),
        ]);
        assert_eq!(table.places(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.candidates("b"), &[0, 2]);
        assert_eq!(table.candidates("a"), &[1]);
        assert_eq!(table.candidates_for(2), &[0, 2]);
        assert!(table.candidates("c").is_empty());
        assert_eq!(table.labels().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_table() {
        let table = TransitionTable::new(Vec::new());
        assert!(table.is_empty());
        assert_eq!(table.places(), 0);
    }
}
