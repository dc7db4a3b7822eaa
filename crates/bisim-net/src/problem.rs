//! Turning host data into a validated problem: a transition table plus the
//! two markings to compare.
//!
//! Two entry points exist. [`Problem::from_vectors`] takes raw integer
//! vectors, the way a host binding hands them over. [`ProblemFile`] is the
//! on-disk JSON form, which either lists vectors directly or describes a
//! place/transition net with arcs and gives the markings per place:
//!
//! ```json
//! {
//!   "places": ["p", "q"],
//!   "transitions": [{ "id": "t1", "label": "a" }, { "id": "t2", "label": "a" }],
//!   "arcs": [
//!     { "source": "p", "target": "t1" }, { "source": "t1", "target": "q" },
//!     { "source": "q", "target": "t2" }, { "source": "t2", "target": "p" }
//!   ],
//!   "first": { "p": 1, "q": 0 },
//!   "second": { "p": 0, "q": 1 }
//! }
//! ```

use crate::error::{LoadError, LoadResult, NetError, NetResult};
use crate::marking::{Count, Marking, MAX_COUNT};
use crate::net::{Transition, TransitionTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use tracing::debug;

/// A transition as supplied by the host, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransition {
    pub id: String,
    pub label: String,
    pub before: Vec<i64>,
    pub after: Vec<i64>,
}

impl RawTransition {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        before: Vec<i64>,
        after: Vec<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            before,
            after,
        }
    }
}

/// A validated bisimilarity question.
#[derive(Debug, Clone)]
pub struct Problem {
    table: TransitionTable,
    first: Marking,
    second: Marking,
}

impl Problem {
    /// Validate host vectors and build the problem.
    ///
    /// The place count is taken from the first transition, or from the first
    /// marking when there are no transitions. Every vector must have that
    /// length and contain no negative entries; transition ids must be unique.
    pub fn from_vectors(
        first: Vec<i64>,
        second: Vec<i64>,
        transitions: Vec<RawTransition>,
    ) -> NetResult<Self> {
        let places = transitions
            .first()
            .map_or(first.len(), |t| t.before.len());

        let first = to_marking("first marking", first, places)?;
        let second = to_marking("second marking", second, places)?;

        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(transitions.len());
        for raw in transitions {
            if !seen.insert(raw.id.clone()) {
                return Err(NetError::DuplicateTransition { id: raw.id });
            }
            let before = to_marking(&format!("transition '{}' before", raw.id), raw.before, places)?;
            let after = to_marking(&format!("transition '{}' after", raw.id), raw.after, places)?;
            built.push(Transition::new(raw.id, raw.label, before, after));
        }

        debug!(places, transitions = built.len(), "problem validated");
        Ok(Self {
            table: TransitionTable::new(built),
            first,
            second,
        })
    }

    /// Parse and validate a JSON problem file.
    pub fn from_json(text: &str) -> LoadResult<Self> {
        let file: ProblemFile = serde_json::from_str(text)?;
        file.into_problem()
    }

    /// Read, parse and validate a JSON problem file.
    pub fn from_reader(mut reader: impl Read) -> LoadResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    /// Number of places.
    pub fn places(&self) -> usize {
        self.first.places()
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn first(&self) -> &Marking {
        &self.first
    }

    pub fn second(&self) -> &Marking {
        &self.second
    }

    pub fn into_parts(self) -> (TransitionTable, Marking, Marking) {
        (self.table, self.first, self.second)
    }
}

fn to_marking(what: &str, values: Vec<i64>, places: usize) -> NetResult<Marking> {
    if values.len() != places {
        return Err(NetError::DimensionMismatch {
            what: what.to_string(),
            expected: places,
            found: values.len(),
        });
    }
    let counts = values
        .into_iter()
        .enumerate()
        .map(|(place, value)| {
            let count = Count::try_from(value).map_err(|_| NetError::NegativeCount {
                what: what.to_string(),
                place,
                value,
            })?;
            if count > MAX_COUNT {
                return Err(NetError::CountTooLarge {
                    what: what.to_string(),
                    place,
                    value,
                    limit: MAX_COUNT,
                });
            }
            Ok(count)
        })
        .collect::<NetResult<Vec<_>>>()?;
    Ok(Marking::new(counts))
}

/// On-disk problem description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemFile {
    /// Place ids. Empty when transitions carry explicit vectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub places: Vec<String>,
    pub transitions: Vec<TransitionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arcs: Vec<ArcEntry>,
    pub first: MarkingEntry,
    pub second: MarkingEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionEntry {
    pub id: String,
    /// Observable label; defaults to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArcEntry {
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    1
}

/// A marking either as a plain vector or as place id -> count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkingEntry {
    Vector(Vec<i64>),
    ByPlace(BTreeMap<String, i64>),
}

impl ProblemFile {
    pub fn into_problem(self) -> LoadResult<Problem> {
        let transitions = if self.places.is_empty() {
            self.vector_transitions()?
        } else {
            self.net_transitions()?
        };
        let first = resolve_marking("first", &self.first, &self.places)?;
        let second = resolve_marking("second", &self.second, &self.places)?;
        Ok(Problem::from_vectors(first, second, transitions)?)
    }

    fn vector_transitions(&self) -> LoadResult<Vec<RawTransition>> {
        self.transitions
            .iter()
            .map(|entry| match (&entry.before, &entry.after) {
                (Some(before), Some(after)) => Ok(RawTransition::new(
                    entry.id.clone(),
                    entry.label.clone().unwrap_or_else(|| entry.id.clone()),
                    before.clone(),
                    after.clone(),
                )),
                _ => Err(LoadError::MissingVectors {
                    id: entry.id.clone(),
                }),
            })
            .collect()
    }

    fn net_transitions(&self) -> LoadResult<Vec<RawTransition>> {
        let mut place_index = HashMap::new();
        for (idx, place) in self.places.iter().enumerate() {
            if place_index.insert(place.as_str(), idx).is_some() {
                return Err(LoadError::DuplicatePlace { id: place.clone() });
            }
        }

        let mut transition_index = HashMap::new();
        let mut raw = Vec::with_capacity(self.transitions.len());
        for entry in &self.transitions {
            if entry.before.is_some() || entry.after.is_some() {
                return Err(LoadError::MixedFormat {
                    id: entry.id.clone(),
                });
            }
            if transition_index
                .insert(entry.id.as_str(), raw.len())
                .is_some()
            {
                return Err(NetError::DuplicateTransition {
                    id: entry.id.clone(),
                }
                .into());
            }
            raw.push(RawTransition::new(
                entry.id.clone(),
                entry.label.clone().unwrap_or_else(|| entry.id.clone()),
                vec![0; self.places.len()],
                vec![0; self.places.len()],
            ));
        }

        for arc in &self.arcs {
            if arc.weight < 0 {
                return Err(LoadError::NegativeWeight {
                    from: arc.source.clone(),
                    to: arc.target.clone(),
                    weight: arc.weight,
                });
            }
            let (src, dst) = (arc.source.as_str(), arc.target.as_str());
            match (
                place_index.get(src),
                transition_index.get(dst),
                transition_index.get(src),
                place_index.get(dst),
            ) {
                (Some(&place), Some(&trans), _, _) => {
                    let slot = &mut raw[trans].before[place];
                    *slot = slot.saturating_add(arc.weight);
                }
                (_, _, Some(&trans), Some(&place)) => {
                    let slot = &mut raw[trans].after[place];
                    *slot = slot.saturating_add(arc.weight);
                }
                _ => {
                    return Err(LoadError::InvalidArc {
                        from: arc.source.clone(),
                        to: arc.target.clone(),
                    })
                }
            }
        }
        Ok(raw)
    }
}

fn resolve_marking(
    which: &'static str,
    entry: &MarkingEntry,
    places: &[String],
) -> LoadResult<Vec<i64>> {
    match entry {
        MarkingEntry::Vector(values) => Ok(values.clone()),
        MarkingEntry::ByPlace(map) => {
            if let Some(unknown) = map.keys().find(|k| !places.contains(k)) {
                return Err(LoadError::UnknownPlace {
                    which,
                    place: unknown.clone(),
                });
            }
            places
                .iter()
                .map(|place| {
                    map.get(place).copied().ok_or_else(|| LoadError::MissingPlace {
                        which,
                        place: place.clone(),
                    })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_net() -> Vec<RawTransition> {
        vec![
            RawTransition::new("t1", "a", vec![1, 0], vec![0, 1]),
            RawTransition::new("t2", "a", vec![0, 1], vec![1, 0]),
        ]
    }

    #[test]
    fn test_from_vectors() {
        let problem = Problem::from_vectors(vec![1, 0], vec![0, 1], swap_net()).unwrap();
        assert_eq!(problem.places(), 2);
        assert_eq!(problem.table().len(), 2);
        assert_eq!(problem.first(), &Marking::new(vec![1, 0]));
        assert_eq!(problem.table().candidates("a"), &[0, 1]);
    }

    #[test]
    fn test_dimension_mismatch_in_marking() {
        let err = Problem::from_vectors(vec![1, 0, 0], vec![0, 1], swap_net()).unwrap_err();
        assert_eq!(
            err,
            NetError::DimensionMismatch {
                what: "first marking".into(),
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn test_dimension_mismatch_in_transition() {
        let mut net = swap_net();
        net[1].after = vec![1];
        let err = Problem::from_vectors(vec![1, 0], vec![0, 1], net).unwrap_err();
        assert!(matches!(err, NetError::DimensionMismatch { ref what, .. } if what == "transition 't2' after"));
    }

    #[test]
    fn test_negative_count_rejected() {
        let err = Problem::from_vectors(vec![1, 0], vec![0, -3], swap_net()).unwrap_err();
        assert_eq!(
            err,
            NetError::NegativeCount {
                what: "second marking".into(),
                place: 1,
                value: -3,
            }
        );
    }

    #[test]
    fn test_oversized_count_rejected() {
        let mut net = swap_net();
        net[0].after = vec![0, i64::MAX];
        let err = Problem::from_vectors(vec![1, 0], vec![0, 1], net).unwrap_err();
        assert_eq!(
            err,
            NetError::CountTooLarge {
                what: "transition 't1' after".into(),
                place: 1,
                value: i64::MAX,
                limit: MAX_COUNT,
            }
        );

        let at_limit = MAX_COUNT as i64;
        let problem = Problem::from_vectors(vec![at_limit, 0], vec![0, 1], swap_net()).unwrap();
        assert_eq!(problem.first().get(0), MAX_COUNT);
        let err = Problem::from_vectors(vec![at_limit + 1, 0], vec![0, 1], swap_net()).unwrap_err();
        assert!(matches!(err, NetError::CountTooLarge { place: 0, .. }));
    }

    #[test]
    fn test_duplicate_transition_rejected() {
        let mut net = swap_net();
        net[1].id = "t1".into();
        let err = Problem::from_vectors(vec![1, 0], vec![0, 1], net).unwrap_err();
        assert_eq!(err, NetError::DuplicateTransition { id: "t1".into() });
    }

    #[test]
    fn test_no_transitions_uses_marking_dimension() {
        let problem = Problem::from_vectors(vec![1, 2, 3], vec![3, 2, 1], Vec::new()).unwrap();
        assert_eq!(problem.places(), 3);
        assert!(problem.table().is_empty());
    }

    #[test]
    fn test_vector_file() {
        let problem = Problem::from_json(
            r#"{
                "transitions": [
                    {"id": "t1", "label": "a", "before": [1, 0], "after": [0, 1]},
                    {"id": "t2", "before": [0, 1], "after": [1, 0]}
                ],
                "first": [1, 0],
                "second": [0, 1]
            }"#,
        )
        .unwrap();
        assert_eq!(problem.table().get(1).label, "t2");
        assert_eq!(problem.second(), &Marking::new(vec![0, 1]));
    }

    #[test]
    fn test_net_file_accumulates_arcs() {
        let problem = Problem::from_json(
            r#"{
                "places": ["p", "q"],
                "transitions": [{"id": "t1", "label": "a"}],
                "arcs": [
                    {"source": "p", "target": "t1"},
                    {"source": "p", "target": "t1"},
                    {"source": "t1", "target": "q", "weight": 3}
                ],
                "first": {"p": 2, "q": 0},
                "second": {"q": 1, "p": 0}
            }"#,
        )
        .unwrap();
        let t1 = problem.table().get(0);
        assert_eq!(t1.before, Marking::new(vec![2, 0]));
        assert_eq!(t1.after, Marking::new(vec![0, 3]));
        assert_eq!(problem.second(), &Marking::new(vec![0, 1]));
    }

    #[test]
    fn test_heavy_arcs_hit_the_count_limit() {
        let err = Problem::from_json(
            r#"{
                "places": ["p"],
                "transitions": [{"id": "t"}],
                "arcs": [
                    {"source": "t", "target": "p", "weight": 9223372036854775807},
                    {"source": "t", "target": "p", "weight": 9223372036854775807}
                ],
                "first": {"p": 0},
                "second": {"p": 0}
            }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Net(NetError::CountTooLarge { place: 0, .. })
        ));
    }

    #[test]
    fn test_net_file_errors() {
        let invalid_arc = r#"{
            "places": ["p"], "transitions": [{"id": "t"}],
            "arcs": [{"source": "p", "target": "p"}],
            "first": {"p": 0}, "second": {"p": 0}
        }"#;
        assert!(matches!(
            Problem::from_json(invalid_arc),
            Err(LoadError::InvalidArc { .. })
        ));

        let duplicate_place = r#"{
            "places": ["p", "p"], "transitions": [],
            "first": {"p": 0}, "second": {"p": 0}
        }"#;
        assert!(matches!(
            Problem::from_json(duplicate_place),
            Err(LoadError::DuplicatePlace { .. })
        ));

        let missing_place = r#"{
            "places": ["p", "q"], "transitions": [],
            "first": {"p": 0}, "second": {"p": 0, "q": 0}
        }"#;
        assert!(matches!(
            Problem::from_json(missing_place),
            Err(LoadError::MissingPlace { which: "first", .. })
        ));

        let unknown_place = r#"{
            "places": ["p"], "transitions": [],
            "first": {"p": 0}, "second": {"p": 0, "r": 1}
        }"#;
        assert!(matches!(
            Problem::from_json(unknown_place),
            Err(LoadError::UnknownPlace { which: "second", .. })
        ));

        let mixed = r#"{
            "places": ["p"], "transitions": [{"id": "t", "before": [1], "after": [0]}],
            "first": {"p": 0}, "second": {"p": 0}
        }"#;
        assert!(matches!(
            Problem::from_json(mixed),
            Err(LoadError::MixedFormat { .. })
        ));

        let no_vectors = r#"{
            "transitions": [{"id": "t"}], "first": [], "second": []
        }"#;
        assert!(matches!(
            Problem::from_json(no_vectors),
            Err(LoadError::MissingVectors { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Problem::from_json("{ not json"),
            Err(LoadError::Json(_))
        ));
    }
}
