//! PNML nets with a CSV resources table.
//!
//! The net file is PNML. Every `place`, `transition` and `arc` element is
//! read wherever it sits in the document, and namespaces are ignored. A
//! transition's label is the text of its `<name><text>` child, or its id
//! when it has no name. Each arc adds one token to the connected transition's
//! input or output. A PNML `<inscription><text>` sets a different weight.
//!
//! The resources file is a CSV table with exactly three rows: the place ids
//! (any order), the first marking and the second marking. Every body cell
//! must be a plain non-negative integer:
//!
//! ```text
//! p,q
//! 1,0
//! 0,1
//! ```

use crate::error::{LoadError, LoadResult, NetError};
use crate::problem::{Problem, RawTransition};
use roxmltree::{Document, Node};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use tracing::debug;

/// Places and transitions read from a PNML document.
#[derive(Debug, Clone)]
pub struct PnmlNet {
    places: Vec<String>,
    transitions: Vec<RawTransition>,
}

impl PnmlNet {
    pub fn parse(text: &str) -> LoadResult<Self> {
        let doc = Document::parse(text)?;

        let mut places = Vec::new();
        let mut place_index = HashMap::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("place")) {
            let id = required_attribute(node, "id")?;
            if place_index.insert(id, places.len()).is_some() {
                return Err(LoadError::DuplicatePlace { id: id.to_string() });
            }
            places.push(id.to_string());
        }

        let mut transitions = Vec::new();
        let mut transition_index = HashMap::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("transition")) {
            let id = required_attribute(node, "id")?;
            if transition_index.insert(id, transitions.len()).is_some() {
                return Err(NetError::DuplicateTransition { id: id.to_string() }.into());
            }
            let label = child_text(node, "name").unwrap_or(id);
            transitions.push(RawTransition::new(
                id,
                label,
                vec![0; places.len()],
                vec![0; places.len()],
            ));
        }

        for arc in doc.descendants().filter(|n| n.has_tag_name("arc")) {
            let source = required_attribute(arc, "source")?;
            let target = required_attribute(arc, "target")?;
            let weight = arc_weight(arc, source, target)?;
            match (
                place_index.get(source),
                transition_index.get(target),
                transition_index.get(source),
                place_index.get(target),
            ) {
                (Some(&place), Some(&trans), _, _) => {
                    let slot = &mut transitions[trans].before[place];
                    *slot = slot.saturating_add(weight);
                }
                (_, _, Some(&trans), Some(&place)) => {
                    let slot = &mut transitions[trans].after[place];
                    *slot = slot.saturating_add(weight);
                }
                _ => {
                    return Err(LoadError::InvalidArc {
                        from: source.to_string(),
                        to: target.to_string(),
                    })
                }
            }
        }

        debug!(
            places = places.len(),
            transitions = transitions.len(),
            "pnml net parsed"
        );
        Ok(Self {
            places,
            transitions,
        })
    }

    /// Place ids in document order.
    pub fn places(&self) -> &[String] {
        &self.places
    }

    pub fn transitions(&self) -> &[RawTransition] {
        &self.transitions
    }

    /// Pair the net with a resources table and validate the result.
    pub fn into_problem(self, resources: &Resources) -> LoadResult<Problem> {
        let (first, second) = resources.markings(&self.places)?;
        Ok(Problem::from_vectors(first, second, self.transitions)?)
    }
}

fn required_attribute<'a>(node: Node<'a, '_>, attribute: &'static str) -> LoadResult<&'a str> {
    node.attribute(attribute)
        .ok_or_else(|| LoadError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute,
        })
}

/// Trimmed text of `<child><text>...</text></child>` directly under `node`.
fn child_text<'a>(node: Node<'a, '_>, child: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(child))?
        .children()
        .find(|c| c.has_tag_name("text"))?
        .text()
        .map(str::trim)
}

fn arc_weight(arc: Node<'_, '_>, source: &str, target: &str) -> LoadResult<i64> {
    let Some(text) = child_text(arc, "inscription") else {
        return Ok(1);
    };
    let weight: i64 = text.parse().map_err(|_| LoadError::InvalidInscription {
        from: source.to_string(),
        to: target.to_string(),
        text: text.to_string(),
    })?;
    if weight < 0 {
        return Err(LoadError::NegativeWeight {
            from: source.to_string(),
            to: target.to_string(),
            weight,
        });
    }
    Ok(weight)
}

/// The two markings of a resources table, keyed by place id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    counts: HashMap<String, (i64, i64)>,
}

impl Resources {
    pub fn from_csv(reader: impl Read) -> LoadResult<Self> {
        let mut table = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        let rows = table.records().collect::<Result<Vec<_>, _>>()?;
        let [places, first, second] = rows.as_slice() else {
            return Err(LoadError::ResourceRows { found: rows.len() });
        };

        let mut counts = HashMap::with_capacity(places.len());
        for ((place, r), s) in places.iter().zip(first).zip(second) {
            let place = place.trim();
            let pair = (parse_count(place, r)?, parse_count(place, s)?);
            if counts.insert(place.to_string(), pair).is_some() {
                return Err(LoadError::DuplicatePlace {
                    id: place.to_string(),
                });
            }
        }
        Ok(Self { counts })
    }

    /// First and second marking in the order of `places`. The table must
    /// name exactly those places.
    pub fn markings(&self, places: &[String]) -> LoadResult<(Vec<i64>, Vec<i64>)> {
        let declared: HashSet<&str> = places.iter().map(String::as_str).collect();
        if let Some(unknown) = self.counts.keys().find(|k| !declared.contains(k.as_str())) {
            return Err(LoadError::UnknownPlace {
                which: "resources",
                place: unknown.clone(),
            });
        }
        places
            .iter()
            .map(|place| {
                self.counts
                    .get(place)
                    .copied()
                    .ok_or_else(|| LoadError::MissingPlace {
                        which: "resources",
                        place: place.clone(),
                    })
            })
            .collect::<LoadResult<Vec<_>>>()
            .map(|pairs| pairs.into_iter().unzip())
    }
}

fn parse_count(place: &str, cell: &str) -> LoadResult<i64> {
    let cell = cell.trim();
    let invalid = || LoadError::InvalidCount {
        place: place.to_string(),
        text: cell.to_string(),
    };
    if cell.is_empty() || !cell.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    cell.parse().map_err(|_| invalid())
}

impl Problem {
    /// Parse a PNML net and a CSV resources table into a validated problem.
    pub fn from_pnml(net: &str, resources: impl Read) -> LoadResult<Self> {
        let resources = Resources::from_csv(resources)?;
        PnmlNet::parse(net)?.into_problem(&resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Marking;

    const SWAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pnml xmlns="http://www.pnml.org/version-2009/grammar/pnml">
  <net id="swap" type="http://www.pnml.org/version-2009/grammar/ptnet">
    <page id="page0">
      <place id="p"/>
      <place id="q"/>
      <transition id="t1"><name><text>a</text></name></transition>
      <transition id="t2"><name><text> a </text></name></transition>
      <arc id="a1" source="p" target="t1"/>
      <arc id="a2" source="t1" target="q"/>
      <arc id="a3" source="q" target="t2"/>
      <arc id="a4" source="t2" target="p"/>
    </page>
  </net>
</pnml>"#;

    #[test]
    fn test_parse_swap_net() {
        let net = PnmlNet::parse(SWAP).unwrap();
        assert_eq!(net.places(), &["p".to_string(), "q".to_string()]);
        assert_eq!(
            net.transitions(),
            &[
                RawTransition::new("t1", "a", vec![1, 0], vec![0, 1]),
                RawTransition::new("t2", "a", vec![0, 1], vec![1, 0]),
            ]
        );
    }

    #[test]
    fn test_problem_from_pnml_and_csv() {
        let problem = Problem::from_pnml(SWAP, "q,p\n1,0\n0,1\n".as_bytes()).unwrap();
        assert_eq!(problem.first(), &Marking::new(vec![0, 1]));
        assert_eq!(problem.second(), &Marking::new(vec![1, 0]));
        assert_eq!(problem.table().candidates("a"), &[0, 1]);
    }

    #[test]
    fn test_unnamed_transition_uses_id_and_arcs_accumulate() {
        let net = PnmlNet::parse(
            r#"<pnml><net id="n">
                <place id="p"/>
                <transition id="t"/>
                <arc id="a1" source="p" target="t"/>
                <arc id="a2" source="p" target="t"/>
                <arc id="a3" source="t" target="p">
                  <inscription><text>3</text></inscription>
                </arc>
            </net></pnml>"#,
        )
        .unwrap();
        assert_eq!(
            net.transitions(),
            &[RawTransition::new("t", "t", vec![2], vec![3])]
        );
    }

    #[test]
    fn test_pnml_errors() {
        assert!(matches!(
            PnmlNet::parse("<pnml><place id=\"p\"></pnml>"),
            Err(LoadError::Xml(_))
        ));
        assert!(matches!(
            PnmlNet::parse(r#"<pnml><place id="p"/><place id="p"/></pnml>"#),
            Err(LoadError::DuplicatePlace { .. })
        ));
        assert!(matches!(
            PnmlNet::parse(r#"<pnml><transition id="t"/><transition id="t"/></pnml>"#),
            Err(LoadError::Net(NetError::DuplicateTransition { .. }))
        ));
        assert!(matches!(
            PnmlNet::parse(r#"<pnml><place/></pnml>"#),
            Err(LoadError::MissingAttribute { attribute: "id", .. })
        ));
        assert!(matches!(
            PnmlNet::parse(
                r#"<pnml><place id="p"/><place id="q"/><arc source="p" target="q"/></pnml>"#
            ),
            Err(LoadError::InvalidArc { .. })
        ));
        assert!(matches!(
            PnmlNet::parse(
                r#"<pnml><place id="p"/><transition id="t"/>
                   <arc source="p" target="t"><inscription><text>two</text></inscription></arc>
                   </pnml>"#
            ),
            Err(LoadError::InvalidInscription { .. })
        ));
    }

    #[test]
    fn test_resources_errors() {
        assert!(matches!(
            Resources::from_csv("p,q\n1,0\n".as_bytes()),
            Err(LoadError::ResourceRows { found: 2 })
        ));
        assert!(matches!(
            Resources::from_csv("p,p\n1,0\n0,1\n".as_bytes()),
            Err(LoadError::DuplicatePlace { .. })
        ));
        assert!(matches!(
            Resources::from_csv("p,q\n1,-1\n0,1\n".as_bytes()),
            Err(LoadError::InvalidCount { .. })
        ));
        assert!(matches!(
            Resources::from_csv("p,q\n1,0\n0\n".as_bytes()),
            Err(LoadError::Csv(_))
        ));

        let places = vec!["p".to_string(), "q".to_string()];
        let missing = Resources::from_csv("p\n1\n0\n".as_bytes()).unwrap();
        assert!(matches!(
            missing.markings(&places),
            Err(LoadError::MissingPlace { which: "resources", .. })
        ));
        let unknown = Resources::from_csv("p,q,r\n1,0,0\n0,1,0\n".as_bytes()).unwrap();
        assert!(matches!(
            unknown.markings(&places),
            Err(LoadError::UnknownPlace { which: "resources", .. })
        ));
    }

    #[test]
    fn test_resources_feed_count_validation() {
        let err = Problem::from_pnml(SWAP, "p,q\n99999999999,0\n0,1\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Net(NetError::CountTooLarge { place: 0, .. })
        ));
    }
}
