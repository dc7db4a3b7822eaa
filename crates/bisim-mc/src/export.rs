//! Read-only traversal of a finished proof and its serialized forms.

use crate::basis::Basis;
use crate::order::Scratch;
use crate::tree::{Direction, NodeId, Origin, ProofTree};
use bisim_net::{Marking, Transition, TransitionTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write proof artifact: {0}")]
    Io(#[from] io::Error),

    #[error("invalid proof artifact: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Container format for a proof artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    GraphMl,
}

/// Reachable nodes in pre-order, with the parent/child edges between them.
#[derive(Debug, Clone)]
pub struct Traversal {
    pub order: Vec<NodeId>,
    /// `(source, target)` as positions in `order`.
    pub edges: Vec<(usize, usize)>,
    ids: HashMap<NodeId, usize>,
}

impl Traversal {
    /// Walk the tree from the root, children in order.
    pub fn new(tree: &ProofTree) -> Self {
        let mut order = Vec::new();
        let mut edges = Vec::new();
        let mut ids = HashMap::new();
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            let seq = order.len();
            ids.insert(id, seq);
            order.push(id);
            if let Some(parent) = tree.node(id).parent {
                if let Some(&source) = ids.get(&parent) {
                    edges.push((source, seq));
                }
            }
            stack.extend(tree.node(id).children.iter().rev());
        }
        Self { order, edges, ids }
    }

    /// Pre-order id of a reachable node.
    pub fn id_of(&self, node: NodeId) -> Option<usize> {
        self.ids.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Offer every visited node to a fresh basis, in visiting order.
    pub fn basis(&self, tree: &ProofTree, places: usize) -> Basis {
        let mut scratch = Scratch::new(places);
        let mut basis = Basis::new();
        for &id in &self.order {
            basis.offer(tree, id, &mut scratch);
        }
        basis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Terminal {
    Success,
    Fail,
}

impl Terminal {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminal::Success => "SUCCESS",
            Terminal::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: String,
    pub label: String,
    pub effect: Vec<i64>,
}

impl From<&Transition> for TransitionRecord {
    fn from(t: &Transition) -> Self {
        Self {
            id: t.id.clone(),
            label: t.label.clone(),
            effect: t.effect(),
        }
    }
}

impl TransitionRecord {
    /// `id, label, [effect]`, the layout used in GraphML attributes.
    fn describe(&self) -> String {
        let effect: Vec<String> = self.effect.iter().map(i64::to_string).collect();
        format!("{}, {}, [{}]", self.id, self.label, effect.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRecord {
    pub delta: TransitionRecord,
    pub gamma: TransitionRecord,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: usize,
    pub first: Marking,
    pub second: Marking,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<ExpandRecord>,
    /// Id of the ancestor this node was reduced against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Terminal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisRecord {
    pub first: Marking,
    pub second: Marking,
}

/// Everything an external viewer needs to replay a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub bisimilar: bool,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub basis: Vec<BasisRecord>,
}

impl ProofArtifact {
    /// Build the artifact for a finished tree. `basis` is only exported
    /// when the proof succeeded; trivial members are left out.
    pub fn build(
        tree: &ProofTree,
        table: &TransitionTable,
        traversal: &Traversal,
        bisimilar: bool,
        basis: Option<&Basis>,
    ) -> Self {
        let nodes = traversal
            .order
            .iter()
            .enumerate()
            .map(|(seq, &id)| {
                let node = tree.node(id);
                let (expand, reduce) = match node.origin {
                    Origin::Root => (None, None),
                    Origin::Expand {
                        delta,
                        gamma,
                        direction,
                    } => (
                        Some(ExpandRecord {
                            delta: table.get(delta).into(),
                            gamma: table.get(gamma).into(),
                            direction,
                        }),
                        None,
                    ),
                    Origin::Reduce { ancestor } => (None, traversal.id_of(ancestor)),
                };
                let terminal = node.is_leaf().then(|| {
                    if node.pair.is_trivial() {
                        Terminal::Success
                    } else {
                        Terminal::Fail
                    }
                });
                NodeRecord {
                    id: seq,
                    first: node.first().clone(),
                    second: node.second().clone(),
                    expand,
                    reduce,
                    terminal,
                }
            })
            .collect();

        let edges = traversal
            .edges
            .iter()
            .map(|&(source, target)| EdgeRecord { source, target })
            .collect();

        let basis = match basis {
            Some(basis) if bisimilar => basis
                .members()
                .iter()
                .map(|&id| &tree.node(id).pair)
                .filter(|pair| !pair.is_trivial())
                .map(|pair| BasisRecord {
                    first: pair.first.clone(),
                    second: pair.second.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            bisimilar,
            nodes,
            edges,
            basis,
        }
    }

    /// Leaves whose two sides differ.
    pub fn failures(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes
            .iter()
            .filter(|n| n.terminal == Some(Terminal::Fail))
    }

    pub fn write(&self, format: ExportFormat, sink: impl Write) -> ExportResult<()> {
        match format {
            ExportFormat::Json => write_json(self, sink),
            ExportFormat::GraphMl => write_graphml(self, sink),
        }
    }
}

pub fn write_json(artifact: &ProofArtifact, mut sink: impl Write) -> ExportResult<()> {
    serde_json::to_writer_pretty(&mut sink, artifact)?;
    writeln!(sink)?;
    sink.flush()?;
    Ok(())
}

pub fn read_json(reader: impl Read) -> ExportResult<ProofArtifact> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write the artifact as GraphML. Node details are plain attributes so the
/// file can be read without resolving `<key>` declarations.
pub fn write_graphml(artifact: &ProofArtifact, mut sink: impl Write) -> ExportResult<()> {
    writeln!(sink, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(sink, r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#)?;
    writeln!(
        sink,
        r#"  <graph id="proof" edgedefault="directed" bisimilar="{}">"#,
        artifact.bisimilar
    )?;
    for node in &artifact.nodes {
        write!(
            sink,
            r#"    <node id="{}" first="{}" second="{}""#,
            node.id, node.first, node.second
        )?;
        if let Some(terminal) = node.terminal {
            write!(sink, r#" terminal="{}""#, terminal.as_str())?;
        }
        if let Some(expand) = &node.expand {
            write!(
                sink,
                r#" delta="{}" gamma="{}" order="{}""#,
                escape(&expand.delta.describe()),
                escape(&expand.gamma.describe()),
                expand.direction
            )?;
        }
        if let Some(ancestor) = node.reduce {
            write!(sink, r#" reduce="{ancestor}""#)?;
        }
        writeln!(sink, "/>")?;
    }
    for edge in &artifact.edges {
        writeln!(
            sink,
            r#"    <edge source="{}" target="{}"/>"#,
            edge.source, edge.target
        )?;
    }
    writeln!(sink, "  </graph>")?;
    if !artifact.basis.is_empty() {
        writeln!(sink, "  <basis>")?;
        for pair in &artifact.basis {
            writeln!(
                sink,
                r#"    <pair first="{}" second="{}"/>"#,
                pair.first, pair.second
            )?;
        }
        writeln!(sink, "  </basis>")?;
    }
    writeln!(sink, "</graphml>")?;
    sink.flush()?;
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
