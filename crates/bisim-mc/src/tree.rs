//! Proof-tree arena.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`]. A
//! node's child list is the only owner of its children; the parent link is a
//! plain back-reference used for ancestor walks.

use bisim_net::Marking;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in the proof-tree arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of the obligation made the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The first marking fired, the second answered.
    Direct,
    /// The second marking fired, the first answered. Children of a reverse
    /// move list the second side's successor first.
    Reverse,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Direct, Direction::Reverse];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Direct => "direct",
            Direction::Reverse => "reverse",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        match self {
            Direction::Direct => 0,
            Direction::Reverse => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An obligation: the two markings must be shown bisimilar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub first: Marking,
    pub second: Marking,
}

impl Pair {
    pub fn new(first: Marking, second: Marking) -> Self {
        Self { first, second }
    }

    /// Both sides are the same marking, so the obligation holds outright.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.first == self.second
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// How a node came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Root,
    /// One side fired `delta`, the other answered with `gamma`.
    /// Both are positions in the transition table.
    Expand {
        delta: usize,
        gamma: usize,
        direction: Direction,
    },
    /// Contracted against `ancestor`.
    Reduce { ancestor: NodeId },
}

/// Saved positions in each transition's candidate list, one per direction.
#[derive(Debug, Clone, Default)]
pub struct Cursors {
    slots: Vec<[usize; 2]>,
}

impl Cursors {
    #[inline]
    pub fn get(&self, delta: usize, direction: Direction) -> usize {
        self.slots
            .get(delta)
            .map_or(0, |slot| slot[direction.slot()])
    }

    pub fn set(&mut self, delta: usize, direction: Direction, position: usize) {
        if self.slots.len() <= delta {
            self.slots.resize(delta + 1, [0, 0]);
        }
        self.slots[delta][direction.slot()] = position;
    }

    /// Sum over all cursors; strictly grows with every retry.
    pub fn total(&self) -> usize {
        self.slots.iter().map(|s| s[0] + s[1]).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub pair: Pair,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub origin: Origin,
    pub cursors: Cursors,
    pub depth: usize,
}

impl Node {
    #[inline]
    pub fn first(&self) -> &Marking {
        &self.pair.first
    }

    #[inline]
    pub fn second(&self) -> &Marking {
        &self.pair.second
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed proof tree.
#[derive(Debug, Clone)]
pub struct ProofTree {
    nodes: Vec<Node>,
}

impl ProofTree {
    /// Create a tree holding only the root obligation.
    pub fn new(root: Pair) -> Self {
        Self {
            nodes: vec![Node {
                pair: root,
                parent: None,
                children: Vec::new(),
                origin: Origin::Root,
                cursors: Cursors::default(),
                depth: 0,
            }],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Arena slots in use. Includes nodes detached from the tree when a
    /// failed attempt was cut short.
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a node under `parent` and append it to the parent's children.
    pub fn add_child(&mut self, parent: NodeId, pair: Pair, origin: Origin) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let depth = self.node(parent).depth + 1;
        self.nodes.push(Node {
            pair,
            parent: Some(parent),
            children: Vec::new(),
            origin,
            cursors: Cursors::default(),
            depth,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Drop `id`'s children and free every arena slot from `first_slot` on.
    ///
    /// Only valid while `id` is the deepest node still being worked on: all
    /// slots at or past `first_slot` must belong to `id`'s subtree.
    pub fn discard_children(&mut self, id: NodeId, first_slot: usize) {
        debug_assert!(first_slot > id.index());
        self.nodes.truncate(first_slot);
        self.nodes[id.index()].children.clear();
    }

    /// Keep only the first `len` children of `id`; later ones stay allocated
    /// but are no longer reachable.
    pub fn truncate_children(&mut self, id: NodeId, len: usize) {
        self.nodes[id.index()].children.truncate(len);
    }

    /// Iterate over the strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.node(id).parent,
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a ProofTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}
