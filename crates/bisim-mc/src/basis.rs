//! Antichain of obligations collected while walking a finished proof.

use crate::order::Scratch;
use crate::tree::{NodeId, ProofTree};

/// Maximal obligations seen so far under dominance. No member dominates
/// another.
#[derive(Debug, Clone, Default)]
pub struct Basis {
    members: Vec<NodeId>,
}

impl Basis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a node. Members it dominates are dropped; it is kept unless a
    /// remaining member dominates it. Returns true if it was inserted.
    pub fn offer(&mut self, tree: &ProofTree, id: NodeId, scratch: &mut Scratch) -> bool {
        let pair = &tree.node(id).pair;
        self.members
            .retain(|&m| !scratch.dominates(pair, &tree.node(m).pair));
        if self
            .members
            .iter()
            .any(|&m| scratch.dominates(&tree.node(m).pair, pair))
        {
            return false;
        }
        self.members.push(id);
        true
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if no two distinct members are comparable.
    pub fn is_antichain(&self, tree: &ProofTree, scratch: &mut Scratch) -> bool {
        for (i, &a) in self.members.iter().enumerate() {
            for &b in &self.members[i + 1..] {
                let (x, y) = (&tree.node(a).pair, &tree.node(b).pair);
                if scratch.dominates(x, y) || scratch.dominates(y, x) {
                    return false;
                }
            }
        }
        true
    }
}
