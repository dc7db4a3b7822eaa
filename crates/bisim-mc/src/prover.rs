//! Expand/Reduce proof search.
//!
//! `expand` unfolds one round of the bisimulation game for an obligation:
//! every transition fired by either side must be answered by a same-label
//! transition of the other side. `reduce` contracts an obligation that
//! dominates one of its ancestors (read either way round) before expanding
//! it, which is what keeps the tree finite on instances the procedure can
//! decide.
//!
//! Every child is written as `(side that moved, side that answered)`, so a
//! move of the second marking swaps the sides in the child.
//!
//! The two recurse into each other. There is no step or time bound here: on
//! instances whose obligations never dominate an ancestor the
//! search does not terminate, and callers that need a bound must run it
//! under their own watchdog.

use crate::order::Scratch;
use crate::tree::{Direction, NodeId, Origin, Pair, ProofTree};
use bisim_net::{Marking, TransitionTable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Lock-free progress counters shared between the prover and an observer.
/// The prover only ever stores into them.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    pub expansions: AtomicUsize,
    pub reductions: AtomicUsize,
    pub retries: AtomicUsize,
    /// Arena slots currently in use.
    pub nodes: AtomicUsize,
    /// Deepest node expanded so far.
    pub depth: AtomicUsize,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Counters collected over one proof search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProofStats {
    pub expansions: usize,
    pub reductions: usize,
    /// Times a node discarded its children and rebuilt them.
    pub retries: usize,
    pub max_depth: usize,
    /// Arena slots in use when the search ended.
    pub nodes: usize,
}

/// A child obligation ready to be attached, with the search position that
/// produced it.
struct Move {
    pair: Pair,
    delta: usize,
    gamma: usize,
    direction: Direction,
    /// Index of `gamma` in `delta`'s candidate list.
    position: usize,
}

pub struct Prover<'a> {
    table: &'a TransitionTable,
    tree: ProofTree,
    scratch: Scratch,
    /// Output buffer for counterpart search.
    answer: Marking,
    stats: ProofStats,
    progress: Option<Arc<ProgressCounters>>,
}

impl<'a> Prover<'a> {
    /// Prepare a search for `(first, second)`. Both markings and every
    /// transition in `table` must share one dimension.
    pub fn new(table: &'a TransitionTable, first: Marking, second: Marking) -> Self {
        let places = first.places();
        Self {
            table,
            tree: ProofTree::new(Pair::new(first, second)),
            scratch: Scratch::new(places),
            answer: Marking::zeros(places),
            stats: ProofStats::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressCounters>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the search from the root. Returns true if the two markings were
    /// shown bisimilar.
    pub fn prove(&mut self) -> bool {
        let root = self.tree.root();
        self.expand(root)
    }

    pub fn tree(&self) -> &ProofTree {
        &self.tree
    }

    pub fn into_tree(self) -> ProofTree {
        self.tree
    }

    pub fn stats(&self) -> ProofStats {
        ProofStats {
            nodes: self.tree.slots(),
            ..self.stats
        }
    }

    pub(crate) fn expand(&mut self, id: NodeId) -> bool {
        self.stats.expansions += 1;
        let depth = self.tree.node(id).depth;
        self.stats.max_depth = self.stats.max_depth.max(depth);
        if let Some(progress) = &self.progress {
            progress.expansions.store(self.stats.expansions, Ordering::Relaxed);
            progress.depth.store(self.stats.max_depth, Ordering::Relaxed);
            progress.nodes.store(self.tree.slots(), Ordering::Relaxed);
        }

        if self.tree.node(id).pair.is_trivial() {
            return true;
        }
        debug!(node = %id, depth, pair = %self.tree.node(id).pair, "expand");

        loop {
            let Some(moves) = self.build_moves(id) else {
                debug!(node = %id, "unanswered move, obligation fails");
                return false;
            };

            // A new attempt replaces the previous one. Everything allocated
            // since the previous attempt's first child belongs to it.
            if let Some(&first_child) = self.tree.node(id).children.first() {
                self.tree.discard_children(id, first_child.index());
            }

            let mut children = Vec::with_capacity(moves.len());
            for m in &moves {
                let origin = Origin::Expand {
                    delta: m.delta,
                    gamma: m.gamma,
                    direction: m.direction,
                };
                children.push(self.tree.add_child(id, m.pair.clone(), origin));
            }

            let failed = children.iter().position(|&child| !self.reduce(child));
            let Some(pos) = failed else {
                return true;
            };

            // Keep the failing attempt visible up to the child that broke it,
            // and move that child's counterpart search past its answer.
            self.tree.truncate_children(id, pos + 1);
            let m = &moves[pos];
            self.tree
                .node_mut(id)
                .cursors
                .set(m.delta, m.direction, m.position + 1);
            self.stats.retries += 1;
            if let Some(progress) = &self.progress {
                progress.retries.store(self.stats.retries, Ordering::Relaxed);
            }
            debug!(
                node = %id,
                delta = %self.table.get(m.delta).id,
                gamma = %self.table.get(m.gamma).id,
                direction = %m.direction,
                "child failed, retrying with next counterpart"
            );
        }
    }

    /// Compute one child per (transition, direction) without touching the
    /// tree. Returns None as soon as some move has no answer left.
    fn build_moves(&mut self, id: NodeId) -> Option<Vec<Move>> {
        let mut moves = Vec::with_capacity(2 * self.table.len());
        for delta in 0..self.table.len() {
            for direction in Direction::BOTH {
                moves.push(self.answer_move(id, delta, direction)?);
            }
        }
        Some(moves)
    }

    /// Search `delta`'s candidates, from the saved cursor on, for a
    /// counterpart that answers `delta` fired on the `direction` side.
    /// Leaves the cursor on the answer found, or past the end if none.
    fn answer_move(&mut self, id: NodeId, delta: usize, direction: Direction) -> Option<Move> {
        let table = self.table;
        let fired = table.get(delta);
        let candidates = table.candidates_for(delta);

        let node = self.tree.node(id);
        let (mover, responder) = match direction {
            Direction::Direct => (node.first(), node.second()),
            Direction::Reverse => (node.second(), node.first()),
        };
        let start = node.cursors.get(delta, direction);

        for (position, &gamma) in candidates.iter().enumerate().skip(start) {
            let answer = table.get(gamma);
            if !Marking::mirror_transition(responder, mover, fired, answer, &mut self.answer) {
                trace!(node = %id, delta = %fired.id, gamma = %answer.id, "counterpart rejected");
                continue;
            }
            let proposed = Marking::weak_transition(mover, fired);
            let answered = self.answer.clone();
            let pair = Pair::new(proposed, answered);
            self.tree
                .node_mut(id)
                .cursors
                .set(delta, direction, position);
            return Some(Move {
                pair,
                delta,
                gamma,
                direction,
                position,
            });
        }

        self.tree
            .node_mut(id)
            .cursors
            .set(delta, direction, candidates.len());
        None
    }

    pub(crate) fn reduce(&mut self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if self.tree.node(current).pair.is_trivial() {
                return true;
            }
            let Some((ancestor, second)) = self.dominated_ancestor(current) else {
                return self.expand(current);
            };
            let first = self.tree.node(current).first().clone();
            let pair = Pair::new(first, second);
            debug!(node = %current, ancestor = %ancestor, reduced = %pair, "reduce");
            current = self
                .tree
                .add_child(current, pair, Origin::Reduce { ancestor });
            self.stats.reductions += 1;
            if let Some(progress) = &self.progress {
                progress.reductions.store(self.stats.reductions, Ordering::Relaxed);
            }
        }
    }

    /// Nearest ancestor that `id` dominates, as is or with the ancestor's
    /// sides exchanged, with the contracted second side built from that
    /// comparison.
    fn dominated_ancestor(&mut self, id: NodeId) -> Option<(NodeId, Marking)> {
        let tree = &self.tree;
        let scratch = &mut self.scratch;
        let pair = &tree.node(id).pair;
        for ancestor in tree.ancestors(id) {
            let above = &tree.node(ancestor).pair;
            if scratch.dominates(pair, above) || scratch.dominates_swapped(pair, above) {
                return Some((ancestor, scratch.reduced_second()));
            }
        }
        None
    }
}
