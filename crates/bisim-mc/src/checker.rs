//! Running a proof search end to end.

use crate::basis::Basis;
use crate::export::{ExportFormat, ExportResult, ProofArtifact, Traversal};
use crate::prover::{ProgressCounters, ProofStats, Prover};
use crate::tree::ProofTree;
use bisim_net::{Marking, NetResult, Problem, RawTransition, TransitionTable};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Configuration for a bisimilarity check.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Collect an antichain basis while walking a successful proof.
    pub record_basis: bool,
    /// Shared progress counters: the prover stores into them, an observer
    /// reads them on its own schedule.
    pub progress: Option<Arc<ProgressCounters>>,
}

/// A finished proof search.
#[derive(Debug)]
pub struct Proof {
    pub bisimilar: bool,
    pub stats: ProofStats,
    pub elapsed: Duration,
    table: TransitionTable,
    first: Marking,
    tree: ProofTree,
    record_basis: bool,
}

impl Proof {
    pub fn tree(&self) -> &ProofTree {
        &self.tree
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Walk the reachable tree in pre-order.
    pub fn traverse(&self) -> Traversal {
        Traversal::new(&self.tree)
    }

    /// Antichain of the visited obligations, if basis recording was on.
    pub fn basis(&self, traversal: &Traversal) -> Option<Basis> {
        self.record_basis
            .then(|| traversal.basis(&self.tree, self.first.places()))
    }

    pub fn artifact(&self) -> ProofArtifact {
        let traversal = self.traverse();
        let basis = self.basis(&traversal);
        ProofArtifact::build(
            &self.tree,
            &self.table,
            &traversal,
            self.bisimilar,
            basis.as_ref(),
        )
    }

    pub fn export(&self, format: ExportFormat, sink: impl Write) -> ExportResult<()> {
        self.artifact().write(format, sink)
    }
}

/// Decide whether the two markings of `problem` are bisimilar.
///
/// Runs to completion on the calling thread. Deep proofs recurse deeply, so
/// hosts that need a time bound or a bigger stack run this on a worker
/// thread of their own.
pub fn check(problem: Problem, config: &CheckConfig) -> Proof {
    let (table, first, second) = problem.into_parts();
    info!(
        places = first.places(),
        transitions = table.len(),
        first = %first,
        second = %second,
        "checking bisimilarity"
    );

    let start = Instant::now();
    let mut prover = Prover::new(&table, first.clone(), second);
    if let Some(progress) = &config.progress {
        prover = prover.with_progress(Arc::clone(progress));
    }
    let bisimilar = prover.prove();
    let stats = prover.stats();
    let tree = prover.into_tree();
    let elapsed = start.elapsed();

    info!(
        bisimilar,
        expansions = stats.expansions,
        reductions = stats.reductions,
        retries = stats.retries,
        max_depth = stats.max_depth,
        nodes = stats.nodes,
        elapsed_ms = elapsed.as_millis() as u64,
        "check finished"
    );

    Proof {
        bisimilar,
        stats,
        elapsed,
        table,
        first,
        tree,
        record_basis: config.record_basis,
    }
}

/// Validate raw vectors, then prove. Invalid input is an error, a disproof
/// is `Ok(false)`.
pub fn check_bisimilarity(
    first: Vec<i64>,
    second: Vec<i64>,
    transitions: Vec<RawTransition>,
) -> NetResult<bool> {
    let problem = Problem::from_vectors(first, second, transitions)?;
    Ok(check(problem, &CheckConfig::default()).bisimilar)
}
