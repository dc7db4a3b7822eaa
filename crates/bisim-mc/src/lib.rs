//! Proof-tree prover for resource bisimilarity of labelled Petri nets.

pub mod basis;
pub mod checker;
pub mod export;
pub mod order;
pub mod prover;
pub mod tree;

pub use basis::Basis;
pub use checker::{check, check_bisimilarity, CheckConfig, Proof};
pub use export::{
    read_json, write_graphml, write_json, ExportError, ExportFormat, ExportResult, ProofArtifact,
    Terminal, Traversal,
};
pub use order::Scratch;
pub use prover::{ProgressCounters, ProofStats, Prover};
pub use tree::{Direction, NodeId, Origin, Pair, ProofTree};
