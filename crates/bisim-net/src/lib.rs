//! Markings, labelled transition tables and problem loading for the
//! resource bisimilarity prover.

pub mod error;
pub mod marking;
pub mod net;
pub mod pnml;
pub mod problem;

pub use error::{LoadError, LoadResult, NetError, NetResult};
pub use marking::{Count, Marking, MAX_COUNT};
pub use net::{Transition, TransitionTable};
pub use pnml::{PnmlNet, Resources};
pub use problem::{Problem, ProblemFile, RawTransition};
