//! Input validation errors.

use thiserror::Error;

/// A precondition on the host-supplied vectors was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("{what} has {found} places, expected {expected}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("{what} has negative count {value} at place {place}")]
    NegativeCount {
        what: String,
        place: usize,
        value: i64,
    },

    #[error("{what} has count {value} at place {place}, above the limit of {limit}")]
    CountTooLarge {
        what: String,
        place: usize,
        value: i64,
        limit: u64,
    },

    #[error("duplicate transition id '{id}'")]
    DuplicateTransition { id: String },
}

/// Result type for input validation.
pub type NetResult<T> = Result<T, NetError>;

/// A problem file could not be turned into a valid problem.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed problem file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read problem: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate place id '{id}'")]
    DuplicatePlace { id: String },

    #[error("arc '{from}' -> '{to}' must connect a place and a transition")]
    InvalidArc { from: String, to: String },

    #[error("arc '{from}' -> '{to}' has negative weight {weight}")]
    NegativeWeight { from: String, to: String, weight: i64 },

    #[error("transition '{id}' needs explicit before/after vectors when no places are declared")]
    MissingVectors { id: String },

    #[error("transition '{id}' gives before/after vectors but the net declares places and arcs")]
    MixedFormat { id: String },

    #[error("{which} marking does not list place '{place}'")]
    MissingPlace { which: &'static str, place: String },

    #[error("{which} marking names unknown place '{place}'")]
    UnknownPlace { which: &'static str, place: String },

    #[error("malformed PNML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("malformed resources table: {0}")]
    Csv(#[from] csv::Error),

    #[error("<{element}> is missing its '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("arc '{from}' -> '{to}' has inscription '{text}', expected an integer")]
    InvalidInscription { from: String, to: String, text: String },

    #[error("resources table has {found} rows, expected 3 (place ids, first, second)")]
    ResourceRows { found: usize },

    #[error("resources table has '{text}' for place '{place}', expected a non-negative integer")]
    InvalidCount { place: String, text: String },

    #[error(transparent)]
    Net(#[from] NetError),
}

/// Result type for problem loading.
pub type LoadResult<T> = Result<T, LoadError>;
