//! Error types for morphology construction, queries and transforms.

use crate::NodeId;
use thiserror::Error;

/// Result type alias for morphology operations.
pub type Result<T> = std::result::Result<T, MorphologyError>;

#[derive(Error, Debug)]
pub enum MorphologyError {
    /// A record could not be parsed or is structurally invalid
    /// (duplicate ID, dangling parent, bad geometry).
    #[error("malformed record at {location}: {reason}")]
    MalformedRecord { location: String, reason: String },

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Angle requested over two points that coincide.
    #[error("degenerate edge between nodes {from} and {to}: zero length")]
    DegenerateEdge { from: NodeId, to: NodeId },

    #[error("invalid SWC type code {0}: expected 0..=7")]
    InvalidType(i64),

    #[error("no edge between nodes {from} and {to}")]
    MissingEdge { from: NodeId, to: NodeId },

    #[error("non-finite transform parameter: {0}")]
    NonFiniteTransform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MorphologyError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the NeuroMorpho.org client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("key {field} is not a valid search parameter; must be one of: {permitted:?}")]
    InvalidSearchField { field: String, permitted: Vec<String> },

    #[error("invalid neuron or archive name {0:?}")]
    InvalidName(String),

    /// The server answered with an HTML page instead of SWC text.
    #[error("failed to fetch {0}: server returned HTML")]
    HtmlResponse(String),

    #[error(transparent)]
    Morphology(#[from] MorphologyError),
}
