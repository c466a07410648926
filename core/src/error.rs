use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the query service. Anything else is recovered internally
/// into an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// No index has been built yet (e.g. empty corpus at startup).
    #[error("index not ready")]
    NotReady,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Why a single knowledge-base record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("record has no ticket id")]
    MissingId,
    #[error("ticket {0} has an empty problem description")]
    EmptyDescription(String),
    #[error("ticket {0} already exists")]
    DuplicateId(String),
    #[error("ticket {0} has no indexable terms")]
    NoTerms(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum KbError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no knowledge-base files found under {}", .0.display())]
    Empty(PathBuf),
}
