//! Error types for the graph store client and the extraction pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`GraphClient`](crate::graph::GraphClient).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable when the client was opened
    #[error("cannot reach graph store at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// Transport error while a query was in flight
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("graph store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Query was rejected by the server (`errors` array in the response)
    #[error("query failed: {0}")]
    Server(String),

    /// Response body was not the expected JSON shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Malformed(e.to_string())
    }
}

/// Errors surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot read host list {path}: {source}")]
    HostList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("worker pool failed: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
