//! flowgraph-features — connection neighbourhood feature extraction from a
//! Dgraph traffic graph.
//!
//! Modular structure:
//! - [`graph`] — Graph model, response records and the store client
//! - [`query`] — DQL query IR, similarity discretizer and query constructors
//! - [`pagination`] — Offset pagination over connection listings
//! - [`features`] — Record flattening and neighbourhood statistics
//! - [`output`] — CSV tables and host lists
//! - [`orchestrator`] — Operating modes and the per-host worker pool
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod graph;
pub mod query;
pub mod pagination;
pub mod features;
pub mod output;
pub mod orchestrator;
pub mod logging;

pub use config::ExtractorConfig;
pub use error::{PipelineError, PipelineResult, StoreError};
pub use graph::{DgraphHttpClient, Direction, DirectionPair, GraphClient};
pub use features::{FeatureRow, NeighbourhoodAggregator, Tabular};
pub use pagination::Paginator;
pub use orchestrator::{Mode, PoolReport, WorkerPool};
pub use logging::StructuredLogger;
