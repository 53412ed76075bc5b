//! Failure taxonomy for the pipeline.
//!
//! None of these escape a full pipeline run; they exist so logs and internal
//! plumbing can name the failure class instead of passing bare strings around.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Feed unreachable or returned something we could not parse.
    /// Routes the pipeline to its fallback path.
    #[error("feed fetch failed")]
    Fetch(#[source] anyhow::Error),

    /// The sentiment oracle failed for a single ticker. Recovered per-entity
    /// with a neutral placeholder; never aborts the batch.
    #[error("sentiment scoring failed for {ticker}")]
    Scoring {
        ticker: String,
        #[source]
        source: anyhow::Error,
    },

    /// Persisted snapshot was unreadable or structurally invalid.
    /// Treated as cache-absent by the store.
    #[error("cache snapshot unreadable")]
    CacheCorruption(#[source] anyhow::Error),

    /// Limits non-positive or out of bounds. Rejected before the pipeline runs.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
