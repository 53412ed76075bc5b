// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod cache;
pub mod error;
pub mod extract;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use crate::cache::{CacheSnapshot, CacheStore};
pub use crate::error::TrackerError;
pub use crate::extract::{MentionCount, TickerExtractor, TickerVocabulary};
pub use crate::feed::{RedditFeed, SourceFeed};
pub use crate::models::{RedditPost, SentimentCategory, SentimentRecord, StockMention};
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineStatus, RunOutcome, RunReport};
pub use crate::sentiment::{LexiconAnalyzer, SentimentAggregator, SentimentOracle};
