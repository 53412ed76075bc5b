//! # Core Data Model
//! Shared value types for the extraction/sentiment pipeline: posts, sentiment
//! records, and the externally visible `StockMention`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentiment bucket derived from a compound score.
///
/// The thresholds here are the single source of truth for categorization;
/// every caller (per-fragment and aggregate) goes through `from_compound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentCategory {
    Positive,
    Negative,
    Neutral,
}

impl SentimentCategory {
    /// compound > 0.1 → Positive; compound < -0.1 → Negative; else Neutral.
    pub fn from_compound(compound: f64) -> Self {
        if compound > 0.1 {
            SentimentCategory::Positive
        } else if compound < -0.1 {
            SentimentCategory::Negative
        } else {
            SentimentCategory::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::Positive => "Positive",
            SentimentCategory::Negative => "Negative",
            SentimentCategory::Neutral => "Neutral",
        }
    }
}

impl std::fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched post: title, body and a flat list of comment texts.
/// Immutable once fetched; owned by the pipeline for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    /// Self-text body; empty string for link posts.
    pub content: String,
    pub comments: Vec<String>,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
}

/// Sentiment of one fragment or of an aggregate over fragments.
///
/// `positive + negative + neutral ≈ 1.0` for a single scored fragment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub category: SentimentCategory,
}

impl SentimentRecord {
    /// The defined floor for "nothing to score": exactly (0, 0, 0, 1, Neutral).
    pub fn neutral_floor() -> Self {
        Self {
            compound: 0.0,
            positive: 0.0,
            negative: 0.0,
            neutral: 1.0,
            category: SentimentCategory::Neutral,
        }
    }

    /// Build a record from raw proportions, deriving the category from the
    /// compound score.
    pub fn from_scores(compound: f64, positive: f64, negative: f64, neutral: f64) -> Self {
        Self {
            compound,
            positive,
            negative,
            neutral,
            category: SentimentCategory::from_compound(compound),
        }
    }
}

/// Externally visible result row: one ticker with its mention count and
/// aggregated sentiment. Serialized verbatim into the cache snapshot and
/// deserialized back field-for-field (timestamp included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMention {
    pub ticker: String,
    pub mention_count: u32,
    pub sentiment_score: f64,
    pub sentiment_category: SentimentCategory,
    pub last_updated: DateTime<Utc>,
}
