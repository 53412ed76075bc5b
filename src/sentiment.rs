//! # Sentiment Scoring & Aggregation
//! A lexicon-based sentiment oracle plus per-ticker aggregation over a batch
//! of posts.
//!
//! Ticker matching here is deliberately looser than extraction: a fragment
//! qualifies on raw case-insensitive substring containment, not on the
//! boundary-checked pattern from `extract`. Tightening it would change
//! observed results, so the looseness is kept.

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::{RedditPost, SentimentCategory, SentimentRecord};

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

/// VADER-style normalization constant for the compound score.
const NORM_ALPHA: f64 = 15.0;

/// Scores a single text fragment. Must be deterministic for identical input
/// and side-effect-free; distinct fragments can therefore be scored in any
/// order or in parallel.
pub trait SentimentOracle: Send + Sync {
    fn score(&self, text: &str) -> Result<SentimentRecord>;
}

/// Default oracle: embedded word-valence lexicon with negation handling.
#[derive(Debug, Clone, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_valence(&self, w: &str) -> f64 {
        *LEXICON.get(w).unwrap_or(&0.0)
    }

    /// Score one fragment: tokenwise lexicon lookup with negation flip, then
    /// compound normalization into [-1, 1] and pos/neg/neu proportions from
    /// token valence mass.
    fn score_fragment(&self, text: &str) -> SentimentRecord {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return SentimentRecord::neutral_floor();
        }

        let mut sum = 0.0f64;
        let mut pos_mass = 0.0f64;
        let mut neg_mass = 0.0f64;
        let mut neu_count = 0.0f64;

        for i in 0..tokens.len() {
            let base = self.word_valence(tokens[i].as_str());
            if base == 0.0 {
                neu_count += 1.0;
                continue;
            }

            // Negation within the last 1..=3 tokens inverts the sign.
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let v = if negated { -base } else { base };

            sum += v;
            if v > 0.0 {
                pos_mass += v + 1.0;
            } else {
                neg_mass += -v + 1.0;
            }
        }

        let compound = sum / (sum * sum + NORM_ALPHA).sqrt();
        let total = pos_mass + neg_mass + neu_count;
        if total == 0.0 {
            return SentimentRecord::neutral_floor();
        }

        SentimentRecord::from_scores(
            compound.clamp(-1.0, 1.0),
            pos_mass / total,
            neg_mass / total,
            neu_count / total,
        )
    }
}

impl SentimentOracle for LexiconAnalyzer {
    fn score(&self, text: &str) -> Result<SentimentRecord> {
        if text.trim().is_empty() {
            return Ok(SentimentRecord::neutral_floor());
        }
        Ok(self.score_fragment(text))
    }
}

/// Alphanumeric tokens, lower-cased. Apostrophes are kept inside tokens so
/// contraction negators ("isn't", "won't") survive tokenization.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|t| t.trim_matches('\'').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "doesn't"
            | "don't"
            | "didn't"
            | "without"
    )
}

/// Distribution of post-level sentiment across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Aggregates per-fragment oracle scores into one record per ticker.
pub struct SentimentAggregator<O = LexiconAnalyzer> {
    oracle: O,
}

impl Default for SentimentAggregator<LexiconAnalyzer> {
    fn default() -> Self {
        Self {
            oracle: LexiconAnalyzer::new(),
        }
    }
}

impl SentimentAggregator<LexiconAnalyzer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O: SentimentOracle> SentimentAggregator<O> {
    pub fn with_oracle(oracle: O) -> Self {
        Self { oracle }
    }

    /// Score a single fragment through the oracle.
    pub fn score_text(&self, text: &str) -> Result<SentimentRecord> {
        self.oracle.score(text)
    }

    /// Aggregate sentiment for `ticker` across every fragment that contains
    /// it (case-insensitive substring match against title, body, and each
    /// comment). Zero qualifying fragments is the defined neutral floor, not
    /// an error; an oracle failure on any fragment is.
    pub fn analyze_ticker(&self, posts: &[RedditPost], ticker: &str) -> Result<SentimentRecord> {
        let needle = ticker.to_uppercase();
        let mut fragments: Vec<&str> = Vec::new();

        for post in posts {
            if contains_ticker(&post.title, &needle) {
                fragments.push(&post.title);
            }
            if contains_ticker(&post.content, &needle) {
                fragments.push(&post.content);
            }
            for comment in &post.comments {
                if contains_ticker(comment, &needle) {
                    fragments.push(comment);
                }
            }
        }

        if fragments.is_empty() {
            return Ok(SentimentRecord::neutral_floor());
        }

        let mut compound_sum = 0.0;
        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neu_sum = 0.0;

        for text in &fragments {
            let r = self.oracle.score(text)?;
            compound_sum += r.compound;
            pos_sum += r.positive;
            neg_sum += r.negative;
            neu_sum += r.neutral;
        }

        let n = fragments.len() as f64;
        Ok(SentimentRecord::from_scores(
            compound_sum / n,
            pos_sum / n,
            neg_sum / n,
            neu_sum / n,
        ))
    }

    /// Batch map ticker → record over the same post set. Each ticker is
    /// scored independently; one failure does not affect the others.
    pub fn analyze_many(
        &self,
        posts: &[RedditPost],
        tickers: &[String],
    ) -> Vec<(String, Result<SentimentRecord>)> {
        tickers
            .iter()
            .map(|t| (t.clone(), self.analyze_ticker(posts, t)))
            .collect()
    }

    /// Post-level sentiment distribution: title + body scored as one text.
    pub fn summary(&self, posts: &[RedditPost]) -> Result<SentimentSummary> {
        let mut out = SentimentSummary::default();
        for post in posts {
            let combined = format!("{} {}", post.title, post.content);
            if combined.trim().is_empty() {
                continue;
            }
            let r = self.oracle.score(&combined)?;
            match r.category {
                SentimentCategory::Positive => out.positive += 1,
                SentimentCategory::Negative => out.negative += 1,
                SentimentCategory::Neutral => out.neutral += 1,
            }
        }
        Ok(out)
    }
}

fn contains_ticker(text: &str, ticker_upper: &str) -> bool {
    !text.is_empty() && text.to_uppercase().contains(ticker_upper)
}
