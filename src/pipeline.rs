//! # Processing Pipeline
//! Sequences cache check → fetch → extract → rank → sentiment → finalize,
//! with per-ticker error isolation and a fallback path that never raises.
//!
//! Each run walks a fixed state machine and reports which terminal outcome it
//! reached, so callers (and tests) can distinguish a fresh result from a
//! cache hit or a degraded fallback.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::error::TrackerError;
use crate::extract::TickerExtractor;
use crate::feed::SourceFeed;
use crate::models::{SentimentRecord, StockMention};
use crate::sentiment::{LexiconAnalyzer, SentimentAggregator, SentimentOracle};

pub const DEFAULT_CACHE_FILE: &str = "data_cache.json";

const MAX_POST_LIMIT: usize = 1000;
const MAX_STOCK_LIMIT: usize = 100;

/// Limits and cache lifetime for one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Posts to fetch per run.
    pub post_limit: usize,
    /// Maximum tickers in the result.
    pub stock_limit: usize,
    /// Cache lifetime.
    pub ttl_minutes: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            post_limit: 200,
            stock_limit: 20,
            ttl_minutes: 30,
        }
    }
}

impl PipelineConfig {
    /// Reject non-positive or out-of-bound limits before they reach the
    /// pipeline.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.post_limit == 0 || self.post_limit > MAX_POST_LIMIT {
            return Err(TrackerError::Configuration(format!(
                "post_limit must be in 1..={MAX_POST_LIMIT}, got {}",
                self.post_limit
            )));
        }
        if self.stock_limit == 0 || self.stock_limit > MAX_STOCK_LIMIT {
            return Err(TrackerError::Configuration(format!(
                "stock_limit must be in 1..={MAX_STOCK_LIMIT}, got {}",
                self.stock_limit
            )));
        }
        if self.ttl_minutes <= 0 {
            return Err(TrackerError::Configuration(format!(
                "ttl_minutes must be positive, got {}",
                self.ttl_minutes
            )));
        }
        Ok(())
    }
}

/// Terminal state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Recomputed from a fresh fetch and written through the cache.
    Fresh,
    /// Served from a still-valid cache snapshot; nothing recomputed.
    Cached,
    /// Fetch succeeded but no ticker qualified. Valid result, not a failure.
    Empty,
    /// Fetch failed; an expired-but-loadable snapshot was served instead.
    FallbackStale,
    /// Fetch failed and no snapshot existed; empty result as last resort.
    FallbackEmpty,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub mentions: Vec<StockMention>,
    pub outcome: RunOutcome,
}

/// Cache/processing state for status endpoints and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatus {
    pub cache_available: bool,
    pub cache_valid: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub cache_expires: Option<DateTime<Utc>>,
}

/// Owns the collaborators and drives one run at a time.
pub struct Pipeline<O: SentimentOracle = LexiconAnalyzer> {
    feed: Box<dyn SourceFeed>,
    extractor: TickerExtractor,
    sentiment: SentimentAggregator<O>,
    cache: CacheStore,
    config: PipelineConfig,
}

impl Pipeline<LexiconAnalyzer> {
    /// Pipeline with the default lexicon oracle and vocabulary.
    pub fn new(feed: Box<dyn SourceFeed>, config: PipelineConfig) -> Result<Self, TrackerError> {
        Self::with_oracle(feed, LexiconAnalyzer::new(), config)
    }
}

impl<O: SentimentOracle> Pipeline<O> {
    pub fn with_oracle(
        feed: Box<dyn SourceFeed>,
        oracle: O,
        config: PipelineConfig,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            feed,
            extractor: TickerExtractor::new(),
            sentiment: SentimentAggregator::with_oracle(oracle),
            cache: CacheStore::new(DEFAULT_CACHE_FILE, config.ttl_minutes),
            config,
        })
    }

    /// Redirect the cache to a different file (tests, multiple instances).
    pub fn with_cache_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.cache = CacheStore::new(path, self.config.ttl_minutes);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Apply a new configuration. Changing either limit invalidates the
    /// current cache: a new configuration is a new query.
    pub fn reconfigure(&mut self, config: PipelineConfig) -> Result<(), TrackerError> {
        config.validate()?;
        let limits_changed = config.post_limit != self.config.post_limit
            || config.stock_limit != self.config.stock_limit;
        if limits_changed {
            info!(
                post_limit = config.post_limit,
                stock_limit = config.stock_limit,
                "limits changed, invalidating cache"
            );
            self.cache.invalidate();
        }
        if config.ttl_minutes != self.config.ttl_minutes {
            self.cache = CacheStore::new(self.cache.path().to_path_buf(), config.ttl_minutes);
        }
        self.config = config;
        Ok(())
    }

    /// Add custom symbols to the extraction vocabulary.
    pub fn add_custom_tickers<S: AsRef<str>>(&mut self, tickers: impl IntoIterator<Item = S>) {
        self.extractor.vocabulary_mut().add(tickers);
    }

    /// Remove symbols from the extraction vocabulary.
    pub fn remove_tickers<S: AsRef<str>>(&mut self, tickers: impl IntoIterator<Item = S>) {
        self.extractor.vocabulary_mut().remove(tickers);
    }

    pub fn valid_tickers(&self) -> Vec<String> {
        self.extractor.vocabulary().valid_tickers()
    }

    /// Run the full pipeline. Never fails outward: every internal failure is
    /// absorbed into a fallback outcome.
    pub async fn run(&self) -> RunReport {
        // CheckCache: a valid snapshot short-circuits the whole run.
        if let Some(snap) = self.cache.load() {
            if self.cache.is_valid(&snap) {
                info!(entities = snap.entities.len(), "serving valid cache snapshot");
                return RunReport {
                    mentions: snap.entities,
                    outcome: RunOutcome::Cached,
                };
            }
        }

        // Fetch
        info!(post_limit = self.config.post_limit, "fetching posts");
        let posts = match self.feed.fetch_sources(self.config.post_limit).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(error = ?TrackerError::Fetch(e), "feed fetch failed");
                return self.fallback();
            }
        };
        if posts.is_empty() {
            warn!("feed returned zero posts");
            return self.fallback();
        }
        info!(posts = posts.len(), "posts fetched");

        // Extract + RankMentions
        let table = self.extractor.top_mentioned(&posts, self.config.stock_limit);
        if table.is_empty() {
            // Distinct from fetch failure: the feed worked, nothing qualified.
            info!("no tickers found in fetched posts");
            return RunReport {
                mentions: Vec::new(),
                outcome: RunOutcome::Empty,
            };
        }
        info!(tickers = table.len(), "ranked mention table built");

        // ScoreSentiment: partial-failure map, one ticker never sinks the rest.
        let tickers: Vec<String> = table.iter().map(|m| m.ticker.clone()).collect();
        let scored = self.sentiment.analyze_many(&posts, &tickers);

        let now = Utc::now();
        let mut mentions: Vec<StockMention> = Vec::with_capacity(table.len());
        for (row, (ticker, result)) in table.iter().zip(scored) {
            debug_assert_eq!(row.ticker, ticker);
            let record = result.unwrap_or_else(|e| {
                error!(
                    error = ?TrackerError::Scoring { ticker: ticker.clone(), source: e },
                    "scoring failed, substituting neutral placeholder"
                );
                SentimentRecord::neutral_floor()
            });
            mentions.push(StockMention {
                ticker,
                mention_count: row.count,
                sentiment_score: record.compound,
                sentiment_category: record.category,
                last_updated: now,
            });
        }

        // Finalize: stable sort keeps the rank table's tie order.
        mentions.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
        self.cache.save(&mentions, posts.len());
        info!(entities = mentions.len(), "pipeline run complete");

        RunReport {
            mentions,
            outcome: RunOutcome::Fresh,
        }
    }

    /// Clear the cache and recompute.
    pub async fn force_refresh(&self) -> RunReport {
        self.cache.invalidate();
        self.run().await
    }

    /// Currently cached mentions, only if the snapshot is still valid.
    pub fn cached(&self) -> Option<Vec<StockMention>> {
        let snap = self.cache.load()?;
        if self.cache.is_valid(&snap) {
            Some(snap.entities)
        } else {
            None
        }
    }

    /// Cache availability/validity plus last-update and expiry timestamps.
    pub fn status(&self) -> PipelineStatus {
        match self.cache.load() {
            Some(snap) => {
                let valid = self.cache.is_valid(&snap);
                let expires = valid
                    .then(|| snap.timestamp + Duration::minutes(self.config.ttl_minutes));
                PipelineStatus {
                    cache_available: true,
                    cache_valid: valid,
                    last_update: Some(snap.timestamp),
                    cache_expires: expires,
                }
            }
            None => PipelineStatus {
                cache_available: false,
                cache_valid: false,
                last_update: None,
                cache_expires: None,
            },
        }
    }

    /// Last-resort path: load whatever snapshot exists regardless of
    /// validity; otherwise an empty result. Never raises.
    fn fallback(&self) -> RunReport {
        if let Some(snap) = self.cache.load() {
            warn!(
                entities = snap.entities.len(),
                valid = self.cache.is_valid(&snap),
                "serving cache snapshot as fallback"
            );
            return RunReport {
                mentions: snap.entities,
                outcome: RunOutcome::FallbackStale,
            };
        }
        warn!("no fallback snapshot available, returning empty result");
        RunReport {
            mentions: Vec::new(),
            outcome: RunOutcome::FallbackEmpty,
        }
    }
}
