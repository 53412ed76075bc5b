// tests/pipeline_e2e.rs
// End-to-end pipeline runs against mock collaborators: fresh results, cache
// hits, per-ticker error isolation, and the fallback path.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reddit_sentiment_tracker::cache::CacheSnapshot;
use reddit_sentiment_tracker::models::{
    RedditPost, SentimentCategory, SentimentRecord, StockMention,
};
use reddit_sentiment_tracker::pipeline::{Pipeline, PipelineConfig, RunOutcome};
use reddit_sentiment_tracker::sentiment::{LexiconAnalyzer, SentimentOracle};
use reddit_sentiment_tracker::SourceFeed;

struct MockFeed {
    posts: Vec<RedditPost>,
    fail: bool,
}

#[async_trait]
impl SourceFeed for MockFeed {
    async fn fetch_sources(&self, limit: usize) -> Result<Vec<RedditPost>> {
        if self.fail {
            bail!("simulated network failure");
        }
        Ok(self.posts.iter().take(limit).cloned().collect())
    }
}

/// Oracle that fails for any fragment mentioning AAPL, real scores otherwise.
struct FlakyOracle(LexiconAnalyzer);

impl SentimentOracle for FlakyOracle {
    fn score(&self, text: &str) -> Result<SentimentRecord> {
        if text.to_uppercase().contains("AAPL") {
            bail!("oracle down for this fragment");
        }
        self.0.score(text)
    }
}

fn post(id: &str, title: &str, content: &str, comments: &[&str]) -> RedditPost {
    RedditPost {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        comments: comments.iter().map(|s| s.to_string()).collect(),
        created_utc: Utc::now(),
        score: 10,
    }
}

fn sample_posts() -> Vec<RedditPost> {
    vec![
        post("p1", "AAPL is great!", "Apple stock rocks", &[]),
        post("p2", "TSLA to the moon", "Tesla is amazing", &[]),
    ]
}

fn config(stock_limit: usize) -> PipelineConfig {
    PipelineConfig {
        post_limit: 50,
        stock_limit,
        ttl_minutes: 30,
    }
}

fn cache_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("cache.json")
}

#[tokio::test]
async fn fresh_run_ranks_and_scores_both_tickers() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::Fresh);
    assert_eq!(report.mentions.len(), 2);

    // Equal counts: first-encountered post wins the tie.
    assert_eq!(report.mentions[0].ticker, "AAPL");
    assert_eq!(report.mentions[1].ticker, "TSLA");
    for m in &report.mentions {
        assert_eq!(m.mention_count, 1);
        assert_eq!(m.sentiment_category, SentimentCategory::Positive);
        assert!(m.sentiment_score > 0.1);
    }
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let first = pipeline.run().await;
    assert_eq!(first.outcome, RunOutcome::Fresh);

    let second = pipeline.run().await;
    assert_eq!(second.outcome, RunOutcome::Cached);
    assert_eq!(second.mentions, first.mentions);

    assert_eq!(pipeline.cached(), Some(first.mentions));
}

#[tokio::test]
async fn scoring_failure_is_isolated_per_ticker() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let pipeline = Pipeline::with_oracle(
        Box::new(feed),
        FlakyOracle(LexiconAnalyzer::new()),
        config(5),
    )
    .unwrap()
    .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::Fresh);
    assert_eq!(report.mentions.len(), 2);

    let aapl = report
        .mentions
        .iter()
        .find(|m| m.ticker == "AAPL")
        .expect("AAPL still present");
    // Count preserved, neutral placeholder substituted.
    assert_eq!(aapl.mention_count, 1);
    assert_eq!(aapl.sentiment_score, 0.0);
    assert_eq!(aapl.sentiment_category, SentimentCategory::Neutral);

    let tsla = report
        .mentions
        .iter()
        .find(|m| m.ticker == "TSLA")
        .expect("TSLA present");
    assert_eq!(tsla.sentiment_category, SentimentCategory::Positive);
    assert!(tsla.sentiment_score > 0.1);
}

#[tokio::test]
async fn no_tickers_is_a_valid_empty_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: vec![post("p1", "nothing relevant in here", "just chatter", &[])],
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::Empty);
    assert!(report.mentions.is_empty());
}

#[tokio::test]
async fn fetch_failure_serves_stale_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_path(&dir);

    // Seed an expired snapshot with one entity.
    let stale = CacheSnapshot {
        timestamp: Utc::now() - Duration::minutes(120),
        entities: vec![StockMention {
            ticker: "AAPL".into(),
            mention_count: 7,
            sentiment_score: 0.25,
            sentiment_category: SentimentCategory::Positive,
            last_updated: Utc::now() - Duration::minutes(120),
        }],
        source_count: 12,
        ttl_minutes: 30,
    };
    std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

    let feed = MockFeed {
        posts: vec![],
        fail: true,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(path.clone());

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::FallbackStale);
    assert_eq!(report.mentions, stale.entities);
}

#[tokio::test]
async fn fetch_failure_without_cache_is_empty_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: vec![],
        fail: true,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::FallbackEmpty);
    assert!(report.mentions.is_empty());
}

#[tokio::test]
async fn zero_posts_routes_to_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: vec![],
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::FallbackEmpty);
}

#[tokio::test]
async fn changing_limits_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let mut pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let first = pipeline.run().await;
    assert_eq!(first.outcome, RunOutcome::Fresh);
    assert!(pipeline.cached().is_some());

    pipeline.reconfigure(config(3)).unwrap();
    assert!(pipeline.cached().is_none());

    // A new configuration is a new query: next run recomputes.
    let next = pipeline.run().await;
    assert_eq!(next.outcome, RunOutcome::Fresh);
}

#[tokio::test]
async fn force_refresh_recomputes_past_valid_cache() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    assert_eq!(pipeline.run().await.outcome, RunOutcome::Fresh);
    assert_eq!(pipeline.run().await.outcome, RunOutcome::Cached);
    assert_eq!(pipeline.force_refresh().await.outcome, RunOutcome::Fresh);
}

#[tokio::test]
async fn status_reflects_cache_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: sample_posts(),
        fail: false,
    };
    let pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let before = pipeline.status();
    assert!(!before.cache_available);
    assert!(!before.cache_valid);
    assert!(before.last_update.is_none());

    pipeline.run().await;

    let after = pipeline.status();
    assert!(after.cache_available);
    assert!(after.cache_valid);
    assert!(after.last_update.is_some());
    assert!(after.cache_expires.unwrap() > Utc::now());
}

#[tokio::test]
async fn custom_tickers_extend_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let feed = MockFeed {
        posts: vec![post("p1", "GMEV is printing", "", &[])],
        fail: false,
    };
    let mut pipeline = Pipeline::new(Box::new(feed), config(5))
        .unwrap()
        .with_cache_path(cache_path(&dir));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::Empty);

    pipeline.add_custom_tickers(["GMEV"]);
    assert!(pipeline.valid_tickers().contains(&"GMEV".to_string()));

    let report = pipeline.run().await;
    assert_eq!(report.outcome, RunOutcome::Fresh);
    assert_eq!(report.mentions[0].ticker, "GMEV");
}
