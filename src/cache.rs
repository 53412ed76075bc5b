//! # Snapshot Cache
//! Persists the most recent pipeline result as a single JSON snapshot on
//! disk. Staleness is advisory: an expired snapshot stays loadable and is the
//! last-resort fallback when recomputation fails.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TrackerError;
use crate::models::StockMention;

/// The single persisted record. Any missing or unparsable field invalidates
/// the whole snapshot; there is no partial salvage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub timestamp: DateTime<Utc>,
    pub entities: Vec<StockMention>,
    pub source_count: usize,
    pub ttl_minutes: i64,
}

/// File-backed store for exactly one [`CacheSnapshot`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, ttl_minutes: i64) -> Self {
        Self {
            path: path.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.num_minutes()
    }

    /// Overwrite the stored snapshot with the given mentions and the current
    /// wall-clock timestamp. A write failure is logged and swallowed: the
    /// caller still has the freshly computed result.
    pub fn save(&self, mentions: &[StockMention], source_count: usize) {
        let snapshot = CacheSnapshot {
            timestamp: Utc::now(),
            entities: mentions.to_vec(),
            source_count,
            ttl_minutes: self.ttl.num_minutes(),
        };
        match self.write_snapshot(&snapshot) {
            Ok(()) => info!(entities = mentions.len(), source_count, "cache saved"),
            Err(e) => warn!(error = ?e, path = %self.path.display(), "cache save failed"),
        }
    }

    /// Load the stored snapshot. Absent file and unreadable/corrupt content
    /// both come back as `None`; corruption is logged, never propagated.
    pub fn load(&self) -> Option<CacheSnapshot> {
        if !self.path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    error = ?TrackerError::CacheCorruption(e.into()),
                    path = %self.path.display(),
                    "cache unreadable"
                );
                return None;
            }
        };
        match serde_json::from_str::<CacheSnapshot>(&raw) {
            Ok(snap) => Some(snap),
            Err(e) => {
                warn!(
                    error = ?TrackerError::CacheCorruption(e.into()),
                    path = %self.path.display(),
                    "cache snapshot malformed, treating as absent"
                );
                None
            }
        }
    }

    /// True iff the snapshot is younger than the configured TTL.
    pub fn is_valid(&self, snapshot: &CacheSnapshot) -> bool {
        Utc::now() - snapshot.timestamp < self.ttl
    }

    /// Delete the stored snapshot. Idempotent: no error if nothing exists.
    pub fn invalidate(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(error = ?e, path = %self.path.display(), "cache invalidation failed");
            } else {
                info!(path = %self.path.display(), "cache invalidated");
            }
        }
    }

    /// Write via temp file + rename so a concurrent reader never observes a
    /// partially written snapshot.
    fn write_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).context("serializing cache snapshot")?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("writing cache temp file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing cache file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentCategory;

    fn mention(ticker: &str) -> StockMention {
        StockMention {
            ticker: ticker.to_string(),
            mention_count: 3,
            sentiment_score: 0.4321,
            sentiment_category: SentimentCategory::Positive,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_round_trips_field_for_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"), 30);

        let mentions = vec![mention("AAPL"), mention("TSLA")];
        store.save(&mentions, 42);

        let snap = store.load().expect("snapshot present");
        assert_eq!(snap.entities, mentions);
        assert_eq!(snap.source_count, 42);
        assert_eq!(snap.ttl_minutes, 30);
    }

    #[test]
    fn validity_is_elapsed_time_vs_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"), 30);

        let fresh = CacheSnapshot {
            timestamp: Utc::now() - Duration::minutes(29),
            entities: vec![],
            source_count: 0,
            ttl_minutes: 30,
        };
        let expired = CacheSnapshot {
            timestamp: Utc::now() - Duration::minutes(31),
            entities: vec![],
            source_count: 0,
            ttl_minutes: 30,
        };
        assert!(store.is_valid(&fresh));
        assert!(!store.is_valid(&expired));
    }

    #[test]
    fn expired_snapshot_remains_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = CacheStore::new(&path, 30);

        let stale = CacheSnapshot {
            timestamp: Utc::now() - Duration::minutes(120),
            entities: vec![mention("AAPL")],
            source_count: 5,
            ttl_minutes: 30,
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let snap = store.load().expect("stale snapshot still loads");
        assert!(!store.is_valid(&snap));
        assert_eq!(snap.entities.len(), 1);
    }

    #[test]
    fn corrupt_snapshot_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = CacheStore::new(&path, 30);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_none());

        // Structurally valid JSON with a missing field is also corrupt.
        std::fs::write(&path, r#"{"timestamp":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"), 30);

        store.invalidate(); // nothing there, no error
        store.save(&[mention("GME")], 1);
        assert!(store.load().is_some());
        store.invalidate();
        assert!(store.load().is_none());
        store.invalidate();
    }
}
