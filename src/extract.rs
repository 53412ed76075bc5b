//! # Ticker Extraction & Mention Counting
//! Finds candidate ticker symbols in raw post text, validates them against a
//! mutable vocabulary (allow-list + deny-list), and aggregates per-post
//! mentions into a ranked table.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::models::RedditPost;

/// Maximal runs of uppercase letters; word boundaries are checked separately
/// because the candidate shape depends on the surrounding characters.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]+").expect("valid token regex"));

/// Built-in vocabulary: a curated allow-list of real tickers plus a deny-list
/// of common words/acronyms/slang that collide with the ticker shape.
static DEFAULT_VOCAB: Lazy<VocabFile> = Lazy::new(|| {
    let raw = include_str!("../tickers.json");
    serde_json::from_str::<VocabFile>(raw).expect("valid embedded ticker vocabulary")
});

#[derive(Debug, Clone, Deserialize)]
struct VocabFile {
    valid: Vec<String>,
    excluded: Vec<String>,
}

/// TOML overlay for user-maintained symbols, e.g.
/// `add = ["GMEV"]` / `remove = ["DIDI"]`.
#[derive(Debug, Default, Deserialize)]
struct VocabOverlay {
    #[serde(default)]
    add: Vec<String>,
    #[serde(default)]
    remove: Vec<String>,
}

/// Mutable validated vocabulary with two partitions: symbols we accept and
/// lookalike tokens we always reject. Both partitions store uppercase only.
///
/// Owned by a [`TickerExtractor`] instance, never global, so independent
/// pipelines can hold independent vocabularies.
#[derive(Debug, Clone)]
pub struct TickerVocabulary {
    valid: HashSet<String>,
    excluded: HashSet<String>,
}

impl Default for TickerVocabulary {
    fn default() -> Self {
        Self {
            valid: DEFAULT_VOCAB.valid.iter().cloned().collect(),
            excluded: DEFAULT_VOCAB.excluded.iter().cloned().collect(),
        }
    }
}

impl TickerVocabulary {
    /// Add custom symbols to the allow-list (case-normalized). Blank entries
    /// are ignored.
    pub fn add<S: AsRef<str>>(&mut self, tickers: impl IntoIterator<Item = S>) {
        for t in tickers {
            let t = t.as_ref().trim().to_ascii_uppercase();
            if !t.is_empty() {
                self.valid.insert(t);
            }
        }
    }

    /// Remove symbols from the allow-list; unknown symbols are a no-op.
    pub fn remove<S: AsRef<str>>(&mut self, tickers: impl IntoIterator<Item = S>) {
        for t in tickers {
            let t = t.as_ref().trim().to_ascii_uppercase();
            self.valid.remove(&t);
        }
    }

    /// Apply a TOML overlay file (`add`/`remove` arrays).
    pub fn apply_overlay_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading ticker overlay from {}", path.display()))?;
        let overlay: VocabOverlay =
            toml::from_str(&content).context("parsing ticker overlay toml")?;
        self.add(overlay.add);
        self.remove(overlay.remove);
        Ok(())
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.valid.contains(token)
    }

    pub fn is_excluded(&self, token: &str) -> bool {
        self.excluded.contains(token)
    }

    /// Snapshot of the current allow-list, sorted for stable output.
    pub fn valid_tickers(&self) -> Vec<String> {
        let mut v: Vec<String> = self.valid.iter().cloned().collect();
        v.sort();
        v
    }
}

/// One ranked row of the mention table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionCount {
    pub ticker: String,
    /// Number of distinct posts mentioning the ticker, never raw occurrences.
    pub count: u32,
}

/// Detects and validates ticker candidates in text fragments.
#[derive(Debug, Clone, Default)]
pub struct TickerExtractor {
    vocab: TickerVocabulary,
}

impl TickerExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vocabulary(vocab: TickerVocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &TickerVocabulary {
        &self.vocab
    }

    pub fn vocabulary_mut(&mut self) -> &mut TickerVocabulary {
        &mut self.vocab
    }

    /// Extract the set of validated ticker symbols from one text fragment.
    ///
    /// Matching is case-insensitive (the text is upper-folded first); the
    /// returned symbols are canonical uppercase. Empty input yields an empty
    /// set without error.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if text.is_empty() {
            return found;
        }

        let upper = text.to_uppercase();
        for m in TOKEN_RE.find_iter(&upper) {
            let token = m.as_str();
            // Single-letter tokens are always rejected, dictionary or not.
            if token.len() < 2 || token.len() > 6 {
                continue;
            }
            if !left_boundary_ok(&upper, m.start()) || !right_boundary_ok(&upper, m.end()) {
                continue;
            }
            if self.vocab.is_valid(token) && !self.vocab.is_excluded(token) {
                found.insert(token.to_string());
            }
        }
        found
    }

    /// Union of extraction results over a post's title, body, and comments:
    /// one candidate set per post, so a ticker counts at most once per post.
    pub fn extract_from_post(&self, post: &RedditPost) -> BTreeSet<String> {
        let mut set = self.extract(&post.title);
        set.extend(self.extract(&post.content));
        for comment in &post.comments {
            set.extend(self.extract(comment));
        }
        set
    }

    /// Count distinct-post mentions across `posts` and return the top `limit`
    /// tickers by count descending.
    ///
    /// Ties are broken by first-encountered order: the ticker whose first
    /// qualifying post appears earlier in the input ranks higher. This is an
    /// explicit rule, not an artifact of container iteration order.
    pub fn top_mentioned(&self, posts: &[RedditPost], limit: usize) -> Vec<MentionCount> {
        let mut counts: HashMap<String, (u32, usize)> = HashMap::new();
        let mut next_rank = 0usize;

        for post in posts {
            for ticker in self.extract_from_post(post) {
                let entry = counts.entry(ticker).or_insert_with(|| {
                    let rank = next_rank;
                    next_rank += 1;
                    (0, rank)
                });
                entry.0 += 1;
            }
        }

        let mut rows: Vec<(String, u32, usize)> = counts
            .into_iter()
            .map(|(ticker, (count, first_seen))| (ticker, count, first_seen))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        rows.truncate(limit);

        rows.into_iter()
            .map(|(ticker, count, _)| MentionCount { ticker, count })
            .collect()
    }
}

fn left_boundary_ok(s: &str, start: usize) -> bool {
    match s[..start].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '$' | '(' | ')' | '[' | ']' | ',' | '/'),
    }
}

fn right_boundary_ok(s: &str, end: usize) -> bool {
    match s[end..].chars().next() {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(
                    c,
                    '$' | '(' | ')' | '[' | ']' | ',' | '/' | '.' | '!' | '?' | ';' | ':'
                )
        }
    }
}
