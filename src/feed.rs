//! # Reddit Feed
//! The feed collaborator: fetches hot posts (and their top-level comments)
//! from a subreddit's public JSON listing. Rate limiting lives here, inside
//! the collaborator, not in the pipeline.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::RedditPost;

const USER_AGENT: &str = "RedditSentimentTracker/1.0";
const POSTS_PER_REQUEST: usize = 100; // Reddit listing cap per page

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Source of posts for one pipeline run. One failure routes the pipeline to
/// its fallback; the feed itself does not retry.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    async fn fetch_sources(&self, limit: usize) -> Result<Vec<RedditPost>>;
}

// --- Reddit listing JSON shapes ---

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Thing>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    created_utc: Option<f64>,
    score: Option<i64>,
    #[serde(default)]
    stickied: bool,
}

/// HTTP client for the public `hot.json` feed. No authentication; a custom
/// user agent and a fixed inter-request delay keep it polite.
pub struct RedditFeed {
    client: reqwest::Client,
    base_url: String,
    subreddit: String,
    comment_limit: usize,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RedditFeed {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self::with_base_url("https://www.reddit.com", subreddit)
    }

    /// Point the client at a different host (test servers).
    pub fn with_base_url(base_url: impl Into<String>, subreddit: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            subreddit: subreddit.into(),
            comment_limit: 50,
            request_delay: Duration::from_secs(1),
            last_request: Mutex::new(None),
        }
    }

    pub fn comment_limit(mut self, limit: usize) -> Self {
        self.comment_limit = limit;
        self
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("bad status from {url}"))?;
        resp.json().await.context("parsing reddit json response")
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Fetch one page of the hot listing; returns the posts plus the
    /// pagination token for the next page.
    async fn fetch_page(
        &self,
        limit: usize,
        after: Option<&str>,
    ) -> Result<(Vec<RedditPost>, Option<String>)> {
        let mut url = format!(
            "{}/r/{}/hot.json?limit={}",
            self.base_url, self.subreddit, limit
        );
        if let Some(a) = after {
            url.push_str("&after=");
            url.push_str(a);
        }

        let value = self.get_json(&url).await?;
        let listing: Listing =
            serde_json::from_value(value).context("parsing reddit hot listing")?;

        let mut posts = Vec::with_capacity(listing.data.children.len());
        for thing in listing.data.children {
            // t3 = link/post; everything else is noise for us.
            if thing.kind != "t3" || thing.data.stickied {
                continue;
            }
            let d = thing.data;
            posts.push(RedditPost {
                id: d.id,
                title: normalize_text(d.title.as_deref().unwrap_or_default()),
                content: normalize_text(d.selftext.as_deref().unwrap_or_default()),
                comments: Vec::new(),
                created_utc: unix_to_datetime(d.created_utc.unwrap_or(0.0)),
                score: d.score.unwrap_or(0),
            });
        }
        Ok((posts, listing.data.after))
    }

    /// Fetch top-level comment bodies for one post. Best-effort: a failed or
    /// oddly shaped response yields an empty list, not an error, so one bad
    /// thread does not sink the whole fetch.
    async fn fetch_comments(&self, post_id: &str) -> Vec<String> {
        let url = format!(
            "{}/comments/{}.json?limit={}",
            self.base_url, post_id, self.comment_limit
        );
        let value = match self.get_json(&url).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = ?e, post_id, "comment fetch failed, continuing without");
                return Vec::new();
            }
        };

        // Response shape: [post listing, comment listing]; comments are
        // kind "t1" children of the second element.
        let mut out = Vec::new();
        let children = value
            .get(1)
            .and_then(|l| l.get("data"))
            .and_then(|d| d.get("children"))
            .and_then(|c| c.as_array());
        if let Some(children) = children {
            for child in children {
                if child.get("kind").and_then(|k| k.as_str()) != Some("t1") {
                    continue;
                }
                if let Some(body) = child
                    .get("data")
                    .and_then(|d| d.get("body"))
                    .and_then(|b| b.as_str())
                {
                    let text = normalize_text(body);
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
                if out.len() >= self.comment_limit {
                    break;
                }
            }
        }
        out
    }
}

#[async_trait]
impl SourceFeed for RedditFeed {
    async fn fetch_sources(&self, limit: usize) -> Result<Vec<RedditPost>> {
        let mut all: Vec<RedditPost> = Vec::new();
        let mut after: Option<String> = None;

        while all.len() < limit {
            let remaining = limit - all.len();
            let page_limit = remaining.min(POSTS_PER_REQUEST);
            let (batch, next) = self
                .fetch_page(page_limit, after.as_deref())
                .await
                .with_context(|| format!("fetching hot posts from r/{}", self.subreddit))?;

            if batch.is_empty() {
                break;
            }
            all.extend(batch);

            match next {
                Some(a) => after = Some(a),
                None => break,
            }
        }
        all.truncate(limit);

        for post in &mut all {
            post.comments = self.fetch_comments(&post.id).await;
        }
        Ok(all)
    }
}

/// Decode HTML entities, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    RE_WS.replace_all(decoded.trim(), " ").to_string()
}

fn unix_to_datetime(secs: f64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs as i64, 0).unwrap_or_else(|| {
        warn!(secs, "post timestamp out of range, using epoch");
        DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now)
    })
}
