//! Chart retrieval.
//!
//! [`ChartSource`] is the seam between the pipeline and wherever chart
//! rankings come from. [`HttpChartSource`] reads a JSON chart feed;
//! [`CachedChartSource`] wraps any source and serves dated snapshots from the
//! [`CacheStore`] when it can. The current chart is never cached because it
//! changes every week.
//!
//! # Feed format
//!
//! ```text
//! GET {base_url}/recent.json
//! GET {base_url}/date/{YYYY-MM-DD}.json
//!
//! {"date": "2021-06-05",
//!  "data": [{"song": "Butter", "artist": "BTS", "this_week": 1}, ...]}
//! ```
//!
//! `entries` / `title` are accepted as aliases of `data` / `song`.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::ChartConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::http;
use crate::models::{ChartDate, ChartSnapshot, RawTrack};

const SERVICE: &str = "chart";

/// Supplies raw ranked chart entries.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// The chart for this week.
    async fn fetch_current(&self) -> PipelineResult<ChartSnapshot>;

    /// The chart for the week containing `date`.
    async fn fetch_for_date(&self, date: NaiveDate) -> PipelineResult<ChartSnapshot>;
}

/// Chart source backed by the JSON chart feed.
pub struct HttpChartSource {
    client: reqwest::Client,
    base_url: String,
    top_n: usize,
    max_retries: u32,
}

impl HttpChartSource {
    pub fn new(config: &ChartConfig) -> PipelineResult<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            top_n: config.top_n,
            max_retries: config.max_retries,
        })
    }

    async fn fetch(&self, url: String, date: ChartDate) -> PipelineResult<ChartSnapshot> {
        info!(%url, "fetching chart");
        let response =
            http::send_with_retry(SERVICE, self.max_retries, || self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::external(
                SERVICE,
                format!("no chart published for {}", date),
            ));
        }
        let body = http::json_body(SERVICE, response).await?;
        let feed: ChartFeed = serde_json::from_value(body)
            .map_err(|e| PipelineError::external(SERVICE, format!("unexpected chart payload: {}", e)))?;
        Ok(feed.into_snapshot(date, self.top_n))
    }
}

#[async_trait]
impl ChartSource for HttpChartSource {
    async fn fetch_current(&self) -> PipelineResult<ChartSnapshot> {
        self.fetch(format!("{}/recent.json", self.base_url), ChartDate::Current)
            .await
    }

    async fn fetch_for_date(&self, date: NaiveDate) -> PipelineResult<ChartSnapshot> {
        let week = chart_week(date);
        let url = format!("{}/date/{}.json", self.base_url, week.format("%Y-%m-%d"));
        self.fetch(url, ChartDate::On(date)).await
    }
}

/// Charts are dated by the Saturday that ends their week; a date maps to
/// the chart on or after it.
pub fn chart_week(date: NaiveDate) -> NaiveDate {
    let days_from_sunday = date.weekday().num_days_from_sunday();
    let offset = 6 - days_from_sunday;
    date + chrono::Duration::days(offset as i64)
}

#[derive(Debug, Deserialize)]
struct ChartFeed {
    #[serde(alias = "entries")]
    data: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(alias = "title")]
    song: String,
    artist: String,
    #[serde(default)]
    this_week: Option<u32>,
}

impl ChartFeed {
    fn into_snapshot(mut self, date: ChartDate, top_n: usize) -> ChartSnapshot {
        // Stable sort: entries without a rank keep feed order after ranked ones.
        self.data
            .sort_by_key(|e| e.this_week.unwrap_or(u32::MAX));
        let entries = self
            .data
            .into_iter()
            .map(|e| RawTrack::new(e.song, e.artist))
            .collect();
        ChartSnapshot::new(date, entries, top_n)
    }
}

/// Serves dated snapshots from the cache, falling back to `inner`.
///
/// Every snapshot handed out is cut to `top_n`, including ones cached while
/// a larger limit was configured.
pub struct CachedChartSource {
    inner: Box<dyn ChartSource>,
    top_n: usize,
}

impl CachedChartSource {
    pub fn new(inner: Box<dyn ChartSource>, top_n: usize) -> Self {
        Self { inner, top_n }
    }

    /// Fetch the snapshot for `date`.
    ///
    /// Dated snapshots are looked up under their ISO date key first; a live
    /// fetch is stored under that key before being returned.
    pub async fn snapshot(
        &self,
        date: ChartDate,
        cache: &mut CacheStore,
    ) -> PipelineResult<ChartSnapshot> {
        let mut snapshot = self.lookup(date, cache).await?;
        snapshot.entries.truncate(self.top_n);
        Ok(snapshot)
    }

    async fn lookup(&self, date: ChartDate, cache: &mut CacheStore) -> PipelineResult<ChartSnapshot> {
        let (day, key) = match (date, date.cache_key()) {
            (ChartDate::On(day), Some(key)) => (day, key),
            _ => return self.inner.fetch_current().await,
        };

        if let Some(cached) = cache.get(&key) {
            match serde_json::from_value::<ChartSnapshot>(cached.clone()) {
                Ok(snapshot) => {
                    debug!(%key, "chart cache hit");
                    return Ok(snapshot);
                }
                Err(e) => warn!(%key, "ignoring unreadable cached chart: {}", e),
            }
        }

        debug!(%key, "chart cache miss");
        let snapshot = self.inner.fetch_for_date(day).await?;
        match serde_json::to_value(&snapshot) {
            Ok(payload) => {
                if let Err(e) = cache.put(&key, payload) {
                    warn!(%key, "could not cache chart: {:#}", e);
                }
            }
            Err(e) => warn!(%key, "could not serialize chart: {}", e),
        }
        Ok(snapshot)
    }
}
