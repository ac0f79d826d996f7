//! End-to-end chart pipeline.
//!
//! ```text
//! ChartSource ─▶ normalize ─▶ TrackEnricher ─▶ summarize ─▶ compare
//!      │                          │   │
//!      └──────── CacheStore ◀─────┘   └──▶ TrackSink
//! ```
//!
//! A [`Pipeline`] owns the cache and borrows nothing global; every
//! collaborator is handed in at construction so tests can swap in fakes.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::summarize;
use crate::cache::CacheStore;
use crate::chart_source::{CachedChartSource, ChartSource, HttpChartSource};
use crate::compare::{compare, ComparisonResult};
use crate::config::{Config, DEFAULT_TOP_N};
use crate::db;
use crate::enrich::{Enrichment, TrackEnricher};
use crate::metadata::{self, MetadataService};
use crate::migrate::migrate_pool;
use crate::models::{ChartDate, FeatureSummary, RankedTrack};
use crate::store::{SqliteTrackStore, TrackSink};

/// A chart with its enrichment outcome and summary.
#[derive(Debug, Clone)]
pub struct ChartReport {
    pub date: ChartDate,
    pub enrichment: Enrichment,
    pub summary: FeatureSummary,
}

impl ChartReport {
    pub fn tracks(&self) -> &[RankedTrack] {
        &self.enrichment.tracks
    }
}

/// A dated chart compared against the current one.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub past: ChartReport,
    pub current: ChartReport,
    pub result: ComparisonResult,
}

pub struct Pipeline {
    charts: CachedChartSource,
    metadata: Box<dyn MetadataService>,
    sink: Option<Box<dyn TrackSink>>,
    cache: CacheStore,
}

impl Pipeline {
    /// Build a pipeline that keeps the default top-N chart entries.
    pub fn new(
        charts: Box<dyn ChartSource>,
        metadata: Box<dyn MetadataService>,
        sink: Option<Box<dyn TrackSink>>,
        cache: CacheStore,
    ) -> Self {
        Self::with_top_n(charts, metadata, sink, cache, DEFAULT_TOP_N)
    }

    pub fn with_top_n(
        charts: Box<dyn ChartSource>,
        metadata: Box<dyn MetadataService>,
        sink: Option<Box<dyn TrackSink>>,
        cache: CacheStore,
        top_n: usize,
    ) -> Self {
        Self {
            charts: CachedChartSource::new(charts, top_n),
            metadata,
            sink,
            cache,
        }
    }

    /// Build the production pipeline: HTTP chart feed, configured metadata
    /// service, JSON file cache, and SQLite track store.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let charts = HttpChartSource::new(&config.chart)?;
        let metadata = metadata::create_service(&config.metadata)?;
        if !config.metadata.is_enabled() {
            info!("metadata provider disabled; resolving from cache only");
        }
        let cache = CacheStore::open_file(&config.cache.path);

        let pool = db::connect(config).await?;
        migrate_pool(&pool)
            .await
            .context("Failed to prepare database schema")?;
        let sink = SqliteTrackStore::new(pool);

        Ok(Self::with_top_n(
            Box::new(charts),
            metadata,
            Some(Box::new(sink)),
            cache,
            config.chart.top_n,
        ))
    }

    /// Fetch, enrich, persist, and summarize one chart.
    ///
    /// Tracks that fail to resolve are dropped; the chart fails only if it
    /// cannot be fetched or no track at all resolves.
    pub async fn chart_report(&mut self, date: ChartDate) -> Result<ChartReport> {
        let snapshot = self.charts.snapshot(date, &mut self.cache).await?;
        info!(%date, entries = snapshot.entries.len(), "chart loaded");

        let enrichment = TrackEnricher::new(self.metadata.as_ref())
            .resolve_all(&snapshot.entries, &mut self.cache)
            .await;
        if !enrichment.dropped.is_empty() {
            warn!(
                %date,
                dropped = enrichment.dropped.len(),
                resolved = enrichment.tracks.len(),
                "some chart entries could not be resolved"
            );
        }

        self.persist(date, &enrichment.tracks).await?;

        let summary = summarize(&enrichment.resolved())?;
        Ok(ChartReport {
            date,
            enrichment,
            summary,
        })
    }

    /// Summarize the chart for `date` and the current chart, then compare
    /// them with the dated chart as the reference side.
    pub async fn compare_with_current(&mut self, date: NaiveDate) -> Result<Comparison> {
        let past = self.chart_report(ChartDate::On(date)).await?;
        let current = self.chart_report(ChartDate::Current).await?;
        let result = compare(&past.summary, &current.summary);
        Ok(Comparison {
            past,
            current,
            result,
        })
    }

    async fn persist(&self, date: ChartDate, tracks: &[RankedTrack]) -> Result<()> {
        let sink = match &self.sink {
            Some(sink) => sink,
            None => return Ok(()),
        };
        let mut inserted = 0usize;
        for ranked in tracks {
            if sink.save_track(&ranked.track).await? {
                inserted += 1;
            }
        }
        if let ChartDate::On(day) = date {
            sink.save_chart(day, tracks).await?;
        }
        info!(%date, inserted, "tracks persisted");
        Ok(())
    }
}
