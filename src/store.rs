//! Durable storage of resolved tracks.
//!
//! The pipeline emits every resolved track into a [`TrackSink`]. Storage is
//! idempotent on the `(title, artist)` pair: saving the same track twice
//! never creates a second row.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::models::{RankedTrack, ResolvedTrack};

/// Receives resolved tracks for durable storage.
#[async_trait]
pub trait TrackSink: Send + Sync {
    /// Store a track. Returns `false` if a track with the same title and
    /// artist was already stored.
    async fn save_track(&self, track: &ResolvedTrack) -> Result<bool>;

    /// Record the resolved entries of a dated chart. Replaces any entries
    /// previously recorded for `date`.
    async fn save_chart(&self, date: NaiveDate, tracks: &[RankedTrack]) -> Result<()>;
}

/// SQLite-backed [`TrackSink`]. Requires the schema from
/// [`migrate`](crate::migrate).
pub struct SqliteTrackStore {
    pool: SqlitePool,
}

impl SqliteTrackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count_tracks(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn count_charts(&self) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(DISTINCT chart_date) FROM chart_entries")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TrackSink for SqliteTrackStore {
    async fn save_track(&self, track: &ResolvedTrack) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let f = &track.features;
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (track_id, title, artist, album, acousticness, danceability, energy, loudness, valence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title, artist) DO NOTHING
            "#,
        )
        .bind(&track.id)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(f.acousticness)
        .bind(f.danceability)
        .bind(f.energy)
        .bind(f.loudness)
        .bind(f.valence)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_chart(&self, date: NaiveDate, tracks: &[RankedTrack]) -> Result<()> {
        let chart_date = date.format("%Y-%m-%d").to_string();
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chart_entries WHERE chart_date = ?")
            .bind(&chart_date)
            .execute(&mut *tx)
            .await?;

        for entry in tracks {
            sqlx::query(
                "INSERT INTO chart_entries (chart_date, rank, title, artist, recorded_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chart_date)
            .bind(entry.rank as i64)
            .bind(&entry.track.title)
            .bind(&entry.track.artist)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
