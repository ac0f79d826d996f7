use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per distinct (title, artist); the first resolution is kept.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_id TEXT NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT NOT NULL,
            acousticness REAL NOT NULL,
            danceability REAL NOT NULL,
            energy REAL NOT NULL,
            loudness REAL NOT NULL,
            valence REAL NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(title, artist)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Which resolved track held which rank on a dated chart.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chart_entries (
            chart_date TEXT NOT NULL,
            rank INTEGER NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            recorded_at INTEGER NOT NULL,
            PRIMARY KEY (chart_date, rank)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_track_id ON tracks(track_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chart_entries_track ON chart_entries(title, artist)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
