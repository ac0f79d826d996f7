//! Cache and database overview.
//!
//! Summarizes what has been fetched so far: cached charts, search responses
//! and feature records, plus persisted tracks and chart dates. Used by
//! `chartdiff stats`.

use anyhow::Result;
use chrono::NaiveDate;

use crate::cache::{CacheStore, FEATURES_PREFIX};
use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::store::SqliteTrackStore;

/// Cache entry counts by key namespace.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub charts: usize,
    pub searches: usize,
    pub features: usize,
}

impl CacheStats {
    pub fn collect(cache: &CacheStore) -> Self {
        let mut stats = Self::default();
        for key in cache.keys() {
            if key.starts_with(FEATURES_PREFIX) {
                stats.features += 1;
            } else if NaiveDate::parse_from_str(key, "%Y-%m-%d").is_ok() {
                stats.charts += 1;
            } else {
                stats.searches += 1;
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.charts + self.searches + self.features
    }
}

/// Run the stats command: inspect the cache and database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let cache = CacheStore::open_file(&config.cache.path);
    let cache_stats = CacheStats::collect(&cache);

    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let store = SqliteTrackStore::new(pool);
    let tracks = store.count_tracks().await?;
    let charts = store.count_charts().await?;
    store.close().await;

    let cache_size = std::fs::metadata(&config.cache.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("chartdiff — stats");
    println!("=================");
    println!();
    println!("  Cache:       {} ({})", config.cache.path.display(), format_bytes(cache_size));
    println!("    charts:    {}", cache_stats.charts);
    println!("    searches:  {}", cache_stats.searches);
    println!("    features:  {}", cache_stats.features);
    println!("    total:     {}", cache_stats.total());
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("    tracks:    {}", tracks);
    println!("    charts:    {}", charts);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use serde_json::json;

    #[test]
    fn test_cache_stats_by_namespace() {
        let mut cache = CacheStore::open(Box::new(MemoryBackend::new()));
        cache.put("2021-06-05", json!({})).unwrap();
        cache.put("butter bts", json!({})).unwrap();
        cache.put("bad habits ed sheeran ", json!({})).unwrap();
        cache.put("features:abc", json!({})).unwrap();

        let stats = CacheStats::collect(&cache);
        assert_eq!(
            stats,
            CacheStats {
                charts: 1,
                searches: 2,
                features: 1
            }
        );
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
