//! # chartdiff
//!
//! Compare the audio character of a past music chart with this week's.
//!
//! chartdiff fetches the top of a weekly chart for a chosen date, looks up
//! each song's audio features (acousticness, danceability, energy, loudness,
//! valence) from a metadata service, averages them, and reports how that
//! week differs from the current chart.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ ChartSource │──▶│  normalize  │──▶│ TrackEnricher│──▶│summarize │
//! └──────┬──────┘   └─────────────┘   └──┬───────┬──┘   └────┬─────┘
//!        │                               │       │           ▼
//!        ▼                               ▼       ▼      ┌──────────┐
//!   ┌──────────────────────────────────────┐ ┌───────┐ │ compare  │
//!   │       CacheStore (cache.json)        │ │SQLite │ └──────────┘
//!   └──────────────────────────────────────┘ └───────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Tracks, charts, summaries |
//! | [`error`] | Pipeline error taxonomy |
//! | [`cache`] | Persistent write-once response cache |
//! | [`normalize`] | Chart entry → search query |
//! | [`chart_source`] | Chart feed access |
//! | [`metadata`] | Metadata service (Spotify) |
//! | [`enrich`] | Track resolution through the cache |
//! | [`aggregate`] | Feature summaries |
//! | [`compare`] | Directional summary comparison |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`store`] | Durable track storage |
//! | [`report`] | Text, JSON and radar output |

pub mod aggregate;
pub mod cache;
pub mod chart_source;
pub mod compare;
pub mod config;
pub mod dates;
pub mod db;
pub mod enrich;
pub mod error;
pub mod http;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod stats;
pub mod store;
