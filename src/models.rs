//! Core data models used throughout chartdiff.
//!
//! Tracks start out [`RawTrack`] (title and artist as printed on the chart)
//! and become [`ResolvedTrack`] once the metadata service has identified
//! them and supplied all five audio features.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five audio characteristics tracked per song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Acousticness,
    Danceability,
    Energy,
    Loudness,
    Valence,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Acousticness,
        Feature::Danceability,
        Feature::Energy,
        Feature::Loudness,
        Feature::Valence,
    ];

    /// Features scored on the 0.0–1.0 confidence scale (loudness is in dB).
    pub const BOUNDED: [Feature; 4] = [
        Feature::Acousticness,
        Feature::Danceability,
        Feature::Energy,
        Feature::Valence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Acousticness => "acousticness",
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Loudness => "loudness",
            Feature::Valence => "valence",
        }
    }

    /// Adjective used when describing a comparison ("MORE danceable").
    pub fn quality(self) -> &'static str {
        match self {
            Feature::Acousticness => "acoustic",
            Feature::Danceability => "danceable",
            Feature::Energy => "energetic",
            Feature::Loudness => "loud",
            Feature::Valence => "positive",
        }
    }

    pub fn is_bounded(self) -> bool {
        self != Feature::Loudness
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete audio-feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub loudness: f64,
    pub valence: f64,
}

impl AudioFeatures {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Acousticness => self.acousticness,
            Feature::Danceability => self.danceability,
            Feature::Energy => self.energy,
            Feature::Loudness => self.loudness,
            Feature::Valence => self.valence,
        }
    }

    /// Build from a raw feature record; `None` if any feature is absent or
    /// not a number.
    pub fn from_record(record: &serde_json::Value) -> Option<Self> {
        let field = |f: Feature| record.get(f.name()).and_then(|v| v.as_f64());
        Some(Self {
            acousticness: field(Feature::Acousticness)?,
            danceability: field(Feature::Danceability)?,
            energy: field(Feature::Energy)?,
            loudness: field(Feature::Loudness)?,
            valence: field(Feature::Valence)?,
        })
    }
}

/// A chart entry before enrichment: only what the chart printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrack {
    pub title: String,
    pub artist: String,
}

impl RawTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// A track identified by the metadata service, with all features known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub features: AudioFeatures,
}

/// Either side of the resolution lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Track {
    Raw(RawTrack),
    Resolved(ResolvedTrack),
}

impl Track {
    pub fn id(&self) -> Option<&str> {
        match self {
            Track::Raw(_) => None,
            Track::Resolved(t) => Some(&t.id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Track::Raw(t) => &t.title,
            Track::Resolved(t) => &t.title,
        }
    }

    pub fn artist(&self) -> &str {
        match self {
            Track::Raw(t) => &t.artist,
            Track::Resolved(t) => &t.artist,
        }
    }

    pub fn features(&self) -> Option<&AudioFeatures> {
        match self {
            Track::Raw(_) => None,
            Track::Resolved(t) => Some(&t.features),
        }
    }
}

/// Which chart week a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartDate {
    Current,
    On(NaiveDate),
}

impl ChartDate {
    /// ISO form used as the chart cache key; `None` for the current chart.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            ChartDate::Current => None,
            ChartDate::On(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for ChartDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartDate::Current => f.write_str("current"),
            ChartDate::On(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// An ordered top-N chart. Rank is position + 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub date: ChartDate,
    pub entries: Vec<RawTrack>,
}

impl ChartSnapshot {
    /// Build a snapshot, keeping at most `top_n` entries.
    pub fn new(date: ChartDate, mut entries: Vec<RawTrack>, top_n: usize) -> Self {
        entries.truncate(top_n);
        Self { date, entries }
    }

    /// Entries paired with their 1-based rank.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &RawTrack)> {
        self.entries.iter().enumerate().map(|(i, t)| (i + 1, t))
    }
}

/// A resolved track together with the chart rank it held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTrack {
    pub rank: usize,
    pub track: ResolvedTrack,
}

/// Mean of each feature across a track list, rounded to 3 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub values: BTreeMap<Feature, f64>,
    pub track_count: usize,
}

impl FeatureSummary {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values.get(&feature).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_features_from_complete_record() {
        let record = json!({
            "id": "abc",
            "acousticness": 0.1,
            "danceability": 0.5,
            "energy": 0.6,
            "loudness": -8,
            "valence": 0.4
        });
        let f = AudioFeatures::from_record(&record).unwrap();
        assert_eq!(f.loudness, -8.0);
        assert_eq!(f.get(Feature::Danceability), 0.5);
    }

    #[test]
    fn test_features_from_incomplete_record() {
        let record = json!({ "acousticness": 0.1, "danceability": 0.5 });
        assert!(AudioFeatures::from_record(&record).is_none());
        assert!(AudioFeatures::from_record(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn test_snapshot_truncates_and_ranks_from_one() {
        let entries = (0..15)
            .map(|i| RawTrack::new(format!("song {}", i), "artist"))
            .collect();
        let snap = ChartSnapshot::new(ChartDate::Current, entries, 10);
        assert_eq!(snap.entries.len(), 10);
        let ranks: Vec<usize> = snap.ranked().map(|(r, _)| r).collect();
        assert_eq!(ranks.first(), Some(&1));
        assert_eq!(ranks.last(), Some(&10));
    }

    #[test]
    fn test_chart_date_cache_key() {
        let d = NaiveDate::from_ymd_opt(2021, 6, 5).unwrap();
        assert_eq!(ChartDate::On(d).cache_key().as_deref(), Some("2021-06-05"));
        assert_eq!(ChartDate::Current.cache_key(), None);
    }

    #[test]
    fn test_raw_track_has_no_features() {
        let t = Track::Raw(RawTrack::new("Levitating", "Dua Lipa"));
        assert!(t.id().is_none());
        assert!(t.features().is_none());
        assert_eq!(t.artist(), "Dua Lipa");
    }
}
