//! Directional comparison of two feature summaries.
//!
//! `delta = a - b` for every feature, with no rounding beyond what the
//! summaries already carry. How a delta reads depends on the feature:
//!
//! | Feature | `delta > 0` | `delta < 0` |
//! |---------|-------------|-------------|
//! | acousticness, danceability, energy, valence | a is LESS than b | a is MORE than b |
//! | loudness | a is MORE than b | a is LESS than b |
//!
//! The bounded features read against the sign: the comparison is framed as
//! how the reference list `a` differs from the list under inspection `b`.
//! Loudness keeps the arithmetic reading.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{Feature, FeatureSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    More,
    Less,
    Same,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::More => "MORE",
            Direction::Less => "LESS",
            Direction::Same => "the SAME",
        })
    }
}

/// Two summaries and the per-feature difference between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub a: FeatureSummary,
    pub b: FeatureSummary,
    pub deltas: BTreeMap<Feature, f64>,
}

/// One feature's delta with its reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureDelta {
    pub feature: Feature,
    pub delta: f64,
    pub direction: Direction,
}

/// Compare `a` against `b`.
pub fn compare(a: &FeatureSummary, b: &FeatureSummary) -> ComparisonResult {
    let deltas = Feature::ALL
        .iter()
        .map(|&f| (f, a.get(f) - b.get(f)))
        .collect();
    ComparisonResult {
        a: a.clone(),
        b: b.clone(),
        deltas,
    }
}

/// How `delta` reads for `feature` (see the module table).
pub fn direction(feature: Feature, delta: f64) -> Direction {
    if delta == 0.0 {
        return Direction::Same;
    }
    match (feature.is_bounded(), delta > 0.0) {
        (true, true) | (false, false) => Direction::Less,
        (true, false) | (false, true) => Direction::More,
    }
}

impl ComparisonResult {
    pub fn delta(&self, feature: Feature) -> f64 {
        self.deltas.get(&feature).copied().unwrap_or(0.0)
    }

    pub fn direction(&self, feature: Feature) -> Direction {
        direction(feature, self.delta(feature))
    }

    pub fn feature_deltas(&self) -> Vec<FeatureDelta> {
        Feature::ALL
            .iter()
            .map(|&feature| FeatureDelta {
                feature,
                delta: self.delta(feature),
                direction: self.direction(feature),
            })
            .collect()
    }

    /// One sentence per feature, e.g.
    /// `2021-06-05 is MORE loud than current (delta 5.000)`.
    pub fn describe(&self, label_a: &str, label_b: &str) -> Vec<String> {
        self.feature_deltas()
            .into_iter()
            .map(|d| match d.direction {
                Direction::Same => format!(
                    "{} is the SAME {} as {}",
                    label_a,
                    d.feature.quality(),
                    label_b
                ),
                dir => format!(
                    "{} is {} {} than {} (delta {:.3})",
                    label_a,
                    dir,
                    d.feature.quality(),
                    label_b,
                    d.delta
                ),
            })
            .collect()
    }
}
