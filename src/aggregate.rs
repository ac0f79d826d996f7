//! Mean-feature summaries over a list of resolved tracks.

use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Feature, FeatureSummary, ResolvedTrack};

/// Decimal digits kept in a summary.
pub const SUMMARY_PRECISION: i32 = 3;

/// Average each feature across `tracks`. Chart rank carries no weight.
///
/// Means are rounded to [`SUMMARY_PRECISION`] digits, half away from zero
/// (the semantics of [`f64::round`]).
///
/// # Errors
///
/// [`PipelineError::EmptyInput`] when `tracks` is empty.
pub fn summarize(tracks: &[ResolvedTrack]) -> PipelineResult<FeatureSummary> {
    if tracks.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let count = tracks.len() as f64;
    let values: BTreeMap<Feature, f64> = Feature::ALL
        .iter()
        .map(|&feature| {
            let sum: f64 = tracks.iter().map(|t| t.features.get(feature)).sum();
            (feature, round_to(sum / count, SUMMARY_PRECISION))
        })
        .collect();

    Ok(FeatureSummary {
        values,
        track_count: tracks.len(),
    })
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudioFeatures;

    fn track(id: &str, f: [f64; 5]) -> ResolvedTrack {
        ResolvedTrack {
            id: id.to_string(),
            title: id.to_string(),
            artist: "artist".to_string(),
            album: "album".to_string(),
            features: AudioFeatures {
                acousticness: f[0],
                danceability: f[1],
                energy: f[2],
                loudness: f[3],
                valence: f[4],
            },
        }
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(summarize(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn test_single_track_is_its_own_summary() {
        let s = summarize(&[track("a", [0.123, 0.456, 0.789, -5.5, 0.25])]).unwrap();
        assert_eq!(s.get(Feature::Acousticness), 0.123);
        assert_eq!(s.get(Feature::Danceability), 0.456);
        assert_eq!(s.get(Feature::Energy), 0.789);
        assert_eq!(s.get(Feature::Loudness), -5.5);
        assert_eq!(s.get(Feature::Valence), 0.25);
        assert_eq!(s.track_count, 1);
    }

    #[test]
    fn test_single_track_values_rounded() {
        let s = summarize(&[track("a", [0.12345, 0.0, 1.0, -7.98765, 0.5])]).unwrap();
        assert_eq!(s.get(Feature::Acousticness), 0.123);
        assert_eq!(s.get(Feature::Loudness), -7.988);
    }

    #[test]
    fn test_two_track_mean() {
        let s = summarize(&[
            track("a", [0.1, 0.5, 0.6, -8.0, 0.4]),
            track("b", [0.3, 0.7, 0.4, -6.0, 0.6]),
        ])
        .unwrap();
        assert_eq!(s.get(Feature::Acousticness), 0.2);
        assert_eq!(s.get(Feature::Danceability), 0.6);
        assert_eq!(s.get(Feature::Energy), 0.5);
        assert_eq!(s.get(Feature::Loudness), -7.0);
        assert_eq!(s.get(Feature::Valence), 0.5);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(0.3333333, 3), 0.333);
        assert_eq!(round_to(-4.66666, 3), -4.667);
    }
}
