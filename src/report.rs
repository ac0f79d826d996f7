//! Terminal and file output for chart reports and comparisons.
//!
//! Text goes to stdout; diagnostics go through `tracing` on stderr so the
//! output stays pipeable. `--json` swaps the text rendering for a single
//! JSON document.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::compare::FeatureDelta;
use crate::models::{ChartDate, Feature, FeatureSummary, RankedTrack, Track};
use crate::pipeline::{ChartReport, Comparison};

/// Render a chart as a ranked list followed by its summary.
pub fn render_chart(report: &ChartReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("chart {}\n", report.date));
    for (rank, track) in report.enrichment.entries() {
        let note = match &track {
            Track::Resolved(t) => format!("({})", t.album),
            Track::Raw(_) => "[not found]".to_string(),
        };
        out.push_str(&format!(
            "  {:>3}. {} — {} {}\n",
            rank,
            track.title(),
            track.artist(),
            note
        ));
    }
    out.push_str(&render_summary(&report.summary));
    out
}

pub fn render_summary(summary: &FeatureSummary) -> String {
    let mut out = format!("  summary over {} tracks\n", summary.track_count);
    for feature in Feature::ALL {
        out.push_str(&format!("    {:<14} {:>8.3}\n", feature.name(), summary.get(feature)));
    }
    out
}

/// Render a comparison: both ranked lists, then one line per feature.
pub fn render_comparison(comparison: &Comparison) -> String {
    let mut out = render_chart(&comparison.past);
    out.push('\n');
    out.push_str(&render_chart(&comparison.current));
    out.push('\n');
    let label_a = comparison.past.date.to_string();
    let label_b = comparison.current.date.to_string();
    for line in comparison.result.describe(&label_a, &label_b) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
struct ChartJson<'a> {
    date: ChartDate,
    tracks: &'a [RankedTrack],
    dropped: Vec<DroppedJson>,
    summary: &'a FeatureSummary,
}

#[derive(Debug, Serialize)]
struct DroppedJson {
    rank: usize,
    title: String,
    artist: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ComparisonJson<'a> {
    past: ChartJson<'a>,
    current: ChartJson<'a>,
    deltas: Vec<FeatureDelta>,
}

fn chart_json(report: &ChartReport) -> ChartJson<'_> {
    ChartJson {
        date: report.date,
        tracks: report.tracks(),
        dropped: report
            .enrichment
            .dropped
            .iter()
            .map(|d| DroppedJson {
                rank: d.rank,
                title: d.raw.title.clone(),
                artist: d.raw.artist.clone(),
                reason: d.error.to_string(),
            })
            .collect(),
        summary: &report.summary,
    }
}

pub fn chart_to_json(report: &ChartReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&chart_json(report))?)
}

pub fn comparison_to_json(comparison: &Comparison) -> Result<String> {
    let doc = ComparisonJson {
        past: chart_json(&comparison.past),
        current: chart_json(&comparison.current),
        deltas: comparison.result.feature_deltas(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Polar-chart data for one summary: the four 0–1 features only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarSeries {
    pub label: String,
    pub axes: BTreeMap<Feature, f64>,
}

impl RadarSeries {
    pub fn from_summary(label: &str, summary: &FeatureSummary) -> Self {
        Self {
            label: label.to_string(),
            axes: Feature::BOUNDED
                .iter()
                .map(|&f| (f, summary.get(f)))
                .collect(),
        }
    }
}

/// Write radar series as a JSON array for an external renderer.
pub fn write_radar(path: &Path, series: &[RadarSeries]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(series)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write radar data: {}", path.display()))
}
