//! # chartdiff CLI
//!
//! ## Usage
//!
//! ```bash
//! chartdiff --config ./config/chartdiff.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chartdiff init` | Create the SQLite database and schema |
//! | `chartdiff chart [DATE]` | Show the enriched chart for DATE (or this week) |
//! | `chartdiff compare DATE` | Compare DATE's chart with this week's |
//! | `chartdiff prompt` | Compare dates interactively |
//! | `chartdiff stats` | Show cache and database counts |
//!
//! Spotify credentials are read from `SPOTIFY_CLIENT_ID` and
//! `SPOTIFY_CLIENT_SECRET`. Set `RUST_LOG=debug` to see cache hits and
//! misses on stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chartdiff::config;
use chartdiff::dates::parse_chart_date;
use chartdiff::migrate;
use chartdiff::models::ChartDate;
use chartdiff::pipeline::Pipeline;
use chartdiff::prompt;
use chartdiff::report::{self, RadarSeries};
use chartdiff::stats;

/// chartdiff — compare the audio character of a past music chart with
/// this week's chart.
#[derive(Parser)]
#[command(name = "chartdiff", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chartdiff.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Show the enriched, ranked chart and its feature summary.
    Chart {
        /// Chart date (YYYY-MM-DD). Omit for the current chart.
        date: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Compare the chart for a date with the current chart.
    Compare {
        /// Chart date (YYYY-MM-DD).
        date: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also write radar-chart data (four 0–1 features per chart) to this file.
        #[arg(long)]
        radar: Option<PathBuf>,
    },

    /// Prompt for dates and compare each with the current chart.
    Prompt,

    /// Show cache and database statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Chart { date, json } => {
            let date = match date {
                Some(d) => ChartDate::On(parse_chart_date(&d)?),
                None => ChartDate::Current,
            };
            let mut pipeline = Pipeline::from_config(&cfg).await?;
            let chart = pipeline.chart_report(date).await?;
            if json {
                println!("{}", report::chart_to_json(&chart)?);
            } else {
                print!("{}", report::render_chart(&chart));
            }
        }
        Commands::Compare { date, json, radar } => {
            let date = parse_chart_date(&date)?;
            let mut pipeline = Pipeline::from_config(&cfg).await?;
            let comparison = pipeline.compare_with_current(date).await?;
            if json {
                println!("{}", report::comparison_to_json(&comparison)?);
            } else {
                print!("{}", report::render_comparison(&comparison));
            }
            if let Some(path) = radar {
                let series = [
                    RadarSeries::from_summary(&comparison.past.date.to_string(), &comparison.past.summary),
                    RadarSeries::from_summary(
                        &comparison.current.date.to_string(),
                        &comparison.current.summary,
                    ),
                ];
                report::write_radar(&path, &series)?;
                eprintln!("radar data written to {}", path.display());
            }
        }
        Commands::Prompt => {
            let mut pipeline = Pipeline::from_config(&cfg).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            prompt::run_prompt(&mut pipeline, stdin, &mut stdout).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
