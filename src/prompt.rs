//! Interactive compare loop used by `chartdiff prompt`.
//!
//! Reads one date per line, compares that week's chart with the current
//! one, and prints the result. Invalid dates and failed comparisons are
//! reported and the loop asks again; `q`, `quit`, `exit` or end of input
//! stop it.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::dates::parse_chart_date;
use crate::pipeline::Pipeline;
use crate::report::render_comparison;

const PROMPT: &str = "Enter a chart date (YYYY-MM-DD) or 'q' to quit: ";

/// Run the loop until the user quits. Returns the number of completed
/// comparisons.
pub async fn run_prompt<R, W>(pipeline: &mut Pipeline, input: R, out: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut completed = 0;

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let answer = line.trim();
        if answer.is_empty() {
            continue;
        }
        if matches!(answer.to_lowercase().as_str(), "q" | "quit" | "exit") {
            break;
        }

        let date = match parse_chart_date(answer) {
            Ok(date) => date,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        match pipeline.compare_with_current(date).await {
            Ok(comparison) => {
                writeln!(out, "{}", render_comparison(&comparison))?;
                completed += 1;
            }
            Err(e) => writeln!(out, "error: {:#}", e)?,
        }
    }

    writeln!(out)?;
    Ok(completed)
}
