//! Validation of user-supplied chart dates.

use chrono::{Local, NaiveDate};

use crate::error::{PipelineError, PipelineResult};

/// The first published Hot 100 chart.
pub const EARLIEST_CHART: (i32, u32, u32) = (1958, 8, 4);

/// Parse a `YYYY-MM-DD` date that must fall between the first chart and
/// today, inclusive.
pub fn parse_chart_date(input: &str) -> PipelineResult<NaiveDate> {
    parse_chart_date_on(input, Local::now().date_naive())
}

/// [`parse_chart_date`] against an explicit "today".
pub fn parse_chart_date_on(input: &str, today: NaiveDate) -> PipelineResult<NaiveDate> {
    let trimmed = input.trim();
    let invalid = |reason: String| PipelineError::InvalidDateInput {
        input: trimmed.to_string(),
        reason,
    };

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| invalid("expected YYYY-MM-DD".to_string()))?;

    let (y, m, d) = EARLIEST_CHART;
    let earliest = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| invalid("bad earliest chart date".to_string()))?;
    if date < earliest {
        return Err(invalid(format!("charts start on {}", earliest)));
    }
    if date > today {
        return Err(invalid("date is in the future".to_string()));
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 10).unwrap()
    }

    #[test]
    fn test_valid_date() {
        let d = parse_chart_date_on(" 1999-12-31 ", today()).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
    }

    #[test]
    fn test_bad_format() {
        for input in ["12/31/1999", "1999-13-01", "", "yesterday"] {
            let err = parse_chart_date_on(input, today()).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidDateInput { .. }), "{}", input);
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(parse_chart_date_on("1958-08-03", today()).is_err());
        assert!(parse_chart_date_on("1958-08-04", today()).is_ok());
        assert!(parse_chart_date_on("2021-06-10", today()).is_ok());
        assert!(parse_chart_date_on("2021-06-11", today()).is_err());
    }
}
