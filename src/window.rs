use crate::error::{Result, TrendError};
use crate::model::DateWindow;
use chrono::{DateTime, Days, NaiveDate};

pub const START_DATE_ENV: &str = "START_DATE";
pub const END_DATE_ENV: &str = "END_DATE";

/// Raw window inputs. Each bound is taken from the first source that has
/// one: command-line flag, quarter preset, `START_DATE`/`END_DATE`, then the
/// config file.
#[derive(Debug, Clone, Default)]
pub struct WindowInputs<'a> {
    pub since: Option<&'a str>,
    pub until: Option<&'a str>,
    pub quarter: Option<&'a str>,
    pub env_start: Option<&'a str>,
    pub env_end: Option<&'a str>,
    pub config_start: Option<&'a str>,
    pub config_end: Option<&'a str>,
}

pub fn resolve(inputs: &WindowInputs<'_>, today: NaiveDate) -> Result<DateWindow> {
    let preset = inputs.quarter.map(parse_quarter).transpose()?;

    let start = bound(
        inputs.since,
        preset.map(|(start, _)| start),
        inputs.env_start.or(inputs.config_start),
        today,
    )?
    .ok_or_else(|| TrendError::config("No start date given (use --since, --quarter, START_DATE or start_date in the config file)"))?;
    let end = bound(
        inputs.until,
        preset.map(|(_, end)| end),
        inputs.env_end.or(inputs.config_end),
        today,
    )?
    .ok_or_else(|| TrendError::config("No end date given (use --until, --quarter, END_DATE or end_date in the config file)"))?;

    DateWindow::new(start, end)
}

fn bound(
    flag: Option<&str>,
    preset: Option<NaiveDate>,
    fallback: Option<&str>,
    today: NaiveDate,
) -> Result<Option<NaiveDate>> {
    if let Some(raw) = flag {
        return parse_date(raw, today).map(Some);
    }
    if preset.is_some() {
        return Ok(preset);
    }
    fallback.map(|raw| parse_date(raw, today)).transpose()
}

/// Accepts `YYYY-MM-DD`, RFC3339 (date part) or a relative duration such as
/// `90d` / `2 weeks ago`, measured back from `today`.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.date_naive());
    }

    let relative = input.strip_suffix("ago").unwrap_or(input).trim();
    if let Ok(duration) = humantime::parse_duration(relative) {
        let days = duration.as_secs() / 86_400;
        return today
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| TrendError::InvalidDate(format!("Duration overflow for '{input}'")));
    }

    Err(TrendError::InvalidDate(format!(
        "'{input}' is not a YYYY-MM-DD date, RFC3339 timestamp or relative duration"
    )))
}

/// `2025Q1`, `2025-Q1`, `Q1-2025` and `q1 2025` all name Jan 1 – Mar 31 2025.
pub fn parse_quarter(input: &str) -> Result<(NaiveDate, NaiveDate)> {
    let normalized: String = input
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_uppercase();

    let parsed = if let Some((year, q)) = normalized.split_once('Q') {
        if year.is_empty() {
            // Qn then year
            q.get(..1)
                .zip(q.get(1..))
                .and_then(|(q, y)| Some((y.parse::<i32>().ok()?, q.parse::<u32>().ok()?)))
        } else {
            year.parse::<i32>().ok().zip(q.parse::<u32>().ok())
        }
    } else {
        None
    };

    let (year, quarter) = parsed
        .filter(|(_, q)| (1..=4).contains(q))
        .ok_or_else(|| TrendError::InvalidDate(format!("'{input}' is not a quarter like 2025Q1")))?;

    let first_month = (quarter - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)
        .ok_or_else(|| TrendError::InvalidDate(format!("Year out of range in '{input}'")))?;
    let next_quarter = if quarter == 4 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, first_month + 3, 1)
    };
    let end = next_quarter
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| TrendError::InvalidDate(format!("Year out of range in '{input}'")))?;

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn quarter_presets() {
        assert_eq!(parse_quarter("2025Q1").unwrap(), (date("2025-01-01"), date("2025-03-31")));
        assert_eq!(parse_quarter("2024-q1").unwrap().1, date("2024-03-31"));
        assert_eq!(parse_quarter("Q2-2025").unwrap(), (date("2025-04-01"), date("2025-06-30")));
        assert_eq!(parse_quarter("q4 2025").unwrap(), (date("2025-10-01"), date("2025-12-31")));
        assert!(parse_quarter("2025Q5").is_err());
        assert!(parse_quarter("2025").is_err());
    }

    #[test]
    fn explicit_bounds_win_over_quarter() {
        let inputs = WindowInputs {
            quarter: Some("2025Q1"),
            since: Some("2025-02-10"),
            until: Some("2025-02-20"),
            ..Default::default()
        };
        let w = resolve(&inputs, date("2026-01-01")).unwrap();
        assert_eq!(w.start(), date("2025-02-10"));
        assert_eq!(w.end(), date("2025-02-20"));
    }

    #[test]
    fn quarter_fills_the_bound_not_given_on_the_command_line() {
        let inputs = WindowInputs {
            quarter: Some("2025Q1"),
            since: Some("2025-02-10"),
            ..Default::default()
        };
        let w = resolve(&inputs, date("2026-01-01")).unwrap();
        assert_eq!(w.start(), date("2025-02-10"));
        assert_eq!(w.end(), date("2025-03-31"));
    }

    #[test]
    fn quarter_wins_over_environment_and_config() {
        let inputs = WindowInputs {
            quarter: Some("2025Q3"),
            env_start: Some("2020-01-01"),
            env_end: Some("2020-02-01"),
            config_start: Some("2019-01-01"),
            config_end: Some("2019-02-01"),
            ..Default::default()
        };
        let w = resolve(&inputs, date("2026-01-01")).unwrap();
        assert_eq!(w.start(), date("2025-07-01"));
        assert_eq!(w.end(), date("2025-09-30"));
    }

    #[test]
    fn environment_wins_over_config() {
        let inputs = WindowInputs {
            env_start: Some("2025-02-01"),
            config_start: Some("2025-01-01"),
            config_end: Some("2025-03-31"),
            ..Default::default()
        };
        let w = resolve(&inputs, date("2026-01-01")).unwrap();
        assert_eq!(w.start(), date("2025-02-01"));
        assert_eq!(w.end(), date("2025-03-31"));
    }

    #[test]
    fn explicit_bounds_win_over_config() {
        let inputs = WindowInputs {
            since: Some("2025-02-01"),
            config_start: Some("2025-01-01"),
            config_end: Some("2025-03-31"),
            ..Default::default()
        };
        let w = resolve(&inputs, date("2026-01-01")).unwrap();
        assert_eq!(w.start(), date("2025-02-01"));
        assert_eq!(w.end(), date("2025-03-31"));
    }

    #[test]
    fn missing_bound_is_config_error() {
        let inputs = WindowInputs {
            since: Some("2025-02-01"),
            ..Default::default()
        };
        assert!(matches!(resolve(&inputs, date("2026-01-01")), Err(TrendError::Config(_))));
    }

    #[test]
    fn inverted_window_fails_fast() {
        let inputs = WindowInputs {
            since: Some("2025-03-01"),
            until: Some("2025-02-01"),
            ..Default::default()
        };
        assert!(matches!(resolve(&inputs, date("2026-01-01")), Err(TrendError::InvalidDate(_))));
    }

    #[test]
    fn relative_and_rfc3339_bounds() {
        let today = date("2025-04-10");
        assert_eq!(parse_date("10d", today).unwrap(), date("2025-03-31"));
        assert_eq!(parse_date("2 weeks ago", today).unwrap(), date("2025-03-27"));
        assert_eq!(parse_date("2025-01-05T12:00:00Z", today).unwrap(), date("2025-01-05"));
        assert!(parse_date("yesterday-ish", today).is_err());
    }
}
