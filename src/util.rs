use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date - Days::new(offset)
}

pub fn week_start_of(timestamp: &DateTime<Utc>) -> NaiveDate {
    week_start(timestamp.date_naive())
}

pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + Days::new(6)
}

pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Every week start from `week_start(start)` to `week_start(end)` inclusive.
pub fn weeks_spanning(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let last = week_start(end);
    std::iter::successors(Some(week_start(start)), |w| w.checked_add_days(Days::new(7)))
        .take_while(move |w| *w <= last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn week_start_is_previous_monday() {
        // 2025-01-01 is a Wednesday
        assert_eq!(week_start(date("2025-01-01")), date("2024-12-30"));
        assert_eq!(week_start(date("2025-01-06")), date("2025-01-06"));
        assert_eq!(week_start(date("2025-01-12")), date("2025-01-06"));
    }

    #[test]
    fn weeks_spanning_covers_partial_weeks() {
        let weeks: Vec<_> = weeks_spanning(date("2025-01-01"), date("2025-01-31")).collect();
        assert_eq!(
            weeks,
            vec![
                date("2024-12-30"),
                date("2025-01-06"),
                date("2025-01-13"),
                date("2025-01-20"),
                date("2025-01-27"),
            ]
        );
    }

    #[test]
    fn weeks_spanning_single_day() {
        let weeks: Vec<_> = weeks_spanning(date("2025-03-05"), date("2025-03-05")).collect();
        assert_eq!(weeks, vec![date("2025-03-03")]);
    }

    #[test]
    fn week_key_uses_iso_year() {
        assert_eq!(week_key(date("2024-12-30")), "2025-W01");
        assert_eq!(week_key(date("2025-03-31")), "2025-W14");
    }
}
