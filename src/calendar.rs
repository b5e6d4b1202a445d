use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// All "today"/"this week" resolution happens in the business's home zone,
/// regardless of where the server runs.
pub const REFERENCE_TZ: Tz = chrono_tz::America::New_York;

/// Date boundaries for one report, resolved once from `now` and shared by
/// every metric so a computation spanning midnight cannot drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Wall-clock instant of `now` in the reference zone.
    pub now_local: NaiveDateTime,
    pub today: NaiveDate,
    /// Most recent Sunday on or before `today`.
    pub week_start: NaiveDate,
    /// Exclusive upper bound: the Sunday after `week_start`.
    pub week_end: NaiveDate,
    pub thirty_days_ago: NaiveDate,
}

impl Anchor {
    pub fn resolve(now: DateTime<Utc>) -> Self {
        let now_local = now.with_timezone(&REFERENCE_TZ).naive_local();
        let today = now_local.date();
        let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        Self {
            now_local,
            today,
            week_start,
            week_end: week_start + Duration::days(7),
            thirty_days_ago: today - Duration::days(30),
        }
    }

    pub fn is_today(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| d == self.today)
    }

    /// Inclusive start, exclusive end, so the boundary Sunday lands in
    /// exactly one week.
    pub fn is_this_week(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| self.week_start <= d && d < self.week_end)
    }

    pub fn is_last_30_days(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| self.thirty_days_ago <= d && d <= self.today)
    }
}

/// Parse a warehouse date cell into a calendar date in the reference zone.
///
/// Timestamps with an offset are converted before the date is taken; naive
/// strings are treated as Eastern wall time already. Anything unparsable is
/// absent, never an error.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.with_timezone(&REFERENCE_TZ).date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    // BigQuery DATETIME renders with a space separator
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(datetime.date());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn anchor_resolves_eastern_date_across_utc_midnight() {
        // 03:00 UTC on July 2 is still 23:00 on July 1 in New York
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 3, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert_eq!(anchor.today, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn anchor_week_starts_on_sunday() {
        // 2025-07-01 is a Tuesday; the week began Sunday 2025-06-29
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 19, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert_eq!(anchor.week_start, NaiveDate::from_ymd_opt(2025, 6, 29).unwrap());
        assert_eq!(anchor.week_end, NaiveDate::from_ymd_opt(2025, 7, 6).unwrap());
    }

    #[test]
    fn anchor_on_a_sunday_is_its_own_week_start() {
        let now = Utc.with_ymd_and_hms(2025, 7, 6, 16, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert_eq!(anchor.today, anchor.week_start);
    }

    #[test]
    fn this_week_excludes_the_exclusive_bound() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 19, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert!(anchor.is_this_week(Some(anchor.week_start)));
        assert!(!anchor.is_this_week(Some(anchor.week_end)));
    }

    #[test]
    fn last_30_days_is_inclusive_on_both_ends() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 19, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert!(anchor.is_last_30_days(Some(anchor.thirty_days_ago)));
        assert!(anchor.is_last_30_days(Some(anchor.today)));
        assert!(!anchor.is_last_30_days(Some(anchor.thirty_days_ago - Duration::days(1))));
        assert!(!anchor.is_last_30_days(Some(anchor.today + Duration::days(1))));
    }

    #[test]
    fn predicates_are_false_for_absent_dates() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 19, 0, 0).unwrap();
        let anchor = Anchor::resolve(now);
        assert!(!anchor.is_today(None));
        assert!(!anchor.is_this_week(None));
        assert!(!anchor.is_last_30_days(None));
    }

    #[test]
    fn parses_date_only_strings() {
        assert_eq!(
            parse_calendar_date("2025-07-01"),
            Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
        );
    }

    #[test]
    fn parses_rfc3339_in_the_reference_zone() {
        // 02:00 UTC is the previous evening in New York
        assert_eq!(
            parse_calendar_date("2025-07-02T02:00:00Z"),
            Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
        );
    }

    #[test]
    fn parses_naive_datetimes() {
        let expected = Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(parse_calendar_date("2025-07-01T09:30:00"), expected);
        assert_eq!(parse_calendar_date("2025-07-01 09:30:00"), expected);
        assert_eq!(parse_calendar_date("2025-07-01T09:30:00.250"), expected);
    }

    #[test]
    fn garbage_dates_are_absent() {
        assert_eq!(parse_calendar_date(""), None);
        assert_eq!(parse_calendar_date("   "), None);
        assert_eq!(parse_calendar_date("not a date"), None);
        assert_eq!(parse_calendar_date("2025-13-40"), None);
    }
}
