//! Parsing helpers shared by the JSON form handlers.

use chrono::{NaiveDate, NaiveTime};

/// `YYYY-MM-DD`, nothing else.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `HH:MM` on a 24-hour clock, nothing else.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Empty and whitespace-only inputs count as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(parse_date("2025-03-01"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_date(" 2025-03-01 "), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_date("2025-3-1"), None);
        assert_eq!(parse_date("01/03/2025"), None);
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn times_must_be_hh_mm() {
        assert_eq!(parse_time("10:00"), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(parse_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_time("9:30"), None);
        assert_eq!(parse_time("10:00:00"), None);
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("10h00"), None);
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(non_blank(&Some("  ".to_string())), None);
        assert_eq!(non_blank(&None), None);
        assert_eq!(non_blank(&Some(" x ".to_string())), Some("x"));
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.ORG "), "ada@example.org");
    }
}
