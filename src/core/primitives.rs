use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{ViewerError, ViewerResult};

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// Hour at which the next trading date begins.
pub const TRADING_DAY_ROLL_HOUR: u32 = 17;

const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> ViewerResult<f64> {
    value.to_f64().ok_or_else(|| {
        ViewerError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

/// Parses a numeric field that may use a comma as decimal separator.
#[must_use]
pub fn parse_locale_number(text: &str) -> Option<f64> {
    let normalized = text.trim().replacen(',', ".", 1);
    if normalized.is_empty() {
        return None;
    }
    if let Ok(value) = normalized.parse::<Decimal>() {
        return decimal_to_f64(value, "number").ok();
    }
    Decimal::from_scientific(&normalized)
        .ok()
        .and_then(|value| decimal_to_f64(value, "number").ok())
        .or_else(|| normalized.parse::<f64>().ok().filter(|v| v.is_finite()))
}

/// Parses a display timestamp as UTC-marked wall time and returns epoch milliseconds.
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]`, an optional trailing `Z`, a space
/// instead of `T`, RFC 3339 offsets and bare dates (midnight).
#[must_use]
pub fn parse_display_time(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc).timestamp_millis());
    }
    let bare = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(bare, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    let normalized = bare.replacen(' ', "T", 1);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(bare, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[must_use]
pub fn datetime_from_ms(ts: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(ts).map(|dt| dt.naive_utc())
}

#[must_use]
pub fn format_display_time(ts: i64) -> String {
    datetime_from_ms(ts)
        .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_default()
}

#[must_use]
pub fn date_of(ts: i64) -> Option<NaiveDate> {
    datetime_from_ms(ts).map(|dt| dt.date())
}

#[must_use]
pub fn date_to_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Trading date of a timestamp: anything from 17:00 onwards belongs to the next day.
#[must_use]
pub fn trading_date_of(ts: i64) -> Option<NaiveDate> {
    let dt = datetime_from_ms(ts)?;
    if dt.hour() >= TRADING_DAY_ROLL_HOUR {
        dt.date().checked_add_signed(Duration::days(1))
    } else {
        Some(dt.date())
    }
}

#[must_use]
pub fn is_saturday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

/// Adds calendar months and snaps to the first of the month.
#[must_use]
pub fn add_months_first_day(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let total = date.year() * 12 + date.month0() as i32 + months;
    NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
}

/// Rounds half-way cases toward positive infinity.
#[must_use]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_variants_as_utc() {
        let expected = parse_display_time("2024-03-01T09:30:00").expect("iso");
        assert_eq!(parse_display_time("2024-03-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_display_time("2024-03-01 09:30:00"), Some(expected));
        assert_eq!(parse_display_time("2024-03-01T09:30"), Some(expected));
        assert_eq!(format_display_time(expected), "2024-03-01T09:30:00");
        assert!(parse_display_time("not a time").is_none());
    }

    #[test]
    fn trading_date_rolls_at_five_pm() {
        let before = parse_display_time("2024-03-01T16:59:00").expect("ts");
        let after = parse_display_time("2024-03-01T17:00:00").expect("ts");
        assert_eq!(trading_date_of(before), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(trading_date_of(after), NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn locale_numbers_accept_comma_separator() {
        assert_eq!(parse_locale_number("1,25"), Some(1.25));
        assert_eq!(parse_locale_number(" 3.5 "), Some(3.5));
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("abc"), None);
    }

    #[test]
    fn month_arithmetic_crosses_year_boundaries() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).expect("date");
        assert_eq!(add_months_first_day(date, -1), NaiveDate::from_ymd_opt(2023, 12, 1));
        assert_eq!(add_months_first_day(date, 12), NaiveDate::from_ymd_opt(2025, 1, 1));
    }

    #[test]
    fn half_way_rounds_up() {
        assert_eq!(round_half_up(199.5), 200.0);
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(-1.6), -2.0);
    }
}
