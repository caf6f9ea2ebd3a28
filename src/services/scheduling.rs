//! Duration arithmetic and timestamp normalisation for work orders.
//!
//! Durations are kept in fractional minutes and converted with millisecond
//! precision; nothing here truncates to whole minutes.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::errors::ServiceError;

/// Efficiency applied when an order has no production line
pub const DEFAULT_EFFICIENCY: f64 = 1.0;

/// Layouts accepted for timestamps that carry no zone; read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// `time_per_unit × quantity × efficiency`, in minutes.
pub fn production_minutes(time_per_unit: i32, quantity: i32, efficiency: Option<f64>) -> f64 {
    f64::from(time_per_unit) * f64::from(quantity) * efficiency.unwrap_or(DEFAULT_EFFICIENCY)
}

/// Converts fractional minutes to a duration, rounded to the millisecond.
pub fn minutes_to_duration(minutes: f64) -> Result<Duration, ServiceError> {
    let millis = (minutes * 60_000.0).round();
    if !millis.is_finite() || millis < 0.0 || millis > i64::MAX as f64 {
        return Err(ServiceError::InvalidInput(format!(
            "production time of {} minutes is out of range",
            minutes
        )));
    }
    Duration::try_milliseconds(millis as i64).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "production time of {} minutes is out of range",
            minutes
        ))
    })
}

/// Start plus the production duration for `quantity` units.
pub fn estimated_end(
    start: DateTime<Utc>,
    time_per_unit: i32,
    quantity: i32,
    efficiency: Option<f64>,
) -> Result<DateTime<Utc>, ServiceError> {
    let duration = minutes_to_duration(production_minutes(time_per_unit, quantity, efficiency))?;
    start
        .checked_add_signed(duration)
        .ok_or_else(|| ServiceError::InvalidInput("estimated end date is out of range".into()))
}

/// Parses a client timestamp into UTC.
///
/// RFC 3339 values with an offset are converted; values without a zone are
/// taken to be UTC already. A bare date means midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(ServiceError::ValidationError(format!(
        "'{}' is not a recognised timestamp",
        raw
    )))
}

/// `deserialize_with` adapter for timestamp fields.
pub fn deserialize_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// `deserialize_with` adapter for optional timestamp fields.
pub fn deserialize_optional_utc<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn line_efficiency_scales_duration() {
        assert_eq!(production_minutes(10, 5, Some(2.0)), 100.0);
        let end = estimated_end(at(8, 0), 10, 5, Some(2.0)).unwrap();
        assert_eq!(end, at(9, 40));
    }

    #[test]
    fn unassigned_orders_use_unit_efficiency() {
        assert_eq!(production_minutes(7, 3, None), 21.0);
    }

    #[test]
    fn fractional_minutes_are_not_truncated() {
        // 3 × 1 × 0.75 = 2.25 minutes
        let end = estimated_end(at(8, 0), 3, 1, Some(0.75)).unwrap();
        assert_eq!(end - at(8, 0), Duration::milliseconds(135_000));
    }

    #[test]
    fn absurd_durations_are_rejected() {
        assert!(minutes_to_duration(f64::INFINITY).is_err());
        assert!(estimated_end(at(8, 0), i32::MAX, i32::MAX, Some(2.0)).is_err());
    }

    #[test_case("2025-03-14T10:00:00Z", at(10, 0) ; "zulu")]
    #[test_case("2025-03-14T12:00:00+02:00", at(10, 0) ; "positive offset")]
    #[test_case("2025-03-14T05:30:00-04:30", at(10, 0) ; "negative offset")]
    #[test_case("2025-03-14T10:00:00", at(10, 0) ; "unspecified zone")]
    #[test_case("2025-03-14T10:00", at(10, 0) ; "no seconds")]
    #[test_case("2025-03-14 10:00:00.000", at(10, 0) ; "space separated")]
    #[test_case("2025-03-14", at(0, 0) ; "bare date")]
    fn timestamps_normalise_to_utc(raw: &str, expected: DateTime<Utc>) {
        assert_eq!(parse_timestamp(raw).unwrap(), expected);
    }

    #[test]
    fn garbage_timestamp_is_a_validation_error() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "deserialize_optional_utc")]
        start: Option<DateTime<Utc>>,
    }

    #[test]
    fn optional_adapter_handles_missing_and_empty() {
        let missing: Body = serde_json::from_str("{}").unwrap();
        assert!(missing.start.is_none());
        let empty: Body = serde_json::from_str(r#"{"start":""}"#).unwrap();
        assert!(empty.start.is_none());
        let set: Body = serde_json::from_str(r#"{"start":"2025-03-14T11:00:00+01:00"}"#).unwrap();
        assert_eq!(set.start, Some(at(10, 0)));
    }

    proptest! {
        #[test]
        fn duration_is_product_of_factors(
            time_per_unit in 1i32..=600,
            quantity in 1i32..=10_000,
            efficiency in 0.5f64..=2.0,
        ) {
            let minutes = production_minutes(time_per_unit, quantity, Some(efficiency));
            prop_assert_eq!(minutes, f64::from(time_per_unit) * f64::from(quantity) * efficiency);

            let start = at(0, 0);
            let end = estimated_end(start, time_per_unit, quantity, Some(efficiency)).unwrap();
            let elapsed_ms = (end - start).num_milliseconds() as f64;
            prop_assert!((elapsed_ms - minutes * 60_000.0).abs() <= 0.5);
        }
    }
}
