//! Timestamp normalization.
//!
//! Every timestamp a caller can hand to the resolver is first reduced to a
//! single canonical form, a UTC instant ([`DateTime<Utc>`]). Inputs come in
//! as the closed [`TimestampInput`] enum; naive values (no offset) are placed
//! in the zone configured by [`NormalizeOptions`], the system local zone by
//! default.
//!
//! Accepted text shapes, tried in order:
//!
//! | shape | example |
//! |---|---|
//! | RFC 3339 | `2023-03-01T12:00:00Z`, `2023-03-01T12:00:00.5+02:00` |
//! | offset with space separator | `2023-03-01 12:00:00+02:00` |
//! | naive date-time | `2023-03-01T12:00:00`, `2023-03-01 12:00`, `2023-03-01T12:00:00.123` |
//! | date only (midnight) | `2023-03-01` |
use std::fmt;

use arrow::datatypes::TimeUnit;
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::versioning::error::{
    EpochOutOfRangeSnafu, InvalidOffsetSnafu, NonexistentLocalTimeSnafu, ParseSnafu,
    TypeMismatchSnafu, VersioningError,
};

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A timestamp in any of the shapes the resolver accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampInput {
    /// ISO-8601 text.
    Text(String),
    /// Calendar date-time without an offset.
    Calendar(NaiveDateTime),
    /// Instant with a known offset.
    Instant(DateTime<FixedOffset>),
    /// Integer offset from the Unix epoch, as stored in Arrow timestamp
    /// columns.
    Epoch {
        /// Raw value.
        value: i64,
        /// Unit of `value`.
        unit: TimeUnit,
    },
}

impl From<&str> for TimestampInput {
    fn from(s: &str) -> Self {
        TimestampInput::Text(s.to_string())
    }
}

impl From<String> for TimestampInput {
    fn from(s: String) -> Self {
        TimestampInput::Text(s)
    }
}

impl From<NaiveDateTime> for TimestampInput {
    fn from(dt: NaiveDateTime) -> Self {
        TimestampInput::Calendar(dt)
    }
}

impl From<NaiveDate> for TimestampInput {
    fn from(d: NaiveDate) -> Self {
        TimestampInput::Calendar(d.and_time(NaiveTime::MIN))
    }
}

impl From<DateTime<FixedOffset>> for TimestampInput {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        TimestampInput::Instant(dt)
    }
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(dt: DateTime<Utc>) -> Self {
        TimestampInput::Instant(dt.fixed_offset())
    }
}

impl From<DateTime<Local>> for TimestampInput {
    fn from(dt: DateTime<Local>) -> Self {
        TimestampInput::Instant(dt.fixed_offset())
    }
}

impl fmt::Display for TimestampInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampInput::Text(s) => write!(f, "{s:?}"),
            TimestampInput::Calendar(dt) => write!(f, "{dt}"),
            TimestampInput::Instant(dt) => write!(f, "{}", dt.to_rfc3339()),
            TimestampInput::Epoch { value, unit } => write!(f, "{value} ({unit:?} since epoch)"),
        }
    }
}

/// JSON is the dynamically typed entry point: strings are accepted as text,
/// every other JSON type is rejected with `TypeMismatch`.
impl TryFrom<&serde_json::Value> for TimestampInput {
    type Error = VersioningError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let observed_type = match value {
            Value::String(s) => return Ok(TimestampInput::Text(s.clone())),
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };

        TypeMismatchSnafu {
            input: value.to_string(),
            observed_type,
        }
        .fail()
    }
}

/// Zone assigned to timestamps that carry no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaiveTimezone {
    /// Treat naive values as UTC.
    Utc,
    /// Treat naive values as wall-clock time in the system zone.
    #[default]
    Local,
    /// Treat naive values as wall-clock time at a fixed UTC offset.
    Fixed {
        /// Seconds east of UTC.
        offset_seconds: i32,
    },
}

impl NaiveTimezone {
    /// Place `naive` in this zone and convert to UTC.
    ///
    /// An ambiguous wall-clock time (a repeated hour) resolves to the earlier
    /// instant. A wall-clock time inside a gap fails with
    /// `NonexistentLocalTime`.
    pub fn to_utc(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>, VersioningError> {
        let mapped = match *self {
            NaiveTimezone::Utc => return Ok(naive.and_utc()),
            NaiveTimezone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            NaiveTimezone::Fixed { offset_seconds } => {
                let offset = FixedOffset::east_opt(offset_seconds)
                    .context(InvalidOffsetSnafu { offset_seconds })?;
                offset
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        };

        mapped.context(NonexistentLocalTimeSnafu {
            input: naive,
            zone: self.to_string(),
        })
    }
}

impl fmt::Display for NaiveTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaiveTimezone::Utc => f.write_str("UTC"),
            NaiveTimezone::Local => f.write_str("local"),
            NaiveTimezone::Fixed { offset_seconds } => match FixedOffset::east_opt(*offset_seconds)
            {
                Some(offset) => write!(f, "{offset}"),
                None => write!(f, "{offset_seconds}s"),
            },
        }
    }
}

/// Options for [`normalize_timestamp_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Zone for inputs without an offset.
    pub naive_timezone: NaiveTimezone,
}

impl NormalizeOptions {
    /// Interpret naive inputs in `tz`.
    pub fn with_naive_timezone(mut self, tz: NaiveTimezone) -> Self {
        self.naive_timezone = tz;
        self
    }
}

/// Normalize `input` to a UTC instant, reading naive values as system
/// local time.
///
/// Normalizing an already normalized value returns it unchanged.
pub fn normalize_timestamp(
    input: impl Into<TimestampInput>,
) -> Result<DateTime<Utc>, VersioningError> {
    normalize_timestamp_with(input, &NormalizeOptions::default())
}

/// Normalize `input` to a UTC instant using `options`.
pub fn normalize_timestamp_with(
    input: impl Into<TimestampInput>,
    options: &NormalizeOptions,
) -> Result<DateTime<Utc>, VersioningError> {
    match input.into() {
        TimestampInput::Text(text) => parse_text(&text, options),
        TimestampInput::Calendar(naive) => options.naive_timezone.to_utc(naive),
        TimestampInput::Instant(dt) => Ok(dt.with_timezone(&Utc)),
        TimestampInput::Epoch { value, unit } => epoch_to_utc(value, unit),
    }
}

fn parse_text(text: &str, options: &NormalizeOptions) -> Result<DateTime<Utc>, VersioningError> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return options.naive_timezone.to_utc(naive);
        }
    }

    let date = NaiveDate::parse_from_str(s, DATE_FORMAT).context(ParseSnafu { input: text })?;
    options.naive_timezone.to_utc(date.and_time(NaiveTime::MIN))
}

fn epoch_to_utc(value: i64, unit: TimeUnit) -> Result<DateTime<Utc>, VersioningError> {
    let dt = match unit {
        TimeUnit::Second => Utc.timestamp_opt(value, 0),
        TimeUnit::Millisecond => Utc.timestamp_millis_opt(value),
        TimeUnit::Microsecond => Utc.timestamp_micros(value),
        TimeUnit::Nanosecond => {
            let secs = value.div_euclid(1_000_000_000);
            let nanos = value.rem_euclid(1_000_000_000) as u32;
            Utc.timestamp_opt(secs, nanos)
        }
    };

    dt.single().context(EpochOutOfRangeSnafu { value, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid UTC timestamp")
    }

    fn as_utc() -> NormalizeOptions {
        NormalizeOptions::default().with_naive_timezone(NaiveTimezone::Utc)
    }

    #[test]
    fn naive_values_default_to_system_local_time() -> TestResult {
        assert_eq!(NormalizeOptions::default().naive_timezone, NaiveTimezone::Local);

        let naive = NaiveDate::from_ymd_opt(2023, 6, 1)
            .and_then(|d| d.and_hms_opt(1, 0, 0))
            .expect("valid naive time");
        let expected = Local
            .from_local_datetime(&naive)
            .earliest()
            .expect("01:00 exists locally")
            .with_timezone(&Utc);

        assert_eq!(normalize_timestamp("2023-06-01T01:00:00")?, expected);
        assert_eq!(normalize_timestamp(naive)?, expected);
        Ok(())
    }

    #[test]
    fn text_shapes_normalize_to_the_same_instant() -> TestResult {
        let expected = utc(2023, 3, 1, 10, 30, 0);

        for text in [
            "2023-03-01T10:30:00Z",
            "2023-03-01T12:30:00+02:00",
            "2023-03-01 12:30:00+02:00",
            "2023-03-01T05:30:00-0500",
            "2023-03-01T10:30:00",
            "2023-03-01 10:30:00",
            "2023-03-01T10:30",
            "  2023-03-01T10:30:00.000Z ",
        ] {
            assert_eq!(
                normalize_timestamp_with(text, &as_utc())?,
                expected,
                "input {text:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn date_only_text_is_midnight() -> TestResult {
        assert_eq!(
            normalize_timestamp_with("2023-03-01", &as_utc())?,
            utc(2023, 3, 1, 0, 0, 0)
        );
        Ok(())
    }

    #[test]
    fn fractional_seconds_are_kept() -> TestResult {
        let dt = normalize_timestamp("2023-03-01T00:00:00.123456789Z")?;
        assert_eq!(dt.timestamp_subsec_nanos(), 123_456_789);
        Ok(())
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        for text in ["", "yesterday", "2023-13-01", "2023-02-30T00:00:00", "03/01/2023"] {
            let err = normalize_timestamp(text).expect_err("malformed");
            match err {
                VersioningError::Parse { input, .. } => assert_eq!(input, text),
                other => panic!("expected Parse for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn normalization_is_idempotent() -> TestResult {
        let inputs: Vec<TimestampInput> = vec![
            "2023-06-01T08:00:00+05:30".into(),
            "2023-06-01".into(),
            NaiveDate::from_ymd_opt(2020, 2, 29)
                .expect("valid date")
                .into(),
            TimestampInput::Epoch {
                value: 1_685_577_600_123,
                unit: TimeUnit::Millisecond,
            },
        ];

        for input in inputs {
            let once = normalize_timestamp(input.clone())?;
            let twice = normalize_timestamp(once)?;
            assert_eq!(once, twice, "input {input}");
        }
        Ok(())
    }

    #[test]
    fn aware_instants_keep_their_instant() -> TestResult {
        let offset = FixedOffset::east_opt(-8 * 3600).expect("valid offset");
        let local = offset
            .with_ymd_and_hms(2023, 1, 1, 16, 0, 0)
            .single()
            .expect("valid local time");

        assert_eq!(normalize_timestamp(local)?, utc(2023, 1, 2, 0, 0, 0));
        Ok(())
    }

    #[test]
    fn naive_values_follow_configured_zone() -> TestResult {
        let naive = NaiveDate::from_ymd_opt(2023, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid naive time");

        let utc_opts = as_utc();
        let plus_two = NormalizeOptions::default().with_naive_timezone(NaiveTimezone::Fixed {
            offset_seconds: 2 * 3600,
        });

        assert_eq!(
            normalize_timestamp_with(naive, &utc_opts)?,
            utc(2023, 3, 1, 12, 0, 0)
        );
        assert_eq!(
            normalize_timestamp_with(naive, &plus_two)?,
            utc(2023, 3, 1, 10, 0, 0)
        );
        assert_eq!(
            normalize_timestamp_with("2023-03-01 12:00", &plus_two)?,
            utc(2023, 3, 1, 10, 0, 0)
        );
        // Explicit offsets ignore the naive zone.
        assert_eq!(
            normalize_timestamp_with("2023-03-01T12:00:00Z", &plus_two)?,
            utc(2023, 3, 1, 12, 0, 0)
        );
        Ok(())
    }

    #[test]
    fn invalid_fixed_offset_is_rejected() {
        let opts = NormalizeOptions::default().with_naive_timezone(NaiveTimezone::Fixed {
            offset_seconds: 90_000,
        });
        let err = normalize_timestamp_with("2023-03-01", &opts).expect_err("offset > 24h");
        assert!(matches!(
            err,
            VersioningError::InvalidOffset {
                offset_seconds: 90_000
            }
        ));
    }

    #[test]
    fn epoch_values_in_every_unit() -> TestResult {
        let expected = utc(2023, 6, 1, 0, 0, 0);
        let secs = expected.timestamp();

        for (value, unit) in [
            (secs, TimeUnit::Second),
            (secs * 1_000, TimeUnit::Millisecond),
            (secs * 1_000_000, TimeUnit::Microsecond),
            (secs * 1_000_000_000, TimeUnit::Nanosecond),
        ] {
            assert_eq!(
                normalize_timestamp(TimestampInput::Epoch { value, unit })?,
                expected
            );
        }

        let before_epoch = normalize_timestamp(TimestampInput::Epoch {
            value: -1,
            unit: TimeUnit::Nanosecond,
        })?;
        assert_eq!(before_epoch.timestamp(), -1);
        assert_eq!(before_epoch.timestamp_subsec_nanos(), 999_999_999);
        Ok(())
    }

    #[test]
    fn epoch_out_of_range_is_an_error() {
        let err = normalize_timestamp(TimestampInput::Epoch {
            value: i64::MAX,
            unit: TimeUnit::Second,
        })
        .expect_err("out of range");
        assert!(matches!(err, VersioningError::EpochOutOfRange { .. }));
    }

    #[test]
    fn json_strings_are_text_and_other_types_mismatch() -> TestResult {
        let input = TimestampInput::try_from(&json!("2023-03-01"))?;
        assert_eq!(input, TimestampInput::Text("2023-03-01".to_string()));

        for (value, expected) in [
            (json!(1_685_577_600), "number"),
            (json!(null), "null"),
            (json!(true), "bool"),
            (json!(["2023-03-01"]), "array"),
            (json!({"ts": "2023-03-01"}), "object"),
        ] {
            let err = TimestampInput::try_from(&value).expect_err("not a string");
            match err {
                VersioningError::TypeMismatch { observed_type, .. } => {
                    assert_eq!(observed_type, expected)
                }
                other => panic!("expected TypeMismatch, got {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn options_deserialize_from_config() -> TestResult {
        let opts: NormalizeOptions = serde_json::from_str(
            r#"{ "naive_timezone": { "fixed": { "offset_seconds": -3600 } } }"#,
        )?;
        assert_eq!(
            opts.naive_timezone,
            NaiveTimezone::Fixed {
                offset_seconds: -3600
            }
        );

        let opts: NormalizeOptions = serde_json::from_str("{}")?;
        assert_eq!(opts.naive_timezone, NaiveTimezone::Local);

        let opts: NormalizeOptions = serde_json::from_str(r#"{ "naive_timezone": "utc" }"#)?;
        assert_eq!(opts.naive_timezone, NaiveTimezone::Utc);
        Ok(())
    }
}
