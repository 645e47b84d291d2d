use anyhow::{Context, Result, bail};
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset};

const EPOCH_SECONDS_CUTOFF: i128 = 100_000_000_000;
const EPOCH_MILLIS_CUTOFF: i128 = 100_000_000_000_000;
const EPOCH_MICROS_CUTOFF: i128 = 100_000_000_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const CALENDAR_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub const MILLIS_PER_HOUR: i64 = 3_600_000;
pub const MILLIS_PER_DAY: i64 = 86_400_000;

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[must_use]
pub fn to_unix_ms(value: OffsetDateTime) -> i64 {
    let unix_ms = value.unix_timestamp_nanos() / NANOS_PER_MILLI;
    i64::try_from(unix_ms).unwrap_or(if unix_ms < 0 { i64::MIN } else { i64::MAX })
}

pub fn from_unix_ms(timestamp_unix_ms: i64) -> Result<OffsetDateTime> {
    let nanos = i128::from(timestamp_unix_ms) * NANOS_PER_MILLI;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .with_context(|| format!("unix milliseconds out of range: {timestamp_unix_ms}"))
}

/// Accepts RFC 3339 strings or integer epochs (seconds, millis, micros or nanos,
/// inferred from magnitude).
pub fn parse_timestamp_to_unix_ms(raw: &str) -> Result<i64> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }

    if let Ok(epoch_raw) = candidate.parse::<i128>() {
        return epoch_to_unix_ms(epoch_raw);
    }

    if let Ok(parsed) = OffsetDateTime::parse(candidate, &Rfc3339) {
        if parsed.unix_timestamp() < 0 {
            bail!("timestamps before 1970-01-01T00:00:00Z are not supported");
        }
        return Ok(to_unix_ms(parsed));
    }

    bail!("unsupported timestamp format: {candidate}");
}

/// Parses a `YYYY-MM-DD` calendar date into midnight UTC of that day.
pub fn parse_calendar_date(raw: &str) -> Result<OffsetDateTime> {
    let candidate = raw.trim();
    // `[year]` tolerates a leading sign; calendar dates never carry one.
    if candidate.starts_with(['+', '-']) {
        bail!("time data `{candidate}` does not match format YYYY-MM-DD");
    }
    let date = Date::parse(candidate, CALENDAR_DATE_FORMAT)
        .with_context(|| format!("time data `{candidate}` does not match format YYYY-MM-DD"))?;

    Ok(date.with_time(Time::MIDNIGHT).assume_utc())
}

pub fn format_utc(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .context("failed to format timestamp as RFC 3339")
}

pub fn format_unix_ms(timestamp_unix_ms: i64) -> Result<String> {
    format_utc(from_unix_ms(timestamp_unix_ms)?)
}

fn epoch_to_unix_ms(epoch_raw: i128) -> Result<i64> {
    if epoch_raw < 0 {
        bail!("negative epoch values are not supported");
    }

    let epoch_ms = if epoch_raw < EPOCH_SECONDS_CUTOFF {
        epoch_raw.checked_mul(1_000)
    } else if epoch_raw < EPOCH_MILLIS_CUTOFF {
        Some(epoch_raw)
    } else if epoch_raw < EPOCH_MICROS_CUTOFF {
        Some(epoch_raw / 1_000)
    } else {
        Some(epoch_raw / 1_000_000)
    }
    .ok_or_else(|| anyhow::anyhow!("epoch conversion overflow"))?;

    i64::try_from(epoch_ms)
        .map_err(|_| anyhow::anyhow!("timestamp exceeds supported unix millisecond range"))
}

#[cfg(test)]
mod tests {
    use super::{
        format_unix_ms, format_utc, parse_calendar_date, parse_timestamp_to_unix_ms, to_unix_ms,
    };

    #[test]
    fn parses_rfc3339_utc() {
        let as_ms = parse_timestamp_to_unix_ms("2026-02-05T07:00:03Z").expect("timestamp should parse");
        assert_eq!(as_ms, 1_770_274_803_000);
        assert_eq!(
            format_unix_ms(as_ms).expect("timestamp should format"),
            "2026-02-05T07:00:03Z"
        );
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let as_ms = parse_timestamp_to_unix_ms("2026-02-05T09:00:03+02:00")
            .expect("timestamp should parse");
        assert_eq!(as_ms, 1_770_274_803_000);
    }

    #[test]
    fn infers_epoch_seconds_and_millis() {
        assert_eq!(
            parse_timestamp_to_unix_ms("1770274803").expect("seconds should parse"),
            1_770_274_803_000
        );
        assert_eq!(
            parse_timestamp_to_unix_ms("1770274803000").expect("milliseconds should parse"),
            1_770_274_803_000
        );
    }

    #[test]
    fn rejects_negative_epoch() {
        let err = parse_timestamp_to_unix_ms("-1").expect_err("negative epoch should fail");
        assert!(err.to_string().contains("negative epoch values"));
    }

    #[test]
    fn calendar_date_resolves_to_utc_midnight() {
        let parsed = parse_calendar_date("2024-03-09").expect("date should parse");
        assert_eq!(format_utc(parsed).expect("date should format"), "2024-03-09T00:00:00Z");
        assert_eq!(to_unix_ms(parsed), 1_709_942_400_000);
    }

    #[test]
    fn calendar_date_rejects_other_shapes() {
        for raw in [
            "2024/03/09",
            "03-09-2024",
            "2024-3-9",
            "yesterday",
            "2024-02-30",
            "2024-03-+9",
            "+024-03-09",
            "2024-+3-09",
            "+2024-03-09",
            "2024-03-09T00:00:00Z",
        ] {
            assert!(
                parse_calendar_date(raw).is_err(),
                "`{raw}` should not parse as a calendar date"
            );
        }
    }
}
