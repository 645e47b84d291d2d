use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use rusqlite::types::Value as SqlValue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::derive::MetricValue;
use super::metric::MetricColumn;
use super::{ToolDefinition, encode_payload, parse_arguments, schema_value};
use crate::store::DatabaseManager;
use crate::utils::time::{MILLIS_PER_DAY, MILLIS_PER_HOUR, format_unix_ms};

pub const TOOL_NAME: &str = "get_time_series_data";
pub const UNKNOWN_CAMPAIGN_NAME: &str = "Unknown";

fn default_metric() -> String {
    MetricColumn::Impressions.key().to_string()
}

fn default_granularity() -> String {
    Granularity::Daily.key().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimeSeriesRequest {
    pub campaign_id: String,

    /// impressions, clicks, reach, spend, conversions, engagement_rate, cpm or roas.
    #[serde(default = "default_metric")]
    pub metric: String,

    /// `hourly`, `daily` or `weekly` (weeks start Monday 00:00 UTC).
    #[serde(default = "default_granularity")]
    pub granularity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
}

impl Granularity {
    pub const ALL: [Self; 3] = [Self::Hourly, Self::Daily, Self::Weekly];

    /// Unrecognized names fall back to daily buckets.
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        let candidate = raw.trim();
        Self::ALL
            .into_iter()
            .find(|granularity| granularity.key().eq_ignore_ascii_case(candidate))
            .unwrap_or(Self::Daily)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// SQL expression truncating `timestamp_unix_ms` to the bucket start.
    ///
    /// Day 0 of the unix epoch was a Thursday, so `(day + 3) % 7` is the number
    /// of days since the preceding Monday.
    #[must_use]
    pub fn bucket_sql(self) -> String {
        match self {
            Self::Hourly => {
                format!("(timestamp_unix_ms / {MILLIS_PER_HOUR}) * {MILLIS_PER_HOUR}")
            }
            Self::Daily => format!("(timestamp_unix_ms / {MILLIS_PER_DAY}) * {MILLIS_PER_DAY}"),
            Self::Weekly => format!(
                "((timestamp_unix_ms / {MILLIS_PER_DAY}) - \
                 (((timestamp_unix_ms / {MILLIS_PER_DAY}) + 3) % 7)) * {MILLIS_PER_DAY}"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TrendDirection {
    #[serde(rename = "increasing")]
    Increasing,
    #[serde(rename = "decreasing")]
    Decreasing,
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "insufficient data")]
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    pub direction: TrendDirection,
    pub percentage_change: f64,
}

impl Trend {
    /// Compares the last bucket against the first.
    #[must_use]
    pub fn from_series(points: &[TimeSeriesPoint]) -> Self {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Self::insufficient();
        };
        if points.len() < 2 {
            return Self::insufficient();
        }

        let first = first.value.as_f64();
        let last = last.value.as_f64();
        if first <= 0.0 {
            return Self {
                direction: TrendDirection::Stable,
                percentage_change: 0.0,
            };
        }

        let percentage_change = (last - first) / first * 100.0;
        let direction = if percentage_change > 0.0 {
            TrendDirection::Increasing
        } else if percentage_change < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        Self {
            direction,
            percentage_change,
        }
    }

    const fn insufficient() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            percentage_change: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSeriesPoint {
    /// Bucket start, RFC 3339 UTC.
    pub period: String,
    pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSeriesResponse {
    pub campaign_id: String,
    pub campaign_name: String,
    pub metric: String,
    pub granularity: String,
    pub time_series: Vec<TimeSeriesPoint>,
    pub trend: Trend,
}

pub fn get_time_series_data(
    database: &DatabaseManager,
    request: &TimeSeriesRequest,
) -> Result<TimeSeriesResponse> {
    let metric = MetricColumn::resolve(&request.metric);
    let granularity = Granularity::resolve(&request.granularity);

    let sql = format!(
        r#"
SELECT {bucket} AS period_unix_ms, {value} AS value
FROM campaign_metrics AS m
WHERE m.campaign_id = ?1
GROUP BY period_unix_ms
ORDER BY period_unix_ms ASC
"#,
        bucket = granularity.bucket_sql(),
        value = metric.aggregate_sql("m"),
    );

    let (buckets, campaign_name) = database.with_session(|tx| {
        let buckets = {
            let mut statement = tx
                .prepare(&sql)
                .context("failed to prepare time series query")?;
            let rows = statement
                .query_map([&request.campaign_id], |row| {
                    Ok((row.get::<usize, i64>(0)?, row.get::<usize, SqlValue>(1)?))
                })
                .context("failed to execute time series query")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to decode time series row")?
        };

        let campaign_name = tx
            .query_row(
                "SELECT campaign_name FROM campaign_configurations WHERE campaign_id = ?1",
                [&request.campaign_id],
                |row| row.get::<usize, String>(0),
            )
            .optional()
            .context("failed to look up campaign name")?;

        Ok((buckets, campaign_name))
    })?;

    let time_series = buckets
        .into_iter()
        .map(|(period_unix_ms, value)| {
            Ok(TimeSeriesPoint {
                period: format_unix_ms(period_unix_ms)?,
                value: MetricValue::from_sql(value),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TimeSeriesResponse {
        campaign_id: request.campaign_id.clone(),
        campaign_name: campaign_name.unwrap_or_else(|| UNKNOWN_CAMPAIGN_NAME.to_string()),
        metric: metric.key().to_string(),
        granularity: granularity.key().to_string(),
        trend: Trend::from_series(&time_series),
        time_series,
    })
}

fn handle(database: &DatabaseManager, arguments: Value) -> Result<String> {
    let request: TimeSeriesRequest = parse_arguments(TOOL_NAME, arguments)?;
    encode_payload(&get_time_series_data(database, &request)?)
}

#[must_use]
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME,
        title: "Get Time Series Data",
        description: "Bucket one campaign's metric by hour, day or week and report the \
                      first-to-last trend.",
        input_schema: schema_value::<TimeSeriesRequest>,
        output_schema: schema_value::<TimeSeriesResponse>,
        handler: handle,
    }
}

#[cfg(test)]
mod tests {
    use super::{Granularity, TimeSeriesPoint, Trend, TrendDirection};
    use crate::tools::derive::MetricValue;

    fn series(values: &[i64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(day, value)| TimeSeriesPoint {
                period: format!("2024-01-{:02}T00:00:00Z", day + 1),
                value: MetricValue::Integer(*value),
            })
            .collect()
    }

    #[test]
    fn granularity_falls_back_to_daily() {
        assert_eq!(Granularity::resolve("weekly"), Granularity::Weekly);
        assert_eq!(Granularity::resolve("HOURLY"), Granularity::Hourly);
        assert_eq!(Granularity::resolve("monthly"), Granularity::Daily);
    }

    #[test]
    fn trend_needs_two_periods() {
        assert_eq!(Trend::from_series(&[]).direction, TrendDirection::InsufficientData);
        let single = Trend::from_series(&series(&[500]));
        assert_eq!(single.direction, TrendDirection::InsufficientData);
        assert_eq!(single.percentage_change, 0.0);
    }

    #[test]
    fn trend_compares_last_against_first() {
        let rising = Trend::from_series(&series(&[100, 50, 300]));
        assert_eq!(rising.direction, TrendDirection::Increasing);
        assert_eq!(rising.percentage_change, 200.0);

        let falling = Trend::from_series(&series(&[400, 100]));
        assert_eq!(falling.direction, TrendDirection::Decreasing);
        assert_eq!(falling.percentage_change, -75.0);

        let flat = Trend::from_series(&series(&[80, 120, 80]));
        assert_eq!(flat.direction, TrendDirection::Stable);
        assert_eq!(flat.percentage_change, 0.0);
    }

    #[test]
    fn non_positive_first_value_is_stable() {
        let trend = Trend::from_series(&series(&[0, 250]));
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.percentage_change, 0.0);
    }

    #[test]
    fn insufficient_data_serializes_with_space() {
        let encoded = serde_json::to_string(&TrendDirection::InsufficientData)
            .expect("direction should encode");
        assert_eq!(encoded, "\"insufficient data\"");
    }
}
