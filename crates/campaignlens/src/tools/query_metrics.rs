use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolDefinition, encode_payload, parse_arguments, schema_value};
use crate::store::DatabaseManager;
use crate::utils::time::{format_unix_ms, parse_calendar_date, to_unix_ms};

pub const TOOL_NAME: &str = "query_campaign_metrics";

/// Fields kept in every record regardless of the requested metric subset.
pub const IDENTITY_FIELDS: [&str; 3] = ["campaign_id", "campaign_name", "timestamp"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryMetricsRequest {
    /// Campaign identifier; all campaigns when omitted.
    #[serde(default)]
    pub campaign_id: Option<String>,

    /// Earliest sample, `YYYY-MM-DD` (midnight UTC, inclusive).
    #[serde(default)]
    pub start_date: Option<String>,

    /// Latest sample, `YYYY-MM-DD` (midnight UTC, inclusive).
    #[serde(default)]
    pub end_date: Option<String>,

    /// Metric fields to keep, e.g. `["impressions", "clicks"]`; all when omitted.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct MetricsRecord {
    campaign_id: String,
    campaign_name: String,
    timestamp: String,
    impressions: i64,
    clicks: i64,
    reach: i64,
    frequency: f64,
    engagement_rate: f64,
    spend: f64,
    cpm: f64,
    pacing: f64,
    view_through_rate: f64,
    attention_score: f64,
    conversions: i64,
    roas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryMetricsResponse {
    /// One record per metrics sample, ordered by timestamp.
    pub metrics: Vec<BTreeMap<String, Value>>,
    pub count: usize,
}

const QUERY_METRICS_SQL: &str = r#"
SELECT
    m.campaign_id,
    c.campaign_name,
    m.timestamp_unix_ms,
    m.impressions,
    m.clicks,
    m.reach,
    m.frequency,
    m.engagement_rate,
    m.spend_hourly,
    m.cost_per_thousand,
    m.pacing_percentage,
    m.view_through_rate,
    m.attention_score,
    m.conversion_count,
    m.return_on_ad_spend
FROM campaign_metrics AS m
JOIN campaign_configurations AS c ON c.campaign_id = m.campaign_id
"#;

pub fn query_campaign_metrics(
    database: &DatabaseManager,
    request: &QueryMetricsRequest,
) -> Result<QueryMetricsResponse> {
    let mut filters = Vec::new();
    let mut params = Vec::<SqlValue>::new();

    if let Some(campaign_id) = non_empty(request.campaign_id.as_deref()) {
        params.push(SqlValue::Text(campaign_id.to_string()));
        filters.push(format!("m.campaign_id = ?{}", params.len()));
    }
    if let Some(start_date) = non_empty(request.start_date.as_deref()) {
        let start = parse_calendar_date(start_date).context("invalid start_date")?;
        params.push(SqlValue::Integer(to_unix_ms(start)));
        filters.push(format!("m.timestamp_unix_ms >= ?{}", params.len()));
    }
    if let Some(end_date) = non_empty(request.end_date.as_deref()) {
        let end = parse_calendar_date(end_date).context("invalid end_date")?;
        params.push(SqlValue::Integer(to_unix_ms(end)));
        filters.push(format!("m.timestamp_unix_ms <= ?{}", params.len()));
    }

    let mut sql = QUERY_METRICS_SQL.to_string();
    if !filters.is_empty() {
        sql.push_str("WHERE ");
        sql.push_str(&filters.join(" AND "));
        sql.push('\n');
    }
    sql.push_str("ORDER BY m.timestamp_unix_ms ASC, m.metric_id ASC");

    let records = database.with_session(|tx| {
        let mut statement = tx
            .prepare(&sql)
            .context("failed to prepare campaign metrics query")?;
        let rows = statement
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<usize, String>(0)?,
                    row.get::<usize, String>(1)?,
                    row.get::<usize, i64>(2)?,
                    row.get::<usize, i64>(3)?,
                    row.get::<usize, i64>(4)?,
                    row.get::<usize, i64>(5)?,
                    row.get::<usize, f64>(6)?,
                    row.get::<usize, f64>(7)?,
                    row.get::<usize, f64>(8)?,
                    row.get::<usize, f64>(9)?,
                    row.get::<usize, f64>(10)?,
                    row.get::<usize, f64>(11)?,
                    row.get::<usize, f64>(12)?,
                    row.get::<usize, i64>(13)?,
                    row.get::<usize, f64>(14)?,
                ))
            })
            .context("failed to execute campaign metrics query")?;

        let mut records = Vec::new();
        for row in rows {
            let (
                campaign_id,
                campaign_name,
                timestamp_unix_ms,
                impressions,
                clicks,
                reach,
                frequency,
                engagement_rate,
                spend,
                cpm,
                pacing,
                view_through_rate,
                attention_score,
                conversions,
                roas,
            ) = row.context("failed to decode campaign metrics row")?;
            records.push(MetricsRecord {
                campaign_id,
                campaign_name,
                timestamp: format_unix_ms(timestamp_unix_ms)?,
                impressions,
                clicks,
                reach,
                frequency,
                engagement_rate,
                spend,
                cpm,
                pacing,
                view_through_rate,
                attention_score,
                conversions,
                roas,
            });
        }
        Ok(records)
    })?;

    let selection = request
        .metrics
        .as_ref()
        .filter(|metrics| !metrics.is_empty());
    let metrics = records
        .iter()
        .map(|record| project_record(record, selection.map(Vec::as_slice)))
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryMetricsResponse {
        count: metrics.len(),
        metrics,
    })
}

fn project_record(
    record: &MetricsRecord,
    selection: Option<&[String]>,
) -> Result<BTreeMap<String, Value>> {
    let Value::Object(fields) =
        serde_json::to_value(record).context("failed to encode metrics record")?
    else {
        anyhow::bail!("metrics record did not encode as a JSON object");
    };

    Ok(fields
        .into_iter()
        .filter(|(key, _)| match selection {
            None => true,
            Some(selection) => {
                IDENTITY_FIELDS.contains(&key.as_str())
                    || selection.iter().any(|requested| requested == key)
            }
        })
        .collect())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn handle(database: &DatabaseManager, arguments: Value) -> Result<String> {
    let request: QueryMetricsRequest = parse_arguments(TOOL_NAME, arguments)?;
    encode_payload(&query_campaign_metrics(database, &request)?)
}

#[must_use]
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME,
        title: "Query Campaign Metrics",
        description: "Query performance metrics for a specific campaign or all campaigns, \
                      optionally bounded by YYYY-MM-DD dates and restricted to a metric subset.",
        input_schema: schema_value::<QueryMetricsRequest>,
        output_schema: schema_value::<QueryMetricsResponse>,
        handler: handle,
    }
}
