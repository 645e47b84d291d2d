use anyhow::{Context, Result};
use rusqlite::params;
use rusqlite::types::Value as SqlValue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::derive::{MetricValue, click_through_rate};
use super::metric::MetricColumn;
use super::window::TimeWindow;
use super::{ToolDefinition, encode_payload, parse_arguments, schema_value};
use crate::store::DatabaseManager;
use crate::utils::time::{format_utc, now_utc, to_unix_ms};

pub const TOOL_NAME: &str = "aggregate_performance_data";
pub const NO_DATA_MESSAGE: &str = "No data found for the specified period";

fn default_aggregation_type() -> String {
    "top_n".to_string()
}

fn default_metric() -> String {
    MetricColumn::Impressions.key().to_string()
}

fn default_limit() -> u32 {
    10
}

fn default_time_period() -> String {
    TimeWindow::Last7Days.key().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AggregateRequest {
    /// `top_n`, `bottom_n`, `average` or `sum`. Only the ranking kinds change
    /// the order of the returned campaigns.
    #[serde(default = "default_aggregation_type")]
    pub aggregation_type: String,

    /// Metric to rank by: impressions, clicks, reach, spend, conversions,
    /// engagement_rate, cpm or roas.
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Maximum number of campaigns returned.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// `today`, `yesterday`, `last_7_days`, `last_30_days` or `month_to_date`.
    #[serde(default = "default_time_period")]
    pub time_period: String,
}

impl Default for AggregateRequest {
    fn default() -> Self {
        Self {
            aggregation_type: default_aggregation_type(),
            metric: default_metric(),
            limit: default_limit(),
            time_period: default_time_period(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Descending,
    Ascending,
    Unranked,
}

impl Ranking {
    #[must_use]
    pub fn from_aggregation_type(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top_n" => Self::Descending,
            "bottom_n" => Self::Ascending,
            _ => Self::Unranked,
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::Descending => "metric_value DESC, c.campaign_id ASC",
            Self::Ascending => "metric_value ASC, c.campaign_id ASC",
            Self::Unranked => "c.campaign_id ASC",
        }
    }
}

/// One ranked campaign. The resolved metric is flattened in under its own
/// name, e.g. `"spend": 412.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregatedCampaign {
    pub campaign_id: String,
    pub campaign_name: String,
    pub total_budget: f64,

    #[serde(flatten)]
    pub metric: serde_json::Map<String, Value>,

    pub total_impressions: i64,
    pub total_clicks: i64,
    pub total_spend: f64,
    pub ctr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregatedMetrics {
    pub total_campaigns: usize,
    pub total_impressions: i64,
    pub total_clicks: i64,
    pub total_spend: f64,
    pub avg_ctr: f64,
    pub time_period: String,
    pub date_range: DateRange,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregateResponse {
    pub campaigns: Vec<AggregatedCampaign>,
    pub aggregated_metrics: AggregatedMetrics,
    pub aggregation_type: String,
    pub sorted_by: String,
    pub requested_metric: String,
}

pub fn aggregate_performance_data(
    database: &DatabaseManager,
    request: &AggregateRequest,
) -> Result<AggregateResponse> {
    aggregate_performance_data_at(database, request, now_utc())
}

/// Same as [`aggregate_performance_data`] with an explicit "now" anchoring the
/// time window.
pub fn aggregate_performance_data_at(
    database: &DatabaseManager,
    request: &AggregateRequest,
    now: OffsetDateTime,
) -> Result<AggregateResponse> {
    let metric = MetricColumn::resolve(&request.metric);
    let window = TimeWindow::resolve(&request.time_period);
    let ranking = Ranking::from_aggregation_type(&request.aggregation_type);
    let bounds = window.bounds(now)?;

    let sql = format!(
        r#"
SELECT
    c.campaign_id,
    c.campaign_name,
    c.total_budget,
    {metric_sql} AS metric_value,
    COALESCE(SUM(m.impressions), 0),
    COALESCE(SUM(m.clicks), 0),
    COALESCE(SUM(m.spend_hourly), 0.0)
FROM campaign_configurations AS c
JOIN campaign_metrics AS m ON m.campaign_id = c.campaign_id
WHERE m.timestamp_unix_ms >= ?1 AND m.timestamp_unix_ms <= ?2
GROUP BY c.campaign_id, c.campaign_name, c.total_budget
ORDER BY {order_by}
LIMIT ?3
"#,
        metric_sql = metric.aggregate_sql("m"),
        order_by = ranking.order_by(),
    );

    let start_ms = to_unix_ms(bounds.start);
    let end_ms = to_unix_ms(bounds.end);
    let limit = i64::from(request.limit);

    let campaigns = database.with_session(|tx| {
        let mut statement = tx
            .prepare(&sql)
            .context("failed to prepare aggregation query")?;
        let rows = statement
            .query_map(params![start_ms, end_ms, limit], |row| {
                Ok((
                    row.get::<usize, String>(0)?,
                    row.get::<usize, String>(1)?,
                    row.get::<usize, f64>(2)?,
                    row.get::<usize, SqlValue>(3)?,
                    row.get::<usize, i64>(4)?,
                    row.get::<usize, i64>(5)?,
                    row.get::<usize, f64>(6)?,
                ))
            })
            .context("failed to execute aggregation query")?;

        let mut campaigns = Vec::new();
        for row in rows {
            let (campaign_id, campaign_name, total_budget, value, impressions, clicks, spend) =
                row.context("failed to decode aggregation row")?;
            let mut metric_field = serde_json::Map::new();
            metric_field.insert(
                metric.key().to_string(),
                serde_json::to_value(MetricValue::from_sql(value))?,
            );
            campaigns.push(AggregatedCampaign {
                campaign_id,
                campaign_name,
                total_budget,
                metric: metric_field,
                total_impressions: impressions,
                total_clicks: clicks,
                total_spend: spend,
                ctr: click_through_rate(clicks, impressions),
            });
        }
        Ok(campaigns)
    })?;

    let total_impressions = campaigns.iter().map(|c| c.total_impressions).sum::<i64>();
    let total_clicks = campaigns.iter().map(|c| c.total_clicks).sum::<i64>();
    let total_spend = campaigns.iter().map(|c| c.total_spend).sum::<f64>();
    let aggregated_metrics = AggregatedMetrics {
        total_campaigns: campaigns.len(),
        total_impressions,
        total_clicks,
        total_spend,
        avg_ctr: click_through_rate(total_clicks, total_impressions),
        time_period: window.key().to_string(),
        date_range: DateRange {
            start: format_utc(bounds.start)?,
            end: format_utc(bounds.end)?,
        },
        message: campaigns
            .is_empty()
            .then(|| NO_DATA_MESSAGE.to_string()),
    };

    Ok(AggregateResponse {
        campaigns,
        aggregated_metrics,
        aggregation_type: request.aggregation_type.clone(),
        sorted_by: metric.key().to_string(),
        requested_metric: request.metric.clone(),
    })
}

fn handle(database: &DatabaseManager, arguments: Value) -> Result<String> {
    let request: AggregateRequest = parse_arguments(TOOL_NAME, arguments)?;
    encode_payload(&aggregate_performance_data(database, &request)?)
}

#[must_use]
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME,
        title: "Aggregate Performance Data",
        description: "Rank campaigns by a summed or averaged metric over a relative time \
                      window and report portfolio totals for the returned campaigns.",
        input_schema: schema_value::<AggregateRequest>,
        output_schema: schema_value::<AggregateResponse>,
        handler: handle,
    }
}
