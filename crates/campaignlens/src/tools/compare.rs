use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Transaction};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::derive::{MetricValue, click_through_rate, cost_per_acquisition, cost_per_mille};
use super::{ToolDefinition, encode_payload, invalid_arguments, parse_arguments, schema_value};
use crate::store::DatabaseManager;

pub const TOOL_NAME: &str = "compare_campaigns";

pub const DEFAULT_COMPARISON_METRICS: [&str; 7] = [
    "impressions",
    "clicks",
    "ctr",
    "spend",
    "conversions",
    "cpa",
    "roas",
];

/// Record keys a requested metric may not overwrite.
const IDENTITY_FIELDS: [&str; 5] = [
    "campaign_id",
    "campaign_name",
    "budget",
    "start_date",
    "end_date",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompareRequest {
    /// Campaigns to compare, in display order. Must not be empty.
    pub campaign_ids: Vec<String>,

    /// Metrics to compare: impressions, clicks, reach, spend, conversions, ctr,
    /// cpm, cpa, engagement_rate or roas.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComparedCampaign {
    pub campaign_id: String,
    pub campaign_name: String,
    pub budget: f64,
    pub start_date: String,
    pub end_date: String,

    /// One entry per requested metric.
    #[serde(flatten)]
    pub metrics: BTreeMap<String, MetricValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BestPerformer {
    /// Campaign name, or `null` when no campaign qualifies.
    pub campaign: Option<String>,
    pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompareResponse {
    pub comparison: Vec<ComparedCampaign>,
    pub best_performers: BTreeMap<String, BestPerformer>,
    pub metrics_compared: Vec<String>,
}

const CAMPAIGN_SQL: &str = r#"
SELECT campaign_name, total_budget, start_date, end_date
FROM campaign_configurations
WHERE campaign_id = ?1
"#;

const CAMPAIGN_TOTALS_SQL: &str = r#"
SELECT
    COALESCE(SUM(impressions), 0),
    COALESCE(SUM(clicks), 0),
    COALESCE(SUM(reach), 0),
    COALESCE(SUM(spend_hourly), 0.0),
    COALESCE(SUM(conversion_count), 0),
    COALESCE(AVG(engagement_rate), 0.0),
    COALESCE(AVG(return_on_ad_spend), 0.0)
FROM campaign_metrics
WHERE campaign_id = ?1
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CampaignTotals {
    impressions: i64,
    clicks: i64,
    reach: i64,
    spend: f64,
    conversions: i64,
    engagement_rate: f64,
    roas: f64,
}

impl CampaignTotals {
    fn value(&self, metric: &str) -> MetricValue {
        match metric {
            "impressions" => MetricValue::Integer(self.impressions),
            "clicks" => MetricValue::Integer(self.clicks),
            "reach" => MetricValue::Integer(self.reach),
            "conversions" => MetricValue::Integer(self.conversions),
            "spend" => MetricValue::Real(self.spend),
            "ctr" => MetricValue::Real(click_through_rate(self.clicks, self.impressions)),
            "cpm" => MetricValue::Real(cost_per_mille(self.spend, self.impressions)),
            "cpa" => MetricValue::Real(cost_per_acquisition(self.spend, self.conversions)),
            "engagement_rate" => MetricValue::Real(self.engagement_rate),
            "roas" => MetricValue::Real(self.roas),
            _ => MetricValue::ZERO,
        }
    }
}

/// De-duplicates requested names, preserving order, and drops names that would
/// collide with identity fields.
#[must_use]
pub fn resolve_metric_names(requested: Option<&[String]>) -> Vec<String> {
    let requested = match requested {
        Some(names) if !names.is_empty() => names.to_vec(),
        _ => DEFAULT_COMPARISON_METRICS
            .iter()
            .map(|name| (*name).to_string())
            .collect(),
    };

    let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.trim().to_string();
        if name.is_empty() || IDENTITY_FIELDS.contains(&name.as_str()) {
            continue;
        }
        if !resolved.contains(&name) {
            resolved.push(name);
        }
    }
    resolved
}

pub fn compare_campaigns(
    database: &DatabaseManager,
    request: &CompareRequest,
) -> Result<CompareResponse> {
    if request.campaign_ids.is_empty() {
        return Err(invalid_arguments(
            TOOL_NAME,
            "campaign_ids must name at least one campaign",
        ));
    }

    let metrics_compared = resolve_metric_names(request.metrics.as_deref());

    let comparison = database.with_session(|tx| {
        let mut comparison = Vec::new();
        for campaign_id in &request.campaign_ids {
            let Some(campaign) = compare_one(tx, campaign_id, &metrics_compared)? else {
                tracing::debug!(campaign_id = %campaign_id, "campaign not found; skipping");
                continue;
            };
            comparison.push(campaign);
        }
        Ok(comparison)
    })?;

    let best_performers = if comparison.len() > 1 {
        best_performers(&comparison, &metrics_compared)
    } else {
        BTreeMap::new()
    };

    Ok(CompareResponse {
        comparison,
        best_performers,
        metrics_compared,
    })
}

fn compare_one(
    tx: &Transaction<'_>,
    campaign_id: &str,
    metrics: &[String],
) -> Result<Option<ComparedCampaign>> {
    let campaign = tx
        .query_row(CAMPAIGN_SQL, [campaign_id], |row| {
            Ok((
                row.get::<usize, String>(0)?,
                row.get::<usize, f64>(1)?,
                row.get::<usize, String>(2)?,
                row.get::<usize, String>(3)?,
            ))
        })
        .optional()
        .with_context(|| format!("failed to look up campaign {campaign_id}"))?;
    let Some((campaign_name, budget, start_date, end_date)) = campaign else {
        return Ok(None);
    };

    let totals = tx
        .query_row(CAMPAIGN_TOTALS_SQL, [campaign_id], |row| {
            Ok(CampaignTotals {
                impressions: row.get(0)?,
                clicks: row.get(1)?,
                reach: row.get(2)?,
                spend: row.get(3)?,
                conversions: row.get(4)?,
                engagement_rate: row.get(5)?,
                roas: row.get(6)?,
            })
        })
        .with_context(|| format!("failed to aggregate metrics for campaign {campaign_id}"))?;

    Ok(Some(ComparedCampaign {
        campaign_id: campaign_id.to_string(),
        campaign_name,
        budget,
        start_date,
        end_date,
        metrics: metrics
            .iter()
            .map(|metric| (metric.clone(), totals.value(metric)))
            .collect(),
    }))
}

/// Best campaign per metric. `cpa` wins on the smallest positive value, every
/// other metric on the largest; ties keep the earlier campaign.
#[must_use]
pub fn best_performers(
    comparison: &[ComparedCampaign],
    metrics: &[String],
) -> BTreeMap<String, BestPerformer> {
    metrics
        .iter()
        .map(|metric| {
            let values = comparison.iter().map(|campaign| {
                let value = campaign
                    .metrics
                    .get(metric)
                    .copied()
                    .unwrap_or_default();
                (campaign, value)
            });

            let best = pick_best(values, metric == "cpa");

            let performer = match best {
                Some((campaign, value)) => BestPerformer {
                    campaign: Some(campaign.campaign_name.clone()),
                    value,
                },
                None => BestPerformer {
                    campaign: None,
                    value: MetricValue::ZERO,
                },
            };
            (metric.clone(), performer)
        })
        .collect()
}

fn pick_best<'a>(
    values: impl Iterator<Item = (&'a ComparedCampaign, MetricValue)>,
    lower_is_better: bool,
) -> Option<(&'a ComparedCampaign, MetricValue)> {
    let mut best: Option<(&'a ComparedCampaign, MetricValue)> = None;
    for (campaign, value) in values {
        let candidate = value.as_f64();
        if lower_is_better && candidate <= 0.0 {
            continue;
        }
        let improves = match best {
            None => true,
            Some((_, current)) if lower_is_better => candidate < current.as_f64(),
            Some((_, current)) => candidate > current.as_f64(),
        };
        if improves {
            best = Some((campaign, value));
        }
    }
    best
}

fn handle(database: &DatabaseManager, arguments: Value) -> Result<String> {
    let request: CompareRequest = parse_arguments(TOOL_NAME, arguments)?;
    encode_payload(&compare_campaigns(database, &request)?)
}

#[must_use]
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME,
        title: "Compare Campaigns",
        description: "Compare lifetime metrics side by side for several campaigns and name \
                      the best performer per metric.",
        input_schema: schema_value::<CompareRequest>,
        output_schema: schema_value::<CompareResponse>,
        handler: handle,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        CampaignTotals, ComparedCampaign, DEFAULT_COMPARISON_METRICS, best_performers,
        resolve_metric_names,
    };
    use crate::tools::derive::MetricValue;

    fn compared(name: &str, values: &[(&str, MetricValue)]) -> ComparedCampaign {
        ComparedCampaign {
            campaign_id: name.to_lowercase(),
            campaign_name: name.to_string(),
            budget: 1_000.0,
            start_date: "2024-01-01".to_string(),
            end_date: "2024-01-31".to_string(),
            metrics: values
                .iter()
                .map(|(metric, value)| ((*metric).to_string(), *value))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn metric_names_default_dedupe_and_skip_identity_fields() {
        assert_eq!(resolve_metric_names(None), DEFAULT_COMPARISON_METRICS.to_vec());
        let empty: Vec<String> = Vec::new();
        assert_eq!(
            resolve_metric_names(Some(empty.as_slice())),
            DEFAULT_COMPARISON_METRICS.to_vec()
        );

        let requested = ["clicks", "budget", "clicks", "campaign_name", "roas"]
            .map(str::to_string)
            .to_vec();
        assert_eq!(resolve_metric_names(Some(requested.as_slice())), vec!["clicks", "roas"]);
    }

    #[test]
    fn unknown_metrics_default_to_zero() {
        let totals = CampaignTotals {
            impressions: 400,
            clicks: 8,
            ..CampaignTotals::default()
        };
        assert_eq!(totals.value("frequency"), MetricValue::ZERO);
        assert_eq!(totals.value("impressions"), MetricValue::Integer(400));
        assert_eq!(totals.value("ctr"), MetricValue::Real(2.0));
        assert_eq!(totals.value("cpa"), MetricValue::Real(0.0));
    }

    #[test]
    fn cpa_prefers_lowest_positive_value() {
        let comparison = vec![
            compared(
                "Alpha",
                &[("cpa", MetricValue::Real(0.0)), ("clicks", MetricValue::Integer(10))],
            ),
            compared(
                "Beta",
                &[("cpa", MetricValue::Real(12.5)), ("clicks", MetricValue::Integer(30))],
            ),
            compared(
                "Gamma",
                &[("cpa", MetricValue::Real(4.0)), ("clicks", MetricValue::Integer(30))],
            ),
        ];
        let metrics = vec!["cpa".to_string(), "clicks".to_string()];
        let best = best_performers(&comparison, &metrics);

        assert_eq!(best["cpa"].campaign.as_deref(), Some("Gamma"));
        assert_eq!(best["cpa"].value, MetricValue::Real(4.0));
        assert_eq!(best["clicks"].campaign.as_deref(), Some("Beta"), "ties keep the first");
        assert_eq!(best["clicks"].value, MetricValue::Integer(30));
    }

    #[test]
    fn cpa_without_positive_values_has_no_winner() {
        let comparison = vec![
            compared("Alpha", &[("cpa", MetricValue::Real(0.0))]),
            compared("Beta", &[("cpa", MetricValue::Real(0.0))]),
        ];
        let best = best_performers(&comparison, &["cpa".to_string()]);
        assert_eq!(best["cpa"].campaign, None);
        assert_eq!(best["cpa"].value, MetricValue::ZERO);
    }
}
