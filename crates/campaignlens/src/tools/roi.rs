use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Transaction, params_from_iter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::derive::{
    click_through_rate, conversion_rate, cost_per_acquisition, cost_per_mille, percent, ratio,
    roi_percentage,
};
use super::{ToolDefinition, encode_payload, parse_arguments, schema_value};
use crate::store::DatabaseManager;

pub const TOOL_NAME: &str = "calculate_roi_metrics";
pub const NO_CAMPAIGNS_MESSAGE: &str = "No campaigns found for ROI analysis";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RoiRequest {
    /// Campaigns to analyze; every campaign with metrics when omitted or empty.
    #[serde(default)]
    pub campaign_ids: Option<Vec<String>>,

    /// Attach per-display delivery for each campaign.
    #[serde(default)]
    pub include_location_breakdown: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocationPerformance {
    pub display_id: String,
    pub venue_name: String,
    pub city: String,
    pub is_selected: bool,
    pub budget_allocation: f64,
    pub impressions_delivered: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CampaignRoi {
    pub campaign_id: String,
    pub campaign_name: String,
    pub budget: f64,
    pub spend: f64,
    pub budget_utilization: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub roas: f64,
    pub cpa: f64,
    pub cpm: f64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub roi_percentage: f64,
    pub profitability: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_performance: Option<Vec<LocationPerformance>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PortfolioMetrics {
    pub total_campaigns: usize,
    pub total_budget: f64,
    pub total_spend: f64,
    pub portfolio_roas: f64,
    pub portfolio_roi: f64,
    pub budget_efficiency: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoiResponse {
    pub roi_analysis: Vec<CampaignRoi>,
    pub portfolio_metrics: PortfolioMetrics,
}

const CAMPAIGN_TOTALS_SQL: &str = r#"
SELECT
    c.campaign_id,
    c.campaign_name,
    c.total_budget,
    COALESCE(SUM(m.impressions), 0),
    COALESCE(SUM(m.clicks), 0),
    COALESCE(SUM(m.conversion_count), 0),
    COALESCE(SUM(m.spend_hourly), 0.0),
    COALESCE(AVG(m.return_on_ad_spend), 0.0)
FROM campaign_configurations AS c
JOIN campaign_metrics AS m ON m.campaign_id = c.campaign_id
"#;

const LOCATIONS_SQL: &str = r#"
SELECT
    l.display_id,
    d.venue_name,
    d.city,
    l.is_selected,
    l.budget_allocation,
    l.impressions_delivered
FROM campaign_locations AS l
JOIN display_master AS d ON d.display_id = l.display_id
WHERE l.campaign_id = ?1
ORDER BY l.added_date ASC, l.id ASC
"#;

struct CampaignTotals {
    campaign_id: String,
    campaign_name: String,
    budget: f64,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    spend: f64,
    roas: f64,
}

impl CampaignTotals {
    fn into_roi(self, location_performance: Option<Vec<LocationPerformance>>) -> CampaignRoi {
        let profitability = if self.roas > 1.0 {
            "Profitable"
        } else {
            "Not Profitable"
        };
        CampaignRoi {
            budget_utilization: percent(self.spend, self.budget),
            cpa: cost_per_acquisition(self.spend, self.conversions),
            cpm: cost_per_mille(self.spend, self.impressions),
            ctr: click_through_rate(self.clicks, self.impressions),
            conversion_rate: conversion_rate(self.conversions, self.clicks),
            roi_percentage: roi_percentage(self.roas),
            profitability: profitability.to_string(),
            campaign_id: self.campaign_id,
            campaign_name: self.campaign_name,
            budget: self.budget,
            spend: self.spend,
            impressions: self.impressions,
            clicks: self.clicks,
            conversions: self.conversions,
            roas: self.roas,
            location_performance,
        }
    }
}

pub fn calculate_roi_metrics(
    database: &DatabaseManager,
    request: &RoiRequest,
) -> Result<RoiResponse> {
    let campaign_ids = request
        .campaign_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| SqlValue::Text(id.to_string()))
        .collect::<Vec<_>>();

    let mut sql = CAMPAIGN_TOTALS_SQL.to_string();
    if !campaign_ids.is_empty() {
        let placeholders = (1..=campaign_ids.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!("WHERE c.campaign_id IN ({placeholders})\n"));
    }
    sql.push_str("GROUP BY c.campaign_id, c.campaign_name, c.total_budget\n");
    sql.push_str("ORDER BY c.campaign_id ASC");

    let roi_analysis = database.with_session(|tx| {
        let totals = {
            let mut statement = tx.prepare(&sql).context("failed to prepare ROI query")?;
            let rows = statement
                .query_map(params_from_iter(campaign_ids.iter()), |row| {
                    Ok(CampaignTotals {
                        campaign_id: row.get(0)?,
                        campaign_name: row.get(1)?,
                        budget: row.get(2)?,
                        impressions: row.get(3)?,
                        clicks: row.get(4)?,
                        conversions: row.get(5)?,
                        spend: row.get(6)?,
                        roas: row.get(7)?,
                    })
                })
                .context("failed to execute ROI query")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to decode ROI row")?
        };

        totals
            .into_iter()
            .map(|campaign| {
                let locations = if request.include_location_breakdown {
                    Some(load_locations(tx, &campaign.campaign_id)?)
                } else {
                    None
                };
                Ok(campaign.into_roi(locations))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(RoiResponse {
        portfolio_metrics: portfolio_metrics(&roi_analysis),
        roi_analysis,
    })
}

fn load_locations(tx: &Transaction<'_>, campaign_id: &str) -> Result<Vec<LocationPerformance>> {
    let mut statement = tx
        .prepare(LOCATIONS_SQL)
        .context("failed to prepare location breakdown query")?;
    let rows = statement
        .query_map([campaign_id], |row| {
            Ok(LocationPerformance {
                display_id: row.get(0)?,
                venue_name: row.get(1)?,
                city: row.get(2)?,
                is_selected: row.get::<usize, i64>(3)? != 0,
                budget_allocation: row.get(4)?,
                impressions_delivered: row.get(5)?,
            })
        })
        .with_context(|| format!("failed to load locations for campaign {campaign_id}"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to decode location row")
}

/// Portfolio roll-up; ROAS is weighted by each campaign's spend.
#[must_use]
pub fn portfolio_metrics(campaigns: &[CampaignRoi]) -> PortfolioMetrics {
    let total_spend = campaigns.iter().map(|c| c.spend).sum::<f64>();
    let total_budget = campaigns.iter().map(|c| c.budget).sum::<f64>();
    let weighted_return = campaigns.iter().map(|c| c.roas * c.spend).sum::<f64>();

    if campaigns.is_empty() {
        return PortfolioMetrics {
            total_campaigns: 0,
            total_budget: 0.0,
            total_spend: 0.0,
            portfolio_roas: 0.0,
            portfolio_roi: 0.0,
            budget_efficiency: 0.0,
            message: Some(NO_CAMPAIGNS_MESSAGE.to_string()),
        };
    }

    let portfolio_roas = ratio(weighted_return, total_spend);
    PortfolioMetrics {
        total_campaigns: campaigns.len(),
        total_budget,
        total_spend,
        portfolio_roas,
        portfolio_roi: (portfolio_roas - 1.0) * 100.0,
        budget_efficiency: percent(total_spend, total_budget),
        message: None,
    }
}

fn handle(database: &DatabaseManager, arguments: Value) -> Result<String> {
    let request: RoiRequest = parse_arguments(TOOL_NAME, arguments)?;
    encode_payload(&calculate_roi_metrics(database, &request)?)
}

#[must_use]
pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME,
        title: "Calculate ROI Metrics",
        description: "Calculate ROAS, CPA, ROI and profitability per campaign with a \
                      spend-weighted portfolio roll-up and optional per-location delivery.",
        input_schema: schema_value::<RoiRequest>,
        output_schema: schema_value::<RoiResponse>,
        handler: handle,
    }
}
