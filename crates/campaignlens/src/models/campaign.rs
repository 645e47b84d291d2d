use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CAMPAIGN_STATUS: &str = "draft";
pub const PERFORMANCE_DASHBOARD_AGENT: &str = "performance_dashboard";

fn default_campaign_status() -> String {
    DEFAULT_CAMPAIGN_STATUS.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfiguration {
    pub campaign_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    pub campaign_name: String,

    #[serde(default)]
    pub config: BTreeMap<String, Value>,

    #[serde(default)]
    pub selected_displays: Vec<Value>,

    pub total_budget: f64,
    pub start_date: String,
    pub end_date: String,

    #[serde(default = "default_campaign_status")]
    pub status: String,

    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One sampling interval of delivery gauges for a campaign.
///
/// `timestamp` accepts RFC 3339 or an integer epoch; it is stored as unix
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CampaignMetrics {
    pub metric_id: String,
    pub campaign_id: String,
    pub timestamp: String,

    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub reach: i64,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub view_through_rate: f64,
    #[serde(default)]
    pub attention_score: f64,
    #[serde(default)]
    pub engagement_rate: f64,
    #[serde(default)]
    pub cost_per_thousand: f64,
    #[serde(default)]
    pub spend_hourly: f64,
    #[serde(default)]
    pub pacing_percentage: f64,
    #[serde(default)]
    pub conversion_count: i64,
    #[serde(default)]
    pub return_on_ad_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CampaignLocation {
    pub id: String,
    pub campaign_id: String,
    pub display_id: String,

    #[serde(default = "default_true")]
    pub is_selected: bool,

    pub match_score: f64,
    pub budget_allocation: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_schedule: Option<BTreeMap<String, Value>>,

    #[serde(default)]
    pub impressions_delivered: i64,

    pub added_date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DisplayMaster {
    pub display_id: String,
    pub display_name: String,
    pub venue_name: String,
    pub venue_type: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    pub daily_impressions: i64,
    pub weekly_impressions: i64,
    pub price_per_week: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default)]
    pub operating_hours: BTreeMap<String, Value>,
    #[serde(default)]
    pub demographics_profile: BTreeMap<String, Value>,

    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AgentConversation {
    pub conversation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub agent_type: String,
    pub user_query: String,

    #[serde(default)]
    pub agent_response: BTreeMap<String, Value>,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    pub created_at: String,
}

/// Whole-store fixture, loaded in foreign-key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MetricsDataset {
    #[serde(default)]
    pub conversations: Vec<AgentConversation>,
    #[serde(default)]
    pub displays: Vec<DisplayMaster>,
    #[serde(default)]
    pub campaigns: Vec<CampaignConfiguration>,
    #[serde(default)]
    pub locations: Vec<CampaignLocation>,
    #[serde(default)]
    pub metrics: Vec<CampaignMetrics>,
}

#[must_use]
pub fn dataset_json_schema() -> Value {
    let schema = schemars::schema_for!(MetricsDataset);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated dataset schema: {error}");
        }
    }
}
