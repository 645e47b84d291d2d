use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

use super::{DatabaseManager, ensure_sqlite_schema};
use crate::models::{
    AgentConversation, CampaignConfiguration, CampaignLocation, CampaignMetrics, DisplayMaster,
    MetricsDataset,
};
use crate::utils::time::parse_timestamp_to_unix_ms;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetLoadStats {
    pub conversations: usize,
    pub displays: usize,
    pub campaigns: usize,
    pub locations: usize,
    pub metrics: usize,
}

impl DatasetLoadStats {
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.conversations + self.displays + self.campaigns + self.locations + self.metrics
    }
}

fn encode_json<T: Serialize>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to encode `{field}` as JSON"))
}

pub fn insert_conversation(connection: &Connection, conversation: &AgentConversation) -> Result<()> {
    connection
        .execute(
            "INSERT INTO agent_conversations (
                conversation_id, session_id, agent_type, user_query,
                agent_response_json, context_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                conversation.conversation_id,
                conversation.session_id,
                conversation.agent_type,
                conversation.user_query,
                encode_json(&conversation.agent_response, "agent_response")?,
                encode_json(&conversation.context, "context")?,
                conversation.created_at,
            ],
        )
        .with_context(|| {
            format!(
                "failed to insert conversation_id={}",
                conversation.conversation_id
            )
        })?;
    Ok(())
}

pub fn insert_display(connection: &Connection, display: &DisplayMaster) -> Result<()> {
    connection
        .execute(
            "INSERT INTO display_master (
                display_id, display_name, venue_name, venue_type, street_address, city, state,
                zip_code, latitude, longitude, daily_impressions, weekly_impressions,
                price_per_week, primary_image_url, screen_type, screen_size, resolution,
                operating_hours_json, demographics_profile_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21)",
            params![
                display.display_id,
                display.display_name,
                display.venue_name,
                display.venue_type,
                display.street_address,
                display.city,
                display.state,
                display.zip_code,
                display.latitude,
                display.longitude,
                display.daily_impressions,
                display.weekly_impressions,
                display.price_per_week,
                display.primary_image_url,
                display.screen_type,
                display.screen_size,
                display.resolution,
                encode_json(&display.operating_hours, "operating_hours")?,
                encode_json(&display.demographics_profile, "demographics_profile")?,
                display.created_at,
                display.updated_at,
            ],
        )
        .with_context(|| format!("failed to insert display_id={}", display.display_id))?;
    Ok(())
}

pub fn insert_campaign(connection: &Connection, campaign: &CampaignConfiguration) -> Result<()> {
    connection
        .execute(
            "INSERT INTO campaign_configurations (
                campaign_id, conversation_id, campaign_name, config_json, selected_displays_json,
                total_budget, start_date, end_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                campaign.campaign_id,
                campaign.conversation_id,
                campaign.campaign_name,
                encode_json(&campaign.config, "config")?,
                encode_json(&campaign.selected_displays, "selected_displays")?,
                campaign.total_budget,
                campaign.start_date,
                campaign.end_date,
                campaign.status,
                campaign.created_at,
                campaign.updated_at,
            ],
        )
        .with_context(|| format!("failed to insert campaign_id={}", campaign.campaign_id))?;
    Ok(())
}

pub fn insert_location(connection: &Connection, location: &CampaignLocation) -> Result<()> {
    let custom_schedule = location
        .custom_schedule
        .as_ref()
        .map(|schedule| encode_json(schedule, "custom_schedule"))
        .transpose()?;
    connection
        .execute(
            "INSERT INTO campaign_locations (
                id, campaign_id, display_id, is_selected, match_score, budget_allocation,
                custom_schedule_json, impressions_delivered, added_date, removed_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                location.id,
                location.campaign_id,
                location.display_id,
                location.is_selected,
                location.match_score,
                location.budget_allocation,
                custom_schedule,
                location.impressions_delivered,
                location.added_date,
                location.removed_date,
            ],
        )
        .with_context(|| format!("failed to insert campaign location id={}", location.id))?;
    Ok(())
}

/// Appends one metrics row; rows are never updated in place.
pub fn insert_metrics(connection: &Connection, metrics: &CampaignMetrics) -> Result<()> {
    let timestamp_unix_ms = parse_timestamp_to_unix_ms(&metrics.timestamp)
        .with_context(|| format!("invalid timestamp for metric_id={}", metrics.metric_id))?;
    connection
        .execute(
            "INSERT INTO campaign_metrics (
                metric_id, campaign_id, timestamp_unix_ms, impressions, reach, frequency, clicks,
                view_through_rate, attention_score, engagement_rate, cost_per_thousand,
                spend_hourly, pacing_percentage, conversion_count, return_on_ad_spend
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                metrics.metric_id,
                metrics.campaign_id,
                timestamp_unix_ms,
                metrics.impressions,
                metrics.reach,
                metrics.frequency,
                metrics.clicks,
                metrics.view_through_rate,
                metrics.attention_score,
                metrics.engagement_rate,
                metrics.cost_per_thousand,
                metrics.spend_hourly,
                metrics.pacing_percentage,
                metrics.conversion_count,
                metrics.return_on_ad_spend,
            ],
        )
        .with_context(|| format!("failed to insert metric_id={}", metrics.metric_id))?;
    Ok(())
}

/// Inserts every entity of `dataset` in foreign-key order. Callers provide the
/// transaction scope.
pub fn load_dataset(connection: &Connection, dataset: &MetricsDataset) -> Result<DatasetLoadStats> {
    for conversation in &dataset.conversations {
        insert_conversation(connection, conversation)?;
    }
    for display in &dataset.displays {
        insert_display(connection, display)?;
    }
    for campaign in &dataset.campaigns {
        insert_campaign(connection, campaign)?;
    }
    for location in &dataset.locations {
        insert_location(connection, location)?;
    }
    for metrics in &dataset.metrics {
        insert_metrics(connection, metrics)?;
    }

    Ok(DatasetLoadStats {
        conversations: dataset.conversations.len(),
        displays: dataset.displays.len(),
        campaigns: dataset.campaigns.len(),
        locations: dataset.locations.len(),
        metrics: dataset.metrics.len(),
    })
}

pub fn load_dataset_file(manager: &DatabaseManager, path: &Path) -> Result<DatasetLoadStats> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset fixture: {}", path.display()))?;
    let dataset: MetricsDataset = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse dataset fixture JSON: {}", path.display()))?;

    manager.with_writable_session(|tx| {
        ensure_sqlite_schema(tx)?;
        load_dataset(tx, &dataset)
    })
}

/// Persists one agent exchange in its own session, creating tables if needed.
pub fn record_conversation(manager: &DatabaseManager, conversation: &AgentConversation) -> Result<()> {
    manager.with_writable_session(|tx| {
        ensure_sqlite_schema(tx)?;
        insert_conversation(tx, conversation)
    })?;
    tracing::debug!(
        conversation_id = %conversation.conversation_id,
        "recorded agent conversation"
    );
    Ok(())
}
