#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use campaignlens::models::{
    CampaignConfiguration, CampaignLocation, CampaignMetrics, DisplayMaster, MetricsDataset,
};
use campaignlens::store::{DatabaseManager, ensure_sqlite_schema, load_dataset};

pub fn temp_db_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "campaignlens-{label}-{}-{nanos}.sqlite",
        std::process::id()
    ))
}

pub fn seeded_database(label: &str, dataset: &MetricsDataset) -> DatabaseManager {
    let manager = DatabaseManager::from_path(temp_db_path(label));
    manager
        .with_writable_session(|tx| {
            ensure_sqlite_schema(tx)?;
            load_dataset(tx, dataset)
        })
        .expect("fixture dataset should load");
    manager
}

pub fn campaign(campaign_id: &str, campaign_name: &str, total_budget: f64) -> CampaignConfiguration {
    CampaignConfiguration {
        campaign_id: campaign_id.to_string(),
        conversation_id: None,
        campaign_name: campaign_name.to_string(),
        config: Default::default(),
        selected_displays: Vec::new(),
        total_budget,
        start_date: "2024-05-01".to_string(),
        end_date: "2024-05-31".to_string(),
        status: "active".to_string(),
        created_at: "2024-04-20T09:00:00Z".to_string(),
        updated_at: None,
    }
}

/// Metrics row with only delivery counts set; adjust other gauges with struct
/// update syntax.
pub fn metrics(
    metric_id: &str,
    campaign_id: &str,
    timestamp: &str,
    impressions: i64,
    clicks: i64,
) -> CampaignMetrics {
    CampaignMetrics {
        metric_id: metric_id.to_string(),
        campaign_id: campaign_id.to_string(),
        timestamp: timestamp.to_string(),
        impressions,
        reach: 0,
        frequency: 0.0,
        clicks,
        view_through_rate: 0.0,
        attention_score: 0.0,
        engagement_rate: 0.0,
        cost_per_thousand: 0.0,
        spend_hourly: 0.0,
        pacing_percentage: 0.0,
        conversion_count: 0,
        return_on_ad_spend: 0.0,
    }
}

pub fn display(display_id: &str, venue_name: &str, city: &str) -> DisplayMaster {
    DisplayMaster {
        display_id: display_id.to_string(),
        display_name: format!("{venue_name} Screen"),
        venue_name: venue_name.to_string(),
        venue_type: "transit".to_string(),
        street_address: "1 Main St".to_string(),
        city: city.to_string(),
        state: "CA".to_string(),
        zip_code: "94103".to_string(),
        latitude: None,
        longitude: None,
        daily_impressions: 5_000,
        weekly_impressions: 35_000,
        price_per_week: 1_200.0,
        primary_image_url: None,
        screen_type: Some("digital".to_string()),
        screen_size: None,
        resolution: None,
        operating_hours: Default::default(),
        demographics_profile: Default::default(),
        created_at: "2024-04-01T00:00:00Z".to_string(),
        updated_at: None,
    }
}

pub fn location(
    id: &str,
    campaign_id: &str,
    display_id: &str,
    budget_allocation: f64,
    impressions_delivered: i64,
) -> CampaignLocation {
    CampaignLocation {
        id: id.to_string(),
        campaign_id: campaign_id.to_string(),
        display_id: display_id.to_string(),
        is_selected: true,
        match_score: 87.5,
        budget_allocation,
        custom_schedule: None,
        impressions_delivered,
        added_date: "2024-05-01T00:00:00Z".to_string(),
        removed_date: None,
    }
}
