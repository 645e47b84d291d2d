mod common;

use campaignlens::models::{CampaignLocation, CampaignMetrics, MetricsDataset};
use campaignlens::tools::roi::{NO_CAMPAIGNS_MESSAGE, RoiRequest, calculate_roi_metrics};
use common::{campaign, display, location, metrics, seeded_database};

fn delivery(
    row: CampaignMetrics,
    spend_hourly: f64,
    conversion_count: i64,
    return_on_ad_spend: f64,
) -> CampaignMetrics {
    CampaignMetrics {
        spend_hourly,
        conversion_count,
        return_on_ad_spend,
        ..row
    }
}

fn dataset() -> MetricsDataset {
    MetricsDataset {
        displays: vec![
            display("dsp-1", "Union Station", "Los Angeles"),
            display("dsp-2", "Ferry Building", "San Francisco"),
        ],
        campaigns: vec![
            campaign("cmp-a", "Alpha", 1_024.0),
            campaign("cmp-b", "Beta", 512.0),
            campaign("cmp-c", "Dormant", 300.0),
        ],
        locations: vec![
            location("loc-1", "cmp-a", "dsp-1", 600.0, 1_500),
            CampaignLocation {
                is_selected: false,
                ..location("loc-2", "cmp-a", "dsp-2", 424.0, 548)
            },
        ],
        metrics: vec![
            delivery(metrics("a-1", "cmp-a", "2024-05-01T00:00:00Z", 1_024, 32), 128.0, 8, 3.0),
            delivery(metrics("a-2", "cmp-a", "2024-05-02T00:00:00Z", 1_024, 32), 128.0, 8, 1.0),
            delivery(metrics("b-1", "cmp-b", "2024-05-01T00:00:00Z", 0, 0), 64.0, 0, 0.0),
        ],
        ..MetricsDataset::default()
    }
}

#[test]
fn computes_campaign_roi_figures() {
    let database = seeded_database("roi-figures", &dataset());
    let response =
        calculate_roi_metrics(&database, &RoiRequest::default()).expect("roi should succeed");

    let ids = response
        .roi_analysis
        .iter()
        .map(|campaign| campaign.campaign_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["cmp-a", "cmp-b"], "campaigns without metrics are excluded");

    let alpha = &response.roi_analysis[0];
    assert_eq!(alpha.impressions, 2_048);
    assert_eq!(alpha.conversions, 16);
    assert_eq!(alpha.spend, 256.0);
    assert_eq!(alpha.roas, 2.0);
    assert_eq!(alpha.budget_utilization, 25.0);
    assert_eq!(alpha.cpa, 16.0);
    assert_eq!(alpha.cpm, 125.0);
    assert_eq!(alpha.ctr, 3.125);
    assert_eq!(alpha.conversion_rate, 25.0);
    assert_eq!(alpha.roi_percentage, 100.0);
    assert_eq!(alpha.profitability, "Profitable");
    assert!(alpha.location_performance.is_none());
}

#[test]
fn zero_denominators_yield_zero_ratios() {
    let database = seeded_database("roi-zero", &dataset());
    let response =
        calculate_roi_metrics(&database, &RoiRequest::default()).expect("roi should succeed");

    let beta = &response.roi_analysis[1];
    assert_eq!(beta.impressions, 0);
    assert_eq!(beta.cpm, 0.0);
    assert_eq!(beta.ctr, 0.0);
    assert_eq!(beta.cpa, 0.0);
    assert_eq!(beta.conversion_rate, 0.0);
    assert_eq!(beta.roi_percentage, -100.0);
    assert_eq!(beta.budget_utilization, 12.5);
    assert_eq!(beta.profitability, "Not Profitable");
}

#[test]
fn portfolio_weights_roas_by_spend() {
    let database = seeded_database("roi-portfolio", &dataset());
    let response =
        calculate_roi_metrics(&database, &RoiRequest::default()).expect("roi should succeed");

    let portfolio = &response.portfolio_metrics;
    assert_eq!(portfolio.total_campaigns, 2);
    assert_eq!(portfolio.total_spend, 320.0);
    assert_eq!(portfolio.total_budget, 1_536.0);
    assert_eq!(portfolio.portfolio_roas, 512.0 / 320.0);
    assert!(portfolio.message.is_none());
}

#[test]
fn campaign_filter_restricts_analysis() {
    let database = seeded_database("roi-filter", &dataset());
    let request = RoiRequest {
        campaign_ids: Some(vec!["cmp-b".to_string(), "cmp-c".to_string()]),
        include_location_breakdown: false,
    };
    let response = calculate_roi_metrics(&database, &request).expect("roi should succeed");

    assert_eq!(response.roi_analysis.len(), 1);
    assert_eq!(response.roi_analysis[0].campaign_name, "Beta");
    assert_eq!(response.portfolio_metrics.total_campaigns, 1);
}

#[test]
fn location_breakdown_joins_display_details() {
    let database = seeded_database("roi-locations", &dataset());
    let request = RoiRequest {
        campaign_ids: Some(vec!["cmp-a".to_string()]),
        include_location_breakdown: true,
    };
    let response = calculate_roi_metrics(&database, &request).expect("roi should succeed");

    let locations = response.roi_analysis[0]
        .location_performance
        .as_ref()
        .expect("breakdown should be attached");
    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].display_id, "dsp-1");
    assert_eq!(locations[0].venue_name, "Union Station");
    assert_eq!(locations[0].city, "Los Angeles");
    assert!(locations[0].is_selected);
    assert_eq!(locations[0].impressions_delivered, 1_500);
    assert_eq!(locations[1].city, "San Francisco");
    assert!(!locations[1].is_selected);
    assert_eq!(locations[1].budget_allocation, 424.0);
}

#[test]
fn unknown_campaigns_produce_empty_portfolio() {
    let database = seeded_database("roi-empty", &dataset());
    let request = RoiRequest {
        campaign_ids: Some(vec!["cmp-missing".to_string()]),
        include_location_breakdown: true,
    };
    let response = calculate_roi_metrics(&database, &request).expect("roi should succeed");

    assert!(response.roi_analysis.is_empty());
    assert_eq!(response.portfolio_metrics.total_campaigns, 0);
    assert_eq!(response.portfolio_metrics.total_spend, 0.0);
    assert_eq!(
        response.portfolio_metrics.message.as_deref(),
        Some(NO_CAMPAIGNS_MESSAGE)
    );
}
