mod common;

use std::collections::BTreeMap;

use campaignlens::models::{AgentConversation, MetricsDataset, dataset_json_schema};
use campaignlens::store::{DatabaseManager, load_dataset_file, record_conversation};
use common::{campaign, display, location, metrics, temp_db_path};
use serde_json::json;

fn count(database: &DatabaseManager, table: &str) -> i64 {
    database
        .with_session(|tx| {
            Ok(tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<usize, i64>(0)
            })?)
        })
        .expect("count should query")
}

fn write_dataset(label: &str, dataset: &MetricsDataset) -> std::path::PathBuf {
    let path = temp_db_path(label).with_extension("json");
    std::fs::write(
        &path,
        serde_json::to_string(dataset).expect("dataset should encode"),
    )
    .expect("fixture should be writable");
    path
}

#[test]
fn loads_fixture_in_foreign_key_order() {
    let dataset = MetricsDataset {
        displays: vec![display("dsp-1", "Union Station", "Los Angeles")],
        campaigns: vec![campaign("cmp-a", "Alpha", 1_000.0)],
        locations: vec![location("loc-1", "cmp-a", "dsp-1", 250.0, 900)],
        metrics: vec![
            metrics("a-1", "cmp-a", "2024-05-01T10:00:00Z", 100, 2),
            metrics("a-2", "cmp-a", "1714644000000", 300, 6),
        ],
        ..MetricsDataset::default()
    };
    let fixture = write_dataset("load-ok", &dataset);
    let database = DatabaseManager::from_path(temp_db_path("load-ok"));

    let stats = load_dataset_file(&database, &fixture).expect("fixture should load");
    assert_eq!(stats.total_rows(), 5);
    assert_eq!(count(&database, "campaign_metrics"), 2);

    let second_timestamp = database
        .with_session(|tx| {
            Ok(tx.query_row(
                "SELECT timestamp_unix_ms FROM campaign_metrics WHERE metric_id = 'a-2'",
                [],
                |row| row.get::<usize, i64>(0),
            )?)
        })
        .expect("timestamp should query");
    assert_eq!(second_timestamp, 1_714_644_000_000);
}

#[test]
fn dangling_references_roll_back_the_whole_load() {
    let dataset = MetricsDataset {
        campaigns: vec![campaign("cmp-a", "Alpha", 1_000.0)],
        metrics: vec![
            metrics("a-1", "cmp-a", "2024-05-01T10:00:00Z", 100, 2),
            metrics("x-1", "cmp-missing", "2024-05-01T10:00:00Z", 100, 2),
        ],
        ..MetricsDataset::default()
    };
    let fixture = write_dataset("load-dangling", &dataset);
    let database = DatabaseManager::from_path(temp_db_path("load-dangling"));
    database.create_tables().expect("tables should be created");

    let error = load_dataset_file(&database, &fixture).expect_err("dangling metric must fail");
    assert!(format!("{error:#}").contains("x-1"));
    assert_eq!(count(&database, "campaign_configurations"), 0);
    assert_eq!(count(&database, "campaign_metrics"), 0);
}

#[test]
fn unknown_fixture_fields_are_rejected() {
    let path = temp_db_path("load-unknown").with_extension("json");
    std::fs::write(&path, json!({ "campaigns": [], "budgets": [] }).to_string())
        .expect("fixture should be writable");
    let database = DatabaseManager::from_path(temp_db_path("load-unknown"));

    let error = load_dataset_file(&database, &path).expect_err("unknown fields must fail");
    assert!(format!("{error:#}").contains("budgets"));
}

#[test]
fn records_agent_conversations() {
    let database = DatabaseManager::from_path(temp_db_path("conversation"));
    let conversation = AgentConversation {
        conversation_id: "conv-1".to_string(),
        session_id: None,
        agent_type: "performance_dashboard".to_string(),
        user_query: "Which campaign has the best ROAS?".to_string(),
        agent_response: BTreeMap::from([("count".to_string(), json!(0))]),
        context: BTreeMap::new(),
        created_at: "2024-05-17T12:00:00Z".to_string(),
    };

    record_conversation(&database, &conversation).expect("conversation should record");
    assert_eq!(count(&database, "agent_conversations"), 1);
    assert!(record_conversation(&database, &conversation).is_err(), "ids are unique");
}

#[test]
fn dataset_schema_describes_every_collection() {
    let schema = dataset_json_schema();
    let properties = schema["properties"]
        .as_object()
        .expect("schema should list properties");
    for collection in ["conversations", "displays", "campaigns", "locations", "metrics"] {
        assert!(properties.contains_key(collection), "missing {collection}");
    }
}

#[test]
fn bundled_demo_fixture_loads() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/demo_dataset.json");
    let database = DatabaseManager::from_path(temp_db_path("demo-fixture"));

    let stats = load_dataset_file(&database, &fixture).expect("demo fixture should load");
    assert_eq!(stats.total_rows(), 12);
    assert_eq!(count(&database, "campaign_locations"), 3);
}
