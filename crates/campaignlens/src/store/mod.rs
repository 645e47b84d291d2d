pub mod writer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, Transaction, params};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::DatabaseConfig;

pub use writer::{
    DatasetLoadStats, insert_campaign, insert_conversation, insert_display, insert_location,
    insert_metrics, load_dataset, load_dataset_file, record_conversation,
};

pub const STORE_SCHEMA_VERSION: &str = "campaignlens.sqlite.v1";
pub const CAMPAIGNS_TABLE: &str = "campaign_configurations";
pub const METRICS_TABLE: &str = "campaign_metrics";
pub const LOCATIONS_TABLE: &str = "campaign_locations";
pub const DISPLAYS_TABLE: &str = "display_master";
pub const CONVERSATIONS_TABLE: &str = "agent_conversations";
pub const SCHEMA_META_TABLE: &str = "campaignlens_schema_meta";

const CREATE_CONVERSATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agent_conversations (
    conversation_id TEXT NOT NULL PRIMARY KEY,
    session_id TEXT,
    agent_type TEXT NOT NULL,
    user_query TEXT NOT NULL,
    agent_response_json TEXT NOT NULL DEFAULT '{}',
    context_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
"#;

const CREATE_CAMPAIGNS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS campaign_configurations (
    campaign_id TEXT NOT NULL PRIMARY KEY,
    conversation_id TEXT,
    campaign_name TEXT NOT NULL,
    config_json TEXT NOT NULL DEFAULT '{}',
    selected_displays_json TEXT NOT NULL DEFAULT '[]',
    total_budget REAL NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    CHECK (length(campaign_name) <= 255),
    CHECK (length(status) <= 50),
    FOREIGN KEY(conversation_id) REFERENCES agent_conversations(conversation_id)
);
"#;

const CREATE_METRICS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS campaign_metrics (
    metric_id TEXT NOT NULL PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    timestamp_unix_ms INTEGER NOT NULL,
    impressions INTEGER NOT NULL DEFAULT 0,
    reach INTEGER NOT NULL DEFAULT 0,
    frequency REAL NOT NULL DEFAULT 0.0,
    clicks INTEGER NOT NULL DEFAULT 0,
    view_through_rate REAL NOT NULL DEFAULT 0.0,
    attention_score REAL NOT NULL DEFAULT 0.0,
    engagement_rate REAL NOT NULL DEFAULT 0.0,
    cost_per_thousand REAL NOT NULL DEFAULT 0.0,
    spend_hourly REAL NOT NULL DEFAULT 0.0,
    pacing_percentage REAL NOT NULL DEFAULT 0.0,
    conversion_count INTEGER NOT NULL DEFAULT 0,
    return_on_ad_spend REAL NOT NULL DEFAULT 0.0,
    CHECK (timestamp_unix_ms >= 0),
    FOREIGN KEY(campaign_id) REFERENCES campaign_configurations(campaign_id)
);
"#;

const CREATE_INDEX_METRICS_CAMPAIGN_TIME_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_campaign_metrics_campaign_time
ON campaign_metrics (campaign_id, timestamp_unix_ms);
"#;

const CREATE_INDEX_METRICS_TIME_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_campaign_metrics_time
ON campaign_metrics (timestamp_unix_ms);
"#;

const CREATE_DISPLAYS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS display_master (
    display_id TEXT NOT NULL PRIMARY KEY,
    display_name TEXT NOT NULL,
    venue_name TEXT NOT NULL,
    venue_type TEXT NOT NULL,
    street_address TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    zip_code TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    daily_impressions INTEGER NOT NULL,
    weekly_impressions INTEGER NOT NULL,
    price_per_week REAL NOT NULL,
    primary_image_url TEXT,
    screen_type TEXT,
    screen_size TEXT,
    resolution TEXT,
    operating_hours_json TEXT NOT NULL DEFAULT '{}',
    demographics_profile_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    CHECK (length(display_id) <= 50)
);
"#;

const CREATE_LOCATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS campaign_locations (
    id TEXT NOT NULL PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    display_id TEXT NOT NULL,
    is_selected INTEGER NOT NULL DEFAULT 1,
    match_score REAL NOT NULL,
    budget_allocation REAL NOT NULL,
    custom_schedule_json TEXT,
    impressions_delivered INTEGER NOT NULL DEFAULT 0,
    added_date TEXT NOT NULL,
    removed_date TEXT,
    CHECK (is_selected IN (0, 1)),
    CHECK (match_score >= 0 AND match_score <= 100),
    FOREIGN KEY(campaign_id) REFERENCES campaign_configurations(campaign_id),
    FOREIGN KEY(display_id) REFERENCES display_master(display_id)
);
"#;

const CREATE_INDEX_LOCATIONS_CAMPAIGN_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_campaign_locations_campaign
ON campaign_locations (campaign_id, display_id);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS campaignlens_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_CONVERSATIONS_TABLE_SQL,
        CREATE_CAMPAIGNS_TABLE_SQL,
        CREATE_METRICS_TABLE_SQL,
        CREATE_INDEX_METRICS_CAMPAIGN_TIME_SQL,
        CREATE_INDEX_METRICS_TIME_SQL,
        CREATE_DISPLAYS_TABLE_SQL,
        CREATE_LOCATIONS_TABLE_SQL,
        CREATE_INDEX_LOCATIONS_CAMPAIGN_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

pub fn open_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    let connection = Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))?;
    enable_foreign_keys(&connection)?;
    Ok(connection)
}

/// Opens a store that must already exist; never creates files or directories.
pub fn open_existing_sqlite_connection(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| {
        format!(
            "sqlite database not found or unreadable: {} (run `campaignlens db init`)",
            path.display()
        )
    })?;
    enable_foreign_keys(&connection)?;
    Ok(connection)
}

fn enable_foreign_keys(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .context("failed to enable sqlite foreign keys")
}

pub fn ensure_sqlite_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create sqlite schema")?;

    if schema_meta_has_version(connection, STORE_SCHEMA_VERSION)? {
        return Ok(());
    }

    let applied_at_utc = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format sqlite schema applied timestamp")?;
    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![STORE_SCHEMA_VERSION, applied_at_utc],
        )
        .context("failed to write sqlite schema meta row")?;

    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .context("failed to query sqlite schema version metadata")?;
    Ok(exists != 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Existing,
    Create,
}

/// Owns the store location and hands out one transactional session per call.
///
/// Every session opens its own connection; nothing is pooled or shared
/// between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseManager {
    database_path: PathBuf,
}

impl DatabaseManager {
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        Self::from_path(config.database_path.clone())
    }

    #[must_use]
    pub fn from_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Runs `body` inside one transaction: commit on `Ok`, rollback on `Err`.
    /// The connection is released on every exit path when it drops.
    ///
    /// The store must already exist; a missing file is an error and is not created.
    pub fn with_session<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.session(OpenMode::Existing, body)
    }

    /// Like [`Self::with_session`], but creates the database file and its parent
    /// directories when missing.
    pub fn with_writable_session<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.session(OpenMode::Create, body)
    }

    fn session<T, F>(&self, mode: OpenMode, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let opened = match mode {
            OpenMode::Existing => open_existing_sqlite_connection(&self.database_path),
            OpenMode::Create => open_sqlite_connection(&self.database_path),
        };
        let mut connection = opened.inspect_err(|error| {
            tracing::error!(
                database = %self.database_path.display(),
                "database session error: {error:#}"
            );
        })?;
        let tx = connection
            .transaction()
            .context("failed to open sqlite transaction")?;
        tracing::debug!(database = %self.database_path.display(), "session opened");

        match body(&tx) {
            Ok(value) => {
                tx.commit()
                    .context("failed to commit sqlite session transaction")?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback() {
                    tracing::error!("failed to roll back sqlite session: {rollback_error}");
                }
                tracing::error!(
                    database = %self.database_path.display(),
                    "database session error: {error:#}"
                );
                Err(error)
            }
        }
    }

    pub fn create_tables(&self) -> Result<()> {
        self.with_writable_session(|tx| ensure_sqlite_schema(tx))?;
        tracing::info!(database = %self.database_path.display(), "database tables ready");
        Ok(())
    }

    /// Runs `SELECT 1`; failures are logged and reported as `false`.
    #[must_use]
    pub fn test_connection(&self) -> bool {
        let outcome = self.with_session(|tx| {
            tx.query_row("SELECT 1", [], |row| row.get::<usize, i64>(0))
                .context("connection probe failed")
        });
        match outcome {
            Ok(_) => {
                tracing::info!(database = %self.database_path.display(), "database connection successful");
                true
            }
            Err(error) => {
                tracing::error!("database connection failed: {error:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DatabaseManager, METRICS_TABLE, ensure_sqlite_schema, open_sqlite_connection};
    use anyhow::anyhow;

    fn temp_db_path(label: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("campaignlens-store-{label}-{nanos}.sqlite"))
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let path = temp_db_path("idempotent");
        let connection = open_sqlite_connection(&path).expect("db should open");
        ensure_sqlite_schema(&connection).expect("first schema pass should succeed");
        ensure_sqlite_schema(&connection).expect("second schema pass should succeed");

        let meta_rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM campaignlens_schema_meta", [], |row| {
                row.get(0)
            })
            .expect("meta count should query");
        assert_eq!(meta_rows, 1);
    }

    #[test]
    fn session_commits_on_success() {
        let manager = DatabaseManager::from_path(temp_db_path("commit"));
        manager.create_tables().expect("tables should be created");

        let count = manager
            .with_session(|tx| {
                tx.query_row(&format!("SELECT COUNT(*) FROM {METRICS_TABLE}"), [], |row| {
                    row.get::<usize, i64>(0)
                })
                .map_err(anyhow::Error::from)
            })
            .expect("session should succeed");
        assert_eq!(count, 0);
    }

    #[test]
    fn session_rolls_back_on_error() {
        let manager = DatabaseManager::from_path(temp_db_path("rollback"));
        manager.create_tables().expect("tables should be created");

        let outcome: anyhow::Result<()> = manager.with_session(|tx| {
            tx.execute(
                "INSERT INTO agent_conversations (conversation_id, agent_type, user_query, created_at)
                 VALUES ('conv-1', 'performance_dashboard', 'top campaigns', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Err(anyhow!("body failed after write"))
        });
        assert!(outcome.is_err());

        let remaining = manager
            .with_session(|tx| {
                tx.query_row("SELECT COUNT(*) FROM agent_conversations", [], |row| {
                    row.get::<usize, i64>(0)
                })
                .map_err(anyhow::Error::from)
            })
            .expect("count should query");
        assert_eq!(remaining, 0, "rolled back write must not persist");
    }

    #[test]
    fn connection_probe_reports_health() {
        let manager = DatabaseManager::from_path(temp_db_path("probe"));
        manager.create_tables().expect("tables should be created");
        assert!(manager.test_connection());

        let blocked = std::env::temp_dir().join(format!(
            "campaignlens-not-a-dir-{}",
            std::process::id()
        ));
        std::fs::write(&blocked, b"file").expect("blocker file should write");
        let unreachable = DatabaseManager::from_path(blocked.join("nested.sqlite"));
        assert!(!unreachable.test_connection());
    }

    #[test]
    fn read_sessions_do_not_create_missing_stores() {
        let missing_dir = temp_db_path("missing-dir");
        let path = missing_dir.join("campaigns.sqlite");
        let manager = DatabaseManager::from_path(&path);

        let error = manager
            .with_session(|tx| {
                tx.query_row("SELECT 1", [], |row| row.get::<usize, i64>(0))
                    .map_err(anyhow::Error::from)
            })
            .expect_err("missing store must fail");
        assert!(format!("{error:#}").contains("db init"));
        assert!(!manager.test_connection());
        assert!(!path.exists(), "read session must not create the database file");
        assert!(!missing_dir.exists(), "read session must not create parent directories");

        manager.create_tables().expect("init should create the store");
        assert!(path.exists());
        assert!(manager.test_connection());
    }
}
