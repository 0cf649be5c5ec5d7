use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::{json, Map};
use userload::db::queries::{DISTINCT_DOMAINS, PURGE_UNLISTED_DOMAINS, RECENT_SIGNUPS};
use userload::{
    batch::{run_catalog, run_database_stages, run_file_stages},
    read_processed_file, BatchConfig, BatchLog, GatewayError, LogLevel, MemoryLog, QueryRow,
    UpsertOutcome, UserGateway, UserRecord, CATALOG,
};
use uuid::Uuid;

/// In-memory stand-in for the PostgreSQL gateway.
struct MemoryGateway {
    connected: bool,
    users: BTreeMap<Uuid, UserRecord>,
    failing_query: Option<&'static str>,
    log: MemoryLog,
}

impl MemoryGateway {
    fn connected() -> Self {
        Self {
            connected: true,
            users: BTreeMap::new(),
            failing_query: None,
            log: MemoryLog::new(),
        }
    }

    fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    fn require(&self, operation: &'static str) -> Result<(), GatewayError> {
        if self.connected {
            Ok(())
        } else {
            Err(GatewayError::NotConnected { operation })
        }
    }
}

impl UserGateway for MemoryGateway {
    fn log(&self) -> &dyn BatchLog {
        &self.log
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_schema(&mut self) -> Result<(), GatewayError> {
        self.require("ensure_schema")
    }

    fn upsert(&mut self, record: &UserRecord) -> Result<UpsertOutcome, GatewayError> {
        self.require("upsert")?;
        Ok(match self.users.insert(record.user_id, record.clone()) {
            None => UpsertOutcome::Inserted,
            Some(_) => UpsertOutcome::Updated,
        })
    }

    fn execute_query(&mut self, name: &str, _sql: &str) -> Result<Option<Vec<QueryRow>>, GatewayError> {
        self.require("query")?;
        if self.failing_query == Some(name) {
            return Err(GatewayError::query(name, "syntax error"));
        }

        if name == PURGE_UNLISTED_DOMAINS.name {
            return Ok(None);
        }

        if name == DISTINCT_DOMAINS.name {
            let mut domains: Vec<&str> = self.users.values().map(|u| u.domain.as_str()).collect();
            domains.sort_unstable();
            domains.dedup();
            return Ok(Some(
                domains
                    .into_iter()
                    .map(|d| {
                        let mut row = Map::new();
                        row.insert("domain".to_string(), json!(d));
                        row
                    })
                    .collect(),
            ));
        }

        Ok(Some(Vec::new()))
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

fn user(id: u128, name: &str, email: &str) -> UserRecord {
    let (_, domain) = email.split_once('@').unwrap();
    UserRecord {
        user_id: Uuid::from_u128(id),
        name: name.to_string(),
        email: email.to_string(),
        signup_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        domain: domain.to_string(),
    }
}

fn config_for(dir: &Path, input: &str) -> BatchConfig {
    let input_path = dir.join("generated_users.csv");
    std::fs::write(&input_path, input).unwrap();
    BatchConfig {
        input_path,
        output_path: dir.join("processed_users.csv"),
        ..BatchConfig::default()
    }
}

#[test]
fn test_file_round_trip_matches_documented_example() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path(),
        "user_id;name;email;signup_date;domain\n\
         6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11;Alice;alice@Example.COM;01.03.2024 10:00;\n\
         0b9e8d7c-6a5f-4e3d-8c2b-1a0f9e8d7c6b;Mallory;not-an-email;01.03.2024 10:00;\n\
         1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f;Bob;bob@yahoo.com;15.12.2023 23:59;\n",
    );
    let log = MemoryLog::new();

    let (rows_read, result) = run_file_stages(&config, &log).unwrap();
    assert_eq!(rows_read, 3);
    assert_eq!(result.dropped(), 1);

    let written = std::fs::read_to_string(&config.output_path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[1],
        "\"6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11\";\"Alice\";\"alice@Example.COM\";\"2024-03-01\";\"Example.COM\""
    );
    assert!(lines[2].contains("\"2023-12-15\""));
    assert!(!written.contains("not-an-email"));

    let reloaded = read_processed_file(&config.output_path, config.delimiter).unwrap();
    assert_eq!(reloaded.records, result.records);
    assert!(reloaded.rejected.is_empty());
}

#[test]
fn test_output_file_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path(),
        "user_id;name;email;signup_date\n6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11;Alice;alice@gmail.com;01.03.2024 10:00\n",
    );
    std::fs::write(&config.output_path, "stale\ncontent\nthat\nis\nlonger\n").unwrap();

    run_file_stages(&config, &MemoryLog::new()).unwrap();

    let written = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(!written.contains("stale"));
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn test_malformed_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), "user_id;name;email;signup_date\nonly;three;fields\n");
    let log = MemoryLog::new();

    assert!(run_file_stages(&config, &log).is_err());
    assert!(!config.output_path.exists());
    assert_eq!(log.at_level(LogLevel::Error).len(), 1);
}

#[test]
fn test_insert_all_is_idempotent() {
    let mut gateway = MemoryGateway::connected();
    let first = user(1, "Alice", "alice@gmail.com");
    let mut renamed = first.clone();
    renamed.name = "Alice Cooper".to_string();

    let report = gateway.insert_all(&[first.clone(), renamed.clone()]);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert!(report.failed.is_empty());
    assert_eq!(gateway.users.len(), 1);
    assert_eq!(gateway.users[&first.user_id].name, "Alice Cooper");
}

#[test]
fn test_database_stages_skipped_without_session() {
    let mut gateway = MemoryGateway::disconnected();
    let report = run_database_stages(&mut gateway, &[user(1, "Alice", "alice@gmail.com")]);

    assert!(!report.connected);
    assert!(report.load.is_none());
    assert!(report.queries.is_empty());
    assert_eq!(gateway.log.at_level(LogLevel::Warning).len(), 1);
}

#[test]
fn test_database_stages_load_and_report() {
    let mut gateway = MemoryGateway::connected();
    let records = vec![
        user(1, "Alice", "alice@gmail.com"),
        user(2, "Bob", "bob@corp.io"),
        user(3, "Carol", "carol@example.com"),
    ];

    let report = run_database_stages(&mut gateway, &records);

    assert!(report.connected);
    assert!(report.schema_ready);
    assert_eq!(report.load.as_ref().unwrap().inserted, 3);
    assert_eq!(report.queries.len(), CATALOG.len());
    assert!(report.queries.iter().all(|q| q.succeeded()));

    let names: Vec<&str> = report.queries.iter().map(|q| q.name).collect();
    let catalog_names: Vec<&str> = CATALOG.iter().map(|q| q.name).collect();
    assert_eq!(names, catalog_names);

    let purge = report.queries.last().unwrap();
    assert_eq!(purge.name, PURGE_UNLISTED_DOMAINS.name);
    assert!(purge.rows.is_none());
    assert!(purge.error.is_none());

    let reads = &report.queries[..report.queries.len() - 1];
    assert!(reads.iter().all(|q| q.rows.is_some()));
    assert_eq!(gateway.users.len(), 3);
}

#[test]
fn test_failed_query_does_not_stop_catalog() {
    let mut gateway = MemoryGateway::connected();
    gateway.failing_query = Some(RECENT_SIGNUPS.name);
    gateway.upsert(&user(1, "Alice", "alice@gmail.com")).unwrap();

    let outcomes = run_catalog(&mut gateway);

    assert_eq!(outcomes.len(), CATALOG.len());
    let failed: Vec<&str> = outcomes.iter().filter(|q| !q.succeeded()).map(|q| q.name).collect();
    assert_eq!(failed, vec![RECENT_SIGNUPS.name]);

    let domains = outcomes.iter().find(|q| q.name == DISTINCT_DOMAINS.name).unwrap();
    assert_eq!(domains.rows.as_ref().unwrap()[0]["domain"], "gmail.com");
}
