//! End-to-end batch: read → transform → write → load → report.
//!
//! File stages are fatal: a batch that cannot read its input or write its
//! output stops with a [`BatchError`](crate::error::BatchError). Database
//! stages never abort the batch. A failed connection skips them, and each
//! catalog query succeeds or fails on its own.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{BatchConfig, DatabaseConfig};
use crate::db::{LoadReport, PostgresGateway, QueryRow, UserGateway, CATALOG};
use crate::error::{BatchResult, SinkError};
use crate::logs::BatchLog;
use crate::models::UserRecord;
use crate::parser::read_user_file;
use crate::sink::{read_processed_file, write_user_file};
use crate::transform::{log_transform_result, transform_rows, TransformResult};

/// Outcome of one catalog statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub name: &'static str,
    /// Result rows; `None` for statements without a result set or on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<QueryRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened on the database side
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseReport {
    pub connected: bool,
    /// Why the session could not be opened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
    pub schema_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
    pub queries: Vec<QueryOutcome>,
}

/// Summary of a full batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub rows_read: usize,
    pub records_written: usize,
    pub rows_dropped: usize,
    /// Dropped rows per reason code
    pub drop_reasons: BTreeMap<&'static str, usize>,
    pub database: DatabaseReport,
}

/// Read, transform and write. Returns the transform result for loading.
pub fn run_file_stages(config: &BatchConfig, log: &dyn BatchLog) -> BatchResult<(usize, TransformResult)> {
    let parsed = read_user_file(&config.input_path, config.delimiter, log)?;

    log.info("transform", format!("Transforming {} rows", parsed.rows.len()));
    let transformed = transform_rows(&parsed.rows);
    log_transform_result(&transformed, log);

    write_user_file(&config.output_path, &transformed.records, config.delimiter, log)?;

    Ok((parsed.rows.len(), transformed))
}

/// Run every catalog statement in order, independently of each other.
pub fn run_catalog<G: UserGateway + ?Sized>(gateway: &mut G) -> Vec<QueryOutcome> {
    CATALOG
        .iter()
        .map(|query| match gateway.execute_query(query.name, query.sql) {
            Ok(rows) => QueryOutcome {
                name: query.name,
                rows,
                error: None,
            },
            Err(err) => QueryOutcome {
                name: query.name,
                rows: None,
                error: Some(err.to_string()),
            },
        })
        .collect()
}

/// Ensure the schema, load `records`, then run the catalog.
///
/// The load is skipped when the schema cannot be created; the catalog is
/// still attempted.
pub fn run_database_stages<G: UserGateway + ?Sized>(gateway: &mut G, records: &[UserRecord]) -> DatabaseReport {
    let mut report = DatabaseReport {
        connected: gateway.is_connected(),
        ..DatabaseReport::default()
    };

    if !report.connected {
        gateway
            .log()
            .warning("load", "No database session; skipping load and reports".to_string());
        return report;
    }

    report.schema_ready = gateway.ensure_schema().is_ok();
    if report.schema_ready {
        gateway
            .log()
            .info("load", format!("Upserting {} records into 'users'", records.len()));
        report.load = Some(gateway.insert_all(records));
    } else {
        gateway
            .log()
            .warning("load", "Schema unavailable; load skipped".to_string());
    }

    report.queries = run_catalog(gateway);

    let failed = report.queries.iter().filter(|q| !q.succeeded()).count();
    if failed == 0 {
        gateway
            .log()
            .success("report", format!("All {} catalog queries succeeded", report.queries.len()));
    } else {
        gateway
            .log()
            .warning("report", format!("{} of {} catalog queries failed", failed, report.queries.len()));
    }

    report
}

/// Connect, run the database stages, and always close the session.
fn with_database(
    database: &DatabaseConfig,
    records: &[UserRecord],
    log: Arc<dyn BatchLog>,
) -> DatabaseReport {
    let mut gateway = PostgresGateway::new(database.clone(), log);

    let connection_error = gateway.connect().err().map(|err| err.to_string());
    let mut report = run_database_stages(&mut gateway, records);
    report.connection_error = connection_error;

    gateway.close();
    report
}

/// Run the whole batch.
pub fn run_batch(config: &BatchConfig, log: Arc<dyn BatchLog>) -> BatchResult<BatchReport> {
    log.info("batch", "Starting batch".to_string());

    let (rows_read, transformed) = run_file_stages(config, log.as_ref())?;
    let database = with_database(&config.database, &transformed.records, Arc::clone(&log));

    let report = BatchReport {
        rows_read,
        records_written: transformed.records.len(),
        rows_dropped: transformed.dropped(),
        drop_reasons: transformed.rejection_counts(),
        database,
    };

    log.success(
        "batch",
        format!(
            "Batch finished: {} read, {} written, {} dropped",
            report.rows_read, report.records_written, report.rows_dropped
        ),
    );
    Ok(report)
}

/// Load an already processed file (as written by the sink) into the database.
pub fn load_processed(
    path: &Path,
    config: &BatchConfig,
    log: Arc<dyn BatchLog>,
) -> BatchResult<DatabaseReport> {
    log.info("read", format!("Reading processed file {}", path.display()));
    let checked = read_processed_file(path, config.delimiter).map_err(|err: SinkError| {
        log.error("read", err.to_string());
        err
    })?;
    log.success("read", format!("Read {} processed records", checked.records.len() + checked.dropped()));
    log_transform_result(&checked, log.as_ref());

    Ok(with_database(&config.database, &checked.records, log))
}
