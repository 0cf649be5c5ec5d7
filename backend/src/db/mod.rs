//! Persistence Gateway.
//!
//! - [`UserGateway`] - operations the batch needs from a database session
//! - [`PostgresGateway`] - the `postgres`-backed implementation
//! - [`queries`] - the fixed Query Catalog
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use userload::config::DatabaseConfig;
//! use userload::db::{PostgresGateway, UserGateway, queries::DISTINCT_DOMAINS};
//! use userload::logs::TracingLog;
//!
//! let mut gateway = PostgresGateway::new(DatabaseConfig::default(), Arc::new(TracingLog));
//! if gateway.connect().is_ok() {
//!     let rows = gateway.execute_query(DISTINCT_DOMAINS.name, DISTINCT_DOMAINS.sql);
//!     println!("{:?}", rows);
//! }
//! gateway.close();
//! ```

pub mod pg;
pub mod queries;
pub mod rows;

use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};
use crate::logs::BatchLog;
use crate::models::UserRecord;

pub use pg::PostgresGateway;
pub use queries::{CatalogQuery, ALLOWED_DOMAINS, CATALOG};
pub use rows::QueryRow;

/// Whether an upsert created a row or overwrote one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A record the load could not write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpsert {
    pub user_id: String,
    pub error: String,
}

/// Outcome of loading a batch of records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<FailedUpsert>,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        format!(
            "{} inserted, {} updated, {} failed",
            self.inserted,
            self.updated,
            self.failed.len()
        )
    }
}

/// Operations on one live database session.
///
/// Every method other than [`close`](UserGateway::close) fails with
/// [`GatewayError::NotConnected`] when there is no session.
pub trait UserGateway {
    /// Logger the gateway reports through.
    fn log(&self) -> &dyn BatchLog;

    fn is_connected(&self) -> bool;

    /// Create the `users` table if it does not exist.
    fn ensure_schema(&mut self) -> GatewayResult<()>;

    /// Insert the record, or overwrite every non-key column of the row with
    /// the same `user_id`, in one statement.
    fn upsert(&mut self, record: &UserRecord) -> GatewayResult<UpsertOutcome>;

    /// Run a statement inside its own transaction.
    ///
    /// Returns `Some(rows)` for statements that produce a result set (possibly
    /// empty) and `None` for those that do not, such as `DELETE`.
    fn execute_query(&mut self, name: &str, sql: &str) -> GatewayResult<Option<Vec<QueryRow>>>;

    /// Release the session. A no-op when never connected.
    fn close(&mut self);

    /// Upsert every record independently, collecting failures.
    ///
    /// Stops early only when the session is lost, recording the remaining
    /// records as failed.
    fn insert_all(&mut self, records: &[UserRecord]) -> LoadReport {
        let mut report = LoadReport::default();

        for (idx, record) in records.iter().enumerate() {
            match self.upsert(record) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(err @ GatewayError::NotConnected { .. }) => {
                    report.failed.extend(records[idx..].iter().map(|r| FailedUpsert {
                        user_id: r.user_id.to_string(),
                        error: err.to_string(),
                    }));
                    break;
                }
                Err(err) => {
                    report.failed.push(FailedUpsert {
                        user_id: record.user_id.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.failed.is_empty() {
            self.log().success("load", format!("Loaded {} records ({})", records.len(), report.summary()));
        } else {
            self.log().warning("load", format!("Load finished with errors: {}", report.summary()));
        }
        report
    }
}

/// Shorthand used by implementations for a missing session.
pub(crate) fn not_connected(operation: &'static str, log: &dyn BatchLog) -> GatewayError {
    let err = GatewayError::NotConnected { operation };
    log.warning(operation, err.to_string());
    err
}
