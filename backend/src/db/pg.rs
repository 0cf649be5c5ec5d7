//! PostgreSQL-backed gateway over the synchronous `postgres` client.

use std::sync::Arc;

use postgres::{Client, NoTls, Transaction};

use crate::config::DatabaseConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::logs::{BatchLog, LogEntry};
use crate::models::UserRecord;

use super::rows::{row_to_json, QueryRow};
use super::{not_connected, UpsertOutcome, UserGateway};

const APPLICATION_NAME: &str = "userload";

pub const CREATE_USERS_TABLE: &str = concat!(
    "CREATE TABLE IF NOT EXISTS users (",
    "user_id UUID PRIMARY KEY, ",
    "name TEXT NOT NULL, ",
    "email TEXT NOT NULL, ",
    "signup_date DATE NOT NULL, ",
    "domain TEXT NOT NULL)"
);

/// Conflict resolution happens in the statement itself; `xmax = 0` only
/// holds for a freshly inserted tuple.
pub const UPSERT_USER: &str = concat!(
    "INSERT INTO users (user_id, name, email, signup_date, domain) ",
    "VALUES ($1, $2, $3, $4, $5) ",
    "ON CONFLICT (user_id) DO UPDATE SET ",
    "name = EXCLUDED.name, ",
    "email = EXCLUDED.email, ",
    "signup_date = EXCLUDED.signup_date, ",
    "domain = EXCLUDED.domain ",
    "RETURNING (xmax = 0) AS inserted"
);

/// Owns at most one live PostgreSQL session.
///
/// Starts disconnected. A failed [`connect`](Self::connect) leaves it
/// disconnected; so does a session the server drops. The session is closed
/// on drop.
pub struct PostgresGateway {
    config: DatabaseConfig,
    client: Option<Client>,
    log: Arc<dyn BatchLog>,
}

impl PostgresGateway {
    pub fn new(config: DatabaseConfig, log: Arc<dyn BatchLog>) -> Self {
        Self {
            config,
            client: None,
            log,
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open a session, replacing any existing one.
    pub fn connect(&mut self) -> GatewayResult<()> {
        if self.client.is_some() {
            self.close();
        }

        let target = self.config.display_target();
        self.log.info("connect", format!("Connecting to {} as {}", target, self.config.user));

        let mut pg = postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.dbname)
            .user(&self.config.user)
            .connect_timeout(self.config.connect_timeout)
            .application_name(APPLICATION_NAME);
        if !self.config.password.is_empty() {
            pg.password(&self.config.password);
        }

        match pg.connect(NoTls) {
            Ok(client) => {
                self.client = Some(client);
                self.log.success("connect", format!("Connected to {}", target));
                Ok(())
            }
            Err(e) => {
                self.client = None;
                let err = GatewayError::connection(describe(&e));
                self.log.error("connect", format!("Cannot connect to {}: {}", target, err));
                Err(err)
            }
        }
    }

    /// Run `body` in a transaction: commit on success, roll back on failure.
    fn in_transaction<T, F>(&mut self, operation: &'static str, statement: &str, body: F) -> GatewayResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> GatewayResult<T>,
    {
        let Some(client) = self.client.as_mut() else {
            return Err(not_connected(operation, self.log.as_ref()));
        };
        let log = self.log.as_ref();

        let result = match client.transaction() {
            Ok(mut tx) => match body(&mut tx) {
                Ok(value) => tx
                    .commit()
                    .map(|()| value)
                    .map_err(|e| GatewayError::query(statement, describe(&e))),
                Err(err) => {
                    match tx.rollback() {
                        Ok(()) => log.info(operation, format!("Rolled back '{}'", statement)),
                        Err(e) => log.warning(operation, format!("Rollback of '{}' failed: {}", statement, describe(&e))),
                    }
                    Err(err)
                }
            },
            Err(e) => Err(GatewayError::query(statement, describe(&e))),
        };

        let lost = client.is_closed();
        if lost {
            self.client = None;
            self.log.error(operation, "Connection lost; gateway is now disconnected".to_string());
        }
        result
    }
}

impl UserGateway for PostgresGateway {
    fn log(&self) -> &dyn BatchLog {
        self.log.as_ref()
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    fn ensure_schema(&mut self) -> GatewayResult<()> {
        let result = self.in_transaction("ensure_schema", "create_users_table", |tx| {
            tx.batch_execute(CREATE_USERS_TABLE)
                .map_err(|e| GatewayError::query("create_users_table", describe(&e)))
        });

        match &result {
            Ok(()) => self.log.success("ensure_schema", "Table 'users' is ready".to_string()),
            Err(err) => self.log.error("ensure_schema", err.to_string()),
        }
        result
    }

    fn upsert(&mut self, record: &UserRecord) -> GatewayResult<UpsertOutcome> {
        let result = self.in_transaction("upsert", "upsert_user", |tx| {
            let row = tx
                .query_one(
                    UPSERT_USER,
                    &[
                        &record.user_id,
                        &record.name,
                        &record.email,
                        &record.signup_date,
                        &record.domain,
                    ],
                )
                .map_err(|e| GatewayError::query("upsert_user", describe(&e)))?;
            let inserted: bool = row
                .try_get("inserted")
                .map_err(|e| GatewayError::query("upsert_user", describe(&e)))?;
            Ok(if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            })
        });

        if let Err(err @ GatewayError::Query { .. }) = &result {
            self.log
                .log(LogEntry::error("upsert", err.to_string()).with_row(record.user_id.to_string()));
        }
        result
    }

    fn execute_query(&mut self, name: &str, sql: &str) -> GatewayResult<Option<Vec<QueryRow>>> {
        self.log.info("query", format!("Running '{}'", name));

        let result = self.in_transaction("query", name, |tx| {
            let statement = tx
                .prepare(sql)
                .map_err(|e| GatewayError::query(name, describe(&e)))?;

            if statement.columns().is_empty() {
                let affected = tx
                    .execute(&statement, &[])
                    .map_err(|e| GatewayError::query(name, describe(&e)))?;
                return Ok((None, affected));
            }

            let rows = tx
                .query(&statement, &[])
                .map_err(|e| GatewayError::query(name, describe(&e)))?;
            let rendered = rows
                .iter()
                .map(|row| row_to_json(row, name))
                .collect::<GatewayResult<Vec<_>>>()?;
            let count = rendered.len() as u64;
            Ok((Some(rendered), count))
        });

        match result {
            Ok((Some(rows), _)) => {
                self.log.success("query", format!("'{}' returned {} rows", name, rows.len()));
                Ok(Some(rows))
            }
            Ok((None, affected)) => {
                self.log.success("query", format!("'{}' affected {} rows", name, affected));
                Ok(None)
            }
            Err(err) => {
                if !matches!(err, GatewayError::NotConnected { .. }) {
                    self.log.error("query", err.to_string());
                }
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        match self.client.take() {
            Some(client) => match client.close() {
                Ok(()) => self.log.info("close", "Database connection closed".to_string()),
                Err(e) => self.log.warning("close", format!("Error while closing connection: {}", describe(&e))),
            },
            None => self.log.info("close", "No open database connection".to_string()),
        }
    }
}

impl Drop for PostgresGateway {
    fn drop(&mut self) {
        if self.client.is_some() {
            self.close();
        }
    }
}

/// Server message for database errors, the full chain otherwise.
fn describe(err: &postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogLevel, MemoryLog};
    use chrono::NaiveDate;
    use std::time::Duration;
    use uuid::Uuid;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout: Duration::from_secs(2),
            ..DatabaseConfig::default()
        }
    }

    fn record() -> UserRecord {
        UserRecord {
            user_id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            signup_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            domain: "example.com".into(),
        }
    }

    #[test]
    fn test_close_without_connect_is_noop() {
        let log = Arc::new(MemoryLog::new());
        let mut gateway = PostgresGateway::new(DatabaseConfig::default(), log.clone());
        gateway.close();
        gateway.close();
        assert!(!gateway.is_connected());
        assert!(log.at_level(LogLevel::Error).is_empty());
    }

    #[test]
    fn test_operations_require_connection() {
        let log = Arc::new(MemoryLog::new());
        let mut gateway = PostgresGateway::new(DatabaseConfig::default(), log.clone());

        assert_eq!(
            gateway.ensure_schema(),
            Err(GatewayError::NotConnected { operation: "ensure_schema" })
        );
        assert_eq!(
            gateway.upsert(&record()),
            Err(GatewayError::NotConnected { operation: "upsert" })
        );
        assert_eq!(
            gateway.execute_query("distinct_domains", "SELECT 1"),
            Err(GatewayError::NotConnected { operation: "query" })
        );
    }

    #[test]
    fn test_insert_all_without_connection_fails_every_record() {
        let log = Arc::new(MemoryLog::new());
        let mut gateway = PostgresGateway::new(DatabaseConfig::default(), log.clone());
        let records = vec![record(), record(), record()];

        let report = gateway.insert_all(&records);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.failed[2].user_id, records[2].user_id.to_string());
    }

    #[test]
    fn test_failed_connect_leaves_gateway_disconnected() {
        let log = Arc::new(MemoryLog::new());
        let mut gateway = PostgresGateway::new(unreachable_config(), log.clone());

        let err = gateway.connect().unwrap_err();
        assert!(matches!(err, GatewayError::Connection { .. }));
        assert!(!gateway.is_connected());
        assert_eq!(log.at_level(LogLevel::Error).len(), 1);

        gateway.close();
    }
}
