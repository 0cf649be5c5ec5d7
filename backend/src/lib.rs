//! # Userload - batch ETL for user records
//!
//! Userload reads user records from a delimited file, keeps the ones with a
//! valid email and signup date, writes them back out normalized, upserts
//! them into a PostgreSQL `users` table and runs a fixed set of reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Parser    │────▶│  Transform  │────▶│ Processed   │
//! │ (any enc.)  │     │ (raw rows)  │     │ (validate)  │     │  CSV File   │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │ upsert
//!                                         ┌──────▼──────┐     ┌─────────────┐
//!                                         │  Gateway    │────▶│   Catalog   │
//!                                         │ (postgres)  │     │  (reports)  │
//!                                         └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use userload::{run_batch, BatchConfig, TracingLog};
//!
//! let config = BatchConfig::from_env().unwrap();
//! let report = run_batch(&config, Arc::new(TracingLog)).unwrap();
//! println!("Wrote {} records", report.records_written);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per component
//! - [`config`] - Environment-backed configuration
//! - [`logs`] - Injectable batch logger
//! - [`models`] - `RawRow` and `UserRecord`
//! - [`parser`] - Record Source
//! - [`validation`] - Email syntax check
//! - [`transform`] - Transform Pipeline
//! - [`sink`] - Sink Writer
//! - [`db`] - Persistence Gateway and Query Catalog
//! - [`batch`] - End-to-end orchestration

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// File stages
pub mod parser;
pub mod sink;
pub mod transform;
pub mod validation;

// Database
pub mod db;

// Orchestration
pub mod batch;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    BatchError, ConfigError, EmailRejection, GatewayError, SinkError, SourceError, ValidationError,
};

// =============================================================================
// Re-exports - Configuration and logging
// =============================================================================

pub use config::{BatchConfig, DatabaseConfig};
pub use logs::{BatchLog, LogEntry, LogLevel, MemoryLog, TracingLog};

// =============================================================================
// Re-exports - Models and file stages
// =============================================================================

pub use models::{RawRow, UserRecord};
pub use parser::{parse_bytes, parse_users, read_user_file, ParseResult};
pub use sink::{read_processed_file, write_user_file, write_users};
pub use transform::{check_record, check_records, transform_row, transform_rows, RejectedRow, TransformResult};
pub use validation::{is_valid_email, validate_email};

// =============================================================================
// Re-exports - Database
// =============================================================================

pub use db::{
    queries::find_query, CatalogQuery, LoadReport, PostgresGateway, QueryRow, UpsertOutcome,
    UserGateway, ALLOWED_DOMAINS, CATALOG,
};

// =============================================================================
// Re-exports - Batch
// =============================================================================

pub use batch::{load_processed, run_batch, BatchReport, DatabaseReport, QueryOutcome};
