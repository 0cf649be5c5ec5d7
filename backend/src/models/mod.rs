//! Domain models for the userload batch.
//!
//! - [`RawRow`] - one input row, column name to trimmed string value
//! - [`UserRecord`] - a validated, normalized user ready to write and load

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Column names
// =============================================================================

pub const COL_USER_ID: &str = "user_id";
pub const COL_NAME: &str = "name";
pub const COL_EMAIL: &str = "email";
pub const COL_SIGNUP_DATE: &str = "signup_date";
pub const COL_DOMAIN: &str = "domain";

/// Columns the input file must carry. `domain` is optional and recomputed.
pub const REQUIRED_COLUMNS: [&str; 4] = [COL_USER_ID, COL_NAME, COL_EMAIL, COL_SIGNUP_DATE];

// =============================================================================
// Raw Row
// =============================================================================

/// A row as read from the source file, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file
    pub line: u64,
    pub values: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64, values: HashMap<String, String>) -> Self {
        Self { line, values }
    }

    /// Value of a column, empty string when absent.
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }

    /// Identifier for log lines: the raw user_id if present, else the line.
    pub fn label(&self) -> String {
        match self.get(COL_USER_ID) {
            "" => format!("line {}", self.line),
            id => id.to_string(),
        }
    }
}

// =============================================================================
// User Record
// =============================================================================

/// A validated user.
///
/// `domain` is always the part of `email` after its `@`, case preserved.
/// Field order here is the column order of the processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    /// Serialized as `YYYY-MM-DD`
    pub signup_date: NaiveDate,
    pub domain: String,
}
