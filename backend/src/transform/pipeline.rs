//! Row-level transform: raw rows in, validated users out.
//!
//! Each row goes through the same checks:
//! 1. `user_id` parses as a UUID
//! 2. `name` is present
//! 3. `signup_date` normalizes to a calendar date
//! 4. `email` passes the syntax check
//! 5. `domain` is derived from the validated email
//!
//! Steps 3 and 4 are independent; step 5 never runs for a rejected email.
//! A row failing any step is dropped and recorded in
//! [`TransformResult::rejected`]. Unparseable dates drop the row rather
//! than storing a placeholder, because the `users` table has no room for one.
//! Identifiers that are not UUIDs, such as `id1`, are dropped as
//! `invalid_user_id` since `user_id` is the table's UUID primary key.
//!
//! Records read back from a processed file are checked again with
//! [`check_record`] before they reach the database.
//!
//! # Example
//!
//! ```
//! use userload::parser::parse_users;
//! use userload::transform::transform_rows;
//!
//! let csv = "user_id;name;email;signup_date\n\
//!            6f1c2a1e-93b7-4a4c-9d1f-2b8e5c7a0d11;Alice;alice@Example.COM;01.03.2024 10:00\n\
//!            0b9e8d7c-6a5f-4e3d-8c2b-1a0f9e8d7c6b;Mallory;not-an-email;01.03.2024 10:00";
//! let result = transform_rows(&parse_users(csv, b';').unwrap());
//!
//! assert_eq!(result.records.len(), 1);
//! assert_eq!(result.records[0].domain, "Example.COM");
//! assert_eq!(result.rejected.len(), 1);
//! ```

use std::collections::BTreeMap;

use crate::error::{EmailRejection, ValidationError};
use crate::logs::{BatchLog, LogEntry};
use crate::models::{RawRow, UserRecord, COL_EMAIL, COL_NAME, COL_SIGNUP_DATE, COL_USER_ID};
use crate::validation::validate_email;

use super::normalize::{extract_domain, normalize_signup_date, parse_user_id};

/// A row that was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Source line
    pub line: u64,
    /// Raw user_id, if the row had one
    pub user_id: Option<String>,
    pub error: ValidationError,
}

impl RejectedRow {
    /// Identifier used in log lines.
    pub fn label(&self) -> String {
        match &self.user_id {
            Some(id) => format!("{} (line {})", id, self.line),
            None => format!("line {}", self.line),
        }
    }
}

/// Result of transforming a batch of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    /// Retained records, in input order
    pub records: Vec<UserRecord>,
    /// Dropped rows, in input order
    pub rejected: Vec<RejectedRow>,
}

impl TransformResult {
    /// Number of rows dropped by filtering.
    pub fn dropped(&self) -> usize {
        self.rejected.len()
    }

    /// Dropped rows counted per reason code.
    pub fn rejection_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for rejected in &self.rejected {
            *counts.entry(rejected.error.code()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        format!(
            "Kept {} records, dropped {}",
            self.records.len(),
            self.rejected.len()
        )
    }
}

/// Validate and normalize one row.
pub fn transform_row(row: &RawRow) -> Result<UserRecord, ValidationError> {
    let user_id = parse_user_id(row.get(COL_USER_ID))?;

    let name = row.get(COL_NAME);
    if name.is_empty() {
        return Err(ValidationError::MissingField(COL_NAME));
    }

    let signup_date = normalize_signup_date(row.get(COL_SIGNUP_DATE))?;

    let email = row.get(COL_EMAIL);
    validate_email(email).map_err(|reason| ValidationError::InvalidEmail {
        email: email.to_string(),
        reason,
    })?;

    let domain = extract_domain(email).ok_or_else(|| ValidationError::InvalidEmail {
        email: email.to_string(),
        reason: EmailRejection::MissingAt,
    })?;

    Ok(UserRecord {
        user_id,
        name: name.to_string(),
        email: email.to_string(),
        signup_date,
        domain: domain.to_string(),
    })
}

/// Re-check a record that did not come through [`transform_row`].
///
/// Enforces the same rules on the stored fields: a non-empty name, a valid
/// email and a `domain` equal to the part of the email after the `@`.
pub fn check_record(record: &UserRecord) -> Result<(), ValidationError> {
    if record.name.is_empty() {
        return Err(ValidationError::MissingField(COL_NAME));
    }

    validate_email(&record.email).map_err(|reason| ValidationError::InvalidEmail {
        email: record.email.clone(),
        reason,
    })?;

    if extract_domain(&record.email) != Some(record.domain.as_str()) {
        return Err(ValidationError::DomainMismatch {
            email: record.email.clone(),
            domain: record.domain.clone(),
        });
    }

    Ok(())
}

/// Keep the records that pass [`check_record`]; each comes with its source line.
pub fn check_records<I>(records: I) -> TransformResult
where
    I: IntoIterator<Item = (u64, UserRecord)>,
{
    let mut result = TransformResult::default();

    for (line, record) in records {
        match check_record(&record) {
            Ok(()) => result.records.push(record),
            Err(error) => result.rejected.push(RejectedRow {
                line,
                user_id: Some(record.user_id.to_string()),
                error,
            }),
        }
    }

    result
}

/// Transform every row, keeping input order.
pub fn transform_rows(rows: &[RawRow]) -> TransformResult {
    let mut result = TransformResult::default();

    for row in rows {
        match transform_row(row) {
            Ok(record) => result.records.push(record),
            Err(error) => result.rejected.push(RejectedRow {
                line: row.line,
                user_id: Some(row.get(COL_USER_ID))
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
                error,
            }),
        }
    }

    result
}

/// Log one warning per dropped row, then a summary.
pub fn log_transform_result(result: &TransformResult, log: &dyn BatchLog) {
    for rejected in &result.rejected {
        log.log(LogEntry::warning("transform", format!("Dropped row: {}", rejected.error)).with_row(rejected.label()));
    }

    if result.rejected.is_empty() {
        log.success("transform", format!("All {} rows valid", result.records.len()));
        return;
    }

    let breakdown: Vec<String> = result
        .rejection_counts()
        .iter()
        .map(|(code, count)| format!("{}: {}", code, count))
        .collect();
    log.warning(
        "transform",
        format!("{} ({})", result.summary(), breakdown.join(", ")),
    );
}
