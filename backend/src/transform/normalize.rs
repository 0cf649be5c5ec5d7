//! Field normalization helpers.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::ValidationError;

/// Input format of `signup_date`: day first, with time of day.
pub const SIGNUP_DATE_INPUT_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Parse `DD.MM.YYYY HH:MM` and keep only the calendar date.
///
/// The time of day is discarded, so the stored value is always `YYYY-MM-DD`.
///
/// ```
/// use userload::transform::normalize_signup_date;
///
/// let date = normalize_signup_date("01.03.2024 23:59").unwrap();
/// assert_eq!(date.to_string(), "2024-03-01");
/// ```
pub fn normalize_signup_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDateTime::parse_from_str(raw.trim(), SIGNUP_DATE_INPUT_FORMAT)
        .map(|dt| dt.date())
        .map_err(|_| ValidationError::InvalidSignupDate {
            value: raw.to_string(),
        })
}

/// Parse a `user_id` as a UUID (any of the textual forms `uuid` accepts).
pub fn parse_user_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidUserId {
        value: raw.to_string(),
    })
}

/// Everything after the first `@`, case preserved.
///
/// Only meaningful for addresses that already passed validation.
pub fn extract_domain(email: &str) -> Option<&str> {
    email
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
