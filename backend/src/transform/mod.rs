//! Transform Pipeline.
//!
//! Pure mapping from raw rows to validated [`UserRecord`](crate::models::UserRecord)s:
//! - Normalize: date, user id and domain helpers
//! - Pipeline: per-row validation and filtering

pub mod normalize;
pub mod pipeline;

pub use normalize::{extract_domain, normalize_signup_date, parse_user_id, SIGNUP_DATE_INPUT_FORMAT};
pub use pipeline::*;
