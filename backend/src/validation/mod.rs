//! Syntax-only email validation.
//!
//! An address is `local@domain` with exactly one `@`:
//!
//! - local part: 1 to 64 bytes of letters and digits (any script, so
//!   `josé@example.com` is accepted), `! # $ % & ' * + / = ? ^ _ { | } ~ -`
//!   and `.`, with no leading, trailing or doubled dot
//! - domain: at most 253 characters, at least two dot-separated labels;
//!   each label 1 to 63 alphanumerics or hyphens, not starting or ending
//!   with a hyphen; the last label is alphabetic and at least 2 long
//! - whole address: at most 254 characters
//!
//! Nothing here resolves DNS or checks deliverability.
//!
//! # Example
//!
//! ```
//! use userload::validation::{is_valid_email, validate_email};
//! use userload::error::EmailRejection;
//!
//! assert!(is_valid_email("alice@Example.COM"));
//! assert_eq!(validate_email("not-an-email"), Err(EmailRejection::MissingAt));
//! assert_eq!(validate_email("bob@localhost"), Err(EmailRejection::NoDotInDomain));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EmailRejection;

const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;

static LOCAL_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+(?:\.[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+)*$")
        .expect("local part pattern is valid")
});

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .expect("domain label pattern is valid")
});

static TOP_LEVEL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,63}$").expect("top-level label pattern is valid"));

/// Check an address, returning the first rule it breaks.
pub fn validate_email(email: &str) -> Result<(), EmailRejection> {
    if email.is_empty() {
        return Err(EmailRejection::Empty);
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err(EmailRejection::MissingAt),
    };

    if domain.contains('@') {
        return Err(EmailRejection::MultipleAt);
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(EmailRejection::TooLong);
    }

    if local.is_empty() || local.len() > MAX_LOCAL_LEN || !LOCAL_PART.is_match(local) {
        return Err(EmailRejection::InvalidLocalPart);
    }

    if !domain.contains('.') {
        return Err(EmailRejection::NoDotInDomain);
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(EmailRejection::InvalidDomain);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let labels_ok = labels.iter().all(|label| DOMAIN_LABEL.is_match(label));
    let tld_ok = labels
        .last()
        .is_some_and(|tld| TOP_LEVEL_LABEL.is_match(tld));

    if labels_ok && tld_ok {
        Ok(())
    } else {
        Err(EmailRejection::InvalidDomain)
    }
}

/// Quick check: true when [`validate_email`] accepts the address.
pub fn is_valid_email(email: &str) -> bool {
    validate_email(email).is_ok()
}
