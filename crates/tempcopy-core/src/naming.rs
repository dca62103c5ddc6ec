//! Table name validation.
//!
//! Table names are used as catalog keys and appear verbatim in logs and
//! error messages, so they are restricted to plain identifiers: an ASCII
//! letter or underscore followed by up to 62 letters, digits or underscores.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ConfigError, Error};

const TABLE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

fn table_name_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(TABLE_NAME_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(
                    pattern = TABLE_NAME_PATTERN,
                    error = %e,
                    "Invalid table name pattern, rejecting all names"
                );
                None
            }
        })
        .as_ref()
}

/// Check whether `name` is an acceptable table name.
pub fn is_valid_table_name(name: &str) -> bool {
    table_name_regex().is_some_and(|regex| regex.is_match(name))
}

/// Validate a table name, returning a configuration error if it is rejected.
///
/// # Examples
///
/// ```
/// use tempcopy_core::validate_table_name;
///
/// assert!(validate_table_name("PersonUpdate").is_ok());
/// assert!(validate_table_name("people; drop").is_err());
/// ```
pub fn validate_table_name(name: &str) -> crate::Result<()> {
    if is_valid_table_name(name) {
        Ok(())
    } else {
        Err(Error::Config(ConfigError {
            message: format!("invalid table name '{name}'"),
            source: None,
        }))
    }
}
