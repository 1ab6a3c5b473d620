//! Wildcard pattern matching for role and resource-kind names
//!
//! Three wildcard forms are supported:
//! 1. Universal wildcard: `"*"` matches any string
//! 2. Prefix wildcard: `"admin:*"` matches `"admin:read"`, `"admin:write"`
//! 3. Suffix wildcard: `"*:viewer"` matches `"document:viewer"`, `"project:viewer"`
//!
//! Anything else containing `*` is rejected by [`validate`] at policy
//! admission. Matching is case-sensitive and the colon is part of the
//! prefix/suffix, so `"administrator"` does not match `"admin:*"`.

use crate::error::{EngineError, Result};

/// Checks if a value matches a wildcard pattern
///
/// # Examples
///
/// ```
/// use verdict::pattern::matches;
///
/// // Exact match
/// assert!(matches("admin", "admin"));
///
/// // Universal wildcard
/// assert!(matches("*", "any_role"));
///
/// // Prefix wildcard
/// assert!(matches("admin:*", "admin:read"));
/// assert!(!matches("admin:*", "administrator"));
///
/// // Suffix wildcard
/// assert!(matches("*:viewer", "document:viewer"));
/// assert!(!matches("*:viewer", "document:editor"));
/// ```
pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    // Prefix wildcard: "prefix:*"
    if let Some(prefix) = pattern.strip_suffix(":*") {
        return value.len() > prefix.len()
            && value.starts_with(prefix)
            && value.as_bytes()[prefix.len()] == b':';
    }

    // Suffix wildcard: "*:suffix"
    if let Some(suffix) = pattern.strip_prefix("*:") {
        return value.len() > suffix.len()
            && value.ends_with(suffix)
            && value.as_bytes()[value.len() - suffix.len() - 1] == b':';
    }

    pattern == value
}

/// Validates a pattern at admission time
///
/// Accepts literals, `"*"`, `"prefix:*"` and `"*:suffix"`. Any other use of
/// `*`, including more than one wildcard in a single pattern, is rejected.
pub fn validate(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(EngineError::InvalidInput(
            "pattern cannot be empty".to_string(),
        ));
    }

    let stars = pattern.matches('*').count();
    if stars == 0 {
        return Ok(());
    }
    if stars > 1 {
        return Err(EngineError::InvalidInput(format!(
            "pattern '{}' contains more than one wildcard",
            pattern
        )));
    }

    let valid = pattern == "*"
        || (pattern.ends_with(":*") && pattern.len() > 2)
        || (pattern.starts_with("*:") && pattern.len() > 2);

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!(
            "pattern '{}' has a wildcard outside the supported forms '*', 'prefix:*', '*:suffix'",
            pattern
        )))
    }
}
