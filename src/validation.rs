//! Parsing and validation of free-form chat arguments.
//!
//! Everything numeric arrives as user-typed text, so these helpers never panic and
//! report problems as [`LedgerError::InvalidArgument`], which the dispatcher turns into
//! a usage hint.

use crate::ledger::LedgerError;

/// Longest chat handle accepted (Telegram allows 5..=32, older handles may be shorter).
pub const MAX_HANDLE_LEN: usize = 32;

/// Parse a signed point delta such as `10`, `+10` or `-3`.
pub fn parse_points(raw: &str) -> Result<i64, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidArgument("points value required".into()));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| LedgerError::InvalidArgument(format!("'{}' is not a whole number", trimmed)))
}

/// Parse a reward cost: a non-negative whole number.
pub fn parse_cost(raw: &str) -> Result<u64, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(LedgerError::InvalidArgument(format!(
            "cost '{}' cannot be negative",
            trimmed
        )));
    }
    trimmed
        .trim_start_matches('+')
        .parse::<u64>()
        .map_err(|_| LedgerError::InvalidArgument(format!("'{}' is not a valid cost", trimmed)))
}

/// Normalize a chat handle typed by a user: trims whitespace and a leading `@`, and
/// checks the characters chat platforms allow in handles.
pub fn normalize_handle(raw: &str) -> Result<String, LedgerError> {
    let handle = raw.trim().trim_start_matches('@');
    if handle.is_empty() {
        return Err(LedgerError::InvalidArgument("username required".into()));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(LedgerError::InvalidArgument(format!(
            "username is too long (maximum {} characters)",
            MAX_HANDLE_LEN
        )));
    }
    if let Some(bad) = handle
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(LedgerError::InvalidArgument(format!(
            "username contains invalid character '{}'",
            bad.escape_default()
        )));
    }
    Ok(handle.to_string())
}
