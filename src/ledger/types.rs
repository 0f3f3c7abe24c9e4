use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::errors::LedgerError;

pub const USER_SCHEMA_VERSION: u8 = 1;
pub const REWARD_SCHEMA_VERSION: u8 = 1;
pub const HISTORY_SCHEMA_VERSION: u8 = 1;

/// Upper bound for display and reward names; keeps replies and button labels short.
pub const MAX_NAME_LEN: usize = 64;

fn checked_name(field: &str, raw: &str) -> Result<String, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidArgument(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(LedgerError::InvalidArgument(format!(
            "{} contains control characters",
            field
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(LedgerError::InvalidArgument(format!(
            "{} is too long (maximum {} characters)",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// A household member and their current balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub points: u64,
    /// Bumped on every balance write; the store rejects swaps against a stale version.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl User {
    pub fn new(username: &str, display_name: &str) -> Result<Self, LedgerError> {
        let username = checked_name("username", username)?;
        // Chat clients may omit a first name; fall back to the handle.
        let display_name = if display_name.trim().is_empty() {
            username.clone()
        } else {
            checked_name("display name", display_name)?
        };
        let now = Utc::now();
        Ok(Self {
            username,
            display_name,
            points: 0,
            version: 0,
            created_at: now,
            updated_at: now,
            schema_version: USER_SCHEMA_VERSION,
        })
    }

    /// Copy of this record carrying a new balance and the next version.
    pub fn with_points(&self, points: u64) -> Self {
        let mut next = self.clone();
        next.points = points;
        next.version = self.version + 1;
        next.updated_at = Utc::now();
        next
    }
}

/// A catalog entry that can be redeemed for points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    pub key: String,
    pub name: String,
    pub cost: u64,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Reward {
    /// Build a reward with a freshly generated key.
    pub fn new(name: &str, cost: u64) -> Result<Self, LedgerError> {
        let mut key = uuid::Uuid::new_v4().simple().to_string();
        key.truncate(12);
        Self::with_key(&key, name, cost)
    }

    pub fn with_key(key: &str, name: &str, cost: u64) -> Result<Self, LedgerError> {
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LedgerError::InvalidArgument(format!(
                "reward key '{}' must be alphanumeric",
                key
            )));
        }
        Ok(Self {
            key: key.to_string(),
            name: checked_name("reward name", name)?,
            cost,
            created_at: Utc::now(),
            schema_version: REWARD_SCHEMA_VERSION,
        })
    }

    /// Menu label, e.g. `Ice Cream (5p)`.
    pub fn label(&self) -> String {
        format!("{} ({}p)", self.name, self.cost)
    }
}

/// Kind of event recorded in a user's history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HistoryAction {
    Register,
    AddPoints,
    Redeem,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Register => "register",
            HistoryAction::AddPoints => "add_points",
            HistoryAction::Redeem => "redeem",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record. `points` is the balance after the action, not the delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Assigned by the store on append.
    pub id: u64,
    pub username: String,
    pub action: HistoryAction,
    pub points: u64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u8,
}

impl HistoryEntry {
    pub fn new(username: &str, action: HistoryAction, points: u64, description: String) -> Self {
        Self {
            id: 0,
            username: username.to_string(),
            action,
            points,
            description,
            timestamp: Utc::now(),
            schema_version: HISTORY_SCHEMA_VERSION,
        }
    }
}
