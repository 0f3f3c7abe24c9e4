//! Balance bookkeeping: registration, point deltas, standings and history replay.
use log::{debug, info};

use crate::ledger::errors::{LedgerError, StoreError};
use crate::ledger::storage::RecordStore;
use crate::ledger::types::{HistoryAction, HistoryEntry, User};
use crate::validation::parse_points;

/// How many times a balance write is retried after losing a compare-and-swap.
const MAX_SWAP_ATTEMPTS: usize = 3;

/// One row of the household standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub points: u64,
}

/// Ledger over a [`RecordStore`]. Every balance change goes through a version-checked
/// swap and is followed by a history append.
pub struct Ledger<S> {
    store: S,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_registered(&self, username: &str) -> Result<bool, LedgerError> {
        Ok(self.store.get_user(username)?.is_some())
    }

    /// Fetch a registered user or fail with `NotRegistered`.
    pub fn user(&self, username: &str) -> Result<User, LedgerError> {
        self.store
            .get_user(username)?
            .ok_or_else(|| LedgerError::NotRegistered(username.to_string()))
    }

    pub fn register(&self, username: &str, display_name: &str) -> Result<User, LedgerError> {
        let user = User::new(username, display_name)?;
        if !self.store.insert_user(&user)? {
            return Err(LedgerError::AlreadyRegistered(user.username));
        }
        self.record(
            &user,
            HistoryAction::Register,
            "Registered to the household".to_string(),
        )?;
        info!("registered {} ({})", user.username, user.display_name);
        Ok(user)
    }

    /// Apply a signed delta. A negative delta may not take the balance below zero.
    pub fn add_points(&self, username: &str, delta: i64) -> Result<User, LedgerError> {
        let (_, updated) = self.update_balance(username, |user| {
            let next = i128::from(user.points) + i128::from(delta);
            if next < 0 {
                return Err(LedgerError::InsufficientPoints {
                    balance: user.points,
                    cost: delta.unsigned_abs(),
                });
            }
            u64::try_from(next).map_err(|_| {
                LedgerError::InvalidArgument(format!("{} points would overflow the balance", delta))
            })
        })?;
        self.record(
            &updated,
            HistoryAction::AddPoints,
            format!("Added {} points", delta),
        )?;
        info!("{} {:+} points -> {}", updated.username, delta, updated.points);
        Ok(updated)
    }

    /// Parse `raw` as a point delta, then apply it. Registration is checked first so an
    /// unregistered caller sees `NotRegistered` regardless of the argument.
    pub fn add_points_text(&self, username: &str, raw: &str) -> Result<(i64, User), LedgerError> {
        self.user(username)?;
        let delta = parse_points(raw)?;
        let user = self.add_points(username, delta)?;
        Ok((delta, user))
    }

    /// Every user with their balance, sorted by display name then username.
    pub fn status(&self) -> Result<Vec<Standing>, LedgerError> {
        let mut users = self.store.list_users()?;
        users.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users
            .into_iter()
            .map(|u| Standing {
                name: u.display_name,
                points: u.points,
            })
            .collect())
    }

    /// History for `username`, most recent first. Unknown users yield an empty list.
    pub fn history(&self, username: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        let mut entries = self.store.history_for(username)?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    /// Read-modify-write of a balance with optimistic concurrency. `compute` sees the
    /// freshest record on every attempt and returns the new balance.
    pub(crate) fn update_balance<F>(
        &self,
        username: &str,
        compute: F,
    ) -> Result<(User, User), LedgerError>
    where
        F: Fn(&User) -> Result<u64, LedgerError>,
    {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let current = self.user(username)?;
            let points = compute(&current)?;
            let next = current.with_points(points);
            if self.store.swap_user(&current, &next)? {
                return Ok((current, next));
            }
            debug!(
                "balance update for {} lost a race (attempt {}/{})",
                username, attempt, MAX_SWAP_ATTEMPTS
            );
        }
        Err(StoreError::Conflict(format!("user {}", username)).into())
    }

    pub(crate) fn record(
        &self,
        user: &User,
        action: HistoryAction,
        description: String,
    ) -> Result<HistoryEntry, LedgerError> {
        let entry = HistoryEntry::new(&user.username, action, user.points, description);
        let entry = self.store.append_history(entry)?;
        debug!("history #{} {} for {}", entry.id, entry.action, entry.username);
        Ok(entry)
    }
}
