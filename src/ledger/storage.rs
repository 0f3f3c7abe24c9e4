use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sled::IVec;

use crate::ledger::errors::StoreError;
use crate::ledger::types::{
    HistoryEntry, Reward, User, HISTORY_SCHEMA_VERSION, REWARD_SCHEMA_VERSION,
    USER_SCHEMA_VERSION,
};

const TREE_USERS: &str = "users";
const TREE_REWARDS: &str = "rewards";
const TREE_HISTORY: &str = "history";

/// Persistence seam for the ledger: key lookups, filtered scans and upserts over the
/// users, rewards and history collections.
///
/// Usernames are matched case-insensitively. Users are only ever written through
/// [`insert_user`](RecordStore::insert_user) (create-if-absent) and
/// [`swap_user`](RecordStore::swap_user) (compare-and-swap on `version`), so a stale
/// read can never silently overwrite a newer balance.
pub trait RecordStore {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Create the user if the username is free. Returns `false` when it is taken.
    fn insert_user(&self, user: &User) -> Result<bool, StoreError>;
    /// Replace `current` with `next` if the stored version still equals `current.version`.
    /// Returns `false` when another writer got there first.
    fn swap_user(&self, current: &User, next: &User) -> Result<bool, StoreError>;

    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError>;
    fn get_reward(&self, key: &str) -> Result<Option<Reward>, StoreError>;
    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError>;

    /// Append an entry, returning it with its store-assigned id.
    fn append_history(&self, entry: HistoryEntry) -> Result<HistoryEntry, StoreError>;
    /// All entries for `username`, in no particular order.
    fn history_for(&self, username: &str) -> Result<Vec<HistoryEntry>, StoreError>;
}

fn user_key(username: &str) -> Vec<u8> {
    username.trim().to_lowercase().into_bytes()
}

fn history_prefix(username: &str) -> Vec<u8> {
    format!("{}:", username.trim().to_lowercase()).into_bytes()
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledRecordStoreBuilder {
    path: PathBuf,
    temporary: bool,
}

impl SledRecordStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Remove the database files when the store is dropped.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn open(self) -> Result<SledRecordStore, StoreError> {
        SledRecordStore::open_with_config(&self.path, self.temporary)
    }
}

/// Sled-backed record store. One tree per collection.
pub struct SledRecordStore {
    db: sled::Db,
    users: sled::Tree,
    rewards: sled::Tree,
    history: sled::Tree,
}

impl SledRecordStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_config(path.as_ref(), false)
    }

    fn open_with_config(path: &Path, temporary: bool) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let db = sled::Config::new()
            .path(path)
            .temporary(temporary)
            .open()?;
        let users = db.open_tree(TREE_USERS)?;
        let rewards = db.open_tree(TREE_REWARDS)?;
        let history = db.open_tree(TREE_HISTORY)?;
        Ok(Self {
            db,
            users,
            rewards,
            history,
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &IVec) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn decode_user(bytes: &IVec) -> Result<User, StoreError> {
        let user: User = Self::deserialize(bytes)?;
        if user.schema_version != USER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "user",
                expected: USER_SCHEMA_VERSION,
                found: user.schema_version,
            });
        }
        Ok(user)
    }

    fn decode_reward(bytes: &IVec) -> Result<Reward, StoreError> {
        let reward: Reward = Self::deserialize(bytes)?;
        if reward.schema_version != REWARD_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "reward",
                expected: REWARD_SCHEMA_VERSION,
                found: reward.schema_version,
            });
        }
        Ok(reward)
    }

    fn decode_history(bytes: &IVec) -> Result<HistoryEntry, StoreError> {
        let entry: HistoryEntry = Self::deserialize(bytes)?;
        if entry.schema_version != HISTORY_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "history",
                expected: HISTORY_SCHEMA_VERSION,
                found: entry.schema_version,
            });
        }
        Ok(entry)
    }
}

impl RecordStore for SledRecordStore {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        match self.users.get(user_key(username))? {
            Some(bytes) => Ok(Some(Self::decode_user(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.users
            .iter()
            .map(|res| {
                res.map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::decode_user(&value))
            })
            .collect()
    }

    fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let bytes = Self::serialize(user)?;
        let outcome = self
            .users
            .compare_and_swap(user_key(&user.username), None as Option<&[u8]>, Some(bytes))?;
        if outcome.is_ok() {
            self.users.flush()?;
        }
        Ok(outcome.is_ok())
    }

    fn swap_user(&self, current: &User, next: &User) -> Result<bool, StoreError> {
        let key = user_key(&current.username);
        let Some(stored) = self.users.get(&key)? else {
            return Ok(false);
        };
        if Self::decode_user(&stored)?.version != current.version {
            return Ok(false);
        }
        let bytes = Self::serialize(next)?;
        let outcome = self.users.compare_and_swap(key, Some(stored), Some(bytes))?;
        if outcome.is_ok() {
            self.users.flush()?;
        }
        Ok(outcome.is_ok())
    }

    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError> {
        let bytes = Self::serialize(reward)?;
        self.rewards.insert(reward.key.as_bytes(), bytes)?;
        self.rewards.flush()?;
        Ok(())
    }

    fn get_reward(&self, key: &str) -> Result<Option<Reward>, StoreError> {
        match self.rewards.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_reward(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        self.rewards
            .iter()
            .map(|res| {
                res.map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::decode_reward(&value))
            })
            .collect()
    }

    fn append_history(&self, mut entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        // Monotonic across restarts, so key order within a prefix is append order.
        entry.id = self.db.generate_id()?;
        let mut key = history_prefix(&entry.username);
        key.extend_from_slice(format!("{:020}", entry.id).as_bytes());
        let bytes = Self::serialize(&entry)?;
        self.history.insert(key, bytes)?;
        self.history.flush()?;
        Ok(entry)
    }

    fn history_for(&self, username: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        self.history
            .scan_prefix(history_prefix(username))
            .map(|res| {
                res.map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::decode_history(&value))
            })
            .collect()
    }
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<Vec<u8>, User>,
    rewards: BTreeMap<String, Reward>,
    history: Vec<HistoryEntry>,
    next_history_id: u64,
}

/// In-process store with the same semantics as [`SledRecordStore`]. Used by tests and
/// handy for dry runs.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> Result<R, StoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl RecordStore for MemoryRecordStore {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.with_state(|s| s.users.get(&user_key(username)).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_state(|s| s.users.values().cloned().collect())
    }

    fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        self.with_state(|s| {
            let key = user_key(&user.username);
            if s.users.contains_key(&key) {
                return false;
            }
            s.users.insert(key, user.clone());
            true
        })
    }

    fn swap_user(&self, current: &User, next: &User) -> Result<bool, StoreError> {
        self.with_state(|s| match s.users.get_mut(&user_key(&current.username)) {
            Some(stored) if stored.version == current.version => {
                *stored = next.clone();
                true
            }
            _ => false,
        })
    }

    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.rewards.insert(reward.key.clone(), reward.clone());
        })
    }

    fn get_reward(&self, key: &str) -> Result<Option<Reward>, StoreError> {
        self.with_state(|s| s.rewards.get(key).cloned())
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        self.with_state(|s| s.rewards.values().cloned().collect())
    }

    fn append_history(&self, mut entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        self.with_state(|s| {
            s.next_history_id += 1;
            entry.id = s.next_history_id;
            s.history.push(entry.clone());
            entry
        })
    }

    fn history_for(&self, username: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let wanted = username.trim().to_lowercase();
        self.with_state(|s| {
            s.history
                .iter()
                .filter(|e| e.username.to_lowercase() == wanted)
                .cloned()
                .collect()
        })
    }
}
