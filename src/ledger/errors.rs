use thiserror::Error;

/// Failures raised by a [`RecordStore`](crate::ledger::RecordStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Compare-and-swap kept losing against concurrent writers.
    #[error("concurrent update to {0}")]
    Conflict(String),

    /// Lock poisoning or other unexpected internal state.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors produced by ledger and redemption operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("user '{0}' is not registered")]
    NotRegistered(String),

    #[error("user '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("user '{0}' is not on the allow-list")]
    NotAllowed(String),

    #[error("reward '{0}' not found")]
    RewardNotFound(String),

    #[error("insufficient points: balance {balance}, needed {cost}")]
    InsufficientPoints { balance: u64, cost: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl LedgerError {
    /// True for failures that originate in the user's request rather than in storage.
    pub fn is_domain(&self) -> bool {
        !matches!(self, LedgerError::StoreUnavailable(_))
    }
}
