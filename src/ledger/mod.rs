//! Points ledger: typed records, the record store seam, balance bookkeeping and the
//! redemption workflow.
//!
//! All balance writes go through [`Ledger`], which pairs every change with an
//! append-only [`HistoryEntry`]. The store is injected so tests can run against
//! [`MemoryRecordStore`] while the bot uses [`SledRecordStore`].

pub mod errors;
pub mod points;
pub mod redeem;
pub mod storage;
pub mod types;

pub use errors::{LedgerError, StoreError};
pub use points::{Ledger, Standing};
pub use redeem::{CallbackAction, RedemptionState};
pub use storage::{MemoryRecordStore, RecordStore, SledRecordStore, SledRecordStoreBuilder};
pub use types::*;
