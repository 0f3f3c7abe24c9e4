//! # Chorebot - Household Points Tracker
//!
//! Chorebot keeps score for a household: members earn points for chores and spend them
//! on rewards from a shared catalog, all through a Telegram chat.
//!
//! ## Features
//!
//! - **Points Ledger**: Non-negative balances, every change paired with an append-only
//!   history entry that snapshots the resulting balance.
//! - **Reward Shop**: Anyone registered can add rewards; redemption is a two-step
//!   select/confirm flow carried entirely in button payloads.
//! - **Gatekeeping**: Self-registration limited to an allow-list; all other commands
//!   require registration.
//! - **Optimistic Concurrency**: Balance writes are version-checked swaps, so two
//!   simultaneous updates cannot silently overwrite each other.
//! - **Embedded Storage**: Sled database, with an in-memory store for tests.
//!
//! ## Module Organization
//!
//! - [`ledger`] - Records, record store, ledger and redemption workflow
//! - [`bot`] - Command parsing, dispatch, transport and server loop
//! - [`config`] - Configuration management
//! - [`validation`] - Parsing of user-typed arguments
//! - [`logutil`] - Log sanitizing helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Transport     │ ← Telegram long polling
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Dispatcher    │ ← Gating, commands, callbacks
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Ledger        │ ← Balances, history, redemption
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Record Store  │ ← Sled / in-memory
//! └─────────────────┘
//! ```

pub mod bot;
pub mod config;
pub mod ledger;
pub mod logutil;
pub mod validation;
