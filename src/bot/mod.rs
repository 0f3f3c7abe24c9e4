//! # Bot Module
//!
//! Chat-facing side of the tracker: parsing inbound commands and button presses,
//! authorizing the sender, calling into the [`ledger`](crate::ledger) and rendering the
//! replies.
//!
//! ## Components
//!
//! - [`commands`] - Slash-command parser
//! - [`dispatch`] - Allow-list and registration gating, error-to-text conversion
//! - [`reply`] - Outbound messages and keyboards
//! - [`transport`] - The [`ChatTransport`] seam and inbound event types
//! - [`telegram`] - Bot API long-polling client (feature `telegram`)
//! - [`server`] - The event loop tying a transport to a dispatcher
//!
//! ## Redemption Round Trip
//!
//! 1. `/redeem` sends the catalog as inline buttons whose payload is the reward key
//! 2. Pressing one edits the message into a Yes (`confirm_<key>`) / No (`cancel`) prompt
//! 3. Yes re-reads reward and balance, deducts the cost and edits in the result
//!
//! No session is kept between steps; the payload is the only state.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chorebot::bot::{BotServer, Dispatcher, TelegramClient};
//! use chorebot::config::Config;
//! use chorebot::ledger::{Ledger, SledRecordStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = SledRecordStore::open(config.storage.ledger_path())?;
//!     let dispatcher = Dispatcher::new(Ledger::new(store), config.bot.clone());
//!     let mut server = BotServer::new(dispatcher, TelegramClient::new(&config.bot));
//!     server.run().await
//! }
//! ```

pub mod commands;
pub mod dispatch;
pub mod reply;
pub mod server;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod transport;

pub use commands::{BotCommand, CommandParser};
pub use dispatch::Dispatcher;
pub use reply::{InlineButton, Keyboard, Outbound};
pub use server::BotServer;
#[cfg(feature = "telegram")]
pub use telegram::TelegramClient;
pub use transport::{ChatTransport, InboundEvent, Sender, TransportError};
