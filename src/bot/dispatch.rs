//! Routing of inbound events to ledger operations.
//!
//! Gatekeeping happens here before anything is mutated:
//! - `/register` requires the sender's handle to be on the configured allow-list.
//! - Every other command, the greeting and both redemption callbacks require a
//!   registered user.
//!
//! Unregistered command senders always get an explicit rejection. Unregistered button
//! presses follow [`UnregisteredCallbacks`]: ignored by default, or answered with the
//! same rejection.
//!
//! Domain failures ([`LedgerError::is_domain`]) become user-facing text. Store failures
//! are logged and answered with a generic apology, so one broken request never takes
//! the bot down for everyone else.
use chrono::Local;
use log::{debug, error};

use super::commands::{BotCommand, CommandParser};
use super::reply::{Keyboard, Outbound};
use super::transport::{InboundEvent, Sender};
use crate::config::{BotConfig, UnregisteredCallbacks};
use crate::ledger::{CallbackAction, Ledger, LedgerError, RecordStore, RedemptionState};
use crate::logutil::escape_log;
use crate::validation::normalize_handle;

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

pub const NOT_REGISTERED: &str = "You're not registered yet 😮 Send /register to register.";
pub const NOT_ALLOWED: &str = "Sorry, you're not allowed to register 😔";
pub const ALREADY_REGISTERED: &str = "You're already registered 😌";
pub const NOT_ENOUGH_POINTS: &str = "You don't have enough points 😔";
pub const REWARD_GONE: &str = "That reward is no longer available 🤷";
pub const SHOP_EMPTY: &str = "Reward shop is empty 🕸️";
pub const SELECT_REWARD: &str = "Please select a reward to redeem:";
pub const CANCELLED: &str = "Cancelled";
pub const GENERIC_FAILURE: &str = "Something went wrong on our side 😵 Please try again later.";
pub const ADDPOINTS_USAGE: &str = "Please use the following format: /addpoints <points>";
pub const ADDREWARD_USAGE: &str = "Please use the following format: /addreward <reward_name> <cost>";
pub const HISTORY_USAGE: &str = "Please use the following format: /history <username>";

/// Text plus optional keyboard, before it is addressed as a send or an edit.
#[derive(Debug)]
struct Reply {
    text: String,
    keyboard: Option<Keyboard>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Maps chat events to [`Ledger`] calls and renders the outcome.
pub struct Dispatcher<S> {
    ledger: Ledger<S>,
    bot: BotConfig,
    parser: CommandParser,
}

impl<S: RecordStore> Dispatcher<S> {
    pub fn new(ledger: Ledger<S>, bot: BotConfig) -> Self {
        Self {
            ledger,
            bot,
            parser: CommandParser::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Once the bot knows its own handle, commands addressed to other bots are ignored.
    pub fn set_bot_username(&mut self, username: &str) {
        self.parser.set_bot_username(username);
    }

    pub fn is_allowed_user(&self, username: &str) -> bool {
        self.bot.is_allowed(username)
    }

    pub fn is_registered(&self, username: &str) -> Result<bool, LedgerError> {
        self.ledger.is_registered(username)
    }

    /// Handle one event. `None` means nothing is sent back.
    pub fn handle(&self, event: &InboundEvent) -> Option<Outbound> {
        let from = event.sender();
        match event {
            InboundEvent::Text { chat_id, text, .. } => {
                debug!("text from {}: {}", sender_label(from), escape_log(text));
                let command = self.parser.parse(text);
                let reply = match self.handle_command(from, &command) {
                    Ok(reply) => reply,
                    Err(e) if e.is_domain() => Some(Reply::text(describe_command_error(&command, &e))),
                    Err(e) => {
                        error!("{:?} from {} failed: {}", command, sender_label(from), e);
                        Some(Reply::text(GENERIC_FAILURE))
                    }
                };
                reply.map(|r| Outbound::Send {
                    chat_id: *chat_id,
                    text: r.text,
                    keyboard: r.keyboard,
                })
            }
            InboundEvent::Callback {
                chat_id,
                message_id,
                data,
                ..
            } => {
                debug!("callback from {}: {}", sender_label(from), escape_log(data));
                let action = CallbackAction::parse(data);
                let reply = match self.handle_callback(from, &action) {
                    Ok(reply) => reply,
                    Err(e) if e.is_domain() => Some(Reply::text(describe_callback_error(&e))),
                    Err(e) => {
                        error!("callback {:?} from {} failed: {}", action, sender_label(from), e);
                        Some(Reply::text(GENERIC_FAILURE))
                    }
                };
                reply.map(|r| Outbound::Edit {
                    chat_id: *chat_id,
                    message_id: *message_id,
                    text: r.text,
                    keyboard: r.keyboard,
                })
            }
        }
    }

    /// Canonical stored username of a registered sender.
    fn registered_username(&self, from: &Sender) -> Result<Option<String>, LedgerError> {
        let Some(handle) = from.username.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(self.ledger.store().get_user(handle)?.map(|u| u.username))
    }

    fn handle_command(&self, from: &Sender, command: &BotCommand) -> Result<Option<Reply>, LedgerError> {
        match command {
            BotCommand::Ignored => Ok(None),
            BotCommand::Register => self.register(from).map(Some),
            _ => {
                let Some(username) = self.registered_username(from)? else {
                    return Ok(Some(Reply::text(NOT_REGISTERED)));
                };
                let reply = match command {
                    BotCommand::Status => self.status()?,
                    BotCommand::History(target) => self.history(&username, target.as_deref())?,
                    BotCommand::AddPoints(args) => self.add_points(&username, args)?,
                    BotCommand::AddReward(args) => self.add_reward(args)?,
                    BotCommand::Redeem => render_state(self.ledger.browse()?),
                    _ => greeting(from),
                };
                Ok(Some(reply))
            }
        }
    }

    fn handle_callback(&self, from: &Sender, action: &CallbackAction) -> Result<Option<Reply>, LedgerError> {
        let Some(username) = self.registered_username(from)? else {
            sec_log!(
                "button press {:?} from unregistered sender {}",
                action,
                sender_label(from)
            );
            return Ok(match self.bot.unregistered_callbacks {
                UnregisteredCallbacks::Ignore => None,
                UnregisteredCallbacks::Reject => Some(Reply::text(NOT_REGISTERED)),
            });
        };
        let state = self.ledger.apply_callback(&username, action)?;
        Ok(Some(render_state(state)))
    }

    fn register(&self, from: &Sender) -> Result<Reply, LedgerError> {
        let handle = from.username.as_deref().unwrap_or("").trim();
        if !self.is_allowed_user(handle) {
            sec_log!("registration refused for {}", sender_label(from));
            return Err(LedgerError::NotAllowed(handle.to_string()));
        }
        let user = self.ledger.register(handle, &from.first_name)?;
        Ok(Reply::text(format!(
            "{}, you're now registered to our household 😊 Your points start at 0.",
            user.display_name
        )))
    }

    fn status(&self) -> Result<Reply, LedgerError> {
        let mut message = String::from("Here's the status of all users:\n");
        for standing in self.ledger.status()? {
            message.push_str(&format!("{} - {} points\n", standing.name, standing.points));
        }
        Ok(Reply::text(message))
    }

    fn history(&self, own: &str, target: Option<&str>) -> Result<Reply, LedgerError> {
        let (mut message, username) = match target {
            None => (
                String::from(
                    "Here's your history.\nTo see the history of other users, use the following format: /history <username>\n\n",
                ),
                own.to_string(),
            ),
            Some(raw) => (
                String::from("Here's the history of the user you requested.\n\n"),
                normalize_handle(raw)?,
            ),
        };
        let entries = self.ledger.history(&username)?;
        if entries.is_empty() {
            message.push_str("No history found.");
            return Ok(Reply::text(message));
        }
        // Newest first; older entries that would push the reply past the limit are
        // summarized in a trailer.
        let budget = self.bot.max_message_chars;
        let total = entries.len();
        for (shown, entry) in entries.iter().enumerate() {
            let line = format!(
                "{} - {} points - {}\n",
                entry.timestamp.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S"),
                entry.points,
                entry.description
            );
            let left = total - shown;
            let reserve = if left > 1 { HISTORY_TRAILER_RESERVE } else { 0 };
            if message_len(&message) + message_len(&line) + reserve > budget {
                message.push_str(&older_entries_trailer(left));
                debug!("history for {} truncated: {} of {} entries shown", username, shown, total);
                break;
            }
            message.push_str(&line);
        }
        Ok(Reply::text(message))
    }

    fn add_points(&self, username: &str, args: &[String]) -> Result<Reply, LedgerError> {
        let [raw] = args else {
            return Err(LedgerError::InvalidArgument("expected exactly one value".into()));
        };
        let (delta, user) = self.ledger.add_points_text(username, raw)?;
        Ok(Reply::text(format!(
            "Added {} points to your account 🥳 You now have {} points.",
            delta, user.points
        )))
    }

    fn add_reward(&self, args: &[String]) -> Result<Reply, LedgerError> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        let reward = self.ledger.add_reward_args(&words)?;
        Ok(Reply::text(format!(
            "Reward '{}' added with cost {} points.",
            reward.name, reward.cost
        )))
    }
}

/// Room kept for the "…and N older entries" line while history still has entries left.
const HISTORY_TRAILER_RESERVE: usize = 48;

/// Length as the Bot API counts it (UTF-16 code units).
fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Sender for log lines: handle plus escaped first name, always a single line.
fn sender_label(from: &Sender) -> String {
    format!(
        "{:?} ({})",
        from.username.as_deref().map(escape_log),
        escape_log(&from.first_name)
    )
}

fn older_entries_trailer(count: usize) -> String {
    if count == 1 {
        "…and 1 older entry".to_string()
    } else {
        format!("…and {} older entries", count)
    }
}

fn greeting(from: &Sender) -> Reply {
    Reply::with_keyboard(
        format!("Hi {} 😊 Here's a list of available commands.", from.first_name),
        Keyboard::command_menu(),
    )
}

fn render_state(state: RedemptionState) -> Reply {
    match state {
        RedemptionState::Browsing(rewards) if rewards.is_empty() => Reply::text(SHOP_EMPTY),
        RedemptionState::Browsing(rewards) => {
            Reply::with_keyboard(SELECT_REWARD, Keyboard::reward_menu(&rewards))
        }
        RedemptionState::PendingConfirmation(reward) => Reply::with_keyboard(
            format!(
                "Are you sure you want to redeem '{}' for {} points?",
                reward.name, reward.cost
            ),
            Keyboard::confirm(&reward),
        ),
        RedemptionState::Redeemed { reward, user } => Reply::text(format!(
            "Redeemed '{}' for {} points 🥳 You now have {} points.",
            reward.name, reward.cost, user.points
        )),
        RedemptionState::Cancelled => Reply::text(CANCELLED),
    }
}

fn describe_command_error(command: &BotCommand, err: &LedgerError) -> String {
    match err {
        LedgerError::NotRegistered(_) => NOT_REGISTERED.to_string(),
        LedgerError::AlreadyRegistered(_) => ALREADY_REGISTERED.to_string(),
        LedgerError::NotAllowed(_) => NOT_ALLOWED.to_string(),
        LedgerError::RewardNotFound(_) => REWARD_GONE.to_string(),
        LedgerError::InsufficientPoints { balance, .. } => match command {
            BotCommand::AddPoints(_) => format!(
                "That would take your balance below zero 😔 You have {} points.",
                balance
            ),
            _ => NOT_ENOUGH_POINTS.to_string(),
        },
        LedgerError::InvalidArgument(reason) => match command {
            BotCommand::AddPoints(_) => format!("{} ({})", ADDPOINTS_USAGE, reason),
            BotCommand::AddReward(_) => format!("{} ({})", ADDREWARD_USAGE, reason),
            BotCommand::History(_) => format!("{} ({})", HISTORY_USAGE, reason),
            _ => format!("Sorry, I couldn't use that: {}", reason),
        },
        LedgerError::StoreUnavailable(_) => GENERIC_FAILURE.to_string(),
    }
}

fn describe_callback_error(err: &LedgerError) -> String {
    match err {
        LedgerError::InsufficientPoints { .. } => NOT_ENOUGH_POINTS.to_string(),
        LedgerError::RewardNotFound(_) => REWARD_GONE.to_string(),
        LedgerError::NotRegistered(_) => NOT_REGISTERED.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}
