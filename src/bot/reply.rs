//! Outbound responses and the keyboards attached to them.
use crate::ledger::{CallbackAction, Reward};

/// A single inline button: visible label plus the callback payload it sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            label: label.into(),
            data: action.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard of command shortcuts, one per row.
    Commands(Vec<String>),
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<InlineButton>>),
}

impl Keyboard {
    /// Shortcut keyboard shown with the greeting.
    pub fn command_menu() -> Self {
        Keyboard::Commands(
            ["/status", "/addpoints", "/addreward", "/redeem", "/history"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// One row per reward plus a trailing Cancel row.
    pub fn reward_menu(rewards: &[Reward]) -> Self {
        let mut rows: Vec<Vec<InlineButton>> = rewards
            .iter()
            .map(|r| {
                vec![InlineButton::new(
                    r.label(),
                    &CallbackAction::Select(r.key.clone()),
                )]
            })
            .collect();
        rows.push(vec![InlineButton::new("Cancel", &CallbackAction::Cancel)]);
        Keyboard::Inline(rows)
    }

    /// Yes/No row for a pending redemption.
    pub fn confirm(reward: &Reward) -> Self {
        Keyboard::Inline(vec![vec![
            InlineButton::new("Yes", &CallbackAction::Confirm(reward.key.clone())),
            InlineButton::new("No", &CallbackAction::Cancel),
        ]])
    }
}

/// What the dispatcher wants sent back over the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// New message in the chat.
    Send {
        chat_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Replace the text (and inline keyboard) of an existing message.
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
}

impl Outbound {
    pub fn text(&self) -> &str {
        match self {
            Outbound::Send { text, .. } | Outbound::Edit { text, .. } => text,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Outbound::Send { keyboard, .. } | Outbound::Edit { keyboard, .. } => keyboard.as_ref(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Outbound::Send { chat_id, .. } | Outbound::Edit { chat_id, .. } => *chat_id,
        }
    }
}
