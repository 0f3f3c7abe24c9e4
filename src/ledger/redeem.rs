//! Reward catalog and the two-step redemption flow.
//!
//! ```text
//! Browsing ──select(key)──▶ PendingConfirmation ──confirm──▶ Redeemed
//!                                   │
//!                                   └──────cancel──────▶ Cancelled
//! ```
//!
//! Nothing is held server-side between the steps. The reward key travels inside the
//! callback payload of the confirmation buttons (see [`CallbackAction`]), and
//! confirmation re-reads both the reward and the balance.
use log::info;

use crate::ledger::errors::LedgerError;
use crate::ledger::points::Ledger;
use crate::ledger::storage::RecordStore;
use crate::ledger::types::{HistoryAction, Reward, User};
use crate::validation::parse_cost;

const CANCEL_PAYLOAD: &str = "cancel";
const CONFIRM_PREFIX: &str = "confirm_";

/// Decoded callback payload from a redemption keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// A reward was picked from the shop menu.
    Select(String),
    /// The Yes button of a confirmation prompt.
    Confirm(String),
    /// Any No/Cancel button.
    Cancel,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        let data = data.trim();
        if data == CANCEL_PAYLOAD {
            CallbackAction::Cancel
        } else if let Some(key) = data.strip_prefix(CONFIRM_PREFIX) {
            CallbackAction::Confirm(key.to_string())
        } else {
            CallbackAction::Select(data.to_string())
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Select(key) => key.clone(),
            CallbackAction::Confirm(key) => format!("{}{}", CONFIRM_PREFIX, key),
            CallbackAction::Cancel => CANCEL_PAYLOAD.to_string(),
        }
    }
}

/// Where a redemption stands after a step has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionState {
    /// The catalog is on screen; nothing selected yet.
    Browsing(Vec<Reward>),
    /// A reward was selected and awaits Yes/No.
    PendingConfirmation(Reward),
    /// Points were deducted; carries the updated user.
    Redeemed { reward: Reward, user: User },
    Cancelled,
}

impl<S: RecordStore> Ledger<S> {
    /// Every reward in the catalog, sorted by name then key.
    pub fn list_rewards(&self) -> Result<Vec<Reward>, LedgerError> {
        let mut rewards = self.store().list_rewards()?;
        rewards.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(rewards)
    }

    /// Add a reward. Duplicate names are allowed; each gets its own key.
    pub fn add_reward(&self, name: &str, cost: u64) -> Result<Reward, LedgerError> {
        let reward = Reward::new(name, cost)?;
        self.store().put_reward(&reward)?;
        info!("reward {} '{}' added at {} points", reward.key, reward.name, reward.cost);
        Ok(reward)
    }

    /// Parse `/addreward` arguments: every word but the last is the name, the last is
    /// the cost.
    pub fn add_reward_args(&self, args: &[&str]) -> Result<Reward, LedgerError> {
        let Some((cost, name)) = args.split_last() else {
            return Err(LedgerError::InvalidArgument("reward name and cost required".into()));
        };
        if name.is_empty() {
            return Err(LedgerError::InvalidArgument("reward name and cost required".into()));
        }
        let cost = parse_cost(cost)?;
        self.add_reward(&name.join(" "), cost)
    }

    fn reward(&self, key: &str) -> Result<Reward, LedgerError> {
        self.store()
            .get_reward(key)?
            .ok_or_else(|| LedgerError::RewardNotFound(key.to_string()))
    }

    /// Open the shop.
    pub fn browse(&self) -> Result<RedemptionState, LedgerError> {
        Ok(RedemptionState::Browsing(self.list_rewards()?))
    }

    /// Browsing → PendingConfirmation.
    pub fn select_reward(&self, key: &str) -> Result<RedemptionState, LedgerError> {
        Ok(RedemptionState::PendingConfirmation(self.reward(key)?))
    }

    /// PendingConfirmation → Cancelled. No state is touched.
    pub fn cancel_redemption(&self) -> RedemptionState {
        RedemptionState::Cancelled
    }

    /// PendingConfirmation → Redeemed. Fails with `InsufficientPoints` and leaves the
    /// balance and history untouched when the user cannot afford the reward.
    pub fn confirm_redemption(
        &self,
        username: &str,
        key: &str,
    ) -> Result<RedemptionState, LedgerError> {
        let reward = self.reward(key)?;
        let (_, user) = self.update_balance(username, |user| {
            user.points
                .checked_sub(reward.cost)
                .ok_or(LedgerError::InsufficientPoints {
                    balance: user.points,
                    cost: reward.cost,
                })
        })?;
        self.record(
            &user,
            HistoryAction::Redeem,
            format!("Redeemed '{}' for {} points", reward.name, reward.cost),
        )?;
        info!(
            "{} redeemed '{}' for {} points, {} left",
            user.username, reward.name, reward.cost, user.points
        );
        Ok(RedemptionState::Redeemed { reward, user })
    }

    /// Apply a decoded callback for `username`.
    pub fn apply_callback(
        &self,
        username: &str,
        action: &CallbackAction,
    ) -> Result<RedemptionState, LedgerError> {
        match action {
            CallbackAction::Select(key) => self.select_reward(key),
            CallbackAction::Confirm(key) => self.confirm_redemption(username, key),
            CallbackAction::Cancel => Ok(self.cancel_redemption()),
        }
    }
}
