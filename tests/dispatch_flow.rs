//! End-to-end command and button flows through the dispatcher.
mod common;

use chorebot::bot::dispatch::{
    ADDREWARD_USAGE, ALREADY_REGISTERED, CANCELLED, GENERIC_FAILURE, NOT_ALLOWED,
    NOT_ENOUGH_POINTS, NOT_REGISTERED, REWARD_GONE, SELECT_REWARD, SHOP_EMPTY,
};
use chorebot::bot::{Dispatcher, Keyboard, Outbound};
use chorebot::config::{Config, UnregisteredCallbacks};
use chorebot::ledger::{
    HistoryEntry, Ledger, RecordStore, Reward, StoreError, User,
};
use common::*;

#[test]
fn register_is_allow_listed_and_single_shot() {
    let d = dispatcher(&["alice"]);
    let out = say(&d, "mallory", "/register");
    assert_eq!(out.text(), NOT_ALLOWED);
    assert!(!d.is_registered("mallory").unwrap());

    let out = say(&d, "alice", "/register");
    assert_eq!(
        out.text(),
        "Alice, you're now registered to our household 😊 Your points start at 0."
    );
    assert!(matches!(out, Outbound::Send { chat_id: CHAT, .. }));

    say(&d, "alice", "/addpoints 3");
    let out = say(&d, "alice", "/register");
    assert_eq!(out.text(), ALREADY_REGISTERED);
    assert_eq!(d.ledger().user("alice").unwrap().points, 3);
}

#[test]
fn unregistered_commands_get_rejection_without_mutation() {
    let d = dispatcher(&["alice"]);
    for body in [
        "/status",
        "/history",
        "/addpoints 5",
        "/addreward Cake 2",
        "/redeem",
        "hello",
    ] {
        let out = say(&d, "bob", body);
        assert_eq!(out.text(), NOT_REGISTERED, "for {}", body);
    }
    assert!(d.ledger().store().list_users().unwrap().is_empty());
    assert!(d.ledger().list_rewards().unwrap().is_empty());
    assert!(d.ledger().history("bob").unwrap().is_empty());
}

#[test]
fn status_lists_everyone_sorted() {
    let d = dispatcher(&["alice", "bob"]);
    say(&d, "bob", "/register");
    say(&d, "alice", "/register");
    say(&d, "bob", "/addpoints 12");
    let out = say(&d, "alice", "/status");
    assert_eq!(
        out.text(),
        "Here's the status of all users:\nAlice - 0 points\nBob - 12 points\n"
    );
}

#[test]
fn addpoints_reports_new_balance() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    let out = say(&d, "alice", "/addpoints 10");
    assert_eq!(
        out.text(),
        "Added 10 points to your account 🥳 You now have 10 points."
    );
    let out = say(&d, "alice", "/addpoints -25");
    assert_eq!(
        out.text(),
        "That would take your balance below zero 😔 You have 10 points."
    );
    assert_eq!(d.ledger().user("alice").unwrap().points, 10);
}

#[test]
fn addreward_validates_cost() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    for body in ["/addreward", "/addreward 5", "/addreward Ice Cream lots"] {
        let out = say(&d, "alice", body);
        assert!(out.text().starts_with(ADDREWARD_USAGE), "{}: {}", body, out.text());
    }
    assert!(d.ledger().list_rewards().unwrap().is_empty());

    let out = say(&d, "alice", "/addreward Ice Cream 5");
    assert_eq!(out.text(), "Reward 'Ice Cream' added with cost 5 points.");
}

#[test]
fn empty_shop_has_no_menu() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    let out = say(&d, "alice", "/redeem");
    assert_eq!(out.text(), SHOP_EMPTY);
    assert!(out.keyboard().is_none());
}

#[test]
fn redeem_round_trip_through_buttons() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    say(&d, "alice", "/addpoints 7");
    say(&d, "alice", "/addreward Ice Cream 5");

    let menu = say(&d, "alice", "/redeem");
    assert_eq!(menu.text(), SELECT_REWARD);
    assert_eq!(button_labels(&menu), vec!["Ice Cream (5p)", "Cancel"]);
    let key = button_data(&menu)[0].clone();

    let prompt = d.handle(&press("alice", &key)).expect("prompt");
    assert!(matches!(prompt, Outbound::Edit { message_id: 77, .. }));
    assert_eq!(
        prompt.text(),
        "Are you sure you want to redeem 'Ice Cream' for 5 points?"
    );
    assert_eq!(button_labels(&prompt), vec!["Yes", "No"]);
    assert_eq!(
        button_data(&prompt),
        vec![format!("confirm_{}", key), "cancel".to_string()]
    );

    let done = d
        .handle(&press("alice", &format!("confirm_{}", key)))
        .expect("result");
    assert_eq!(
        done.text(),
        "Redeemed 'Ice Cream' for 5 points 🥳 You now have 2 points."
    );
    assert!(done.keyboard().is_none());

    // Same confirm pressed again: balance is re-read, so it now fails cleanly.
    let again = d
        .handle(&press("alice", &format!("confirm_{}", key)))
        .expect("result");
    assert_eq!(again.text(), NOT_ENOUGH_POINTS);
    assert_eq!(d.ledger().user("alice").unwrap().points, 2);
    assert_eq!(d.ledger().history("alice").unwrap().len(), 3);
}

#[test]
fn cancel_and_unknown_rewards() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    let out = d.handle(&press("alice", "cancel")).expect("reply");
    assert_eq!(out.text(), CANCELLED);

    let out = d.handle(&press("alice", "deadbeef0000")).expect("reply");
    assert_eq!(out.text(), REWARD_GONE);
    let out = d.handle(&press("alice", "confirm_deadbeef0000")).expect("reply");
    assert_eq!(out.text(), REWARD_GONE);
}

#[test]
fn unregistered_button_presses_follow_policy() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    say(&d, "alice", "/addpoints 9");
    say(&d, "alice", "/addreward Nap 1");
    let key = d.ledger().list_rewards().unwrap()[0].key.clone();

    assert!(d.handle(&press("eve", &key)).is_none());
    assert!(d.handle(&press("eve", &format!("confirm_{}", key))).is_none());
    assert!(d.handle(&press("eve", "cancel")).is_none());

    let mut bot = Config::default().bot;
    bot.unregistered_callbacks = UnregisteredCallbacks::Reject;
    let strict = Dispatcher::new(Ledger::new(chorebot::ledger::MemoryRecordStore::new()), bot);
    let out = strict.handle(&press("eve", "cancel")).expect("reply");
    assert_eq!(out.text(), NOT_REGISTERED);
    assert!(matches!(out, Outbound::Edit { .. }));
}

#[test]
fn history_for_self_and_others() {
    let d = dispatcher(&["alice", "bob"]);
    say(&d, "alice", "/register");
    say(&d, "bob", "/register");
    say(&d, "bob", "/addpoints 4");

    let own = say(&d, "alice", "/history");
    assert!(own.text().starts_with("Here's your history.\n"));
    assert!(own.text().contains("0 points - Registered to the household"));

    let other = say(&d, "alice", "/history @bob");
    assert!(other.text().starts_with("Here's the history of the user you requested."));
    let lines: Vec<&str> = other.text().lines().filter(|l| l.contains(" - ")).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("4 points - Added 4 points"));

    let nobody = say(&d, "alice", "/history zed");
    assert!(nobody.text().ends_with("No history found."));
}

#[test]
fn greeting_for_plain_text() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    let out = say(&d, "alice", "what can I do?");
    assert_eq!(out.text(), "Hi Alice 😊 Here's a list of available commands.");
    let Some(Keyboard::Commands(commands)) = out.keyboard() else {
        panic!("expected command keyboard");
    };
    assert!(commands.contains(&"/redeem".to_string()));
}

/// Store whose writes always fail, for exercising the generic failure path.
struct BrokenStore;

impl RecordStore for BrokenStore {
    fn get_user(&self, _username: &str) -> Result<Option<User>, StoreError> {
        Ok(Some(User::new("alice", "Alice").unwrap()))
    }
    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn insert_user(&self, _user: &User) -> Result<bool, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn swap_user(&self, _current: &User, _next: &User) -> Result<bool, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn put_reward(&self, _reward: &Reward) -> Result<(), StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn get_reward(&self, _key: &str) -> Result<Option<Reward>, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn append_history(&self, _entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
    fn history_for(&self, _username: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Err(StoreError::Internal("disk on fire".into()))
    }
}

#[test]
fn store_failures_become_generic_replies() {
    let d = Dispatcher::new(Ledger::new(BrokenStore), Config::default().bot);
    for body in ["/status", "/addpoints 3", "/redeem", "/history"] {
        let out = d.handle(&common::text("alice", body)).expect("reply");
        assert_eq!(out.text(), GENERIC_FAILURE, "for {}", body);
    }
    let out = d.handle(&press("alice", "confirm_abc")).expect("reply");
    assert_eq!(out.text(), GENERIC_FAILURE);
}

/// Store that loses every compare-and-swap, as if another writer always won.
struct ContendedStore(chorebot::ledger::MemoryRecordStore);

impl RecordStore for ContendedStore {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.0.get_user(username)
    }
    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.0.list_users()
    }
    fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        self.0.insert_user(user)
    }
    fn swap_user(&self, _current: &User, _next: &User) -> Result<bool, StoreError> {
        Ok(false)
    }
    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError> {
        self.0.put_reward(reward)
    }
    fn get_reward(&self, key: &str) -> Result<Option<Reward>, StoreError> {
        self.0.get_reward(key)
    }
    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        self.0.list_rewards()
    }
    fn append_history(&self, entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        self.0.append_history(entry)
    }
    fn history_for(&self, username: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        self.0.history_for(username)
    }
}

#[test]
fn lost_races_surface_as_failures_not_silent_overwrites() {
    let mut bot = Config::default().bot;
    bot.allowed_usernames = vec!["alice".into()];
    let d = Dispatcher::new(
        Ledger::new(ContendedStore(chorebot::ledger::MemoryRecordStore::new())),
        bot,
    );
    say_generic(&d, "/register");
    let out = d.handle(&common::text("alice", "/addpoints 5")).expect("reply");
    assert_eq!(out.text(), GENERIC_FAILURE);
    assert_eq!(d.ledger().user("alice").unwrap().points, 0);
    assert_eq!(d.ledger().history("alice").unwrap().len(), 1);
}

fn say_generic<S: RecordStore>(d: &Dispatcher<S>, body: &str) {
    d.handle(&common::text("alice", body)).expect("reply");
}

#[test]
fn long_history_is_capped_to_message_limit() {
    let d = dispatcher(&["alice"]);
    say(&d, "alice", "/register");
    for _ in 0..150 {
        say(&d, "alice", "/addpoints 1");
    }
    let out = say(&d, "alice", "/history");
    let limit = Config::default().bot.max_message_chars;
    assert!(out.text().encode_utf16().count() <= limit, "{} chars", out.text().len());

    let lines: Vec<&str> = out.text().lines().collect();
    let shown = lines.iter().filter(|l| l.contains(" points - ")).count();
    assert!(shown > 0 && shown < 151);
    // Newest entries are the ones kept.
    assert!(lines[3].ends_with("150 points - Added 1 points"));
    assert_eq!(
        lines.last().copied(),
        Some(format!("…and {} older entries", 151 - shown).as_str())
    );
}

#[test]
fn history_limit_follows_configuration() {
    let mut bot = Config::default().bot;
    bot.allowed_usernames = vec!["alice".into()];
    bot.max_message_chars = 400;
    let d = Dispatcher::new(Ledger::new(chorebot::ledger::MemoryRecordStore::new()), bot);
    say_generic(&d, "/register");
    for _ in 0..10 {
        say_generic(&d, "/addpoints 2");
    }
    let out = d.handle(&common::text("alice", "/history")).expect("reply");
    assert!(out.text().encode_utf16().count() <= 400);
    assert!(out.text().lines().nth(3).unwrap_or("").ends_with("20 points - Added 2 points"));
    assert!(out.text().ends_with("older entries"));

    // A short history still comes back whole.
    let out = d.handle(&common::text("alice", "/history zed")).expect("reply");
    assert!(out.text().ends_with("No history found."));
}
