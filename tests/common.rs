//! Test utilities & fixtures shared by the integration tests.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::collections::VecDeque;

use chorebot::bot::{ChatTransport, Dispatcher, InboundEvent, Outbound, Sender, TransportError};
use chorebot::config::Config;
use chorebot::ledger::{Ledger, MemoryRecordStore};

pub const CHAT: i64 = 4242;

/// Dispatcher over an in-memory store with `allowed` on the allow-list.
pub fn dispatcher(allowed: &[&str]) -> Dispatcher<MemoryRecordStore> {
    let mut bot = Config::default().bot;
    bot.allowed_usernames = allowed.iter().map(|s| s.to_string()).collect();
    Dispatcher::new(Ledger::new(MemoryRecordStore::new()), bot)
}

pub fn text(username: &str, body: &str) -> InboundEvent {
    InboundEvent::Text {
        chat_id: CHAT,
        from: Sender::new(Some(username), &capitalize(username)),
        text: body.to_string(),
    }
}

pub fn press(username: &str, data: &str) -> InboundEvent {
    InboundEvent::Callback {
        query_id: format!("q-{}", data),
        chat_id: CHAT,
        message_id: 77,
        from: Sender::new(Some(username), &capitalize(username)),
        data: data.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Send `body` and return the reply text, panicking when nothing comes back.
pub fn say(d: &Dispatcher<MemoryRecordStore>, username: &str, body: &str) -> Outbound {
    d.handle(&text(username, body))
        .unwrap_or_else(|| panic!("no reply to {:?}", body))
}

/// Inline button payloads of a reply, row-major.
pub fn button_data(out: &Outbound) -> Vec<String> {
    match out.keyboard() {
        Some(chorebot::bot::Keyboard::Inline(rows)) => {
            rows.iter().flatten().map(|b| b.data.clone()).collect()
        }
        _ => Vec::new(),
    }
}

pub fn button_labels(out: &Outbound) -> Vec<String> {
    match out.keyboard() {
        Some(chorebot::bot::Keyboard::Inline(rows)) => {
            rows.iter().flatten().map(|b| b.label.clone()).collect()
        }
        _ => Vec::new(),
    }
}

/// Transport that replays canned batches and records everything sent.
#[derive(Default)]
pub struct ScriptedTransport {
    pub batches: VecDeque<Result<Vec<InboundEvent>, TransportError>>,
    pub delivered: Vec<Outbound>,
    pub acknowledged: Vec<String>,
    pub fail_deliveries: bool,
}

impl ScriptedTransport {
    pub fn new(batches: Vec<Vec<InboundEvent>>) -> Self {
        Self {
            batches: batches.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }
}

impl ChatTransport for ScriptedTransport {
    async fn next_events(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
        self.batches.pop_front().unwrap_or(Err(TransportError::Closed))
    }

    async fn deliver(&mut self, outbound: &Outbound) -> Result<(), TransportError> {
        if self.fail_deliveries {
            return Err(TransportError::Api {
                code: 400,
                description: "Bad Request: chat not found".into(),
            });
        }
        self.delivered.push(outbound.clone());
        Ok(())
    }

    async fn acknowledge(&mut self, query_id: &str) -> Result<(), TransportError> {
        self.acknowledged.push(query_id.to_string());
        Ok(())
    }
}
