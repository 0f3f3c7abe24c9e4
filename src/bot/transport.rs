//! Transport seam between the dispatcher and a chat platform.
use thiserror::Error;

use super::reply::Outbound;

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Chat handle; some accounts have none and can never register.
    pub username: Option<String>,
    pub first_name: String,
}

impl Sender {
    pub fn new(username: Option<&str>, first_name: &str) -> Self {
        Self {
            username: username.map(str::to_string),
            first_name: first_name.to_string(),
        }
    }
}

/// One inbound event, already decoded from the platform's wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text {
        chat_id: i64,
        from: Sender,
        text: String,
    },
    /// An inline keyboard button press.
    Callback {
        query_id: String,
        chat_id: i64,
        message_id: i64,
        from: Sender,
        data: String,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &Sender {
        match self {
            InboundEvent::Text { from, .. } | InboundEvent::Callback { from, .. } => from,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[cfg(feature = "telegram")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered but refused the request.
    #[error("bot api error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// No more events will arrive (scripted transports, shutdown).
    #[error("transport closed")]
    Closed,
}

/// A chat platform the bot server can poll and reply through.
#[allow(async_fn_in_trait)]
pub trait ChatTransport {
    /// Wait for the next batch of inbound events. An empty batch is a normal timeout.
    async fn next_events(&mut self) -> Result<Vec<InboundEvent>, TransportError>;

    async fn deliver(&mut self, outbound: &Outbound) -> Result<(), TransportError>;

    /// Stop the client's spinner for a button press.
    async fn acknowledge(&mut self, query_id: &str) -> Result<(), TransportError>;
}
