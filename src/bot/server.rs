use anyhow::Result;
use log::{debug, info, warn};
use tokio::time::{sleep, Duration};

use super::dispatch::Dispatcher;
use super::transport::{ChatTransport, InboundEvent, TransportError};
use crate::ledger::RecordStore;

/// # Bot Server
///
/// Pulls events from a [`ChatTransport`], runs them through the [`Dispatcher`] one at a
/// time and sends the replies back.
///
/// ```text
/// ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
/// │  ChatTransport  │───→│   Dispatcher    │───→│  Ledger/Store   │
/// └─────────────────┘    └─────────────────┘    └─────────────────┘
///          ↑                      │
///          └────── Outbound ──────┘
/// ```
///
/// Failures are contained per event: a reply that cannot be delivered is logged and the
/// loop moves on; a failed poll is retried after `retry_delay`. The loop ends on
/// Ctrl-C or when the transport reports [`TransportError::Closed`].
pub struct BotServer<S, T> {
    dispatcher: Dispatcher<S>,
    transport: T,
    retry_delay: Duration,
    handled: u64,
}

impl<S: RecordStore, T: ChatTransport> BotServer<S, T> {
    pub fn new(dispatcher: Dispatcher<S>, transport: T) -> Self {
        Self {
            dispatcher,
            transport,
            retry_delay: Duration::from_secs(5),
            handled: 0,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of events processed so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Process one event end to end.
    pub async fn handle_event(&mut self, event: InboundEvent) {
        if let InboundEvent::Callback { query_id, .. } = &event {
            if let Err(e) = self.transport.acknowledge(query_id).await {
                warn!("Failed to acknowledge callback {}: {}", query_id, e);
            }
        }
        if let Some(outbound) = self.dispatcher.handle(&event) {
            if let Err(e) = self.transport.deliver(&outbound).await {
                warn!("Failed to deliver reply to chat {}: {}", outbound.chat_id(), e);
            }
        }
        self.handled += 1;
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Bot server loop started");
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        loop {
            let batch = tokio::select! {
                batch = self.transport.next_events() => batch,
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            };
            match batch {
                Ok(events) => {
                    if !events.is_empty() {
                        debug!("Received {} event(s)", events.len());
                    }
                    for event in events {
                        self.handle_event(event).await;
                    }
                }
                Err(TransportError::Closed) => {
                    info!("Transport closed");
                    break;
                }
                Err(e) => {
                    warn!("Polling failed: {} (retrying in {:?})", e, self.retry_delay);
                    sleep(self.retry_delay).await;
                }
            }
        }
        info!("Bot server stopped after {} event(s)", self.handled);
        Ok(())
    }
}
