use std::sync::Arc;

use async_trait::async_trait;

use crate::{domain::Jid, messaging::bus::EventBus, Result};

/// Port for the authenticated chat session.
///
/// Adapters own pairing, session resumption and wire encoding. Implementations
/// must be safe to share across tasks: the dispatcher, every bomber, every
/// watcher reply and the daily scheduler all call into the same client.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Pair or resume the session, then start publishing inbound events to `events`.
    async fn connect(&self, events: Arc<EventBus>) -> Result<()>;

    async fn send_text(&self, to: &Jid, text: &str) -> Result<()>;

    /// Stop event delivery and release the connection. Best-effort.
    async fn close(&self);
}
