//! Test doubles shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::Jid,
    messaging::{bus::EventBus, port::SessionClient},
    Error, Result,
};

/// Session client that records every send instead of talking to a server.
#[derive(Default)]
pub struct RecordingClient {
    sent: Mutex<Vec<(String, String)>>,
    calls: AtomicU64,
    /// Every n-th call (1-based) fails.
    fail_every: Option<u64>,
    /// Cancel the token once this many calls have been made.
    cancel_after: Option<(u64, CancellationToken)>,
    closed: AtomicBool,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_every(n: u64) -> Self {
        Self {
            fail_every: Some(n),
            ..Self::default()
        }
    }

    pub fn cancelling_after(n: u64, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((n, token)),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionClient for RecordingClient {
    async fn connect(&self, _events: Arc<EventBus>) -> Result<()> {
        Ok(())
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if n >= *limit {
                token.cancel();
            }
        }
        if let Some(every) = self.fail_every {
            if n % every == 0 {
                return Err(Error::Send(format!("call {n} rejected")));
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
