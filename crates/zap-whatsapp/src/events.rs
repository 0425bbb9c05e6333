//! Translation from library events to core events, plus the startup handshake.

use std::time::Duration;

use tokio::sync::watch;
use waproto::whatsapp as wa;

use zap_core::{
    domain::Jid,
    errors::Error,
    messaging::types::{InboundEvent, TextMessage},
    Result,
};

/// Connection state as seen during startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Starting,
    Connected,
    LoggedOut,
    PairFailed,
}

/// Wait until the client reports a terminal startup state or `timeout` passes.
pub async fn wait_until_connected(rx: &mut watch::Receiver<Link>, timeout: Duration) -> Result<()> {
    let waited = tokio::time::timeout(timeout, rx.wait_for(|s| *s != Link::Starting)).await;
    let state = match waited {
        Err(_) => {
            return Err(Error::Connect(format!(
                "not connected within {}s (QR not scanned?)",
                timeout.as_secs()
            )))
        }
        Ok(Err(_)) => {
            return Err(Error::Connect(
                "client stopped before connecting".to_string(),
            ))
        }
        Ok(Ok(state)) => *state,
    };

    match state {
        Link::Connected => Ok(()),
        Link::LoggedOut => Err(Error::Connect(
            "session logged out, remove the session store and pair again".to_string(),
        )),
        Link::PairFailed => Err(Error::Connect("pairing failed".to_string())),
        Link::Starting => Err(Error::Connect("still starting".to_string())),
    }
}

/// Drop agent/device parts: `5511:12@s.whatsapp.net` -> `5511@s.whatsapp.net`.
pub fn bare_address(raw: &str) -> String {
    match raw.split_once('@') {
        Some((user, server)) => {
            let user = user.split([':', '.']).next().unwrap_or(user);
            format!("{user}@{server}")
        }
        None => raw.to_string(),
    }
}

/// Plain or extended text body, if the message carries one.
pub fn message_text(msg: &wa::Message) -> Option<String> {
    msg.conversation.clone().or_else(|| {
        msg.extended_text_message
            .as_ref()
            .and_then(|m| m.text.clone())
    })
}

/// `None` when either address does not parse. Non-text messages keep an
/// empty body so watchers still see who spoke.
pub fn text_message(
    msg: &wa::Message,
    chat: &str,
    sender: &str,
    is_group: bool,
) -> Option<InboundEvent> {
    let chat = Jid::parse(&bare_address(chat)).ok()?;
    let sender = Jid::parse(&bare_address(sender)).ok()?;
    Some(InboundEvent::TextMessage(TextMessage {
        sender,
        chat,
        is_group,
        body: message_text(msg).unwrap_or_default(),
    }))
}
