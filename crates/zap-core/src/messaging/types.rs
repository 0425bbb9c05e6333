use crate::domain::Jid;

/// Events published by the session client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    TextMessage(TextMessage),
    Connected,
    Disconnected,
    LoggedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub sender: Jid,
    pub chat: Jid,
    pub is_group: bool,
    pub body: String,
}
