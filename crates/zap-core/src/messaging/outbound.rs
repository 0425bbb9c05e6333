use crate::{domain::Jid, messaging::port::SessionClient, Result};

/// Resolve `recipient` to an address and send one text message.
///
/// A recipient with a server part is parsed as-is; a bare id goes to the
/// default user server. No retries.
pub async fn send_text(client: &dyn SessionClient, recipient: &str, text: &str) -> Result<()> {
    let to = resolve_recipient(recipient)?;
    client.send_text(&to, text).await
}

pub fn resolve_recipient(recipient: &str) -> Result<Jid> {
    if recipient.contains('@') {
        Jid::parse(recipient)
    } else {
        Ok(Jid::user(recipient))
    }
}
