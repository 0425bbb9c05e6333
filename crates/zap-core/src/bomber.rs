//! Repeat sender ("bomba").

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    console::Console,
    domain::{Jid, SendOutcome},
    messaging::port::SessionClient,
};

/// Floor for the spacing between two sends.
pub const MIN_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct BombRequest {
    pub recipient: Jid,
    pub text: String,
    /// Number of sends; 0 means until cancelled.
    pub count: u64,
    pub delay_ms: u64,
}

pub fn clamp_delay(delay_ms: u64) -> Duration {
    Duration::from_millis(delay_ms).max(MIN_DELAY)
}

/// Send `req.text` to `req.recipient` `req.count` times (or until cancelled).
///
/// Failures are reported and counted but never stop the run. `cancel` is
/// checked before every attempt and raced against every sleep.
pub async fn run(
    client: Arc<dyn SessionClient>,
    req: BombRequest,
    console: Console,
    cancel: CancellationToken,
) -> SendOutcome {
    let delay = clamp_delay(req.delay_ms);
    let mut outcome = SendOutcome::default();

    console.line(format!("Starting to send messages to {}", req.recipient));
    info!(
        recipient = %req.recipient,
        count = req.count,
        delay_ms = delay.as_millis() as u64,
        "bomb started"
    );

    while req.count == 0 || outcome.attempted < req.count {
        if cancel.is_cancelled() {
            break;
        }

        let n = outcome.attempted + 1;
        match client.send_text(&req.recipient, &req.text).await {
            Ok(()) => {
                outcome.succeeded += 1;
                console.line(format!("Message #{n} sent"));
            }
            Err(e) => {
                outcome.failed += 1;
                console.line(format!("Error sending message #{n}: {e}"));
            }
        }
        outcome.attempted += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(recipient = %req.recipient, "bomb cancelled during delay");
                break;
            }
            _ = sleep(delay) => {}
        }
    }

    console.line(format!(
        "\nSend summary for {}:\n- Attempted: {}\n- Sent: {}\n- Failed: {}",
        req.recipient, outcome.attempted, outcome.succeeded, outcome.failed
    ));
    info!(
        recipient = %req.recipient,
        attempted = outcome.attempted,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "bomb finished"
    );

    outcome
}
