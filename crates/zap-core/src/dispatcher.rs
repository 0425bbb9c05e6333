//! Line-oriented operator commands.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    bomber::{self, BombRequest},
    console::Console,
    domain::{normalize_jid, MonitorConfig},
    messaging::{bus::EventBus, outbound, port::SessionClient, types::InboundEvent},
    supervisor::TaskSupervisor,
    watcher::GroupWatcher,
};

pub const HELP: &str = "\
Available commands:
- enviar <number> <message>
- bomba <number> <message> <count> <delay_ms>
- monitorar <user_number> <group_id> <reply>
- listar_monitores
- sair";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Send {
        to: String,
        text: String,
    },
    Bomb {
        to: String,
        text: String,
        count: u64,
        delay_ms: u64,
    },
    Monitor {
        user: String,
        group: String,
        reply: String,
    },
    ListMonitors,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid format. Use: {0}")]
    Usage(&'static str),

    #[error("invalid count: {0:?}")]
    InvalidCount(String),

    #[error("invalid delay: {0:?}")]
    InvalidDelay(String),

    #[error("unrecognized command")]
    Unknown,
}

const SEND_USAGE: &str = "enviar <number> <message>";
const BOMB_USAGE: &str = "bomba <number> <message> <count> <delay_ms>";
const MONITOR_USAGE: &str = "monitorar <user_number> <group_id> <reply>";

/// Parse one non-blank input line. Ids are returned as typed (not normalized).
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (line, ""),
    };

    match keyword {
        "enviar" => {
            let (to, text) = split_first(rest).ok_or(CommandError::Usage(SEND_USAGE))?;
            Ok(Command::Send {
                to: to.to_string(),
                text: text.to_string(),
            })
        }
        "bomba" => {
            // <to> <text...> <count> <delay>: the message keeps its own spacing.
            let (to, tail) = split_first(rest).ok_or(CommandError::Usage(BOMB_USAGE))?;
            let (head, delay) = split_last(tail).ok_or(CommandError::Usage(BOMB_USAGE))?;
            let (text, count) = split_last(head).ok_or(CommandError::Usage(BOMB_USAGE))?;
            let count = count
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidCount(count.to_string()))?;
            let delay_ms = delay
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidDelay(delay.to_string()))?;
            Ok(Command::Bomb {
                to: to.to_string(),
                text: text.to_string(),
                count,
                delay_ms,
            })
        }
        "monitorar" => {
            let (user, rest) = split_first(rest).ok_or(CommandError::Usage(MONITOR_USAGE))?;
            let (group, reply) = split_first(rest).ok_or(CommandError::Usage(MONITOR_USAGE))?;
            Ok(Command::Monitor {
                user: user.to_string(),
                group: group.to_string(),
                reply: reply.to_string(),
            })
        }
        "listar_monitores" if rest.is_empty() => Ok(Command::ListMonitors),
        "sair" if rest.is_empty() => Ok(Command::Quit),
        _ => Err(CommandError::Unknown),
    }
}

/// `"a b c"` -> `("a", "b c")`; `None` unless both parts are non-empty.
fn split_first(s: &str) -> Option<(&str, &str)> {
    let (head, tail) = s.split_once(char::is_whitespace)?;
    let tail = tail.trim();
    if head.is_empty() || tail.is_empty() {
        return None;
    }
    Some((head, tail))
}

/// `"a b c"` -> `("a b", "c")`; `None` unless both parts are non-empty.
fn split_last(s: &str) -> Option<(&str, &str)> {
    let (head, last) = s.rsplit_once(char::is_whitespace)?;
    let head = head.trim();
    if head.is_empty() || last.is_empty() {
        return None;
    }
    Some((head, last))
}

/// A registered `monitorar` rule. Inactive entries failed validation and
/// never subscribed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorEntry {
    pub config: MonitorConfig,
    pub active: bool,
}

/// Reads operator commands and launches bombers and watchers.
///
/// The monitor list and watcher handles are owned by this task alone.
pub struct Dispatcher {
    client: Arc<dyn SessionClient>,
    bus: Arc<EventBus>,
    supervisor: TaskSupervisor,
    console: Console,
    cancel: CancellationToken,
    monitors: Vec<MonitorEntry>,
    watchers: Vec<GroupWatcher>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn SessionClient>,
        bus: Arc<EventBus>,
        supervisor: TaskSupervisor,
        console: Console,
    ) -> Self {
        let cancel = supervisor.cancel_token();
        Self {
            client,
            bus,
            supervisor,
            console,
            cancel,
            monitors: Vec::new(),
            watchers: Vec::new(),
        }
    }

    pub fn monitors(&self) -> &[MonitorEntry] {
        &self.monitors
    }

    /// Process lines until `sair`, end of input, or shutdown. Any of the three
    /// cancels the root token. Watchers are unsubscribed on the way out.
    pub async fn run(mut self, mut lines: mpsc::Receiver<String>) {
        self.console.line(format!("\n{HELP}"));

        loop {
            let line = tokio::select! {
              _ = self.cancel.cancelled() => break,
              line = lines.recv() => line,
            };
            let Some(line) = line else {
                debug!("input closed");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            if !self.handle_line(&line).await {
                break;
            }
        }

        self.cancel.cancel();
        for watcher in self.watchers.drain(..) {
            watcher.stop();
        }
    }

    /// Returns `false` when the loop should stop.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        match parse_command(line) {
            Ok(Command::Quit) => {
                info!("quit requested");
                return false;
            }
            Ok(cmd) => self.execute(cmd).await,
            Err(CommandError::Unknown) => {
                self.console.line(format!("Unrecognized command. {HELP}"));
            }
            Err(e) => self.console.line(e.to_string()),
        }
        true
    }

    async fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Send { to, text } => {
                let to = normalize_jid(&to);
                match outbound::send_text(self.client.as_ref(), &to, &text).await {
                    Ok(()) => self.console.line("Message sent"),
                    Err(e) => self.console.line(format!("Error sending message: {e}")),
                }
            }
            Command::Bomb {
                to,
                text,
                count,
                delay_ms,
            } => self.start_bomb(to, text, count, delay_ms),
            Command::Monitor { user, group, reply } => self.start_monitor(user, group, reply),
            Command::ListMonitors => self.list_monitors(),
            Command::Quit => {}
        }
    }

    fn start_bomb(&self, to: String, text: String, count: u64, delay_ms: u64) {
        let to = normalize_jid(&to);
        let recipient = match outbound::resolve_recipient(&to) {
            Ok(jid) => jid,
            Err(e) => {
                self.console.line(format!("Error: {e}"));
                return;
            }
        };

        let amount = if count == 0 {
            "unlimited".to_string()
        } else {
            count.to_string()
        };
        self.console.line(format!(
            "Sending {amount} messages to {recipient} every {}ms",
            bomber::clamp_delay(delay_ms).as_millis()
        ));

        let req = BombRequest {
            recipient,
            text,
            count,
            delay_ms,
        };
        let client = self.client.clone();
        let console = self.console.clone();
        let cancel = self.cancel.child_token();
        let started = self.supervisor.spawn_long_running("bomb", async move {
            bomber::run(client, req, console, cancel).await;
            Ok(())
        });
        if !started {
            warn!("bomb not started: shutting down");
        }
    }

    fn start_monitor(&mut self, user: String, group: String, reply: String) {
        let config = MonitorConfig {
            target_user: normalize_jid(&user),
            group,
            reply,
        };
        let started = GroupWatcher::start(
            self.bus.clone(),
            self.client.clone(),
            self.supervisor.clone(),
            config.clone(),
        );
        self.monitors.push(MonitorEntry {
            config,
            active: started.is_ok(),
        });

        match started {
            Ok(watcher) => {
                let c = watcher.config();
                self.console.line(format!(
                    "Monitoring started for user {} in group {}",
                    c.target_user, c.group
                ));
                self.watchers.push(watcher);
            }
            Err(e) => self.console.line(format!("Monitor not started: {e}")),
        }
    }

    fn list_monitors(&self) {
        if self.monitors.is_empty() {
            self.console.line("No monitors registered.");
            return;
        }
        let mut out = String::from("\nMonitors:");
        for (i, entry) in self.monitors.iter().enumerate() {
            let m = &entry.config;
            out.push_str(&format!(
                "\n{}. User: {} | Group: {} | Reply: {}",
                i + 1,
                m.target_user,
                m.group,
                m.reply
            ));
            if !entry.active {
                out.push_str(" (inactive)");
            }
        }
        self.console.line(out);
    }
}

/// Base bus handler: echo inbound traffic and connection changes to the operator.
pub fn inbound_logger(console: Console) -> impl Fn(&InboundEvent) + Send + Sync + 'static {
    move |event| match event {
        InboundEvent::TextMessage(msg) if msg.is_group => {
            console.line(format!("Message from group ({}): {}", msg.chat, msg.body));
        }
        InboundEvent::TextMessage(msg) => {
            console.line(format!("Message from {}: {}", msg.sender, msg.body));
        }
        InboundEvent::Connected => console.line("Connection established"),
        InboundEvent::Disconnected => console.line("Disconnected from WhatsApp"),
        InboundEvent::LoggedOut => console.line("Session logged out, new pairing required"),
    }
}
