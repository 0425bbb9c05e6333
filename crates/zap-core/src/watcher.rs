//! Group watcher ("monitorar"): auto-reply to one sender inside one group.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    domain::{Jid, MonitorConfig},
    messaging::{
        bus::{EventBus, SubscriptionId},
        port::SessionClient,
        types::{InboundEvent, TextMessage},
    },
    supervisor::TaskSupervisor,
    Error, Result,
};

/// A live subscription. Replies go to the group, not to the sender.
pub struct GroupWatcher {
    config: MonitorConfig,
    bus: Arc<EventBus>,
    subscription: SubscriptionId,
}

impl GroupWatcher {
    /// Validate `config` and subscribe to `bus`.
    ///
    /// An unparsable address or a group id outside the group server is logged
    /// and returned as an error; nothing is subscribed in that case.
    pub fn start(
        bus: Arc<EventBus>,
        client: Arc<dyn SessionClient>,
        supervisor: TaskSupervisor,
        config: MonitorConfig,
    ) -> Result<Self> {
        let (target, group) = match parse_targets(&config) {
            Ok(v) => v,
            Err(e) => {
                error!(
                    user = %config.target_user,
                    group = %config.group,
                    "watcher not started: {e}"
                );
                return Err(e);
            }
        };

        let reply = config.reply.clone();
        let subscription = bus.subscribe(move |event| {
            let InboundEvent::TextMessage(msg) = event else {
                return;
            };
            if !is_match(&target, &group, msg) {
                return;
            }
            info!(group = %group, sender = %msg.sender, body = %msg.body, "message from watched user");

            let client = client.clone();
            let group = group.clone();
            let reply = reply.clone();
            supervisor.spawn("watcher-reply", async move {
                match client.send_text(&group, &reply).await {
                    Ok(()) => {
                        info!(group = %group, "auto-reply sent");
                        Ok(())
                    }
                    Err(e) => {
                        error!(group = %group, "auto-reply failed: {e}");
                        Err(e)
                    }
                }
            });
        });

        info!(user = %config.target_user, group = %config.group, "watcher started");
        Ok(Self {
            config,
            bus,
            subscription,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Unsubscribe. Replies already spawned still run to completion.
    pub fn stop(self) {
        if self.bus.unsubscribe(self.subscription) {
            info!(user = %self.config.target_user, group = %self.config.group, "watcher stopped");
        }
    }
}

fn parse_targets(config: &MonitorConfig) -> Result<(Jid, Jid)> {
    let target = Jid::parse(&config.target_user)?;
    let group = Jid::parse(&config.group)?;
    if !group.is_group() {
        return Err(Error::NotAGroup(config.group.clone()));
    }
    Ok((target, group))
}

fn is_match(target: &Jid, group: &Jid, msg: &TextMessage) -> bool {
    msg.chat == *group && msg.sender == *target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClient;
    use tokio_util::sync::CancellationToken;

    fn config(group: &str) -> MonitorConfig {
        MonitorConfig {
            target_user: "551199@s.whatsapp.net".to_string(),
            group: group.to_string(),
            reply: "pong".to_string(),
        }
    }

    fn message(sender: &str, chat: &str) -> InboundEvent {
        InboundEvent::TextMessage(TextMessage {
            sender: Jid::parse(sender).unwrap(),
            chat: Jid::parse(chat).unwrap(),
            is_group: true,
            body: "ping".to_string(),
        })
    }

    fn harness() -> (Arc<EventBus>, Arc<RecordingClient>, TaskSupervisor) {
        (
            Arc::new(EventBus::new()),
            Arc::new(RecordingClient::new()),
            TaskSupervisor::new(8, CancellationToken::new()),
        )
    }

    #[tokio::test]
    async fn matching_event_triggers_one_reply_to_group() {
        let (bus, client, sup) = harness();
        let _w = GroupWatcher::start(bus.clone(), client.clone(), sup.clone(), config("123@g.us"))
            .unwrap();

        bus.publish(&message("551199@s.whatsapp.net", "123@g.us"));
        sup.drain().await;

        assert_eq!(
            client.sent(),
            vec![("123@g.us".to_string(), "pong".to_string())]
        );
    }

    #[tokio::test]
    async fn other_sender_or_other_chat_is_ignored() {
        let (bus, client, sup) = harness();
        let _w = GroupWatcher::start(bus.clone(), client.clone(), sup.clone(), config("123@g.us"))
            .unwrap();

        bus.publish(&message("999@s.whatsapp.net", "123@g.us"));
        bus.publish(&message("551199@s.whatsapp.net", "456@g.us"));
        bus.publish(&InboundEvent::Connected);
        sup.drain().await;

        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn non_group_address_never_subscribes() {
        let (bus, client, sup) = harness();

        let err = GroupWatcher::start(
            bus.clone(),
            client.clone(),
            sup.clone(),
            config("5511@s.whatsapp.net"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::NotAGroup(_)));

        let err = GroupWatcher::start(bus.clone(), client, sup, config("not-an-address"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidJid(_)));

        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn independent_watchers_each_reply() {
        let (bus, client, sup) = harness();
        let a = GroupWatcher::start(bus.clone(), client.clone(), sup.clone(), config("123@g.us"))
            .unwrap();
        let _b = GroupWatcher::start(bus.clone(), client.clone(), sup.clone(), config("123@g.us"))
            .unwrap();

        bus.publish(&message("551199@s.whatsapp.net", "123@g.us"));
        sup.drain().await;
        assert_eq!(client.calls(), 2);

        a.stop();
        bus.publish(&message("551199@s.whatsapp.net", "123@g.us"));
        sup.drain().await;
        assert_eq!(client.calls(), 3);
    }
}
