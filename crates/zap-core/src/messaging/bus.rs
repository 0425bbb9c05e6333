use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use crate::messaging::types::InboundEvent;

pub type EventHandler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Fan-out registry for inbound events.
///
/// The session client publishes; every subscribed handler sees every event,
/// in subscription order. Handlers run on the publisher's task and must not
/// block: anything slow (sending a reply) belongs in a spawned task.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: RwLock<BTreeMap<SubscriptionId, EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        handler: impl Fn(&InboundEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut map = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        map.insert(id, Arc::new(handler));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut map = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&id).is_some()
    }

    /// Deliver `event` to every handler; returns how many were invoked.
    pub fn publish(&self, event: &InboundEvent) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<EventHandler> = {
            let map = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
