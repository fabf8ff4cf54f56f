use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EventsConfig;
use crate::model::{Envelope, EventKind, NotificationCategory};

/// Identifies one subscription of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub player_id: Uuid,
    id: u64,
}

type SubscriberIndex = HashMap<Uuid, HashMap<u64, mpsc::Sender<Envelope>>>;

/// Per-player fan-out of game events.
///
/// Each subscription owns a bounded queue; the bus holds the sending end.
/// Delivery never waits: a full or closed queue removes the subscriber.
pub struct EventBus {
    subscribers: RwLock<SubscriberIndex>,
    next_id: AtomicU64,
    buffer: usize,
    heartbeat: Duration,
    clock: Arc<dyn Clock>,
}

impl EventBus {
    pub fn new(config: &EventsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: config.subscriber_buffer.max(1),
            heartbeat: config.heartbeat(),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SubscriberIndex> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubscriberIndex> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a subscription. The `connected` event is already queued when this
    /// returns, and a heartbeat task probes the queue every period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(self: &Arc<Self>, player_id: Uuid) -> Subscription {
        let handle = SubscriptionHandle {
            player_id,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let (tx, rx) = mpsc::channel(self.buffer);
        let connected = Envelope::new(
            EventKind::Connected,
            json!({ "playerId": player_id, "timestamp": self.clock.now().to_rfc3339() }),
        );
        // Fresh queue with capacity >= 1.
        let _ = tx.try_send(connected);
        self.write().entry(player_id).or_default().insert(handle.id, tx);
        tracing::debug!(player_id = %player_id, subscription = handle.id, "subscriber added");

        let heartbeat = tokio::spawn(run_heartbeat(Arc::downgrade(self), handle, self.heartbeat));
        Subscription {
            handle,
            rx,
            bus: Arc::downgrade(self),
            heartbeat: Some(heartbeat),
        }
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut index = self.write();
        let Some(subs) = index.get_mut(&handle.player_id) else {
            return false;
        };
        let removed = subs.remove(&handle.id).is_some();
        if subs.is_empty() {
            index.remove(&handle.player_id);
        }
        removed
    }

    /// Deliver to every subscription of one player. Returns how many accepted it.
    pub fn publish_player(&self, player_id: Uuid, kind: EventKind, payload: Value) -> usize {
        let envelope = Envelope::new(kind, payload);
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let index = self.read();
            if let Some(subs) = index.get(&player_id) {
                for (id, tx) in subs {
                    if tx.try_send(envelope.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        failed.push(SubscriptionHandle { player_id, id: *id });
                    }
                }
            }
        }
        self.drop_failed(&failed, kind);
        delivered
    }

    /// Deliver to every subscription of every player.
    pub fn publish_all(&self, kind: EventKind, payload: Value) -> usize {
        let envelope = Envelope::new(kind, payload);
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let index = self.read();
            for (player_id, subs) in index.iter() {
                for (id, tx) in subs {
                    if tx.try_send(envelope.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        failed.push(SubscriptionHandle {
                            player_id: *player_id,
                            id: *id,
                        });
                    }
                }
            }
        }
        self.drop_failed(&failed, kind);
        delivered
    }

    /// Publish a `notification` event with a category and a human message.
    pub fn notify(
        &self,
        player_id: Uuid,
        category: NotificationCategory,
        title: &str,
        message: &str,
    ) -> usize {
        let payload = json!({
            "category": category,
            "title": title,
            "message": message,
            "timestamp": self.clock.now().to_rfc3339(),
        });
        self.publish_player(player_id, EventKind::Notification, payload)
    }

    fn drop_failed(&self, failed: &[SubscriptionHandle], kind: EventKind) {
        for handle in failed {
            if self.unsubscribe(*handle) {
                tracing::warn!(
                    player_id = %handle.player_id,
                    subscription = handle.id,
                    event = %kind,
                    "delivery failed, subscriber dropped"
                );
            }
        }
    }

    /// Queue a heartbeat on one subscription. False once the subscription is gone.
    fn probe(&self, handle: SubscriptionHandle) -> bool {
        let envelope = Envelope::new(
            EventKind::Heartbeat,
            json!({ "timestamp": self.clock.now().to_rfc3339() }),
        );
        let sent = {
            let index = self.read();
            match index.get(&handle.player_id).and_then(|s| s.get(&handle.id)) {
                Some(tx) => tx.try_send(envelope).is_ok(),
                None => return false,
            }
        };
        if !sent {
            self.drop_failed(&[handle], EventKind::Heartbeat);
        }
        sent
    }

    pub fn subscriber_count(&self, player_id: Uuid) -> usize {
        self.read().get(&player_id).map_or(0, HashMap::len)
    }

    pub fn total_subscribers(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }
}

async fn run_heartbeat(bus: Weak<EventBus>, handle: SubscriptionHandle, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let Some(bus) = bus.upgrade() else {
            return;
        };
        if !bus.probe(handle) {
            return;
        }
    }
}

/// Receiving end of one subscription. Dropping it unsubscribes.
pub struct Subscription {
    handle: SubscriptionHandle,
    rx: mpsc::Receiver<Envelope>,
    bus: Weak<EventBus>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Next event, or `None` once the bus has dropped this subscription.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Everything currently queued, without waiting.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = self.rx.try_recv() {
            out.push(env);
        }
        out
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.handle);
        }
    }
}
