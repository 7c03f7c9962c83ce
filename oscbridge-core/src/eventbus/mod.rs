//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that decouples the network listener
//! thread from its consumers via one FIFO queue per subscriber. Publishing
//! never blocks; each subscriber drains its own queue at its own pace.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info};

use oscbridge_common::models::osc::OscMessage;

/// Identifies the kind of event a subscriber is interested in. The bridge
/// registers a single kind, but the bus delivers strictly by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OscMessage,
}

/// Event payloads carried by the bus.
#[derive(Debug, Clone)]
pub enum BusEvent {
    OscMessage(OscMessage),
}

impl BusEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BusEvent::OscMessage(_) => EventKind::OscMessage,
        }
    }
}

type EventCallback = Box<dyn FnMut(&BusEvent) + Send>;

struct SubscriberSlot {
    id: u64,
    kind: EventKind,
    tx: Sender<BusEvent>,
}

/// The shared publish/subscribe channel.
///
/// Construct one per process, own it explicitly, and pass a handle to
/// whoever needs it; `shutdown` releases every registered subscriber.
pub struct EventBus {
    slots: Arc<Mutex<Vec<SubscriberSlot>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus {
            slots: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for events of `kind`. The callback is never
    /// invoked from `publish`; it runs when the returned subscription is
    /// pumped on the subscriber's own context.
    pub fn subscribe(
        &self,
        kind: EventKind,
        callback: impl FnMut(&BusEvent) + Send + 'static,
    ) -> Subscription {
        let (tx, rx) = unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots.lock().unwrap().push(SubscriberSlot { id, kind, tx });
        debug!("event bus subscriber {id} registered for {kind:?}");
        Subscription {
            id,
            rx,
            callback: Box::new(callback),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Enqueue `event` for every subscriber registered for its kind.
    ///
    /// The senders are cloned outside the lock so a slow consumer can never
    /// stall the publisher; unbounded queues make the send itself
    /// non-blocking.
    pub fn publish(&self, event: BusEvent) {
        let kind = event.kind();
        let senders: Vec<(u64, Sender<BusEvent>)> = {
            let slots = self.slots.lock().unwrap();
            slots
                .iter()
                .filter(|slot| slot.kind == kind)
                .map(|slot| (slot.id, slot.tx.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, tx) in senders {
            if tx.send(event.clone()).is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut slots = self.slots.lock().unwrap();
            slots.retain(|slot| !dead.contains(&slot.id));
        }
    }

    /// Remove a registration. Queued events that were never pumped are
    /// dropped with the token; the callback cannot fire again afterwards.
    pub fn unsubscribe(&self, subscription: Subscription) {
        debug!("event bus subscriber {} unsubscribed", subscription.id);
        drop(subscription);
    }

    /// Release every subscriber. Later publishes deliver to no one.
    pub fn shutdown(&self) {
        let mut slots = self.slots.lock().unwrap();
        info!("event bus shutdown, releasing {} subscriber(s)", slots.len());
        slots.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// A live registration on the bus. No two subscriptions share an id, and
/// dropping one deregisters it.
pub struct Subscription {
    id: u64,
    rx: Receiver<BusEvent>,
    callback: EventCallback,
    slots: Arc<Mutex<Vec<SubscriberSlot>>>,
}

impl Subscription {
    /// Drain this subscriber's queue, invoking the callback once per queued
    /// event in publish order. Returns how many events were processed.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            (self.callback)(&event);
            count += 1;
        }
        count
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.retain(|slot| slot.id != self.id);
        }
    }
}
