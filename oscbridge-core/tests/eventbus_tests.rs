//! tests/eventbus_tests.rs

use std::sync::{Arc, Mutex};

use oscbridge_common::models::osc::{OscArg, OscMessage};
use oscbridge_core::eventbus::{BusEvent, EventBus, EventKind, Subscription};

fn osc_event(address: &str, value: f64) -> BusEvent {
    BusEvent::OscMessage(OscMessage::new(address, vec![OscArg::Float(value)]))
}

fn collecting_subscriber(bus: &EventBus) -> (Subscription, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = bus.subscribe(EventKind::OscMessage, move |event| {
        let BusEvent::OscMessage(msg) = event;
        sink.lock().unwrap().push(msg.address.clone());
    });
    (sub, seen)
}

#[test]
fn delivery_is_fifo_per_subscriber() {
    let bus = EventBus::new();
    let (mut sub, seen) = collecting_subscriber(&bus);

    bus.publish(osc_event("/m1", 1.0));
    bus.publish(osc_event("/m2", 2.0));
    bus.publish(osc_event("/m3", 3.0));

    assert_eq!(sub.pump(), 3);
    assert_eq!(*seen.lock().unwrap(), vec!["/m1", "/m2", "/m3"]);
}

#[test]
fn every_subscriber_sees_every_event() {
    let bus = EventBus::new();
    let (mut first, first_seen) = collecting_subscriber(&bus);
    let (mut second, second_seen) = collecting_subscriber(&bus);

    bus.publish(osc_event("/a", 0.0));
    bus.publish(osc_event("/b", 0.0));

    assert_eq!(first.pump(), 2);
    assert_eq!(second.pump(), 2);
    assert_eq!(*first_seen.lock().unwrap(), vec!["/a", "/b"]);
    assert_eq!(*second_seen.lock().unwrap(), vec!["/a", "/b"]);
}

#[test]
fn unsubscribed_tokens_never_fire_again() {
    let bus = EventBus::new();
    let (first, first_seen) = collecting_subscriber(&bus);
    let (mut second, second_seen) = collecting_subscriber(&bus);
    assert_eq!(bus.subscriber_count(), 2);

    // An event is already queued for `first` when it unsubscribes.
    bus.publish(osc_event("/queued", 0.0));
    bus.unsubscribe(first);
    assert_eq!(bus.subscriber_count(), 1);

    bus.publish(osc_event("/late", 0.0));
    assert_eq!(second.pump(), 2);
    assert!(first_seen.lock().unwrap().is_empty());
    assert_eq!(*second_seen.lock().unwrap(), vec!["/queued", "/late"]);
}

#[test]
fn shutdown_releases_every_subscriber() {
    let bus = EventBus::new();
    let (mut sub, seen) = collecting_subscriber(&bus);
    let (_other, _) = collecting_subscriber(&bus);
    assert_eq!(bus.subscriber_count(), 2);

    bus.shutdown();
    assert_eq!(bus.subscriber_count(), 0);

    bus.publish(osc_event("/after", 0.0));
    assert_eq!(sub.pump(), 0);
    assert!(seen.lock().unwrap().is_empty());
}
