//! src/service.rs
//!
//! Host-lifecycle wiring: owns the event bus and the UDP server, and
//! installs the one default handler that publishes every decoded message.

use std::sync::Arc;

use tracing::trace;

use crate::eventbus::{BusEvent, EventBus};
use crate::server::{OscDispatcher, OscUdpServer};

/// The bridge as a whole. Construct on host startup, call `shutdown` on
/// host teardown.
pub struct OscService {
    bus: Arc<EventBus>,
    server: OscUdpServer,
}

impl OscService {
    pub fn new() -> OscService {
        let bus = Arc::new(EventBus::new());
        let server = build_server(Arc::clone(&bus));
        OscService { bus, server }
    }

    /// Handle to the shared bus, for registering consumers.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn start(&mut self, addr: &str, port: u16) -> bool {
        self.server.start(addr, port)
    }

    pub fn stop(&mut self) -> bool {
        self.server.stop()
    }

    pub fn running(&self) -> bool {
        self.server.running()
    }

    /// Stop the listener and release every bus subscription.
    pub fn shutdown(&mut self) {
        self.server.stop();
        self.bus.shutdown();
    }
}

fn build_server(bus: Arc<EventBus>) -> OscUdpServer {
    let mut dispatcher = OscDispatcher::new();
    dispatcher.set_default_handler(move |msg| {
        trace!("OSC message: [{}, {:?}]", msg.address, msg.args);
        bus.publish(BusEvent::OscMessage(msg));
    });
    OscUdpServer::new(dispatcher)
}
