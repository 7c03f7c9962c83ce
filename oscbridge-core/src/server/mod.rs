//! src/server/mod.rs
//!
//! The UDP OSC listener. Binds a socket, runs the receive loop on a
//! dedicated worker thread, decodes each datagram with `rosc` and hands the
//! result to the dispatcher. Start and stop are safe to call repeatedly.

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, trace};

use oscbridge_common::error::{Error, Result};
use oscbridge_common::models::osc::OscMessage;

/// How often the receive loop wakes up to re-check the shutdown flag.
/// Also bounds how long `stop` blocks on the join.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(500);

const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Routes decoded messages to a handler. This bridge installs exactly one
/// default handler that forwards everything to the event bus.
pub struct OscDispatcher {
    default_handler: Option<Box<dyn Fn(OscMessage) + Send + Sync>>,
}

impl OscDispatcher {
    pub fn new() -> OscDispatcher {
        OscDispatcher {
            default_handler: None,
        }
    }

    pub fn set_default_handler(&mut self, handler: impl Fn(OscMessage) + Send + Sync + 'static) {
        self.default_handler = Some(Box::new(handler));
    }

    /// Invoked synchronously on the listener thread, so the handler must
    /// only hand the message off, never do further decoding work.
    pub fn dispatch(&self, msg: OscMessage) {
        match &self.default_handler {
            Some(handler) => handler(msg),
            None => trace!("no default handler installed, dropping message to {}", msg.address),
        }
    }
}

/// A UDP OSC server running its receive loop on a background thread.
///
/// `socket` and `thread` are populated together by `start` and cleared
/// together by `stop`; a failed `start` leaves both empty. The worker never
/// keeps the process alive, and dropping the server performs a best-effort
/// `stop` for owners that forget the explicit call.
pub struct OscUdpServer {
    dispatcher: Arc<OscDispatcher>,
    socket: Option<UdpSocket>,
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl OscUdpServer {
    pub fn new(dispatcher: OscDispatcher) -> OscUdpServer {
        OscUdpServer {
            dispatcher: Arc::new(dispatcher),
            socket: None,
            thread: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True iff the worker thread exists and is still alive.
    pub fn running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the server on `addr:port`. Does nothing if already running.
    /// Returns the post-attempt running state.
    pub fn start(&mut self, addr: &str, port: u16) -> bool {
        if self.running() {
            info!("OSC server already running");
            return true;
        }
        info!("starting OSC server on {addr}:{port}");
        if let Err(e) = self.bind_and_spawn(addr, port) {
            error!("error starting OSC server: {e}");
            self.socket = None;
            self.thread = None;
        }
        self.running()
    }

    fn bind_and_spawn(&mut self, addr: &str, port: u16) -> Result<()> {
        let socket = UdpSocket::bind((addr, port))?;
        socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        let worker_socket = socket.try_clone()?;

        self.shutdown.store(false, Ordering::SeqCst);
        let shutdown = Arc::clone(&self.shutdown);
        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = thread::Builder::new()
            .name("osc-udp-server".to_string())
            .spawn(move || recv_loop(worker_socket, dispatcher, shutdown))?;

        self.socket = Some(socket);
        self.thread = Some(handle);
        Ok(())
    }

    /// Stop the server and join the worker thread. Does nothing if not
    /// running. Once this returns, no further handler invocations occur.
    /// Returns the post-stop running state (`false` on success).
    pub fn stop(&mut self) -> bool {
        if !self.running() {
            info!("OSC server not running");
            return false;
        }
        info!("stopping OSC server");
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("OSC server worker thread panicked during shutdown");
            }
        }
        self.socket = None;
        self.running()
    }
}

impl Drop for OscUdpServer {
    fn drop(&mut self) {
        if self.running() {
            self.stop();
        }
    }
}

fn recv_loop(socket: UdpSocket, dispatcher: Arc<OscDispatcher>, shutdown: Arc<AtomicBool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => match decode_datagram(&buf[..len]) {
                Ok(Some(msg)) => dispatcher.dispatch(msg),
                Ok(None) => debug!("ignoring OSC bundle from {peer}"),
                Err(e) => debug!("dropping datagram from {peer}: {e}"),
            },
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                // Receive timeout; loop around and re-check the flag.
                continue;
            }
            Err(e) => {
                error!("OSC receive error: {e}");
                break;
            }
        }
    }
}

/// Decode one datagram into a message, or `None` for bundle packets, which
/// the bridge does not support.
fn decode_datagram(buf: &[u8]) -> Result<Option<OscMessage>> {
    let (_remainder, packet) =
        rosc::decoder::decode_udp(buf).map_err(|e| Error::Decode(format!("{e:?}")))?;
    match packet {
        rosc::OscPacket::Message(msg) => Ok(Some(OscMessage::from_rosc(msg)?)),
        rosc::OscPacket::Bundle(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscbridge_common::models::osc::OscArg;

    #[test]
    fn decodes_a_message_datagram() {
        let packet = rosc::OscPacket::Message(rosc::OscMessage {
            addr: "/filter".to_string(),
            args: vec![rosc::OscType::Float(0.25)],
        });
        let buf = rosc::encoder::encode(&packet).unwrap();
        let msg = decode_datagram(&buf).unwrap().unwrap();
        assert_eq!(msg.address, "/filter");
        assert_eq!(msg.args, vec![OscArg::Float(0.25)]);
    }

    #[test]
    fn malformed_datagrams_are_an_error() {
        let err = decode_datagram(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn dispatch_without_handler_drops_the_message() {
        let dispatcher = OscDispatcher::new();
        dispatcher.dispatch(OscMessage::new("/dropped", vec![]));
    }
}
