//! src/graph/mod.rs
//!
//! The dataflow-node side of the bridge: a per-node state machine that
//! subscribes to the event bus on its first tick, filters incoming messages
//! against a user-supplied address pattern, keeps only the newest match
//! between ticks, and emits the decoded message as typed outputs.

use std::sync::{Arc, Mutex};

use regex::Regex;
use tracing::warn;

use oscbridge_common::error::{Error, Result};
use oscbridge_common::models::osc::OscMessage;

use crate::eventbus::{BusEvent, EventBus, EventKind, Subscription};

/// Compile a user-supplied address pattern.
pub fn compile_address_pattern(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(pattern)?)
}

/// An address matches when the leftmost regex match starts at the beginning
/// of the address, so patterns behave as prefixes rather than full matches.
fn matches_at_start(pattern: &Regex, address: &str) -> bool {
    pattern.find(address).is_some_and(|m| m.start() == 0)
}

/// The resolved output type of a node, fixed by the first emitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Scalar,
    Tuple(usize),
}

impl OutputShape {
    pub fn from_len(len: usize) -> OutputShape {
        if len == 1 {
            OutputShape::Scalar
        } else {
            OutputShape::Tuple(len)
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            OutputShape::Scalar => 1,
            OutputShape::Tuple(n) => *n,
        }
    }
}

/// The output bundle of a fired node: the matched address plus its float
/// arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutputs {
    pub path: String,
    pub values: Vec<f64>,
}

/// What one evaluation of the node produced. `Fired` doubles as the
/// execution-enabled signal for downstream nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The subscription was established this tick; nothing to output yet.
    Subscribed,
    /// No new matching message arrived since the last tick.
    NoNewData,
    /// A matching message was consumed and decoded into outputs.
    Fired(NodeOutputs),
}

#[derive(Default)]
struct NodeInbox {
    pending: Option<OscMessage>,
    pattern: Option<Regex>,
}

/// Per-node state.
///
/// The inbox is shared with the subscription callback, which only runs
/// while the subscription is pumped inside `tick`, so the two mutators are
/// serialized on the host's context. Bursts of matching messages between
/// ticks coalesce to the newest one.
pub struct OscEventNode {
    inbox: Arc<Mutex<NodeInbox>>,
    subscription: Option<Subscription>,
    pattern_source: Option<String>,
    shape: Option<OutputShape>,
}

impl OscEventNode {
    pub fn new() -> OscEventNode {
        OscEventNode {
            inbox: Arc::new(Mutex::new(NodeInbox::default())),
            subscription: None,
            pattern_source: None,
            shape: None,
        }
    }

    /// Evaluate the node once. `pattern` is the node's address-pattern input
    /// as of this tick.
    pub fn tick(&mut self, bus: &EventBus, pattern: &str) -> Result<TickOutcome> {
        self.refresh_pattern(pattern);

        if self.subscription.is_none() {
            let inbox = Arc::clone(&self.inbox);
            let sub = bus.subscribe(EventKind::OscMessage, move |event| {
                let BusEvent::OscMessage(msg) = event;
                let mut inbox = inbox.lock().unwrap();
                let matched = inbox
                    .pattern
                    .as_ref()
                    .is_some_and(|p| matches_at_start(p, &msg.address));
                if matched {
                    // Most-recent-wins: an unconsumed event is overwritten.
                    inbox.pending = Some(msg.clone());
                }
            });
            self.subscription = Some(sub);
            return Ok(TickOutcome::Subscribed);
        }

        if let Some(sub) = self.subscription.as_mut() {
            sub.pump();
        }

        let Some(msg) = self.inbox.lock().unwrap().pending.take() else {
            return Ok(TickOutcome::NoNewData);
        };

        let values = float_args(&msg)?;
        let shape = OutputShape::from_len(values.len());
        match self.shape {
            None => self.shape = Some(shape),
            Some(resolved) if resolved != shape => {
                return Err(Error::ShapeConflict {
                    expected: resolved.arity(),
                    actual: shape.arity(),
                });
            }
            Some(_) => {}
        }

        Ok(TickOutcome::Fired(NodeOutputs {
            path: msg.address,
            values,
        }))
    }

    /// Drop the bus registration. Must run before the owning graph releases
    /// the node; afterwards the callback can never fire again.
    pub fn release(&mut self, bus: &EventBus) {
        if let Some(sub) = self.subscription.take() {
            bus.unsubscribe(sub);
        }
        self.inbox.lock().unwrap().pending = None;
    }

    pub fn subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn shape(&self) -> Option<OutputShape> {
        self.shape
    }

    /// Recompile the matcher when the pattern input changed. A compile
    /// failure keeps the previous matcher and leaves the recorded source
    /// untouched, so the compile is retried on the next tick.
    fn refresh_pattern(&mut self, pattern: &str) {
        if self.pattern_source.as_deref() == Some(pattern) {
            return;
        }
        match compile_address_pattern(pattern) {
            Ok(compiled) => {
                self.inbox.lock().unwrap().pattern = Some(compiled);
                self.pattern_source = Some(pattern.to_string());
            }
            Err(e) => {
                warn!("error compiling OSC address pattern '{pattern}': {e}");
            }
        }
    }
}

fn float_args(msg: &OscMessage) -> Result<Vec<f64>> {
    msg.args
        .iter()
        .map(|arg| {
            arg.as_float().ok_or_else(|| {
                Error::ArgType(format!(
                    "OSC message arguments must be floats, got: {:?}",
                    msg.args
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_from_len() {
        assert_eq!(OutputShape::from_len(1), OutputShape::Scalar);
        assert_eq!(OutputShape::from_len(3), OutputShape::Tuple(3));
        assert_eq!(OutputShape::Tuple(3).arity(), 3);
        assert_eq!(OutputShape::Scalar.arity(), 1);
    }

    #[test]
    fn bad_patterns_fail_to_compile() {
        assert!(matches!(
            compile_address_pattern("(unclosed"),
            Err(Error::Pattern(_))
        ));
        assert!(compile_address_pattern("/foo.*").is_ok());
    }

    #[test]
    fn matching_is_anchored_at_the_start() {
        let pattern = compile_address_pattern("/foo").unwrap();
        assert!(matches_at_start(&pattern, "/foo/bar"));
        assert!(!matches_at_start(&pattern, "/bar/foo"));
    }
}
