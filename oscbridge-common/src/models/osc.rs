//! Decoded OSC message values, independent of the wire codec.

use crate::error::{Error, Result};

/// A single decoded OSC argument.
///
/// The wire format carries more types than these; anything outside this set
/// is rejected at conversion so that downstream consumers only ever see the
/// four kinds the bridge supports.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Float(f64),
    Int(i32),
    Str(String),
    Blob(Vec<u8>),
}

impl OscArg {
    /// Convert a wire-level argument. 32-bit floats are widened to `f64`.
    pub fn from_rosc(value: rosc::OscType) -> Result<OscArg> {
        match value {
            rosc::OscType::Float(f) => Ok(OscArg::Float(f64::from(f))),
            rosc::OscType::Double(d) => Ok(OscArg::Float(d)),
            rosc::OscType::Int(i) => Ok(OscArg::Int(i)),
            rosc::OscType::String(s) => Ok(OscArg::Str(s)),
            rosc::OscType::Blob(b) => Ok(OscArg::Blob(b)),
            other => Err(Error::ArgType(format!(
                "unsupported OSC argument type: {other:?}"
            ))),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OscArg::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// A decoded OSC message: a slash-delimited address path plus its arguments.
///
/// Immutable once constructed; hand-offs between the listener, the bus and
/// consumers clone or move the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> OscMessage {
        OscMessage {
            address: address.into(),
            args,
        }
    }

    /// Convert a wire-level message, failing if any argument is unsupported.
    pub fn from_rosc(msg: rosc::OscMessage) -> Result<OscMessage> {
        let args = msg
            .args
            .into_iter()
            .map(OscArg::from_rosc)
            .collect::<Result<Vec<_>>>()?;
        Ok(OscMessage {
            address: msg.addr,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_supported_argument_types() {
        let msg = rosc::OscMessage {
            addr: "/mix/level".to_string(),
            args: vec![
                rosc::OscType::Float(0.5),
                rosc::OscType::Double(2.25),
                rosc::OscType::Int(7),
                rosc::OscType::String("solo".to_string()),
                rosc::OscType::Blob(vec![1, 2, 3]),
            ],
        };
        let converted = OscMessage::from_rosc(msg).unwrap();
        assert_eq!(converted.address, "/mix/level");
        assert_eq!(
            converted.args,
            vec![
                OscArg::Float(0.5),
                OscArg::Float(2.25),
                OscArg::Int(7),
                OscArg::Str("solo".to_string()),
                OscArg::Blob(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn rejects_unsupported_argument_types() {
        let msg = rosc::OscMessage {
            addr: "/toggle".to_string(),
            args: vec![rosc::OscType::Bool(true)],
        };
        let err = OscMessage::from_rosc(msg).unwrap_err();
        assert!(matches!(err, Error::ArgType(_)));
    }

    #[test]
    fn as_float_only_yields_floats() {
        assert_eq!(OscArg::Float(1.5).as_float(), Some(1.5));
        assert_eq!(OscArg::Int(3).as_float(), None);
        assert_eq!(OscArg::Str("x".to_string()).as_float(), None);
    }
}
