//! src/config.rs
//!
//! Listener settings, read once at console startup to pre-populate the
//! default bind parameters.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use oscbridge_common::error::Result;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3334;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub address: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load settings, falling back to the defaults on any error.
    pub fn load_or_default(path: &Path) -> Settings {
        match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("error loading settings from {}: {e}", path.display());
                Settings::default()
            }
        }
    }
}
