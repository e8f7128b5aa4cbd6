//! Ambient configuration surface. The base protocol defines no
//! configuration of its own; this module exists so that embedding
//! binaries can tune quality-of-implementation knobs (timeouts, retry
//! budgets, the safety cap) by loading a TOML file with serde defaults.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use vsp_protocol::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_NACK_RETRY_LIMIT};

/// Tunables for a single [`crate::Connection`]/[`crate::Session`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Socket read timeout. `None` means block forever (there are no
    /// timeouts by default).
    #[serde(skip)]
    pub read_timeout: Option<Duration>,
    /// How many consecutive NACKs to tolerate before giving up on a
    /// frame.
    pub nack_retry_limit: u8,
    /// Safety cap on a single response payload.
    pub max_frame_bytes: usize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        ConnectConfig {
            read_timeout: None,
            nack_retry_limit: DEFAULT_NACK_RETRY_LIMIT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Top-level config for binaries embedding this client. Entirely
/// additive: the base protocol names no configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VspConfig {
    pub connect: ConnectConfig,
    /// Overrides the directory scanned for `vcml_session_*` rendezvous
    /// files. Defaults to the process temp directory.
    pub sessions_dir: Option<PathBuf>,
}

impl VspConfig {
    /// Reads and parses a TOML config file. A missing file is not an
    /// error; it just yields defaults.
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<VspConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(VspConfig::default());
        }
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}
