use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spool_types::AddressScheme;
use spool_worker::DEFAULT_QUEUE_CAPACITY;

use crate::error::{TransportError, TransportResult};

/// Offline transport settings, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory holding staged envelopes. A leading `~` is expanded.
    pub storage_location: PathBuf,
    /// Queue a replay pass as soon as the transport starts.
    pub replay_on_startup: bool,
    /// Log everything Spool does to stderr.
    pub debug: bool,
    /// How staged files are named.
    pub address_scheme: AddressScheme,
    /// Maximum outstanding background tasks.
    pub queue_capacity: usize,
    /// Pause between resends during replay, in milliseconds.
    pub replay_interval_ms: u64,
    /// Stop a replay pass at the first failed resend.
    pub halt_replay_on_failure: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            storage_location: default_storage_location(),
            replay_on_startup: true,
            debug: false,
            address_scheme: AddressScheme::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_interval_ms: 100,
            halt_replay_on_failure: false,
        }
    }
}

impl TransportConfig {
    pub fn new(storage_location: impl Into<PathBuf>) -> Self {
        Self {
            storage_location: storage_location.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> TransportResult<Self> {
        toml::from_str(s).map_err(|e| TransportError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> TransportResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        Self::from_toml_str(&data).map_err(|e| match e {
            TransportError::Config(msg) => {
                TransportError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn with_replay_on_startup(mut self, replay: bool) -> Self {
        self.replay_on_startup = replay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_address_scheme(mut self, scheme: AddressScheme) -> Self {
        self.address_scheme = scheme;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_replay_interval(mut self, interval: Duration) -> Self {
        self.replay_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_halt_replay_on_failure(mut self, halt: bool) -> Self {
        self.halt_replay_on_failure = halt;
        self
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }

    /// The storage location with `~` expanded, made absolute.
    pub fn resolved_storage_location(&self) -> TransportResult<PathBuf> {
        let expanded = expand_home(&self.storage_location)?;
        if expanded.as_os_str().is_empty() {
            return Err(TransportError::Config("storage_location is empty".into()));
        }
        Ok(std::path::absolute(expanded)?)
    }
}

/// `<cache dir>/spool`, or `.spool` when the platform has no cache dir.
fn default_storage_location() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("spool"))
        .unwrap_or_else(|| PathBuf::from(".spool"))
}

fn expand_home(path: &Path) -> TransportResult<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir()
        .ok_or_else(|| TransportError::Config("could not determine home directory".into()))?;
    Ok(home.join(rest))
}
