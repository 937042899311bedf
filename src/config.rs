use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Name of the optional tuning file inside the watched root. Hidden, so the
/// classifier never reports it.
pub const CONFIG_FILE: &str = ".watch-dir.toml";

/// Default time a move-out waits for its move-in half.
const DEFAULT_RENAME_GRACE_MS: u64 = 50;

/// Tuning loaded from `.watch-dir.toml` at the watched root. The root itself
/// is deliberately not configurable.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct HostConfig {
    /// Re-scan the whole tree this often. Absent or zero disables periodic resync.
    pub resync_interval_secs: Option<u64>,
    /// How long an unpaired move-out is held before it is reported as a delete.
    pub rename_grace_ms: Option<u64>,
}

impl HostConfig {
    /// Load configuration from `.watch-dir.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn rename_grace(&self) -> Duration {
        Duration::from_millis(self.rename_grace_ms.unwrap_or(DEFAULT_RENAME_GRACE_MS))
    }
}
