use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub launcher: LauncherConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load config from file. Missing file returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "config.json");
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Launcher / search surface configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    /// Debounce interval between a keystroke and result recomputation
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Reserved leading substring that routes a query to command dispatch
    #[serde(default = "default_action_prefix")]
    pub action_prefix: String,

    /// Wrap selection at list boundaries instead of clamping
    #[serde(default)]
    pub wrap_selection: bool,

    #[serde(default = "default_max_results")]
    pub max_displayed_results: usize,

    /// Enable j/k selection movement in addition to the arrow keys.
    /// Consumed by the keyboard-handling surface, which translates
    /// j/k into `SelectNext`/`SelectPrevious`; the core persists and
    /// validates the flag but never reads it.
    #[serde(default)]
    pub vim_keys: bool,
}

fn default_debounce() -> u64 {
    50
}
fn default_action_prefix() -> String {
    "!".to_string()
}
fn default_max_results() -> usize {
    16
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            action_prefix: default_action_prefix(),
            wrap_selection: false,
            max_displayed_results: default_max_results(),
            vim_keys: false,
        }
    }
}

/// Audio service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    /// Increment used by step up/down, in the 0.0-1.0 volume domain
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,

    /// Upper clamp for volume requests
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,

    /// Show a toast when the output device changes
    #[serde(default = "default_true")]
    pub device_toasts: bool,
}

fn default_volume_step() -> f64 {
    0.05
}
fn default_max_volume() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume_step: default_volume_step(),
            max_volume: default_max_volume(),
            device_toasts: true,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Bound on the error history ring; oldest entries evicted first
    #[serde(default = "default_max_error_history")]
    pub max_error_history: usize,

    /// Operations slower than this raise a performance warning
    #[serde(default = "default_slow_op_threshold")]
    pub slow_op_threshold_ms: u64,
}

fn default_max_error_history() -> usize {
    50
}
fn default_slow_op_threshold() -> u64 {
    100
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_error_history: default_max_error_history(),
            slow_op_threshold_ms: default_slow_op_threshold(),
        }
    }
}

/// Shared, live-readable view of the configuration.
///
/// Options may change mid-session (the user edits the config file),
/// so consumers hold a handle and snapshot on every use instead of
/// caching values at startup.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    path: Option<PathBuf>,
    inner: Arc<RwLock<Config>>,
}

impl ConfigHandle {
    /// Load from file and keep the path for later reloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: PathBuf) -> Result<Self> {
        let config = Config::load(&path)?;
        Ok(Self {
            path: Some(path),
            inner: Arc::new(RwLock::new(config)),
        })
    }

    /// A handle over an in-memory config, not backed by a file.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self {
            path: None,
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Current config values. Clones, so the lock is never held across
    /// caller code.
    #[must_use]
    pub fn snapshot(&self) -> Config {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                warn!("Config lock poisoned, serving defaults");
                Config::default()
            }
        }
    }

    /// Re-read the backing file. In-memory handles keep their values.
    pub fn reload(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match Config::load(path) {
            Ok(config) => {
                if let Ok(mut guard) = self.inner.write() {
                    *guard = config;
                }
            }
            Err(e) => warn!("Config reload failed, keeping previous values: {e}"),
        }
    }

    /// Replace the config in place (used by tests and host overrides).
    pub fn replace(&self, config: Config) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = config;
        }
    }
}
