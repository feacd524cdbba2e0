mod dirs;
mod settings;
mod validation;
mod watcher;

pub use dirs::Directories;
pub use settings::{AudioConfig, Config, ConfigHandle, LauncherConfig, TelemetryConfig};
pub use validation::warn_unknown_fields;
pub use watcher::{ConfigWatcher, spawn_config_watcher};
