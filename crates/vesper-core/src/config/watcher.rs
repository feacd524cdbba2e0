//! Configuration file watcher for hot-reload support.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};
use vesper_types::CoreEvent;

use crate::{Error, Result};

/// Editors write in bursts; let the file settle before asking the core
/// to re-read it.
const RELOAD_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Minimum spacing between reload notifications for one logical save.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the underlying filesystem watch registered. Dropping it stops
/// the notifications.
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
}

/// Watch the config file and feed [`CoreEvent::ConfigReloaded`] into
/// the core's event channel whenever it changes on disk, exactly as if
/// a surface had requested the reload. Must be called from within a
/// tokio runtime.
///
/// # Errors
///
/// Returns an error when `config_path` has no file name or parent
/// directory, or when the filesystem watch cannot be registered.
pub fn spawn_config_watcher(
    config_path: PathBuf,
    events: UnboundedSender<CoreEvent>,
) -> Result<ConfigWatcher> {
    let file_name: OsString = config_path
        .file_name()
        .map(OsString::from)
        .ok_or_else(|| Error::Config(format!("invalid config path: {}", config_path.display())))?;
    let parent = config_path
        .parent()
        .ok_or_else(|| {
            Error::Config(format!(
                "config path has no parent directory: {}",
                config_path.display()
            ))
        })?
        .to_owned();

    let (change_tx, mut change_rx) = mpsc::unbounded_channel::<()>();

    // The callback runs on the notify backend's thread, so the dedupe
    // state lives in the closure and only a unit ping crosses over
    let mut last_change: Option<Instant> = None;
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                if !is_config_change(&event, &file_name) {
                    return;
                }
                let now = Instant::now();
                if last_change.is_none_or(|at| now.duration_since(at) > WATCH_DEBOUNCE) {
                    last_change = Some(now);
                    let _ = change_tx.send(());
                }
            }
            Err(e) => error!("Config watcher error: {e}"),
        })?;

    watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    info!("Watching config directory: {}", parent.display());

    tokio::spawn(async move {
        while change_rx.recv().await.is_some() {
            debug!("Config file changed, scheduling reload");
            tokio::time::sleep(RELOAD_SETTLE_DELAY).await;
            if events.send(CoreEvent::ConfigReloaded).is_err() {
                debug!("Core event channel closed, stopping config watcher");
                break;
            }
        }
    });

    Ok(ConfigWatcher { _watcher: watcher })
}

/// Whether a filesystem event is a write to the watched config file.
/// The watch covers the whole parent directory, so sibling files show
/// up here too and must be filtered out.
fn is_config_change(event: &notify::Event, file_name: &OsStr) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name))
}
