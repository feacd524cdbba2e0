//! End-to-end tests for the launcher event loop: debounce timing,
//! coalescing, and close semantics over the event channel.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use vesper_types::{CoreEvent, CoreUpdate};

use super::fixtures::{app_catalog, default_config, test_logger};
use crate::config::{Config, ConfigHandle};
use crate::launcher::Launcher;

fn spawn_launcher(config: ConfigHandle) -> (UnboundedSender<CoreEvent>, UnboundedReceiver<CoreUpdate>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (launcher, updates_rx) = Launcher::new(app_catalog(), config, test_logger());
    tokio::spawn(launcher.run(events_rx));
    (events_tx, updates_rx)
}

#[tokio::test(start_paused = true)]
async fn test_debounce_coalesces_rapid_keystrokes() {
    let (events, mut updates) = spawn_launcher(default_config());

    events.send(CoreEvent::Open).unwrap();
    for query in ["f", "fi", "fir", "fire"] {
        events
            .send(CoreEvent::QueryChanged {
                query: query.to_string(),
            })
            .unwrap();
    }

    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: true }
    );

    // Exactly one recomputation, using the final query text
    match updates.recv().await.unwrap() {
        CoreUpdate::Results { results } => {
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].entry.id, "firefox");
        }
        other => panic!("Expected Results, got {other:?}"),
    }
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Selection { index: Some(0) }
    );

    // Nothing else queued: an escape is the very next update
    events.send(CoreEvent::Escape).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: false }
    );
}

#[tokio::test(start_paused = true)]
async fn test_debounce_waits_for_configured_interval() {
    let mut config = Config::default();
    config.launcher.debounce_ms = 200;
    let (events, mut updates) = spawn_launcher(ConfigHandle::in_memory(config));

    events.send(CoreEvent::Open).unwrap();
    events
        .send(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        })
        .unwrap();

    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: true }
    );

    // Let the loop process the keystroke, then check nothing commits
    // before the interval elapses
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(150)).await;
    tokio::task::yield_now().await;
    assert!(updates.try_recv().is_err());

    tokio::time::advance(Duration::from_millis(60)).await;
    match updates.recv().await.unwrap() {
        CoreUpdate::Results { .. } => {}
        other => panic!("Expected Results, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_escape_cancels_inflight_debounce() {
    let (events, mut updates) = spawn_launcher(default_config());

    events.send(CoreEvent::Open).unwrap();
    events
        .send(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        })
        .unwrap();
    events.send(CoreEvent::Escape).unwrap();

    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: true }
    );
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: false }
    );

    // The cancelled debounce never commits: reopen and confirm the
    // next update is the reopen, not a stale Results
    tokio::time::advance(Duration::from_millis(500)).await;
    events.send(CoreEvent::Open).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: true }
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_clears_query_for_next_open() {
    let (events, mut updates) = spawn_launcher(default_config());

    events.send(CoreEvent::Open).unwrap();
    events
        .send(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        })
        .unwrap();

    // Wait for the commit so the session has results
    let _open = updates.recv().await.unwrap();
    let _results = updates.recv().await.unwrap();
    let _selection = updates.recv().await.unwrap();

    events.send(CoreEvent::Escape).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: false }
    );

    // Reopen and accept immediately: no selection survives the close,
    // nothing dispatches, so a follow-up escape is the next update
    events.send(CoreEvent::Open).unwrap();
    events.send(CoreEvent::Accept).unwrap();
    events.send(CoreEvent::Escape).unwrap();

    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: true }
    );
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Visibility { open: false }
    );
}

#[tokio::test(start_paused = true)]
async fn test_config_reloaded_event_rereads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    Config::default().save(&path).unwrap();
    let config = ConfigHandle::load(path.clone()).unwrap();

    let (events, mut updates) = spawn_launcher(config);

    events.send(CoreEvent::Open).unwrap();
    events
        .send(CoreEvent::QueryChanged {
            query: "fi".to_string(),
        })
        .unwrap();

    let _open = updates.recv().await.unwrap();
    let _results = updates.recv().await.unwrap();
    let _selection = updates.recv().await.unwrap();

    // Defaults clamp at the top row
    events.send(CoreEvent::SelectPrevious).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Selection { index: Some(0) }
    );

    // The user edits the file; the watcher surfaces that as an event
    let mut edited = Config::default();
    edited.launcher.wrap_selection = true;
    edited.save(&path).unwrap();
    events.send(CoreEvent::ConfigReloaded).unwrap();

    events.send(CoreEvent::SelectPrevious).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Selection { index: Some(1) }
    );
}

#[tokio::test(start_paused = true)]
async fn test_selection_clamps_by_default_and_wraps_when_configured() {
    let config = default_config();
    let (events, mut updates) = spawn_launcher(config.clone());

    events.send(CoreEvent::Open).unwrap();
    events
        .send(CoreEvent::QueryChanged {
            query: "fi".to_string(),
        })
        .unwrap();

    let _open = updates.recv().await.unwrap();
    let results_len = match updates.recv().await.unwrap() {
        CoreUpdate::Results { results } => results.len(),
        other => panic!("Expected Results, got {other:?}"),
    };
    assert_eq!(results_len, 2);
    let _selection = updates.recv().await.unwrap();

    // Clamp: moving up from row 0 stays at row 0
    events.send(CoreEvent::SelectPrevious).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Selection { index: Some(0) }
    );

    // Flip the policy mid-session; the next move re-reads it live
    let mut wrapped = Config::default();
    wrapped.launcher.wrap_selection = true;
    config.replace(wrapped);

    events.send(CoreEvent::SelectPrevious).unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        CoreUpdate::Selection {
            index: Some(results_len - 1)
        }
    );
}
