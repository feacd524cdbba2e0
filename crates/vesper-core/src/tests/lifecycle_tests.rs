//! Lifecycle supervision scenarios over a real service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedReceiver;
use vesper_types::Toast;

use super::fixtures::{default_config, test_logger};
use crate::lifecycle::{RESTART_DELAY, ServiceState, Supervisor, Transition};
use crate::services::{AudioService, LevelBackend, ToastSink};

/// Backend whose readiness can be flipped from the test while the
/// service owns it.
struct FlippableBackend {
    ready: Arc<AtomicBool>,
    level: f64,
}

impl LevelBackend for FlippableBackend {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn current_level(&self) -> f64 {
        self.level
    }

    fn set_level(&mut self, value: f64) -> crate::Result<()> {
        self.level = value;
        Ok(())
    }
}

struct NullToasts;

impl ToastSink for NullToasts {
    fn toast(&self, _toast: Toast) {}
}

fn audio_supervisor(
    ready: Arc<AtomicBool>,
) -> Supervisor<AudioService<FlippableBackend, NullToasts>> {
    let backend = FlippableBackend { ready, level: 0.5 };
    let service = AudioService::new(backend, NullToasts, default_config(), test_logger());
    Supervisor::new(service)
}

fn drain(rx: &mut UnboundedReceiver<Transition>) -> Vec<(ServiceState, ServiceState)> {
    let mut seen = Vec::new();
    while let Ok(t) = rx.try_recv() {
        seen.push((t.previous, t.current));
    }
    seen
}

#[tokio::test]
async fn test_startup_error_and_recovery_sequence() {
    let ready = Arc::new(AtomicBool::new(true));
    let mut sup = audio_supervisor(ready.clone());
    let mut transitions = sup.subscribe();

    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Ready);
    assert_eq!(
        drain(&mut transitions),
        vec![
            (ServiceState::Uninitialized, ServiceState::Initializing),
            (ServiceState::Initializing, ServiceState::Ready),
        ]
    );

    sup.set_error("device lost", Some("udev"));
    assert_eq!(sup.state(), ServiceState::Error);
    assert_eq!(sup.last_error(), Some("device lost"));
    assert_eq!(
        drain(&mut transitions),
        vec![(ServiceState::Ready, ServiceState::Error)]
    );

    // Error is recoverable: the next initialize runs the full startup
    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Ready);
    assert!(sup.last_error().is_none());
    assert_eq!(
        drain(&mut transitions),
        vec![
            (ServiceState::Error, ServiceState::Initializing),
            (ServiceState::Initializing, ServiceState::Ready),
        ]
    );
}

#[tokio::test]
async fn test_failing_backend_lands_in_error_not_ready() {
    let ready = Arc::new(AtomicBool::new(false));
    let mut sup = audio_supervisor(ready.clone());

    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Error);
    assert!(sup.last_error().unwrap().contains("audio backend"));

    // The device coming back does not by itself re-run startup
    ready.store(true, Ordering::SeqCst);
    assert_eq!(sup.state(), ServiceState::Error);

    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Ready);
}

#[tokio::test]
async fn test_not_ready_service_rejects_operations() {
    let ready = Arc::new(AtomicBool::new(false));
    let mut sup = audio_supervisor(ready);

    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Error);

    let before = sup.service().volume();
    assert!(sup.service_mut().set_volume(0.8).is_err());
    assert_eq!(sup.service().volume(), before);
}

#[tokio::test(start_paused = true)]
async fn test_handle_restart_defers_reinitialize() {
    let ready = Arc::new(AtomicBool::new(true));
    let mut sup = audio_supervisor(ready);
    let handle = sup.handle();

    sup.initialize().await;
    assert_eq!(sup.state(), ServiceState::Ready);

    handle.restart();
    assert!(sup.tick().await);
    assert_eq!(sup.state(), ServiceState::Stopped);

    tokio::time::advance(RESTART_DELAY).await;
    assert!(sup.tick().await);
    assert_eq!(sup.state(), ServiceState::Ready);
}
