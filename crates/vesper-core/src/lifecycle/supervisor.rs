use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{LifecycleMachine, ServiceState, Transition};

/// Settle time between `stop()` finishing and the deferred
/// re-initialize during a restart.
pub const RESTART_DELAY: Duration = Duration::from_millis(100);

/// A long-lived shell service driven by a [`Supervisor`].
///
/// `start`/`shutdown` do the actual work (connect to the audio daemon,
/// open sinks, release handles). Errors are converted into lifecycle
/// state by the supervisor and never propagate further.
pub trait Service {
    fn name(&self) -> &str;

    /// Bring the service up.
    ///
    /// # Errors
    ///
    /// Returns an error when the service cannot reach a usable state;
    /// the supervisor records it and enters `Error`.
    fn start(&mut self) -> impl Future<Output = crate::Result<()>> + Send;

    /// Release the service's resources.
    ///
    /// # Errors
    ///
    /// Returns an error when teardown fails; the supervisor records it
    /// and enters `Error` instead of `Stopped`.
    fn shutdown(&mut self) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Control commands accepted by [`Supervisor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    Initialize,
    Stop,
    Restart,
    SetError {
        message: String,
        context: Option<String>,
    },
    /// Internal: the restart delay elapsed. Stale generations are
    /// wakeups from a superseded restart and are discarded.
    DeferredInit { generation: u64 },
}

/// Cloneable sender for driving a supervisor from elsewhere.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: UnboundedSender<SupervisorCommand>,
}

impl SupervisorHandle {
    pub fn initialize(&self) {
        let _ = self.tx.send(SupervisorCommand::Initialize);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(SupervisorCommand::Stop);
    }

    pub fn restart(&self) {
        let _ = self.tx.send(SupervisorCommand::Restart);
    }

    pub fn set_error(&self, message: impl Into<String>, context: Option<String>) {
        let _ = self.tx.send(SupervisorCommand::SetError {
            message: message.into(),
            context,
        });
    }
}

/// Drives one [`Service`] through the lifecycle machine.
///
/// All operations run to completion on the caller's task; the only
/// concurrency is the deferred restart timer, which reports back
/// through the command channel so the wakeup is handled on the same
/// loop as everything else.
pub struct Supervisor<S: Service> {
    service: S,
    machine: LifecycleMachine,
    restart_generation: u64,
    cmd_tx: UnboundedSender<SupervisorCommand>,
    cmd_rx: UnboundedReceiver<SupervisorCommand>,
}

impl<S: Service> Supervisor<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        let machine = LifecycleMachine::new(service.name());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Self {
            service,
            machine,
            restart_generation: 0,
            cmd_tx,
            cmd_rx,
        }
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.machine.state()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.machine.last_error()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<Transition> {
        self.machine.subscribe()
    }

    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.cmd_tx.clone(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// Bring the service up. Valid from `Uninitialized`, `Error`, or
    /// `Stopped`; redundant calls while `Initializing` or `Ready` are
    /// no-ops so concurrent triggers cannot double-start.
    pub async fn initialize(&mut self) {
        match self.machine.state() {
            ServiceState::Initializing | ServiceState::Ready => {
                debug!(
                    "[{}] initialize() while {}, nothing to do",
                    self.machine.component(),
                    self.machine.state()
                );
                return;
            }
            _ => {}
        }

        // From Stopping this is rejected and logged by the machine
        if self.machine.request(ServiceState::Initializing).is_err() {
            return;
        }

        match self.service.start().await {
            Ok(()) => {
                let _ = self.machine.request(ServiceState::Ready);
                info!("[{}] Service ready", self.machine.component());
            }
            Err(e) => {
                self.machine.force_error(format!("start failed: {e}"));
            }
        }
    }

    /// Tear the service down. No-op when already `Stopping`/`Stopped`.
    pub async fn stop(&mut self) {
        match self.machine.state() {
            ServiceState::Stopping | ServiceState::Stopped => {
                debug!(
                    "[{}] stop() while {}, nothing to do",
                    self.machine.component(),
                    self.machine.state()
                );
                return;
            }
            _ => {}
        }

        if self.machine.request(ServiceState::Stopping).is_err() {
            return;
        }

        match self.service.shutdown().await {
            Ok(()) => {
                let _ = self.machine.request(ServiceState::Stopped);
                info!("[{}] Service stopped", self.machine.component());
            }
            Err(e) => {
                self.machine.force_error(format!("shutdown failed: {e}"));
            }
        }
    }

    /// Record a failure and force the `Error` state, regardless of
    /// where the machine currently is.
    pub fn set_error(&mut self, message: impl Into<String>, context: Option<&str>) {
        let message = message.into();
        match context {
            Some(ctx) => error!("[{}] {message} ({ctx})", self.machine.component()),
            None => error!("[{}] {message}", self.machine.component()),
        }
        self.machine.force_error(message);
    }

    /// Stop, then re-initialize after [`RESTART_DELAY`]. The
    /// re-initialize is deferred and cancellable: a newer `restart()`
    /// supersedes the pending one, and the stale wakeup is discarded.
    pub async fn restart(&mut self) {
        self.stop().await;

        self.restart_generation += 1;
        let generation = self.restart_generation;
        let tx = self.cmd_tx.clone();

        info!(
            "[{}] Scheduling re-initialize in {:?}",
            self.machine.component(),
            RESTART_DELAY
        );
        tokio::spawn(async move {
            sleep(RESTART_DELAY).await;
            let _ = tx.send(SupervisorCommand::DeferredInit { generation });
        });
    }

    /// Process a single command.
    pub async fn handle_command(&mut self, cmd: SupervisorCommand) {
        match cmd {
            SupervisorCommand::Initialize => self.initialize().await,
            SupervisorCommand::Stop => self.stop().await,
            SupervisorCommand::Restart => self.restart().await,
            SupervisorCommand::SetError { message, context } => {
                self.set_error(message, context.as_deref());
            }
            SupervisorCommand::DeferredInit { generation } => {
                if generation == self.restart_generation {
                    self.initialize().await;
                } else {
                    debug!(
                        "[{}] Discarding stale restart wakeup (gen {generation})",
                        self.machine.component()
                    );
                }
            }
        }
    }

    /// Wait for and process the next command. Returns `false` when all
    /// handles are gone and no wakeup is pending.
    pub async fn tick(&mut self) -> bool {
        match self.cmd_rx.recv().await {
            Some(cmd) => {
                self.handle_command(cmd).await;
                true
            }
            None => false,
        }
    }

    /// Run the command loop until every handle is dropped.
    pub async fn run(mut self) {
        while self.tick().await {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestService {
        fail_start: bool,
        fail_shutdown: bool,
        starts: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl Service for TestService {
        fn name(&self) -> &str {
            "test"
        }

        async fn start(&mut self) -> crate::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(Error::Service("backend unavailable".to_string()));
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> crate::Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(Error::Service("teardown failed".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initialize_reaches_ready() {
        let mut sup = Supervisor::new(TestService::default());
        sup.initialize().await;
        assert_eq!(sup.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent_when_ready() {
        let starts = Arc::new(AtomicUsize::new(0));
        let service = TestService {
            starts: starts.clone(),
            ..TestService::default()
        };
        let mut sup = Supervisor::new(service);
        sup.initialize().await;
        sup.initialize().await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(sup.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn test_start_failure_becomes_error_state() {
        let mut sup = Supervisor::new(TestService {
            fail_start: true,
            ..TestService::default()
        });
        sup.initialize().await;
        assert_eq!(sup.state(), ServiceState::Error);
        assert!(sup.last_error().unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_initialize_recovers_from_error() {
        let mut sup = Supervisor::new(TestService::default());
        sup.initialize().await;
        sup.set_error("x", None);
        assert_eq!(sup.state(), ServiceState::Error);

        sup.initialize().await;
        assert_eq!(sup.state(), ServiceState::Ready);
        assert!(sup.last_error().is_none());
    }

    #[tokio::test]
    async fn test_stop_noop_when_stopped() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let service = TestService {
            shutdowns: shutdowns.clone(),
            ..TestService::default()
        };
        let mut sup = Supervisor::new(service);
        sup.initialize().await;
        sup.stop().await;
        sup.stop().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(sup.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_failure_becomes_error_state() {
        let mut sup = Supervisor::new(TestService {
            fail_shutdown: true,
            ..TestService::default()
        });
        sup.initialize().await;
        sup.stop().await;
        assert_eq!(sup.state(), ServiceState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_defers_initialize() {
        let starts = Arc::new(AtomicUsize::new(0));
        let service = TestService {
            starts: starts.clone(),
            ..TestService::default()
        };
        let mut sup = Supervisor::new(service);
        sup.initialize().await;

        sup.restart().await;
        assert_eq!(sup.state(), ServiceState::Stopped);
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        tokio::time::advance(RESTART_DELAY).await;
        assert!(sup.tick().await);
        assert_eq!(sup.state(), ServiceState::Ready);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_restart_supersedes_first() {
        let starts = Arc::new(AtomicUsize::new(0));
        let service = TestService {
            starts: starts.clone(),
            ..TestService::default()
        };
        let mut sup = Supervisor::new(service);
        sup.initialize().await;

        sup.restart().await;
        sup.restart().await;

        tokio::time::advance(RESTART_DELAY).await;
        assert!(sup.tick().await);
        assert!(sup.tick().await);

        // Only the wakeup from the second restart initializes
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(sup.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn test_handle_drives_supervisor() {
        let mut sup = Supervisor::new(TestService::default());
        let handle = sup.handle();

        handle.initialize();
        assert!(sup.tick().await);
        assert_eq!(sup.state(), ServiceState::Ready);

        handle.set_error("remote failure", Some("ipc".to_string()));
        assert!(sup.tick().await);
        assert_eq!(sup.state(), ServiceState::Error);
        assert_eq!(sup.last_error(), Some("remote failure"));
    }

    #[tokio::test]
    async fn test_observers_see_forced_error_pair() {
        let mut sup = Supervisor::new(TestService::default());
        let mut rx = sup.subscribe();
        sup.initialize().await;
        sup.set_error("x", None);

        let mut last = None;
        while let Ok(t) = rx.try_recv() {
            last = Some(t);
        }
        let last = last.unwrap();
        assert_eq!(last.previous, ServiceState::Ready);
        assert_eq!(last.current, ServiceState::Error);
    }
}
