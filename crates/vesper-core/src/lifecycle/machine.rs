use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// States a long-lived service passes through between creation and
/// teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Error,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl ServiceState {
    /// The static adjacency table. `Error` is additionally reachable
    /// from any state through the forced path in
    /// [`LifecycleMachine::force_error`].
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Initializing | Self::Stopping)
                | (Self::Initializing, Self::Ready | Self::Error | Self::Stopping)
                | (Self::Ready, Self::Stopping)
                | (Self::Error, Self::Initializing | Self::Stopping)
                | (Self::Stopping, Self::Stopped | Self::Error)
                | (Self::Stopped, Self::Initializing)
        )
    }
}

/// An applied state change, reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: ServiceState,
    pub current: ServiceState,
}

/// Guarded lifecycle state, owned by exactly one service.
///
/// State is never set directly: every change goes through [`request`]
/// (table-checked) or [`force_error`] (the one sanctioned bypass,
/// since failure can occur from any state).
///
/// [`request`]: LifecycleMachine::request
/// [`force_error`]: LifecycleMachine::force_error
#[derive(Debug)]
pub struct LifecycleMachine {
    component: String,
    state: ServiceState,
    last_error: Option<String>,
    observers: Vec<UnboundedSender<Transition>>,
}

impl LifecycleMachine {
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: ServiceState::Uninitialized,
            last_error: None,
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Observe applied transitions. Each observer sees `(previous,
    /// current)` pairs that are present in the adjacency table, except
    /// for the forced error path.
    pub fn subscribe(&mut self) -> UnboundedReceiver<Transition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Request a transition to `next`.
    ///
    /// A request for the current state is a no-op (`Ok(None)`), which
    /// also breaks re-entrant notification loops. A request absent
    /// from the table is rejected, logged, and leaves state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when the table does not
    /// permit `state -> next`.
    pub fn request(&mut self, next: ServiceState) -> Result<Option<Transition>> {
        if next == self.state {
            debug!("[{}] Already {next}, ignoring transition request", self.component);
            return Ok(None);
        }

        if !self.state.can_transition_to(next) {
            warn!(
                "[{}] Rejected transition {} -> {next}",
                self.component, self.state
            );
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        Ok(Some(self.apply(next)))
    }

    /// Record a failure and force the `Error` state from wherever the
    /// machine currently is. Always succeeds.
    pub fn force_error(&mut self, message: impl Into<String>) -> Option<Transition> {
        let message = message.into();
        warn!("[{}] Entering error state: {message}", self.component);
        self.last_error = Some(message);

        if self.state == ServiceState::Error {
            return None;
        }
        Some(self.apply(ServiceState::Error))
    }

    fn apply(&mut self, next: ServiceState) -> Transition {
        let transition = Transition {
            previous: self.state,
            current: next,
        };
        self.state = next;

        if next != ServiceState::Error {
            self.last_error = None;
        }

        debug!(
            "[{}] {} -> {}",
            self.component, transition.previous, transition.current
        );
        self.observers
            .retain(|tx| tx.send(transition).is_ok());
        transition
    }
}
