//! Lifecycle state handling for long-lived shell services.
//!
//! Every background service (audio, telemetry sinks, future backends)
//! moves through the same states: `Uninitialized -> Initializing ->
//! {Ready | Error} -> Stopping -> Stopped`, with re-entry from
//! `Error`/`Stopped` back to `Initializing` on restart. The guarded
//! machine lives in [`machine`]; [`supervisor`] drives a concrete
//! service through it and owns the deferred-restart timer.

mod machine;
mod supervisor;

pub use machine::{LifecycleMachine, ServiceState, Transition};
pub use supervisor::{RESTART_DELAY, Service, Supervisor, SupervisorCommand, SupervisorHandle};
