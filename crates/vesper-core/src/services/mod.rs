//! Shell services supervised by the lifecycle machine.

mod audio;

pub use audio::{AudioService, LevelBackend, ToastSink};
