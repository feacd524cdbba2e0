pub mod config;
pub mod launcher;
pub mod lifecycle;
pub mod search;
pub mod services;
pub mod telemetry;
pub mod widget;

mod error;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};

pub use vesper_types as types;
