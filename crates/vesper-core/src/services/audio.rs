use std::collections::HashMap;

use tracing::warn;
use vesper_types::Toast;

use crate::config::ConfigHandle;
use crate::lifecycle::Service;
use crate::telemetry::{LogLevel, Logger};
use crate::{Error, Result};

/// Narrow contract to the host's volume/brightness control path. The
/// core never speaks the audio daemon protocol itself.
pub trait LevelBackend: Send {
    /// Whether the backing device is usable right now.
    fn is_ready(&self) -> bool;

    fn current_level(&self) -> f64;

    /// Apply a level the host has already validated for range.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing device rejects the change.
    fn set_level(&mut self, value: f64) -> Result<()>;
}

/// Fire-and-forget notification surface. No return value is consumed.
pub trait ToastSink: Send {
    fn toast(&self, toast: Toast);
}

/// Volume control service. Owns no protocol state of its own: levels
/// live in the backend, limits live in config (re-read on every call,
/// they may change mid-session).
pub struct AudioService<B: LevelBackend, T: ToastSink> {
    backend: B,
    toasts: T,
    config: ConfigHandle,
    logger: Logger,
}

impl<B: LevelBackend, T: ToastSink> AudioService<B, T> {
    #[must_use]
    pub fn new(backend: B, toasts: T, config: ConfigHandle, logger: Logger) -> Self {
        Self {
            backend,
            toasts,
            config,
            logger,
        }
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        self.backend.current_level()
    }

    /// Set the volume, clamped to `[0, maxVolume]`. Out-of-range input
    /// is clamped with a warning, never rejected. Returns the
    /// effective volume.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] when the backing device is not
    /// ready; the operation aborts with no partial effect.
    pub fn set_volume(&mut self, value: f64) -> Result<f64> {
        if !self.backend.is_ready() {
            let mut context = HashMap::new();
            context.insert("requested".to_string(), value.to_string());
            self.logger.log(
                LogLevel::Error,
                "volume change requested while backend not ready",
                context,
                "audio",
            );
            return Err(Error::NotReady("audio backend".to_string()));
        }

        let max_volume = self.config.snapshot().audio.max_volume;
        let effective = value.clamp(0.0, max_volume);
        if (effective - value).abs() > f64::EPSILON {
            warn!("Clamped volume request {value} to {effective} (max {max_volume})");
        }

        self.backend.set_level(effective)?;
        Ok(effective)
    }

    /// Raise the volume by the configured step.
    ///
    /// # Errors
    ///
    /// Same as [`set_volume`](AudioService::set_volume).
    pub fn step_up(&mut self) -> Result<f64> {
        let step = self.config.snapshot().audio.volume_step;
        self.set_volume(self.backend.current_level() + step)
    }

    /// Lower the volume by the configured step.
    ///
    /// # Errors
    ///
    /// Same as [`set_volume`](AudioService::set_volume).
    pub fn step_down(&mut self) -> Result<f64> {
        let step = self.config.snapshot().audio.volume_step;
        self.set_volume(self.backend.current_level() - step)
    }

    /// The host reports an output device change; surface it as a toast
    /// when the category is enabled.
    pub fn device_changed(&self, device_name: &str) {
        if self.config.snapshot().audio.device_toasts {
            self.toasts.toast(
                Toast::new("Audio device changed", device_name).with_icon("volume_up"),
            );
        }
    }
}

impl<B: LevelBackend, T: ToastSink> Service for AudioService<B, T> {
    fn name(&self) -> &str {
        "audio"
    }

    async fn start(&mut self) -> Result<()> {
        if self.backend.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady("audio backend".to_string()))
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
