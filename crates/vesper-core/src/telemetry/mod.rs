//! Structured logging and timing instrumentation.
//!
//! [`Logger`] sits on top of `tracing`: entries below the current
//! level are dropped before any formatting work, everything else is
//! routed to the matching `tracing` tier. Error and critical entries
//! are additionally kept in a bounded FIFO history so a surface can
//! show "recent problems" without scraping log files.
//!
//! Timing uses opaque correlation tokens: `start_timer` hands one out,
//! `end_timer` resolves it. An unknown or already-resolved token is a
//! warning, never a panic - instrumentation must not crash the caller.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub use vesper_types::{LogEntry, LogLevel};

/// Opaque correlation token linking a timing start to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Out-of-band notifications raised by the logger.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryNotice {
    /// An error or critical entry was logged.
    ErrorLogged(LogEntry),

    /// An operation exceeded its duration threshold.
    PerformanceWarning {
        operation: String,
        elapsed_ms: u64,
        threshold_ms: u64,
    },
}

#[derive(Debug)]
struct LoggerInner {
    level: LogLevel,
    history: VecDeque<LogEntry>,
    max_history: usize,
    active_timers: HashMap<TimerToken, (String, Instant)>,
    next_token: u64,
    /// Recorded durations (ms) keyed by operation name
    metrics: HashMap<String, Vec<u64>>,
    notices: Vec<UnboundedSender<TelemetryNotice>>,
}

/// Shared structured logger. Cheap to clone; all clones feed the same
/// history and metrics.
#[derive(Debug, Clone)]
pub struct Logger {
    inner: Arc<Mutex<LoggerInner>>,
}

impl Logger {
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LoggerInner {
                level: LogLevel::Info,
                history: VecDeque::new(),
                max_history,
                active_timers: HashMap::new(),
                next_token: 0,
                metrics: HashMap::new(),
                notices: Vec::new(),
            })),
        }
    }

    pub fn set_level(&self, level: LogLevel) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.level = level;
        }
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.inner
            .lock()
            .map_or(LogLevel::Info, |inner| inner.level)
    }

    /// Receive [`TelemetryNotice`]s raised by this logger.
    #[must_use]
    pub fn subscribe(&self) -> UnboundedReceiver<TelemetryNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inner) = self.inner.lock() {
            inner.notices.push(tx);
        }
        rx
    }

    /// Log a structured entry. Entries below the current level are a
    /// no-op; error and critical entries also land in the history.
    pub fn log(
        &self,
        level: LogLevel,
        message: &str,
        context: HashMap<String, String>,
        component: &str,
    ) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if level < inner.level {
            return;
        }

        match level {
            LogLevel::Debug => tracing::debug!(component, ?context, "{message}"),
            LogLevel::Info => tracing::info!(component, ?context, "{message}"),
            LogLevel::Warn => tracing::warn!(component, ?context, "{message}"),
            LogLevel::Error => tracing::error!(component, ?context, "{message}"),
            LogLevel::Critical => tracing::error!(component, ?context, critical = true, "{message}"),
        }

        if level >= LogLevel::Error {
            let entry = LogEntry {
                level,
                message: message.to_string(),
                context,
                component: component.to_string(),
                timestamp: now_millis(),
            };

            inner.history.push_back(entry.clone());
            while inner.history.len() > inner.max_history {
                inner.history.pop_front();
            }

            let notice = TelemetryNotice::ErrorLogged(entry);
            inner.notices.retain(|tx| tx.send(notice.clone()).is_ok());
        }
    }

    /// Convenience wrapper without structured context.
    pub fn log_message(&self, level: LogLevel, message: &str, component: &str) {
        self.log(level, message, HashMap::new(), component);
    }

    /// Snapshot of the error history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .map_or_else(|_| Vec::new(), |inner| inner.history.iter().cloned().collect())
    }

    /// Start timing `operation`. The returned token is unique per
    /// concurrent operation.
    #[must_use]
    pub fn start_timer(&self, operation: &str) -> TimerToken {
        let Ok(mut inner) = self.inner.lock() else {
            return TimerToken(u64::MAX);
        };
        inner.next_token += 1;
        let token = TimerToken(inner.next_token);
        inner
            .active_timers
            .insert(token, (operation.to_string(), Instant::now()));
        token
    }

    /// Stop timing and record the elapsed duration under the
    /// operation's name. Raises a performance warning when the
    /// duration exceeds `threshold_ms`. Unknown tokens warn and leave
    /// metrics untouched.
    // Elapsed millis fit u64 for any realistic operation duration
    #[allow(clippy::cast_possible_truncation)]
    pub fn end_timer(&self, token: TimerToken, threshold_ms: u64) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };

        let Some((operation, started)) = inner.active_timers.remove(&token) else {
            warn!("end_timer called with unknown or expired token {token:?}");
            return;
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        inner
            .metrics
            .entry(operation.clone())
            .or_default()
            .push(elapsed_ms);

        if elapsed_ms > threshold_ms {
            warn!("Operation '{operation}' took {elapsed_ms}ms (threshold {threshold_ms}ms)");
            let notice = TelemetryNotice::PerformanceWarning {
                operation,
                elapsed_ms,
                threshold_ms,
            };
            inner.notices.retain(|tx| tx.send(notice.clone()).is_ok());
        }
    }

    /// Recorded durations for `operation`, in call order.
    #[must_use]
    pub fn metrics(&self, operation: &str) -> Vec<u64> {
        self.inner.lock().map_or_else(
            |_| Vec::new(),
            |inner| inner.metrics.get(operation).cloned().unwrap_or_default(),
        )
    }
}

// u128 millis fits in u64 for realistic timestamps
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Install the global tracing subscriber for a host embedding the
/// core. Logs to stderr, and additionally to a file under `log_dir`
/// when one is given.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vesper={default_level}")));

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, "vesper.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keep the writer alive for the life of the process
        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .try_init()
            .context("tracing subscriber already installed")?;
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(filter)
            .try_init()
            .context("tracing subscriber already installed")?;
    }

    Ok(())
}
