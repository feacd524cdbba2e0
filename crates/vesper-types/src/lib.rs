//! Shared types for Vesper shell components.
//!
//! This crate provides the types exchanged between the shell core and
//! its UI surfaces: catalog entries, search results, launcher events,
//! core updates, and toast payloads. All types are serializable so a
//! surface can live in another process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What activating a catalog entry means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// A desktop application; `exec` is the activation path.
    App { exec: String },

    /// A named command with a host-side handler.
    Command { command: String },

    /// A background image; `path` points at the image file.
    Wallpaper { path: String },
}

/// One entry of the application/command catalog.
///
/// The catalog itself is owned by the host shell; the core only
/// filters and ranks over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Stable identifier, unique within one catalog snapshot.
    pub id: String,

    /// Display label matched against the query.
    pub label: String,

    /// Extra terms that should also match (lower weight).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(flatten)]
    pub kind: EntryKind,
}

impl CatalogEntry {
    #[must_use]
    pub fn app(id: impl Into<String>, label: impl Into<String>, exec: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            keywords: Vec::new(),
            kind: EntryKind::App { exec: exec.into() },
        }
    }

    #[must_use]
    pub fn command(
        id: impl Into<String>,
        label: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            keywords: Vec::new(),
            kind: EntryKind::Command {
                command: command.into(),
            },
        }
    }

    #[must_use]
    pub fn wallpaper(id: impl Into<String>, label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            keywords: Vec::new(),
            kind: EntryKind::Wallpaper { path: path.into() },
        }
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// A ranked search hit over the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub entry: CatalogEntry,

    /// Ranking score; higher sorts first. Meaning depends on the
    /// active ranker, only the relative order is contractual.
    pub score: f64,
}

/// Events sent from a UI surface to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// Search surface opened.
    Open,

    /// Query text changed (every keystroke).
    QueryChanged { query: String },

    /// Move selection down one row.
    SelectNext,

    /// Move selection up one row.
    SelectPrevious,

    /// Accept the current selection (Enter).
    Accept,

    /// Close the search surface unconditionally.
    Escape,

    /// The config file changed on disk.
    ConfigReloaded,
}

/// Actions dispatched to the host shell on accept.
///
/// The core never launches anything itself; the host owns the process
/// table, the wallpaper setter, and the command handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Launch the selected application.
    LaunchApp { entry: CatalogEntry },

    /// Run the selected entry's bound command handler. The committed
    /// result list rides along as handler context.
    RunCommand {
        entry: CatalogEntry,
        context: Vec<SearchHit>,
    },

    /// Set the background image to the selected item's path.
    SetWallpaper { path: String },
}

/// Updates pushed from the core to UI surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreUpdate {
    /// Committed result list (full replacement).
    Results { results: Vec<SearchHit> },

    /// Highlighted row changed. `None` when the list is empty.
    Selection { index: Option<usize> },

    /// An action is ready for the host to perform.
    Dispatch { action: Action },

    /// Search surface visibility changed.
    Visibility { open: bool },

    /// Fire-and-forget toast request.
    Toast(Toast),
}

/// Payload for the notification/toast surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    pub body: String,

    /// Icon name hint; the surface resolves it against its own theme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_hint: Option<String>,
}

impl Toast {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon_hint: None,
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon_hint = Some(icon.into());
        self
    }
}

/// Severity tiers for structured log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

/// A structured log record as kept in the error history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,

    /// Structured context attached to the entry.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,

    /// Component tag, e.g. `"audio"` or `"launcher"`.
    pub component: String,

    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}
