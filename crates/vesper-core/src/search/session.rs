use tracing::debug;
use vesper_types::{Action, CatalogEntry, EntryKind, SearchHit};

use super::Ranker;

/// Phase of the query input pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    /// No query activity
    #[default]
    Idle,
    /// Keystrokes arrived; the debounce timer is running
    Pending,
    /// Results reflect the current query
    Committed,
}

/// What selection does at list boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Stop at the first/last element (default)
    #[default]
    Clamp,
    /// Wrap around to the other end
    Wrap,
}

/// Ticket for a pending debounce deadline. Only the ticket from the
/// most recent keystroke commits; older tickets are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket {
    generation: u64,
}

/// Result of accepting the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptOutcome {
    pub action: Action,
    /// Whether the search surface should close after dispatch
    pub close: bool,
}

/// Per-open search state: the query, its debounce phase, and the
/// committed result sequence with its highlighted index.
#[derive(Debug, Default)]
pub struct SearchSession {
    query: String,
    phase: QueryPhase,
    results: Vec<SearchHit>,
    selected: Option<usize>,
    debounce_generation: u64,
    open: bool,
}

impl SearchSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    #[must_use]
    pub fn results(&self) -> &[SearchHit] {
        &self.results
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected_entry(&self) -> Option<&CatalogEntry> {
        self.results.get(self.selected?).map(|hit| &hit.entry)
    }

    /// Open the search surface. The query is always empty here: close
    /// clears it, there is no "resume last search".
    pub fn open(&mut self) -> bool {
        if self.open {
            return false;
        }
        debug_assert!(self.query.is_empty());
        self.open = true;
        true
    }

    /// Record a keystroke. Moves to `Pending` and returns a fresh
    /// ticket; the previous pending ticket (if any) becomes stale, so
    /// only the most recent keystroke's deadline can commit.
    pub fn query_changed(&mut self, text: impl Into<String>) -> DebounceTicket {
        self.query = text.into();
        self.phase = QueryPhase::Pending;
        self.debounce_generation += 1;
        DebounceTicket {
            generation: self.debounce_generation,
        }
    }

    /// The debounce deadline for `ticket` elapsed. Stale tickets are
    /// discarded; the current one recomputes the result sequence from
    /// the full catalog and resets the selection to the first row.
    /// Returns whether a commit happened.
    ///
    /// A query in action mode (leading `action_prefix`) searches on
    /// the command word only; the remainder is the command's argument
    /// text and takes no part in matching.
    pub fn commit<R: Ranker>(
        &mut self,
        ticket: DebounceTicket,
        ranker: &mut R,
        catalog: &[CatalogEntry],
        limit: usize,
        action_prefix: &str,
    ) -> bool {
        if ticket.generation != self.debounce_generation {
            debug!("Discarding stale debounce ticket");
            return false;
        }

        let search_text = self.effective_query(action_prefix).to_string();
        self.phase = QueryPhase::Committed;
        self.results = ranker.rank(&search_text, catalog, limit);
        self.selected = if self.results.is_empty() { None } else { Some(0) };
        true
    }

    /// The part of the query that participates in matching.
    fn effective_query(&self, action_prefix: &str) -> &str {
        if action_prefix.is_empty() {
            return &self.query;
        }
        match self.query.strip_prefix(action_prefix) {
            Some(rest) => rest.split_whitespace().next().unwrap_or(""),
            None => &self.query,
        }
    }

    /// Move the selection down one row.
    pub fn select_next(&mut self, policy: SelectionPolicy) -> Option<usize> {
        let current = self.selected?;
        let last = self.results.len() - 1;

        self.selected = Some(match policy {
            SelectionPolicy::Clamp => {
                if current < last {
                    current + 1
                } else {
                    last
                }
            }
            SelectionPolicy::Wrap => {
                if current >= last {
                    0
                } else {
                    current + 1
                }
            }
        });
        self.selected
    }

    /// Move the selection up one row.
    pub fn select_previous(&mut self, policy: SelectionPolicy) -> Option<usize> {
        let current = self.selected?;
        let last = self.results.len() - 1;

        self.selected = Some(match policy {
            SelectionPolicy::Clamp => current.saturating_sub(1),
            SelectionPolicy::Wrap => {
                if current == 0 {
                    last
                } else {
                    current - 1
                }
            }
        });
        self.selected
    }

    /// Accept the current selection. The dispatch branches on the
    /// query's mode:
    /// - selected item is a background image: set wallpaper, close
    /// - query starts with `action_prefix`: run the bound command
    ///   handler with the committed results as context, stay open
    /// - otherwise: launch the selected item, close
    #[must_use]
    pub fn accept(&self, action_prefix: &str) -> Option<AcceptOutcome> {
        let entry = self.selected_entry()?.clone();

        if let EntryKind::Wallpaper { path } = &entry.kind {
            return Some(AcceptOutcome {
                action: Action::SetWallpaper { path: path.clone() },
                close: true,
            });
        }

        if !action_prefix.is_empty() && self.query.starts_with(action_prefix) {
            return Some(AcceptOutcome {
                action: Action::RunCommand {
                    entry,
                    context: self.results.clone(),
                },
                close: false,
            });
        }

        Some(AcceptOutcome {
            action: Action::LaunchApp { entry },
            close: true,
        })
    }

    /// Close the surface: drop in-flight debounce state and clear the
    /// query so the next open starts from empty.
    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.results.clear();
        self.selected = None;
        self.phase = QueryPhase::Idle;
        // Invalidate any pending debounce ticket
        self.debounce_generation += 1;
    }
}
