//! Launcher event loop.
//!
//! [`Launcher`] is the composition point of the search flow: it
//! consumes [`CoreEvent`]s from a UI surface, runs the debounced
//! query pipeline over the catalog, and pushes [`CoreUpdate`]s back.
//! The debounce timer is a single pinned sleep inside the select loop,
//! so arming it for a new keystroke implicitly cancels the previous
//! deadline - only the most recent keystroke can commit.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep_until};
use tracing::debug;
use vesper_types::{CatalogEntry, CoreEvent, CoreUpdate};

use crate::config::ConfigHandle;
use crate::search::{DebounceTicket, Ranker, SearchSession, SelectionPolicy, SubstringRanker};
use crate::telemetry::Logger;

/// Core launcher engine
pub struct Launcher<R: Ranker = SubstringRanker> {
    session: SearchSession,
    ranker: R,
    catalog: Vec<CatalogEntry>,
    config: ConfigHandle,
    logger: Logger,

    /// Channel to send updates to the UI surface
    update_tx: UnboundedSender<CoreUpdate>,

    /// Ticket for the armed debounce deadline, if any
    pending: Option<DebounceTicket>,
}

impl Launcher<SubstringRanker> {
    /// Create a launcher with the default substring ranker. Returns
    /// the launcher and the receiver for UI updates.
    #[must_use]
    pub fn new(
        catalog: Vec<CatalogEntry>,
        config: ConfigHandle,
        logger: Logger,
    ) -> (Self, UnboundedReceiver<CoreUpdate>) {
        Self::with_ranker(SubstringRanker, catalog, config, logger)
    }
}

impl<R: Ranker> Launcher<R> {
    #[must_use]
    pub fn with_ranker(
        ranker: R,
        catalog: Vec<CatalogEntry>,
        config: ConfigHandle,
        logger: Logger,
    ) -> (Self, UnboundedReceiver<CoreUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                session: SearchSession::new(),
                ranker,
                catalog,
                config,
                logger,
                update_tx,
                pending: None,
            },
            update_rx,
        )
    }

    /// Replace the catalog snapshot (the host re-enumerates apps,
    /// wallpapers change, ...). Takes effect at the next commit.
    pub fn set_catalog(&mut self, catalog: Vec<CatalogEntry>) {
        self.catalog = catalog;
    }

    #[must_use]
    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    fn selection_policy(&self) -> SelectionPolicy {
        if self.config.snapshot().launcher.wrap_selection {
            SelectionPolicy::Wrap
        } else {
            SelectionPolicy::Clamp
        }
    }

    fn send(&self, update: CoreUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn close_surface(&mut self) {
        let was_open = self.session.is_open();
        self.session.close();
        self.pending = None;
        if was_open {
            self.send(CoreUpdate::Visibility { open: false });
        }
    }

    /// Process one event. Returns the new debounce deadline when a
    /// keystroke (re)armed the timer.
    fn handle_event(&mut self, event: CoreEvent) -> Option<Instant> {
        match event {
            CoreEvent::Open => {
                if self.session.open() {
                    self.send(CoreUpdate::Visibility { open: true });
                }
                None
            }

            CoreEvent::QueryChanged { query } => {
                if !self.session.is_open() {
                    debug!("Ignoring keystroke while surface closed");
                    return None;
                }
                let ticket = self.session.query_changed(query);
                self.pending = Some(ticket);

                // Interval is read live, it may change mid-session
                let debounce_ms = self.config.snapshot().launcher.debounce_ms;
                Some(Instant::now() + Duration::from_millis(debounce_ms))
            }

            CoreEvent::SelectNext => {
                let policy = self.selection_policy();
                if let Some(index) = self.session.select_next(policy) {
                    self.send(CoreUpdate::Selection { index: Some(index) });
                }
                None
            }

            CoreEvent::SelectPrevious => {
                let policy = self.selection_policy();
                if let Some(index) = self.session.select_previous(policy) {
                    self.send(CoreUpdate::Selection { index: Some(index) });
                }
                None
            }

            CoreEvent::Accept => {
                let prefix = self.config.snapshot().launcher.action_prefix;
                match self.session.accept(&prefix) {
                    Some(outcome) => {
                        self.send(CoreUpdate::Dispatch {
                            action: outcome.action,
                        });
                        if outcome.close {
                            self.close_surface();
                        }
                    }
                    None => debug!("Accept with no selection, dropping"),
                }
                None
            }

            CoreEvent::Escape => {
                self.close_surface();
                None
            }

            CoreEvent::ConfigReloaded => {
                self.config.reload();
                None
            }
        }
    }

    /// The armed debounce deadline elapsed: commit the pending query.
    fn commit_pending(&mut self) {
        let Some(ticket) = self.pending.take() else {
            return;
        };

        let config = self.config.snapshot();
        let token = self.logger.start_timer("search");
        let committed = self.session.commit(
            ticket,
            &mut self.ranker,
            &self.catalog,
            config.launcher.max_displayed_results,
            &config.launcher.action_prefix,
        );
        self.logger
            .end_timer(token, config.telemetry.slow_op_threshold_ms);

        if committed {
            self.send(CoreUpdate::Results {
                results: self.session.results().to_vec(),
            });
            self.send(CoreUpdate::Selection {
                index: self.session.selected(),
            });
        }
    }

    /// Run the event loop until the surface drops its sender.
    pub async fn run(mut self, mut events: UnboundedReceiver<CoreEvent>) {
        let debounce = sleep_until(Instant::now());
        tokio::pin!(debounce);
        let mut armed = false;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Some(deadline) = self.handle_event(event) {
                        debounce.as_mut().reset(deadline);
                        armed = true;
                    } else if self.pending.is_none() {
                        // Escape/close dropped the in-flight debounce
                        armed = false;
                    }
                }
                () = &mut debounce, if armed => {
                    armed = false;
                    self.commit_pending();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use vesper_types::Action;

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::app("firefox", "Firefox", "/usr/bin/firefox"),
            CatalogEntry::app("files", "Files", "/usr/bin/nautilus"),
        ]
    }

    fn launcher() -> (Launcher, UnboundedReceiver<CoreUpdate>) {
        Launcher::new(
            catalog(),
            ConfigHandle::in_memory(Config::default()),
            Logger::new(10),
        )
    }

    #[test]
    fn test_open_emits_visibility() {
        let (mut launcher, mut updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        assert_eq!(
            updates.try_recv().unwrap(),
            CoreUpdate::Visibility { open: true }
        );
    }

    #[test]
    fn test_keystroke_arms_debounce() {
        let (mut launcher, _updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        let deadline = launcher.handle_event(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        });
        assert!(deadline.is_some());
        assert!(launcher.pending.is_some());
    }

    #[test]
    fn test_keystroke_while_closed_is_ignored() {
        let (mut launcher, _updates) = launcher();
        let deadline = launcher.handle_event(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        });
        assert!(deadline.is_none());
        assert!(launcher.pending.is_none());
    }

    #[test]
    fn test_commit_emits_results_and_selection() {
        let (mut launcher, mut updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        launcher.handle_event(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        });
        launcher.commit_pending();

        let _visibility = updates.try_recv().unwrap();
        match updates.try_recv().unwrap() {
            CoreUpdate::Results { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].entry.id, "firefox");
            }
            other => panic!("Expected Results, got {other:?}"),
        }
        assert_eq!(
            updates.try_recv().unwrap(),
            CoreUpdate::Selection { index: Some(0) }
        );
    }

    #[test]
    fn test_escape_closes_and_drops_pending() {
        let (mut launcher, mut updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        launcher.handle_event(CoreEvent::QueryChanged {
            query: "fire".to_string(),
        });
        launcher.handle_event(CoreEvent::Escape);

        assert!(launcher.pending.is_none());
        assert!(!launcher.session.is_open());

        // A late commit attempt does nothing
        launcher.commit_pending();
        let _visibility_open = updates.try_recv().unwrap();
        assert_eq!(
            updates.try_recv().unwrap(),
            CoreUpdate::Visibility { open: false }
        );
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_accept_dispatches_and_closes() {
        let (mut launcher, mut updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        launcher.handle_event(CoreEvent::QueryChanged {
            query: "firefox".to_string(),
        });
        launcher.commit_pending();
        launcher.handle_event(CoreEvent::Accept);

        let mut saw_dispatch = false;
        let mut saw_close = false;
        while let Ok(update) = updates.try_recv() {
            match update {
                CoreUpdate::Dispatch {
                    action: Action::LaunchApp { entry },
                } => {
                    assert_eq!(entry.id, "firefox");
                    saw_dispatch = true;
                }
                CoreUpdate::Visibility { open: false } => saw_close = true,
                _ => {}
            }
        }
        assert!(saw_dispatch);
        assert!(saw_close);
    }

    #[test]
    fn test_selection_updates_emitted() {
        let (mut launcher, mut updates) = launcher();
        launcher.handle_event(CoreEvent::Open);
        launcher.handle_event(CoreEvent::QueryChanged {
            query: "fi".to_string(),
        });
        launcher.commit_pending();
        launcher.handle_event(CoreEvent::SelectNext);

        let mut last_selection = None;
        while let Ok(update) = updates.try_recv() {
            if let CoreUpdate::Selection { index } = update {
                last_selection = index;
            }
        }
        assert_eq!(last_selection, Some(1));
    }
}
