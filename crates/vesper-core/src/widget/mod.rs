//! Interactive-widget state.
//!
//! Every bar widget (volume pill, workspace button, launcher entry)
//! embeds an [`InteractiveWidget`] instead of inheriting from a shared
//! base: the machine owns the state, the widget owns the machine.
//! Whether the widget accepts input and how it is drawn are pure
//! functions of `(state, hovered)` and are never stored.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Interaction states of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    #[default]
    Normal,
    Loading,
    Disabled,
    Error,
    Focused,
}

impl std::fmt::Display for WidgetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Loading => "loading",
            Self::Disabled => "disabled",
            Self::Error => "error",
            Self::Focused => "focused",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for WidgetState {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        match raw {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Loading),
            2 => Ok(Self::Disabled),
            3 => Ok(Self::Error),
            4 => Ok(Self::Focused),
            other => Err(other),
        }
    }
}

/// How an activation arrived. A pointer click and a key press that
/// belong to the same logical action share a press id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    Pointer,
    EnterKey,
    SpaceKey,
}

/// Visual feedback derived from widget state. Synchronous and pure;
/// there is no async visual state to get out of sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visuals {
    pub opacity: f64,
    pub scale: f64,
}

/// Compute visual feedback for `(state, hovered)`.
#[must_use]
pub fn visuals(state: WidgetState, hovered: bool) -> Visuals {
    let opacity = match state {
        WidgetState::Disabled => 0.4,
        WidgetState::Loading => 0.6,
        WidgetState::Normal | WidgetState::Error | WidgetState::Focused => 1.0,
    };

    let interactive = !matches!(state, WidgetState::Disabled | WidgetState::Loading);
    let scale = match (state, hovered && interactive) {
        (WidgetState::Focused, true) => 1.08,
        (WidgetState::Focused, false) => 1.02,
        (_, true) => 1.05,
        (_, false) => 1.0,
    };

    Visuals { opacity, scale }
}

/// Ticket for a pending temporary-disable restoration. Stale tickets
/// (superseded by a newer `disable_for`) are ignored on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTicket {
    generation: u64,
}

/// State machine embedded in each interactive widget.
#[derive(Debug)]
pub struct InteractiveWidget {
    name: String,
    state: WidgetState,
    hovered: bool,
    saved_state: Option<WidgetState>,
    restore_generation: u64,
    last_press_id: Option<u64>,
}

impl InteractiveWidget {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WidgetState::Normal,
            hovered: false,
            saved_state: None,
            restore_generation: 0,
            last_press_id: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.state
    }

    /// Whether input handling should act at all. Recomputed, never
    /// stored.
    #[must_use]
    pub fn interactive(&self) -> bool {
        !matches!(self.state, WidgetState::Disabled | WidgetState::Loading)
    }

    #[must_use]
    pub fn hovered(&self) -> bool {
        self.hovered
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    /// Current visual feedback.
    #[must_use]
    pub fn visuals(&self) -> Visuals {
        visuals(self.state, self.hovered)
    }

    /// Set the widget state. Same-state requests early-return so a
    /// notification handler calling back in cannot recurse. Returns
    /// whether the state actually changed.
    pub fn set_state(&mut self, state: WidgetState) -> bool {
        if state == self.state {
            return false;
        }
        debug!("[{}] widget {} -> {}", self.name, self.state, state);
        self.state = state;
        true
    }

    /// Set the widget state from an untrusted integer (surfaces speak
    /// ints over the wire). Invalid values are logged and ignored.
    pub fn set_state_raw(&mut self, raw: u8) -> bool {
        match WidgetState::try_from(raw) {
            Ok(state) => self.set_state(state),
            Err(value) => {
                warn!("[{}] Ignoring invalid widget state {value}", self.name);
                false
            }
        }
    }

    /// Force `Disabled` and capture the state to restore afterwards.
    /// The caller schedules the timer and calls [`restore`] with the
    /// returned ticket; a newer `disable_for` invalidates older
    /// tickets, and the restore target is re-captured at the newest
    /// call (last-writer-wins, no stacking).
    ///
    /// [`restore`]: InteractiveWidget::restore
    pub fn disable_for(&mut self) -> RestoreTicket {
        // When already disabled by a pending ticket, the state worth
        // restoring is the one we saved, not `Disabled` itself
        let captured = if self.state == WidgetState::Disabled {
            self.saved_state.take().unwrap_or(WidgetState::Normal)
        } else {
            self.state
        };

        self.saved_state = Some(captured);
        self.restore_generation += 1;
        self.state = WidgetState::Disabled;

        RestoreTicket {
            generation: self.restore_generation,
        }
    }

    /// Restore the state captured by the matching [`disable_for`]
    /// call. Stale tickets are a benign no-op.
    ///
    /// [`disable_for`]: InteractiveWidget::disable_for
    pub fn restore(&mut self, ticket: RestoreTicket) -> bool {
        if ticket.generation != self.restore_generation {
            debug!("[{}] Ignoring stale restore ticket", self.name);
            return false;
        }

        let target = self.saved_state.take().unwrap_or(WidgetState::Normal);
        self.set_state(target)
    }

    /// Process an activation. Returns `true` when a `clicked`
    /// notification should fire: at most once per press id, and never
    /// while non-interactive.
    pub fn activate(&mut self, source: ActivationSource, press_id: u64) -> bool {
        if !self.interactive() {
            debug!(
                "[{}] Dropping {source:?} activation while {}",
                self.name, self.state
            );
            return false;
        }

        if self.last_press_id == Some(press_id) {
            debug!("[{}] Duplicate activation for press {press_id}", self.name);
            return false;
        }

        self.last_press_id = Some(press_id);
        true
    }
}
