//! Ownership routing and duplicate-delivery suppression.
//!
//! The controller owns the encounter, so it applies actions directly. The
//! display only relays: its local key presses go onto the command channel.
//! Forwarded hotkeys carry a delivery ID and a target process name; a
//! delivery ID already seen recently is dropped so a retrying forwarder can
//! never apply the same key press twice.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use encounteros_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actions::Action;
use crate::domain::keymap::{KeyChord, Keymap};

/// How many delivery IDs are remembered for duplicate suppression.
pub const DEDUPE_WINDOW: usize = 256;

/// Which side of the sync protocol this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The single writer.
    Controller,
    /// A read-only surface.
    Display,
}

impl Role {
    /// Lowercase name, also the default process name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controller" | "gm" => Ok(Self::Controller),
            "display" | "overlay" => Ok(Self::Display),
            other => Err(DomainError::Validation(format!(
                "unknown role {other:?}, expected controller or display"
            ))),
        }
    }
}

/// An action pushed in by the external hotkey forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedInput {
    /// One ID per physical key event; retries reuse it.
    pub delivery_id: Uuid,
    /// Name of the process the forwarder aimed at.
    pub target: String,
    /// The requested action.
    #[serde(flatten)]
    pub action: Action,
}

/// Why an input was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The key has no binding.
    Unbound,
    /// Forwarded to a different process.
    OtherTarget,
    /// Delivery ID already handled.
    Duplicate,
}

/// What to do with an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Apply to the local encounter (controller only).
    Apply {
        /// The action.
        action: Action,
        /// Delivery the action came from.
        delivery_id: Uuid,
    },
    /// Append to the command channel (display only).
    Enqueue {
        /// The action.
        action: Action,
        /// Delivery ID to store with the entry.
        delivery_id: Uuid,
    },
    /// Drop it.
    Ignore(IgnoreReason),
}

/// Routes input according to this process's role.
#[derive(Debug, Clone)]
pub struct InputRouter {
    role: Role,
    process_name: String,
    keymap: Keymap,
    recent: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
}

impl InputRouter {
    /// Creates a router for `role`, answering forwarded input aimed at
    /// `process_name`.
    #[must_use]
    pub fn new(role: Role, process_name: impl Into<String>, keymap: Keymap) -> Self {
        Self {
            role,
            process_name: process_name.into(),
            keymap,
            recent: VecDeque::with_capacity(DEDUPE_WINDOW),
            seen: HashSet::with_capacity(DEDUPE_WINDOW),
        }
    }

    /// This process's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The name forwarded input must target.
    #[must_use]
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Routes a local key press. Each press is its own delivery.
    pub fn route_key(&mut self, chord: &KeyChord) -> Route {
        let Some(action) = self.keymap.action_for(chord) else {
            tracing::debug!(%chord, "unbound key");
            return Route::Ignore(IgnoreReason::Unbound);
        };
        self.route_action(action, Uuid::new_v4())
    }

    /// Routes input from the external forwarder.
    pub fn route_forwarded(&mut self, input: &ForwardedInput) -> Route {
        if !input.target.eq_ignore_ascii_case(&self.process_name) {
            tracing::debug!(
                target_process = %input.target,
                delivery_id = %input.delivery_id,
                "forwarded input for another process"
            );
            return Route::Ignore(IgnoreReason::OtherTarget);
        }
        self.route_action(input.action, input.delivery_id)
    }

    /// Routes an action drained from the command channel. Only meaningful on
    /// the controller; the delivery ID still goes through duplicate
    /// suppression so a re-appended entry is not applied twice.
    pub fn route_queued(&mut self, action: Action, delivery_id: Uuid) -> Route {
        if !self.remember(delivery_id) {
            return Route::Ignore(IgnoreReason::Duplicate);
        }
        Route::Apply {
            action,
            delivery_id,
        }
    }

    fn route_action(&mut self, action: Action, delivery_id: Uuid) -> Route {
        if !self.remember(delivery_id) {
            tracing::debug!(%delivery_id, action = action.name(), "duplicate delivery dropped");
            return Route::Ignore(IgnoreReason::Duplicate);
        }
        match self.role {
            Role::Controller => Route::Apply {
                action,
                delivery_id,
            },
            Role::Display => Route::Enqueue {
                action,
                delivery_id,
            },
        }
    }

    /// Drops a delivery ID from the window so the same delivery can be
    /// routed again, e.g. after the command it produced failed to persist.
    pub fn forget(&mut self, delivery_id: Uuid) {
        if self.seen.remove(&delivery_id) {
            self.recent.retain(|id| *id != delivery_id);
        }
    }

    /// Records a delivery ID; returns `false` if it was already in the
    /// window.
    fn remember(&mut self, delivery_id: Uuid) -> bool {
        if !self.seen.insert(delivery_id) {
            return false;
        }
        self.recent.push_back(delivery_id);
        if self.recent.len() > DEDUPE_WINDOW {
            if let Some(evicted) = self.recent.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}
