//! The display process.
//!
//! Follows the snapshot and never mutates the encounter. Its only writes
//! are command-queue appends and its own preferences file.

use std::fmt::Write as _;

use encounteros_core::error::DomainError;
use encounteros_core::repository::StoredSnapshot;
use encounteros_encounter::application::query_handlers::{EncounterView, project_encounter};
use encounteros_encounter::domain::aggregates::EncounterMode;
use encounteros_encounter::domain::snapshot::from_stored_snapshot;
use encounteros_input::application::router::{ForwardedInput, InputRouter, Role, Route};
use encounteros_input::domain::actions::Action;
use encounteros_input::domain::keymap::{KeyChord, Keymap};
use encounteros_sync::display_preferences::DisplayPreferences;
use encounteros_sync::snapshot_poller::{PollOutcome, SnapshotPoller};

use crate::input_line::{InputLine, parse_input_line};
use crate::state::AppState;

/// Display-side session.
#[derive(Debug)]
pub struct Display {
    app: AppState,
    poller: SnapshotPoller<EncounterView>,
    router: InputRouter,
    preferences: DisplayPreferences,
    connection_lost: bool,
}

impl Display {
    /// Loads the display preferences and sets up the snapshot poller. The
    /// display starts without a projection until the first poll.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the preferences file exists but
    /// cannot be read.
    pub async fn start(app: AppState) -> Result<Self, DomainError> {
        let preferences = app.preferences.load().await?;
        let poller = SnapshotPoller::new(
            app.snapshots.clone(),
            Box::new(|snapshot: &StoredSnapshot| {
                from_stored_snapshot(snapshot).map(|state| project_encounter(&state))
            }),
            app.config.stale_after,
        );
        let router = InputRouter::new(
            Role::Display,
            app.config.process_name.clone(),
            Keymap::default(),
        );
        Ok(Self {
            app,
            poller,
            router,
            preferences,
            connection_lost: false,
        })
    }

    /// The last good projection.
    #[must_use]
    pub fn view(&self) -> Option<&EncounterView> {
        self.poller.projection()
    }

    /// Current display preferences.
    #[must_use]
    pub fn preferences(&self) -> &DisplayPreferences {
        &self.preferences
    }

    /// Whether the snapshot has gone unread for longer than the staleness
    /// threshold.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        self.connection_lost
    }

    /// Polls the snapshot once and re-evaluates staleness. Returns `true`
    /// if the frame should be redrawn.
    pub async fn tick(&mut self) -> bool {
        let outcome = self.poller.poll(self.app.clock.as_ref()).await;
        let lost = self.poller.is_stale(self.app.clock.now());
        let changed = lost != self.connection_lost;
        if changed {
            if lost {
                tracing::warn!("connection lost");
            } else {
                tracing::info!("connection restored");
            }
            self.connection_lost = lost;
        }
        matches!(outcome, PollOutcome::Updated { .. }) || changed
    }

    /// Handles a local key press by relaying it to the controller. Returns
    /// the queue sequence number, or `None` if the key was ignored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the command queue cannot be written.
    pub async fn handle_key(&mut self, chord: &KeyChord) -> Result<Option<u64>, DomainError> {
        let route = self.router.route_key(chord);
        self.enqueue(route).await
    }

    /// Handles input from the external forwarder.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the command queue cannot be written.
    pub async fn handle_forwarded(
        &mut self,
        input: &ForwardedInput,
    ) -> Result<Option<u64>, DomainError> {
        let route = self.router.route_forwarded(input);
        self.enqueue(route).await
    }

    /// Handles one line of terminal input. A preferences line is saved to
    /// `display.json` and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an unparseable line and
    /// `DomainError::IoFault` if the queue or preferences file cannot be
    /// written.
    pub async fn handle_input_line(&mut self, line: &str) -> Result<Option<u64>, DomainError> {
        match parse_input_line(line)? {
            Some(InputLine::Key(chord)) => self.handle_key(&chord).await,
            Some(InputLine::Forwarded(input)) => self.handle_forwarded(&input).await,
            Some(InputLine::Preferences(preferences)) => {
                self.save_preferences(preferences).await?;
                tracing::info!(theme = %self.preferences.theme, "display preferences saved");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn enqueue(&mut self, route: Route) -> Result<Option<u64>, DomainError> {
        let Route::Enqueue {
            action,
            delivery_id,
        } = route
        else {
            return Ok(None);
        };

        if action == Action::ReloadFiles {
            if let Err(e) = self.reload_preferences().await {
                tracing::warn!(error = %e, "keeping current display preferences");
            }
        }

        match self.app.commands.append(delivery_id, action).await {
            Ok(seq) => {
                tracing::debug!(seq, action = action.name(), %delivery_id, "action enqueued");
                Ok(Some(seq))
            }
            Err(e) => {
                self.router.forget(delivery_id);
                Err(e)
            }
        }
    }

    /// Re-reads `display.json`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the file exists but cannot be read.
    pub async fn reload_preferences(&mut self) -> Result<&DisplayPreferences, DomainError> {
        self.preferences = self.app.preferences.load().await?;
        tracing::info!(theme = %self.preferences.theme, "display preferences reloaded");
        Ok(&self.preferences)
    }

    /// Replaces the display preferences and writes them to `display.json`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the write fails; the previous
    /// preferences stay in effect.
    pub async fn save_preferences(
        &mut self,
        preferences: DisplayPreferences,
    ) -> Result<(), DomainError> {
        self.app.preferences.save(&preferences).await?;
        self.preferences = preferences;
        Ok(())
    }

    /// Renders the current frame as plain text.
    #[must_use]
    pub fn render(&self) -> String {
        render_frame(self.view(), self.connection_lost)
    }
}

/// Plain-text rendering of a view for terminal output.
#[must_use]
pub fn render_frame(view: Option<&EncounterView>, connection_lost: bool) -> String {
    let mut out = String::new();
    if connection_lost {
        out.push_str("!! connection lost !!\n");
    }
    let Some(view) = view else {
        out.push_str("waiting for encounter...\n");
        return out;
    };

    match (view.mode, view.round) {
        (EncounterMode::Combat, Some(round)) => {
            let _ = writeln!(out, "COMBAT - round {round}");
        }
        (EncounterMode::Combat, None) => out.push_str("COMBAT\n"),
        (EncounterMode::Peace, _) => out.push_str("PEACE\n"),
    }

    for combatant in &view.combatants {
        let marker = if combatant.active { '>' } else { ' ' };
        let _ = write!(
            out,
            "{marker} {} {}/{}",
            combatant.name, combatant.hp, combatant.max_hp
        );
        if combatant.down {
            out.push_str(" DOWN");
        }
        if !combatant.statuses.is_empty() {
            let _ = write!(out, " [{}]", combatant.statuses.join(", "));
        }
        out.push('\n');
    }

    if let Some(block) = &view.live_block {
        let _ = writeln!(out, "-- {}: {}", block.speaker, block.text);
    }
    out
}
