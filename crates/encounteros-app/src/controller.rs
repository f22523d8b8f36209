//! The controller process.
//!
//! Owns the encounter. GM key presses, forwarded input and actions drained
//! from the command queue all go through [`Controller::dispatch`], so there
//! is one mutation path and one snapshot writer.

use std::path::Path;

use encounteros_core::aggregate::AggregateRoot;
use encounteros_core::error::DomainError;
use encounteros_core::rng::DeterministicRng;
use encounteros_encounter::application::command_handlers::{
    EncounterCommandResult, handle_batch, load_or_create,
};
use encounteros_encounter::application::encounter_files::EncounterFile;
use encounteros_encounter::domain::aggregates::EncounterState;
use encounteros_encounter::domain::commands::{EncounterCommand, EncounterCommandKind};
use encounteros_encounter::domain::snapshot::to_stored_snapshot;
use encounteros_input::application::resolve::{Resolution, Selection, resolve_action};
use encounteros_input::application::router::{ForwardedInput, InputRouter, Role, Route};
use encounteros_input::domain::actions::Action;
use encounteros_input::domain::keymap::{KeyChord, Keymap};
use uuid::Uuid;

use crate::input_line::{InputLine, parse_input_line};
use crate::state::AppState;

/// Controller-side session.
pub struct Controller {
    app: AppState,
    state: EncounterState,
    selection: Selection,
    router: InputRouter,
    rng: Box<dyn DeterministicRng>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("selection", &self.selection)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Restores the encounter from the snapshot (or starts a new one),
    /// publishes it so displays have something to read, and applies the
    /// configured encounter file if the encounter is still empty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the snapshot cannot be read or written, or
    /// the encounter file is invalid.
    pub async fn start(app: AppState, rng: Box<dyn DeterministicRng>) -> Result<Self, DomainError> {
        let state = load_or_create(app.snapshots.as_ref()).await?;
        let router = InputRouter::new(
            Role::Controller,
            app.config.process_name.clone(),
            Keymap::default(),
        );
        let mut controller = Self {
            app,
            state,
            selection: Selection::default(),
            router,
            rng,
        };

        if controller.state.revision() == 0 {
            let snapshot = to_stored_snapshot(&controller.state, controller.app.clock.as_ref())?;
            controller.app.snapshots.save_snapshot(&snapshot).await?;
        }

        let is_empty = controller.state.combatants().is_empty()
            && controller.state.dialog_blocks().is_empty();
        if let Some(path) = controller.app.config.encounter_file.clone() {
            if is_empty {
                controller.load_encounter_file(&path).await?;
            } else {
                tracing::info!(
                    path = %path.display(),
                    "encounter restored from snapshot, not loading encounter file"
                );
            }
        }

        Ok(controller)
    }

    /// Current encounter state.
    #[must_use]
    pub fn state(&self) -> &EncounterState {
        &self.state
    }

    /// Current GM selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Selects a combatant for HP actions; `None` clears the selection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the combatant does not exist.
    pub fn select_combatant(&mut self, combatant_id: Option<Uuid>) -> Result<(), DomainError> {
        if let Some(id) = combatant_id.filter(|id| self.state.combatant(*id).is_none()) {
            return Err(DomainError::combatant_not_found(id));
        }
        self.selection.combatant = combatant_id;
        Ok(())
    }

    /// Selects a dialog block for `MakeCurrentSelected`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the block does not exist.
    pub fn select_block(&mut self, block_id: Option<Uuid>) -> Result<(), DomainError> {
        if let Some(id) = block_id.filter(|id| self.state.block(*id).is_none()) {
            return Err(DomainError::block_not_found(id));
        }
        self.selection.block = block_id;
        Ok(())
    }

    /// Runs commands as one batch: one snapshot write, events appended to
    /// the session log.
    ///
    /// # Errors
    ///
    /// Returns the engine or persistence error; the encounter is unchanged.
    pub async fn execute(
        &mut self,
        commands: &[EncounterCommand],
    ) -> Result<EncounterCommandResult, DomainError> {
        let result = handle_batch(
            &mut self.state,
            commands,
            self.app.clock.as_ref(),
            self.rng.as_mut(),
            self.app.snapshots.as_ref(),
            self.app.config.write_retries,
        )
        .await?;

        if let Err(e) = self.app.session_log.append(&result.events).await {
            tracing::warn!(error = %e, "failed to append to session log");
        }
        self.selection.retain_existing(&self.state);
        Ok(result)
    }

    /// Runs a single command.
    ///
    /// # Errors
    ///
    /// See [`Controller::execute`].
    pub async fn execute_one(
        &mut self,
        kind: EncounterCommandKind,
    ) -> Result<EncounterCommandResult, DomainError> {
        self.execute(&[EncounterCommand::new(kind)]).await
    }

    /// Reads an encounter file and applies it as one batch.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the file cannot be read or applied.
    pub async fn load_encounter_file(
        &mut self,
        path: &Path,
    ) -> Result<EncounterCommandResult, DomainError> {
        let file = EncounterFile::read(path).await?;
        let commands = file.to_commands(&self.state)?;
        let result = self.execute(&commands).await?;
        tracing::info!(
            path = %path.display(),
            revision = result.revision,
            created = result.created_ids.len(),
            "encounter file loaded"
        );
        Ok(result)
    }

    /// Resolves a logical action against the current selection and applies
    /// it. Returns `None` when the action had nothing to act on.
    ///
    /// # Errors
    ///
    /// Returns the engine or persistence error of the resulting command.
    pub async fn dispatch(
        &mut self,
        action: Action,
    ) -> Result<Option<EncounterCommandResult>, DomainError> {
        match resolve_action(action, &self.state, &self.selection) {
            Resolution::Command(kind) => self.execute_one(kind).await.map(Some),
            Resolution::ReloadFiles => self.reload_files().await.map(Some),
            Resolution::NoTarget => {
                tracing::debug!(action = action.name(), "action has no target");
                Ok(None)
            }
        }
    }

    /// Handles a GM key press.
    ///
    /// # Errors
    ///
    /// See [`Controller::dispatch`].
    pub async fn handle_key(
        &mut self,
        chord: &KeyChord,
    ) -> Result<Option<EncounterCommandResult>, DomainError> {
        let route = self.router.route_key(chord);
        self.apply_route(route).await
    }

    /// Handles input from the external forwarder.
    ///
    /// # Errors
    ///
    /// See [`Controller::dispatch`].
    pub async fn handle_forwarded(
        &mut self,
        input: &ForwardedInput,
    ) -> Result<Option<EncounterCommandResult>, DomainError> {
        let route = self.router.route_forwarded(input);
        self.apply_route(route).await
    }

    /// Handles one line of terminal input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an unparseable line or a
    /// preferences line, which only the display accepts, and otherwise see
    /// [`Controller::dispatch`].
    pub async fn handle_input_line(
        &mut self,
        line: &str,
    ) -> Result<Option<EncounterCommandResult>, DomainError> {
        match parse_input_line(line)? {
            Some(InputLine::Key(chord)) => self.handle_key(&chord).await,
            Some(InputLine::Forwarded(input)) => self.handle_forwarded(&input).await,
            Some(InputLine::Preferences(_)) => Err(DomainError::Validation(
                "display preferences are written by the display process".into(),
            )),
            None => Ok(None),
        }
    }

    async fn apply_route(
        &mut self,
        route: Route,
    ) -> Result<Option<EncounterCommandResult>, DomainError> {
        match route {
            Route::Apply {
                action,
                delivery_id,
            } => match self.dispatch(action).await {
                Err(e @ DomainError::IoFault(_)) => {
                    self.router.forget(delivery_id);
                    Err(e)
                }
                other => other,
            },
            Route::Enqueue { .. } | Route::Ignore(_) => Ok(None),
        }
    }

    /// Applies every pending queued action in arrival order, then
    /// acknowledges the entries it consumed. Returns how many actions were
    /// applied.
    ///
    /// Actions the engine rejects are consumed and logged. A persistence
    /// failure stops the drain; that entry and the ones after it stay
    /// queued for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the queue cannot be read or
    /// acknowledged.
    pub async fn drain_commands(&mut self) -> Result<usize, DomainError> {
        let pending = self.app.commands.pending().await?;
        let mut through = None;
        let mut applied = 0;

        for entry in pending {
            match self.router.route_queued(entry.action, entry.delivery_id) {
                Route::Apply { action, .. } => match self.dispatch(action).await {
                    Ok(_) => applied += 1,
                    Err(e @ DomainError::IoFault(_)) => {
                        self.router.forget(entry.delivery_id);
                        tracing::error!(seq = entry.seq, error = %e, "queued action not persisted");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            seq = entry.seq,
                            action = action.name(),
                            error = %e,
                            "queued action rejected"
                        );
                    }
                },
                Route::Enqueue { .. } | Route::Ignore(_) => {
                    tracing::debug!(seq = entry.seq, "queued action skipped");
                }
            }
            through = Some(entry.seq);
        }

        if let Some(seq) = through {
            self.app.commands.acknowledge(seq).await?;
        }
        Ok(applied)
    }

    /// Re-reads the encounter file (only if it replaces the roster) and the
    /// display preferences, then republishes so every reader rebuilds.
    async fn reload_files(&mut self) -> Result<EncounterCommandResult, DomainError> {
        let mut commands = Vec::new();

        if let Some(path) = self.app.config.encounter_file.clone() {
            match EncounterFile::read(&path).await {
                Ok(file) if file.replace => commands.extend(file.to_commands(&self.state)?),
                Ok(_) => tracing::debug!(
                    path = %path.display(),
                    "encounter file does not replace the roster, skipped on reload"
                ),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "encounter file reload failed, keeping current encounter"
                ),
            }
        }

        match self.app.preferences.load().await {
            Ok(preferences) => {
                tracing::info!(theme = %preferences.theme, "display preferences reloaded");
            }
            Err(e) => tracing::warn!(error = %e, "display preferences unreadable"),
        }

        commands.push(EncounterCommand::new(EncounterCommandKind::Republish));
        self.execute(&commands).await
    }
}
