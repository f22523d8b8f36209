//! Command handlers for the Encounter context.
//!
//! This is the single mutation path of the controller: apply commands to the
//! in-memory state, persist one snapshot, and only then report success. A
//! failed write restores the state as it was before the commands ran.

use std::time::Duration;

use encounteros_core::aggregate::AggregateRoot;
use encounteros_core::clock::Clock;
use encounteros_core::command::Command;
use encounteros_core::error::DomainError;
use encounteros_core::repository::SnapshotRepository;
use encounteros_core::rng::DeterministicRng;
use uuid::Uuid;

use crate::domain::aggregates::EncounterState;
use crate::domain::commands::{EncounterCommand, EncounterCommandKind};
use crate::domain::events::EncounterEvent;
use crate::domain::snapshot::{from_stored_snapshot, to_stored_snapshot};

/// Base delay between snapshot write attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Outcome of a committed command or batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterCommandResult {
    /// Revision after the commit.
    pub revision: u64,
    /// Events recorded by the commit, oldest first.
    pub events: Vec<EncounterEvent>,
    /// IDs of combatants and blocks created by the commit.
    pub created_ids: Vec<Uuid>,
}

/// Applies one operation to the in-memory state without persisting it.
///
/// Returns the ID of the combatant or block the operation created, if any.
///
/// # Errors
///
/// Returns whatever the engine operation reports. The state is left
/// unchanged on error.
pub fn apply_command(
    state: &mut EncounterState,
    kind: &EncounterCommandKind,
    correlation_id: Uuid,
    clock: &dyn Clock,
    rng: &mut dyn DeterministicRng,
) -> Result<Option<Uuid>, DomainError> {
    use EncounterCommandKind as K;

    match kind {
        K::EnterCombat => state.enter_combat(rng, correlation_id, clock)?,
        K::ExitCombat => state.exit_combat(correlation_id, clock),
        K::AdvanceTurn => state.advance_turn(correlation_id, clock)?,
        K::PreviousTurn => state.previous_turn(correlation_id, clock)?,
        K::SetInitiative {
            combatant_id,
            initiative,
        } => state.set_initiative(*combatant_id, *initiative, correlation_id, clock)?,
        K::AdjustHp {
            combatant_id,
            delta,
        } => state.adjust_hp(*combatant_id, *delta, correlation_id, clock)?,
        K::SetHp { combatant_id, hp } => state.set_hp(*combatant_id, *hp, correlation_id, clock)?,
        K::AddCombatant { draft } => {
            return state
                .add_combatant(draft.clone(), correlation_id, clock)
                .map(Some);
        }
        K::RemoveCombatant { combatant_id } => {
            state.remove_combatant(*combatant_id, correlation_id, clock)?;
        }
        K::EditCombatant {
            combatant_id,
            patch,
        } => state.edit_combatant(*combatant_id, patch, correlation_id, clock)?,
        K::ToggleStatus { combatant_id, key } => {
            state.toggle_status(*combatant_id, key, correlation_id, clock)?;
        }
        K::SetStatuses {
            combatant_id,
            statuses,
        } => state.set_statuses(*combatant_id, statuses.clone(), correlation_id, clock)?,
        K::DuplicateCombatant { combatant_id } => {
            return state
                .duplicate_combatant(*combatant_id, correlation_id, clock)
                .map(Some);
        }
        K::ClearCombatants => state.clear_combatants(correlation_id, clock),
        K::CreateBlock { draft } => {
            return Ok(Some(state.create_block(draft.clone(), correlation_id, clock)));
        }
        K::EditBlock { block_id, patch } => {
            state.edit_block(*block_id, patch, correlation_id, clock)?;
        }
        K::DuplicateBlock { block_id } => {
            return state
                .duplicate_block(*block_id, correlation_id, clock)
                .map(Some);
        }
        K::MakeCurrent { block_id } => state.make_current(*block_id, correlation_id, clock)?,
        K::AdvanceDialog => state.advance_dialog(correlation_id, clock),
        K::PreviousDialog => state.previous_dialog(correlation_id, clock),
        K::RemoveBlock { block_id } => state.remove_block(*block_id, correlation_id, clock)?,
        K::Republish => state.republish(correlation_id, clock),
    }
    Ok(None)
}

/// Handles a single command: applies it and persists the new snapshot.
///
/// # Errors
///
/// See [`handle_batch`].
pub async fn handle_command(
    state: &mut EncounterState,
    command: &EncounterCommand,
    clock: &dyn Clock,
    rng: &mut dyn DeterministicRng,
    repo: &dyn SnapshotRepository,
    write_retries: u32,
) -> Result<EncounterCommandResult, DomainError> {
    handle_batch(
        state,
        std::slice::from_ref(command),
        clock,
        rng,
        repo,
        write_retries,
    )
    .await
}

/// Handles a batch of commands as one unit.
///
/// Each command bumps the revision as usual, but the snapshot is written
/// once for the whole batch. If any command fails, or the snapshot cannot be
/// written after `write_retries` extra attempts, the state is restored to
/// what it was before the batch and nothing is reported as committed.
///
/// A batch that changes nothing is not written.
///
/// # Errors
///
/// Returns the first engine error of the batch, or `DomainError::IoFault`
/// if persistence keeps failing.
pub async fn handle_batch(
    state: &mut EncounterState,
    commands: &[EncounterCommand],
    clock: &dyn Clock,
    rng: &mut dyn DeterministicRng,
    repo: &dyn SnapshotRepository,
    write_retries: u32,
) -> Result<EncounterCommandResult, DomainError> {
    state.clear_uncommitted_events();
    let before = state.clone();
    let mut created_ids = Vec::new();

    for command in commands {
        match apply_command(state, &command.kind, command.correlation_id, clock, rng) {
            Ok(created) => created_ids.extend(created),
            Err(e) => {
                tracing::warn!(
                    correlation_id = %command.correlation_id,
                    command_type = command.command_type(),
                    error = %e,
                    "command rejected"
                );
                *state = before;
                return Err(e);
            }
        }
    }

    if state.revision() == before.revision() {
        return Ok(EncounterCommandResult {
            revision: state.revision(),
            events: Vec::new(),
            created_ids,
        });
    }

    let persisted = match to_stored_snapshot(state, clock) {
        Ok(snapshot) => save_with_retries(repo, &snapshot, write_retries).await,
        Err(e) => Err(e),
    };
    if let Err(e) = persisted {
        tracing::error!(
            revision = state.revision(),
            error = %e,
            "snapshot write failed, rolling back"
        );
        *state = before;
        return Err(e);
    }

    let events = state.uncommitted_events().to_vec();
    state.clear_uncommitted_events();
    for command in commands {
        tracing::info!(
            correlation_id = %command.correlation_id,
            command_type = command.command_type(),
            revision = state.revision(),
            "command committed"
        );
    }

    Ok(EncounterCommandResult {
        revision: state.revision(),
        events,
        created_ids,
    })
}

async fn save_with_retries(
    repo: &dyn SnapshotRepository,
    snapshot: &encounteros_core::repository::StoredSnapshot,
    write_retries: u32,
) -> Result<(), DomainError> {
    let mut attempt = 0;
    loop {
        match repo.save_snapshot(snapshot).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < write_retries => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "retrying snapshot write");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Loads the encounter from the durable snapshot, or starts a new one if
/// nothing has been written yet.
///
/// # Errors
///
/// Returns `DomainError` if the snapshot cannot be read or interpreted.
pub async fn load_or_create(repo: &dyn SnapshotRepository) -> Result<EncounterState, DomainError> {
    match repo.load_snapshot().await? {
        Some(snapshot) => {
            let state = from_stored_snapshot(&snapshot)?;
            tracing::info!(
                encounter_id = %state.id,
                revision = state.revision(),
                "encounter restored"
            );
            Ok(state)
        }
        None => {
            let state = EncounterState::new(Uuid::now_v7());
            tracing::info!(encounter_id = %state.id, "new encounter");
            Ok(state)
        }
    }
}
