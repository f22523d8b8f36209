//! Aggregate root for the Encounter context.
//!
//! `EncounterState` is the canonical world model shared by the controller and
//! every reader. The turn engine (`turn.rs`) and the dialog engine
//! (`dialog.rs`) are the only code that mutates it, and every mutation that
//! changes observable state goes through [`EncounterState::record`], which
//! bumps the revision exactly once.

use encounteros_core::aggregate::AggregateRoot;
use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use encounteros_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::combatant::Combatant;
use super::dialog::DialogBlock;
use super::events::{EncounterEvent, EncounterEventKind};
use super::turn::verify_dense_order;

/// Whether turn order is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterMode {
    /// No turn order; enemies are hidden on the display.
    #[default]
    Peace,
    /// Turn order assigned and the active-turn pointer is valid.
    Combat,
}

/// The aggregate root for an encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterState {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Number of committed mutations.
    pub(crate) revision: u64,
    /// Peace or combat.
    pub(crate) mode: EncounterMode,
    /// Combatants in insertion order.
    pub(crate) combatants: Vec<Combatant>,
    /// Index into the turn order; only set in combat.
    pub(crate) active_turn: Option<usize>,
    /// Combat round, starting at 1.
    pub(crate) round: u32,
    /// Dialog blocks in authoring order.
    pub(crate) dialog_blocks: Vec<DialogBlock>,
    /// The block currently projected to the display.
    pub(crate) live_block: Option<Uuid>,
    /// Display cursor into authoring order.
    pub(crate) dialog_cursor: usize,
    /// Uncommitted events pending persistence.
    #[serde(skip)]
    uncommitted_events: Vec<EncounterEvent>,
}

impl EncounterState {
    /// Creates an empty encounter at peace.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            revision: 0,
            mode: EncounterMode::Peace,
            combatants: Vec::new(),
            active_turn: None,
            round: 1,
            dialog_blocks: Vec::new(),
            live_block: None,
            dialog_cursor: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> EncounterMode {
        self.mode
    }

    /// Combatants in insertion order.
    #[must_use]
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Looks up a combatant by ID.
    #[must_use]
    pub fn combatant(&self, id: Uuid) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Active turn index, if combat is running with at least one combatant.
    #[must_use]
    pub fn active_turn(&self) -> Option<usize> {
        self.active_turn
    }

    /// Current combat round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Dialog blocks in authoring order.
    #[must_use]
    pub fn dialog_blocks(&self) -> &[DialogBlock] {
        &self.dialog_blocks
    }

    /// Looks up a dialog block by ID.
    #[must_use]
    pub fn block(&self, id: Uuid) -> Option<&DialogBlock> {
        self.dialog_blocks.iter().find(|b| b.id == id)
    }

    /// ID of the live dialog block.
    #[must_use]
    pub fn live_block(&self) -> Option<Uuid> {
        self.live_block
    }

    /// Display cursor position in authoring order.
    #[must_use]
    pub fn dialog_cursor(&self) -> usize {
        self.dialog_cursor
    }

    pub(crate) fn combatant_index(&self, id: Uuid) -> Result<usize, DomainError> {
        self.combatants
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DomainError::combatant_not_found(id))
    }

    pub(crate) fn block_index(&self, id: Uuid) -> Result<usize, DomainError> {
        self.dialog_blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| DomainError::block_not_found(id))
    }

    /// Commits one observable mutation: bumps the revision and records the
    /// event describing it.
    pub(crate) fn record(
        &mut self,
        kind: EncounterEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        self.revision += 1;
        tracing::debug!(
            revision = self.revision,
            event_type = kind.event_type(),
            "encounter mutated"
        );
        let event = EncounterEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                revision: self.revision,
                correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Bumps the revision without changing content so every reader rebuilds
    /// its projection.
    pub fn republish(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        self.record(
            EncounterEventKind::SnapshotRepublished { mode: self.mode },
            correlation_id,
            clock,
        );
    }

    /// Checks every structural invariant of the model.
    ///
    /// Readers run this on each freshly loaded snapshot and reject the update
    /// if it fails.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ScheduleConflict` if turn positions are not a
    /// dense permutation in combat (or are present at peace), and
    /// `DomainError::InvalidState` for an inconsistent pointer, cursor or
    /// live flag.
    pub fn verify_invariants(&self) -> Result<(), DomainError> {
        let positions: Vec<Option<usize>> =
            self.combatants.iter().map(|c| c.turn_position).collect();
        match self.mode {
            EncounterMode::Combat => {
                verify_dense_order(&positions)?;
                match self.active_turn {
                    Some(active) if active >= self.combatants.len() => {
                        return Err(DomainError::InvalidState(format!(
                            "active turn {active} out of range for {} combatants",
                            self.combatants.len()
                        )));
                    }
                    None if !self.combatants.is_empty() => {
                        return Err(DomainError::InvalidState(
                            "combat without an active turn".to_owned(),
                        ));
                    }
                    _ => {}
                }
            }
            EncounterMode::Peace => {
                if positions.iter().any(Option::is_some) {
                    return Err(DomainError::ScheduleConflict(
                        "turn positions assigned outside combat".to_owned(),
                    ));
                }
                if self.active_turn.is_some() {
                    return Err(DomainError::InvalidState(
                        "active turn set outside combat".to_owned(),
                    ));
                }
            }
        }

        let flagged: Vec<Uuid> = self
            .dialog_blocks
            .iter()
            .filter(|b| b.live)
            .map(|b| b.id)
            .collect();
        let expected: Vec<Uuid> = self.live_block.into_iter().collect();
        if flagged != expected {
            return Err(DomainError::InvalidState(format!(
                "live flags {flagged:?} disagree with live block {:?}",
                self.live_block
            )));
        }
        if !self.dialog_blocks.is_empty() && self.dialog_cursor >= self.dialog_blocks.len() {
            return Err(DomainError::InvalidState(format!(
                "dialog cursor {} out of range for {} blocks",
                self.dialog_cursor,
                self.dialog_blocks.len()
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for EncounterState {
    type Event = EncounterEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use encounteros_core::event::DomainEvent;
    use encounteros_test_support::FixedClock;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_new_encounter_starts_at_peace_with_revision_zero() {
        let state = EncounterState::new(Uuid::new_v4());

        assert_eq!(state.mode(), EncounterMode::Peace);
        assert_eq!(state.revision(), 0);
        assert_eq!(state.round(), 1);
        assert!(state.active_turn().is_none());
        assert!(state.verify_invariants().is_ok());
    }

    #[test]
    fn test_republish_bumps_revision_once_and_records_event() {
        // Arrange
        let encounter_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let clock = fixed_clock();
        let mut state = EncounterState::new(encounter_id);

        // Act
        state.republish(correlation_id, &clock);

        // Assert
        assert_eq!(state.revision(), 1);
        let events = state.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "encounter.snapshot_republished");

        let meta = events[0].metadata();
        assert_eq!(meta.aggregate_id, encounter_id);
        assert_eq!(meta.revision, 1);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.occurred_at, clock.0);
    }

    #[test]
    fn test_reads_do_not_change_revision() {
        let mut state = EncounterState::new(Uuid::new_v4());
        state.republish(Uuid::new_v4(), &fixed_clock());

        let _ = state.mode();
        let _ = state.combatants();
        let _ = state.dialog_blocks();
        let _ = state.verify_invariants();

        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_uncommitted_events_are_not_serialized() {
        let mut state = EncounterState::new(Uuid::new_v4());
        state.republish(Uuid::new_v4(), &fixed_clock());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("uncommitted_events").is_none());

        let restored: EncounterState = serde_json::from_value(json).unwrap();
        assert_eq!(restored.revision(), 1);
        assert!(restored.uncommitted_events().is_empty());
    }

    #[test]
    fn test_verify_invariants_rejects_positions_at_peace() {
        let mut state = EncounterState::new(Uuid::new_v4());
        state.combatants.push(
            crate::domain::combatant::CombatantDraft::new(
                "Ayla",
                crate::domain::combatant::Affiliation::Ally,
                10,
            )
            .into_combatant(Uuid::new_v4()),
        );
        state.combatants[0].turn_position = Some(0);

        match state.verify_invariants() {
            Err(DomainError::ScheduleConflict(_)) => {}
            other => panic!("expected ScheduleConflict, got {other:?}"),
        }
    }
}
