//! Conversion between `EncounterState` and the durable snapshot envelope.

use encounteros_core::aggregate::AggregateRoot;
use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use encounteros_core::repository::StoredSnapshot;

use super::aggregates::EncounterState;

/// Major schema version of the serialized `EncounterState`.
pub const SCHEMA_VERSION: u32 = 1;

/// Serializes the state into a snapshot envelope stamped with its revision.
///
/// # Errors
///
/// Returns `DomainError::IoFault` if the state cannot be serialized.
pub fn to_stored_snapshot(
    state: &EncounterState,
    clock: &dyn Clock,
) -> Result<StoredSnapshot, DomainError> {
    let payload = serde_json::to_value(state)
        .map_err(|e| DomainError::IoFault(format!("failed to serialize encounter: {e}")))?;
    Ok(StoredSnapshot {
        schema_version: SCHEMA_VERSION,
        encounter_id: state.aggregate_id(),
        revision: Some(state.revision()),
        written_at: clock.now(),
        state: payload,
    })
}

/// Rebuilds the state from a snapshot envelope.
///
/// # Errors
///
/// Returns `DomainError::SyncStale` for a schema version this build does not
/// understand, `DomainError::IoFault` for a payload that does not parse, and
/// whatever `verify_invariants` reports for a structurally broken state.
pub fn from_stored_snapshot(snapshot: &StoredSnapshot) -> Result<EncounterState, DomainError> {
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(DomainError::SyncStale {
            found: snapshot.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    let mut state: EncounterState = serde_json::from_value(snapshot.state.clone())
        .map_err(|e| DomainError::IoFault(format!("malformed encounter snapshot: {e}")))?;
    if state.id != snapshot.encounter_id {
        return Err(DomainError::InvalidState(format!(
            "snapshot envelope names encounter {} but payload holds {}",
            snapshot.encounter_id, state.id
        )));
    }
    if let Some(revision) = snapshot.revision {
        state.revision = revision;
    }
    state.verify_invariants()?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::combatant::{Affiliation, CombatantDraft};
    use chrono::{TimeZone, Utc};
    use encounteros_test_support::{FixedClock, MockRng};
    use uuid::Uuid;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn sample_state() -> EncounterState {
        let clock = fixed_clock();
        let mut state = EncounterState::new(Uuid::new_v4());
        state
            .add_combatant(CombatantDraft::new("Ayla", Affiliation::Ally, 12), Uuid::new_v4(), &clock)
            .unwrap();
        state
            .add_combatant(CombatantDraft::new("Orc", Affiliation::Enemy, 15), Uuid::new_v4(), &clock)
            .unwrap();
        state
            .enter_combat(&mut MockRng, Uuid::new_v4(), &clock)
            .unwrap();
        state
    }

    #[test]
    fn test_snapshot_carries_revision_and_schema_version() {
        let state = sample_state();

        let snapshot = to_stored_snapshot(&state, &fixed_clock()).unwrap();

        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.encounter_id, state.id);
        assert_eq!(snapshot.revision, Some(3));
        assert_eq!(snapshot.written_at, fixed_clock().0);
    }

    #[test]
    fn test_snapshot_restores_turn_order() {
        let state = sample_state();
        let snapshot = to_stored_snapshot(&state, &fixed_clock()).unwrap();

        let restored = from_stored_snapshot(&snapshot).unwrap();

        let before: Vec<Uuid> = state.turn_order().iter().map(|c| c.id).collect();
        let after: Vec<Uuid> = restored.turn_order().iter().map(|c| c.id).collect();
        assert_eq!(before, after);
        assert_eq!(restored.revision(), state.revision());
        assert!(restored.uncommitted_events().is_empty());
    }

    #[test]
    fn test_other_schema_version_is_sync_stale() {
        let mut snapshot = to_stored_snapshot(&sample_state(), &fixed_clock()).unwrap();
        snapshot.schema_version = 2;

        match from_stored_snapshot(&snapshot).unwrap_err() {
            DomainError::SyncStale { found, supported } => {
                assert_eq!(found, 2);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected SyncStale, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload_is_io_fault() {
        let mut snapshot = to_stored_snapshot(&sample_state(), &fixed_clock()).unwrap();
        snapshot.state = serde_json::json!({ "mode": "brawl" });

        assert!(matches!(
            from_stored_snapshot(&snapshot),
            Err(DomainError::IoFault(_))
        ));
    }

    #[test]
    fn test_broken_turn_order_is_rejected() {
        let mut snapshot = to_stored_snapshot(&sample_state(), &fixed_clock()).unwrap();
        snapshot.state["combatants"][1]["turn_position"] = serde_json::json!(0);
        snapshot.state["combatants"][0]["turn_position"] = serde_json::json!(0);

        assert!(matches!(
            from_stored_snapshot(&snapshot),
            Err(DomainError::ScheduleConflict(_))
        ));
    }
}
