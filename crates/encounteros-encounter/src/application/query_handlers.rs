//! Query handlers for the Encounter context.
//!
//! Read-only projections of the encounter for the presentation layer. Views
//! never feed back into the state.

use encounteros_core::aggregate::AggregateRoot;
use encounteros_core::error::DomainError;
use encounteros_core::repository::SnapshotRepository;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{EncounterMode, EncounterState};
use crate::domain::combatant::{Affiliation, Combatant};
use crate::domain::snapshot::from_stored_snapshot;

/// A combatant card as the display draws it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantView {
    /// The combatant identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Ally or enemy.
    pub affiliation: Affiliation,
    /// HP clamped to `[0, max_hp]`.
    pub hp: i32,
    /// Maximum HP.
    pub max_hp: i32,
    /// HP at or below zero.
    pub down: bool,
    /// Whether it is this combatant's turn.
    pub active: bool,
    /// Resolved initiative, if any.
    pub initiative: Option<i32>,
    /// Status-effect keys, sorted.
    pub statuses: Vec<String>,
    /// Portrait reference.
    pub portrait: Option<String>,
}

/// The dialog box contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogView {
    /// The block identifier.
    pub id: Uuid,
    /// Speaker label.
    pub speaker: String,
    /// Body text.
    pub text: String,
    /// Portrait reference.
    pub portrait: Option<String>,
}

/// Read-only view of the whole encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterView {
    /// The encounter identifier.
    pub encounter_id: Uuid,
    /// Revision the view was built from.
    pub revision: u64,
    /// Peace or combat.
    pub mode: EncounterMode,
    /// Round number; only in combat.
    pub round: Option<u32>,
    /// Visible combatants: turn order in combat, insertion order at peace
    /// with enemies hidden.
    pub combatants: Vec<CombatantView>,
    /// The combatant whose turn it is.
    pub active_combatant: Option<Uuid>,
    /// The live dialog block.
    pub live_block: Option<DialogView>,
}

fn combatant_view(combatant: &Combatant, active: Option<Uuid>) -> CombatantView {
    CombatantView {
        id: combatant.id,
        name: combatant.name.clone(),
        affiliation: combatant.affiliation,
        hp: combatant.hp.clamp(0, combatant.max_hp.max(0)),
        max_hp: combatant.max_hp,
        down: combatant.is_down(),
        active: active == Some(combatant.id),
        initiative: combatant.resolved_initiative(),
        statuses: combatant.statuses.iter().cloned().collect(),
        portrait: combatant.portrait.clone(),
    }
}

/// Projects the encounter into the view the display renders.
#[must_use]
pub fn project_encounter(state: &EncounterState) -> EncounterView {
    let active_combatant = state.active_combatant().map(|c| c.id);
    let (round, combatants) = match state.mode() {
        EncounterMode::Combat => (
            Some(state.round()),
            state
                .turn_order()
                .into_iter()
                .map(|c| combatant_view(c, active_combatant))
                .collect(),
        ),
        EncounterMode::Peace => (
            None,
            state
                .combatants()
                .iter()
                .filter(|c| c.affiliation == Affiliation::Ally)
                .map(|c| combatant_view(c, None))
                .collect(),
        ),
    };
    let live_block = state
        .live_block()
        .and_then(|id| state.block(id))
        .map(|b| DialogView {
            id: b.id,
            speaker: b.speaker.clone(),
            text: b.text.clone(),
            portrait: b.portrait.clone(),
        });

    EncounterView {
        encounter_id: state.id,
        revision: state.revision(),
        mode: state.mode(),
        round,
        combatants,
        active_combatant,
        live_block,
    }
}

/// Loads the latest snapshot and projects it.
///
/// Returns `Ok(None)` if nothing has been written yet.
///
/// # Errors
///
/// Returns `DomainError` if the snapshot cannot be read or interpreted.
pub async fn get_encounter_view(
    repo: &dyn SnapshotRepository,
) -> Result<Option<EncounterView>, DomainError> {
    let Some(snapshot) = repo.load_snapshot().await? else {
        return Ok(None);
    };
    let state = from_stored_snapshot(&snapshot)?;
    Ok(Some(project_encounter(&state)))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use encounteros_test_support::{FixedClock, MockRng, RecordingSnapshotRepository};
    use uuid::Uuid;

    use super::*;
    use crate::domain::combatant::CombatantDraft;
    use crate::domain::dialog::BlockDraft;
    use crate::domain::snapshot::to_stored_snapshot;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn party() -> (EncounterState, Uuid, Uuid) {
        let clock = fixed_clock();
        let mut state = EncounterState::new(Uuid::new_v4());
        let ally = state
            .add_combatant(CombatantDraft::new("Ayla", Affiliation::Ally, 10), Uuid::new_v4(), &clock)
            .unwrap();
        let enemy = state
            .add_combatant(
                CombatantDraft::new("Orc", Affiliation::Enemy, 15).with_initiative(20),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        (state, ally, enemy)
    }

    #[test]
    fn test_enemies_hidden_at_peace() {
        let (state, ally, _) = party();

        let view = project_encounter(&state);

        assert_eq!(view.mode, EncounterMode::Peace);
        assert_eq!(view.round, None);
        let ids: Vec<Uuid> = view.combatants.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ally]);
    }

    #[test]
    fn test_combat_view_follows_turn_order_and_marks_active() {
        let (mut state, ally, enemy) = party();
        state
            .enter_combat(&mut MockRng, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        let view = project_encounter(&state);

        let ids: Vec<Uuid> = view.combatants.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![enemy, ally]);
        assert_eq!(view.active_combatant, Some(enemy));
        assert!(view.combatants[0].active);
        assert!(!view.combatants[1].active);
        assert_eq!(view.round, Some(1));
    }

    #[test]
    fn test_hp_is_clamped_for_display_only() {
        let (mut state, ally, _) = party();
        let clock = fixed_clock();
        state.adjust_hp(ally, -25, Uuid::new_v4(), &clock).unwrap();

        let view = project_encounter(&state);

        assert_eq!(view.combatants[0].hp, 0);
        assert!(view.combatants[0].down);
        assert_eq!(state.combatant(ally).unwrap().hp, -15);

        state.set_hp(ally, 40, Uuid::new_v4(), &clock).unwrap();
        assert_eq!(project_encounter(&state).combatants[0].hp, 10);
    }

    #[test]
    fn test_live_block_is_projected() {
        let (mut state, ..) = party();
        let clock = fixed_clock();
        let block = state.create_block(BlockDraft::new("Orc", "Grr."), Uuid::new_v4(), &clock);
        assert!(project_encounter(&state).live_block.is_none());

        state.make_current(block, Uuid::new_v4(), &clock).unwrap();

        let live = project_encounter(&state).live_block.unwrap();
        assert_eq!(live.id, block);
        assert_eq!(live.text, "Grr.");
    }

    #[tokio::test]
    async fn test_get_encounter_view_reads_latest_snapshot() {
        let (state, ..) = party();
        let snapshot = to_stored_snapshot(&state, &fixed_clock()).unwrap();
        let repo = RecordingSnapshotRepository::with_snapshot(snapshot);

        let view = get_encounter_view(&repo).await.unwrap().unwrap();

        assert_eq!(view.encounter_id, state.id);
        assert_eq!(view.revision, 2);
    }

    #[tokio::test]
    async fn test_get_encounter_view_without_snapshot_is_none() {
        let repo = RecordingSnapshotRepository::new();

        assert!(get_encounter_view(&repo).await.unwrap().is_none());
    }
}
