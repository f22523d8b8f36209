//! Resolution of logical actions into encounter commands.
//!
//! Runs on the controller against its current state and the GM's selection.

use encounteros_encounter::domain::aggregates::{EncounterMode, EncounterState};
use encounteros_encounter::domain::commands::EncounterCommandKind;
use uuid::Uuid;

use crate::domain::actions::Action;

/// What the GM has selected in the controller UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected combatant.
    pub combatant: Option<Uuid>,
    /// Selected dialog block.
    pub block: Option<Uuid>,
}

impl Selection {
    /// Drops selections that no longer exist in `state`.
    pub fn retain_existing(&mut self, state: &EncounterState) {
        if self.combatant.is_some_and(|id| state.combatant(id).is_none()) {
            self.combatant = None;
        }
        if self.block.is_some_and(|id| state.block(id).is_none()) {
            self.block = None;
        }
    }
}

/// Outcome of resolving an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Run this command.
    Command(EncounterCommandKind),
    /// Re-read files and republish; handled by the controller loop.
    ReloadFiles,
    /// The action has nothing to act on.
    NoTarget,
}

/// Resolves `action` against the current state and selection.
///
/// `ToggleMode` becomes enter or exit combat depending on the mode. HP
/// actions hit the selected combatant, or the active one if nothing is
/// selected. `MakeCurrentSelected` pushes the selected block, or the block
/// under the display cursor.
#[must_use]
pub fn resolve_action(action: Action, state: &EncounterState, selection: &Selection) -> Resolution {
    let command = match action {
        Action::AdvanceTurn => EncounterCommandKind::AdvanceTurn,
        Action::PreviousTurn => EncounterCommandKind::PreviousTurn,
        Action::ToggleMode => match state.mode() {
            EncounterMode::Peace => EncounterCommandKind::EnterCombat,
            EncounterMode::Combat => EncounterCommandKind::ExitCombat,
        },
        Action::AdvanceDialog => EncounterCommandKind::AdvanceDialog,
        Action::PreviousDialog => EncounterCommandKind::PreviousDialog,
        Action::MakeCurrentSelected => {
            let target = selection
                .block
                .filter(|id| state.block(*id).is_some())
                .or_else(|| {
                    state
                        .dialog_blocks()
                        .get(state.dialog_cursor())
                        .map(|b| b.id)
                });
            let Some(block_id) = target else {
                return Resolution::NoTarget;
            };
            EncounterCommandKind::MakeCurrent { block_id }
        }
        Action::AdjustSelectedHp { delta } => {
            let target = selection
                .combatant
                .filter(|id| state.combatant(*id).is_some())
                .or_else(|| state.active_combatant().map(|c| c.id));
            let Some(combatant_id) = target else {
                return Resolution::NoTarget;
            };
            EncounterCommandKind::AdjustHp {
                combatant_id,
                delta,
            }
        }
        Action::ReloadFiles => return Resolution::ReloadFiles,
    };
    Resolution::Command(command)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use encounteros_encounter::domain::combatant::{Affiliation, CombatantDraft};
    use encounteros_encounter::domain::dialog::BlockDraft;
    use encounteros_test_support::{FixedClock, MockRng};

    use super::*;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn encounter() -> (EncounterState, Uuid, Uuid) {
        let clock = fixed_clock();
        let mut state = EncounterState::new(Uuid::new_v4());
        let ayla = state
            .add_combatant(
                CombatantDraft::new("Ayla", Affiliation::Ally, 10).with_initiative(15),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        let orc = state
            .add_combatant(
                CombatantDraft::new("Orc", Affiliation::Enemy, 10).with_initiative(5),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        (state, ayla, orc)
    }

    #[test]
    fn test_toggle_mode_follows_current_mode() {
        let (mut state, ..) = encounter();
        let selection = Selection::default();

        assert_eq!(
            resolve_action(Action::ToggleMode, &state, &selection),
            Resolution::Command(EncounterCommandKind::EnterCombat)
        );

        state
            .enter_combat(&mut MockRng, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        assert_eq!(
            resolve_action(Action::ToggleMode, &state, &selection),
            Resolution::Command(EncounterCommandKind::ExitCombat)
        );
    }

    #[test]
    fn test_hp_targets_selection_then_active_combatant() {
        let (mut state, ayla, orc) = encounter();
        let action = Action::AdjustSelectedHp { delta: -5 };

        assert_eq!(
            resolve_action(action, &state, &Selection::default()),
            Resolution::NoTarget
        );

        let selection = Selection {
            combatant: Some(orc),
            block: None,
        };
        assert_eq!(
            resolve_action(action, &state, &selection),
            Resolution::Command(EncounterCommandKind::AdjustHp {
                combatant_id: orc,
                delta: -5,
            })
        );

        state
            .enter_combat(&mut MockRng, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        assert_eq!(
            resolve_action(action, &state, &Selection::default()),
            Resolution::Command(EncounterCommandKind::AdjustHp {
                combatant_id: ayla,
                delta: -5,
            })
        );
    }

    #[test]
    fn test_make_current_targets_selection_then_cursor_block() {
        let (mut state, ..) = encounter();
        let clock = fixed_clock();
        assert_eq!(
            resolve_action(Action::MakeCurrentSelected, &state, &Selection::default()),
            Resolution::NoTarget
        );
        let first = state.create_block(BlockDraft::new("GM", "One"), Uuid::new_v4(), &clock);
        let second = state.create_block(BlockDraft::new("GM", "Two"), Uuid::new_v4(), &clock);

        assert_eq!(
            resolve_action(Action::MakeCurrentSelected, &state, &Selection::default()),
            Resolution::Command(EncounterCommandKind::MakeCurrent { block_id: first })
        );
        let selection = Selection {
            combatant: None,
            block: Some(second),
        };
        assert_eq!(
            resolve_action(Action::MakeCurrentSelected, &state, &selection),
            Resolution::Command(EncounterCommandKind::MakeCurrent { block_id: second })
        );
    }

    #[test]
    fn test_reload_files_is_left_to_the_caller() {
        let (state, ..) = encounter();

        assert_eq!(
            resolve_action(Action::ReloadFiles, &state, &Selection::default()),
            Resolution::ReloadFiles
        );
    }

    #[test]
    fn test_retain_existing_clears_removed_selection() {
        let (mut state, ayla, _) = encounter();
        let mut selection = Selection {
            combatant: Some(ayla),
            block: Some(Uuid::new_v4()),
        };

        state
            .remove_combatant(ayla, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        selection.retain_existing(&state);

        assert_eq!(selection, Selection::default());
    }
}
