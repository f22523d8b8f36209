//! Turn engine: Peace/Combat mode, initiative resolution and turn
//! advancement.
//!
//! Every operation validates first and mutates second, so a failed call
//! leaves the encounter untouched. Calls that would not change anything
//! observable return without bumping the revision.

use std::collections::BTreeSet;

use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use encounteros_core::rng::DeterministicRng;
use uuid::Uuid;

use super::aggregates::{EncounterMode, EncounterState};
use super::combatant::{
    Combatant, CombatantDraft, CombatantPatch, base_name, next_suffix, used_suffixes,
};
use super::events::EncounterEventKind;

/// Faces on the initiative die.
const INITIATIVE_DIE: u32 = 20;

/// States of the turn engine.
///
/// `AwaitingInitiative` only exists while `enter_combat` runs; it is never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn order.
    Peace,
    /// Rolling initiative for combatants without an entered value.
    AwaitingInitiative,
    /// Turn order assigned.
    Combat,
}

impl From<EncounterMode> for TurnPhase {
    fn from(mode: EncounterMode) -> Self {
        match mode {
            EncounterMode::Peace => Self::Peace,
            EncounterMode::Combat => Self::Combat,
        }
    }
}

/// Checks that assigned positions form a dense `0..N` permutation.
///
/// # Errors
///
/// Returns `DomainError::ScheduleConflict` on a missing, duplicated or
/// out-of-range position.
pub fn verify_dense_order(positions: &[Option<usize>]) -> Result<(), DomainError> {
    let mut seen = vec![false; positions.len()];
    for (idx, position) in positions.iter().enumerate() {
        let Some(position) = *position else {
            return Err(DomainError::ScheduleConflict(format!(
                "combatant at index {idx} has no turn position"
            )));
        };
        match seen.get_mut(position) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(DomainError::ScheduleConflict(format!(
                    "turn position {position} assigned twice"
                )));
            }
            None => {
                return Err(DomainError::ScheduleConflict(format!(
                    "turn position {position} out of range for {} combatants",
                    positions.len()
                )));
            }
        }
    }
    Ok(())
}

/// Rolls `1d20 + modifier`.
#[allow(clippy::cast_possible_wrap)]
fn roll_initiative(rng: &mut dyn DeterministicRng, modifier: i32) -> i32 {
    rng.next_u32_range(1, INITIATIVE_DIE) as i32 + modifier
}

impl EncounterState {
    /// Current turn-engine phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.mode.into()
    }

    /// Combatants sorted by turn position. Empty at peace.
    #[must_use]
    pub fn turn_order(&self) -> Vec<&Combatant> {
        if self.mode != EncounterMode::Combat {
            return Vec::new();
        }
        let mut ordered: Vec<_> = self
            .combatants
            .iter()
            .filter(|c| c.turn_position.is_some())
            .collect();
        ordered.sort_by_key(|c| c.turn_position);
        ordered
    }

    /// The combatant whose turn it is.
    #[must_use]
    pub fn active_combatant(&self) -> Option<&Combatant> {
        let active = self.active_turn?;
        self.combatants
            .iter()
            .find(|c| c.turn_position == Some(active))
    }

    fn require_combat(&self, operation: &str) -> Result<usize, DomainError> {
        if self.mode != EncounterMode::Combat {
            return Err(DomainError::InvalidState(format!(
                "{operation} requires combat"
            )));
        }
        Ok(self.combatants.len())
    }

    /// Resolves initiative and starts combat.
    ///
    /// Combatants without an entered initiative roll `1d20 + modifier` in
    /// insertion order. The party is then sorted by initiative descending,
    /// allies before enemies on ties, then by insertion order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if combat is already running or
    /// there is nobody to fight.
    pub fn enter_combat(
        &mut self,
        rng: &mut dyn DeterministicRng,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.mode == EncounterMode::Combat {
            return Err(DomainError::InvalidState(
                "encounter is already in combat".to_owned(),
            ));
        }
        if self.combatants.is_empty() {
            return Err(DomainError::InvalidState(
                "cannot enter combat without combatants".to_owned(),
            ));
        }
        tracing::debug!(phase = ?TurnPhase::AwaitingInitiative, "resolving initiative");

        let mut resolved = Vec::with_capacity(self.combatants.len());
        for combatant in &self.combatants {
            resolved.push(match combatant.initiative {
                Some(initiative) => initiative,
                None => roll_initiative(rng, combatant.initiative_modifier),
            });
        }

        let mut order: Vec<usize> = (0..self.combatants.len()).collect();
        // Stable sort keeps insertion order as the final tie-break.
        order.sort_by(|&a, &b| {
            resolved[b].cmp(&resolved[a]).then_with(|| {
                self.combatants[a]
                    .affiliation
                    .tie_break_rank()
                    .cmp(&self.combatants[b].affiliation.tie_break_rank())
            })
        });

        let mut positions = vec![None; self.combatants.len()];
        for (position, &idx) in order.iter().enumerate() {
            positions[idx] = Some(position);
        }
        verify_dense_order(&positions)?;

        for ((combatant, rolled), position) in
            self.combatants.iter_mut().zip(&resolved).zip(positions)
        {
            if combatant.initiative.is_none() {
                combatant.rolled_initiative = Some(*rolled);
            }
            combatant.turn_position = position;
        }
        self.mode = EncounterMode::Combat;
        self.active_turn = Some(0);
        self.round = 1;

        let order = order.iter().map(|&idx| self.combatants[idx].id).collect();
        self.record(
            EncounterEventKind::CombatEntered { order },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Ends combat. A no-op at peace.
    ///
    /// Rolled initiatives and turn positions are cleared; entered initiative
    /// values are kept for the next fight.
    pub fn exit_combat(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        if self.mode == EncounterMode::Peace {
            return;
        }
        for combatant in &mut self.combatants {
            combatant.rolled_initiative = None;
            combatant.turn_position = None;
        }
        self.mode = EncounterMode::Peace;
        self.active_turn = None;
        self.round = 1;
        self.record(EncounterEventKind::CombatExited, correlation_id, clock);
    }

    /// Moves the active turn forward, wrapping into the next round.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` at peace.
    pub fn advance_turn(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let len = self.require_combat("advancing the turn")?;
        let Some(active) = self.active_turn.filter(|_| len > 0) else {
            return Ok(());
        };
        let next = (active + 1) % len;
        if next == 0 {
            self.round += 1;
        }
        self.move_turn(next, correlation_id, clock);
        Ok(())
    }

    /// Moves the active turn back, stepping into the previous round on wrap.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` at peace.
    pub fn previous_turn(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let len = self.require_combat("moving to the previous turn")?;
        let Some(active) = self.active_turn.filter(|_| len > 0) else {
            return Ok(());
        };
        let previous = (active + len - 1) % len;
        if active == 0 {
            self.round = self.round.saturating_sub(1).max(1);
        }
        self.move_turn(previous, correlation_id, clock);
        Ok(())
    }

    fn move_turn(&mut self, active_turn: usize, correlation_id: Uuid, clock: &dyn Clock) {
        self.active_turn = Some(active_turn);
        self.record(
            EncounterEventKind::TurnChanged {
                active_turn,
                round: self.round,
            },
            correlation_id,
            clock,
        );
    }

    /// Enters or clears a manual initiative value.
    ///
    /// The running turn order is never re-sorted; the value applies to the
    /// next `enter_combat`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn set_initiative(
        &mut self,
        combatant_id: Uuid,
        initiative: Option<i32>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.combatant_index(combatant_id)?;
        if self.combatants[idx].initiative == initiative {
            return Ok(());
        }
        self.combatants[idx].initiative = initiative;
        self.record(
            EncounterEventKind::InitiativeSet {
                combatant_id,
                initiative,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Adds `delta` to a combatant's HP. HP is not clamped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn adjust_hp(
        &mut self,
        combatant_id: Uuid,
        delta: i32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.combatant_index(combatant_id)?;
        let hp = self.combatants[idx].hp.saturating_add(delta);
        self.write_hp(idx, hp, correlation_id, clock);
        Ok(())
    }

    /// Sets a combatant's HP. HP is not clamped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn set_hp(
        &mut self,
        combatant_id: Uuid,
        hp: i32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.combatant_index(combatant_id)?;
        self.write_hp(idx, hp, correlation_id, clock);
        Ok(())
    }

    fn write_hp(&mut self, idx: usize, hp: i32, correlation_id: Uuid, clock: &dyn Clock) {
        let combatant = &mut self.combatants[idx];
        if combatant.hp == hp {
            return;
        }
        combatant.hp = hp;
        let combatant_id = combatant.id;
        self.record(
            EncounterEventKind::HpChanged { combatant_id, hp },
            correlation_id,
            clock,
        );
    }

    /// Adds a combatant. In combat it joins the end of the turn order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank name or non-positive
    /// maximum HP.
    pub fn add_combatant(
        &mut self,
        draft: CombatantDraft,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Uuid, DomainError> {
        draft.validate()?;
        let combatant_id = Uuid::new_v4();
        let mut combatant = draft.into_combatant(combatant_id);
        let turn_position = self.append_to_order(&mut combatant);
        let name = combatant.name.clone();
        self.combatants.push(combatant);
        self.record(
            EncounterEventKind::CombatantAdded {
                combatant_id,
                name,
                turn_position,
            },
            correlation_id,
            clock,
        );
        Ok(combatant_id)
    }

    fn append_to_order(&mut self, combatant: &mut Combatant) -> Option<usize> {
        if self.mode != EncounterMode::Combat {
            return None;
        }
        let position = self.combatants.len();
        combatant.turn_position = Some(position);
        if self.active_turn.is_none() {
            self.active_turn = Some(0);
        }
        Some(position)
    }

    /// Copies a combatant under the next free letter suffix.
    ///
    /// The copy gets a fresh ID and no initiative data. In combat it joins
    /// the end of the turn order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn duplicate_combatant(
        &mut self,
        source_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Uuid, DomainError> {
        let idx = self.combatant_index(source_id)?;
        let base = base_name(&self.combatants[idx].name).to_owned();
        let used = used_suffixes(&base, self.combatants.iter().map(|c| c.name.as_str()));
        let name = format!("{base} ({})", next_suffix(&used));

        let combatant_id = Uuid::new_v4();
        let mut copy = self.combatants[idx].clone();
        copy.id = combatant_id;
        copy.name.clone_from(&name);
        copy.initiative = None;
        copy.rolled_initiative = None;
        copy.turn_position = None;
        self.append_to_order(&mut copy);
        self.combatants.push(copy);
        self.record(
            EncounterEventKind::CombatantDuplicated {
                source_id,
                combatant_id,
                name,
            },
            correlation_id,
            clock,
        );
        Ok(combatant_id)
    }

    /// Removes a combatant, keeping the turn order dense.
    ///
    /// Positions after the removed slot shift down by one. The active
    /// pointer follows the combatant it pointed at; if that was the removed
    /// one, the pointer stays on the same slot, wrapping to 0 past the end.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn remove_combatant(
        &mut self,
        combatant_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.combatant_index(combatant_id)?;
        let removed = self.combatants.remove(idx);

        if let Some(slot) = removed.turn_position {
            for combatant in &mut self.combatants {
                if let Some(position) = combatant.turn_position.as_mut() {
                    if *position > slot {
                        *position -= 1;
                    }
                }
            }
            let len = self.combatants.len();
            self.active_turn = match self.active_turn {
                _ if len == 0 => None,
                Some(active) if slot < active => Some(active - 1),
                Some(active) if slot == active => Some(active % len),
                other => other,
            };
        }

        self.record(
            EncounterEventKind::CombatantRemoved {
                combatant_id,
                active_turn: self.active_turn,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Edits descriptive fields of a combatant.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a bad patch and
    /// `DomainError::NotFound` for an unknown combatant.
    pub fn edit_combatant(
        &mut self,
        combatant_id: Uuid,
        patch: &CombatantPatch,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        patch.validate()?;
        let idx = self.combatant_index(combatant_id)?;
        if patch.apply_to(&mut self.combatants[idx]) {
            self.record(
                EncounterEventKind::CombatantEdited { combatant_id },
                correlation_id,
                clock,
            );
        }
        Ok(())
    }

    /// Adds `key` to the status set, or removes it if present.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank key and
    /// `DomainError::NotFound` for an unknown combatant.
    pub fn toggle_status(
        &mut self,
        combatant_id: Uuid,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(DomainError::Validation(
                "status key must not be empty".to_owned(),
            ));
        }
        let idx = self.combatant_index(combatant_id)?;
        let statuses = &mut self.combatants[idx].statuses;
        if !statuses.remove(key) {
            statuses.insert(key.to_owned());
        }
        self.record_statuses(idx, correlation_id, clock);
        Ok(())
    }

    /// Replaces the status set.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown combatant.
    pub fn set_statuses(
        &mut self,
        combatant_id: Uuid,
        statuses: BTreeSet<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.combatant_index(combatant_id)?;
        let statuses: BTreeSet<String> = statuses
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if self.combatants[idx].statuses == statuses {
            return Ok(());
        }
        self.combatants[idx].statuses = statuses;
        self.record_statuses(idx, correlation_id, clock);
        Ok(())
    }

    fn record_statuses(&mut self, idx: usize, correlation_id: Uuid, clock: &dyn Clock) {
        let combatant = &self.combatants[idx];
        let kind = EncounterEventKind::StatusesChanged {
            combatant_id: combatant.id,
            statuses: combatant.statuses.iter().cloned().collect(),
        };
        self.record(kind, correlation_id, clock);
    }

    /// Removes every combatant and returns to peace.
    pub fn clear_combatants(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        if self.combatants.is_empty() && self.mode == EncounterMode::Peace {
            return;
        }
        self.combatants.clear();
        self.mode = EncounterMode::Peace;
        self.active_turn = None;
        self.round = 1;
        self.record(EncounterEventKind::CombatantsCleared, correlation_id, clock);
    }
}
