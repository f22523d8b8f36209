//! Commands for the Encounter context.
//!
//! A command is the serializable form of one engine operation. Interactive
//! input, forwarded hotkeys and encounter files all become commands before
//! they reach the aggregate.

use std::collections::BTreeSet;

use encounteros_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::combatant::{CombatantDraft, CombatantPatch};
use super::dialog::{BlockDraft, BlockPatch};

/// The operation a command requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EncounterCommandKind {
    /// Resolve initiative and start combat.
    EnterCombat,
    /// End combat.
    ExitCombat,
    /// Next turn.
    AdvanceTurn,
    /// Previous turn.
    PreviousTurn,
    /// Enter or clear a manual initiative.
    SetInitiative {
        /// Target combatant.
        combatant_id: Uuid,
        /// New value; `None` clears it.
        initiative: Option<i32>,
    },
    /// Add to HP.
    AdjustHp {
        /// Target combatant.
        combatant_id: Uuid,
        /// Signed amount.
        delta: i32,
    },
    /// Overwrite HP.
    SetHp {
        /// Target combatant.
        combatant_id: Uuid,
        /// New HP.
        hp: i32,
    },
    /// Add a combatant.
    AddCombatant {
        /// The combatant to add.
        draft: CombatantDraft,
    },
    /// Remove a combatant.
    RemoveCombatant {
        /// Target combatant.
        combatant_id: Uuid,
    },
    /// Edit a combatant's descriptive fields.
    EditCombatant {
        /// Target combatant.
        combatant_id: Uuid,
        /// Fields to change.
        patch: CombatantPatch,
    },
    /// Toggle one status key.
    ToggleStatus {
        /// Target combatant.
        combatant_id: Uuid,
        /// Status key.
        key: String,
    },
    /// Replace the status set.
    SetStatuses {
        /// Target combatant.
        combatant_id: Uuid,
        /// New status set.
        statuses: BTreeSet<String>,
    },
    /// Copy a combatant.
    DuplicateCombatant {
        /// Source combatant.
        combatant_id: Uuid,
    },
    /// Remove everyone and return to peace.
    ClearCombatants,
    /// Author a dialog block.
    CreateBlock {
        /// The block to create.
        draft: BlockDraft,
    },
    /// Edit a dialog block.
    EditBlock {
        /// Target block.
        block_id: Uuid,
        /// Fields to change.
        patch: BlockPatch,
    },
    /// Copy a dialog block.
    DuplicateBlock {
        /// Source block.
        block_id: Uuid,
    },
    /// Push a block live.
    MakeCurrent {
        /// Target block.
        block_id: Uuid,
    },
    /// Next dialog block.
    AdvanceDialog,
    /// Previous dialog block.
    PreviousDialog,
    /// Delete a dialog block.
    RemoveBlock {
        /// Target block.
        block_id: Uuid,
    },
    /// Bump the revision so readers rebuild.
    Republish,
}

impl EncounterCommandKind {
    /// Routing name of the operation.
    #[must_use]
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::EnterCombat => "encounter.enter_combat",
            Self::ExitCombat => "encounter.exit_combat",
            Self::AdvanceTurn => "encounter.advance_turn",
            Self::PreviousTurn => "encounter.previous_turn",
            Self::SetInitiative { .. } => "encounter.set_initiative",
            Self::AdjustHp { .. } => "encounter.adjust_hp",
            Self::SetHp { .. } => "encounter.set_hp",
            Self::AddCombatant { .. } => "encounter.add_combatant",
            Self::RemoveCombatant { .. } => "encounter.remove_combatant",
            Self::EditCombatant { .. } => "encounter.edit_combatant",
            Self::ToggleStatus { .. } => "encounter.toggle_status",
            Self::SetStatuses { .. } => "encounter.set_statuses",
            Self::DuplicateCombatant { .. } => "encounter.duplicate_combatant",
            Self::ClearCombatants => "encounter.clear_combatants",
            Self::CreateBlock { .. } => "dialog.create_block",
            Self::EditBlock { .. } => "dialog.edit_block",
            Self::DuplicateBlock { .. } => "dialog.duplicate_block",
            Self::MakeCurrent { .. } => "dialog.make_current",
            Self::AdvanceDialog => "dialog.advance",
            Self::PreviousDialog => "dialog.previous",
            Self::RemoveBlock { .. } => "dialog.remove_block",
            Self::Republish => "encounter.republish",
        }
    }
}

/// A command addressed to the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterCommand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The requested operation.
    pub kind: EncounterCommandKind,
}

impl EncounterCommand {
    /// Wraps an operation with a fresh correlation ID.
    #[must_use]
    pub fn new(kind: EncounterCommandKind) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            kind,
        }
    }
}

impl Command for EncounterCommand {
    fn command_type(&self) -> &'static str {
        self.kind.command_type()
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
