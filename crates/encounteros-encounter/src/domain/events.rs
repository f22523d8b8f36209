//! Domain events for the Encounter context.
//!
//! One event is recorded per committed mutation. Events are not replayed;
//! they feed the session log and tracing.

use encounteros_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::EncounterMode;

/// Event payload variants for the Encounter context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncounterEventKind {
    /// Initiative was resolved and turn order assigned.
    CombatEntered {
        /// Combatant IDs in turn order.
        order: Vec<Uuid>,
    },
    /// Combat ended and turn order was cleared.
    CombatExited,
    /// The active-turn pointer moved.
    TurnChanged {
        /// New active turn index.
        active_turn: usize,
        /// Current round.
        round: u32,
    },
    /// A manual initiative value was entered or cleared.
    InitiativeSet {
        /// The combatant.
        combatant_id: Uuid,
        /// The new manual initiative.
        initiative: Option<i32>,
    },
    /// A combatant's HP changed.
    HpChanged {
        /// The combatant.
        combatant_id: Uuid,
        /// New HP.
        hp: i32,
    },
    /// A combatant joined the encounter.
    CombatantAdded {
        /// The new combatant.
        combatant_id: Uuid,
        /// Its display name.
        name: String,
        /// Its turn position if combat is running.
        turn_position: Option<usize>,
    },
    /// A combatant was copied.
    CombatantDuplicated {
        /// The source.
        source_id: Uuid,
        /// The copy.
        combatant_id: Uuid,
        /// The copy's display name.
        name: String,
    },
    /// A combatant left the encounter.
    CombatantRemoved {
        /// The removed combatant.
        combatant_id: Uuid,
        /// Active turn index after renumbering.
        active_turn: Option<usize>,
    },
    /// Descriptive fields of a combatant changed.
    CombatantEdited {
        /// The combatant.
        combatant_id: Uuid,
    },
    /// A combatant's status-effect set changed.
    StatusesChanged {
        /// The combatant.
        combatant_id: Uuid,
        /// The full new set.
        statuses: Vec<String>,
    },
    /// Every combatant was removed.
    CombatantsCleared,
    /// A dialog block was authored.
    BlockCreated {
        /// The new block.
        block_id: Uuid,
    },
    /// A dialog block was copied.
    BlockDuplicated {
        /// The source.
        source_id: Uuid,
        /// The copy.
        block_id: Uuid,
    },
    /// A dialog block's content changed.
    BlockEdited {
        /// The block.
        block_id: Uuid,
    },
    /// A block was pushed live explicitly.
    BlockMadeCurrent {
        /// The live block.
        block_id: Uuid,
        /// The display cursor, now on that block.
        cursor: usize,
    },
    /// Dialog navigation moved the cursor and the live block with it.
    DialogCursorMoved {
        /// New cursor position.
        cursor: usize,
        /// Block now live.
        live_block: Uuid,
    },
    /// A dialog block was deleted.
    BlockRemoved {
        /// The deleted block.
        block_id: Uuid,
        /// Whether it was live (nothing is live afterwards).
        was_live: bool,
    },
    /// Revision bumped without content changes so readers rebuild.
    SnapshotRepublished {
        /// Mode at the time of the republish.
        mode: EncounterMode,
    },
}

impl EncounterEventKind {
    /// The routing name for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CombatEntered { .. } => "encounter.combat_entered",
            Self::CombatExited => "encounter.combat_exited",
            Self::TurnChanged { .. } => "encounter.turn_changed",
            Self::InitiativeSet { .. } => "encounter.initiative_set",
            Self::HpChanged { .. } => "encounter.hp_changed",
            Self::CombatantAdded { .. } => "encounter.combatant_added",
            Self::CombatantDuplicated { .. } => "encounter.combatant_duplicated",
            Self::CombatantRemoved { .. } => "encounter.combatant_removed",
            Self::CombatantEdited { .. } => "encounter.combatant_edited",
            Self::StatusesChanged { .. } => "encounter.statuses_changed",
            Self::CombatantsCleared => "encounter.combatants_cleared",
            Self::BlockCreated { .. } => "dialog.block_created",
            Self::BlockDuplicated { .. } => "dialog.block_duplicated",
            Self::BlockEdited { .. } => "dialog.block_edited",
            Self::BlockMadeCurrent { .. } => "dialog.block_made_current",
            Self::DialogCursorMoved { .. } => "dialog.cursor_moved",
            Self::BlockRemoved { .. } => "dialog.block_removed",
            Self::SnapshotRepublished { .. } => "encounter.snapshot_republished",
        }
    }
}

/// Domain event envelope for the Encounter context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: EncounterEventKind,
}

impl DomainEvent for EncounterEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("EncounterEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
