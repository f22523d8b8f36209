//! Logical input actions.

use serde::{Deserialize, Serialize};

/// A logical action, independent of the key or process that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Next turn.
    AdvanceTurn,
    /// Previous turn.
    PreviousTurn,
    /// Enter combat at peace, leave it in combat.
    ToggleMode,
    /// Next dialog block.
    AdvanceDialog,
    /// Previous dialog block.
    PreviousDialog,
    /// Push the selected dialog block live.
    MakeCurrentSelected,
    /// Change the selected combatant's HP.
    AdjustSelectedHp {
        /// Signed amount, normally ±1 or ±5.
        delta: i32,
    },
    /// Re-read encounter and preference files and republish.
    ReloadFiles,
}

impl Action {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AdvanceTurn => "advance_turn",
            Self::PreviousTurn => "previous_turn",
            Self::ToggleMode => "toggle_mode",
            Self::AdvanceDialog => "advance_dialog",
            Self::PreviousDialog => "previous_dialog",
            Self::MakeCurrentSelected => "make_current_selected",
            Self::AdjustSelectedHp { .. } => "adjust_selected_hp",
            Self::ReloadFiles => "reload_files",
        }
    }
}
