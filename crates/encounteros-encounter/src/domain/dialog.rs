//! Dialog engine: authored blocks, the live block and the display cursor.
//!
//! Navigation keeps the cursor and the live block together: moving the
//! cursor pushes the block under it live. `make_current` jumps anywhere.

use encounteros_core::clock::Clock;
use encounteros_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::EncounterState;
use super::events::EncounterEventKind;

/// An authored piece of dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogBlock {
    /// Stable identifier.
    pub id: Uuid,
    /// Speaker label.
    pub speaker: String,
    /// Body text.
    pub text: String,
    /// Portrait reference understood by the display.
    #[serde(default)]
    pub portrait: Option<String>,
    /// Whether this block is on the display right now.
    #[serde(default)]
    pub live: bool,
}

/// Input for authoring a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDraft {
    /// Speaker label.
    #[serde(default)]
    pub speaker: String,
    /// Body text.
    pub text: String,
    /// Portrait reference.
    #[serde(default)]
    pub portrait: Option<String>,
}

impl BlockDraft {
    /// Creates a draft without a portrait.
    #[must_use]
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            portrait: None,
        }
    }
}

/// Partial update of a block. The live flag is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPatch {
    /// New speaker label.
    #[serde(default)]
    pub speaker: Option<String>,
    /// New body text.
    #[serde(default)]
    pub text: Option<String>,
    /// `Some(None)` clears the portrait.
    #[serde(default)]
    pub portrait: Option<Option<String>>,
}

impl BlockPatch {
    fn apply_to(&self, block: &mut DialogBlock) -> bool {
        let before = block.clone();
        if let Some(speaker) = &self.speaker {
            block.speaker.clone_from(speaker);
        }
        if let Some(text) = &self.text {
            block.text.clone_from(text);
        }
        if let Some(portrait) = &self.portrait {
            block.portrait.clone_from(portrait);
        }
        *block != before
    }
}

impl EncounterState {
    /// Appends a block to authoring order. It is not live.
    pub fn create_block(
        &mut self,
        draft: BlockDraft,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Uuid {
        let block_id = Uuid::new_v4();
        self.dialog_blocks.push(DialogBlock {
            id: block_id,
            speaker: draft.speaker,
            text: draft.text,
            portrait: draft.portrait,
            live: false,
        });
        self.record(
            EncounterEventKind::BlockCreated { block_id },
            correlation_id,
            clock,
        );
        block_id
    }

    /// Edits a block. Edits to the live block show up on the next sync
    /// without being pushed again.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown block.
    pub fn edit_block(
        &mut self,
        block_id: Uuid,
        patch: &BlockPatch,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.block_index(block_id)?;
        if patch.apply_to(&mut self.dialog_blocks[idx]) {
            self.record(
                EncounterEventKind::BlockEdited { block_id },
                correlation_id,
                clock,
            );
        }
        Ok(())
    }

    /// Inserts a copy right after the source. The copy is not live.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown block.
    pub fn duplicate_block(
        &mut self,
        source_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Uuid, DomainError> {
        let idx = self.block_index(source_id)?;
        let block_id = Uuid::new_v4();
        let mut copy = self.dialog_blocks[idx].clone();
        copy.id = block_id;
        copy.live = false;
        self.dialog_blocks.insert(idx + 1, copy);
        if self.dialog_cursor > idx {
            self.dialog_cursor += 1;
        }
        self.record(
            EncounterEventKind::BlockDuplicated {
                source_id,
                block_id,
            },
            correlation_id,
            clock,
        );
        Ok(block_id)
    }

    /// Pushes a block live and moves the cursor onto it.
    ///
    /// Always bumps the revision, even when the block is already live.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown block.
    pub fn make_current(
        &mut self,
        block_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.block_index(block_id)?;
        self.set_live(idx);
        self.record(
            EncounterEventKind::BlockMadeCurrent {
                block_id,
                cursor: idx,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Moves the cursor one block forward, clamped at the end, and pushes
    /// that block live.
    pub fn advance_dialog(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        let last = self.dialog_blocks.len().saturating_sub(1);
        let target = (self.dialog_cursor + 1).min(last);
        self.move_cursor(target, correlation_id, clock);
    }

    /// Moves the cursor one block back, clamped at the start, and pushes
    /// that block live.
    pub fn previous_dialog(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        let target = self.dialog_cursor.saturating_sub(1);
        self.move_cursor(target, correlation_id, clock);
    }

    fn move_cursor(&mut self, target: usize, correlation_id: Uuid, clock: &dyn Clock) {
        let Some(block) = self.dialog_blocks.get(target) else {
            return;
        };
        let live_block = block.id;
        if target == self.dialog_cursor && self.live_block == Some(live_block) {
            return;
        }
        self.set_live(target);
        tracing::debug!(cursor = target, %live_block, "dialog cursor moved");
        self.record(
            EncounterEventKind::DialogCursorMoved {
                cursor: target,
                live_block,
            },
            correlation_id,
            clock,
        );
    }

    fn set_live(&mut self, idx: usize) {
        for (i, block) in self.dialog_blocks.iter_mut().enumerate() {
            block.live = i == idx;
        }
        self.live_block = Some(self.dialog_blocks[idx].id);
        self.dialog_cursor = idx;
    }

    /// Deletes a block. Removing the live block leaves nothing live.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown block.
    pub fn remove_block(
        &mut self,
        block_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let idx = self.block_index(block_id)?;
        let removed = self.dialog_blocks.remove(idx);
        if removed.live {
            self.live_block = None;
        }
        if idx < self.dialog_cursor {
            self.dialog_cursor -= 1;
        }
        self.dialog_cursor = self
            .dialog_cursor
            .min(self.dialog_blocks.len().saturating_sub(1));
        self.record(
            EncounterEventKind::BlockRemoved {
                block_id,
                was_live: removed.live,
            },
            correlation_id,
            clock,
        );
        Ok(())
    }
}
