//! Encounter files: authored rosters and dialog scripts in JSON or YAML.
//!
//! A file is expanded into ordinary `AddCombatant`/`CreateBlock` commands and
//! handed to `handle_batch`, so loading a file is indistinguishable from the
//! GM typing the same entries in.

use std::path::Path;

use serde::{Deserialize, Serialize};

use encounteros_core::error::DomainError;

use crate::domain::aggregates::EncounterState;
use crate::domain::combatant::{CombatantDraft, suffixed_names};
use crate::domain::commands::{EncounterCommand, EncounterCommandKind};
use crate::domain::dialog::BlockDraft;

/// Largest number of copies a single roster entry may ask for.
pub const MAX_ROSTER_COUNT: usize = 100;

fn default_count() -> usize {
    1
}

/// Serialization format of an encounter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl FileFormat {
    /// Picks the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(DomainError::Validation(format!(
                "unsupported encounter file: {}",
                path.display()
            ))),
        }
    }
}

/// One roster line, optionally repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// The combatant to add.
    #[serde(flatten)]
    pub draft: CombatantDraft,
    /// How many copies to add. Several copies get `(A)`, `(B)`, … suffixes.
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Parsed contents of an encounter file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterFile {
    /// Optional title, only used for logging.
    #[serde(default)]
    pub name: Option<String>,
    /// Replace the current combatants and dialog instead of appending.
    #[serde(default)]
    pub replace: bool,
    /// Roster entries.
    #[serde(default)]
    pub combatants: Vec<RosterEntry>,
    /// Dialog blocks in authoring order.
    #[serde(default)]
    pub dialog: Vec<BlockDraft>,
}

impl EncounterFile {
    /// Parses file contents.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the text does not parse.
    pub fn parse(text: &str, format: FileFormat) -> Result<Self, DomainError> {
        match format {
            FileFormat::Json => serde_json::from_str(text)
                .map_err(|e| DomainError::Validation(format!("invalid encounter JSON: {e}"))),
            FileFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| DomainError::Validation(format!("invalid encounter YAML: {e}"))),
        }
    }

    /// Reads and parses a file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IoFault` if the file cannot be read and
    /// `DomainError::Validation` if it does not parse.
    pub async fn read(path: &Path) -> Result<Self, DomainError> {
        let format = FileFormat::from_path(path)?;
        let text = tokio::fs::read_to_string(path).await?;
        let file = Self::parse(&text, format)?;
        tracing::debug!(
            path = %path.display(),
            name = file.name.as_deref().unwrap_or_default(),
            combatants = file.combatants.len(),
            blocks = file.dialog.len(),
            "encounter file read"
        );
        Ok(file)
    }

    /// Expands the file into commands against `state`.
    ///
    /// With `replace`, the batch first clears every combatant and removes
    /// every dialog block that exists now.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a roster entry with `count: 0`
    /// or a count above [`MAX_ROSTER_COUNT`].
    pub fn to_commands(&self, state: &EncounterState) -> Result<Vec<EncounterCommand>, DomainError> {
        let mut commands = Vec::new();
        if self.replace {
            commands.push(EncounterCommand::new(EncounterCommandKind::ClearCombatants));
            commands.extend(state.dialog_blocks().iter().map(|b| {
                EncounterCommand::new(EncounterCommandKind::RemoveBlock { block_id: b.id })
            }));
        }

        for entry in &self.combatants {
            if entry.count == 0 {
                return Err(DomainError::Validation(format!(
                    "roster entry {:?} has count 0",
                    entry.draft.name
                )));
            }
            if entry.count > MAX_ROSTER_COUNT {
                return Err(DomainError::Validation(format!(
                    "roster entry {:?} has count {}, at most {MAX_ROSTER_COUNT} allowed",
                    entry.draft.name, entry.count
                )));
            }
            for name in suffixed_names(entry.draft.name.trim(), entry.count) {
                let mut draft = entry.draft.clone();
                draft.name = name;
                commands.push(EncounterCommand::new(EncounterCommandKind::AddCombatant {
                    draft,
                }));
            }
        }

        commands.extend(self.dialog.iter().map(|draft| {
            EncounterCommand::new(EncounterCommandKind::CreateBlock {
                draft: draft.clone(),
            })
        }));
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use encounteros_core::aggregate::AggregateRoot;
    use encounteros_test_support::{FixedClock, MockRng, RecordingSnapshotRepository};
    use uuid::Uuid;

    use super::*;
    use crate::application::command_handlers::handle_batch;
    use crate::domain::combatant::Affiliation;

    const GOBLIN_AMBUSH: &str = r"
name: Goblin ambush
combatants:
  - name: Ayla
    affiliation: ally
    max_hp: 24
    initiative_modifier: 3
  - name: Goblin
    max_hp: 7
    count: 3
    statuses: [hidden]
dialog:
  - speaker: Goblin
    text: Shiny things!
  - speaker: Ayla
    text: Weapons out.
";

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_yaml_roster_expands_counted_entries_with_suffixes() {
        // Arrange
        let file = EncounterFile::parse(GOBLIN_AMBUSH, FileFormat::Yaml).unwrap();
        let state = EncounterState::new(Uuid::new_v4());

        // Act
        let commands = file.to_commands(&state).unwrap();

        // Assert
        let names: Vec<String> = commands
            .iter()
            .filter_map(|c| match &c.kind {
                EncounterCommandKind::AddCombatant { draft } => Some(draft.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["Ayla", "Goblin (A)", "Goblin (B)", "Goblin (C)"]);
        assert_eq!(commands.len(), 6);
        match &commands[1].kind {
            EncounterCommandKind::AddCombatant { draft } => {
                assert_eq!(draft.affiliation, Affiliation::Enemy);
                assert!(draft.statuses.contains("hidden"));
            }
            other => panic!("expected AddCombatant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_loading_a_file_is_one_write_with_one_revision_per_element() {
        let file = EncounterFile::parse(GOBLIN_AMBUSH, FileFormat::Yaml).unwrap();
        let repo = RecordingSnapshotRepository::new();
        let mut state = EncounterState::new(Uuid::new_v4());
        let commands = file.to_commands(&state).unwrap();

        let result = handle_batch(&mut state, &commands, &fixed_clock(), &mut MockRng, &repo, 0)
            .await
            .unwrap();

        assert_eq!(result.revision, 6);
        assert_eq!(state.combatants().len(), 4);
        assert_eq!(state.dialog_blocks().len(), 2);
        assert_eq!(repo.saved_snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_clears_existing_roster_and_dialog() {
        let clock = fixed_clock();
        let mut state = EncounterState::new(Uuid::new_v4());
        state
            .add_combatant(CombatantDraft::new("Old", Affiliation::Enemy, 3), Uuid::new_v4(), &clock)
            .unwrap();
        state.create_block(BlockDraft::new("GM", "Old line."), Uuid::new_v4(), &clock);
        let file = EncounterFile {
            replace: true,
            dialog: vec![BlockDraft::new("GM", "New line.")],
            ..EncounterFile::default()
        };
        let commands = file.to_commands(&state).unwrap();

        handle_batch(
            &mut state,
            &commands,
            &clock,
            &mut MockRng,
            &RecordingSnapshotRepository::new(),
            0,
        )
        .await
        .unwrap();

        assert!(state.combatants().is_empty());
        assert_eq!(state.dialog_blocks().len(), 1);
        assert_eq!(state.dialog_blocks()[0].text, "New line.");
    }

    #[tokio::test]
    async fn test_read_json_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crypt.json");
        tokio::fs::write(
            &path,
            r#"{"combatants":[{"name":"Skeleton","max_hp":13,"count":2}]}"#,
        )
        .await
        .unwrap();

        let file = EncounterFile::read(&path).await.unwrap();

        assert_eq!(file.combatants.len(), 1);
        assert_eq!(file.combatants[0].count, 2);
        assert_eq!(file.combatants[0].draft.max_hp, 13);
        assert!(file.dialog.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_fault() {
        let dir = tempfile::tempdir().unwrap();

        let result = EncounterFile::read(&dir.path().join("nope.yaml")).await;

        assert!(matches!(result, Err(DomainError::IoFault(_))));
    }

    #[test]
    fn test_unknown_extension_and_zero_count_are_rejected() {
        assert!(matches!(
            FileFormat::from_path(Path::new("party.toml")),
            Err(DomainError::Validation(_))
        ));

        let file = EncounterFile::parse(
            r#"{"combatants":[{"name":"Wisp","count":0}]}"#,
            FileFormat::Json,
        )
        .unwrap();
        let result = file.to_commands(&EncounterState::new(Uuid::new_v4()));
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_oversized_count_is_rejected_before_expansion() {
        // Arrange
        let file = EncounterFile::parse(
            r#"{"combatants":[{"name":"Rat","max_hp":1,"count":1000000000}]}"#,
            FileFormat::Json,
        )
        .unwrap();

        // Act
        let result = file.to_commands(&EncounterState::new(Uuid::new_v4()));

        // Assert
        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("at most 100")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_count_at_the_cap_is_accepted() {
        let file = EncounterFile::parse(
            r#"{"combatants":[{"name":"Rat","max_hp":1,"count":100}]}"#,
            FileFormat::Json,
        )
        .unwrap();

        let commands = file
            .to_commands(&EncounterState::new(Uuid::new_v4()))
            .unwrap();

        assert_eq!(commands.len(), MAX_ROSTER_COUNT);
    }

    #[test]
    fn test_malformed_yaml_is_validation_error() {
        let result = EncounterFile::parse("combatants: [name: {", FileFormat::Yaml);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
