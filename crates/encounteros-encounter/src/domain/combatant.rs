//! Combatants and their authoring inputs.

use std::collections::{BTreeSet, HashSet};

use encounteros_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the encounter a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affiliation {
    /// Party member or friendly NPC.
    Ally,
    /// Opponent; hidden by the display while the encounter is at peace.
    #[default]
    Enemy,
}

impl Affiliation {
    /// Initiative tie-break rank: allies act before enemies.
    pub(crate) fn tie_break_rank(self) -> u8 {
        match self {
            Self::Ally => 0,
            Self::Enemy => 1,
        }
    }
}

/// A tracked participant in the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Ally or enemy.
    pub affiliation: Affiliation,
    /// Current HP. May go negative; clamping is a display concern.
    pub hp: i32,
    /// Maximum HP.
    pub max_hp: i32,
    /// Added to the d20 when initiative is rolled.
    pub initiative_modifier: i32,
    /// Manually entered initiative. Survives leaving combat.
    #[serde(default)]
    pub initiative: Option<i32>,
    /// Initiative rolled on entering combat. Cleared when combat ends.
    #[serde(default)]
    pub rolled_initiative: Option<i32>,
    /// Position in the turn order; only assigned in combat.
    #[serde(default)]
    pub turn_position: Option<usize>,
    /// Opaque status-effect keys.
    #[serde(default)]
    pub statuses: BTreeSet<String>,
    /// Portrait reference understood by the display.
    #[serde(default)]
    pub portrait: Option<String>,
    /// Free-form GM notes.
    #[serde(default)]
    pub notes: String,
}

impl Combatant {
    /// Initiative used for ordering: the manual value wins over a roll.
    #[must_use]
    pub fn resolved_initiative(&self) -> Option<i32> {
        self.initiative.or(self.rolled_initiative)
    }

    /// Whether the display should treat this combatant as down.
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }
}

fn default_one() -> i32 {
    1
}

/// Input for adding a new combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantDraft {
    /// Display name.
    pub name: String,
    /// Ally or enemy. Defaults to enemy, matching the quick-add flow.
    #[serde(default)]
    pub affiliation: Affiliation,
    /// Maximum HP.
    #[serde(default = "default_one")]
    pub max_hp: i32,
    /// Starting HP; defaults to `max_hp`.
    #[serde(default)]
    pub hp: Option<i32>,
    /// Initiative modifier.
    #[serde(default)]
    pub initiative_modifier: i32,
    /// Pre-entered initiative, if any.
    #[serde(default)]
    pub initiative: Option<i32>,
    /// Initial status-effect keys.
    #[serde(default)]
    pub statuses: BTreeSet<String>,
    /// Portrait reference.
    #[serde(default)]
    pub portrait: Option<String>,
    /// GM notes.
    #[serde(default)]
    pub notes: String,
}

impl CombatantDraft {
    /// Creates a draft with full HP and no initiative data.
    #[must_use]
    pub fn new(name: impl Into<String>, affiliation: Affiliation, max_hp: i32) -> Self {
        Self {
            name: name.into(),
            affiliation,
            max_hp,
            hp: None,
            initiative_modifier: 0,
            initiative: None,
            statuses: BTreeSet::new(),
            portrait: None,
            notes: String::new(),
        }
    }

    /// Sets the initiative modifier.
    #[must_use]
    pub fn with_modifier(mut self, initiative_modifier: i32) -> Self {
        self.initiative_modifier = initiative_modifier;
        self
    }

    /// Pre-enters an initiative value.
    #[must_use]
    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation(
                "combatant name must not be empty".to_owned(),
            ));
        }
        if self.max_hp <= 0 {
            return Err(DomainError::Validation(format!(
                "maximum HP must be positive, got {}",
                self.max_hp
            )));
        }
        Ok(())
    }

    pub(crate) fn into_combatant(self, id: Uuid) -> Combatant {
        Combatant {
            id,
            name: self.name.trim().to_owned(),
            affiliation: self.affiliation,
            hp: self.hp.unwrap_or(self.max_hp),
            max_hp: self.max_hp,
            initiative_modifier: self.initiative_modifier,
            initiative: self.initiative,
            rolled_initiative: None,
            turn_position: None,
            statuses: self.statuses,
            portrait: self.portrait,
            notes: self.notes,
        }
    }
}

/// Partial update of a combatant's descriptive fields.
///
/// HP, initiative and statuses have dedicated operations and are not part of
/// the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New affiliation.
    #[serde(default)]
    pub affiliation: Option<Affiliation>,
    /// New maximum HP. Current HP is left as is.
    #[serde(default)]
    pub max_hp: Option<i32>,
    /// New initiative modifier.
    #[serde(default)]
    pub initiative_modifier: Option<i32>,
    /// `Some(None)` clears the portrait.
    #[serde(default)]
    pub portrait: Option<Option<String>>,
    /// New notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl CombatantPatch {
    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::Validation(
                "combatant name must not be empty".to_owned(),
            ));
        }
        if let Some(max_hp) = self.max_hp {
            if max_hp <= 0 {
                return Err(DomainError::Validation(format!(
                    "maximum HP must be positive, got {max_hp}"
                )));
            }
        }
        Ok(())
    }

    /// Applies the patch, returning whether anything changed.
    pub(crate) fn apply_to(&self, combatant: &mut Combatant) -> bool {
        let before = combatant.clone();
        if let Some(name) = &self.name {
            name.trim().clone_into(&mut combatant.name);
        }
        if let Some(affiliation) = self.affiliation {
            combatant.affiliation = affiliation;
        }
        if let Some(max_hp) = self.max_hp {
            combatant.max_hp = max_hp;
        }
        if let Some(modifier) = self.initiative_modifier {
            combatant.initiative_modifier = modifier;
        }
        if let Some(portrait) = &self.portrait {
            combatant.portrait.clone_from(portrait);
        }
        if let Some(notes) = &self.notes {
            combatant.notes.clone_from(notes);
        }
        *combatant != before
    }
}

/// Strips a trailing ` (X)` copy suffix: `Goblin (B)` → `Goblin`.
#[must_use]
pub fn base_name(name: &str) -> &str {
    match name.rfind(" (") {
        Some(idx) if name.ends_with(')') => &name[..idx],
        _ => name,
    }
}

/// Collects the copy suffixes already taken for `base` among `names`.
/// The bare base name counts as the empty suffix.
pub fn used_suffixes<'a>(base: &str, names: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    let prefix = format!("{base} (");
    names
        .into_iter()
        .filter_map(|name| {
            if name == base {
                return Some(String::new());
            }
            name.strip_prefix(prefix.as_str())
                .and_then(|tail| tail.strip_suffix(')'))
                .filter(|tail| !tail.is_empty())
                .map(str::to_owned)
        })
        .collect()
}

/// Next free copy suffix: `A`..`Z`, then `A1`, `A2`, …
#[must_use]
pub fn next_suffix(used: &HashSet<String>) -> String {
    for letter in 'A'..='Z' {
        let candidate = letter.to_string();
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    (1..)
        .map(|k| format!("A{k}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_default()
}

/// Names for `count` fresh copies of `base`: a single copy keeps the bare
/// name, several get `(A)`, `(B)`, … suffixes.
#[must_use]
pub fn suffixed_names(base: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        return vec![base.to_owned()];
    }
    let mut used = HashSet::from([String::new()]);
    (0..count)
        .map(|_| {
            let suffix = next_suffix(&used);
            let name = format!("{base} ({suffix})");
            used.insert(suffix);
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_copy_suffix() {
        assert_eq!(base_name("Goblin (B)"), "Goblin");
        assert_eq!(base_name("Goblin"), "Goblin");
        assert_eq!(base_name("Sir (Ret.) Percival"), "Sir (Ret.) Percival");
    }

    #[test]
    fn test_next_suffix_skips_taken_letters() {
        let used = used_suffixes("Goblin", ["Goblin", "Goblin (A)", "Goblin (B)", "Orc (C)"]);
        assert_eq!(next_suffix(&used), "C");
    }

    #[test]
    fn test_next_suffix_rolls_over_after_z() {
        let used: HashSet<String> = ('A'..='Z').map(|c| c.to_string()).collect();
        assert_eq!(next_suffix(&used), "A1");
    }

    #[test]
    fn test_suffixed_names_for_multiple_copies() {
        assert_eq!(
            suffixed_names("Kobold", 3),
            vec!["Kobold (A)", "Kobold (B)", "Kobold (C)"]
        );
        assert_eq!(suffixed_names("Dragon", 1), vec!["Dragon"]);
    }

    #[test]
    fn test_draft_validation_rejects_blank_name_and_bad_hp() {
        assert!(CombatantDraft::new("  ", Affiliation::Ally, 5).validate().is_err());
        assert!(CombatantDraft::new("Ayla", Affiliation::Ally, 0).validate().is_err());
        assert!(CombatantDraft::new("Ayla", Affiliation::Ally, 12).validate().is_ok());
    }

    #[test]
    fn test_resolved_initiative_prefers_manual_value() {
        let mut combatant = CombatantDraft::new("Ayla", Affiliation::Ally, 10)
            .with_initiative(17)
            .into_combatant(Uuid::new_v4());
        combatant.rolled_initiative = Some(4);
        assert_eq!(combatant.resolved_initiative(), Some(17));

        combatant.initiative = None;
        assert_eq!(combatant.resolved_initiative(), Some(4));
    }

    #[test]
    fn test_patch_reports_whether_anything_changed() {
        let mut combatant =
            CombatantDraft::new("Ayla", Affiliation::Ally, 10).into_combatant(Uuid::new_v4());

        let same = CombatantPatch {
            name: Some("Ayla".to_owned()),
            ..CombatantPatch::default()
        };
        assert!(!same.apply_to(&mut combatant));

        let renamed = CombatantPatch {
            name: Some("Ayla the Bold".to_owned()),
            portrait: Some(Some("ayla.png".to_owned())),
            ..CombatantPatch::default()
        };
        assert!(renamed.apply_to(&mut combatant));
        assert_eq!(combatant.name, "Ayla the Bold");
        assert_eq!(combatant.portrait.as_deref(), Some("ayla.png"));
    }
}
