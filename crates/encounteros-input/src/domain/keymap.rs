//! Key chords and the key map that turns them into actions.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use encounteros_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::actions::Action;

/// A physical key, without modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    /// Function key `F1`..`F24`.
    F(u8),
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Enter / Return.
    Enter,
    /// Escape.
    Escape,
    /// Delete.
    Delete,
    /// Space bar.
    Space,
    /// Any other printable key, lowercased.
    Char(char),
}

/// A key plus the modifiers held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyChord {
    /// The key.
    pub code: KeyCode,
    /// Ctrl held.
    pub ctrl: bool,
    /// Shift held.
    pub shift: bool,
    /// Alt held.
    pub alt: bool,
}

impl KeyChord {
    /// A key without modifiers.
    #[must_use]
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            ctrl: false,
            shift: false,
            alt: false,
        }
    }
}

fn parse_code(name: &str) -> Result<KeyCode, DomainError> {
    let lower = name.to_ascii_lowercase();
    let code = match lower.as_str() {
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "enter" | "return" => KeyCode::Enter,
        "escape" | "esc" => KeyCode::Escape,
        "delete" | "del" => KeyCode::Delete,
        "space" => KeyCode::Space,
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                (Some('f'), Some(_)) => lower[1..]
                    .parse::<u8>()
                    .ok()
                    .filter(|n| (1..=24).contains(n))
                    .map(KeyCode::F)
                    .ok_or_else(|| DomainError::Validation(format!("unknown key: {name}")))?,
                _ => return Err(DomainError::Validation(format!("unknown key: {name}"))),
            }
        }
    };
    Ok(code)
}

impl FromStr for KeyChord {
    type Err = DomainError;

    /// Parses chords such as `F5`, `Ctrl+R`, `Shift++` or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (modifiers, key) = if s == "+" {
            ("", "+")
        } else if let Some(prefix) = s.strip_suffix("++") {
            (prefix, "+")
        } else {
            match s.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", s),
            }
        };
        if key.is_empty() {
            return Err(DomainError::Validation(format!("missing key in chord: {s}")));
        }

        let mut chord = Self::plain(parse_code(key)?);
        for modifier in modifiers.split('+').filter(|m| !m.is_empty()) {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" => chord.alt = true,
                other => {
                    return Err(DomainError::Validation(format!(
                        "unknown modifier {other:?} in chord: {s}"
                    )));
                }
            }
        }
        Ok(chord)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        match self.code {
            KeyCode::F(n) => write!(f, "F{n}"),
            KeyCode::PageUp => f.write_str("PageUp"),
            KeyCode::PageDown => f.write_str("PageDown"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Escape => f.write_str("Escape"),
            KeyCode::Delete => f.write_str("Delete"),
            KeyCode::Space => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
        }
    }
}

/// Bindings from key chords to actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    bindings: HashMap<KeyChord, Action>,
}

impl Keymap {
    /// A key map with no bindings.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Binds `chord` to `action`, replacing any earlier binding.
    pub fn bind(&mut self, chord: KeyChord, action: Action) {
        self.bindings.insert(chord, action);
    }

    /// Parses and binds a chord.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the chord does not parse.
    pub fn bind_str(&mut self, chord: &str, action: Action) -> Result<(), DomainError> {
        self.bind(chord.parse()?, action);
        Ok(())
    }

    /// The action bound to `chord`.
    #[must_use]
    pub fn action_for(&self, chord: &KeyChord) -> Option<Action> {
        self.bindings.get(chord).copied()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Keymap {
    /// The GM hotkeys: F5/F7 turns, F6 mode, F8 make current, PageDown/PageUp
    /// dialog, `+`/`-` HP by one (by five with Shift), Ctrl+R reload.
    fn default() -> Self {
        let ctrl = |code| KeyChord {
            ctrl: true,
            ..KeyChord::plain(code)
        };
        let shift = |code| KeyChord {
            shift: true,
            ..KeyChord::plain(code)
        };
        let bindings = [
            (KeyChord::plain(KeyCode::F(5)), Action::AdvanceTurn),
            (KeyChord::plain(KeyCode::F(7)), Action::PreviousTurn),
            (KeyChord::plain(KeyCode::F(6)), Action::ToggleMode),
            (KeyChord::plain(KeyCode::F(8)), Action::MakeCurrentSelected),
            (KeyChord::plain(KeyCode::PageDown), Action::AdvanceDialog),
            (KeyChord::plain(KeyCode::PageUp), Action::PreviousDialog),
            (
                KeyChord::plain(KeyCode::Char('+')),
                Action::AdjustSelectedHp { delta: 1 },
            ),
            (
                KeyChord::plain(KeyCode::Char('-')),
                Action::AdjustSelectedHp { delta: -1 },
            ),
            (
                shift(KeyCode::Char('+')),
                Action::AdjustSelectedHp { delta: 5 },
            ),
            (
                shift(KeyCode::Char('-')),
                Action::AdjustSelectedHp { delta: -5 },
            ),
            (ctrl(KeyCode::Char('r')), Action::ReloadFiles),
        ];
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }
}
