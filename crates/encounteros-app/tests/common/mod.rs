//! Shared test helpers for controller/display integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use encounteros_app::config::AppConfig;
use encounteros_app::controller::Controller;
use encounteros_app::display::Display;
use encounteros_app::state::AppState;
use encounteros_core::clock::Clock;
use encounteros_encounter::domain::combatant::{Affiliation, CombatantDraft};
use encounteros_encounter::domain::commands::EncounterCommandKind;
use encounteros_input::application::router::Role;
use encounteros_input::domain::actions::Action;
use encounteros_input::domain::keymap::KeyChord;
use encounteros_sync::file_command_queue::FileCommandQueue;
use encounteros_sync::file_snapshot_repository::FileSnapshotRepository;
use encounteros_test_support::{FixedClock, MockRng};
use uuid::Uuid;

/// Encounter file with two goblins, an ally and one line of dialog.
pub const GOBLIN_AMBUSH: &str = r"
name: Goblin ambush
combatants:
  - name: Aria
    affiliation: ally
    max_hp: 12
    initiative_modifier: 3
  - name: Goblin
    max_hp: 7
    initiative_modifier: 1
    count: 2
dialog:
  - speaker: Narrator
    text: Arrows whistle out of the dark.
";

/// Fixed timestamp used across all integration tests.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(start_time()))
}

/// Configuration for one process over `data_dir`, with no write retries so
/// failure paths stay fast.
pub fn test_config(role: Role, data_dir: &Path) -> AppConfig {
    AppConfig {
        role,
        data_dir: data_dir.to_path_buf(),
        poll_interval: Duration::from_millis(100),
        stale_after: Duration::from_secs(5),
        write_retries: 0,
        process_name: role.as_str().to_owned(),
        encounter_file: None,
    }
}

/// File-backed state, wired the way the binary wires it but with an
/// injected clock. Two of these over one directory behave like the two
/// processes.
pub fn file_app(config: AppConfig, clock: Arc<dyn Clock>) -> AppState {
    let snapshots = Arc::new(FileSnapshotRepository::new(&config.data_dir).unwrap());
    let commands =
        Arc::new(FileCommandQueue::<Action>::new(&config.data_dir, Arc::clone(&clock)).unwrap());
    AppState::new(config, clock, snapshots, commands)
}

pub async fn start_controller(data_dir: &Path, clock: Arc<dyn Clock>) -> Controller {
    let app = file_app(test_config(Role::Controller, data_dir), clock);
    Controller::start(app, Box::new(MockRng)).await.unwrap()
}

pub async fn start_display(data_dir: &Path, clock: Arc<dyn Clock>) -> Display {
    let app = file_app(test_config(Role::Display, data_dir), clock);
    Display::start(app).await.unwrap()
}

/// Adds Aria (ally, +3) and a goblin (enemy, +1). With `MockRng` they roll
/// 4 and 2, so Aria acts first.
pub async fn add_party(controller: &mut Controller) -> (Uuid, Uuid) {
    let aria = controller
        .execute_one(EncounterCommandKind::AddCombatant {
            draft: CombatantDraft::new("Aria", Affiliation::Ally, 12).with_modifier(3),
        })
        .await
        .unwrap()
        .created_ids[0];
    let goblin = controller
        .execute_one(EncounterCommandKind::AddCombatant {
            draft: CombatantDraft::new("Goblin", Affiliation::Enemy, 7).with_modifier(1),
        })
        .await
        .unwrap()
        .created_ids[0];
    (aria, goblin)
}

pub fn chord(s: &str) -> KeyChord {
    s.parse().unwrap()
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
