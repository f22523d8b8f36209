//! Integration tests for `FileCommandQueue`.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use encounteros_core::error::DomainError;
use encounteros_core::repository::CommandChannel;
use encounteros_sync::file_command_queue::FileCommandQueue;
use encounteros_test_support::FixedClock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TestAction {
    AdvanceTurn,
    AdjustHp { delta: i32 },
}

fn open(dir: &std::path::Path) -> FileCommandQueue<TestAction> {
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
    FileCommandQueue::new(dir, Arc::new(clock)).unwrap()
}

fn lock_path(queue: &FileCommandQueue<TestAction>) -> std::path::PathBuf {
    let mut name = queue.path().as_os_str().to_os_string();
    name.push(".lock");
    name.into()
}

// --- append + pending ---

#[tokio::test]
async fn test_pending_on_fresh_queue_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());

    assert!(queue.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_appended_entries_are_pending_in_arrival_order() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());
    let first_delivery = Uuid::new_v4();

    // Act
    let first = queue
        .append(first_delivery, TestAction::AdvanceTurn)
        .await
        .unwrap();
    let second = queue
        .append(Uuid::new_v4(), TestAction::AdjustHp { delta: -5 })
        .await
        .unwrap();

    // Assert
    assert_eq!((first, second), (1, 2));
    let pending = queue.pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].delivery_id, first_delivery);
    assert_eq!(pending[0].action, TestAction::AdvanceTurn);
    assert_eq!(pending[1].action, TestAction::AdjustHp { delta: -5 });
    assert_eq!(
        pending[0].enqueued_at,
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    );
    assert!(!lock_path(&queue).exists());
}

#[tokio::test]
async fn test_two_handles_share_the_same_queue() {
    let dir = tempfile::tempdir().unwrap();
    let display = open(dir.path());
    let controller = open(dir.path());

    display
        .append(Uuid::new_v4(), TestAction::AdvanceTurn)
        .await
        .unwrap();

    assert_eq!(controller.pending().await.unwrap().len(), 1);
}

// --- acknowledge ---

#[tokio::test]
async fn test_acknowledge_keeps_entries_appended_after_the_read() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let display = open(dir.path());
    let controller = open(dir.path());
    display
        .append(Uuid::new_v4(), TestAction::AdvanceTurn)
        .await
        .unwrap();
    let drained = controller.pending().await.unwrap();

    // Act: the display appends while the controller is applying the drain.
    display
        .append(Uuid::new_v4(), TestAction::AdjustHp { delta: 1 })
        .await
        .unwrap();
    let removed = controller
        .acknowledge(drained.last().unwrap().seq)
        .await
        .unwrap();

    // Assert
    assert_eq!(removed, 1);
    let remaining = controller.pending().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].seq, 2);
    assert_eq!(remaining[0].action, TestAction::AdjustHp { delta: 1 });
}

#[tokio::test]
async fn test_sequence_numbers_keep_increasing_after_acknowledge() {
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());
    queue
        .append(Uuid::new_v4(), TestAction::AdvanceTurn)
        .await
        .unwrap();
    queue.acknowledge(1).await.unwrap();

    let seq = queue
        .append(Uuid::new_v4(), TestAction::AdvanceTurn)
        .await
        .unwrap();

    assert_eq!(seq, 2);
}

#[tokio::test]
async fn test_acknowledge_on_empty_queue_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());

    assert_eq!(queue.acknowledge(10).await.unwrap(), 0);
    assert!(!queue.path().exists());
}

// --- concurrency ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(open(dir.path()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move {
            queue
                .append(Uuid::new_v4(), TestAction::AdvanceTurn)
                .await
                .unwrap()
        }));
    }
    let mut seqs = Vec::new();
    for task in tasks {
        seqs.push(task.await.unwrap());
    }
    seqs.sort_unstable();

    assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());
    assert_eq!(queue.pending().await.unwrap().len(), 8);
}

// --- locking ---

#[tokio::test]
async fn test_held_lock_times_out_with_io_fault() {
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());
    tokio::fs::write(lock_path(&queue), b"").await.unwrap();

    let result = queue.append(Uuid::new_v4(), TestAction::AdvanceTurn).await;

    match result.unwrap_err() {
        DomainError::IoFault(msg) => assert!(msg.contains("lock")),
        other => panic!("expected IoFault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    let queue = open(dir.path());
    let lock = std::fs::File::create(lock_path(&queue)).unwrap();
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(10);
    lock.set_modified(old).unwrap();
    drop(lock);

    let seq = queue
        .append(Uuid::new_v4(), TestAction::AdvanceTurn)
        .await
        .unwrap();

    assert_eq!(seq, 1);
    assert!(!lock_path(&queue).exists());
}
