use pg_poll_source::checkpoint::{Checkpoint, CheckpointManager};
use pg_poll_source::source::Cursor;
use serde_json::json;
use tempfile::TempDir;

fn cursor_at(last_id: i64, last_timestamp: &str, offset: usize) -> Cursor {
    let mut cursor = Cursor::default();
    cursor.advance(json!(last_id), Some(json!(last_timestamp)));
    cursor.advance_offset(offset);
    cursor
}

#[tokio::test]
async fn test_checkpoint_persistence() {
    let temp_dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(temp_dir.path().join("test_checkpoint.json"));

    let first = cursor_at(1000, "2024-05-01T08:00:00", 1000);
    manager
        .save(&Checkpoint::new("orders".to_string(), first.clone(), 1000))
        .await
        .unwrap();

    let loaded = manager.load().await.unwrap().expect("Checkpoint should exist");
    assert_eq!(loaded.table, "orders");
    assert_eq!(loaded.cursor, first);
    assert_eq!(loaded.record_count, 1000);

    let second = cursor_at(2000, "2024-05-02T08:00:00", 2000);
    manager
        .save(&Checkpoint::new("orders".to_string(), second.clone(), 2000))
        .await
        .unwrap();

    let loaded = manager.load().await.unwrap().expect("Checkpoint should exist");
    assert_eq!(loaded.cursor, second);
    assert_eq!(loaded.record_count, 2000);
}

#[tokio::test]
async fn test_checkpoint_recovery_simulation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("recovery_checkpoint.json");

    {
        let manager = CheckpointManager::new(&path);
        let checkpoint = Checkpoint::new("orders".to_string(), cursor_at(42, "2024-05-01T08:00:00", 42), 42);
        manager.save(&checkpoint).await.unwrap();
    }

    // A fresh manager sees what the previous run left behind.
    let manager = CheckpointManager::new(&path);
    let recovered = manager.load().await.unwrap().unwrap();
    assert_eq!(recovered.cursor.last_id, json!(42));
    assert_eq!(recovered.cursor.last_timestamp, json!("2024-05-01T08:00:00"));
    assert_eq!(recovered.cursor.offset, 42);
}

#[tokio::test]
async fn test_checkpoint_file_is_plain_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("checkpoint.json");
    let manager = CheckpointManager::new(&path);

    manager
        .save(&Checkpoint::new("orders".to_string(), Cursor::default(), 0))
        .await
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(raw["table"], "orders");
    assert_eq!(raw["cursor"]["last_id"], json!(0));
    assert_eq!(raw["cursor"]["last_timestamp"], json!("1970-01-01T00:00:00Z"));
}
