//! Cursor checkpoints for resuming a poller after restart.
//!
//! The poll engine itself keeps its cursor in memory only. The host saves
//! a checkpoint after records have been handed to Kafka so that a restart
//! continues from the last published watermark instead of the zero cursor.
//!
//! # Example
//!
//! ```rust,no_run
//! use pg_poll_source::checkpoint::{Checkpoint, CheckpointManager};
//! use pg_poll_source::source::Cursor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = CheckpointManager::new("checkpoint.json");
//!
//!     if let Some(checkpoint) = manager.load().await? {
//!         println!("Resuming {} from id {}", checkpoint.table, checkpoint.cursor.last_id);
//!     }
//!
//!     let checkpoint = Checkpoint::new("users".to_string(), Cursor::default(), 0);
//!     manager.save(&checkpoint).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::source::Cursor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// A persisted cursor for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The table the cursor belongs to
    pub table: String,
    /// Watermark and offset after the last published batch
    pub cursor: Cursor,
    /// The timestamp when this checkpoint was created
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Number of records published so far
    pub record_count: u64,
}

impl Checkpoint {
    pub fn new(table: String, cursor: Cursor, record_count: u64) -> Self {
        Self {
            table,
            cursor,
            timestamp: chrono::Utc::now(),
            record_count,
        }
    }
}

/// Manages checkpoint persistence to disk.
///
/// Writes go to a temporary file that is synced and then renamed over the
/// checkpoint, so a crash mid-write never leaves a torn file behind.
pub struct CheckpointManager {
    file_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(checkpoint_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: checkpoint_path.as_ref().to_path_buf(),
        }
    }

    /// Loads the checkpoint, or `None` when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file exists but cannot be read or does not
    /// contain a valid checkpoint.
    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.file_path.exists() {
            debug!("No checkpoint file found at {:?}", self.file_path);
            return Ok(None);
        }

        match fs::read_to_string(&self.file_path).await {
            Ok(content) => match serde_json::from_str::<Checkpoint>(&content) {
                Ok(checkpoint) => {
                    info!(
                        table = %checkpoint.table,
                        last_id = %checkpoint.cursor.last_id,
                        last_timestamp = %checkpoint.cursor.last_timestamp,
                        "Loaded checkpoint"
                    );
                    Ok(Some(checkpoint))
                }
                Err(e) => {
                    error!("Failed to parse checkpoint file: {}", e);
                    Err(Error::Config(format!("Invalid checkpoint file: {}", e)))
                }
            },
            Err(e) => {
                error!("Failed to read checkpoint file: {}", e);
                Err(Error::Io(e))
            }
        }
    }

    /// Saves the checkpoint atomically.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        debug!(
            table = %checkpoint.table,
            last_id = %checkpoint.cursor.last_id,
            "Saving checkpoint"
        );

        let temp_path = self.file_path.with_extension("tmp");

        let json = serde_json::to_string_pretty(checkpoint)?;
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.file_path).await?;

        debug!("Checkpoint saved successfully");
        Ok(())
    }
}
