//! Checkpoint persistence for progressive chunk processing. One file per
//! checkpoint id under the configured checkpoint directory, resumable by
//! id with file rehydration when the checkpoint isn't already in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub chunk_id: String,
    pub state: CheckpointState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: serde_json::Value,
}

/// Holds checkpoints in memory and mirrors them to disk so a later
/// process can resume a session by checkpoint id.
pub struct CheckpointStore {
    dir: PathBuf,
    memory: Mutex<HashMap<String, Checkpoint>>,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), memory: Mutex::new(HashMap::new()) }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&checkpoint.id);
        let json = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(&path, json)?;
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(checkpoint.id.clone(), checkpoint);
        }
        Ok(())
    }

    /// Resume a checkpoint by id, rehydrating from disk if it isn't cached.
    pub fn resume(&self, id: &str) -> Result<Checkpoint> {
        if let Ok(memory) = self.memory.lock() {
            if let Some(checkpoint) = memory.get(id) {
                return Ok(checkpoint.clone());
            }
        }

        let path = self.path_for(id);
        if !path.exists() {
            return Err(OrchestratorError::Validation(format!("no checkpoint found for id {id}")));
        }
        let raw = std::fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw)?;
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(id.to_string(), checkpoint.clone());
        }
        Ok(checkpoint)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, chunk_id: &str) -> Checkpoint {
        Checkpoint {
            id: id.to_string(),
            chunk_id: chunk_id.to_string(),
            state: CheckpointState::Pending,
            result: None,
            error: None,
            timestamp: chrono::Utc::now(),
            context: serde_json::json!({}),
        }
    }

    #[test]
    fn save_then_resume_from_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(sample("cp-1", "chunk-1")).unwrap();
        let resumed = store.resume("cp-1").unwrap();
        assert_eq!(resumed.chunk_id, "chunk-1");
    }

    #[test]
    fn resume_rehydrates_from_disk_when_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(sample("cp-2", "chunk-2")).unwrap();

        let fresh_store = CheckpointStore::new(dir.path());
        let resumed = fresh_store.resume("cp-2").unwrap();
        assert_eq!(resumed.chunk_id, "chunk-2");
    }

    #[test]
    fn resume_missing_checkpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.resume("does-not-exist").is_err());
    }
}
