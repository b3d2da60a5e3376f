//! Durable blob store
//!
//! Key-value persistence boundary for the ledger and the latest analysis.
//! Absent or unreadable blobs are reported as `None` so callers can degrade
//! to empty state instead of failing; nothing here is fatal to the process.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{info, warn};

/// Opaque get/set blob storage. Implementations must treat a missing key
/// as `None`, never as an error.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, blob: &str) -> Result<()>;
}

/// File-backed store: one JSON file per key under a data directory
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        if !path.exists() {
            info!(key, path = %path.display(), "💾 No blob found, starting fresh");
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(key, error = %e, "Failed to read blob, treating as absent");
                None
            }
        }
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, blob)
            .with_context(|| format!("Failed to write blob {}", path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.blobs.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert(key.to_string(), blob.to_string());
        }
        Ok(())
    }
}
