//! Local file system store.
//!
//! Each document path maps to one pretty-printed JSON object under a base directory.
//! Writes go to a temporary file in the target directory that is then renamed over the
//! document, so a reader never sees a half-written file.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value as JsonValue};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{FlowStore, StorageError, StorageResult};
use crate::eval::value::Value;

#[derive(Debug, Clone)]
pub struct LocalJsonStore {
    base_dir: PathBuf,
    /// Serializes read-modify-write cycles per resolved file.
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LocalJsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves a document path under the base directory. Absolute paths and parent
    /// components are rejected.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        if path.trim().is_empty() {
            return Err(StorageError::InvalidPath("empty path".to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StorageError::InvalidPath(format!(
                        "`{}` must stay inside the storage directory",
                        path
                    )))
                }
            }
        }
        Ok(self.base_dir.join(relative))
    }

    fn lock_for(&self, file: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(file.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reads the document object. Missing files are empty; corrupt files are logged and
    /// treated as empty.
    async fn read_document(&self, file: &Path) -> StorageResult<Map<String, JsonValue>> {
        let contents = match fs::read(file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    file.display(),
                    e
                )))
            }
        };

        match serde_json::from_slice::<JsonValue>(&contents) {
            Ok(JsonValue::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(file = %file.display(), "document is not a JSON object, treating as empty");
                Ok(Map::new())
            }
        }
    }

    async fn write_atomically(&self, file: &Path, data: Vec<u8>) -> StorageResult<()> {
        let dir = file
            .parent()
            .ok_or_else(|| StorageError::InvalidPath("no parent directory".to_string()))?
            .to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to create directory: {}", e)))?;

        let target = file.to_path_buf();
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut temp = NamedTempFile::new_in(&dir)
                .map_err(|e| StorageError::Io(format!("Failed to create temporary file: {}", e)))?;
            temp.write_all(&data)
                .and_then(|_| temp.flush())
                .map_err(|e| StorageError::Io(format!("Failed to write temporary file: {}", e)))?;
            temp.persist(&target)
                .map_err(|e| StorageError::Io(format!("Failed to rename file: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(format!("Write task failed: {}", e)))?
    }
}

#[async_trait]
impl FlowStore for LocalJsonStore {
    async fn load(&self, path: &str, key: &str) -> StorageResult<Option<Value>> {
        let file = self.resolve(path)?;
        let document = self.read_document(&file).await?;
        debug!(file = %file.display(), key, found = document.contains_key(key), "load");
        Ok(document.get(key).map(Value::from_json))
    }

    async fn save(&self, path: &str, key: &str, value: &Value) -> StorageResult<()> {
        let file = self.resolve(path)?;
        let lock = self.lock_for(&file);
        let _guard = lock.lock().await;

        let mut document = self.read_document(&file).await?;
        document.insert(key.to_string(), value.to_json());
        let data = serde_json::to_vec_pretty(&JsonValue::Object(document))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.write_atomically(&file, data).await?;
        debug!(file = %file.display(), key, "save");
        Ok(())
    }
}
