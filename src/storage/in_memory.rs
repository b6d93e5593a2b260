//! DashMap-backed store for tests and sessions that do not outlive the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{FlowStore, StorageResult};
use crate::eval::value::Value;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<DashMap<String, HashMap<String, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the document at `path`, if any key was ever saved to it.
    pub fn document(&self, path: &str) -> Option<HashMap<String, Value>> {
        self.documents.get(path).map(|doc| doc.clone())
    }
}

#[async_trait]
impl FlowStore for InMemoryStore {
    async fn load(&self, path: &str, key: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .documents
            .get(path)
            .and_then(|doc| doc.get(key).cloned()))
    }

    async fn save(&self, path: &str, key: &str, value: &Value) -> StorageResult<()> {
        // the entry guard holds the shard lock for the whole read-modify-write
        self.documents
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
