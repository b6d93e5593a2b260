//! Persistence collaborator behind `load` and `save` statements.
//!
//! A store maps a document path to a flat object of scalar values. `load` reads one key
//! (absent when the document or the key does not exist); `save` is a read-modify-write
//! that leaves every other key of the document untouched.

use async_trait::async_trait;
use thiserror::Error;

use crate::eval::value::Value;

pub mod in_memory;
pub mod local_fs;

pub use in_memory::InMemoryStore;
pub use local_fs::LocalJsonStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Io(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[mockall::automock]
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Reads `key` from the document at `path`.
    async fn load(&self, path: &str, key: &str) -> StorageResult<Option<Value>>;

    /// Writes `key` into the document at `path`, keeping the other keys.
    async fn save(&self, path: &str, key: &str, value: &Value) -> StorageResult<()>;
}
