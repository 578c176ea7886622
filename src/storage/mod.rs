//! The blob storage contract. This is deliberately the only trait in
//! the crate whose implementations may do raw I/O on behalf of everyone
//! else; shards, sort index nodes, and root blocks are all just paths
//! through this interface. `local.rs` ships one concrete implementation
//! over `std::fs` so the rest of the crate is runnable and testable.

mod ident;
mod local;

pub use ident::local_identifier;
pub use local::LocalFsStorage;

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub content_type: Option<String>,
    pub length: u64,
    pub last_modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub names: Vec<String>,
    pub next: Option<String>,
}

/// The cooperative write lock body persisted as small JSON alongside a
/// storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteLockBody {
    pub owner: String,
    pub acquired_at_ms: u64,
    pub timestamp_ms: u64,
}

/// A blob storage backend: local filesystem, object store, or anything
/// else that can hand back bytes by path. The engine only ever talks to
/// this trait; it never assumes a local filesystem is underneath.
pub trait BlobStorage: Send + Sync {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;
    fn write(&self, path: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<()>;
    fn delete_file(&self, path: &str) -> Result<()>;
    fn delete_dir(&self, path: &str) -> Result<()>;

    fn file_exists(&self, path: &str) -> Result<bool>;
    fn dir_exists(&self, path: &str) -> Result<bool>;
    fn is_empty(&self, path: &str) -> Result<bool>;
    fn info(&self, path: &str) -> Result<Option<FileInfo>>;

    /// Immediate children only, lexicographic order.
    fn list_files(&self, prefix: &str, max: usize, continuation: Option<&str>) -> Result<ListPage>;
    fn list_dirs(&self, prefix: &str, max: usize, continuation: Option<&str>) -> Result<ListPage>;

    fn copy_to(&self, src: &str, dst: &str) -> Result<()>;

    fn acquire_write_lock(&self, path: &str, owner: &str) -> Result<bool>;
    fn check_write_lock(&self, path: &str) -> Result<Option<WriteLockBody>>;
    fn refresh_write_lock(&self, path: &str, owner: &str) -> Result<bool>;
    fn release_write_lock(&self, path: &str) -> Result<()>;
}
