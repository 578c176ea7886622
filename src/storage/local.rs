use super::{BlobStorage, FileInfo, ListPage, WriteLockBody};
use crate::errors::{Result, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A `BlobStorage` backed by a directory on the local filesystem. Every
/// path the caller passes is relative to `root`.
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn lock_path(&self, path: &str) -> PathBuf {
        self.full(&format!("{path}.lock"))
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn list_dir_entries(dir: &Path, want_dirs: bool) -> std::io::Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        if is_dir == want_dirs
            && let Some(name) = entry.file_name().to_str()
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn paginate(names: Vec<String>, max: usize, continuation: Option<&str>) -> ListPage {
    let start = match continuation {
        Some(tok) => names.iter().position(|n| n.as_str() > tok).unwrap_or(names.len()),
        None => 0,
    };
    let end = (start + max.max(1)).min(names.len());
    let page = names[start..end].to_vec();
    let next = if end < names.len() { page.last().cloned() } else { None };
    ListPage { names: page, next }
}

impl BlobStorage for LocalFsStorage {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.full(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &str, _content_type: Option<&str>, bytes: &[u8]) -> Result<()> {
        let full = self.full(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write to a temp file then rename, so a crash mid-write never
        // leaves a half-written shard/node file on disk.
        let tmp = full.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &full)?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.full(path)) {
            Ok(()) | Err(_) if !self.full(path).exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_dir(&self, path: &str) -> Result<()> {
        match fs::remove_dir_all(self.full(path)) {
            Ok(()) | Err(_) if !self.full(path).exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.full(path).is_file())
    }

    fn dir_exists(&self, path: &str) -> Result<bool> {
        Ok(self.full(path).is_dir())
    }

    fn is_empty(&self, path: &str) -> Result<bool> {
        let full = self.full(path);
        if !full.is_dir() {
            return Ok(true);
        }
        Ok(fs::read_dir(full)?.next().is_none())
    }

    fn info(&self, path: &str) -> Result<Option<FileInfo>> {
        let full = self.full(path);
        match fs::metadata(&full) {
            Ok(meta) => Ok(Some(FileInfo {
                content_type: None,
                length: meta.len(),
                last_modified: meta.modified().ok(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_files(&self, prefix: &str, max: usize, continuation: Option<&str>) -> Result<ListPage> {
        let names = list_dir_entries(&self.full(prefix), false)?;
        Ok(paginate(names, max, continuation))
    }

    fn list_dirs(&self, prefix: &str, max: usize, continuation: Option<&str>) -> Result<ListPage> {
        let names = list_dir_entries(&self.full(prefix), true)?;
        Ok(paginate(names, max, continuation))
    }

    fn copy_to(&self, src: &str, dst: &str) -> Result<()> {
        let dst_full = self.full(dst);
        if let Some(parent) = dst_full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.full(src), dst_full)?;
        Ok(())
    }

    fn acquire_write_lock(&self, path: &str, owner: &str) -> Result<bool> {
        const EXPIRY_MS: u64 = 30_000;
        if let Some(existing) = self.check_write_lock(path)? {
            let age = now_ms().saturating_sub(existing.timestamp_ms);
            if age < EXPIRY_MS && existing.owner != owner {
                return Ok(false);
            }
        }
        let now = now_ms();
        let body = WriteLockBody { owner: owner.to_string(), acquired_at_ms: now, timestamp_ms: now };
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| StoreError::Storage(format!("encoding write lock: {e}")))?;
        self.write(&format!("{path}.lock"), Some("application/json"), &bytes)?;
        Ok(true)
    }

    fn check_write_lock(&self, path: &str) -> Result<Option<WriteLockBody>> {
        let lock_path = self.lock_path(path);
        match fs::read(&lock_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Storage(format!("decoding write lock: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn refresh_write_lock(&self, path: &str, owner: &str) -> Result<bool> {
        match self.check_write_lock(path)? {
            Some(existing) if existing.owner == owner => {
                let body = WriteLockBody { timestamp_ms: now_ms(), ..existing };
                let bytes = serde_json::to_vec(&body)
                    .map_err(|e| StoreError::Storage(format!("encoding write lock: {e}")))?;
                self.write(&format!("{path}.lock"), Some("application/json"), &bytes)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release_write_lock(&self, path: &str) -> Result<()> {
        self.delete_file(&format!("{path}.lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = LocalFsStorage::new(dir.path());
        store.write("a/b", None, b"hello").unwrap();
        assert_eq!(store.read("a/b").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = LocalFsStorage::new(dir.path());
        assert_eq!(store.read("nope").unwrap(), None);
    }

    #[test]
    fn write_lock_is_cooperative() {
        let dir = tempdir().unwrap();
        let store = LocalFsStorage::new(dir.path());
        assert!(store.acquire_write_lock("db", "writer-a").unwrap());
        assert!(!store.acquire_write_lock("db", "writer-b").unwrap());
        store.release_write_lock("db").unwrap();
        assert!(store.acquire_write_lock("db", "writer-b").unwrap());
    }

    #[test]
    fn list_files_paginates_lexicographically() {
        let dir = tempdir().unwrap();
        let store = LocalFsStorage::new(dir.path());
        for n in ["a", "b", "c", "d"] {
            store.write(n, None, b"x").unwrap();
        }
        let page1 = store.list_files("", 2, None).unwrap();
        assert_eq!(page1.names, vec!["a".to_string(), "b".to_string()]);
        assert!(page1.next.is_some());
        let page2 = store.list_files("", 2, page1.next.as_deref()).unwrap();
        assert_eq!(page2.names, vec!["c".to_string(), "d".to_string()]);
    }
}
