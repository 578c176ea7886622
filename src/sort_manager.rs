//! Sort Manager: a collection's registry of live sort indexes, keyed by
//! `(field, direction)`. Owns nothing of the record data itself; it only
//! builds, looks up, and fans mutations out to whichever `SortIndex`
//! handles already exist in memory.

use crate::config::IndexConfig;
use crate::errors::Result;
use crate::record::Record;
use crate::sort_index::{Page, SortIndex};
use crate::storage::BlobStorage;
use crate::types::{Direction, ValueType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn dir_name(field: &str, direction: Direction) -> String {
    format!("{field}_{}", direction.as_dir_str())
}

pub struct SortManager {
    storage: Arc<dyn BlobStorage>,
    /// `R/<collection>/sort_indexes/<collection>`.
    base_dir: String,
    config: IndexConfig,
    checksum: bool,
    indexes: Mutex<HashMap<(String, Direction), Arc<SortIndex>>>,
}

impl SortManager {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>, collection_name: &str, config: IndexConfig, checksum: bool) -> Self {
        let base_dir = format!("{collection_name}/sort_indexes/{collection_name}");
        Self { storage, base_dir, config, checksum, indexes: Mutex::new(HashMap::new()) }
    }

    fn index_dir(&self, field: &str, direction: Direction) -> String {
        format!("{}/{}", self.base_dir, dir_name(field, direction))
    }

    /// Create-or-get the `(field, direction)` index. A brand-new index is
    /// built once from `records`; an existing one (in memory, or found on
    /// disk from a previous run) is returned as-is. Disagreeing on
    /// `value_type` with an already-open index fails `IndexTypeMismatch`.
    pub fn ensure_sort_index(
        &self,
        field: &str,
        direction: Direction,
        value_type: ValueType,
        records: impl FnOnce() -> Box<dyn Iterator<Item = Result<Record>>>,
    ) -> Result<Arc<SortIndex>> {
        let key = (field.to_string(), direction);
        {
            let indexes = self.indexes.lock();
            if let Some(existing) = indexes.get(&key) {
                if existing.value_type() != value_type {
                    return Err(crate::errors::StoreError::IndexTypeMismatch { field: field.to_string() });
                }
                return Ok(existing.clone());
            }
        }

        let dir = self.index_dir(field, direction);
        let pre_existing = self.storage.dir_exists(&dir)?;
        let index = Arc::new(SortIndex::open(
            self.storage.clone(),
            dir,
            field.to_string(),
            direction,
            value_type,
            self.config,
            self.checksum,
        )?);
        if !pre_existing {
            index.build(records())?;
        }

        let mut indexes = self.indexes.lock();
        Ok(indexes.entry(key).or_insert(index).clone())
    }

    /// Delegate to the index's `get_page`. Returns `None` if no such index
    /// is currently live.
    pub fn get_sorted_records(&self, field: &str, direction: Direction, page_id: &str) -> Result<Option<Page>> {
        let key = (field.to_string(), direction);
        let index = self.indexes.lock().get(&key).cloned();
        match index {
            Some(idx) => Ok(Some(idx.get_page(page_id)?)),
            None => Ok(None),
        }
    }

    /// Union of in-memory keys and `<field>_<asc|desc>` directories found
    /// on disk.
    pub fn list_sort_indexes(&self) -> Result<Vec<(String, Direction)>> {
        let mut keys: std::collections::BTreeSet<(String, Direction)> =
            self.indexes.lock().keys().cloned().collect();

        let mut continuation = None;
        loop {
            let page = self.storage.list_dirs(&self.base_dir, 1000, continuation.as_deref())?;
            for name in &page.names {
                if let Some((field, dir)) = name.rsplit_once('_')
                    && let Some(direction) = Direction::parse(dir)
                {
                    keys.insert((field.to_string(), direction));
                }
            }
            match page.next {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Remove the in-memory entry (persisting+dropping it first) and the
    /// on-disk directory. Returns whether either existed.
    pub fn delete_sort_index(&self, field: &str, direction: Direction) -> Result<bool> {
        let key = (field.to_string(), direction);
        let removed_in_memory = {
            let mut indexes = self.indexes.lock();
            if let Some(index) = indexes.remove(&key) {
                index.delete()?;
                true
            } else {
                false
            }
        };
        let dir = self.index_dir(field, direction);
        let existed_on_disk = self.storage.dir_exists(&dir)?;
        if existed_on_disk {
            self.storage.delete_dir(&dir)?;
        }
        Ok(removed_in_memory || existed_on_disk)
    }

    pub fn delete_all_sort_indexes(&self) -> Result<()> {
        for (field, direction) in self.list_sort_indexes()? {
            self.delete_sort_index(&field, direction)?;
        }
        Ok(())
    }

    /// Fan a new record out to every live index.
    pub fn add_record(&self, record: &Record) -> Result<()> {
        for index in self.indexes.lock().values() {
            index.add_record(record)?;
        }
        Ok(())
    }

    /// Fan a mutation out to every live index.
    pub fn update_record(&self, new_record: &Record, old_record: Option<&Record>) -> Result<()> {
        for index in self.indexes.lock().values() {
            index.update_record(new_record, old_record)?;
        }
        Ok(())
    }

    /// Fan a deletion out to every live index. `old_record` supplies the
    /// per-field value hints each index needs to find its entry.
    pub fn delete_record(&self, old_record: &Record) -> Result<()> {
        for index in self.indexes.lock().values() {
            if let Some(value) = old_record.field(index.field()) {
                index.delete_record(old_record.id, &value.clone())?;
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        let mut indexes = self.indexes.lock();
        for index in indexes.values() {
            index.shutdown()?;
        }
        indexes.clear();
        Ok(())
    }
}
