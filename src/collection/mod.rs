//! Collection: routes operations to the shard a record id hashes to,
//! owns the shard cache, and drives one background persistence worker per
//! collection. Grounded in the teacher's `Collection` (`collection/core.rs`,
//! a name + cache + storage + index-manager bundle behind an `Arc`), with
//! the cache/indexes swapped for this crate's `ShardCache`/`SortManager`
//! and the storage engine swapped for the `BlobStorage` contract.

pub mod cache;
mod worker;

use crate::config::{CollectionConfig, StoreConfig};
use crate::errors::{Result, StoreError};
use crate::record::{self, Record};
use crate::shard::{self, Shard};
use crate::sort_index::Page;
use crate::sort_manager::SortManager;
use crate::storage::BlobStorage;
use crate::support::with_retry;
use crate::types::{Direction, RecordId, ValueType};
use bson::Document as BsonDocument;
use cache::ShardCache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

struct Inner {
    name: String,
    storage: Arc<dyn BlobStorage>,
    config: CollectionConfig,
    cache: ShardCache,
    sort_manager: SortManager,
    scheduler: Arc<worker::SaveScheduler>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    /// Surfaced to the next operation and to `shutdown()`. The offending
    /// shard stays dirty and is retried on the next wake.
    last_failure: Mutex<Option<StoreError>>,
}

impl Inner {
    fn shard_path(&self, shard_id: u32) -> String {
        format!("{}/{shard_id}", self.name)
    }

    fn load_shard(&self, shard_id: u32) -> Result<Shard> {
        match self.storage.read(&self.shard_path(shard_id))? {
            None => Ok(Shard::new(shard_id)),
            Some(bytes) => Ok(Shard::from_records(shard_id, shard::decode_shard_file(&bytes)?)),
        }
    }

    fn flush_one_shard(&self, shard_id: u32) -> Result<()> {
        let path = self.shard_path(shard_id);
        let (is_empty, records) =
            self.cache.with_shard(shard_id, || self.load_shard(shard_id), |s| (s.is_empty(), s.records.clone()))?;

        with_retry(RETRY_ATTEMPTS, RETRY_BACKOFF, || -> Result<()> {
            if is_empty {
                return self.storage.delete_file(&path);
            }
            let bytes = shard::encode_shard_file(&records)?;
            self.storage.write(&path, None, &bytes)?;
            if self.config.verify_after_write {
                let reread = self.storage.read(&path)?;
                if reread.as_deref() != Some(bytes.as_slice()) {
                    return Err(StoreError::Corruption(format!(
                        "post-write verification mismatch for shard {shard_id}"
                    )));
                }
            }
            Ok(())
        })
    }

    /// Drain the dirty set, persist each shard concurrently, clear the
    /// dirty flag only on success, then evict clean shards over the cap.
    fn flush_dirty_shards(&self) -> Result<()> {
        let dirty_ids = self.cache.dirty_ids();
        if dirty_ids.is_empty() {
            return Ok(());
        }
        log::debug!("collection {} flushing {} dirty shard(s)", self.name, dirty_ids.len());

        let results: Vec<(u32, Result<()>)> = std::thread::scope(|scope| {
            let handles: Vec<_> =
                dirty_ids.iter().map(|&id| scope.spawn(move || (id, self.flush_one_shard(id)))).collect();
            handles.into_iter().map(|h| h.join().expect("shard flush thread panicked")).collect()
        });

        let mut first_err = None;
        for (shard_id, result) in results {
            match result {
                Ok(()) => self.cache.mark_clean(shard_id),
                Err(e) => {
                    log::warn!("collection {} failed to flush shard {shard_id}: {e}", self.name);
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        log::debug!("collection {} flush cycle complete", self.name);
        self.cache.evict_clean_to_cap();
        first_err.map_or(Ok(()), Err)
    }
}

/// A sharded collection of schemaless BSON records keyed by UUID, with a
/// registry of live sort indexes fanned out on every mutation.
pub struct Collection {
    inner: Arc<Inner>,
}

impl Collection {
    #[must_use]
    pub fn open(storage: Arc<dyn BlobStorage>, name: impl Into<String>, config: CollectionConfig, store_config: StoreConfig) -> Self {
        let name = name.into();
        let sort_manager = SortManager::new(storage.clone(), &name, config.index_config, store_config.checksum);
        let scheduler = Arc::new(worker::SaveScheduler::new(config.debounce, config.max_save_delay));
        let inner = Arc::new(Inner {
            name,
            storage,
            config,
            cache: ShardCache::new(config.max_cached_shards),
            sort_manager,
            scheduler: scheduler.clone(),
            worker: Mutex::new(None),
            last_failure: Mutex::new(None),
        });

        let flush_target = inner.clone();
        let handle = worker::spawn(scheduler, move || {
            if let Err(e) = flush_target.flush_dirty_shards() {
                *flush_target.last_failure.lock() = Some(e);
            }
        });
        *inner.worker.lock() = Some(handle);

        Self { inner }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn shard_id(&self, id: &RecordId) -> u32 {
        shard::shard_id_for(id, self.inner.config.num_shards)
    }

    /// Surface any failure the background worker recorded on the last
    /// flush. Consulted at the start of the next operation and at shutdown.
    fn check_failure(&self) -> Result<()> {
        match self.inner.last_failure.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `insertOne`: generate an id if `_id` is missing, replace any
    /// existing record under that id in its shard, fan the new record out
    /// to every live sort index, and schedule a save.
    pub fn insert_one(&self, doc: BsonDocument) -> Result<RecordId> {
        self.check_failure()?;
        let record = Record::from_full_document(doc)?;
        let id = record.id;
        let shard_id = self.shard_id(&id);
        self.inner.cache.with_shard_mut(shard_id, || self.inner.load_shard(shard_id), |shard| {
            shard.records.insert(id, record.clone());
            shard.dirty = true;
        })?;
        self.inner.sort_manager.add_record(&record)?;
        self.inner.scheduler.schedule_save();
        Ok(id)
    }

    /// `getOne`: loads the target shard if not already cached.
    pub fn get_one(&self, id: &RecordId) -> Result<Option<Record>> {
        self.check_failure()?;
        let shard_id = self.shard_id(id);
        let record = self.inner.cache.with_shard(shard_id, || self.inner.load_shard(shard_id), |shard| {
            shard.records.get(id).cloned()
        })?;
        self.inner.cache.evict_clean_to_cap();
        Ok(record)
    }

    /// `updateOne`: shallow-merge `updates` into the existing record;
    /// with `upsert`, construct `{_id: id, ...updates}` when absent.
    /// Returns whether a write happened.
    pub fn update_one(&self, id: &RecordId, updates: &BsonDocument, upsert: bool) -> Result<bool> {
        self.check_failure()?;
        let shard_id = self.shard_id(id);
        let mut old_for_index: Option<Record> = None;
        let mut new_for_index: Option<Record> = None;

        let mutated = self.inner.cache.with_shard_mut(shard_id, || self.inner.load_shard(shard_id), |shard| {
            if let Some(existing) = shard.records.get_mut(id) {
                old_for_index = Some(existing.clone());
                existing.merge(updates);
                new_for_index = Some(existing.clone());
                shard.dirty = true;
                true
            } else if upsert {
                let mut body = updates.clone();
                body.remove(record::ID_FIELD);
                let created = Record::new(*id, body);
                new_for_index = Some(created.clone());
                shard.records.insert(*id, created);
                shard.dirty = true;
                true
            } else {
                false
            }
        })?;

        if mutated {
            let new_record = new_for_index.expect("set whenever mutated is true");
            self.inner.sort_manager.update_record(&new_record, old_for_index.as_ref())?;
            self.inner.scheduler.schedule_save();
        }
        Ok(mutated)
    }

    /// `replaceOne`: replace the whole record body; same upsert
    /// semantics as `updateOne`.
    pub fn replace_one(&self, id: &RecordId, doc: BsonDocument, upsert: bool) -> Result<bool> {
        self.check_failure()?;
        let shard_id = self.shard_id(id);
        let new_record = Record::new(*id, doc);
        let mut old_for_index: Option<Record> = None;

        let mutated = self.inner.cache.with_shard_mut(shard_id, || self.inner.load_shard(shard_id), |shard| {
            let existed = shard.records.contains_key(id);
            if existed || upsert {
                old_for_index = shard.records.insert(*id, new_record.clone());
                shard.dirty = true;
                true
            } else {
                false
            }
        })?;

        if mutated {
            self.inner.sort_manager.update_record(&new_record, old_for_index.as_ref())?;
            self.inner.scheduler.schedule_save();
        }
        Ok(mutated)
    }

    /// `deleteOne`: returns whether the record existed.
    pub fn delete_one(&self, id: &RecordId) -> Result<bool> {
        self.check_failure()?;
        let shard_id = self.shard_id(id);
        let removed = self.inner.cache.with_shard_mut(shard_id, || self.inner.load_shard(shard_id), |shard| {
            let removed = shard.records.remove(id);
            if removed.is_some() {
                shard.dirty = true;
            }
            removed
        })?;

        if let Some(old) = &removed {
            self.inner.sort_manager.delete_record(old)?;
            self.inner.scheduler.schedule_save();
        }
        Ok(removed.is_some())
    }

    fn list_shard_ids(&self) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        let mut continuation = None;
        loop {
            let page = self.inner.storage.list_files(&self.inner.name, 1000, continuation.as_deref())?;
            for name in &page.names {
                if let Ok(id) = name.parse::<u32>() {
                    ids.push(id);
                }
            }
            match page.next {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn read_shard_records(&self, shard_id: u32) -> Result<Vec<Record>> {
        let Some(bytes) = self.inner.storage.read(&self.inner.shard_path(shard_id))? else {
            return Ok(Vec::new());
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(shard::decode_shard_file(&bytes)?.into_values().collect())
    }

    /// `iterateRecords`: a finite, non-restartable, lazy sequence over
    /// *persisted* shard files read directly from storage. The shard
    /// cache is never consulted, so dirty unflushed mutations aren't
    /// visible; each shard reflects exactly what was last flushed to it.
    pub fn iterate_records(&self) -> Result<impl Iterator<Item = Result<Record>> + '_> {
        let shard_ids = self.list_shard_ids()?;
        Ok(shard_ids.into_iter().flat_map(move |shard_id| match self.read_shard_records(shard_id) {
            Ok(records) => EitherIter::Left(records.into_iter().map(Ok)),
            Err(e) => EitherIter::Right(std::iter::once(Err(e))),
        }))
    }

    /// `getAll`: wraps `iterate_records` with skip/limit; skip is
    /// linear-cost.
    pub fn get_all(&self, skip: usize, limit: usize) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        for (i, record) in self.iterate_records()?.enumerate() {
            if i < skip {
                continue;
            }
            if out.len() >= limit {
                break;
            }
            out.push(record?);
        }
        Ok(out)
    }

    // --- sort index administration, delegated straight through ---

    pub fn ensure_sort_index(&self, field: &str, direction: Direction, value_type: ValueType) -> Result<()> {
        self.inner.sort_manager.ensure_sort_index(field, direction, value_type, || {
            // Buffers the whole collection before handing it to `build()`.
            let records: Vec<Result<Record>> = match self.iterate_records() {
                Ok(iter) => iter.collect(),
                Err(e) => vec![Err(e)],
            };
            Box::new(records.into_iter())
        })?;
        Ok(())
    }

    pub fn get_sorted_records(&self, field: &str, direction: Direction, page_id: &str) -> Result<Option<Page>> {
        self.inner.sort_manager.get_sorted_records(field, direction, page_id)
    }

    pub fn list_sort_indexes(&self) -> Result<Vec<(String, Direction)>> {
        self.inner.sort_manager.list_sort_indexes()
    }

    pub fn delete_sort_index(&self, field: &str, direction: Direction) -> Result<bool> {
        self.inner.sort_manager.delete_sort_index(field, direction)
    }

    pub fn delete_all_sort_indexes(&self) -> Result<()> {
        self.inner.sort_manager.delete_all_sort_indexes()
    }

    /// `shutdown`: cancel the timer, stop the writer (its last act is
    /// a synchronous flush), then shut down every live sort index and
    /// clear the shard cache.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.scheduler.shutdown();
        if let Some(handle) = self.inner.worker.lock().take() {
            handle.join().map_err(|_| StoreError::Internal("persistence worker thread panicked".to_string()))?;
        }
        self.check_failure()?;
        self.inner.sort_manager.shutdown()?;
        self.inner.cache.clear();
        Ok(())
    }

    /// `drop()`: cancel the scheduled save, clear caches, and delete the
    /// whole collection directory (shards and sort indexes both live
    /// under it). The worker's shutdown path still performs one final
    /// flush before exiting; harmless here since the directory is removed
    /// immediately after.
    pub fn delete(&self) -> Result<()> {
        self.inner.scheduler.shutdown();
        if let Some(handle) = self.inner.worker.lock().take() {
            let _ = handle.join();
        }
        self.inner.cache.clear();
        self.inner.storage.delete_dir(&self.inner.name)
    }
}

enum EitherIter<A, B> {
    Left(A),
    Right(B),
}

impl<T, A: Iterator<Item = T>, B: Iterator<Item = T>> Iterator for EitherIter<A, B> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        match self {
            Self::Left(a) => a.next(),
            Self::Right(b) => b.next(),
        }
    }
}
