//! Database: a name → Collection map over a shared storage root.
//! Grounded in the teacher's top-level `Database` (`src/lib.rs`'s
//! `engine: Arc<Engine>` bundle) but slimmed to what this crate actually
//! needs: lazy idempotent collection access and a fan-out shutdown.

use crate::collection::Collection;
use crate::config::{CollectionConfig, StoreConfig};
use crate::errors::Result;
use crate::storage::BlobStorage;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Database {
    storage: Arc<dyn BlobStorage>,
    store_config: StoreConfig,
    collection_config: CollectionConfig,
    collections: Mutex<HashMap<String, Arc<Collection>>>,
}

impl Database {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>, store_config: StoreConfig, collection_config: CollectionConfig) -> Self {
        Self { storage, store_config, collection_config, collections: Mutex::new(HashMap::new()) }
    }

    /// Lazily open (or return the already-open) collection by name.
    /// Idempotent: repeated calls with the same name return the same
    /// `Collection` handle.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        let mut collections = self.collections.lock();
        collections
            .entry(name.to_string())
            .or_insert_with(|| {
                log::info!("opening collection {name}");
                Arc::new(Collection::open(self.storage.clone(), name, self.collection_config, self.store_config))
            })
            .clone()
    }

    /// Union of in-memory collection names and storage-directory names
    /// found at the storage root.
    pub fn collections(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.collections.lock().keys().cloned().collect();

        let mut continuation = None;
        loop {
            let page = self.storage.list_dirs("", 1000, continuation.as_deref())?;
            names.extend(page.names);
            match page.next {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Permanently remove a collection: shuts it down first if currently
    /// open, then deletes its on-disk directory.
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let existing = self.collections.lock().remove(name);
        match existing {
            Some(collection) => collection.delete(),
            None => {
                let placeholder =
                    Collection::open(self.storage.clone(), name, self.collection_config, self.store_config);
                let result = placeholder.delete();
                result
            }
        }
    }

    /// Shut down every currently-open collection.
    pub fn shutdown(&self) -> Result<()> {
        let collections: Vec<Arc<Collection>> = self.collections.lock().drain().map(|(_, c)| c).collect();
        let mut first_err = None;
        for collection in collections {
            if let Err(e) = collection.shutdown()
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
