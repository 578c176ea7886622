//! Tunables for collections and their sort indexes, gathered here rather
//! than scattered as literals through the code they govern.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub checksum: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { checksum: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectionConfig {
    pub num_shards: u32,
    pub max_cached_shards: usize,
    pub debounce: Duration,
    pub max_save_delay: Duration,
    /// Re-read the just-written shard file and compare bytes. Only safe in
    /// single-writer mode, so it defaults off.
    pub verify_after_write: bool,
    /// Config handed to every sort index a collection's `SortManager` opens.
    pub index_config: IndexConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            num_shards: 100,
            max_cached_shards: 10,
            debounce: Duration::from_millis(300),
            max_save_delay: Duration::from_millis(1000),
            verify_after_write: false,
            index_config: IndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub page_size: usize,
    pub readonly: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { page_size: 1000, readonly: false }
    }
}
