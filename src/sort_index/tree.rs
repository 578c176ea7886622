//! SortIndex: a persistent B-tree over `(value, record_id) → record`,
//! always stored in ascending `(value, record_id)` order on disk regardless
//! of the index's declared `Direction`. Direction only changes which
//! sibling link is "logical next" and whether a page's records are handed
//! back reversed, which keeps split/insert/delete logic single-directional.

use super::node::{InternalNode, LeafEntry, LeafNode, Node, NodePayload, NODE_FILE_VERSION};
use super::root_block::{RootBlockPayload, ROOT_BLOCK_FILE_VERSION, ROOT_BLOCK_PATH};
use super::value::{self, compare_value};
use crate::codec::framed;
use crate::codec::migration::MigrationTable;
use crate::codec::DecoderTable;
use crate::config::IndexConfig;
use crate::errors::{Result, StoreError};
use crate::record::Record;
use crate::storage::BlobStorage;
use crate::types::{Direction, RecordId, ValueType};
use bson::Bson;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One leaf's worth of results from `get_page`, carrying the cursor
/// metadata callers need to keep paginating.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Record>,
    pub total_records: u64,
    pub current_page_id: String,
    pub total_pages: u64,
    pub next_page_id: Option<String>,
    pub previous_page_id: Option<String>,
}

impl Page {
    fn empty(current_page_id: String) -> Self {
        Self {
            records: Vec::new(),
            total_records: 0,
            current_page_id,
            total_pages: 0,
            next_page_id: None,
            previous_page_id: None,
        }
    }
}

struct TreeState {
    root_id: Option<Uuid>,
    total_entries: u64,
    cache: HashMap<Uuid, Node>,
}

pub struct SortIndex {
    storage: Arc<dyn BlobStorage>,
    dir: String,
    field: String,
    direction: Direction,
    value_type: ValueType,
    config: IndexConfig,
    checksum: bool,
    state: Mutex<TreeState>,
}

enum InsertOutcome {
    Absorbed,
    Split { separator_value: Bson, separator_id: RecordId, new_node_id: Uuid },
}

fn pair_order(ty: ValueType, v1: &Bson, id1: RecordId, v2: &Bson, id2: RecordId) -> Ordering {
    match compare_value(ty, v1, v2) {
        Ordering::Equal => id1.cmp(&id2),
        other => other,
    }
}

fn leaf_insert_index(entries: &[LeafEntry], ty: ValueType, value: &Bson, record_id: RecordId) -> usize {
    entries.partition_point(|e| pair_order(ty, &e.value, e.record_id, value, record_id) == Ordering::Less)
}

/// The child to descend into for `(value, record_id)`. Callers that only
/// care about `value` pass `RecordId::nil()`, which, being the smallest
/// possible id, always routes to the leftmost child that could hold a
/// tie, matching "ties break toward the left subtree" for range starts.
fn choose_child_index(separators: &[(Bson, RecordId)], ty: ValueType, value: &Bson, record_id: RecordId) -> usize {
    for (i, (sep_value, sep_id)) in separators.iter().enumerate() {
        if pair_order(ty, value, record_id, sep_value, *sep_id) == Ordering::Less {
            return i;
        }
    }
    separators.len()
}

fn node_decoders() -> DecoderTable {
    DecoderTable::new().with_bson_decoder(NODE_FILE_VERSION)
}

fn root_decoders() -> DecoderTable {
    DecoderTable::new().with_bson_decoder(ROOT_BLOCK_FILE_VERSION)
}

impl SortIndex {
    /// Open (or create, lazily) the index rooted at `dir`. A missing root
    /// block means an empty tree, not an error.
    pub fn open(
        storage: Arc<dyn BlobStorage>,
        dir: String,
        field: String,
        direction: Direction,
        value_type: ValueType,
        config: IndexConfig,
        checksum: bool,
    ) -> Result<Self> {
        let index = Self {
            storage,
            dir,
            field,
            direction,
            value_type,
            config,
            checksum,
            state: Mutex::new(TreeState { root_id: None, total_entries: 0, cache: HashMap::new() }),
        };
        index.load_root_block()?;
        Ok(index)
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[must_use]
    pub fn total_entries(&self) -> u64 {
        self.state.lock().total_entries
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.readonly {
            Err(StoreError::Readonly)
        } else {
            Ok(())
        }
    }

    fn node_path(&self, id: Uuid) -> String {
        format!("{}/{id}", self.dir)
    }

    fn root_block_path(&self) -> String {
        format!("{}/{ROOT_BLOCK_PATH}", self.dir)
    }

    fn load_root_block(&self) -> Result<()> {
        let path = self.root_block_path();
        if self.storage.read(&path)?.is_none() {
            return Ok(());
        }
        let payload: RootBlockPayload =
            framed::load(self.storage.as_ref(), &path, &root_decoders(), &MigrationTable::new(), None, self.checksum)?;
        let root_id = Uuid::parse_str(&payload.root_id).map_err(|e| StoreError::Corruption(e.to_string()))?;
        let mut state = self.state.lock();
        state.root_id = Some(root_id);
        state.total_entries = payload.total_entries;
        Ok(())
    }

    fn persist_root_block(&self, state: &TreeState) -> Result<()> {
        let Some(root_id) = state.root_id else { return Ok(()) };
        let payload =
            RootBlockPayload::new(root_id, &self.field, self.direction, self.value_type, state.total_entries);
        framed::save(self.storage.as_ref(), &self.root_block_path(), &payload, ROOT_BLOCK_FILE_VERSION, self.checksum)
    }

    fn persist_node(&self, node: &Node) -> Result<()> {
        let path = self.node_path(node.id());
        framed::save(self.storage.as_ref(), &path, &node.to_payload(), NODE_FILE_VERSION, self.checksum)
    }

    fn load_node(&self, state: &mut TreeState, id: Uuid) -> Result<Node> {
        if let Some(node) = state.cache.get(&id) {
            return Ok(node.clone());
        }
        let path = self.node_path(id);
        let payload: NodePayload =
            framed::load(self.storage.as_ref(), &path, &node_decoders(), &MigrationTable::new(), None, self.checksum)?;
        let node = Node::from_payload(id, payload)?;
        state.cache.insert(id, node.clone());
        Ok(node)
    }

    fn store_node(&self, state: &mut TreeState, node: Node) -> Result<()> {
        self.persist_node(&node)?;
        state.cache.insert(node.id(), node);
        Ok(())
    }

    fn leftmost_leaf_id(&self, state: &mut TreeState, node_id: Uuid) -> Result<Uuid> {
        match self.load_node(state, node_id)? {
            Node::Leaf(_) => Ok(node_id),
            Node::Internal(internal) => self.leftmost_leaf_id(state, internal.children[0]),
        }
    }

    fn rightmost_leaf_id(&self, state: &mut TreeState, node_id: Uuid) -> Result<Uuid> {
        match self.load_node(state, node_id)? {
            Node::Leaf(_) => Ok(node_id),
            Node::Internal(internal) => {
                let last = *internal.children.last().expect("internal node always has >=2 children");
                self.rightmost_leaf_id(state, last)
            }
        }
    }

    /// Descend to the first leaf (in ascending storage order) that could
    /// hold `(value, record_id)`.
    fn descend_to_leaf(&self, state: &mut TreeState, node_id: Uuid, value: &Bson, record_id: RecordId) -> Result<Uuid> {
        match self.load_node(state, node_id)? {
            Node::Leaf(_) => Ok(node_id),
            Node::Internal(internal) => {
                let idx = choose_child_index(&internal.separators, self.value_type, value, record_id);
                self.descend_to_leaf(state, internal.children[idx], value, record_id)
            }
        }
    }

    fn insert_into(
        &self,
        state: &mut TreeState,
        node_id: Uuid,
        value: Bson,
        record_id: RecordId,
        record: Record,
    ) -> Result<InsertOutcome> {
        let mut node = self.load_node(state, node_id)?;
        match &mut node {
            Node::Leaf(leaf) => {
                let idx = leaf_insert_index(&leaf.entries, self.value_type, &value, record_id);
                leaf.entries.insert(idx, LeafEntry { value, record_id, record });

                if leaf.entries.len() <= self.config.page_size {
                    self.store_node(state, node)?;
                    return Ok(InsertOutcome::Absorbed);
                }

                // Overflow: split at floor(n/2), promoting the right leaf's
                // first entry (with its id, for uniqueness) as separator.
                let mid = leaf.entries.len() / 2;
                let right_entries = leaf.entries.split_off(mid);
                let right_id = Uuid::new_v4();
                let separator = (right_entries[0].value.clone(), right_entries[0].record_id);
                let old_next = leaf.next;
                leaf.next = Some(right_id);

                let right_node =
                    Node::Leaf(LeafNode { id: right_id, entries: right_entries, next: old_next, prev: Some(node_id) });

                self.store_node(state, node)?;
                self.store_node(state, right_node)?;

                if let Some(next_id) = old_next {
                    let mut next_node = self.load_node(state, next_id)?;
                    if let Some(next_leaf) = next_node.as_leaf_mut() {
                        next_leaf.prev = Some(right_id);
                    }
                    self.store_node(state, next_node)?;
                }

                Ok(InsertOutcome::Split { separator_value: separator.0, separator_id: separator.1, new_node_id: right_id })
            }
            Node::Internal(internal) => {
                let child_idx = choose_child_index(&internal.separators, self.value_type, &value, record_id);
                let child_id = internal.children[child_idx];
                let outcome = self.insert_into(state, child_id, value, record_id, record)?;

                let InsertOutcome::Split { separator_value, separator_id, new_node_id } = outcome else {
                    return Ok(InsertOutcome::Absorbed);
                };

                internal.separators.insert(child_idx, (separator_value, separator_id));
                internal.children.insert(child_idx + 1, new_node_id);

                if internal.separators.len() <= self.config.page_size {
                    self.store_node(state, node)?;
                    return Ok(InsertOutcome::Absorbed);
                }

                // True B-tree internal split: the median separator is
                // promoted, not duplicated into either side.
                let mid = internal.separators.len() / 2;
                let promoted = internal.separators[mid].clone();
                let right_separators = internal.separators.split_off(mid + 1);
                internal.separators.truncate(mid);
                let right_children = internal.children.split_off(mid + 1);
                let right_id = Uuid::new_v4();
                let right_node = Node::Internal(InternalNode { id: right_id, separators: right_separators, children: right_children });

                self.store_node(state, node)?;
                self.store_node(state, right_node)?;

                Ok(InsertOutcome::Split { separator_value: promoted.0, separator_id: promoted.1, new_node_id: right_id })
            }
        }
    }

    fn insert_value(&self, state: &mut TreeState, value: Bson, record: &Record) -> Result<()> {
        match state.root_id {
            None => {
                let leaf_id = Uuid::new_v4();
                let leaf = Node::Leaf(LeafNode {
                    id: leaf_id,
                    entries: vec![LeafEntry { value, record_id: record.id, record: record.clone() }],
                    next: None,
                    prev: None,
                });
                self.store_node(state, leaf)?;
                state.root_id = Some(leaf_id);
            }
            Some(root_id) => {
                let outcome = self.insert_into(state, root_id, value, record.id, record.clone())?;
                if let InsertOutcome::Split { separator_value, separator_id, new_node_id } = outcome {
                    let new_root_id = Uuid::new_v4();
                    let new_root = Node::Internal(InternalNode {
                        id: new_root_id,
                        separators: vec![(separator_value, separator_id)],
                        children: vec![root_id, new_node_id],
                    });
                    self.store_node(state, new_root)?;
                    state.root_id = Some(new_root_id);
                }
            }
        }
        state.total_entries += 1;
        self.persist_root_block(state)
    }

    /// Insert `(record[field], record._id, record)`. Records missing the
    /// indexed field are silently skipped (mirrors `build()`).
    pub fn add_record(&self, record: &Record) -> Result<()> {
        self.ensure_writable()?;
        let Some(value) = record.field(&self.field).cloned() else { return Ok(()) };
        let mut state = self.state.lock();
        self.insert_value(&mut state, value, record)
    }

    fn overwrite_in_place(&self, search_value: &Bson, new_value: &Bson, new_record: &Record) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(root_id) = state.root_id else { return Ok(false) };
        let leaf_id = self.descend_to_leaf(&mut state, root_id, search_value, new_record.id)?;
        let mut node = self.load_node(&mut state, leaf_id)?;
        let found = node
            .as_leaf_mut()
            .and_then(|leaf| leaf.entries.iter_mut().find(|e| e.record_id == new_record.id))
            .map(|entry| {
                entry.record = new_record.clone();
                entry.value = new_value.clone();
            })
            .is_some();
        if found {
            self.store_node(&mut state, node)?;
        }
        Ok(found)
    }

    /// Fan-out target for a record mutation whose previous value may be
    /// known. Same value → overwrite in place; otherwise delete-then-insert.
    pub fn update_record(&self, new_record: &Record, old_record: Option<&Record>) -> Result<()> {
        self.ensure_writable()?;
        if let Some(old) = old_record
            && let Some(old_value) = old.field(&self.field)
        {
            if let Some(new_value) = new_record.field(&self.field)
                && compare_value(self.value_type, old_value, new_value) == Ordering::Equal
                && self.overwrite_in_place(old_value, new_value, new_record)?
            {
                return Ok(());
            }
            let old_value = old_value.clone();
            self.delete_record(new_record.id, &old_value)?;
        }
        self.add_record(new_record)
    }

    /// Remove `(value_hint, id)`. Underfull leaves are never merged;
    /// tombstoning-style shrinkage is correct as long as search still works.
    pub fn delete_record(&self, record_id: RecordId, value_hint: &Bson) -> Result<bool> {
        self.ensure_writable()?;
        let mut state = self.state.lock();
        let Some(root_id) = state.root_id else { return Ok(false) };
        let start = self.descend_to_leaf(&mut state, root_id, value_hint, RecordId::nil())?;

        let mut current = Some(start);
        let mut removed = false;
        while let Some(leaf_id) = current {
            let mut node = self.load_node(&mut state, leaf_id)?;
            let Some(leaf) = node.as_leaf_mut() else { break };
            if let Some(first) = leaf.entries.first()
                && compare_value(self.value_type, &first.value, value_hint) == Ordering::Greater
            {
                break;
            }
            if let Some(pos) = leaf.entries.iter().position(|e| e.record_id == record_id && &e.value == value_hint) {
                leaf.entries.remove(pos);
                self.store_node(&mut state, node)?;
                removed = true;
                break;
            }
            current = leaf.next;
        }

        if removed {
            state.total_entries = state.total_entries.saturating_sub(1);
            self.persist_root_block(&state)?;
        }
        Ok(removed)
    }

    /// All records with `value == v`.
    pub fn find_by_value(&self, value: &Bson) -> Result<Vec<Record>> {
        let mut state = self.state.lock();
        let Some(root_id) = state.root_id else { return Ok(Vec::new()) };
        let start = self.descend_to_leaf(&mut state, root_id, value, RecordId::nil())?;

        let mut out = Vec::new();
        let mut current = Some(start);
        'scan: while let Some(leaf_id) = current {
            let node = self.load_node(&mut state, leaf_id)?;
            let Some(leaf) = node.as_leaf() else { break };
            for entry in &leaf.entries {
                match compare_value(self.value_type, &entry.value, value) {
                    Ordering::Equal => out.push(entry.record.clone()),
                    Ordering::Greater => break 'scan,
                    Ordering::Less => {}
                }
            }
            current = leaf.next;
        }
        Ok(out)
    }

    /// Records within `[min, max]` (bounds individually optional and
    /// individually inclusive/exclusive); at least one bound is required.
    pub fn find_by_range(
        &self,
        min: Option<&Bson>,
        max: Option<&Bson>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Vec<Record>> {
        if min.is_none() && max.is_none() {
            return Err(StoreError::Internal("find_by_range requires at least one bound".to_string()));
        }
        let mut state = self.state.lock();
        let Some(root_id) = state.root_id else { return Ok(Vec::new()) };
        let start = match min {
            Some(v) => self.descend_to_leaf(&mut state, root_id, v, RecordId::nil())?,
            None => self.leftmost_leaf_id(&mut state, root_id)?,
        };

        let mut out = Vec::new();
        let mut current = Some(start);
        'scan: while let Some(leaf_id) = current {
            let node = self.load_node(&mut state, leaf_id)?;
            let Some(leaf) = node.as_leaf() else { break };
            for entry in &leaf.entries {
                if let Some(lo) = min {
                    let cmp = compare_value(self.value_type, &entry.value, lo);
                    if cmp == Ordering::Less || (cmp == Ordering::Equal && !min_inclusive) {
                        continue;
                    }
                }
                if let Some(hi) = max {
                    let cmp = compare_value(self.value_type, &entry.value, hi);
                    if cmp == Ordering::Greater || (cmp == Ordering::Equal && !max_inclusive) {
                        break 'scan;
                    }
                }
                out.push(entry.record.clone());
            }
            current = leaf.next;
        }
        Ok(out)
    }

    /// The leaf named `page_id`, or the logically-leftmost leaf when
    /// `page_id` is empty. `Direction::Desc` reverses which sibling is
    /// "next" and the in-page record order.
    pub fn get_page(&self, page_id: &str) -> Result<Page> {
        let mut state = self.state.lock();
        let Some(root_id) = state.root_id else { return Ok(Page::empty(String::new())) };

        let leaf_id = if page_id.is_empty() {
            match self.direction {
                Direction::Asc => self.leftmost_leaf_id(&mut state, root_id)?,
                Direction::Desc => self.rightmost_leaf_id(&mut state, root_id)?,
            }
        } else {
            match Uuid::parse_str(page_id) {
                Ok(id) => id,
                Err(_) => return Ok(Page::empty(page_id.to_string())),
            }
        };

        let node = match self.load_node(&mut state, leaf_id) {
            Ok(n) => n,
            Err(StoreError::NotFound) => return Ok(Page::empty(page_id.to_string())),
            Err(e) => return Err(e),
        };
        let Some(leaf) = node.as_leaf() else {
            return Err(StoreError::Corruption(format!("page id {page_id} does not name a leaf")));
        };

        let mut records: Vec<Record> = leaf.entries.iter().map(|e| e.record.clone()).collect();
        let (next, previous) = match self.direction {
            Direction::Asc => (leaf.next, leaf.prev),
            Direction::Desc => {
                records.reverse();
                (leaf.prev, leaf.next)
            }
        };

        let total_pages = state.total_entries.div_ceil(self.config.page_size as u64);
        Ok(Page {
            records,
            total_records: state.total_entries,
            current_page_id: leaf.id.to_string(),
            total_pages,
            next_page_id: next.map(|u| u.to_string()),
            previous_page_id: previous.map(|u| u.to_string()),
        })
    }

    /// Insert every record the given iterator yields, skipping ones missing
    /// the indexed field. Logs progress every 1000 records.
    pub fn build(&self, records: impl Iterator<Item = Result<Record>>) -> Result<()> {
        let mut count = 0u64;
        for record in records {
            self.add_record(&record?)?;
            count += 1;
            if count % 1000 == 0 {
                log::info!(
                    "sort index {}/{} build progress: {count} records",
                    self.field,
                    self.direction.as_dir_str()
                );
            }
        }
        Ok(())
    }

    /// Flush the root block. Nodes are write-through on every mutation, so
    /// this is a cheap safety net rather than a real batch flush.
    pub fn save_tree(&self) -> Result<()> {
        self.persist_root_block(&self.state.lock())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.save_tree()
    }

    /// Persist, then delete the entire index directory.
    pub fn delete(&self) -> Result<()> {
        self.save_tree()?;
        self.storage.delete_dir(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFsStorage;
    use bson::doc;
    use tempfile::tempdir;

    fn index(page_size: usize) -> (SortIndex, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn BlobStorage> = Arc::new(LocalFsStorage::new(dir.path()));
        let idx = SortIndex::open(
            storage,
            "idx".to_string(),
            "score".to_string(),
            Direction::Asc,
            ValueType::Number,
            IndexConfig { page_size, readonly: false },
            true,
        )
        .unwrap();
        (idx, dir)
    }

    fn record(score: i64) -> Record {
        Record::from_full_document(doc! { "score": score }).unwrap()
    }

    #[test]
    fn split_insertions_preserve_ascending_order_across_pages() {
        let (idx, _dir) = index(2);
        for score in [10, 20, 30, 40, 50, 25, 15] {
            idx.add_record(&record(score)).unwrap();
        }

        let mut scores = Vec::new();
        let mut page_id = String::new();
        loop {
            let page = idx.get_page(&page_id).unwrap();
            if page.records.is_empty() && page_id.is_empty() && idx.total_entries() > 0 {
                // first page must never be empty while records exist
                panic!("first page unexpectedly empty");
            }
            for r in &page.records {
                scores.push(r.field("score").unwrap().as_i64().unwrap());
            }
            if let Some(next) = page.next_page_id {
                page_id = next;
            } else {
                assert_eq!(page.total_pages, 4);
                break;
            }
        }
        assert_eq!(scores, vec![10, 15, 20, 25, 30, 40, 50]);

        let ranged = idx.find_by_range(Some(&Bson::Int64(15)), Some(&Bson::Int64(30)), true, true).unwrap();
        assert_eq!(ranged.len(), 4);
    }

    #[test]
    fn find_by_value_returns_exact_matches_only() {
        let (idx, _dir) = index(2);
        for score in [10, 20, 20, 30] {
            idx.add_record(&record(score)).unwrap();
        }
        let found = idx.find_by_value(&Bson::Int64(20)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn delete_then_find_sees_nothing() {
        let (idx, _dir) = index(2);
        let r = record(42);
        idx.add_record(&r).unwrap();
        assert!(idx.delete_record(r.id, &Bson::Int64(42)).unwrap());
        assert!(idx.find_by_value(&Bson::Int64(42)).unwrap().is_empty());
        assert_eq!(idx.total_entries(), 0);
    }

    #[test]
    fn update_record_same_value_overwrites_in_place() {
        let (idx, _dir) = index(2);
        let r1 = record(5);
        idx.add_record(&r1).unwrap();
        let mut r2 = r1.clone();
        r2.body.insert("tag", "updated");
        idx.update_record(&r2, Some(&r1)).unwrap();
        let found = idx.find_by_value(&Bson::Int64(5)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field("tag").unwrap().as_str().unwrap(), "updated");
    }

    #[test]
    fn update_record_changed_value_moves_entry() {
        let (idx, _dir) = index(2);
        let r1 = record(5);
        idx.add_record(&r1).unwrap();
        let mut r2 = r1.clone();
        r2.body.insert("score", 9);
        idx.update_record(&r2, Some(&r1)).unwrap();
        assert!(idx.find_by_value(&Bson::Int64(5)).unwrap().is_empty());
        assert_eq!(idx.find_by_value(&Bson::Int64(9)).unwrap().len(), 1);
    }

    #[test]
    fn readonly_index_rejects_mutation() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn BlobStorage> = Arc::new(LocalFsStorage::new(dir.path()));
        let idx = SortIndex::open(
            storage,
            "idx".to_string(),
            "score".to_string(),
            Direction::Asc,
            ValueType::Number,
            IndexConfig { page_size: 2, readonly: true },
            true,
        )
        .unwrap();
        let err = idx.add_record(&record(1)).unwrap_err();
        assert!(matches!(err, StoreError::Readonly));
    }

    #[test]
    fn descending_direction_reverses_page_order() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn BlobStorage> = Arc::new(LocalFsStorage::new(dir.path()));
        let idx = SortIndex::open(
            storage,
            "idx".to_string(),
            "score".to_string(),
            Direction::Desc,
            ValueType::Number,
            IndexConfig { page_size: 10, readonly: false },
            true,
        )
        .unwrap();
        for score in [1, 2, 3] {
            idx.add_record(&record(score)).unwrap();
        }
        let page = idx.get_page("").unwrap();
        let scores: Vec<i64> = page.records.iter().map(|r| r.field("score").unwrap().as_i64().unwrap()).collect();
        assert_eq!(scores, vec![3, 2, 1]);
    }

    #[test]
    fn find_by_range_requires_a_bound() {
        let (idx, _dir) = index(2);
        let err = idx.find_by_range(None, None, true, true).unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[test]
    fn value_module_is_reexported_here() {
        assert_eq!(value::compare_value(ValueType::Number, &Bson::Int64(1), &Bson::Int64(1)), Ordering::Equal);
    }
}
