//! Each B-tree node is one file named by its UUID, persisted through the
//! framed codec the same way shard files use their own hand-rolled
//! framing. Entries embed BSON for `value` so the tree can hold
//! heterogeneous runtime types.

use crate::errors::{Result, StoreError};
use crate::record::{self, Record};
use crate::types::RecordId;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const NODE_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct LeafEntry {
    pub value: Bson,
    pub record_id: RecordId,
    pub record: Record,
}

#[derive(Debug, Clone)]
pub struct LeafNode {
    pub id: Uuid,
    pub entries: Vec<LeafEntry>,
    pub next: Option<Uuid>,
    pub prev: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct InternalNode {
    pub id: Uuid,
    /// `separators.len() == children.len() - 1`. `children[i]` holds
    /// entries ordered before `separators[i]`; the last child holds
    /// everything from the last separator onward.
    pub separators: Vec<(Bson, RecordId)>,
    pub children: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Leaf(l) => l.id,
            Self::Internal(i) => i.id,
        }
    }

    #[must_use]
    pub const fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Internal(_) => None,
        }
    }

    pub const fn as_leaf_mut(&mut self) -> Option<&mut LeafNode> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Internal(_) => None,
        }
    }

}

// --- on-disk payload shapes (serde-friendly; record ids as strings so
// they round-trip through BSON the same way shard files store `_id`) ---

#[derive(Debug, Serialize, Deserialize)]
struct StoredLeafEntry {
    value: Bson,
    record_id: String,
    record_body: BsonDocument,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSeparator {
    value: Bson,
    record_id: String,
}

/// The type `codec::framed::save`/`load` serialize a node file as. The
/// node's own UUID is the filename, not part of the payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodePayload {
    Leaf { entries: Vec<StoredLeafEntry>, next: Option<String>, prev: Option<String> },
    Internal { separators: Vec<StoredSeparator>, children: Vec<String> },
}

impl Node {
    #[must_use]
    pub fn to_payload(&self) -> NodePayload {
        match self {
            Self::Leaf(leaf) => NodePayload::Leaf {
                entries: leaf
                    .entries
                    .iter()
                    .map(|e| StoredLeafEntry {
                        value: e.value.clone(),
                        record_id: e.record_id.to_string(),
                        record_body: e.record.body.clone(),
                    })
                    .collect(),
                next: leaf.next.map(|u| u.to_string()),
                prev: leaf.prev.map(|u| u.to_string()),
            },
            Self::Internal(internal) => NodePayload::Internal {
                separators: internal
                    .separators
                    .iter()
                    .map(|(v, id)| StoredSeparator { value: v.clone(), record_id: id.to_string() })
                    .collect(),
                children: internal.children.iter().map(Uuid::to_string).collect(),
            },
        }
    }

    pub fn from_payload(id: Uuid, payload: NodePayload) -> Result<Self> {
        match payload {
            NodePayload::Leaf { entries, next, prev } => {
                let mut decoded = Vec::with_capacity(entries.len());
                for e in entries {
                    let record_id = record::parse_record_id(&e.record_id)?;
                    decoded.push(LeafEntry {
                        value: e.value,
                        record_id,
                        record: Record::new(record_id, e.record_body),
                    });
                }
                Ok(Self::Leaf(LeafNode {
                    id,
                    entries: decoded,
                    next: parse_opt_uuid(next)?,
                    prev: parse_opt_uuid(prev)?,
                }))
            }
            NodePayload::Internal { separators, children } => {
                let mut decoded_seps = Vec::with_capacity(separators.len());
                for s in separators {
                    decoded_seps.push((s.value, record::parse_record_id(&s.record_id)?));
                }
                let mut decoded_children = Vec::with_capacity(children.len());
                for c in children {
                    decoded_children.push(
                        Uuid::parse_str(&c).map_err(|e| StoreError::Corruption(e.to_string()))?,
                    );
                }
                Ok(Self::Internal(InternalNode {
                    id,
                    separators: decoded_seps,
                    children: decoded_children,
                }))
            }
        }
    }
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.map(|s| Uuid::parse_str(&s).map_err(|e| StoreError::Corruption(e.to_string()))).transpose()
}
