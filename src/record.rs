//! The document model. A record is a schemaless mapping from
//! string keys to dynamically typed values with a mandatory UUID `_id`.
//! On disk the `_id` is elided from the BSON body and stored once in a
//! fixed 16-byte slot (see `shard.rs`'s `record_entry` format).

use crate::errors::{Result, StoreError};
use crate::types::RecordId;
use bson::{Bson, Document as BsonDocument};

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    /// The record's fields, `_id` never present here.
    pub body: BsonDocument,
}

impl Record {
    #[must_use]
    pub fn new(id: RecordId, body: BsonDocument) -> Self {
        let mut body = body;
        body.remove(ID_FIELD);
        Self { id, body }
    }

    /// Build a record from a full BSON document that may carry `_id` inline,
    /// generating one if absent. Mirrors `insertOne`'s id-generation rule.
    pub fn from_full_document(mut doc: BsonDocument) -> Result<Self> {
        let id = match doc.remove(ID_FIELD) {
            Some(Bson::String(s)) => parse_record_id(&s)?,
            Some(other) => {
                return Err(StoreError::InvalidId(format!("_id must be a string, got {other:?}")));
            }
            None => crate::support::new_record_id(),
        };
        Ok(Self { id, body: doc })
    }

    /// The full logical document, with `_id` reinserted as a string.
    #[must_use]
    pub fn to_full_document(&self) -> BsonDocument {
        let mut doc = self.body.clone();
        doc.insert(ID_FIELD, self.id.to_string());
        doc
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Bson> {
        get_path(&self.body, name)
    }

    /// Shallow merge `updates` into this record's body (used by `updateOne`).
    pub fn merge(&mut self, updates: &BsonDocument) {
        let mut updates = updates.clone();
        updates.remove(ID_FIELD);
        for (k, v) in updates {
            self.body.insert(k, v);
        }
    }
}

fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for p in parts {
        match cur {
            Bson::Document(d) => cur = d.get(p)?,
            _ => return None,
        }
    }
    Some(cur)
}

/// Validate and parse a record id in canonical 36-char hyphenated form
/// with 32 hex digits. Ids not in this form are `InvalidId`.
pub fn parse_record_id(s: &str) -> Result<RecordId> {
    if s.len() != 36 {
        return Err(StoreError::InvalidId(s.to_string()));
    }
    let hex_digits: usize = s.chars().filter(char::is_ascii_hexdigit).count();
    if hex_digits != 32 {
        return Err(StoreError::InvalidId(s.to_string()));
    }
    RecordId::parse_str(s).map_err(|_| StoreError::InvalidId(s.to_string()))
}
