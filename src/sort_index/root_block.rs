//! The root block: the tiny file naming a tree's current root and its
//! tree-wide metadata. Every mutation that changes the root or the entry
//! count rewrites this file atomically (whole contents, each time).

use crate::types::{Direction, ValueType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROOT_BLOCK_FILE_VERSION: u32 = 1;
pub const ROOT_BLOCK_PATH: &str = "tree.dat";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootBlockPayload {
    pub root_id: String,
    pub field: String,
    pub direction: String,
    pub value_type: String,
    pub total_entries: u64,
    pub schema_version: u32,
}

impl RootBlockPayload {
    #[must_use]
    pub fn new(
        root_id: Uuid,
        field: &str,
        direction: Direction,
        value_type: ValueType,
        total_entries: u64,
    ) -> Self {
        Self {
            root_id: root_id.to_string(),
            field: field.to_string(),
            direction: direction.as_dir_str().to_string(),
            value_type: value_type.as_str().to_string(),
            total_entries,
            schema_version: SCHEMA_VERSION,
        }
    }
}
