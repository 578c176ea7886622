use thiserror::Error;

/// Every failure mode the store can surface to a caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found")]
    NotFound,

    #[error("corrupt data: {0}")]
    Corruption(String),

    #[error("unsupported version {version}, available: {available:?}")]
    UnsupportedVersion { version: u32, available: Vec<u32> },

    #[error("no migration path from version {from} to {to}")]
    Migration { from: u32, to: u32 },

    #[error("codec read out of bounds")]
    OutOfBounds,

    #[error("invalid record id: {0}")]
    InvalidId(String),

    #[error("sort index {field} already exists with a different type")]
    IndexTypeMismatch { field: String },

    #[error("operation not permitted on a read-only handle")]
    Readonly,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("bson error: {0}")]
    Bson(#[from] bson::ser::Error),

    #[error("bson decode error: {0}")]
    BsonDe(#[from] bson::de::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
