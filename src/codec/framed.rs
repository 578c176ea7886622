//! Framed save/load/verify: `[u32 version][payload][32-byte SHA-256]`
//! with the checksum optional, backing every on-disk artifact (shard
//! files, sort index nodes, root blocks).

use super::migration::MigrationTable;
use super::reader::Reader;
use super::writer::Writer;
use crate::errors::{Result, StoreError};
use crate::storage::BlobStorage;
use crate::support::with_retry;
use bson::Document as BsonDocument;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

const CHECKSUM_LEN: usize = 32;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Write `version` followed by `payload` embedded as BSON, with an
/// optional SHA-256 footer, through a bounded-retry `storage.write`.
pub fn save<T: Serialize>(
    storage: &dyn BlobStorage,
    path: &str,
    payload: &T,
    version: u32,
    checksum_enabled: bool,
) -> Result<()> {
    let mut writer = Writer::new();
    writer.write_u32(version);
    writer.write_bson(payload)?;

    let mut bytes = writer.into_bytes();
    if checksum_enabled {
        let sum = checksum(&bytes);
        bytes.extend_from_slice(&sum);
    }

    with_retry(RETRY_ATTEMPTS, RETRY_BACKOFF, || storage.write(path, None, &bytes))
}

/// Per-version decoder: reads a version's body shape into a generic BSON
/// document, which migrations then transform before the final
/// `DeserializeOwned` decode into the caller's type.
pub type DecoderFn = Box<dyn Fn(&mut Reader<'_>) -> Result<BsonDocument> + Send + Sync>;

#[derive(Default)]
pub struct DecoderTable {
    decoders: HashMap<u32, DecoderFn>,
}

impl DecoderTable {
    #[must_use]
    pub fn new() -> Self {
        Self { decoders: HashMap::new() }
    }

    pub fn register(&mut self, version: u32, f: impl Fn(&mut Reader<'_>) -> Result<BsonDocument> + Send + Sync + 'static) {
        self.decoders.insert(version, Box::new(f));
    }

    /// A decoder that simply reads the embedded-BSON body, the shape
    /// every version in this crate actually uses.
    #[must_use]
    pub fn with_bson_decoder(mut self, version: u32) -> Self {
        self.register(version, |r| r.read_bson::<BsonDocument>());
        self
    }

    fn available(&self) -> Vec<u32> {
        let mut v: Vec<u32> = self.decoders.keys().copied().collect();
        v.sort_unstable_by(|a, b| b.cmp(a));
        v
    }

    fn highest(&self) -> Option<u32> {
        self.decoders.keys().copied().max()
    }
}

fn split_checksum(bytes: &[u8], checksum_enabled: bool) -> Result<(&[u8], Option<[u8; CHECKSUM_LEN]>)> {
    if !checksum_enabled {
        return Ok((bytes, None));
    }
    if bytes.len() < CHECKSUM_LEN + 4 {
        return Err(StoreError::Corruption("file too small for checksum footer".to_string()));
    }
    let (prefix, footer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut sum = [0u8; CHECKSUM_LEN];
    sum.copy_from_slice(footer);
    Ok((prefix, Some(sum)))
}

/// Read `path`, verify its checksum (if enabled), decode its version's
/// body into BSON, migrate it to `target_version` (or the highest
/// registered decoder if `None`), and deserialize into `T`.
pub fn load<T: DeserializeOwned>(
    storage: &dyn BlobStorage,
    path: &str,
    decoders: &DecoderTable,
    migrations: &MigrationTable,
    target_version: Option<u32>,
    checksum_enabled: bool,
) -> Result<T> {
    let bytes = storage.read(path)?.ok_or(StoreError::NotFound)?;
    let (prefix, footer) = split_checksum(&bytes, checksum_enabled)?;
    if let Some(expected) = footer {
        let actual = checksum(prefix);
        if actual != expected {
            return Err(StoreError::Corruption("checksum mismatch".to_string()));
        }
    }

    let mut reader = Reader::new(prefix);
    let version = reader.read_u32()?;
    let decoder = decoders
        .decoders
        .get(&version)
        .ok_or_else(|| StoreError::UnsupportedVersion { version, available: decoders.available() })?;
    let doc = decoder(&mut reader)?;

    let target = target_version.or_else(|| decoders.highest()).unwrap_or(version);
    let doc = migrations.migrate(doc, version, target)?;

    Ok(bson::from_document(doc)?)
}

#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub valid: bool,
    pub size: u64,
    pub error: Option<String>,
}

/// Like `load`, but stops after checksum validity and version
/// plausibility; it never decodes the body or runs migrations.
pub fn verify(
    storage: &dyn BlobStorage,
    path: &str,
    decoders: &DecoderTable,
    checksum_enabled: bool,
) -> Result<VerifyResult> {
    let Some(bytes) = storage.read(path)? else {
        return Ok(VerifyResult { valid: false, size: 0, error: Some("missing".to_string()) });
    };
    let size = bytes.len() as u64;

    let (prefix, footer) = match split_checksum(&bytes, checksum_enabled) {
        Ok(v) => v,
        Err(e) => return Ok(VerifyResult { valid: false, size, error: Some(e.to_string()) }),
    };
    if let Some(expected) = footer {
        let actual = checksum(prefix);
        if actual != expected {
            return Ok(VerifyResult {
                valid: false,
                size,
                error: Some("checksum mismatch".to_string()),
            });
        }
    }

    let mut reader = Reader::new(prefix);
    let version = match reader.read_u32() {
        Ok(v) => v,
        Err(e) => return Ok(VerifyResult { valid: false, size, error: Some(e.to_string()) }),
    };
    if !decoders.decoders.contains_key(&version) {
        return Ok(VerifyResult {
            valid: false,
            size,
            error: Some(format!("unsupported version {version}")),
        });
    }

    Ok(VerifyResult { valid: true, size, error: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFsStorage;
    use bson::doc;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        value: i32,
    }

    fn decoders() -> DecoderTable {
        DecoderTable::new().with_bson_decoder(1)
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());
        let payload = Payload { name: "HELLO".to_string(), value: 7 };
        save(&storage, "p", &payload, 1, true).unwrap();
        let loaded: Payload =
            load(&storage, "p", &decoders(), &MigrationTable::new(), None, true).unwrap();
        assert_eq!(loaded, payload);
    }

    #[test]
    fn flipping_a_byte_breaks_checksum() {
        let dir = tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());
        let payload = Payload { name: "HELLO".to_string(), value: 7 };
        save(&storage, "p", &payload, 1, true).unwrap();

        let mut bytes = storage.read("p").unwrap().unwrap();
        bytes[5] ^= 0xFF;
        storage.write("p", None, &bytes).unwrap();

        let err = load::<Payload>(&storage, "p", &decoders(), &MigrationTable::new(), None, true)
            .unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)));

        let v = verify(&storage, "p", &decoders(), true).unwrap();
        assert!(!v.valid);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());
        let err = load::<Payload>(&storage, "nope", &decoders(), &MigrationTable::new(), None, true)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn unsupported_version_lists_available() {
        let dir = tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());
        let mut writer = Writer::new();
        writer.write_u32(3);
        writer.write_bson(&doc! {}).unwrap();
        storage.write("p", None, &writer.into_bytes()).unwrap();

        let decoders = DecoderTable::new().with_bson_decoder(1).with_bson_decoder(2);
        let err =
            load::<Payload>(&storage, "p", &decoders, &MigrationTable::new(), None, false)
                .unwrap_err();
        match err {
            StoreError::UnsupportedVersion { version, mut available } => {
                assert_eq!(version, 3);
                available.sort_unstable();
                assert_eq!(available, vec![1, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn migration_chain_runs_on_load() {
        let dir = tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());

        let mut writer = Writer::new();
        writer.write_u32(1);
        writer.write_bson(&doc! { "name": "t", "value": 42 }).unwrap();
        storage.write("p", None, &writer.into_bytes()).unwrap();

        let decoders = DecoderTable::new().with_bson_decoder(1).with_bson_decoder(2).with_bson_decoder(3);
        let mut migrations = MigrationTable::new();
        migrations.register(1, 2, |mut d| {
            let name = d.get_str("name").unwrap_or("").to_string();
            d.insert("description", format!("v2:{name}"));
            d
        });
        migrations.register(2, 3, |mut d| {
            d.insert("tags", vec!["m"]);
            d
        });

        #[derive(Debug, Deserialize, PartialEq)]
        struct V3 {
            name: String,
            value: i32,
            description: String,
            tags: Vec<String>,
        }

        let loaded: V3 = load(&storage, "p", &decoders, &migrations, Some(3), false).unwrap();
        assert_eq!(loaded.description, "v2:t");
        assert_eq!(loaded.tags, vec!["m".to_string()]);
    }
}
