//! # SledBackend: Durable Batch Storage
//!
//! The on-disk [`BatchBackend`], built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key               | Value                 |
//! |------------|-------------------|-----------------------|
//! | `batches`  | batch id (UTF-8)  | `bincode(OfflineBatch)` |
//! | `metadata` | key (UTF-8)       | value (bytes)         |
//!
//! A batch is written as one value, so replacing it (or updating one
//! item's status) is a single atomic insert. Every write is flushed before
//! returning; a status recorded as Submitted survives a crash.

use sled::{Db, Tree};
use std::path::Path;
use tracing::warn;

use super::batch::{BatchId, OfflineBatch};
use super::store::{BatchBackend, StoreError, StoreResult};

/// Well-known key in the `metadata` tree for the on-disk layout version.
const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Current on-disk layout version.
const SCHEMA_VERSION: u32 = 1;

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// sled-backed batch persistence.
///
/// sled is thread-safe, so a `SledBackend` can be shared through `Arc`
/// without extra locking.
#[derive(Debug, Clone)]
pub struct SledBackend {
    db: Db,
    batches: Tree,
    metadata: Tree,
}

impl SledBackend {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let batches = db.open_tree("batches")?;
        let metadata = db.open_tree("metadata")?;

        match metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => {
                let found = u32::from_be_bytes(bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Serialization("invalid schema version bytes".to_string())
                })?);
                if found != SCHEMA_VERSION {
                    return Err(StoreError::Backend(format!(
                        "unsupported schema version {} (expected {})",
                        found, SCHEMA_VERSION
                    )));
                }
            }
            None => {
                metadata.insert(META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
            }
        }

        Ok(Self {
            db,
            batches,
            metadata,
        })
    }

    /// Number of stored batches.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn schema_version(&self) -> StoreResult<Option<u32>> {
        match self.metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => Ok(bytes.as_ref().try_into().ok().map(u32::from_be_bytes)),
            None => Ok(None),
        }
    }
}

impl BatchBackend for SledBackend {
    fn load(&self, id: &BatchId) -> StoreResult<Option<OfflineBatch>> {
        match self.batches.get(id.as_str().as_bytes())? {
            Some(bytes) => {
                let batch: OfflineBatch = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    fn save(&self, batch: &OfflineBatch) -> StoreResult<()> {
        let bytes =
            bincode::serialize(batch).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.batches.insert(batch.id.as_str().as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, id: &BatchId) -> StoreResult<bool> {
        let removed = self.batches.remove(id.as_str().as_bytes())?.is_some();
        self.db.flush()?;
        Ok(removed)
    }

    fn ids(&self) -> StoreResult<Vec<BatchId>> {
        let mut ids = Vec::with_capacity(self.batches.len());
        for entry in self.batches.iter().keys() {
            let key = entry?;
            match std::str::from_utf8(&key).ok().and_then(|s| BatchId::new(s).ok()) {
                Some(id) => ids.push(id),
                None => warn!(key = %hex::encode(&key), "skipping unreadable batch key"),
            }
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
