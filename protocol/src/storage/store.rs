//! The offline batch store and its persistence seam.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::batch::{BatchId, BatchItem, ItemStatus, OfflineBatch};
use crate::codec::CodecError;
use crate::transaction::Envelope;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    #[error("batch {batch} has {len} items; index {index} is out of range")]
    IndexOutOfRange {
        batch: BatchId,
        index: usize,
        len: usize,
    },

    #[error("item {index} of batch {batch} is already {status}")]
    TerminalStatus {
        batch: BatchId,
        index: usize,
        status: &'static str,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// BatchBackend
// ---------------------------------------------------------------------------

/// Durable key-value persistence for whole batches.
///
/// Implementations need read-after-write consistency within one process
/// and nothing more. They do no locking across calls.
pub trait BatchBackend: Send + Sync {
    fn load(&self, id: &BatchId) -> StoreResult<Option<OfflineBatch>>;

    /// Writes `batch`, fully replacing any batch with the same id.
    fn save(&self, batch: &OfflineBatch) -> StoreResult<()>;

    /// Returns whether a batch was removed.
    fn remove(&self, id: &BatchId) -> StoreResult<bool>;

    /// All stored ids, in ascending order.
    fn ids(&self) -> StoreResult<Vec<BatchId>>;
}

impl<B: BatchBackend + ?Sized> BatchBackend for Arc<B> {
    fn load(&self, id: &BatchId) -> StoreResult<Option<OfflineBatch>> {
        (**self).load(id)
    }
    fn save(&self, batch: &OfflineBatch) -> StoreResult<()> {
        (**self).save(batch)
    }
    fn remove(&self, id: &BatchId) -> StoreResult<bool> {
        (**self).remove(id)
    }
    fn ids(&self) -> StoreResult<Vec<BatchId>> {
        (**self).ids()
    }
}

/// Volatile backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    batches: RwLock<HashMap<BatchId, OfflineBatch>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchBackend for MemoryBackend {
    fn load(&self, id: &BatchId) -> StoreResult<Option<OfflineBatch>> {
        Ok(self.batches.read().get(id).cloned())
    }

    fn save(&self, batch: &OfflineBatch) -> StoreResult<()> {
        self.batches.write().insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    fn remove(&self, id: &BatchId) -> StoreResult<bool> {
        Ok(self.batches.write().remove(id).is_some())
    }

    fn ids(&self) -> StoreResult<Vec<BatchId>> {
        let mut ids: Vec<_> = self.batches.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// OfflineBatchStore
// ---------------------------------------------------------------------------

/// Typed access to stored batches.
///
/// Envelopes go in as values and come back decoded; the wire form stays
/// inside the store. Passes over the same batch id must be serialized by
/// the caller.
#[derive(Debug)]
pub struct OfflineBatchStore<B> {
    backend: B,
}

impl<B: BatchBackend> OfflineBatchStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stores `envelopes` under `id`, all Pending. Replaces any existing
    /// batch with that id.
    pub fn put(&self, id: &BatchId, envelopes: &[Envelope]) -> StoreResult<()> {
        let items = envelopes
            .iter()
            .map(BatchItem::pending)
            .collect::<Result<Vec<_>, _>>()?;
        let batch = OfflineBatch::new(id.clone(), items);
        self.backend.save(&batch)?;
        info!(batch = %id, items = batch.len(), "stored offline batch");
        Ok(())
    }

    /// The raw batch, envelopes still encoded.
    pub fn batch(&self, id: &BatchId) -> StoreResult<OfflineBatch> {
        self.backend
            .load(id)?
            .ok_or_else(|| StoreError::BatchNotFound(id.clone()))
    }

    /// Every envelope in insertion order, with its status.
    pub fn get(&self, id: &BatchId) -> StoreResult<Vec<(Envelope, ItemStatus)>> {
        self.batch(id)?
            .items
            .into_iter()
            .map(|item| Ok((item.decode()?, item.status)))
            .collect()
    }

    /// Moves item `index` to `status`.
    ///
    /// Terminal items cannot change status.
    pub fn update_status(&self, id: &BatchId, index: usize, status: ItemStatus) -> StoreResult<()> {
        let mut batch = self.batch(id)?;
        let len = batch.len();
        let item = batch
            .items
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexOutOfRange {
                batch: id.clone(),
                index,
                len,
            })?;
        if item.status.is_terminal() {
            return Err(StoreError::TerminalStatus {
                batch: id.clone(),
                index,
                status: item.status.label(),
            });
        }
        debug!(batch = %id, index, status = status.label(), "updating item status");
        item.status = status;
        self.backend.save(&batch)
    }

    /// Pending envelopes with their positions, in insertion order.
    pub fn list_pending(&self, id: &BatchId) -> StoreResult<Vec<(usize, Envelope)>> {
        self.pending_encoded(id)?
            .into_iter()
            .map(|(index, item)| Ok((index, item.decode()?)))
            .collect()
    }

    /// Pending items in wire form. Lets callers deal with undecodable
    /// items one at a time instead of failing the whole listing.
    pub fn pending_encoded(&self, id: &BatchId) -> StoreResult<Vec<(usize, BatchItem)>> {
        Ok(self
            .batch(id)?
            .items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| item.status.is_pending())
            .collect())
    }

    /// Deletes a batch. Returns whether it existed.
    pub fn purge(&self, id: &BatchId) -> StoreResult<bool> {
        let removed = self.backend.remove(id)?;
        if removed {
            info!(batch = %id, "purged offline batch");
        }
        Ok(removed)
    }

    pub fn batch_ids(&self) -> StoreResult<Vec<BatchId>> {
        self.backend.ids()
    }
}
