//! # Storage Module
//!
//! Durable offline batches: envelopes signed now, submitted later.
//!
//! ## Architecture
//!
//! ```text
//! batch.rs: BatchId, ItemStatus, OfflineBatch (the stored shape)
//! store.rs: OfflineBatchStore over the BatchBackend trait, MemoryBackend
//! db.rs   : SledBackend, the embedded on-disk backend
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Envelopes are stored in wire form.** Each item holds the base64
//!    envelope exactly as it will be submitted; decoding happens on read.
//! 2. **Bincode for on-disk serialization.** Compact and deterministic.
//!    JSON is for the CLI and debugging; bincode is for storage.
//! 3. **No locking across calls.** Two passes over the same batch must be
//!    serialized by the caller.

pub mod batch;
pub mod db;
pub mod store;

pub use batch::{BatchId, BatchItem, BatchSummary, InvalidBatchId, ItemStatus, OfflineBatch};
pub use db::SledBackend;
pub use store::{BatchBackend, MemoryBackend, OfflineBatchStore, StoreError, StoreResult};
