//! Offline batch data model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::{CodecError, EnvelopeCodec};
use crate::transaction::Envelope;

const MAX_BATCH_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// Caller-chosen batch name.
///
/// 1 to 128 characters from `[A-Za-z0-9._-]`, so it is safe as a storage
/// key and as a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid batch id {0:?}: use 1-128 characters from [A-Za-z0-9._-]")]
pub struct InvalidBatchId(pub String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidBatchId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_BATCH_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidBatchId(id))
        }
    }

    /// Fresh random id, e.g. for CLI runs that don't name their batch.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BatchId {
    type Err = InvalidBatchId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for BatchId {
    type Error = InvalidBatchId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

/// Submission status of one batch item.
///
/// ```text
/// Pending --Accepted--------------> Submitted (terminal)
/// Pending --RejectedByLedger------> Failed    (terminal)
/// Pending --NetworkUnavailable----> Pending
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Submitted { tx_hash: String, ledger_timestamp: u64 },
    Failed { reason: String },
}

impl ItemStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted { .. } => "submitted",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitted {
                tx_hash,
                ledger_timestamp,
            } => write!(f, "submitted {} at {}", tx_hash, ledger_timestamp),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

// ---------------------------------------------------------------------------
// OfflineBatch
// ---------------------------------------------------------------------------

/// One stored envelope plus its status.
///
/// The envelope is kept in its base64 wire form, exactly as it would be
/// handed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub envelope: String,
    pub status: ItemStatus,
}

impl BatchItem {
    pub fn pending(envelope: &Envelope) -> Result<Self, CodecError> {
        Ok(Self {
            envelope: EnvelopeCodec::encode_base64(envelope)?,
            status: ItemStatus::Pending,
        })
    }

    pub fn decode(&self) -> Result<Envelope, CodecError> {
        EnvelopeCodec::decode_base64(&self.envelope)
    }
}

/// A named, ordered collection of envelopes awaiting submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineBatch {
    pub id: BatchId,
    /// Unix seconds when the batch was written.
    pub created_at: i64,
    pub items: Vec<BatchItem>,
}

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub pending: usize,
    pub submitted: usize,
    pub failed: usize,
}

impl OfflineBatch {
    pub fn new(id: BatchId, items: Vec<BatchItem>) -> Self {
        Self {
            id,
            created_at: Utc::now().timestamp(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        self.items
            .iter()
            .fold(BatchSummary::default(), |mut acc, item| {
                match item.status {
                    ItemStatus::Pending => acc.pending += 1,
                    ItemStatus::Submitted { .. } => acc.submitted += 1,
                    ItemStatus::Failed { .. } => acc.failed += 1,
                }
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_validation() {
        assert!(BatchId::new("relief-2026.q3_round1").is_ok());
        assert!(BatchId::new("").is_err());
        assert!(BatchId::new("has space").is_err());
        assert!(BatchId::new("../escape").is_err());
        assert!(BatchId::new("x".repeat(129)).is_err());
        assert_eq!(BatchId::random().as_str().len(), 32);
    }

    #[test]
    fn batch_id_serde_validates() {
        let id = BatchId::new("round-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"round-1\"");
        assert!(serde_json::from_str::<BatchId>("\"bad id\"").is_err());
    }

    #[test]
    fn status_terminality() {
        assert!(ItemStatus::Pending.is_pending());
        assert!(ItemStatus::Failed {
            reason: "tx_bad_seq".into()
        }
        .is_terminal());
        assert_eq!(
            ItemStatus::Submitted {
                tx_hash: "ab".into(),
                ledger_timestamp: 1
            }
            .label(),
            "submitted"
        );
    }

    #[test]
    fn summary_counts_statuses() {
        let item = |status| BatchItem {
            envelope: String::new(),
            status,
        };
        let batch = OfflineBatch::new(
            BatchId::new("b").unwrap(),
            vec![
                item(ItemStatus::Pending),
                item(ItemStatus::Failed { reason: "x".into() }),
                item(ItemStatus::Pending),
            ],
        );
        assert_eq!(
            batch.summary(),
            BatchSummary {
                pending: 2,
                submitted: 0,
                failed: 1
            }
        );
    }
}
