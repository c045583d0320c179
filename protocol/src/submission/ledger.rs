//! The ledger-submission collaborator and outcome classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What the ledger answered for one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub success: bool,
    /// Ledger result code, e.g. `tx_success` or `tx_too_early`.
    pub result_code: String,
    /// Close time of the ledger that processed the envelope, unix seconds.
    pub ledger_timestamp: u64,
}

impl LedgerResponse {
    pub fn accepted(ledger_timestamp: u64) -> Self {
        Self {
            success: true,
            result_code: "tx_success".to_string(),
            ledger_timestamp,
        }
    }

    pub fn rejected(result_code: impl Into<String>, ledger_timestamp: u64) -> Self {
        Self {
            success: false,
            result_code: result_code.into(),
            ledger_timestamp,
        }
    }
}

/// A network-layer failure: the envelope's fate at the ledger is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerFault {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// Sends encoded envelopes to the ledger.
///
/// Implementations must keep ledger rejections (`Ok` with
/// `success == false`) apart from transport failures (`Err`).
#[async_trait]
pub trait LedgerSubmitter: Send + Sync {
    async fn submit(&self, envelope_base64: &str) -> Result<LedgerResponse, LedgerFault>;
}

/// Classified outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmissionResult {
    Accepted { tx_hash: String, ledger_timestamp: u64 },
    /// Definitive; resubmitting the same envelope will not help.
    RejectedByLedger { code: String },
    /// Transient; the envelope may be retried as is.
    NetworkUnavailable { reason: String },
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}

impl fmt::Display for SubmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { tx_hash, .. } => write!(f, "accepted ({})", tx_hash),
            Self::RejectedByLedger { code } => write!(f, "rejected by ledger: {}", code),
            Self::NetworkUnavailable { reason } => write!(f, "network unavailable: {}", reason),
        }
    }
}
