//! Intent and envelope validation.
//!
//! Two layers. [`verify_intent`] re-checks the structural rules the builder
//! enforces, for envelopes that come back from storage or from another
//! machine. [`verify_envelope`] checks every signature against the
//! network-bound hash and sums signer weight against the threshold.
//! Together they form the gate every envelope passes before it is handed
//! to the ledger.

use std::collections::BTreeSet;
use thiserror::Error;

use super::builder::{check_operations, TransactionIntent};
use super::constraint::{check_threshold, Constraint, ConstraintKind};
use super::signing::Envelope;
use crate::config::{LedgerConfig, NetworkId};
use crate::crypto::AccountId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A malformed intent or an envelope that is not ready for submission.
///
/// Never retried automatically: the caller must fix the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction has no operations")]
    EmptyOperationList,

    #[error("invalid amount in operation {index}: {reason}")]
    InvalidAmount { index: usize, reason: String },

    #[error("invalid asset {asset} in operation {index}")]
    InvalidAsset { index: usize, asset: String },

    #[error("{count} operations exceed the per-transaction limit of {max}")]
    TooManyOperations { count: usize, max: usize },

    #[error("fee {fee} is below the minimum of {minimum} stroops per operation")]
    FeeBelowMinimum { fee: u32, minimum: u32 },

    #[error("time bound starts at {min_time}, before now ({now}) minus {skew_secs}s skew")]
    TimeBoundInPast {
        min_time: u64,
        now: u64,
        skew_secs: u64,
    },

    #[error("time bound is inverted: max {max_time} < min {min_time}")]
    InvertedTimeBound { min_time: u64, max_time: u64 },

    #[error("threshold signer set is empty")]
    EmptySignerSet,

    #[error("threshold required weight must be positive")]
    ZeroThreshold,

    #[error("required weight {required} exceeds total signer weight {available}")]
    UnreachableThreshold { required: u32, available: u64 },

    #[error("cannot apply a {requested} constraint over an existing {existing} constraint")]
    ConstraintConflict {
        existing: ConstraintKind,
        requested: ConstraintKind,
    },

    #[error("signature from {signer} does not verify")]
    InvalidSignature { signer: AccountId },

    #[error("{signer} signed the envelope more than once")]
    DuplicateSignature { signer: AccountId },

    #[error("accumulated signer weight {have} is below the required {need}")]
    InsufficientSignatureWeight { have: u64, need: u32 },
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Structural checks on an intent, in the same order the builder applies
/// them.
///
/// Time bounds are not compared against the clock here: a bound that has
/// started is exactly the situation submission is waiting for.
pub fn verify_intent(
    intent: &TransactionIntent,
    config: &LedgerConfig,
) -> Result<(), ValidationError> {
    check_operations(&intent.operations, config.max_operations_per_tx)?;

    if intent.fee_per_op < config.base_fee {
        return Err(ValidationError::FeeBelowMinimum {
            fee: intent.fee_per_op,
            minimum: config.base_fee,
        });
    }

    match &intent.constraint {
        Constraint::None => Ok(()),
        Constraint::TimeBound(bounds) => match bounds.max_time {
            Some(max_time) if max_time < bounds.min_time => {
                Err(ValidationError::InvertedTimeBound {
                    min_time: bounds.min_time,
                    max_time,
                })
            }
            _ => Ok(()),
        },
        Constraint::ThresholdSignature(threshold) => check_threshold(threshold),
    }
}

/// Verifies every signature and returns the accumulated signer weight.
///
/// A signature that fails to verify, whose hint does not match its
/// signer, or that repeats an earlier signer rejects the whole envelope. Signatures from accounts that carry
/// no weight are verified but contribute nothing.
pub fn verify_envelope(envelope: &Envelope, network: &NetworkId) -> Result<u64, ValidationError> {
    let hash = envelope.hash(network);
    let intent = &envelope.intent;
    let mut weight: u64 = 0;
    let mut counted = BTreeSet::new();

    for decorated in &envelope.signatures {
        if decorated.hint != decorated.signer.hint()
            || !decorated.signer.verify(&hash, &decorated.signature)
        {
            return Err(ValidationError::InvalidSignature {
                signer: decorated.signer,
            });
        }
        if !counted.insert(decorated.signer) {
            return Err(ValidationError::DuplicateSignature {
                signer: decorated.signer,
            });
        }
        weight += u64::from(
            intent
                .constraint
                .weight_of(&intent.source, &decorated.signer),
        );
    }

    let need = intent.constraint.required_weight();
    if weight < u64::from(need) {
        return Err(ValidationError::InsufficientSignatureWeight { have: weight, need });
    }
    Ok(weight)
}

/// Full pre-submission gate: structure, then signatures and weight.
pub fn verify_for_submission(
    envelope: &Envelope,
    config: &LedgerConfig,
    network: &NetworkId,
) -> Result<u64, ValidationError> {
    verify_intent(&envelope.intent, config)?;
    verify_envelope(envelope, network)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
