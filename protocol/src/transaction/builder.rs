//! Transaction intent construction.
//!
//! The [`TransactionBuilder`] validates a full intent up front: every
//! operation, the fee and the constraint are checked before anything is
//! returned, so a bad request never yields a partial result.
//!
//! The builder does not sign; that happens in [`super::signing`]. It never
//! contacts the network either. The sequence number is supplied by the
//! caller, which is what makes offline generation possible.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraint::{unix_now, Constraint, ConstraintPolicy};
use super::signing::{sign_envelope, Envelope};
use super::types::{Amount, Asset, PaymentOperation};
use super::verification::ValidationError;
use crate::config::{LedgerConfig, NetworkId};
use crate::crypto::hash::sha256_multi;
use crate::crypto::{AccountId, AccountKeypair};

/// Intent format version, committed to by the transaction hash.
pub const INTENT_VERSION: u16 = 1;

/// Domain separator between the network id and the signable bytes.
const TX_HASH_TAG: &[u8; 4] = b"ATX\0";

// ---------------------------------------------------------------------------
// TransactionIntent
// ---------------------------------------------------------------------------

/// An unsigned payment transaction.
///
/// # Canonical Byte Format
///
/// Signatures commit to [`TransactionIntent::hash`], which is
/// `sha256(network_id ‖ "ATX\0" ‖ signable_bytes)`. The signable bytes are
/// a hand-written fixed layout (little-endian integers, length-prefixed
/// strings), independent of any serde format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub version: u16,

    /// Account paying for and authorizing the transaction.
    pub source: AccountId,

    /// Sequence number this transaction consumes on `source`.
    pub sequence: u64,

    /// Payments, applied in order.
    pub operations: Vec<PaymentOperation>,

    pub constraint: Constraint,

    /// Fee per operation, in stroops.
    pub fee_per_op: u32,

    /// Absolute unix-seconds expiry derived from the configured window.
    pub expires_at: Option<u64>,
}

impl TransactionIntent {
    /// Canonical bytes covered by the transaction hash.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96 + self.operations.len() * 64);

        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.source.as_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.fee_per_op.to_le_bytes());

        match self.expires_at {
            Some(at) => {
                buf.push(0x01);
                buf.extend_from_slice(&at.to_le_bytes());
            }
            None => buf.push(0x00),
        }

        match &self.constraint {
            Constraint::None => buf.push(0x00),
            Constraint::TimeBound(bounds) => {
                buf.push(0x01);
                buf.extend_from_slice(&bounds.min_time.to_le_bytes());
                match bounds.max_time {
                    Some(max_time) => {
                        buf.push(0x01);
                        buf.extend_from_slice(&max_time.to_le_bytes());
                    }
                    None => buf.push(0x00),
                }
            }
            Constraint::ThresholdSignature(threshold) => {
                buf.push(0x02);
                buf.extend_from_slice(&threshold.required_weight.to_le_bytes());
                buf.extend_from_slice(&(threshold.signers.len() as u32).to_le_bytes());
                for entry in &threshold.signers {
                    buf.extend_from_slice(entry.signer.as_bytes());
                    buf.extend_from_slice(&entry.weight.to_le_bytes());
                }
            }
        }

        buf.extend_from_slice(&(self.operations.len() as u32).to_le_bytes());
        for op in &self.operations {
            buf.extend_from_slice(op.destination.as_bytes());
            match &op.asset {
                Asset::Native => buf.push(0x00),
                Asset::Credit { code, issuer } => {
                    buf.push(0x01);
                    buf.push(code.len() as u8);
                    buf.extend_from_slice(code.as_bytes());
                    buf.extend_from_slice(issuer.as_bytes());
                }
            }
            buf.extend_from_slice(&op.amount.stroops().to_le_bytes());
        }

        buf
    }

    /// Network-bound transaction hash. This is what gets signed.
    pub fn hash(&self, network: &NetworkId) -> [u8; 32] {
        sha256_multi(&[network.as_bytes(), TX_HASH_TAG, &self.signable_bytes()])
    }

    pub fn hash_hex(&self, network: &NetworkId) -> String {
        hex::encode(self.hash(network))
    }

    /// Total fee charged by the ledger, in stroops.
    pub fn total_fee(&self) -> u64 {
        u64::from(self.fee_per_op) * self.operations.len() as u64
    }

    /// Sum of all operation amounts in `asset`, or `None` on overflow.
    pub fn total_amount(&self, asset: &Asset) -> Option<Amount> {
        self.operations
            .iter()
            .filter(|op| &op.asset == asset)
            .try_fold(Amount::ZERO, |acc, op| acc.checked_add(op.amount))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Validating constructor for [`TransactionIntent`]s.
///
/// # Usage
///
/// ```rust
/// use aidrail_protocol::config::LedgerConfig;
/// use aidrail_protocol::crypto::AccountKeypair;
/// use aidrail_protocol::transaction::{Constraint, PaymentOperation, TransactionBuilder};
///
/// let builder = TransactionBuilder::new(LedgerConfig::testnet());
/// let payer = AccountKeypair::generate();
/// let payee = AccountKeypair::generate().account_id();
///
/// let amount = builder.parse_amount(0, "10").unwrap();
/// let intent = builder
///     .build(
///         payer.account_id(),
///         42,
///         vec![PaymentOperation::native(payee, amount)],
///         Constraint::None,
///         100,
///     )
///     .unwrap();
/// let envelope = builder.sign(intent, &payer);
/// assert_eq!(envelope.signatures.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    config: LedgerConfig,
    network: NetworkId,
    policy: ConstraintPolicy,
}

impl TransactionBuilder {
    pub fn new(config: LedgerConfig) -> Self {
        let network = config.network_id();
        let policy = ConstraintPolicy::new(&config);
        Self {
            config,
            network,
            policy,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn network_id(&self) -> &NetworkId {
        &self.network
    }

    pub fn policy(&self) -> &ConstraintPolicy {
        &self.policy
    }

    /// Parses a decimal amount for operation `index`.
    ///
    /// Fails with [`ValidationError::InvalidAmount`] when the string is not a
    /// number, has more than seven fractional digits, overflows, or is not
    /// strictly positive.
    pub fn parse_amount(&self, index: usize, raw: &str) -> Result<Amount, ValidationError> {
        let amount: Amount = raw.parse().map_err(|e: super::types::AmountError| {
            ValidationError::InvalidAmount {
                index,
                reason: e.to_string(),
            }
        })?;
        if !amount.is_positive() {
            return Err(ValidationError::InvalidAmount {
                index,
                reason: format!("amount {} is not positive", raw.trim()),
            });
        }
        Ok(amount)
    }

    /// Builds an intent, validating against the current wall clock.
    pub fn build(
        &self,
        source: AccountId,
        sequence: u64,
        operations: Vec<PaymentOperation>,
        constraint: Constraint,
        fee_per_op: u32,
    ) -> Result<TransactionIntent, ValidationError> {
        self.build_at(source, sequence, operations, constraint, fee_per_op, unix_now())
    }

    /// [`build`](Self::build) with an explicit clock.
    pub fn build_at(
        &self,
        source: AccountId,
        sequence: u64,
        operations: Vec<PaymentOperation>,
        constraint: Constraint,
        fee_per_op: u32,
        now: u64,
    ) -> Result<TransactionIntent, ValidationError> {
        check_operations(&operations, self.config.max_operations_per_tx)?;

        if fee_per_op < self.config.base_fee {
            return Err(ValidationError::FeeBelowMinimum {
                fee: fee_per_op,
                minimum: self.config.base_fee,
            });
        }

        self.policy.validate_at(&constraint, now)?;

        let expires_at = match (self.config.expiry_window_secs, constraint.time_bounds()) {
            (0, _) => None,
            (_, Some(bounds)) if bounds.max_time.is_some() => None,
            (window, _) => Some(now.saturating_add(window)),
        };

        let intent = TransactionIntent {
            version: INTENT_VERSION,
            source,
            sequence,
            operations,
            constraint,
            fee_per_op,
            expires_at,
        };

        debug!(
            source = %intent.source,
            sequence = intent.sequence,
            operations = intent.operations.len(),
            constraint = %intent.constraint.kind(),
            "built transaction intent"
        );

        Ok(intent)
    }

    /// Adds `credential`'s signature to an intent or an existing envelope.
    ///
    /// Idempotent: signing twice with the same credential leaves exactly one
    /// signature from it.
    pub fn sign(&self, target: impl Into<Envelope>, credential: &AccountKeypair) -> Envelope {
        let mut envelope = target.into();
        sign_envelope(&mut envelope, credential, &self.network);
        envelope
    }
}

/// Structural checks shared by the builder and pre-submission verification.
pub(crate) fn check_operations(
    operations: &[PaymentOperation],
    max_operations: usize,
) -> Result<(), ValidationError> {
    if operations.is_empty() {
        return Err(ValidationError::EmptyOperationList);
    }
    if operations.len() > max_operations {
        return Err(ValidationError::TooManyOperations {
            count: operations.len(),
            max: max_operations,
        });
    }
    for (index, op) in operations.iter().enumerate() {
        if !op.amount.is_positive() {
            return Err(ValidationError::InvalidAmount {
                index,
                reason: format!("amount {} is not positive", op.amount),
            });
        }
        if !op.asset.is_well_formed() {
            return Err(ValidationError::InvalidAsset {
                index,
                asset: op.asset.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
