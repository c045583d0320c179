//! # Aid Distribution
//!
//! Turns a [`DistributionPlan`] (one funding account, many beneficiaries)
//! into a run of transaction intents ready for offline signing.
//!
//! The plan is validated in full before any intent is produced. Recipients
//! are packed into transactions of at most `ops_per_transaction` payments,
//! and the transactions get consecutive sequence numbers starting at
//! `start_sequence`, so they must be submitted in the order returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use aidrail_protocol::crypto::{AccountId, AccountKeypair};
use aidrail_protocol::transaction::{
    Amount, Asset, Constraint, Envelope, PaymentOperation, TransactionBuilder, TransactionIntent,
    ValidationError,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistributionError {
    #[error("distribution plan has no recipients")]
    NoRecipients,

    #[error("invalid source account {0:?}")]
    InvalidSource(String),

    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    #[error("recipient {index} has an invalid destination {destination:?}")]
    InvalidDestination { index: usize, destination: String },

    #[error("ops_per_transaction must be between 1 and {max}, got {size}")]
    InvalidChunkSize { size: usize, max: usize },

    #[error("sequence numbers overflow after {start}")]
    SequenceOverflow { start: u64 },

    #[error("plan total overflows the fixed-point range")]
    TotalOverflow,

    #[error("credential {credential} cannot sign for source {source_account}")]
    CredentialMismatch {
        credential: AccountId,
        source_account: AccountId,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One beneficiary line of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Base58 account id.
    pub destination: String,
    /// Decimal amount, at most seven fractional digits.
    pub amount: String,
}

/// A bulk payment run, usually loaded from JSON.
///
/// ```json
/// {
///   "source": "<base58 account>",
///   "asset": "native",
///   "start_sequence": 1043,
///   "recipients": [{ "destination": "<base58>", "amount": "15.75" }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub source: String,
    /// `native` or `CODE:ISSUER`.
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Sequence number of the first transaction.
    pub start_sequence: u64,
    #[serde(default = "default_fee")]
    pub fee_per_op: u32,
    #[serde(default = "default_ops_per_transaction")]
    pub ops_per_transaction: usize,
    /// Earliest unix second at which the payments may be applied.
    #[serde(default)]
    pub valid_from: Option<u64>,
    /// Latest unix second at which the payments may be applied.
    #[serde(default)]
    pub valid_until: Option<u64>,
    pub recipients: Vec<Recipient>,
}

fn default_asset() -> String {
    "native".to_string()
}
fn default_fee() -> u32 {
    aidrail_protocol::config::BASE_FEE_STROOPS
}
fn default_ops_per_transaction() -> usize {
    aidrail_protocol::config::MAX_OPERATIONS_PER_TX
}

/// A fully validated plan line.
struct Payout {
    destination: AccountId,
    amount: Amount,
}

impl DistributionPlan {
    pub fn source_id(&self) -> Result<AccountId, DistributionError> {
        self.source
            .parse()
            .map_err(|_| DistributionError::InvalidSource(self.source.clone()))
    }

    pub fn asset(&self) -> Result<Asset, DistributionError> {
        self.asset
            .parse()
            .map_err(|e: aidrail_protocol::transaction::AmountError| {
                DistributionError::InvalidAsset(e.to_string())
            })
    }

    /// Sum of all recipient amounts.
    pub fn total(&self, builder: &TransactionBuilder) -> Result<Amount, DistributionError> {
        self.payouts(builder)?
            .iter()
            .try_fold(Amount::ZERO, |acc, p| acc.checked_add(p.amount))
            .ok_or(DistributionError::TotalOverflow)
    }

    /// Number of transactions [`plan_intents`] will produce.
    pub fn transaction_count(&self) -> usize {
        if self.ops_per_transaction == 0 {
            return 0;
        }
        self.recipients.len().div_ceil(self.ops_per_transaction)
    }

    /// An open start means "from the moment the plan is built".
    fn constraint(&self, now: u64) -> Constraint {
        match (self.valid_from, self.valid_until) {
            (None, None) => Constraint::None,
            (from, until) => Constraint::time_bound(from.unwrap_or(now), until),
        }
    }

    fn payouts(&self, builder: &TransactionBuilder) -> Result<Vec<Payout>, DistributionError> {
        if self.recipients.is_empty() {
            return Err(DistributionError::NoRecipients);
        }
        self.recipients
            .iter()
            .enumerate()
            .map(|(index, r)| {
                let destination = r.destination.parse().map_err(|_| {
                    DistributionError::InvalidDestination {
                        index,
                        destination: r.destination.clone(),
                    }
                })?;
                let amount = builder.parse_amount(index, &r.amount)?;
                Ok(Payout {
                    destination,
                    amount,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Planning & signing
// ---------------------------------------------------------------------------

/// Validates `plan` and packs it into transaction intents.
///
/// Amount errors carry the recipient's index in the plan. Nothing is
/// returned unless every line is valid.
pub fn plan_intents(
    builder: &TransactionBuilder,
    plan: &DistributionPlan,
) -> Result<Vec<TransactionIntent>, DistributionError> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    plan_intents_at(builder, plan, now)
}

/// [`plan_intents`] with an explicit clock.
pub fn plan_intents_at(
    builder: &TransactionBuilder,
    plan: &DistributionPlan,
    now: u64,
) -> Result<Vec<TransactionIntent>, DistributionError> {
    let source = plan.source_id()?;
    let asset = plan.asset()?;

    let max = builder.config().max_operations_per_tx;
    if plan.ops_per_transaction == 0 || plan.ops_per_transaction > max {
        return Err(DistributionError::InvalidChunkSize {
            size: plan.ops_per_transaction,
            max,
        });
    }

    let payouts = plan.payouts(builder)?;
    let constraint = plan.constraint(now);

    let mut intents = Vec::with_capacity(plan.transaction_count());
    for (offset, chunk) in payouts.chunks(plan.ops_per_transaction).enumerate() {
        let sequence = plan
            .start_sequence
            .checked_add(offset as u64)
            .ok_or(DistributionError::SequenceOverflow {
                start: plan.start_sequence,
            })?;
        let operations = chunk
            .iter()
            .map(|p| PaymentOperation::new(p.destination, asset.clone(), p.amount))
            .collect();
        intents.push(builder.build_at(
            source,
            sequence,
            operations,
            constraint.clone(),
            plan.fee_per_op,
            now,
        )?);
    }

    info!(
        source = %source,
        recipients = payouts.len(),
        transactions = intents.len(),
        "planned distribution"
    );
    Ok(intents)
}

/// Signs every intent with the funding account's credential.
pub fn sign_all(
    builder: &TransactionBuilder,
    intents: Vec<TransactionIntent>,
    credential: &AccountKeypair,
) -> Result<Vec<Envelope>, DistributionError> {
    let signer = credential.account_id();
    intents
        .into_iter()
        .map(|intent| {
            if intent.source != signer {
                return Err(DistributionError::CredentialMismatch {
                    credential: signer,
                    source_account: intent.source,
                });
            }
            Ok(builder.sign(intent, credential))
        })
        .collect()
}
