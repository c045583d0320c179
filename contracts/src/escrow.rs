//! # Conditional Transfers & Escrow
//!
//! Funds for a program are parked in a dedicated escrow account and released
//! to a beneficiary when a [`Milestone`] is met:
//!
//! - **TimeBound**: the release is valid only once `unlock_at` has passed
//!   (and, optionally, before `expires_at`).
//! - **ThresholdSignature**: the release needs signatures from a quorum of
//!   approvers, e.g. two of three field coordinators.
//!
//! An [`EscrowAccount`] is created with a fresh credential, funded, then
//! [`lock`](EscrowAccount::lock)ed. Locking consumes the credential: from
//! then on only the approver set can move the funds. The escrow secret is
//! never written anywhere.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use aidrail_protocol::crypto::{AccountId, AccountKeypair};
use aidrail_protocol::transaction::{
    Amount, Asset, Constraint, ConstraintPolicy, PaymentOperation, SignerThreshold, SignerWeight,
    TransactionBuilder, TransactionIntent, ValidationError,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscrowError {
    #[error("escrow account cannot release funds to itself")]
    SelfRelease,

    #[error("release amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Milestone
// ---------------------------------------------------------------------------

/// The condition under which an escrowed transfer may be released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Milestone {
    TimeBound {
        /// Unix seconds before which the release is invalid.
        unlock_at: u64,
        /// Unix seconds after which the release is invalid.
        #[serde(default)]
        expires_at: Option<u64>,
    },
    ThresholdSignature {
        approvers: Vec<SignerWeight>,
        required_weight: u32,
    },
}

impl Milestone {
    pub fn unlock_at(unlock_at: u64) -> Self {
        Milestone::TimeBound {
            unlock_at,
            expires_at: None,
        }
    }

    pub fn quorum(approvers: impl IntoIterator<Item = (AccountId, u32)>, required: u32) -> Self {
        let threshold = SignerThreshold::new(approvers, required);
        Milestone::ThresholdSignature {
            approvers: threshold.signers,
            required_weight: threshold.required_weight,
        }
    }

    /// Restricts `intent` by this milestone.
    fn apply(
        &self,
        policy: &ConstraintPolicy,
        intent: &TransactionIntent,
        now: u64,
    ) -> Result<TransactionIntent, ValidationError> {
        match self {
            Milestone::TimeBound {
                unlock_at,
                expires_at,
            } => {
                let mut bound = policy.apply_time_bound_at(intent, *unlock_at, *expires_at, now)?;
                // The release window replaces the default build-time expiry.
                bound.expires_at = *expires_at;
                Ok(bound)
            }
            Milestone::ThresholdSignature {
                approvers,
                required_weight,
            } => policy.apply_threshold(
                intent,
                approvers.iter().map(|a| (a.signer, a.weight)),
                *required_weight,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ConditionalTransfer
// ---------------------------------------------------------------------------

/// A payment out of an escrow account, gated by a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalTransfer {
    pub escrow: AccountId,
    pub beneficiary: AccountId,
    pub asset: Asset,
    pub amount: Amount,
    pub milestone: Milestone,
    #[serde(default = "default_fee")]
    pub fee_per_op: u32,
}

fn default_fee() -> u32 {
    aidrail_protocol::config::BASE_FEE_STROOPS
}

impl ConditionalTransfer {
    pub fn new(
        escrow: AccountId,
        beneficiary: AccountId,
        asset: Asset,
        amount: Amount,
        milestone: Milestone,
    ) -> Self {
        Self {
            escrow,
            beneficiary,
            asset,
            amount,
            milestone,
            fee_per_op: default_fee(),
        }
    }

    /// Builds the release payment for escrow sequence `sequence`.
    pub fn release_intent(
        &self,
        builder: &TransactionBuilder,
        policy: &ConstraintPolicy,
        sequence: u64,
    ) -> Result<TransactionIntent, EscrowError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.release_intent_at(builder, policy, sequence, now)
    }

    /// [`release_intent`](Self::release_intent) with an explicit clock.
    pub fn release_intent_at(
        &self,
        builder: &TransactionBuilder,
        policy: &ConstraintPolicy,
        sequence: u64,
        now: u64,
    ) -> Result<TransactionIntent, EscrowError> {
        if self.beneficiary == self.escrow {
            return Err(EscrowError::SelfRelease);
        }
        if !self.amount.is_positive() {
            return Err(EscrowError::NonPositiveAmount(self.amount));
        }

        let payment = PaymentOperation::new(self.beneficiary, self.asset.clone(), self.amount);
        let unconstrained = builder.build_at(
            self.escrow,
            sequence,
            vec![payment],
            Constraint::None,
            self.fee_per_op,
            now,
        )?;
        let intent = self.milestone.apply(policy, &unconstrained, now)?;

        info!(
            escrow = %self.escrow,
            beneficiary = %self.beneficiary,
            amount = %self.amount,
            constraint = %intent.constraint.kind(),
            "prepared escrow release"
        );
        Ok(intent)
    }
}

// ---------------------------------------------------------------------------
// EscrowAccount / EscrowLock
// ---------------------------------------------------------------------------

/// An escrow account that still holds its own credential.
///
/// Use the credential to fund and configure the account, then call
/// [`lock`](Self::lock).
#[derive(Debug)]
pub struct EscrowAccount {
    keypair: AccountKeypair,
}

impl EscrowAccount {
    pub fn generate() -> Self {
        Self {
            keypair: AccountKeypair::generate(),
        }
    }

    pub fn new(keypair: AccountKeypair) -> Self {
        Self { keypair }
    }

    pub fn account_id(&self) -> AccountId {
        self.keypair.account_id()
    }

    /// Signing access for setup transactions made before locking.
    pub fn credential(&self) -> &AccountKeypair {
        &self.keypair
    }

    /// Hands control to `approvers` and discards the escrow credential.
    ///
    /// The approver set is validated first. The credential is consumed
    /// either way, so fund and configure the account before calling this.
    pub fn lock(
        self,
        policy: &ConstraintPolicy,
        approvers: impl IntoIterator<Item = (AccountId, u32)>,
        required_weight: u32,
    ) -> Result<EscrowLock, EscrowError> {
        let escrow = self.keypair.account_id();
        let threshold = SignerThreshold::new(approvers, required_weight);
        if threshold.weight_of(&escrow) > 0 {
            return Err(EscrowError::SelfRelease);
        }
        policy.validate_at(&Constraint::ThresholdSignature(threshold.clone()), 0)?;

        drop(self.keypair);
        info!(
            escrow = %escrow,
            approvers = threshold.signers.len(),
            required_weight = threshold.required_weight,
            "escrow locked"
        );
        Ok(EscrowLock { escrow, threshold })
    }
}

/// A locked escrow: public id plus the approver set that controls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLock {
    pub escrow: AccountId,
    pub threshold: SignerThreshold,
}

impl EscrowLock {
    /// A transfer out of this escrow released by its approver quorum.
    pub fn conditional_transfer(
        &self,
        beneficiary: AccountId,
        asset: Asset,
        amount: Amount,
    ) -> ConditionalTransfer {
        ConditionalTransfer::new(
            self.escrow,
            beneficiary,
            asset,
            amount,
            Milestone::ThresholdSignature {
                approvers: self.threshold.signers.clone(),
                required_weight: self.threshold.required_weight,
            },
        )
    }
}
