//! Time-bound and threshold-signature constraints.
//!
//! A [`Constraint`] is a tagged variant matched exhaustively everywhere it is
//! consumed; there is no "unknown milestone type" that silently does
//! nothing. [`ConstraintPolicy`] is the only place that decides whether a
//! constraint is acceptable, and both the builder and the escrow contracts
//! go through it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::builder::TransactionIntent;
use super::verification::ValidationError;
use crate::config::LedgerConfig;
use crate::crypto::AccountId;

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// Validity window, in unix seconds. `max_time: None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: Option<u64>,
}

impl TimeBounds {
    /// Whether `now` falls inside the window.
    pub fn contains(&self, now: u64) -> bool {
        now >= self.min_time && self.max_time.map_or(true, |max| now <= max)
    }
}

/// One entry of a signer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerWeight {
    pub signer: AccountId,
    pub weight: u32,
}

/// Signer set with a minimum accumulated weight.
///
/// Signers are kept sorted and unique so that two logically equal
/// thresholds hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerThreshold {
    pub required_weight: u32,
    pub signers: Vec<SignerWeight>,
}

impl SignerThreshold {
    /// Normalizes the signer list; later duplicates win.
    pub fn new(signers: impl IntoIterator<Item = (AccountId, u32)>, required_weight: u32) -> Self {
        let map: BTreeMap<AccountId, u32> = signers.into_iter().collect();
        Self {
            required_weight,
            signers: map
                .into_iter()
                .map(|(signer, weight)| SignerWeight { signer, weight })
                .collect(),
        }
    }

    /// Sum of every listed weight, saturating.
    pub fn total_weight(&self) -> u64 {
        self.signers.iter().map(|s| u64::from(s.weight)).sum()
    }

    pub fn weight_of(&self, signer: &AccountId) -> u32 {
        self.signers
            .iter()
            .find(|s| &s.signer == signer)
            .map_or(0, |s| s.weight)
    }
}

/// Conditions attached to a transaction intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Constraint {
    /// Plain transfer: the source account's signature is sufficient.
    #[default]
    None,
    /// The ledger only accepts the transaction inside the window.
    TimeBound(TimeBounds),
    /// The accumulated signer weight must reach the threshold.
    ThresholdSignature(SignerThreshold),
}

impl Constraint {
    pub fn time_bound(min_time: u64, max_time: Option<u64>) -> Self {
        Self::TimeBound(TimeBounds { min_time, max_time })
    }

    pub fn threshold(signers: impl IntoIterator<Item = (AccountId, u32)>, required: u32) -> Self {
        Self::ThresholdSignature(SignerThreshold::new(signers, required))
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::None => ConstraintKind::None,
            Self::TimeBound(_) => ConstraintKind::TimeBound,
            Self::ThresholdSignature(_) => ConstraintKind::ThresholdSignature,
        }
    }

    pub fn time_bounds(&self) -> Option<TimeBounds> {
        match self {
            Self::TimeBound(bounds) => Some(*bounds),
            Self::None | Self::ThresholdSignature(_) => None,
        }
    }

    /// Weight required before an envelope may be submitted.
    pub fn required_weight(&self) -> u32 {
        match self {
            Self::None | Self::TimeBound(_) => 1,
            Self::ThresholdSignature(t) => t.required_weight,
        }
    }

    /// Weight contributed by `signer` on a transaction from `source`.
    pub fn weight_of(&self, source: &AccountId, signer: &AccountId) -> u32 {
        match self {
            Self::None | Self::TimeBound(_) => u32::from(signer == source),
            Self::ThresholdSignature(t) => t.weight_of(signer),
        }
    }
}

/// Discriminant of [`Constraint`], used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    None,
    TimeBound,
    ThresholdSignature,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::TimeBound => write!(f, "TimeBound"),
            Self::ThresholdSignature => write!(f, "ThresholdSignature"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConstraintPolicy
// ---------------------------------------------------------------------------

/// Validates constraints and applies them to intents.
///
/// Pure: nothing here touches the network or mutates its inputs.
#[derive(Debug, Clone)]
pub struct ConstraintPolicy {
    skew_secs: u64,
}

impl ConstraintPolicy {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            skew_secs: config.time_bound_skew_secs,
        }
    }

    pub fn skew_secs(&self) -> u64 {
        self.skew_secs
    }

    /// Checks a constraint against the rules at wall-clock time `now`.
    pub fn validate_at(&self, constraint: &Constraint, now: u64) -> Result<(), ValidationError> {
        match constraint {
            Constraint::None => Ok(()),
            Constraint::TimeBound(bounds) => self.check_time_bound(bounds, now),
            Constraint::ThresholdSignature(threshold) => check_threshold(threshold),
        }
    }

    /// Returns a copy of `intent` restricted to `[min_time, max_time]`.
    pub fn apply_time_bound(
        &self,
        intent: &TransactionIntent,
        min_time: u64,
        max_time: Option<u64>,
    ) -> Result<TransactionIntent, ValidationError> {
        self.apply_time_bound_at(intent, min_time, max_time, unix_now())
    }

    /// [`apply_time_bound`](Self::apply_time_bound) with an explicit clock.
    pub fn apply_time_bound_at(
        &self,
        intent: &TransactionIntent,
        min_time: u64,
        max_time: Option<u64>,
        now: u64,
    ) -> Result<TransactionIntent, ValidationError> {
        let constraint = Constraint::time_bound(min_time, max_time);
        self.validate_at(&constraint, now)?;
        replace_constraint(intent, constraint)
    }

    /// Returns a copy of `intent` that requires `required_weight` from the
    /// given signer set.
    pub fn apply_threshold(
        &self,
        intent: &TransactionIntent,
        signer_weights: impl IntoIterator<Item = (AccountId, u32)>,
        required_weight: u32,
    ) -> Result<TransactionIntent, ValidationError> {
        let constraint = Constraint::threshold(signer_weights, required_weight);
        self.validate_at(&constraint, unix_now())?;
        replace_constraint(intent, constraint)
    }

    fn check_time_bound(&self, bounds: &TimeBounds, now: u64) -> Result<(), ValidationError> {
        let earliest = now.saturating_sub(self.skew_secs);
        if bounds.min_time < earliest {
            return Err(ValidationError::TimeBoundInPast {
                min_time: bounds.min_time,
                now,
                skew_secs: self.skew_secs,
            });
        }
        if let Some(max_time) = bounds.max_time {
            if max_time < bounds.min_time {
                return Err(ValidationError::InvertedTimeBound {
                    min_time: bounds.min_time,
                    max_time,
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn check_threshold(threshold: &SignerThreshold) -> Result<(), ValidationError> {
    if threshold.signers.is_empty() {
        return Err(ValidationError::EmptySignerSet);
    }
    if threshold.required_weight == 0 {
        return Err(ValidationError::ZeroThreshold);
    }
    let available = threshold.total_weight();
    if u64::from(threshold.required_weight) > available {
        return Err(ValidationError::UnreachableThreshold {
            required: threshold.required_weight,
            available,
        });
    }
    Ok(())
}

/// Same-kind constraints replace each other; mixing kinds is refused.
fn replace_constraint(
    intent: &TransactionIntent,
    constraint: Constraint,
) -> Result<TransactionIntent, ValidationError> {
    let existing = intent.constraint.kind();
    if existing != ConstraintKind::None && existing != constraint.kind() {
        return Err(ValidationError::ConstraintConflict {
            existing,
            requested: constraint.kind(),
        });
    }
    let mut next = intent.clone();
    next.constraint = constraint;
    Ok(next)
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
