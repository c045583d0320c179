//! # Transaction Module
//!
//! Construction, constraints, signing and verification of payment
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       : Value types (Asset, Amount, PaymentOperation)
//! constraint.rs  : Constraint variants and the ConstraintPolicy rules
//! builder.rs     : TransactionIntent and the validating TransactionBuilder
//! signing.rs     : Envelope and idempotent Ed25519 signing
//! verification.rs: ValidationError and the pre-submission checks
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder::build`] validates and returns an intent.
//! 2. **Constrain**: [`ConstraintPolicy`] attaches a time bound or threshold.
//! 3. **Sign**: [`TransactionBuilder::sign`] collects signatures into an [`Envelope`].
//! 4. **Verify**: [`verify_for_submission`] gates the envelope before the ledger.
//!
//! ## Design Decisions
//!
//! - Signatures commit to `sha256(network_id ‖ tag ‖ signable_bytes)`, so
//!   an envelope cannot be replayed on another network.
//! - Amounts are `i64` stroops. No floating point anywhere near money.
//! - Building never contacts the network; the sequence number is an input.

pub mod builder;
pub mod constraint;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{TransactionBuilder, TransactionIntent};
pub use constraint::{
    Constraint, ConstraintKind, ConstraintPolicy, SignerThreshold, SignerWeight, TimeBounds,
};
pub use signing::{sign_envelope, DecoratedSignature, Envelope};
pub use types::{Amount, AmountError, Asset, PaymentOperation};
pub use verification::{verify_envelope, verify_for_submission, verify_intent, ValidationError};
