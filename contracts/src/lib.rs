// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AIDRAIL Payment Programs
//!
//! The two payment shapes AIDRAIL exists for, expressed on top of the
//! protocol core:
//!
//! - **Distribution**: one funding account paying many beneficiaries,
//!   split into as few transactions as the ledger allows, with consecutive
//!   sequence numbers so the whole run can be signed offline.
//! - **Escrow**: conditional transfers released by a milestone: a point in
//!   time, or a quorum of approvers.
//!
//! ## Design Principles
//!
//! 1. Validate the whole request before producing anything. A plan with one
//!    bad amount yields an error, not a partial set of transactions.
//! 2. Milestones are enum variants matched exhaustively; an unknown kind
//!    cannot silently do nothing.
//! 3. Every public type is serializable (serde) for plans on disk and
//!    reports on the wire.

pub mod distribution;
pub mod escrow;
