// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AIDRAIL Protocol Core Library
//!
//! The ledger-transaction orchestration layer behind AIDRAIL: build payment
//! intents, constrain them, sign them, park them offline and replay them
//! against a public ledger when connectivity returns.
//!
//! Consensus, transport and the cryptography itself are someone else's
//! job. Signatures come from `ed25519-dalek`, hashes from `sha2`, and the
//! ledger is reached only through the [`submission::LedgerSubmitter`]
//! trait.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and the explicit [`config::LedgerConfig`].
//! - **crypto**: Typed wrappers over Ed25519 and SHA-256.
//! - **transaction**: Intents, constraints, the builder, signing, validation.
//! - **codec**: Versioned, checksummed envelope encoding (binary and base64).
//! - **account**: Account-state and credential collaborators.
//! - **storage**: Offline batches over a pluggable backend (sled or memory).
//! - **submission**: The orchestrator that replays batches with partial-failure accounting.
//!
//! ## Data Flow
//!
//! ```text
//! intent ─► ConstraintPolicy ─► TransactionBuilder ─► Envelope
//!                                                      │
//!              online ◄──────────────┬─────────────────┘
//!                │                   ▼ offline
//!                │            EnvelopeCodec ─► OfflineBatchStore
//!                ▼                                     │
//!        SubmissionOrchestrator ◄──────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! 1. No process-wide configuration. Two networks can coexist in one process.
//! 2. "Fix your request" and "try again later" are different result kinds.
//! 3. If it touches money, it has tests. Plural.

pub mod account;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod submission;
pub mod transaction;

pub use codec::{CodecError, EnvelopeCodec};
pub use config::LedgerConfig;
