//! # Submission Module
//!
//! Getting envelopes onto the ledger.
//!
//! ```text
//! ledger.rs      : LedgerSubmitter collaborator, LedgerResponse, SubmissionResult
//! orchestrator.rs: SubmissionOrchestrator: submit_one / submit_batch
//! metrics.rs     : Prometheus counters for submission outcomes
//! ```
//!
//! The transport itself is injected through [`LedgerSubmitter`]; this crate
//! never opens a connection on its own.

pub mod ledger;
pub mod metrics;
pub mod orchestrator;

pub use ledger::{LedgerFault, LedgerResponse, LedgerSubmitter, SubmissionResult};
pub use metrics::SubmissionMetrics;
pub use orchestrator::{
    BatchCompletion, BatchControl, BatchReport, ItemOutcome, ItemReport, SubmissionError,
    SubmissionOrchestrator,
};
