//! Batch replay against the ledger.
//!
//! [`SubmissionOrchestrator`] applies one asymmetric rule. A definitive
//! ledger rejection fails that item and moves on, because batch items are
//! independent payments. A connectivity failure stops the pass and leaves
//! everything not yet attempted Pending, so an outage is never recorded as
//! a run of per-item failures.
//!
//! Items of one batch are submitted strictly one after another, in
//! insertion order: each envelope usually consumes the next sequence number
//! of its source account.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant as StdInstant;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::ledger::{LedgerSubmitter, SubmissionResult};
use super::metrics::SubmissionMetrics;
use crate::codec::{CodecError, EnvelopeCodec};
use crate::config::{LedgerConfig, NetworkId};
use crate::storage::{BatchBackend, BatchId, ItemStatus, OfflineBatchStore, StoreError};
use crate::transaction::{verify_for_submission, Envelope, ValidationError};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Batch control & report
// ---------------------------------------------------------------------------

/// Caller-side stop conditions for a batch pass, checked between items.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchControl {
    /// Runs until every pending item has been attempted.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stops once `flag` is set to `true`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn should_stop(&self) -> bool {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst));
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        cancelled || expired
    }
}

/// What happened to one item during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The ledger was contacted (or the contact failed at the network layer).
    Ledger(SubmissionResult),
    /// Refused locally; never sent.
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub index: usize,
    /// Status after the pass.
    pub status: ItemStatus,
    /// `None` if the item was not attempted in this pass.
    pub outcome: Option<ItemOutcome>,
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "completion", rename_all = "snake_case")]
pub enum BatchCompletion {
    AllAttempted,
    /// Item `index` hit a connectivity failure; it and every later pending
    /// item are still Pending.
    StoppedOnNetwork { index: usize },
    /// Cancelled or past the deadline before item `index` was attempted.
    Cancelled { index: usize },
    /// Item `index` was attempted but its new status could not be written.
    /// Its outcome is in the report; the store still shows it Pending.
    StoreFailed { index: usize, reason: String },
}

/// One entry per batch item, in stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub items: Vec<ItemReport>,
    pub completion: BatchCompletion,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_some()).count()
    }

    pub fn pending(&self) -> usize {
        self.items.iter().filter(|i| i.status.is_pending()).count()
    }

    pub fn stopped_early(&self) -> bool {
        self.completion != BatchCompletion::AllAttempted
    }
}

// ---------------------------------------------------------------------------
// SubmissionOrchestrator
// ---------------------------------------------------------------------------

/// Submits single envelopes or replays stored batches.
///
/// Holds no per-batch state: concurrent passes over different batch ids
/// are safe; passes over the same id must be serialized by the caller.
pub struct SubmissionOrchestrator<B> {
    config: LedgerConfig,
    network: NetworkId,
    submitter: Arc<dyn LedgerSubmitter>,
    store: Arc<OfflineBatchStore<B>>,
    metrics: Option<SubmissionMetrics>,
}

impl<B: BatchBackend> SubmissionOrchestrator<B> {
    pub fn new(
        config: LedgerConfig,
        submitter: Arc<dyn LedgerSubmitter>,
        store: Arc<OfflineBatchStore<B>>,
    ) -> Self {
        let network = config.network_id();
        Self {
            config,
            network,
            submitter,
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SubmissionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<OfflineBatchStore<B>> {
        &self.store
    }

    pub fn metrics(&self) -> Option<&SubmissionMetrics> {
        self.metrics.as_ref()
    }

    /// Validates `envelope` locally, then submits it.
    ///
    /// Validation and encoding failures are returned as errors and the
    /// ledger is never contacted. Everything the ledger (or the network)
    /// says comes back as a [`SubmissionResult`].
    pub async fn submit_one(&self, envelope: &Envelope) -> Result<SubmissionResult, SubmissionError> {
        self.validate(envelope)?;
        let wire = EnvelopeCodec::encode_base64(envelope)?;
        Ok(self.dispatch(envelope, &wire).await)
    }

    /// Replays every Pending item of `batch_id` in insertion order.
    ///
    /// Per-item failures are recorded in the store and in the report. A
    /// store write failure stops the pass with
    /// [`BatchCompletion::StoreFailed`]; the report still carries the outcome
    /// of the item whose status was lost. Only failing to read the batch is
    /// an error.
    #[instrument(skip(self, batch_id, control), fields(batch = %batch_id))]
    pub async fn submit_batch(
        &self,
        batch_id: &BatchId,
        control: BatchControl,
    ) -> Result<BatchReport, SubmissionError> {
        let batch = self.store.batch(batch_id)?;
        let mut items: Vec<ItemReport> = batch
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| ItemReport {
                index,
                status: item.status.clone(),
                outcome: None,
            })
            .collect();
        let mut completion = BatchCompletion::AllAttempted;

        info!(items = batch.len(), pending = batch.summary().pending, "starting batch pass");

        for (index, item) in batch.items.iter().enumerate() {
            if !item.status.is_pending() {
                continue;
            }
            if control.should_stop() {
                info!(index, "batch pass cancelled");
                completion = BatchCompletion::Cancelled { index };
                break;
            }

            let outcome = match item.decode() {
                Ok(envelope) => match self.validate(&envelope) {
                    Ok(()) => ItemOutcome::Ledger(self.dispatch(&envelope, &item.envelope).await),
                    Err(e) => ItemOutcome::Invalid {
                        reason: e.to_string(),
                    },
                },
                Err(e) => {
                    warn!(index, error = %e, "stored envelope does not decode");
                    if let Some(m) = &self.metrics {
                        m.invalid_total.inc();
                    }
                    ItemOutcome::Invalid {
                        reason: e.to_string(),
                    }
                }
            };

            let next_status = match &outcome {
                ItemOutcome::Ledger(SubmissionResult::Accepted {
                    tx_hash,
                    ledger_timestamp,
                }) => Some(ItemStatus::Submitted {
                    tx_hash: tx_hash.clone(),
                    ledger_timestamp: *ledger_timestamp,
                }),
                ItemOutcome::Ledger(SubmissionResult::RejectedByLedger { code }) => {
                    Some(ItemStatus::Failed {
                        reason: code.clone(),
                    })
                }
                ItemOutcome::Invalid { reason } => Some(ItemStatus::Failed {
                    reason: reason.clone(),
                }),
                ItemOutcome::Ledger(SubmissionResult::NetworkUnavailable { .. }) => None,
            };

            items[index].outcome = Some(outcome);

            match next_status {
                Some(status) => {
                    if let Err(e) = self.store.update_status(batch_id, index, status.clone()) {
                        error!(
                            index,
                            error = %e,
                            status = status.label(),
                            "could not record item status"
                        );
                        completion = BatchCompletion::StoreFailed {
                            index,
                            reason: e.to_string(),
                        };
                        break;
                    }
                    items[index].status = status;
                }
                None => {
                    warn!(index, "network unavailable; leaving remaining items pending");
                    if let Some(m) = &self.metrics {
                        m.network_halts_total.inc();
                    }
                    completion = BatchCompletion::StoppedOnNetwork { index };
                    break;
                }
            }
        }

        let report = BatchReport {
            batch_id: batch_id.clone(),
            items,
            completion,
        };
        info!(
            attempted = report.attempted(),
            pending = report.pending(),
            completion = ?report.completion,
            "batch pass finished"
        );
        Ok(report)
    }

    fn validate(&self, envelope: &Envelope) -> Result<(), ValidationError> {
        match verify_for_submission(envelope, &self.config, &self.network) {
            Ok(weight) => {
                debug!(weight, "envelope passed local validation");
                Ok(())
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.invalid_total.inc();
                }
                warn!(error = %e, "envelope refused before submission");
                Err(e)
            }
        }
    }

    /// Sends one already validated envelope and classifies the answer.
    async fn dispatch(&self, envelope: &Envelope, wire: &str) -> SubmissionResult {
        let tx_hash = envelope.intent.hash_hex(&self.network);
        let timeout = self.config.submit_timeout();
        let started = StdInstant::now();

        let answer = tokio::time::timeout(timeout, self.submitter.submit(wire)).await;

        if let Some(m) = &self.metrics {
            m.submit_latency_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        let result = match answer {
            Ok(Ok(response)) if response.success => SubmissionResult::Accepted {
                tx_hash,
                ledger_timestamp: response.ledger_timestamp,
            },
            Ok(Ok(response)) => SubmissionResult::RejectedByLedger {
                code: response.result_code,
            },
            Ok(Err(fault)) => SubmissionResult::NetworkUnavailable {
                reason: fault.to_string(),
            },
            Err(_) => SubmissionResult::NetworkUnavailable {
                reason: format!("no answer within {} ms", timeout.as_millis()),
            },
        };

        if let Some(m) = &self.metrics {
            match &result {
                SubmissionResult::Accepted { .. } => m.accepted_total.inc(),
                SubmissionResult::RejectedByLedger { .. } => m.rejected_total.inc(),
                SubmissionResult::NetworkUnavailable { .. } => {}
            }
        }
        debug!(sequence = envelope.intent.sequence, outcome = %result, "submission finished");
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AccountKeypair;
    use crate::storage::{MemoryBackend, OfflineBatch, StoreResult};
    use crate::submission::ledger::{LedgerFault, LedgerResponse};
    use crate::transaction::{Amount, Constraint, PaymentOperation, TransactionBuilder};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers from a script; accepts once the script runs out.
    #[derive(Default)]
    struct ScriptedLedger {
        script: Mutex<VecDeque<Result<LedgerResponse, LedgerFault>>>,
        received: Mutex<Vec<String>>,
    }

    impl ScriptedLedger {
        fn new(script: Vec<Result<LedgerResponse, LedgerFault>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                received: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.received.lock().len()
        }
    }

    #[async_trait]
    impl LedgerSubmitter for ScriptedLedger {
        async fn submit(&self, envelope_base64: &str) -> Result<LedgerResponse, LedgerFault> {
            self.received.lock().push(envelope_base64.to_string());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(LedgerResponse::accepted(1_760_000_100)))
        }
    }

    struct SlowLedger;

    #[async_trait]
    impl LedgerSubmitter for SlowLedger {
        async fn submit(&self, _: &str) -> Result<LedgerResponse, LedgerFault> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(LedgerResponse::accepted(0))
        }
    }

    fn signed(n: u64) -> Vec<Envelope> {
        let builder = TransactionBuilder::new(LedgerConfig::testnet());
        let payer = AccountKeypair::from_seed(&[1u8; 32]);
        let payee = AccountKeypair::from_seed(&[2u8; 32]).account_id();
        (0..n)
            .map(|i| {
                let intent = builder
                    .build_at(
                        payer.account_id(),
                        10 + i,
                        vec![PaymentOperation::native(payee, Amount::from_stroops(1_000))],
                        Constraint::None,
                        100,
                        1_760_000_000,
                    )
                    .unwrap();
                builder.sign(intent, &payer)
            })
            .collect()
    }

    fn orchestrator(
        ledger: Arc<dyn LedgerSubmitter>,
    ) -> SubmissionOrchestrator<MemoryBackend> {
        let store = Arc::new(OfflineBatchStore::new(MemoryBackend::new()));
        SubmissionOrchestrator::new(LedgerConfig::testnet(), ledger, store)
            .with_metrics(SubmissionMetrics::new().unwrap())
    }

    fn put(orch: &SubmissionOrchestrator<MemoryBackend>, id: &str, envs: &[Envelope]) -> BatchId {
        let id = BatchId::new(id).unwrap();
        orch.store().put(&id, envs).unwrap();
        id
    }

    #[tokio::test]
    async fn submit_one_classifies_outcomes() {
        let ledger = ScriptedLedger::new(vec![
            Ok(LedgerResponse::accepted(77)),
            Ok(LedgerResponse::rejected("tx_bad_seq", 78)),
            Err(LedgerFault::Unreachable("connection refused".into())),
        ]);
        let orch = orchestrator(ledger.clone());
        let env = &signed(1)[0];

        let accepted = orch.submit_one(env).await.unwrap();
        assert_eq!(
            accepted,
            SubmissionResult::Accepted {
                tx_hash: env.intent.hash_hex(&LedgerConfig::testnet().network_id()),
                ledger_timestamp: 77
            }
        );
        assert_eq!(
            orch.submit_one(env).await.unwrap(),
            SubmissionResult::RejectedByLedger {
                code: "tx_bad_seq".into()
            }
        );
        assert!(orch.submit_one(env).await.unwrap().is_network_unavailable());

        let m = orch.metrics().unwrap();
        assert_eq!(m.accepted_total.get(), 1);
        assert_eq!(m.rejected_total.get(), 1);
    }

    #[tokio::test]
    async fn submitted_wire_form_decodes_to_the_envelope() {
        let ledger = ScriptedLedger::new(vec![]);
        let orch = orchestrator(ledger.clone());
        let env = &signed(1)[0];
        orch.submit_one(env).await.unwrap();
        let wire = ledger.received.lock()[0].clone();
        assert_eq!(&EnvelopeCodec::decode_base64(&wire).unwrap(), env);
    }

    #[tokio::test]
    async fn unsigned_envelope_never_reaches_ledger() {
        let ledger = ScriptedLedger::new(vec![]);
        let orch = orchestrator(ledger.clone());
        let unsigned = Envelope::new(signed(1)[0].intent.clone());
        let err = orch.submit_one(&unsigned).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Validation(ValidationError::InsufficientSignatureWeight { .. })
        ));
        assert_eq!(ledger.calls(), 0);
        assert_eq!(orch.metrics().unwrap().invalid_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_network_unavailable() {
        let orch = orchestrator(Arc::new(SlowLedger));
        let result = orch.submit_one(&signed(1)[0]).await.unwrap();
        assert!(result.is_network_unavailable());
    }

    #[tokio::test]
    async fn rejection_does_not_stop_the_batch() {
        let ledger = ScriptedLedger::new(vec![
            Ok(LedgerResponse::accepted(1)),
            Ok(LedgerResponse::rejected("op_no_destination", 2)),
            Ok(LedgerResponse::accepted(3)),
        ]);
        let orch = orchestrator(ledger.clone());
        let id = put(&orch, "mixed", &signed(3));

        let report = orch.submit_batch(&id, BatchControl::unbounded()).await.unwrap();
        assert_eq!(report.completion, BatchCompletion::AllAttempted);
        assert_eq!(report.attempted(), 3);
        assert!(matches!(report.items[0].status, ItemStatus::Submitted { .. }));
        assert_eq!(
            report.items[1].status,
            ItemStatus::Failed {
                reason: "op_no_destination".into()
            }
        );
        assert!(matches!(report.items[2].status, ItemStatus::Submitted { .. }));
        assert!(orch.store().list_pending(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn network_failure_halts_and_keeps_rest_pending() {
        let ledger = ScriptedLedger::new(vec![
            Ok(LedgerResponse::accepted(1)),
            Ok(LedgerResponse::rejected("tx_failed", 2)),
            Err(LedgerFault::Transport("reset by peer".into())),
        ]);
        let orch = orchestrator(ledger.clone());
        let envs = signed(5);
        let id = put(&orch, "outage", &envs);

        let report = orch.submit_batch(&id, BatchControl::unbounded()).await.unwrap();
        assert_eq!(report.completion, BatchCompletion::StoppedOnNetwork { index: 2 });
        assert_eq!(ledger.calls(), 3);
        for (i, item) in report.items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.status.is_terminal(), i < 2, "item {i}");
        }
        assert_eq!(orch.metrics().unwrap().network_halts_total.get(), 1);

        // The next pass picks up exactly where the outage left off.
        let report = orch.submit_batch(&id, BatchControl::unbounded()).await.unwrap();
        assert_eq!(report.completion, BatchCompletion::AllAttempted);
        assert_eq!(report.attempted(), 3);
        assert!(report.items[0].outcome.is_none());
        assert_eq!(report.pending(), 0);
        assert_eq!(ledger.calls(), 6);
    }

    #[tokio::test]
    async fn invalid_stored_envelope_is_failed_and_skipped() {
        let ledger = ScriptedLedger::new(vec![]);
        let orch = orchestrator(ledger.clone());
        let mut envs = signed(3);
        envs[1] = Envelope::new(envs[1].intent.clone());
        let id = put(&orch, "one-unsigned", &envs);

        let report = orch.submit_batch(&id, BatchControl::unbounded()).await.unwrap();
        assert_eq!(report.completion, BatchCompletion::AllAttempted);
        assert!(matches!(
            report.items[1].outcome,
            Some(ItemOutcome::Invalid { .. })
        ));
        assert!(matches!(report.items[1].status, ItemStatus::Failed { .. }));
        assert_eq!(ledger.calls(), 2);
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_items() {
        let ledger = ScriptedLedger::new(vec![]);
        let orch = orchestrator(ledger.clone());
        let id = put(&orch, "cancelled", &signed(3));

        let flag = Arc::new(AtomicBool::new(true));
        let report = orch
            .submit_batch(&id, BatchControl::unbounded().with_cancel_flag(flag))
            .await
            .unwrap();
        assert_eq!(report.completion, BatchCompletion::Cancelled { index: 0 });
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.pending(), 3);
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn expired_deadline_leaves_items_pending() {
        let ledger = ScriptedLedger::new(vec![]);
        let orch = orchestrator(ledger.clone());
        let id = put(&orch, "late", &signed(2));

        let report = orch
            .submit_batch(&id, BatchControl::unbounded().with_deadline(Instant::now()))
            .await
            .unwrap();
        assert_eq!(report.completion, BatchCompletion::Cancelled { index: 0 });
        assert!(report.stopped_early());
        assert_eq!(orch.store().list_pending(&id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_batch_is_a_store_error() {
        let orch = orchestrator(ScriptedLedger::new(vec![]));
        let err = orch
            .submit_batch(&BatchId::new("nope").unwrap(), BatchControl::unbounded())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Store(StoreError::BatchNotFound(_))));
    }

    /// Memory backend that refuses writes once its budget is spent.
    struct FailingWrites {
        inner: MemoryBackend,
        saves_left: std::sync::atomic::AtomicUsize,
    }

    impl BatchBackend for FailingWrites {
        fn load(&self, id: &BatchId) -> StoreResult<Option<OfflineBatch>> {
            self.inner.load(id)
        }
        fn save(&self, batch: &OfflineBatch) -> StoreResult<()> {
            let left = self.saves_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.saves_left.store(left - 1, Ordering::SeqCst);
            self.inner.save(batch)
        }
        fn remove(&self, id: &BatchId) -> StoreResult<bool> {
            self.inner.remove(id)
        }
        fn ids(&self) -> StoreResult<Vec<BatchId>> {
            self.inner.ids()
        }
    }

    #[tokio::test]
    async fn store_failure_still_reports_the_attempted_item() {
        let backend = FailingWrites {
            inner: MemoryBackend::new(),
            // One for the initial put, one for item 0.
            saves_left: std::sync::atomic::AtomicUsize::new(2),
        };
        let store = Arc::new(OfflineBatchStore::new(backend));
        let id = BatchId::new("flaky-disk").unwrap();
        store.put(&id, &signed(3)).unwrap();

        let ledger = ScriptedLedger::new(vec![]);
        let orch = SubmissionOrchestrator::new(LedgerConfig::testnet(), ledger.clone(), store.clone());
        let report = orch
            .submit_batch(&id, BatchControl::unbounded())
            .await
            .unwrap();

        assert!(matches!(
            report.completion,
            BatchCompletion::StoreFailed { index: 1, .. }
        ));
        assert_eq!(ledger.calls(), 2);
        assert!(matches!(report.items[0].status, ItemStatus::Submitted { .. }));
        assert!(matches!(
            report.items[1].outcome,
            Some(ItemOutcome::Ledger(SubmissionResult::Accepted { .. }))
        ));
        assert!(report.items[1].status.is_pending());
        assert!(report.items[2].outcome.is_none());
        assert_eq!(report.attempted(), 2);
        assert_eq!(store.list_pending(&id).unwrap().len(), 2);
    }
}
