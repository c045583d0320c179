//! End-to-end integration tests for the AIDRAIL protocol core.
//!
//! These tests drive the full path an aid payment takes: amounts parsed,
//! intents built and constrained, envelopes signed, parked in an offline
//! batch, and replayed against a simulated ledger. The simulated ledger
//! enforces what a real one would (signatures, time bounds, sequence
//! numbers) so that ledger-side rejections are exercised honestly.
//!
//! Each test stands alone with its own store. No shared state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use aidrail_protocol::codec::EnvelopeCodec;
use aidrail_protocol::config::{LedgerConfig, NetworkId};
use aidrail_protocol::crypto::{AccountId, AccountKeypair};
use aidrail_protocol::storage::{
    BatchId, ItemStatus, MemoryBackend, OfflineBatchStore, SledBackend,
};
use aidrail_protocol::submission::{
    BatchCompletion, BatchControl, LedgerFault, LedgerResponse, LedgerSubmitter,
    SubmissionError, SubmissionOrchestrator, SubmissionResult,
};
use aidrail_protocol::transaction::{
    verify_envelope, Amount, Asset, Constraint, Envelope, PaymentOperation, TransactionBuilder,
    ValidationError,
};

// ---------------------------------------------------------------------------
// Simulated ledger
// ---------------------------------------------------------------------------

/// A ledger that checks what the real one checks, with a settable clock and
/// a switch to simulate losing connectivity.
struct SimulatedLedger {
    network: NetworkId,
    clock: u64,
    online: AtomicBool,
    /// Take the network down after this many more submissions.
    fail_after: Mutex<Option<usize>>,
    sequences: Mutex<HashMap<AccountId, u64>>,
    calls: AtomicUsize,
}

impl SimulatedLedger {
    fn new(config: &LedgerConfig, clock: u64) -> Arc<Self> {
        Arc::new(Self {
            network: config.network_id(),
            clock,
            online: AtomicBool::new(true),
            fail_after: Mutex::new(None),
            sequences: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn fund(&self, account: AccountId, sequence: u64) {
        self.sequences.lock().insert(account, sequence);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerSubmitter for SimulatedLedger {
    async fn submit(&self, envelope_base64: &str) -> Result<LedgerResponse, LedgerFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut fail_after = self.fail_after.lock();
            if let Some(remaining) = fail_after.as_mut() {
                if *remaining == 0 {
                    self.online.store(false, Ordering::SeqCst);
                } else {
                    *remaining -= 1;
                }
            }
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(LedgerFault::Unreachable("horizon timed out".into()));
        }

        let Ok(envelope) = EnvelopeCodec::decode_base64(envelope_base64) else {
            return Ok(LedgerResponse::rejected("tx_malformed", self.clock));
        };
        if verify_envelope(&envelope, &self.network).is_err() {
            return Ok(LedgerResponse::rejected("tx_bad_auth", self.clock));
        }
        if let Some(bounds) = envelope.intent.constraint.time_bounds() {
            if self.clock < bounds.min_time {
                return Ok(LedgerResponse::rejected("tx_too_early", self.clock));
            }
            if bounds.max_time.is_some_and(|max| self.clock > max) {
                return Ok(LedgerResponse::rejected("tx_too_late", self.clock));
            }
        }

        let mut sequences = self.sequences.lock();
        let Some(current) = sequences.get_mut(&envelope.intent.source) else {
            return Ok(LedgerResponse::rejected("tx_no_source_account", self.clock));
        };
        if envelope.intent.sequence != *current + 1 {
            return Ok(LedgerResponse::rejected("tx_bad_seq", self.clock));
        }
        *current += 1;
        Ok(LedgerResponse::accepted(self.clock))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NOW: u64 = 1_760_000_000;

fn keypair(seed: u8) -> AccountKeypair {
    AccountKeypair::from_seed(&[seed; 32])
}

fn payment(builder: &TransactionBuilder, to: AccountId, amount: &str) -> PaymentOperation {
    PaymentOperation::native(to, builder.parse_amount(0, amount).unwrap())
}

/// One signed single-payment envelope per sequence number.
fn signed_run(builder: &TransactionBuilder, payer: &AccountKeypair, first_seq: u64, n: u64) -> Vec<Envelope> {
    (0..n)
        .map(|i| {
            let intent = builder
                .build_at(
                    payer.account_id(),
                    first_seq + i,
                    vec![payment(builder, keypair(100 + i as u8).account_id(), "25")],
                    Constraint::None,
                    100,
                    NOW,
                )
                .unwrap();
            builder.sign(intent, payer)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn zero_amount_fails_build_before_any_envelope() {
    let builder = TransactionBuilder::new(LedgerConfig::testnet());
    let payer = keypair(1);
    let amounts = ["10", "15.75", "0"];

    let parsed: Result<Vec<Amount>, ValidationError> = amounts
        .iter()
        .enumerate()
        .map(|(i, raw)| builder.parse_amount(i, raw))
        .collect();
    assert!(matches!(
        parsed,
        Err(ValidationError::InvalidAmount { index: 2, .. })
    ));

    // Same outcome when the zero slips through as an operation.
    let ops = vec![
        PaymentOperation::native(keypair(2).account_id(), Amount::from_stroops(100_000_000)),
        PaymentOperation::native(keypair(3).account_id(), Amount::from_stroops(157_500_000)),
        PaymentOperation::native(keypair(4).account_id(), Amount::ZERO),
    ];
    let result = builder.build_at(payer.account_id(), 1, ops, Constraint::None, 100, NOW);
    assert!(matches!(
        result,
        Err(ValidationError::InvalidAmount { index: 2, .. })
    ));
}

#[tokio::test]
async fn early_time_bound_is_rejected_by_ledger() {
    let config = LedgerConfig::testnet();
    let builder = TransactionBuilder::new(config.clone());
    let payer = keypair(1);
    let ledger = SimulatedLedger::new(&config, NOW);
    ledger.fund(payer.account_id(), 0);

    let intent = builder
        .build_at(
            payer.account_id(),
            1,
            vec![payment(&builder, keypair(2).account_id(), "50")],
            Constraint::None,
            100,
            NOW,
        )
        .unwrap();
    let locked = builder
        .policy()
        .apply_time_bound_at(&intent, NOW + 86_400, None, NOW)
        .unwrap();
    let envelope = builder.sign(locked, &payer);

    let store = Arc::new(OfflineBatchStore::new(MemoryBackend::new()));
    let orchestrator = SubmissionOrchestrator::new(config, ledger.clone(), store.clone());
    let id = BatchId::new("time-locked").unwrap();
    store.put(&id, &[envelope]).unwrap();

    let report = orchestrator
        .submit_batch(&id, BatchControl::unbounded())
        .await
        .unwrap();
    assert_eq!(report.completion, BatchCompletion::AllAttempted);
    assert_eq!(
        report.items[0].status,
        ItemStatus::Failed {
            reason: "tx_too_early".into()
        }
    );
    assert_eq!(ledger.calls(), 1);
}

#[tokio::test]
async fn two_of_three_escrow_release() {
    let config = LedgerConfig::testnet();
    let builder = TransactionBuilder::new(config.clone());
    let escrow = keypair(9);
    let signers = [keypair(11), keypair(12), keypair(13)];
    let ledger = SimulatedLedger::new(&config, NOW);
    ledger.fund(escrow.account_id(), 4);

    let release = builder
        .build_at(
            escrow.account_id(),
            5,
            vec![payment(&builder, keypair(20).account_id(), "500")],
            Constraint::None,
            100,
            NOW,
        )
        .unwrap();
    let release = builder
        .policy()
        .apply_threshold(&release, signers.iter().map(|s| (s.account_id(), 1)), 2)
        .unwrap();

    let store = Arc::new(OfflineBatchStore::new(MemoryBackend::new()));
    let orchestrator = SubmissionOrchestrator::new(config, ledger.clone(), store);

    let one = builder.sign(release, &signers[0]);
    let err = orchestrator.submit_one(&one).await.unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::Validation(ValidationError::InsufficientSignatureWeight { have: 1, need: 2 })
    ));
    assert_eq!(ledger.calls(), 0, "must be refused before reaching the ledger");

    let two = builder.sign(one, &signers[1]);
    let result = orchestrator.submit_one(&two).await.unwrap();
    assert!(result.is_accepted());
    assert_eq!(ledger.calls(), 1);
}

#[test]
fn idempotent_re_signing() {
    let builder = TransactionBuilder::new(LedgerConfig::testnet());
    let payer = keypair(1);
    let envelope = signed_run(&builder, &payer, 1, 1).remove(0);
    let again = builder.sign(envelope.clone(), &payer);
    let again = builder.sign(again, &payer);
    assert_eq!(again.signatures.len(), 1);
    assert_eq!(again, envelope);
}

#[test]
fn codec_roundtrip_across_constraint_kinds() {
    let builder = TransactionBuilder::new(LedgerConfig::testnet());
    let payer = keypair(1);
    let issuer = keypair(2).account_id();
    let constraints = [
        Constraint::None,
        Constraint::time_bound(NOW, None),
        Constraint::time_bound(NOW + 10, Some(NOW + 3_600)),
        Constraint::threshold(vec![(payer.account_id(), 2), (issuer, 1)], 3),
    ];
    for (i, constraint) in constraints.into_iter().enumerate() {
        let intent = builder
            .build_at(
                payer.account_id(),
                i as u64 + 1,
                vec![
                    payment(&builder, keypair(3).account_id(), "0.0000001"),
                    PaymentOperation::new(
                        keypair(4).account_id(),
                        Asset::credit("AIDUSD", issuer).unwrap(),
                        builder.parse_amount(1, "922337203685.4775807").unwrap(),
                    ),
                ],
                constraint,
                100,
                NOW,
            )
            .unwrap();
        let envelope = builder.sign(intent, &payer);
        let bytes = EnvelopeCodec::encode(&envelope).unwrap();
        let (intent, signatures) = EnvelopeCodec::decode_parts(&bytes).unwrap();
        assert_eq!(intent, envelope.intent);
        assert_eq!(signatures, envelope.signatures);
    }
}

#[tokio::test]
async fn outage_midway_leaves_tail_pending_then_resumes() {
    let config = LedgerConfig::testnet();
    let builder = TransactionBuilder::new(config.clone());
    let payer = keypair(1);
    let ledger = SimulatedLedger::new(&config, NOW);
    ledger.fund(payer.account_id(), 0);
    *ledger.fail_after.lock() = Some(3);

    let dir = tempfile::tempdir().expect("tempdir");
    let id = BatchId::new("district-7").unwrap();
    {
        let store = OfflineBatchStore::new(SledBackend::open(dir.path()).unwrap());
        store.put(&id, &signed_run(&builder, &payer, 1, 6)).unwrap();
    }

    let store = Arc::new(OfflineBatchStore::new(
        SledBackend::open(dir.path()).unwrap(),
    ));
    let orchestrator = SubmissionOrchestrator::new(config, ledger.clone(), store.clone());

    let report = orchestrator
        .submit_batch(&id, BatchControl::unbounded())
        .await
        .unwrap();
    assert_eq!(report.completion, BatchCompletion::StoppedOnNetwork { index: 3 });
    for item in &report.items {
        if item.index < 3 {
            assert!(matches!(item.status, ItemStatus::Submitted { .. }));
        } else {
            assert_eq!(item.status, ItemStatus::Pending);
        }
    }
    assert!(matches!(
        report.items[3].outcome,
        Some(aidrail_protocol::submission::ItemOutcome::Ledger(
            SubmissionResult::NetworkUnavailable { .. }
        ))
    ));

    // Connectivity returns; only the tail is replayed, in order.
    *ledger.fail_after.lock() = None;
    ledger.online.store(true, Ordering::SeqCst);
    let report = orchestrator
        .submit_batch(&id, BatchControl::unbounded())
        .await
        .unwrap();
    assert_eq!(report.completion, BatchCompletion::AllAttempted);
    assert_eq!(report.attempted(), 3);
    assert!(report
        .items
        .iter()
        .all(|i| matches!(i.status, ItemStatus::Submitted { .. })));
    assert!(store.list_pending(&id).unwrap().is_empty());
}

#[tokio::test]
async fn ledger_rejection_does_not_block_siblings() {
    let config = LedgerConfig::testnet();
    let builder = TransactionBuilder::new(config.clone());
    let alice = keypair(1);
    let bob = keypair(2);
    let ledger = SimulatedLedger::new(&config, NOW);
    ledger.fund(alice.account_id(), 0);
    // Bob's account does not exist on the ledger.

    let mut envelopes = signed_run(&builder, &alice, 1, 1);
    envelopes.extend(signed_run(&builder, &bob, 1, 1));
    envelopes.extend(signed_run(&builder, &alice, 2, 1));

    let store = Arc::new(OfflineBatchStore::new(MemoryBackend::new()));
    let id = BatchId::new("mixed-sources").unwrap();
    store.put(&id, &envelopes).unwrap();
    let orchestrator = SubmissionOrchestrator::new(config, ledger.clone(), store);

    let report = orchestrator
        .submit_batch(&id, BatchControl::unbounded())
        .await
        .unwrap();
    let labels: Vec<_> = report.items.iter().map(|i| i.status.label()).collect();
    assert_eq!(labels, vec!["submitted", "failed", "submitted"]);
    assert_eq!(
        report.items[1].status,
        ItemStatus::Failed {
            reason: "tx_no_source_account".into()
        }
    );
}
