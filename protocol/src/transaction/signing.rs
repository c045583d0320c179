//! Envelope signing with Ed25519 credentials.
//!
//! Signing is a separate step from building because the credential may not
//! be available at construction time: threshold escrows collect signatures
//! from several parties, possibly on different machines. Every signature
//! covers the network-bound [`TransactionIntent::hash`].

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::builder::TransactionIntent;
use crate::config::NetworkId;
use crate::crypto::{AccountId, AccountKeypair, Signature};

/// A signature tagged with the signer it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub signer: AccountId,
    /// Last four bytes of the signer's key.
    pub hint: [u8; 4],
    pub signature: Signature,
}

/// An intent plus the signatures collected for it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub intent: TransactionIntent,
    pub signatures: Vec<DecoratedSignature>,
}

impl Envelope {
    pub fn new(intent: TransactionIntent) -> Self {
        Self {
            intent,
            signatures: Vec::new(),
        }
    }

    pub fn hash(&self, network: &NetworkId) -> [u8; 32] {
        self.intent.hash(network)
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    pub fn is_signed_by(&self, signer: &AccountId) -> bool {
        self.signatures.iter().any(|s| &s.signer == signer)
    }

    /// Signers in the order their signatures were added.
    pub fn signers(&self) -> impl Iterator<Item = &AccountId> {
        self.signatures.iter().map(|s| &s.signer)
    }
}

impl From<TransactionIntent> for Envelope {
    fn from(intent: TransactionIntent) -> Self {
        Self::new(intent)
    }
}

/// Signs an envelope in place.
///
/// If `keypair` already has a signature on the envelope it is replaced
/// rather than duplicated, so repeated calls are idempotent.
pub fn sign_envelope<'a>(
    envelope: &'a mut Envelope,
    keypair: &AccountKeypair,
    network: &NetworkId,
) -> &'a Envelope {
    let signer = keypair.account_id();
    let decorated = DecoratedSignature {
        signer,
        hint: signer.hint(),
        signature: keypair.sign(&envelope.hash(network)),
    };

    match envelope.signatures.iter_mut().find(|s| s.signer == signer) {
        Some(existing) => *existing = decorated,
        None => envelope.signatures.push(decorated),
    }

    trace!(
        signer = %signer,
        signatures = envelope.signatures.len(),
        "signed envelope"
    );
    envelope
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
