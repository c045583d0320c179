//! Account state and credential collaborators.
//!
//! The core never talks to the ledger's account API itself. It consumes an
//! [`AccountStateProvider`] for sequence numbers and balances and a
//! [`CredentialProvider`] for signing keys; callers plug in whatever backs
//! them (an HTTP client, a hardware signer, a test double).

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::crypto::{AccountId, AccountKeypair};
use crate::transaction::{Amount, Asset};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("account state unavailable: {0}")]
    Unavailable(String),

    #[error("sequence number of {0} is exhausted")]
    SequenceExhausted(AccountId),

    #[error("no credential registered under {0:?}")]
    UnknownCredential(String),
}

/// One asset balance held by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: Asset,
    pub amount: Amount,
}

/// Snapshot of an account as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub id: AccountId,
    /// Sequence number of the last transaction the account consumed.
    pub sequence: u64,
    pub balances: Vec<Balance>,
}

impl AccountState {
    pub fn balance(&self, asset: &Asset) -> Amount {
        self.balances
            .iter()
            .find(|b| &b.asset == asset)
            .map_or(Amount::ZERO, |b| b.amount)
    }
}

/// Read access to ledger account state.
#[async_trait]
pub trait AccountStateProvider: Send + Sync {
    async fn get_account(&self, id: &AccountId) -> Result<AccountState, AccountError>;
}

/// Sequence number the next transaction from `id` must carry.
pub async fn next_sequence<P>(provider: &P, id: &AccountId) -> Result<u64, AccountError>
where
    P: AccountStateProvider + ?Sized,
{
    let state = provider.get_account(id).await?;
    state
        .sequence
        .checked_add(1)
        .ok_or(AccountError::SequenceExhausted(*id))
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Supplies signing credentials by opaque reference.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self, reference: &str) -> Result<AccountKeypair, AccountError>;
}

/// In-memory credential store.
///
/// `Debug` lists references and public ids only.
#[derive(Default)]
pub struct Keyring {
    keys: RwLock<HashMap<String, AccountKeypair>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential, returning the one it replaced.
    pub fn insert(&self, reference: impl Into<String>, keypair: AccountKeypair) -> Option<AccountKeypair> {
        self.keys.write().insert(reference.into(), keypair)
    }

    pub fn remove(&self, reference: &str) -> Option<AccountKeypair> {
        self.keys.write().remove(reference)
    }

    pub fn account_id(&self, reference: &str) -> Option<AccountId> {
        self.keys.read().get(reference).map(AccountKeypair::account_id)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl CredentialProvider for Keyring {
    fn credential(&self, reference: &str) -> Result<AccountKeypair, AccountError> {
        self.keys
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| AccountError::UnknownCredential(reference.to_string()))
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys.read();
        let mut map = f.debug_map();
        for (reference, keypair) in keys.iter() {
            map.entry(reference, &keypair.account_id());
        }
        map.finish()
    }
}
