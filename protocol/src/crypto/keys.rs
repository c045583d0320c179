//! # Key Management
//!
//! Ed25519 keypairs and account identifiers.
//!
//! An [`AccountId`] is the public half of an account: the 32-byte Ed25519
//! verifying key, rendered as base58 for humans. An [`AccountKeypair`] is
//! the signing credential that belongs to it.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Secret bytes are never logged; `Debug` prints the public id only.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* something failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid account id: not a valid Ed25519 public key")]
    InvalidAccountId,

    #[error("invalid signature bytes")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// AccountKeypair
// ---------------------------------------------------------------------------

/// A signing credential for a ledger account.
///
/// Intentionally does NOT implement `Serialize`. Exporting a secret key is
/// a deliberate act: use [`secret_key_hex`](Self::secret_key_hex).
pub struct AccountKeypair {
    signing_key: SigningKey,
}

impl AccountKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// The public account identifier for this credential.
    pub fn account_id(&self) -> AccountId {
        AccountId(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.account_id().verify(message, signature)
    }

    /// Hex export of the 32 secret bytes. Handle with care.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Clone for AccountKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for AccountKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKeypair(pub={})", self.account_id())
    }
}

impl PartialEq for AccountKeypair {
    /// Keypairs compare by public key; secret bytes are never compared.
    fn eq(&self, other: &Self) -> bool {
        self.account_id() == other.account_id()
    }
}

impl Eq for AccountKeypair {}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Public identifier of a ledger account (an Ed25519 verifying key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Validating constructor: the bytes must decode to a curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidAccountId)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Last four bytes of the key. The ledger uses them to match signatures
    /// to signers without shipping whole keys around.
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.0[28..]);
        hint
    }

    /// Base58 rendering used in plans, logs and the CLI.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Verify a signature made by this account.
    ///
    /// Returns `false` rather than an error; callers only want a yes/no.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        key.verify(message, &DalekSignature::from_bytes(&signature.0))
            .is_ok()
    }
}

impl FromStr for AccountId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidAccountId)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidAccountId)?;
        Self::from_bytes(arr)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_base58();
        write!(f, "AccountId({}..)", &b58[..b58.len().min(8)])
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; 64] = slice.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// serde only derives arrays up to 32 elements, so go through a byte vector.
impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
        Signature::try_from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = AccountKeypair::generate();
        let sig = kp.sign(b"pay 10 units");
        assert!(kp.verify(b"pay 10 units", &sig));
        assert!(!kp.verify(b"pay 11 units", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = AccountKeypair::generate();
        let kp2 = AccountKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.account_id().verify(b"message", &sig));
    }

    #[test]
    fn account_id_base58_roundtrip() {
        let id = AccountKeypair::generate().account_id();
        let parsed: AccountId = id.to_base58().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn garbage_account_id_rejected() {
        assert_eq!(
            "not-base58-0OIl".parse::<AccountId>(),
            Err(KeyError::InvalidAccountId)
        );
        // Valid base58, wrong length.
        assert!("3mJr7AoUXx2Wqd".parse::<AccountId>().is_err());
    }

    #[test]
    fn secret_hex_roundtrip() {
        let kp = AccountKeypair::generate();
        let restored = AccountKeypair::from_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(kp, restored);
        assert!(AccountKeypair::from_hex("deadbeef").is_err());
    }

    #[test]
    fn deterministic_from_seed() {
        let a = AccountKeypair::from_seed(&[7u8; 32]);
        let b = AccountKeypair::from_seed(&[7u8; 32]);
        assert_eq!(a.account_id(), b.account_id());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn hint_is_key_suffix() {
        let id = AccountKeypair::generate().account_id();
        assert_eq!(&id.hint()[..], &id.as_bytes()[28..]);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = AccountKeypair::from_seed(&[9u8; 32]);
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("AccountKeypair(pub="));
        assert!(!debug_str.contains(&kp.secret_key_hex()));
    }

    #[test]
    fn signature_serde_roundtrip() {
        let sig = AccountKeypair::generate().sign(b"serde");
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }
}
