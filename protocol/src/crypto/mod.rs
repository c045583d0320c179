//! # Cryptographic Primitives
//!
//! Thin, typed wrappers over `ed25519-dalek` and `sha2`. Nothing here is
//! home-grown: signing and hashing are delegated to audited crates.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_array, sha256_multi};
pub use keys::{AccountId, AccountKeypair, KeyError, Signature};
