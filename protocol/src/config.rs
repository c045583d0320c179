//! # Ledger Configuration & Constants
//!
//! Every magic number the orchestration layer relies on lives here, next to
//! [`LedgerConfig`], the explicit configuration value handed to the builder,
//! the constraint policy and the submission orchestrator. There is no
//! process-wide configuration: two orchestrators pointed at two different
//! networks can live side by side in the same process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::crypto::hash::sha256_array;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Passphrase of the public test network. Signatures are bound to the
/// SHA-256 of the passphrase, so an envelope signed for testnet is worthless
/// on any other network.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Passphrase of the public main network.
pub const MAINNET_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

// ---------------------------------------------------------------------------
// Amounts & Fees
// ---------------------------------------------------------------------------

/// Number of fractional digits in the ledger's fixed-point amount format.
pub const AMOUNT_DECIMALS: u32 = 7;

/// Smallest indivisible units ("stroops") per whole unit of an asset.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Minimum fee per operation, in stroops.
pub const BASE_FEE_STROOPS: u32 = 100;

/// Maximum number of operations the ledger accepts in a single transaction.
pub const MAX_OPERATIONS_PER_TX: usize = 100;

/// Longest custom asset code the ledger accepts (alphanum12).
pub const MAX_ASSET_CODE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Envelope Wire Format
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every encoded envelope.
pub const ENVELOPE_MAGIC: [u8; 4] = *b"AENV";

/// Current envelope format version. Bump on any change to the body layout.
pub const ENVELOPE_VERSION: u8 = 1;

/// Length of the truncated SHA-256 checksum trailing every envelope.
pub const ENVELOPE_CHECKSUM_LEN: usize = 4;

/// Upper bound on a decoded envelope body. Protects the decoder against
/// hostile length prefixes.
pub const MAX_ENVELOPE_BYTES: u64 = 256 * 1024;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long a single submission may take before it is treated as a
/// connectivity failure.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default expiry window for intents without an explicit upper time bound.
/// `0` disables the implicit expiry.
pub const DEFAULT_EXPIRY_WINDOW_SECS: u64 = 0;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Explicit, serializable configuration for everything that talks about a
/// particular ledger network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Network passphrase; hashed into every transaction signature.
    #[serde(default = "default_passphrase")]
    pub network_passphrase: String,

    /// Minimum fee per operation accepted by the builder, in stroops.
    #[serde(default = "default_base_fee")]
    pub base_fee: u32,

    /// Maximum number of payment operations per transaction.
    #[serde(default = "default_max_operations")]
    pub max_operations_per_tx: usize,

    /// How far in the past (seconds) a time bound's lower edge may lie.
    #[serde(default)]
    pub time_bound_skew_secs: u64,

    /// Implicit expiry applied at build time to intents without an upper
    /// time bound. `0` disables it.
    #[serde(default = "default_expiry_window")]
    pub expiry_window_secs: u64,

    /// Per-envelope submission timeout in milliseconds.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
}

fn default_passphrase() -> String {
    TESTNET_PASSPHRASE.to_string()
}
fn default_base_fee() -> u32 {
    BASE_FEE_STROOPS
}
fn default_max_operations() -> usize {
    MAX_OPERATIONS_PER_TX
}
fn default_expiry_window() -> u64 {
    DEFAULT_EXPIRY_WINDOW_SECS
}
fn default_submit_timeout_ms() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT.as_millis() as u64
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

impl LedgerConfig {
    /// Configuration for the public test network.
    pub fn testnet() -> Self {
        Self {
            network_passphrase: default_passphrase(),
            base_fee: default_base_fee(),
            max_operations_per_tx: default_max_operations(),
            time_bound_skew_secs: 0,
            expiry_window_secs: default_expiry_window(),
            submit_timeout_ms: default_submit_timeout_ms(),
        }
    }

    /// Configuration for the public main network.
    pub fn mainnet() -> Self {
        Self {
            network_passphrase: MAINNET_PASSPHRASE.to_string(),
            ..Self::testnet()
        }
    }

    /// Returns a copy bound to a different network passphrase.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.network_passphrase = passphrase.into();
        self
    }

    /// SHA-256 of the network passphrase.
    pub fn network_id(&self) -> NetworkId {
        NetworkId(sha256_array(self.network_passphrase.as_bytes()))
    }

    /// Submission timeout as a `Duration`.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// 32-byte network identifier mixed into every transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub [u8; 32]);

impl NetworkId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroops_match_decimals() {
        assert_eq!(STROOPS_PER_UNIT, 10i64.pow(AMOUNT_DECIMALS));
    }

    #[test]
    fn default_is_testnet() {
        let config = LedgerConfig::default();
        assert_eq!(config.network_passphrase, TESTNET_PASSPHRASE);
        assert_eq!(config.base_fee, BASE_FEE_STROOPS);
        assert_eq!(config.time_bound_skew_secs, 0);
    }

    #[test]
    fn network_ids_differ_between_networks() {
        assert_ne!(
            LedgerConfig::testnet().network_id(),
            LedgerConfig::mainnet().network_id()
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"network_passphrase":"private net"}"#).unwrap();
        assert_eq!(config.network_passphrase, "private net");
        assert_eq!(config.max_operations_per_tx, MAX_OPERATIONS_PER_TX);
        assert_eq!(config.submit_timeout(), DEFAULT_SUBMIT_TIMEOUT);
    }
}
