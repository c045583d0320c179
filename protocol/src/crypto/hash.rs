//! # Hashing Utilities
//!
//! SHA-256 is the only hash the ledger understands, so it is the only one
//! we ship. It is used for three things:
//!
//! - the **network id** (`sha256(passphrase)`),
//! - the **transaction hash** every signature commits to,
//! - the truncated **envelope checksum** the codec appends to each envelope.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use aidrail_protocol::crypto::sha256;
///
/// let hash = sha256(b"aidrail");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 over several slices without concatenating them first.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// First `N` bytes of the SHA-256 of `data`.
pub fn truncated_checksum<const N: usize>(data: &[u8]) -> [u8; N] {
    let full = sha256_array(data);
    let mut out = [0u8; N];
    out.copy_from_slice(&full[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn array_and_vec_agree() {
        let data = b"aid distribution";
        assert_eq!(sha256(data), sha256_array(data).to_vec());
    }

    #[test]
    fn multi_equals_concatenation() {
        let joined = sha256_array(b"helloworld");
        let parts = sha256_multi(&[b"hello", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn checksum_is_prefix() {
        let data = b"envelope";
        let check: [u8; 4] = truncated_checksum(data);
        assert_eq!(&check[..], &sha256_array(data)[..4]);
    }
}
