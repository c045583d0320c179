//! # Envelope Codec
//!
//! Binary and base64 encoding of [`Envelope`]s for offline transport and
//! storage.
//!
//! ## Wire Layout
//!
//! ```text
//! +-------+---------+----------------------+----------+
//! | magic | version | body                 | checksum |
//! | AENV  | 1 byte  | bincode (fixint, LE) | 4 bytes  |
//! +-------+---------+----------------------+----------+
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over everything before
//! it. Decoding is strict: unknown versions, trailing bytes and oversized
//! bodies are all rejected as [`CodecError::MalformedEnvelope`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bincode::Options;
use thiserror::Error;

use crate::config::{ENVELOPE_CHECKSUM_LEN, ENVELOPE_MAGIC, ENVELOPE_VERSION, MAX_ENVELOPE_BYTES};
use crate::crypto::hash::truncated_checksum;
use crate::transaction::{DecoratedSignature, Envelope, TransactionIntent};

const HEADER_LEN: usize = ENVELOPE_MAGIC.len() + 1;

/// Codec failures. Never retried: the bytes are simply wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("envelope could not be encoded: {0}")]
    Encoding(String),
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedEnvelope(reason.into())
}

fn body_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENVELOPE_BYTES)
        .reject_trailing_bytes()
}

/// Stateless encoder/decoder for envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encodes an envelope into its framed binary form.
    pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        let body = body_options()
            .serialize(envelope)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + body.len() + ENVELOPE_CHECKSUM_LEN);
        out.extend_from_slice(&ENVELOPE_MAGIC);
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&body);
        let checksum: [u8; ENVELOPE_CHECKSUM_LEN] = truncated_checksum(&out);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Encodes an intent together with a signature list.
    pub fn encode_parts(
        intent: &TransactionIntent,
        signatures: &[DecoratedSignature],
    ) -> Result<Vec<u8>, CodecError> {
        Self::encode(&Envelope {
            intent: intent.clone(),
            signatures: signatures.to_vec(),
        })
    }

    /// Decodes and validates a framed envelope.
    pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
        if bytes.len() < HEADER_LEN + ENVELOPE_CHECKSUM_LEN {
            return Err(malformed(format!("truncated: {} bytes", bytes.len())));
        }
        if bytes[..ENVELOPE_MAGIC.len()] != ENVELOPE_MAGIC {
            return Err(malformed("bad magic"));
        }
        let version = bytes[ENVELOPE_MAGIC.len()];
        if version != ENVELOPE_VERSION {
            return Err(malformed(format!("unsupported version {}", version)));
        }

        let (framed, checksum) = bytes.split_at(bytes.len() - ENVELOPE_CHECKSUM_LEN);
        let expected: [u8; ENVELOPE_CHECKSUM_LEN] = truncated_checksum(framed);
        if checksum != expected {
            return Err(malformed("checksum mismatch"));
        }

        body_options()
            .deserialize(&framed[HEADER_LEN..])
            .map_err(|e| malformed(e.to_string()))
    }

    /// Decodes into the `(intent, signatures)` pair.
    pub fn decode_parts(
        bytes: &[u8],
    ) -> Result<(TransactionIntent, Vec<DecoratedSignature>), CodecError> {
        let envelope = Self::decode(bytes)?;
        Ok((envelope.intent, envelope.signatures))
    }

    /// Base64 text form used for storage and transport.
    pub fn encode_base64(envelope: &Envelope) -> Result<String, CodecError> {
        Ok(BASE64.encode(Self::encode(envelope)?))
    }

    pub fn decode_base64(text: &str) -> Result<Envelope, CodecError> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|e| malformed(format!("base64: {}", e)))?;
        Self::decode(&bytes)
    }
}
