// ============================================
// File: crates/peerlink-core/src/protocol/envelope.rs
// ============================================
//! # Envelope Codec
//!
//! ## Creation Reason
//! Every post-handshake message travels as an envelope of three
//! independently enciphered fields: kind, target and payload. This
//! module owns the framing and the hybrid sealing scheme.
//!
//! ## Main Functionality
//! - `Envelope`: frame/deframe around two reserved separators
//! - `seal_body`/`open_body`: fresh combined key encrypts the field,
//!   the exported key is asymmetrically wrapped and appended after a
//!   fixed separator, so field size is not bounded by the modulus
//!
//! ## Main Logical Flow
//! 1. Sender seals payload for the final recipient, kind and target for
//!    the relay server
//! 2. Server deciphers kind and target only, re-seals them for the
//!    recipient and forwards the payload untouched
//! 3. Recipient opens all fields with its private key
//!
//! ## ⚠️ Important Note for Next Developer
//! - The separators are long reserved sequences; ciphertext is treated
//!   as unable to reproduce them (a collision corrupts the frame)
//! - The hybrid join is body-first: `body $$$$ wrapped-key`
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope codec

use bytes::Bytes;

use crate::crypto::combined::{find_sequence, CombinedKey, Pad, PaddingSpec};
use crate::crypto::{AsymmetricCipher, AsymmetricDecipher};
use crate::error::{CoreError, Result};

// ============================================
// Wire Constants
// ============================================

/// Separates the kind field from the target field.
pub const SEPARATOR_KIND_TARGET: &[u8] = b"type_targ_sepLnpEwEljZi";

/// Separates the target field from the payload field.
pub const SEPARATOR_TARGET_PAYLOAD: &[u8] = b"targ_data_sepcLkGqydgGY";

/// Separates a sealed body from its wrapped symmetric key.
pub const HYBRID_SEPARATOR: &[u8] = b"$$$$";

/// Envelope kinds reserved by the handshake protocol.
pub mod kinds {
    /// Client's public key during the handshake.
    pub const KEY: &[u8] = b"key";
    /// Credential pair during the handshake.
    pub const LOGIN: &[u8] = b"login";
    /// Directory broadcast.
    pub const DIRECTORY: &[u8] = b"keys";
    /// Authentication rejected.
    pub const REJECTED: &[u8] = b"Rejected";
}

/// Targets reserved by the handshake protocol.
pub mod targets {
    /// Addressed to the server itself.
    pub const SERVER: &[u8] = b"Server";
    /// Addressed to the connected client.
    pub const CLIENT: &[u8] = b"Client";
}

/// Padding ranges for sealed envelope fields.
const SEAL_PAD_RANGES: ((usize, usize), (usize, usize)) = ((2, 10), (2, 10));

// ============================================
// Envelope
// ============================================

/// One framed protocol message; fields hold enciphered bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Message kind (enciphered for whoever must route it).
    pub kind: Bytes,
    /// Routing target (enciphered).
    pub target: Bytes,
    /// Application payload (sealed for the final recipient).
    pub payload: Bytes,
}

impl Envelope {
    /// Builds an envelope from already-enciphered fields.
    pub fn new(
        kind: impl Into<Bytes>,
        target: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            payload: payload.into(),
        }
    }

    /// Frames the envelope for the wire.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(
            self.kind.len()
                + SEPARATOR_KIND_TARGET.len()
                + self.target.len()
                + SEPARATOR_TARGET_PAYLOAD.len()
                + self.payload.len(),
        );
        out.extend_from_slice(&self.kind);
        out.extend_from_slice(SEPARATOR_KIND_TARGET);
        out.extend_from_slice(&self.target);
        out.extend_from_slice(SEPARATOR_TARGET_PAYLOAD);
        out.extend_from_slice(&self.payload);
        Bytes::from(out)
    }

    /// Splits a wire frame back into its three fields.
    ///
    /// # Errors
    /// `Envelope` if either separator is missing.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let first = find_sequence(frame, SEPARATOR_KIND_TARGET)
            .ok_or_else(|| CoreError::envelope("kind/target separator missing"))?;
        let kind = &frame[..first];
        let rest = &frame[first + SEPARATOR_KIND_TARGET.len()..];

        let second = find_sequence(rest, SEPARATOR_TARGET_PAYLOAD)
            .ok_or_else(|| CoreError::envelope("target/payload separator missing"))?;
        let target = &rest[..second];
        let payload = &rest[second + SEPARATOR_TARGET_PAYLOAD.len()..];

        Ok(Self::new(
            kind.to_vec(),
            target.to_vec(),
            payload.to_vec(),
        ))
    }
}

// ============================================
// Hybrid Sealing
// ============================================

/// Seals a field for `recipient`: a fresh combined key encrypts the
/// data under randomized padding, and the exported key is wrapped with
/// the recipient's public key.
///
/// # Errors
/// Propagates cipher failures, including oversized key wrapping.
pub fn seal_body<C: AsymmetricCipher>(data: &[u8], recipient: &C) -> Result<Vec<u8>> {
    let key = CombinedKey::generate()?;
    let spec = PaddingSpec::new(SEAL_PAD_RANGES.0, SEAL_PAD_RANGES.1)?;
    let body = Pad::new(key.clone(), spec).encrypt(data)?;
    let wrapped = recipient.encrypt(&key.export(), true)?;

    let mut out = Vec::with_capacity(body.len() + HYBRID_SEPARATOR.len() + wrapped.len());
    out.extend_from_slice(&body);
    out.extend_from_slice(HYBRID_SEPARATOR);
    out.extend_from_slice(&wrapped);
    Ok(out)
}

/// Opens a sealed field with the local private key.
///
/// # Errors
/// `Envelope` if the hybrid separator is missing; cipher and unpad
/// failures pass through.
pub fn open_body<D: AsymmetricDecipher>(data: &[u8], key: &D) -> Result<Vec<u8>> {
    let separator = find_sequence(data, HYBRID_SEPARATOR)
        .ok_or_else(|| CoreError::envelope("hybrid separator missing"))?;
    let body = &data[..separator];
    let wrapped = &data[separator + HYBRID_SEPARATOR.len()..];

    let exported = key.decrypt(wrapped, true)?;
    let combined = CombinedKey::import(&exported)?;
    let spec = PaddingSpec::new(SEAL_PAD_RANGES.0, SEAL_PAD_RANGES.1)?;
    Pad::new(combined, spec).decrypt(body)
}

/// Seals all three fields of an envelope for one recipient.
///
/// Kinds are short reserved words, so the kind is enciphered directly
/// with the recipient's public key; target and payload go through the
/// hybrid scheme.
///
/// # Errors
/// Propagates cipher failures from any field.
pub fn seal_envelope<C: AsymmetricCipher>(
    kind: &[u8],
    target: &[u8],
    payload: &[u8],
    recipient: &C,
) -> Result<Envelope> {
    Ok(Envelope::new(
        recipient.encrypt(kind, true)?,
        seal_body(target, recipient)?,
        seal_body(payload, recipient)?,
    ))
}

/// Opens all three fields of an envelope with the local private key.
///
/// # Errors
/// Propagates cipher and framing failures from any field.
pub fn open_envelope<D: AsymmetricDecipher>(
    envelope: &Envelope,
    key: &D,
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    Ok((
        key.decrypt(&envelope.kind, true)?,
        open_body(&envelope.target, key)?,
        open_body(&envelope.payload, key)?,
    ))
}

// ============================================
// Tests
// ============================================
