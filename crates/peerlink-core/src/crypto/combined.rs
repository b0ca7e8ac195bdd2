// ============================================
// File: crates/peerlink-core/src/crypto/combined.rs
// ============================================
//! # Combined Symmetric Key and Sentinel Padding
//!
//! ## Creation Reason
//! A single symmetric unit for the envelope scheme: the autokey stream
//! cipher composed with the columnar transposition, plus randomized
//! pre/post padding so identical payloads never produce identical
//! ciphertext sizes.
//!
//! ## Main Functionality
//! - `CombinedKey`: autokey stream → transposition on encrypt, inverse
//!   order on decrypt, configurable transposition rounds
//! - Export/import as `v_key=<bytes>|-|t_key=<bytes>`
//! - `Pad`: sentinel-framed random filler around the composed cipher
//!
//! ## ⚠️ Important Note for Next Developer
//! - The 5-byte sentinel must appear exactly twice after decryption;
//!   any other count means corruption and fails the unpad
//! - Export carries no round count; imported keys use one round
//!
//! ## Last Modified
//! v0.1.0 - Initial combined key

use std::fmt;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::crypto::stream::StreamKey;
use crate::crypto::transposition::TranspositionKey;
use crate::crypto::SymmetricCipher;
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Marks the start and end of the payload inside the padded frame.
pub const PAD_SENTINEL: &[u8] = b"\x02\x02pad";

/// Label introducing the stream key in an export.
const STREAM_LABEL: &[u8] = b"v_key=";

/// Label introducing the transposition key in an export.
const TRANSPOSITION_LABEL: &[u8] = b"t_key=";

/// Separates the two key halves in an export.
const EXPORT_SEPARATOR: &[u8] = b"|-|";

/// Label introducing the filler ranges in a pad export.
const PAD_LABEL: &[u8] = b"pad=";

/// Stream key length used for freshly generated combined keys.
const STREAM_KEY_LEN: usize = 32;

/// Transposition key length range for freshly generated combined keys.
const TRANSPOSITION_RANGE: (usize, usize) = (4, 32);

// ============================================
// CombinedKey
// ============================================

/// Autokey stream cipher composed with a columnar transposition.
#[derive(Clone)]
pub struct CombinedKey {
    stream: StreamKey,
    transposition: TranspositionKey,
    rounds: usize,
}

impl CombinedKey {
    /// Combines a stream key and a transposition key (one round).
    #[must_use]
    pub const fn new(stream: StreamKey, transposition: TranspositionKey) -> Self {
        Self {
            stream,
            transposition,
            rounds: 1,
        }
    }

    /// Sets the transposition repeat count.
    #[must_use]
    pub const fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = if rounds == 0 { 1 } else { rounds };
        self
    }

    /// Generates a fresh combined key.
    ///
    /// Sized so an exported key always fits the hybrid envelope's
    /// asymmetric wrapping for moduli of 1024 bits and up.
    ///
    /// # Errors
    /// Propagates transposition key generation failures.
    pub fn generate() -> Result<Self> {
        let stream = StreamKey::generate(STREAM_KEY_LEN);
        let transposition =
            TranspositionKey::generate(TRANSPOSITION_RANGE.0, TRANSPOSITION_RANGE.1)?;
        Ok(Self::new(stream, transposition))
    }

    /// Encrypts: autokey stream first, then the transposition.
    ///
    /// # Errors
    /// `NotTransformed` if the composition failed to change the input.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let streamed = self.stream.encrypt_autokey(data);
        self.transposition.encrypt(&streamed, self.rounds)
    }

    /// Decrypts in the inverse order.
    ///
    /// # Errors
    /// Currently infallible, kept fallible for the cipher seam.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let untransposed = self.transposition.decrypt(data, self.rounds);
        Ok(self.stream.decrypt_autokey(&untransposed))
    }

    /// Exports as `v_key=<bytes>|-|t_key=<bytes>`.
    #[must_use]
    pub fn export(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            STREAM_LABEL.len()
                + self.stream.as_bytes().len()
                + EXPORT_SEPARATOR.len()
                + TRANSPOSITION_LABEL.len()
                + self.transposition.as_bytes().len(),
        );
        out.extend_from_slice(STREAM_LABEL);
        out.extend_from_slice(self.stream.as_bytes());
        out.extend_from_slice(EXPORT_SEPARATOR);
        out.extend_from_slice(TRANSPOSITION_LABEL);
        out.extend_from_slice(self.transposition.as_bytes());
        out
    }

    /// Imports an exported combined key (one round).
    ///
    /// # Errors
    /// `KeyImport` on malformed structure; key validation errors pass
    /// through.
    pub fn import(bytes: &[u8]) -> Result<Self> {
        let separator = find_sequence(bytes, EXPORT_SEPARATOR)
            .ok_or_else(|| CoreError::key_import("combined key separator missing"))?;
        let (stream_part, rest) = bytes.split_at(separator);
        let transposition_part = &rest[EXPORT_SEPARATOR.len()..];

        let stream_bytes = stream_part
            .strip_prefix(STREAM_LABEL)
            .ok_or_else(|| CoreError::key_import("stream key label missing"))?;
        let transposition_bytes = transposition_part
            .strip_prefix(TRANSPOSITION_LABEL)
            .ok_or_else(|| CoreError::key_import("transposition key label missing"))?;

        Ok(Self::new(
            StreamKey::new(stream_bytes.to_vec())?,
            TranspositionKey::new(transposition_bytes.to_vec())?,
        ))
    }
}

impl fmt::Debug for CombinedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedKey")
            .field("stream", &self.stream)
            .field("transposition", &self.transposition)
            .field("rounds", &self.rounds)
            .finish()
    }
}

impl SymmetricCipher for CombinedKey {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Self::encrypt(self, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Self::decrypt(self, ciphertext)
    }
}

// ============================================
// PaddingSpec
// ============================================

/// Random filler length ranges for both ends of the padded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaddingSpec {
    begin: (usize, usize),
    end: (usize, usize),
}

impl PaddingSpec {
    /// Creates a spec from `(min, max)` ranges for each end.
    ///
    /// # Errors
    /// `Padding` unless `min >= 1` and `min < max` on both ends.
    pub fn new(begin: (usize, usize), end: (usize, usize)) -> Result<Self> {
        for (name, (min, max)) in [("begin", begin), ("end", end)] {
            if min < 1 || min >= max {
                return Err(CoreError::padding(format!(
                    "{name} range must satisfy 1 <= min < max"
                )));
            }
        }
        Ok(Self { begin, end })
    }

    /// Draws a fresh begin-filler length.
    fn draw_begin(&self) -> usize {
        OsRng.gen_range(self.begin.0..self.begin.1)
    }

    /// Draws a fresh end-filler length.
    fn draw_end(&self) -> usize {
        OsRng.gen_range(self.end.0..self.end.1)
    }
}

impl Default for PaddingSpec {
    fn default() -> Self {
        Self {
            begin: (10, 30),
            end: (10, 30),
        }
    }
}

// ============================================
// Pad
// ============================================

/// Sentinel-framed randomized padding around a [`CombinedKey`].
#[derive(Clone, Debug)]
pub struct Pad {
    key: CombinedKey,
    spec: PaddingSpec,
}

impl Pad {
    /// Wraps a combined key with a padding spec.
    #[must_use]
    pub const fn new(key: CombinedKey, spec: PaddingSpec) -> Self {
        Self { key, spec }
    }

    /// Wraps a combined key with the default `(10, 30)` ranges.
    #[must_use]
    pub fn with_default_spec(key: CombinedKey) -> Self {
        Self::new(key, PaddingSpec::default())
    }

    /// Pads with fresh random filler on both ends and encrypts.
    ///
    /// # Errors
    /// Propagates cipher failures.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let begin = self.spec.draw_begin();
        let end = self.spec.draw_end();

        let mut framed = Vec::with_capacity(begin + end + data.len() + 2 * PAD_SENTINEL.len());
        framed.extend_from_slice(&random_bytes(begin));
        framed.extend_from_slice(PAD_SENTINEL);
        framed.extend_from_slice(data);
        framed.extend_from_slice(PAD_SENTINEL);
        framed.extend_from_slice(&random_bytes(end));

        self.key.encrypt(&framed)
    }

    /// Decrypts and strips the filler.
    ///
    /// # Errors
    /// `Unpad` unless the sentinel appears exactly twice.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let plain = self.key.decrypt(data)?;
        let parts = split_on(&plain, PAD_SENTINEL);
        if parts.len() != 3 {
            return Err(CoreError::Unpad { parts: parts.len() });
        }
        Ok(parts[1].to_vec())
    }

    /// Exports the key together with the filler ranges, appending
    /// `|-|pad=<min>,<max>,<min>,<max>` to the key export.
    #[must_use]
    pub fn export(&self) -> Vec<u8> {
        let mut out = self.key.export();
        out.extend_from_slice(EXPORT_SEPARATOR);
        out.extend_from_slice(PAD_LABEL);
        out.extend_from_slice(
            format!(
                "{},{},{},{}",
                self.spec.begin.0, self.spec.begin.1, self.spec.end.0, self.spec.end.1
            )
            .as_bytes(),
        );
        out
    }

    /// Imports an exported pad, restoring the key and the ranges.
    ///
    /// # Errors
    /// `KeyImport` on malformed structure; range and key validation
    /// errors pass through.
    pub fn import(bytes: &[u8]) -> Result<Self> {
        // The key export contains the separator too; the pad section is
        // the one after the LAST occurrence.
        let separator = rfind_sequence(bytes, EXPORT_SEPARATOR)
            .ok_or_else(|| CoreError::key_import("pad export separator missing"))?;
        let (key_part, rest) = bytes.split_at(separator);
        let pad_part = rest[EXPORT_SEPARATOR.len()..]
            .strip_prefix(PAD_LABEL)
            .ok_or_else(|| CoreError::key_import("pad range label missing"))?;

        let text = std::str::from_utf8(pad_part)
            .map_err(|_| CoreError::key_import("pad ranges are not valid UTF-8"))?;
        let bounds: Vec<usize> = text
            .split(',')
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| CoreError::key_import("pad ranges are not numbers"))?;
        let [b_min, b_max, e_min, e_max] = bounds[..] else {
            return Err(CoreError::key_import("pad export needs four range bounds"));
        };

        Ok(Self::new(
            CombinedKey::import(key_part)?,
            PaddingSpec::new((b_min, b_max), (e_min, e_max))?,
        ))
    }
}

impl SymmetricCipher for Pad {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Self::encrypt(self, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Self::decrypt(self, ciphertext)
    }
}

// ============================================
// Helpers
// ============================================

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_sequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle` in `haystack`.
fn rfind_sequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Splits on every non-overlapping occurrence of `separator`.
fn split_on<'a>(data: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = data;
    while let Some(pos) = find_sequence(rest, separator) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + separator.len()..];
    }
    parts.push(rest);
    parts
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    OsRng.fill_bytes(&mut out);
    out
}

// ============================================
// Tests
// ============================================
