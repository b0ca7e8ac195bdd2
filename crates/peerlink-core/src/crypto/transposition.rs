// ============================================
// File: crates/peerlink-core/src/crypto/transposition.rs
// ============================================
//! # Keyed Columnar Transposition
//!
//! ## Creation Reason
//! The symmetric scheme scrambles byte positions with a columnar
//! transposition keyed by the ranking of distinct key byte values.
//!
//! ## Main Functionality
//! - Key validation: ≥2 distinct bytes with at least one descent
//! - Ranged key generation with regeneration until a descent exists
//! - Encrypt/decrypt as per-chunk rank permutations with a configurable
//!   repeat count
//!
//! ## Main Logical Flow
//! Bytes are grouped into columns by key position and read back in
//! key-byte order, which is equivalent to permuting each key-sized chunk
//! by the rank table of the key; the final short chunk permutes by the
//! rank table of the key prefix of the same length.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A key without a descent is the identity permutation and must be
//!   rejected, otherwise the "cipher" does nothing
//!
//! ## Last Modified
//! v0.1.0 - Initial transposition cipher

use std::fmt;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::error::{CoreError, Result};

/// Keyed byte-position permutation.
#[derive(Clone, PartialEq, Eq)]
pub struct TranspositionKey {
    key: Vec<u8>,
}

impl TranspositionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// `KeyImport` for keys shorter than two bytes, `RepeatingKeyByte`
    /// for duplicate values, `NoEffectKey` when no later byte is smaller
    /// than an earlier one.
    pub fn new(key: Vec<u8>) -> Result<Self> {
        if key.len() < 2 {
            return Err(CoreError::key_import(
                "transposition key must be at least 2 bytes",
            ));
        }

        let mut seen = [false; 256];
        let mut descents = 0usize;
        let mut previous = 0u8;
        for (index, &value) in key.iter().enumerate() {
            if seen[value as usize] {
                return Err(CoreError::RepeatingKeyByte { value });
            }
            seen[value as usize] = true;
            if index > 0 && value < previous {
                descents += 1;
            }
            previous = value;
        }
        if descents == 0 {
            return Err(CoreError::NoEffectKey);
        }

        Ok(Self { key })
    }

    /// Generates a key whose length is drawn from `min_len..max_len`,
    /// regenerating until the key contains a descent.
    ///
    /// # Errors
    /// `KeyImport` if the range is not within `2..=257` or empty.
    pub fn generate(min_len: usize, max_len: usize) -> Result<Self> {
        if min_len < 2 || max_len > 257 || min_len >= max_len {
            return Err(CoreError::key_import(
                "transposition key length range must lie within 2..=257",
            ));
        }

        let length = OsRng.gen_range(min_len..max_len);
        loop {
            let mut seen = [false; 256];
            let mut key = Vec::with_capacity(length);
            while key.len() < length {
                let mut buf = [0u8; 16];
                OsRng.fill_bytes(&mut buf);
                for value in buf {
                    if key.len() == length {
                        break;
                    }
                    if !seen[value as usize] {
                        seen[value as usize] = true;
                        key.push(value);
                    }
                }
            }
            let has_descent = key.windows(2).any(|w| w[1] < w[0]);
            if has_descent {
                return Self::new(key);
            }
        }
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Encrypts by applying the chunk permutation `times` times.
    ///
    /// # Errors
    /// `NotTransformed` if the output equals the input.
    pub fn encrypt(&self, data: &[u8], times: usize) -> Result<Vec<u8>> {
        let mut out = data.to_vec();
        for _ in 0..times {
            out = self.permute(&out, Direction::Forward);
        }
        if out == data {
            return Err(CoreError::NotTransformed);
        }
        Ok(out)
    }

    /// Decrypts by applying the inverse permutation `times` times.
    #[must_use]
    pub fn decrypt(&self, data: &[u8], times: usize) -> Vec<u8> {
        let mut out = data.to_vec();
        for _ in 0..times {
            out = self.permute(&out, Direction::Inverse);
        }
        out
    }

    /// One permutation pass over all key-sized chunks.
    fn permute(&self, data: &[u8], direction: Direction) -> Vec<u8> {
        let k = self.key.len();
        let mut out = vec![0u8; data.len()];
        for (chunk_index, chunk) in data.chunks(k).enumerate() {
            let start = chunk_index * k;
            let ranks = rank_table(&self.key[..chunk.len()]);
            for (j, &byte) in chunk.iter().enumerate() {
                match direction {
                    Direction::Forward => out[start + ranks[j]] = byte,
                    Direction::Inverse => out[start + j] = data[start + ranks[j]],
                }
            }
        }
        out
    }
}

impl fmt::Debug for TranspositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranspositionKey")
            .field("len", &self.key.len())
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Inverse,
}

/// Rank of each key byte among the (distinct) key bytes.
fn rank_table(key: &[u8]) -> Vec<usize> {
    let mut sorted = key.to_vec();
    sorted.sort_unstable();
    key.iter()
        .map(|b| sorted.binary_search(b).expect("key bytes are distinct"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_rejected() {
        assert!(TranspositionKey::new(vec![5]).is_err());
    }

    #[test]
    fn test_repeating_key_rejected() {
        let err = TranspositionKey::new(vec![3, 9, 3]).unwrap_err();
        assert!(matches!(err, CoreError::RepeatingKeyByte { value: 3 }));
    }

    #[test]
    fn test_no_descent_key_rejected() {
        let err = TranspositionKey::new(vec![1, 2, 3, 200]).unwrap_err();
        assert!(matches!(err, CoreError::NoEffectKey));
    }

    #[test]
    fn test_roundtrip_exact_chunks() {
        let key = TranspositionKey::new(vec![30, 10, 20]).unwrap();
        let data = b"abcdefghi";
        let cipher = key.encrypt(data, 1).unwrap();
        assert_ne!(cipher, data);
        assert_eq!(key.decrypt(&cipher, 1), data);
    }

    #[test]
    fn test_roundtrip_partial_final_chunk() {
        let key = TranspositionKey::new(vec![9, 1, 8, 2, 7]).unwrap();
        for len in 1u8..32 {
            let data: Vec<u8> = (0..len).collect();
            match key.encrypt(&data, 1) {
                Ok(cipher) => assert_eq!(key.decrypt(&cipher, 1), data, "len {len}"),
                // Inputs shorter than any descent position pass through
                // unchanged and are reported as untransformed.
                Err(CoreError::NotTransformed) => assert!(len <= 1, "len {len}"),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_roundtrip_multiple_rounds() {
        let key = TranspositionKey::new(vec![200, 100, 150, 50]).unwrap();
        let data = b"round and round the permutation goes";
        let cipher = key.encrypt(data, 3).unwrap();
        assert_eq!(key.decrypt(&cipher, 3), data);
    }

    #[test]
    fn test_uniform_input_not_transformed() {
        let key = TranspositionKey::new(vec![30, 10, 20]).unwrap();
        let err = key.encrypt(&[7u8; 12], 1).unwrap_err();
        assert!(matches!(err, CoreError::NotTransformed));
    }

    #[test]
    fn test_generated_keys_valid() {
        for _ in 0..16 {
            let key = TranspositionKey::generate(4, 100).unwrap();
            assert!(key.as_bytes().len() >= 4 && key.as_bytes().len() < 100);
            // Revalidation exercises the descent and uniqueness checks.
            assert!(TranspositionKey::new(key.as_bytes().to_vec()).is_ok());
        }
    }

    #[test]
    fn test_generate_range_validation() {
        assert!(TranspositionKey::generate(1, 10).is_err());
        assert!(TranspositionKey::generate(4, 4).is_err());
        assert!(TranspositionKey::generate(4, 300).is_err());
    }
}
