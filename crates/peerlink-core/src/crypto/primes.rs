// ============================================
// File: crates/peerlink-core/src/crypto/primes.rs
// ============================================
//! # Probabilistic Prime Search
//!
//! ## Creation Reason
//! RSA-style key generation needs large probable primes. Candidates are
//! drawn from a cryptographically secure source, screened against a
//! small-prime table, then accepted after a fixed number of Miller-Rabin
//! witness rounds.
//!
//! ## ⚠️ Important Note for Next Developer
//! - With [`MILLER_RABIN_ROUNDS`] rounds the failure probability is at
//!   most 4^-rounds per accepted candidate
//! - Candidates have their top bit forced so the product of two primes
//!   reaches the requested modulus size
//!
//! ## Last Modified
//! v0.1.0 - Initial prime search

use std::sync::OnceLock;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;

/// Miller-Rabin witness rounds per accepted candidate.
pub const MILLER_RABIN_ROUNDS: u32 = 10;

/// Upper bound of the small-prime screening table.
const SMALL_PRIME_LIMIT: usize = 10_000;

/// Sieve-backed table of small primes used to reject obvious composites.
fn small_primes() -> &'static [u64] {
    static TABLE: OnceLock<Vec<u64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut composite = vec![false; SMALL_PRIME_LIMIT + 1];
        let mut primes = Vec::new();
        for n in 2..=SMALL_PRIME_LIMIT {
            if composite[n] {
                continue;
            }
            primes.push(n as u64);
            let mut multiple = n * n;
            while multiple <= SMALL_PRIME_LIMIT {
                composite[multiple] = true;
                multiple += n;
            }
        }
        primes
    })
}

/// Draws a random odd candidate of exactly `bits` bits.
fn random_odd_candidate(bits: u64) -> BigUint {
    let mut candidate = OsRng.gen_biguint(bits);
    candidate.set_bit(bits - 1, true);
    candidate.set_bit(0, true);
    candidate
}

/// Screens a candidate against the small-prime table.
fn passes_small_primes(candidate: &BigUint) -> bool {
    for &p in small_primes() {
        let p = BigUint::from(p);
        if *candidate == p {
            return true;
        }
        if (candidate % &p).is_zero() {
            return false;
        }
    }
    true
}

/// Miller-Rabin probabilistic primality test.
///
/// Returns `true` if `n` passes `rounds` witness rounds.
#[must_use]
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    let one = BigUint::one();
    let two = &one + &one;

    if *n < two {
        return false;
    }
    if (n % &two).is_zero() {
        return *n == two;
    }
    // n = 3 leaves no witness range to sample from.
    if *n == &two + &one {
        return true;
    }

    // Write n - 1 as 2^r * s with s odd.
    let n_minus_one = n - &one;
    let mut s = n_minus_one.clone();
    let mut r = 0u64;
    while (&s % &two).is_zero() {
        s >>= 1;
        r += 1;
    }

    'witness: for _ in 0..rounds {
        let a = OsRng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&s, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Generates a probable prime of exactly `bits` bits.
///
/// Loops until a candidate survives the small-prime screen and
/// [`MILLER_RABIN_ROUNDS`] Miller-Rabin rounds.
#[must_use]
pub fn generate_prime(bits: u64) -> BigUint {
    loop {
        let candidate = random_odd_candidate(bits);
        if !passes_small_primes(&candidate) {
            continue;
        }
        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_prime_table() {
        let primes = small_primes();
        assert_eq!(primes[0], 2);
        assert_eq!(primes[1], 3);
        assert!(primes.contains(&9973));
        assert!(!primes.contains(&9999));
    }

    #[test]
    fn test_known_primes() {
        for p in [2u64, 3, 5, 7, 65537, 2_147_483_647] {
            assert!(is_probable_prime(&BigUint::from(p), MILLER_RABIN_ROUNDS), "{p}");
        }
    }

    #[test]
    fn test_known_composites() {
        for c in [1u64, 4, 100, 65535, 561, 41041] {
            assert!(!is_probable_prime(&BigUint::from(c), MILLER_RABIN_ROUNDS), "{c}");
        }
    }

    #[test]
    fn test_generated_prime_size_and_primality() {
        let prime = generate_prime(96);
        assert_eq!(prime.bits(), 96);
        assert!(is_probable_prime(&prime, MILLER_RABIN_ROUNDS));
    }
}
