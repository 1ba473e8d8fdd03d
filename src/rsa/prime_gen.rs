use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use chrono::Local;
use log::{debug, info, warn};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Miller-Rabin rounds used when the caller does not pick a value.
pub const DEFAULT_CONFIDENCE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrimeError {
    #[error("Prime size must be a positive multiple of 8 bits, got {0}")]
    InvalidBits(usize),
    #[error("All search workers stopped without recording a prime")]
    NoResult,
}

pub fn fast_modular_exponent(a: &BigUint, q: &BigUint, n: &BigUint) -> BigUint {
    let mut a = a % n;
    let mut q = q.clone();
    let mut r = BigUint::one() % n;
    while !q.is_zero() {
        if q.bit(0) { r = (r * &a) % n; }
        q >>= 1;
        a = (&a * &a) % n;
    }
    r
}

/// Miller-Rabin test with `confidence` random bases drawn from the OS generator.
///
/// Meant for odd values of at least 5. Smaller or even inputs are answered by
/// inspection instead of sampling, since `[2, value - 2]` is empty for them.
pub fn is_probably_prime(value: &BigUint, confidence: u32) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    if *value < BigUint::from(5u32) {
        return *value == two || *value == BigUint::from(3u32);
    }
    if !value.bit(0) { return false; }
    let value_minus_one = value - &one;
    let upper = value - &two;
    let mut d = value_minus_one.clone();
    let mut s = 0u32;
    while !d.bit(0) {
        d >>= 1;
        s += 1;
    }
    let mut rng = OsRng;
    for _ in 0..confidence {
        let mut a = BigUint::zero();
        while a < two || a > upper {
            a = rng.gen_biguint(value.bits());
        }
        let mut x = fast_modular_exponent(&a, &d, value);
        if x.is_one() || x == value_minus_one { continue; }
        // all s - 1 squarings run even after value - 1 shows up
        let mut reached = false;
        for _ in 1..s {
            x = (&x * &x) % value;
            if x == value_minus_one { reached = true; }
        }
        if !reached { return false; }
    }
    true
}

/// First `count` primes, found by trial division against the primes already collected.
pub fn small_primes(count: usize) -> Vec<u32> {
    let mut primes = vec![2, 3];
    let mut current = 5u32;
    while primes.len() < count {
        if primes.iter().all(|p| current % p != 0) {
            primes.push(current);
        }
        current += 2;
    }
    primes.truncate(count);
    primes
}

#[derive(Default)]
struct SearchState {
    found: AtomicBool,
    result: Mutex<Option<BigUint>>,
}

impl SearchState {
    fn is_found(&self) -> bool {
        self.found.load(Ordering::Acquire)
    }

    /// Records `prime` unless another worker got there first.
    fn offer(&self, prime: BigUint) -> bool {
        let mut slot = self.result.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() { return false; }
        *slot = Some(prime);
        self.found.store(true, Ordering::Release);
        true
    }

    fn take(&self) -> Option<BigUint> {
        self.result.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[derive(Debug, Clone)]
pub struct PrimeSearch {
    pub threads: usize,
    pub rounds: u32,
}

impl Default for PrimeSearch {
    fn default() -> Self {
        Self::new(num_cpus::get(), DEFAULT_CONFIDENCE)
    }
}

impl PrimeSearch {
    pub fn new(threads: usize, rounds: u32) -> Self {
        Self { threads: threads.max(1), rounds }
    }

    /// Blocks until one of `self.threads` workers finds a probable prime of exactly `bits` bits.
    pub fn find_prime(&self, bits: usize) -> Result<BigUint, PrimeError> {
        if bits == 0 || bits % 8 != 0 {
            return Err(PrimeError::InvalidBits(bits));
        }
        let sieve = Arc::new(small_primes(bits * 2));
        let state = Arc::new(SearchState::default());
        let start = Local::now().timestamp_millis();
        let handles = (0..self.threads).map(|_| {
            let (sieve, state) = (sieve.clone(), state.clone());
            let rounds = self.rounds;
            thread::spawn(move || search_worker(bits, &sieve, rounds, &state))
        }).collect::<Vec<_>>();
        let mut tries = 0;
        for handle in handles {
            match handle.join() {
                Ok(n) => tries += n,
                Err(_) => warn!("A {}-bit prime search worker panicked", bits),
            }
        }
        let prime = state.take().ok_or(PrimeError::NoResult)?;
        info!("Done {}-bit prime in {} tries after {} ms on {} threads",
            bits, tries, Local::now().timestamp_millis() - start, self.threads);
        Ok(prime)
    }
}

/// Draws candidates until the shared flag is set, returns how many it drew.
fn search_worker(bits: usize, sieve: &[u32], rounds: u32, state: &SearchState) -> u64 {
    let mut rng = OsRng;
    let mut bytes = vec![0u8; bits / 8];
    let mut tries = 0;
    while !state.is_found() {
        rng.fill_bytes(&mut bytes);
        bytes[0] |= 0x80;
        let candidate = BigUint::from_bytes_be(&bytes);
        tries += 1;
        if sieve.iter().any(|p| (&candidate % *p).is_zero()) { continue; }
        if is_probably_prime(&candidate, rounds) && state.offer(candidate) {
            debug!("Worker {:?} recorded the prime after {} tries", thread::current().id(), tries);
        }
    }
    tries
}

#[cfg(test)]
mod tests {
    use std::thread;
    use num_bigint::BigUint;
    use num_traits::One;
    use super::*;

    fn trial_division(n: u64) -> bool {
        if n < 2 { return false; }
        let mut i = 2;
        while i * i <= n {
            if n % i == 0 { return false; }
            i += 1;
        }
        true
    }

    #[test]
    fn test_small_primes() {
        assert_eq!(small_primes(10), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(small_primes(32).last(), Some(&131));
        assert_eq!(small_primes(1), vec![2]);
    }

    #[test]
    fn test_fast_modular_exponent() {
        let (a, q, n) = (BigUint::from(4u32), BigUint::from(13u32), BigUint::from(497u32));
        assert_eq!(fast_modular_exponent(&a, &q, &n), BigUint::from(445u32));
        let a = BigUint::from(0xdeadbeefu64);
        let q = BigUint::from(65537u32);
        let n = BigUint::from(1_000_000_007u64);
        assert_eq!(fast_modular_exponent(&a, &q, &n), a.modpow(&q, &n));
        assert!(fast_modular_exponent(&a, &q, &BigUint::one()).is_zero());
    }

    #[test]
    fn test_miller_rabin_matches_trial_division() {
        for n in (5u64..5000).step_by(2) {
            assert_eq!(is_probably_prime(&BigUint::from(n), DEFAULT_CONFIDENCE), trial_division(n), "n = {}", n);
        }
    }

    #[test]
    fn test_miller_rabin_carmichael() {
        for n in [561u32, 1105, 1729, 2465, 2821, 6601, 8911, 41041, 825265] {
            assert!(!is_probably_prime(&BigUint::from(n), DEFAULT_CONFIDENCE), "{} is composite", n);
        }
    }

    #[test]
    fn test_miller_rabin_large() {
        let m61 = (BigUint::one() << 61usize) - 1u32;
        let m89 = (BigUint::one() << 89usize) - 1u32;
        let m67 = (BigUint::one() << 67usize) - 1u32;
        assert!(is_probably_prime(&m61, DEFAULT_CONFIDENCE));
        assert!(is_probably_prime(&m89, DEFAULT_CONFIDENCE));
        assert!(!is_probably_prime(&m67, DEFAULT_CONFIDENCE));
        assert!(!is_probably_prime(&(&m61 * &m89), DEFAULT_CONFIDENCE));
        // 1 mod 4 primes need the squaring phase to pass
        assert!(is_probably_prime(&BigUint::from(1_000_000_009u64), DEFAULT_CONFIDENCE));
        assert!(is_probably_prime(&BigUint::from(65537u32), DEFAULT_CONFIDENCE));
    }

    #[test]
    fn test_miller_rabin_tiny_inputs() {
        for (n, expect) in [(0u32, false), (1, false), (2, true), (3, true), (4, false), (10, false)] {
            assert_eq!(is_probably_prime(&BigUint::from(n), DEFAULT_CONFIDENCE), expect);
        }
    }

    #[test]
    fn test_find_prime_16() -> Result<(), PrimeError> {
        let search = PrimeSearch::new(4, DEFAULT_CONFIDENCE);
        for _ in 0..8 {
            let prime = search.find_prime(16)?;
            assert_eq!(prime.bits(), 16);
            let n = prime.to_u64_digits()[0];
            assert!((1 << 15..1 << 16).contains(&n));
            assert!(trial_division(n), "{} is not prime", n);
        }
        Ok(())
    }

    #[test]
    fn test_find_prime_bit_length() -> Result<(), PrimeError> {
        let search = PrimeSearch::default();
        for bits in [8, 24, 64, 256] {
            let prime = search.find_prime(bits)?;
            assert_eq!(prime.bits(), bits as u64);
            assert!(is_probably_prime(&prime, DEFAULT_CONFIDENCE));
        }
        Ok(())
    }

    #[test]
    fn test_find_prime_invalid_bits() {
        let search = PrimeSearch::new(2, DEFAULT_CONFIDENCE);
        assert_eq!(search.find_prime(0), Err(PrimeError::InvalidBits(0)));
        assert_eq!(search.find_prime(12), Err(PrimeError::InvalidBits(12)));
    }

    #[test]
    fn test_concurrent_searches() {
        let handles = (0..2).map(|_| thread::spawn(|| PrimeSearch::new(3, DEFAULT_CONFIDENCE).find_prime(16)))
            .collect::<Vec<_>>();
        for handle in handles {
            let prime = handle.join().unwrap().unwrap();
            let n = prime.to_u64_digits()[0];
            assert!((1 << 15..1 << 16).contains(&n));
            assert!(is_probably_prime(&prime, DEFAULT_CONFIDENCE));
        }
    }

    #[test]
    fn test_first_offer_wins() {
        let state = SearchState::default();
        assert!(!state.is_found());
        assert!(state.offer(BigUint::from(7u32)));
        assert!(!state.offer(BigUint::from(11u32)));
        assert!(state.is_found());
        assert_eq!(state.take(), Some(BigUint::from(7u32)));
    }
}
