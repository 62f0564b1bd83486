// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Deterministic seed stream made of successive primes
//!
//! Every trial draws its seed from this sequence, so a whole run is
//! reproducible from the starting floor alone.

use crate::error::SequenceExhausted;

/// Deterministic primality test by trial division over 6k +/- 1.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i: u64 = 5;
    while i <= n / i {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

#[derive(Debug, Clone)]
pub struct PrimeSequencer {
    /// Smallest candidate for the next call.
    cursor: u64,
    last: Option<u64>,
    limit: u64,
}

impl Default for PrimeSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimeSequencer {
    pub fn new() -> Self {
        Self::starting_at(2)
    }

    /// The first `next()` returns the smallest prime `>= floor`.
    pub fn starting_at(floor: u64) -> Self {
        Self {
            cursor: floor,
            last: None,
            limit: u64::MAX,
        }
    }

    /// Primes above `limit` are never handed out.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn next(&mut self) -> Result<u64, SequenceExhausted> {
        let exhausted = SequenceExhausted {
            last: self.last.unwrap_or(0),
            limit: self.limit,
        };

        let mut candidate = self.cursor;
        while !is_prime(candidate) {
            if candidate >= self.limit {
                return Err(exhausted);
            }
            candidate = candidate.checked_add(1).ok_or(exhausted)?;
        }
        if candidate > self.limit {
            return Err(exhausted);
        }

        self.last = Some(candidate);
        self.cursor = candidate.checked_add(1).unwrap_or(u64::MAX);
        Ok(candidate)
    }
}
