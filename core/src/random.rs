/*
 * random.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a pluggable mail delivery library.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Pseudorandom identifiers for Message-ID and MIME boundaries.
//!
//! Not a source of secrets: the generator is seeded from the clock and only has to keep
//! identifiers from colliding.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

static SHARED: OnceLock<Arc<IdGenerator>> = OnceLock::new();

/// Generator of fixed-length random strings. Safe to share between threads.
#[derive(Debug)]
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    /// New generator seeded from the current time.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::from_seed(nanos)
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Process-wide default, created on first use.
    pub fn shared() -> Arc<IdGenerator> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(IdGenerator::new())))
    }

    /// `length` characters from [`DEFAULT_ALPHABET`].
    pub fn generate(&self, length: usize) -> String {
        self.generate_with_alphabet(length, DEFAULT_ALPHABET)
    }

    /// `length` characters, each drawn uniformly (with replacement) from `alphabet`.
    /// An empty alphabet gives an empty string.
    pub fn generate_with_alphabet(&self, length: usize, alphabet: &str) -> String {
        let symbols: Vec<char> = alphabet.chars().collect();
        if symbols.is_empty() {
            return String::new();
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (0..length)
            .map(|_| symbols[rng.gen_range(0..symbols.len())])
            .collect()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn exact_length_from_alphabet() {
        let ids = IdGenerator::from_seed(7);
        for n in [0, 1, 15, 64] {
            let s = ids.generate(n);
            assert_eq!(s.chars().count(), n);
            assert!(s.chars().all(|c| DEFAULT_ALPHABET.contains(c)));
        }
        let s = ids.generate_with_alphabet(20, "xyz");
        assert_eq!(s.len(), 20);
        assert!(s.chars().all(|c| "xyz".contains(c)));
    }

    #[test]
    fn multibyte_alphabet_counts_characters() {
        let ids = IdGenerator::from_seed(1);
        let s = ids.generate_with_alphabet(10, "äöü");
        assert_eq!(s.chars().count(), 10);
    }

    #[test]
    fn empty_alphabet_is_empty() {
        assert_eq!(IdGenerator::from_seed(1).generate_with_alphabet(5, ""), "");
    }

    #[test]
    fn distribution_is_near_uniform() {
        let ids = IdGenerator::from_seed(42);
        let s = ids.generate_with_alphabet(40_000, "abcd");
        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in s.chars() {
            *counts.entry(c).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        for (c, n) in counts {
            // expected 10_000 each
            assert!((9_000..11_000).contains(&n), "{} drawn {} times", c, n);
        }
    }

    #[test]
    fn concurrent_use_is_safe() {
        let ids = IdGenerator::shared();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..200).map(|_| ids.generate(15)).collect::<Vec<_>>())
            })
            .collect();
        for h in handles {
            for id in h.join().unwrap() {
                assert_eq!(id.len(), 15);
            }
        }
    }
}
