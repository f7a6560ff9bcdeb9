//! HyperLogLog member sketch.
//!
//! Conflict sets only need two things from their member sketch: an exact
//! answer to "is the cardinality still 1?" and a compact representation at
//! scale. The sketch therefore keeps an exact sparse set of 64-bit hashes
//! until it outgrows [`SPARSE_THRESHOLD`], then converts to dense
//! HyperLogLog registers. Hashing is keyless blake2, so every node computes
//! the same cardinality for the same members.

use std::collections::BTreeSet;

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

type Blake2b64 = Blake2b<U8>;

/// Register index bits. 2^12 registers ≈ 1.6% relative error when dense.
const PRECISION: u32 = 12;
/// Number of dense registers.
const REGISTERS: usize = 1 << PRECISION;
/// Sparse set size at which the sketch converts to dense registers.
const SPARSE_THRESHOLD: usize = 256;

fn hash64(data: &[u8]) -> u64 {
    let mut hasher = Blake2b64::new();
    hasher.update(data);
    u64::from_le_bytes(hasher.finalize().into())
}

/// Approximate-cardinality member sketch. Exact while sparse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hll {
    sparse: BTreeSet<u64>,
    dense: Option<Vec<u8>>,
}

impl Hll {
    pub fn new() -> Self {
        Self {
            sparse: BTreeSet::new(),
            dense: None,
        }
    }

    /// Add a member. Re-adding an existing member never changes the count.
    pub fn insert(&mut self, member: &[u8]) {
        let hash = hash64(member);
        match &mut self.dense {
            Some(registers) => Self::set_register(registers, hash),
            None => {
                self.sparse.insert(hash);
                if self.sparse.len() > SPARSE_THRESHOLD {
                    self.densify();
                }
            }
        }
    }

    /// Estimated number of distinct members. Exact while sparse.
    pub fn cardinality(&self) -> u64 {
        match &self.dense {
            None => self.sparse.len() as u64,
            Some(registers) => Self::estimate(registers),
        }
    }

    fn densify(&mut self) {
        let mut registers = vec![0u8; REGISTERS];
        for hash in &self.sparse {
            Self::set_register(&mut registers, *hash);
        }
        self.sparse.clear();
        self.dense = Some(registers);
    }

    fn set_register(registers: &mut [u8], hash: u64) {
        let index = (hash >> (64 - PRECISION)) as usize;
        let rest = hash << PRECISION;
        let rho = if rest == 0 {
            (64 - PRECISION + 1) as u8
        } else {
            (rest.leading_zeros() + 1) as u8
        };
        if rho > registers[index] {
            registers[index] = rho;
        }
    }

    fn estimate(registers: &[u8]) -> u64 {
        let m = REGISTERS as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);

        let mut inverse_sum = 0.0f64;
        let mut zeros = 0u64;
        for &register in registers {
            inverse_sum += 2f64.powi(-i32::from(register));
            if register == 0 {
                zeros += 1;
            }
        }

        let raw = alpha * m * m / inverse_sum;
        let corrected = if raw <= 2.5 * m && zeros > 0 {
            // Linear counting for the low range.
            m * (m / zeros as f64).ln()
        } else {
            raw
        };
        corrected.round() as u64
    }
}

impl Default for Hll {
    fn default() -> Self {
        Self::new()
    }
}
