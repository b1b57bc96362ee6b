//! Simple tabulation hashing for 32bit node ids.
//!
//! A key is split into slices, each slice is looked up in its own table
//! and the results are combined with xor.
//! Every table is a random permutation of its value range, created once from a seed.
//! The same hash serves as bucket function for the open addressing heap index storage
//! and as deterministic tie breaker between nodes with equal contraction priority.

use crate::datastr::graph::NodeId;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Seed for tables which do not need to be decorrelated from anything else.
pub const DEFAULT_SEED: u64 = 0x5eed_c0de;

/// Hash from 32bit ids to 16bit values using two tables over the lower and upper half of the key.
#[derive(Debug, Clone)]
pub struct TabulationHash {
    lower: Box<[u16]>,
    upper: Box<[u16]>,
}

impl Default for TabulationHash {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl TabulationHash {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        TabulationHash {
            lower: shuffled_identity(u16::MAX as usize + 1, &mut rng).into_iter().map(|x| x as u16).collect(),
            upper: shuffled_identity(u16::MAX as usize + 1, &mut rng).into_iter().map(|x| x as u16).collect(),
        }
    }

    #[inline(always)]
    pub fn hash(&self, key: u32) -> u16 {
        self.lower[(key & 0xffff) as usize] ^ self.upper[(key >> 16) as usize]
    }
}

/// Smaller variant with four tables over the bytes of the key, hashing to 8bit values.
#[derive(Debug, Clone)]
pub struct MiniTabulationHash {
    tables: [[u8; 256]; 4],
}

impl Default for MiniTabulationHash {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl MiniTabulationHash {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tables = [[0u8; 256]; 4];
        for table in &mut tables {
            for (slot, value) in table.iter_mut().zip(shuffled_identity(256, &mut rng)) {
                *slot = value as u8;
            }
        }
        MiniTabulationHash { tables }
    }

    #[inline(always)]
    pub fn hash(&self, key: u32) -> u8 {
        let [b0, b1, b2, b3] = key.to_le_bytes();
        self.tables[0][b0 as usize] ^ self.tables[1][b1 as usize] ^ self.tables[2][b2 as usize] ^ self.tables[3][b3 as usize]
    }
}

fn shuffled_identity(n: usize, rng: &mut StdRng) -> Vec<u32> {
    let mut values: Vec<u32> = (0..n as u32).collect();
    values.shuffle(rng);
    values
}

/// Deterministic, pseudo random total order on node ids.
/// Used to decide between nodes with numerically identical priorities
/// without favouring nodes with small ids.
#[derive(Debug, Clone)]
pub struct TieBreaker {
    hash: TabulationHash,
}

impl TieBreaker {
    pub fn new(seed: u64) -> Self {
        TieBreaker { hash: TabulationHash::new(seed) }
    }

    /// Should `a` win against `b`? Compares hashes and falls back to the ids on collisions.
    #[inline]
    pub fn bias(&self, a: NodeId, b: NodeId) -> bool {
        let hash_a = self.hash.hash(a);
        let hash_b = self.hash.hash(b);
        if hash_a != hash_b {
            hash_a < hash_b
        } else {
            a < b
        }
    }
}
