//! SimHash fingerprinting: a 64-bit locality-sensitive summary of a
//! molecule's text, used to detect near-duplicate content (spec §4.2).

use serde::{Deserialize, Serialize};

/// 64-bit SimHash fingerprint. Hamming distance between two fingerprints
/// correlates with the semantic distance between the molecules they
/// summarize; distance 0 means bit-identical shingled content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Hamming distance: XOR + POPCNT, two instructions on modern hardware.
    #[inline]
    pub fn hamming_distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Whether `self` and `other` are near-duplicates under `threshold`
    /// (spec §4.2 default threshold is 5; the gravity fuser's union-find
    /// dedup pass uses this).
    pub fn is_near_duplicate(self, other: Self, threshold: u32) -> bool {
        self.hamming_distance(other) <= threshold
    }
}

/// Computes SimHash fingerprints over lowercased, punctuation-split tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimHasher;

impl SimHasher {
    pub fn new() -> Self {
        Self
    }

    /// Compute the fingerprint of `text`.
    ///
    /// Tokenize: lowercase, split on whitespace and punctuation. For each
    /// token: hash with FNV-1a, then for each of the 64 bit positions add +1
    /// or -1 to an accumulator depending on that bit. After all tokens,
    /// collapse accumulators: positive → 1, else → 0.
    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            return Fingerprint(self.fnv1a(lowered.as_bytes()));
        }

        let mut acc = [0i32; 64];
        for token in &tokens {
            let hash = self.fnv1a(token.as_bytes());
            for (i, slot) in acc.iter_mut().enumerate() {
                if hash & (1u64 << i) != 0 {
                    *slot += 1;
                } else {
                    *slot -= 1;
                }
            }
        }

        let mut fp: u64 = 0;
        for (i, &val) in acc.iter().enumerate() {
            if val > 0 {
                fp |= 1u64 << i;
            }
        }
        Fingerprint(fp)
    }

    /// Pairwise Hamming distances between `target` and each of `others`,
    /// in order — used by the fuser's dedup pass to bucket near-duplicates.
    pub fn batch_hamming(target: Fingerprint, others: &[Fingerprint]) -> Vec<u32> {
        others.iter().map(|&o| target.hamming_distance(o)).collect()
    }

    #[inline]
    fn fnv1a(&self, data: &[u8]) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        for &b in data {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }
}
