//! deterministic randomness derived from consensus data
//!
//! Every replica executing the same step computes the same seed from the
//! previous commit hash and the current transaction bytes, so drawings need
//! no communication round. Never feed wall-clock time or OS entropy in here.

use crate::context::Context;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// sha256(entropy || tx_bytes || be64(index)?), read as a big-endian u64 from
/// digest bytes 8..16
pub fn derive_seed(entropy: &[u8], tx_bytes: &[u8], index: Option<u64>) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(entropy);
    hasher.update(tx_bytes);
    if let Some(i) = index {
        hasher.update(i.to_be_bytes());
    }
    let hash = hasher.finalize();

    let mut window = [0u8; 8];
    window.copy_from_slice(&hash[8..16]);
    u64::from_be_bytes(window)
}

/// Seeded generator for ticket ids and winner selection
#[derive(Clone, Debug)]
pub struct DrawRng(ChaCha8Rng);

impl DrawRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Generator for the current step (block hook or transaction)
    pub fn from_context(ctx: &Context<'_>) -> Self {
        Self::from_seed(derive_seed(ctx.last_commit_hash(), ctx.tx_bytes(), None))
    }

    /// Generator decorrelated by `index`, for items minted within one transaction
    pub fn from_context_and_index(ctx: &Context<'_>, index: u64) -> Self {
        Self::from_seed(derive_seed(ctx.last_commit_hash(), ctx.tx_bytes(), Some(index)))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    /// Uniform index in `0..n`; `None` when `n == 0`.
    ///
    /// Draws are rejected above the largest multiple of `n` so the result is
    /// `v % n` for the first accepted draw `v`, without modulo bias.
    pub fn intn(&mut self, n: u64) -> Option<u64> {
        if n == 0 {
            return None;
        }
        let zone = u64::MAX - (u64::MAX % n + 1) % n;
        loop {
            let v = self.next_u64();
            if v <= zone {
                return Some(v % n);
            }
        }
    }

    /// Pick one element uniformly
    pub fn choose<'t, T>(&mut self, items: &'t [T]) -> Option<&'t T> {
        let i = self.intn(items.len() as u64)?;
        items.get(i as usize)
    }

    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
}
