//! Randomness for mask keys and handshake nonces.
//!
//! Connections draw from a boxed [`Entropy`] so tests can swap the operating
//! system source for a deterministic one (see [`Config::with_mask_seed`]).
//!
//! [`Config::with_mask_seed`]: crate::Config::with_mask_seed

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;

/// Source of random bytes.
pub trait Entropy: Send {
    /// Fill `dest` with random bytes.
    fn fill_bytes(&mut self, dest: &mut [u8]);

    /// Draw a fresh 4-byte masking key.
    fn mask_key(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        self.fill_bytes(&mut key);
        key
    }
}

/// Operating system randomness via `getrandom`.
///
/// Falls back to a time-seeded generator if the OS source fails.
#[derive(Debug, Default)]
pub struct OsEntropy {
    fallback: Option<SeededEntropy>,
}

impl OsEntropy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Entropy for OsEntropy {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.fallback.is_none() {
            if getrandom::getrandom(dest).is_ok() {
                return;
            }
            tracing::warn!("OS randomness unavailable, using time-seeded generator");
        }
        self.fallback
            .get_or_insert_with(|| SeededEntropy::new(time_seed()))
            .fill_bytes(dest);
    }
}

fn time_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u32)
        .unwrap_or(0x1234_5678)
}

/// Deterministic generator: a Weyl counter passed through a 32-bit mixer.
///
/// Not cryptographically secure. Use for reproducible tests only.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    counter: u32,
}

impl SeededEntropy {
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { counter: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter.wrapping_mul(0x85EB_CA6B);
        let b = a ^ (a >> 13);
        b.wrapping_mul(0xC2B2_AE35)
    }
}

impl Entropy for SeededEntropy {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

/// The entropy source a connection built from `config` should use.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn Entropy> {
    match config.mask_seed {
        Some(seed) => Box::new(SeededEntropy::new(seed)),
        None => Box::new(OsEntropy::new()),
    }
}
