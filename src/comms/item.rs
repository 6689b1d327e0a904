use std::fmt::Display;

use rand::Rng;

/// Opaque identifier transported through the buffer. The buffer never interprets it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item(pub u64);

impl Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Recipe a producer uses to derive item values: `worker * stride + sequence + rand(0..jitter)`.
///
/// Values from different workers overlap once `sequence + jitter` reaches `stride`; items
/// are not required to be unique.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ItemSynth {
    pub stride: u64,
    pub jitter: u64,
}

impl Default for ItemSynth {
    fn default() -> Self {
        Self {
            stride: 1000,
            jitter: 50,
        }
    }
}

impl ItemSynth {
    pub fn synthesize<R: Rng + ?Sized>(&self, worker: usize, sequence: u64, rng: &mut R) -> Item {
        let noise = if self.jitter == 0 {
            0
        } else {
            rng.gen_range(0..self.jitter)
        };
        Item((worker as u64) * self.stride + sequence + noise)
    }
}
