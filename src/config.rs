//! Run parameters, presets, and their validation into per-worker quotas.
use std::time::Duration;

use crate::{
    comms::item::ItemSynth,
    scheduling::pacing::{DelayRange, Pacing},
    sync::Discipline,
    PileError,
};

/// What to do when the target does not split evenly across a worker pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RemainderPolicy {
    /// Refuse the configuration.
    #[default]
    Reject,
    /// Floor-divide the target and declare the resulting effective totals.
    Truncate,
}

/// Per-worker quotas derived from a validated `RunConfig`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Quotas {
    pub per_producer: u64,
    pub per_consumer: u64,
    pub produced_total: u64,
    pub consumed_total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub target: u64,
    pub discipline: Discipline,
    pub pacing: Pacing,
    pub synth: ItemSynth,
    pub remainder: RemainderPolicy,
    /// Fixes every worker's RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Upper bound on waiting for the workers. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::blocking_preset()
    }
}

impl RunConfig {
    /// 8 slots, 3 producers, 2 consumers, 24 items, permit-blocking workers.
    pub fn blocking_preset() -> Self {
        Self {
            capacity: 8,
            producers: 3,
            consumers: 2,
            target: 24,
            discipline: Discipline::Blocking,
            pacing: Pacing {
                produce: DelayRange::from_millis(50, 125),
                consume: DelayRange::from_millis(80, 200),
                produce_backoff: DelayRange::ZERO,
                consume_backoff: DelayRange::ZERO,
            },
            synth: ItemSynth {
                stride: 1000,
                jitter: 50,
            },
            remainder: RemainderPolicy::Reject,
            seed: None,
            deadline: None,
        }
    }

    /// 12 slots, 3 producers, 2 consumers, 30 items, polling workers.
    pub fn polling_preset() -> Self {
        Self {
            capacity: 12,
            producers: 3,
            consumers: 2,
            target: 30,
            discipline: Discipline::Polling,
            pacing: Pacing {
                produce: DelayRange::from_millis(60, 140),
                consume: DelayRange::from_millis(90, 200),
                produce_backoff: DelayRange::fixed(Duration::from_millis(15)),
                consume_backoff: DelayRange::fixed(Duration::from_millis(20)),
            },
            synth: ItemSynth {
                stride: 10_000,
                jitter: 999,
            },
            remainder: RemainderPolicy::Reject,
            seed: None,
            deadline: None,
        }
    }

    pub fn preset(discipline: Discipline) -> Self {
        match discipline {
            Discipline::Polling => Self::polling_preset(),
            Discipline::Blocking => Self::blocking_preset(),
        }
    }

    /// Checks every parameter and derives the quotas.
    ///
    /// Besides shape checks this rejects runs that could never finish: consumers that
    /// expect more than producers make, or a production surplus the buffer cannot hold.
    pub fn validate(&self) -> Result<Quotas, PileError> {
        if self.capacity == 0 {
            return Err(PileError::ZeroCapacity);
        }
        for (count, what) in [(self.producers, "producer"), (self.consumers, "consumer")] {
            if count == 0 {
                return Err(PileError::InvalidParameter {
                    description: format!("{what} count must be greater than 0"),
                });
            }
        }
        if self.target == 0 {
            return Err(PileError::InvalidParameter {
                description: "target item count must be greater than 0".to_string(),
            });
        }
        self.pacing.validate()?;

        let producers = self.producers as u64;
        let consumers = self.consumers as u64;
        if self.target < producers.max(consumers) {
            return Err(PileError::InvalidParameter {
                description: format!(
                    "target of {} leaves some of the {} producers / {} consumers without work",
                    self.target, self.producers, self.consumers
                ),
            });
        }

        let uneven = self.target % producers != 0 || self.target % consumers != 0;
        if uneven && self.remainder == RemainderPolicy::Reject {
            return Err(PileError::UnbalancedQuota {
                target: self.target,
                producers: self.producers,
                consumers: self.consumers,
            });
        }

        let per_producer = self.target / producers;
        let per_consumer = self.target / consumers;
        let quotas = Quotas {
            per_producer,
            per_consumer,
            produced_total: per_producer * producers,
            consumed_total: per_consumer * consumers,
        };

        if quotas.produced_total < quotas.consumed_total {
            return Err(PileError::StarvationRisk {
                reason: format!(
                    "consumers expect {} items but producers only make {}",
                    quotas.consumed_total, quotas.produced_total
                ),
            });
        }
        let surplus = quotas.produced_total - quotas.consumed_total;
        if surplus > self.capacity as u64 {
            return Err(PileError::StarvationRisk {
                reason: format!(
                    "{surplus} unconsumed items cannot fit in a buffer of {}",
                    self.capacity
                ),
            });
        }
        Ok(quotas)
    }
}
