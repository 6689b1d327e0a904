//! Produced/consumed counters shared by every worker of a run.
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{AcqRel, Acquire};

/// Counters for items produced and consumed, each updated with a single atomic RMW.
///
/// A `Tally` is created by the orchestrator for one run and handed to every worker
/// behind an `Arc`; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct Tally {
    produced: AtomicU64,
    consumed: AtomicU64,
}

/// Point-in-time view of a `Tally`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    pub produced: u64,
    pub consumed: u64,
}

impl TallySnapshot {
    /// Items produced but not yet consumed.
    pub fn in_flight(&self) -> u64 {
        self.produced.saturating_sub(self.consumed)
    }
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_produced(&self) -> u64 {
        self.produced.fetch_add(1, AcqRel) + 1
    }

    pub fn increment_consumed(&self) -> u64 {
        self.consumed.fetch_add(1, AcqRel) + 1
    }

    /// Each counter is read atomically; the pair is not read under one lock.
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            produced: self.produced.load(Acquire),
            consumed: self.consumed.load(Acquire),
        }
    }
}
