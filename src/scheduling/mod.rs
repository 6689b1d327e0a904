//! Workers that drive the shared buffer, and the orchestrator that runs them.
//!
//! Each `Producer` and `Consumer` runs on its own OS thread until it has completed its
//! quota of successful operations. `Orchestrator` validates a `RunConfig`, spawns the
//! workers around one `BoundedBuffer` and one `Tally`, and collects the `RunReport`.
use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    comms::{buffer::BoundedBuffer, item::Item},
    logging::{
        report::Role,
        tally::{Tally, TallySnapshot},
    },
};

pub mod orchestrator;
pub mod pacing;
pub mod worker;

/// Handles every worker of a run shares.
#[derive(Debug, Clone)]
pub struct Station {
    pub buffer: Arc<BoundedBuffer<Item>>,
    pub tally: Arc<Tally>,
}

impl Station {
    pub fn new(buffer: BoundedBuffer<Item>) -> Self {
        Self {
            buffer: Arc::new(buffer),
            tally: Arc::new(Tally::new()),
        }
    }

    /// Tally and buffer length read in one critical section.
    ///
    /// Workers bump the tally from the buffer's commit hook, so here
    /// `snapshot.in_flight() == len` holds at every instant of a run, not just at the end.
    pub fn observe(&self) -> (TallySnapshot, usize) {
        self.buffer.observe(|len| (self.tally.snapshot(), len))
    }
}

/// RNG for one worker. A run seed gives every (role, id) its own reproducible stream,
/// stable across builds and toolchains.
pub fn worker_rng(seed: Option<u64>, role: Role, id: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(stream_seed(seed, role, id)),
        None => StdRng::from_entropy(),
    }
}

/// Distinct for every (role, id) under one run seed: the id sits above the role bit.
fn stream_seed(seed: u64, role: Role, id: usize) -> u64 {
    let role_bit = match role {
        Role::Producer => 0,
        Role::Consumer => 1,
    };
    seed ^ (((id as u64) << 1) | role_bit)
}

/// Lifecycle of a worker: it runs until its quota is met.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Done,
}
