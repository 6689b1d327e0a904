//! Bounded producer/consumer coordination.
//!
//! A fixed-capacity FIFO (`comms::buffer::BoundedBuffer`) is shared by any number of
//! producer and consumer threads. Workers wait on a full/empty buffer with one of two
//! disciplines (`sync::Discipline`): polling with a randomized backoff, or blocking until
//! the buffer signals room or an item. The `scheduling` module holds the workers and the
//! orchestrator that runs them to quota; `logging` holds the shared tallies and the final
//! run report.
use std::{fmt::Display, time::Duration};

use thiserror::Error;

pub mod comms;
pub mod config;
pub mod logging;
pub mod scheduling;
pub mod sync;

/// Wrapper type for `std::io::Error`
#[derive(Debug, Error)]
pub struct IoError(std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl Eq for IoError {}
impl Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError(err)
    }
}

/// Error type for the buffer, its configuration, and the orchestrated run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PileError {
    #[error("Buffer capacity must be greater than 0")]
    ZeroCapacity,
    #[error("Invalid run parameter: {description}")]
    InvalidParameter { description: String },
    #[error("Target of {target} items does not split evenly across {producers} producers and {consumers} consumers")]
    UnbalancedQuota {
        target: u64,
        producers: usize,
        consumers: usize,
    },
    #[error("Run could never complete: {reason}")]
    StarvationRisk { reason: String },
    #[error("Deadline of {deadline:?} passed with {finished}/{total} workers finished")]
    DeadlineExceeded {
        deadline: Duration,
        finished: usize,
        total: usize,
    },
    #[error("Worker thread `{name}` panicked")]
    WorkerPanicked { name: String },
    #[error("Failed to spawn worker thread {:?}", err)]
    Spawn {
        #[from]
        err: IoError,
    },
}

impl From<std::io::Error> for PileError {
    fn from(err: std::io::Error) -> Self {
        PileError::Spawn { err: err.into() }
    }
}
