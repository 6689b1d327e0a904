//! Summaries produced when workers and runs finish.
use std::{fmt::Display, time::Duration};

use crate::sync::Discipline;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Consumer => write!(f, "consumer"),
        }
    }
}

/// What a single worker reports when it reaches `Done`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub role: Role,
    /// 1-based within its role.
    pub id: usize,
    pub quota: u64,
    pub completed: u64,
    /// Misses on a full/empty buffer; only the polling discipline retries.
    pub failed_attempts: u64,
    pub elapsed: Duration,
}

impl WorkerReport {
    pub fn name(&self) -> String {
        format!("{}-{}", self.role, self.id)
    }
}

/// Final statistics of an orchestrated run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub discipline: Discipline,
    pub capacity: usize,
    /// Target as configured.
    pub target: u64,
    /// Total the consumer quotas add up to after remainder handling.
    pub effective_target: u64,
    pub produced: u64,
    pub consumed: u64,
    /// Buffer length once every worker finished.
    pub residual: usize,
    pub elapsed: Duration,
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// Share of the configured target that reached a consumer, in percent.
    pub fn efficiency(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        self.consumed as f64 * 100.0 / self.target as f64
    }

    pub fn failed_attempts(&self) -> u64 {
        self.workers.iter().map(|w| w.failed_attempts).sum()
    }

    /// Everything produced was consumed and the buffer drained.
    pub fn is_balanced(&self) -> bool {
        self.produced == self.consumed && self.residual == 0
    }

    pub fn workers_of(&self, role: Role) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(move |w| w.role == role)
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== RUN SUMMARY ({}) ===", self.discipline)?;
        writeln!(f, "Items produced:   {} units", self.produced)?;
        writeln!(f, "Items consumed:   {} units", self.consumed)?;
        if self.effective_target != self.target {
            writeln!(
                f,
                "Effective target: {} of {} units",
                self.effective_target, self.target
            )?;
        }
        writeln!(f, "Elapsed:          {} ms", self.elapsed.as_millis())?;
        writeln!(f, "Residual stock:   {}/{} units", self.residual, self.capacity)?;
        writeln!(f, "Failed attempts:  {}", self.failed_attempts())?;
        write!(f, "Efficiency:       {:.1}%", self.efficiency())
    }
}
