use std::{process::ExitCode, time::Duration};

use clap::{Parser, ValueEnum};
use log::error;

use stockpile::{
    config::{RemainderPolicy, RunConfig},
    scheduling::{orchestrator::Orchestrator, pacing::Pacing},
    sync::Discipline,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DisciplineArg {
    Polling,
    Blocking,
}

impl From<DisciplineArg> for Discipline {
    fn from(arg: DisciplineArg) -> Self {
        match arg {
            DisciplineArg::Polling => Discipline::Polling,
            DisciplineArg::Blocking => Discipline::Blocking,
        }
    }
}

/// Run producers and consumers against one bounded buffer and print the summary.
#[derive(Debug, Parser)]
#[command(name = "stockpile", version)]
struct Cli {
    /// Wait discipline; also picks the preset the other flags override
    #[arg(short, long, value_enum, default_value = "blocking")]
    discipline: DisciplineArg,

    /// Buffer capacity
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Number of producer threads
    #[arg(short, long)]
    producers: Option<usize>,

    /// Number of consumer threads
    #[arg(long)]
    consumers: Option<usize>,

    /// Total items to move through the buffer
    #[arg(short, long)]
    target: Option<u64>,

    /// Floor-divide an uneven target instead of refusing it
    #[arg(long)]
    truncate: bool,

    /// Seed for reproducible item values and delays
    #[arg(long)]
    seed: Option<u64>,

    /// Give up waiting for the workers after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Zero every think-time, processing-time and backoff
    #[arg(long)]
    fast: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let mut cfg = RunConfig::preset(self.discipline.into());
        if let Some(capacity) = self.capacity {
            cfg.capacity = capacity;
        }
        if let Some(producers) = self.producers {
            cfg.producers = producers;
        }
        if let Some(consumers) = self.consumers {
            cfg.consumers = consumers;
        }
        if let Some(target) = self.target {
            cfg.target = target;
        }
        if self.truncate {
            cfg.remainder = RemainderPolicy::Truncate;
        }
        if self.fast {
            cfg.pacing = Pacing::INSTANT;
        }
        cfg.seed = self.seed;
        cfg.deadline = self.deadline_ms.map(Duration::from_millis);
        cfg
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Cli::parse().into_config();
    let report = Orchestrator::new(cfg).and_then(|orchestrator| orchestrator.run());
    match report {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            eprintln!("stockpile: {err}");
            ExitCode::FAILURE
        }
    }
}
