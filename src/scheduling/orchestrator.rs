//! Spawns every worker of a run, waits for them, and reports.
//!
//! There is no cancellation: a worker runs until its quota is met. With
//! `RunConfig::deadline` unset the orchestrator waits forever, matching the plain
//! join-all behaviour; a misconfigured run that can never finish would hang. `RunConfig`
//! validation refuses the quota combinations known to stall, and a deadline bounds the
//! wait for anything else. Workers still running when the deadline passes are detached.
//!
//! Workers are spawned parked on a start gate and only released once every thread is up.
//! If spawning fails partway, the gate is closed instead: the threads already spawned exit
//! without touching the buffer and are joined before the error is returned.
use std::{
    panic::{self, AssertUnwindSafe},
    thread,
    time::Instant,
};

use crossbeam::channel::{self, RecvTimeoutError};
use log::{debug, info, warn};

use crate::{
    comms::buffer::BoundedBuffer,
    config::{Quotas, RunConfig},
    logging::report::{Role, RunReport, WorkerReport},
    PileError,
};

use super::{
    worker::{Consumer, Producer},
    worker_rng, Station,
};

enum Exit {
    Finished(WorkerReport),
    Panicked(String),
}

#[derive(Debug)]
pub struct Orchestrator {
    config: RunConfig,
    quotas: Quotas,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Result<Self, PileError> {
        let quotas = config.validate()?;
        Ok(Self { config, quotas })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn quotas(&self) -> Quotas {
        self.quotas
    }

    /// Runs every producer and consumer to its quota over one fresh buffer.
    pub fn run(&self) -> Result<RunReport, PileError> {
        let cfg = &self.config;
        let station = Station::new(BoundedBuffer::new(cfg.capacity)?);
        self.announce();

        let (exit_tx, exit_rx) = channel::unbounded();
        // each worker takes one start token; dropping the sender early calls them all off
        let (start_tx, start_rx) = channel::unbounded();
        let total = cfg.producers + cfg.consumers;
        let mut handles = Vec::with_capacity(total);
        let started = Instant::now();

        let spawned = self.spawn_roster(&station, &exit_tx, &start_rx, &mut handles);
        drop((exit_tx, start_rx));
        if let Err(err) = spawned {
            warn!(
                "spawn failed after {}/{total} workers, calling them off",
                handles.len()
            );
            drop(start_tx);
            for handle in handles {
                if handle.join().is_err() {
                    warn!("worker panicked while being called off");
                }
            }
            return Err(err);
        }
        for _ in 0..total {
            if start_tx.send(()).is_err() {
                // every worker is already gone; the exit loop below sees the disconnect
                break;
            }
        }

        let deadline = cfg.deadline.map(|d| (d, started + d));
        let mut workers = Vec::with_capacity(total);
        while workers.len() < total {
            let exit = match deadline {
                Some((limit, at)) => match exit_rx.recv_deadline(at) {
                    Ok(exit) => exit,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(
                            "deadline of {}ms passed with {}/{total} workers finished",
                            limit.as_millis(),
                            workers.len()
                        );
                        return Err(PileError::DeadlineExceeded {
                            deadline: limit,
                            finished: workers.len(),
                            total,
                        });
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match exit_rx.recv() {
                    Ok(exit) => exit,
                    Err(_) => break,
                },
            };
            match exit {
                Exit::Finished(report) => workers.push(report),
                Exit::Panicked(name) => return Err(PileError::WorkerPanicked { name }),
            }
        }

        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                return Err(PileError::WorkerPanicked { name });
            }
        }
        let elapsed = started.elapsed();

        let (snap, residual) = station.observe();
        assert_eq!(
            residual as u64,
            snap.in_flight(),
            "buffer holds {residual} items but the tally shows {} in flight, items were lost or duplicated.",
            snap.in_flight()
        );

        workers.sort_by_key(|w| (w.role == Role::Consumer, w.id));
        let report = RunReport {
            discipline: cfg.discipline,
            capacity: cfg.capacity,
            target: cfg.target,
            effective_target: self.quotas.consumed_total,
            produced: snap.produced,
            consumed: snap.consumed,
            residual,
            elapsed,
            workers,
        };
        for line in report.to_string().lines() {
            info!("{line}");
        }
        Ok(report)
    }

    fn spawn_roster(
        &self,
        station: &Station,
        exit_tx: &channel::Sender<Exit>,
        start_rx: &channel::Receiver<()>,
        handles: &mut Vec<thread::JoinHandle<()>>,
    ) -> Result<(), PileError> {
        let cfg = &self.config;
        for id in 1..=cfg.producers {
            let producer = Producer::new(
                id,
                self.quotas.per_producer,
                station.clone(),
                cfg.discipline,
            )
            .with_pacing(cfg.pacing.produce, cfg.pacing.produce_backoff)
            .with_synth(cfg.synth)
            .with_rng(worker_rng(cfg.seed, Role::Producer, id));
            handles.push(spawn_worker(
                format!("{}-{id}", Role::Producer),
                exit_tx.clone(),
                start_rx.clone(),
                move || producer.run(),
            )?);
        }
        for id in 1..=cfg.consumers {
            let consumer = Consumer::new(
                id,
                self.quotas.per_consumer,
                station.clone(),
                cfg.discipline,
            )
            .with_pacing(cfg.pacing.consume, cfg.pacing.consume_backoff)
            .with_rng(worker_rng(cfg.seed, Role::Consumer, id));
            handles.push(spawn_worker(
                format!("{}-{id}", Role::Consumer),
                exit_tx.clone(),
                start_rx.clone(),
                move || consumer.run(),
            )?);
        }
        Ok(())
    }

    fn announce(&self) {
        let cfg = &self.config;
        info!("=== Bounded buffer run ({}) ===", cfg.discipline);
        info!("Buffer capacity: {} units", cfg.capacity);
        info!("Producers: {} x {} items", cfg.producers, self.quotas.per_producer);
        info!("Consumers: {} x {} items", cfg.consumers, self.quotas.per_consumer);
        info!("Target: {} units", cfg.target);
        if self.quotas.consumed_total != cfg.target || self.quotas.produced_total != cfg.target {
            warn!(
                "target truncated: producers make {}, consumers take {}",
                self.quotas.produced_total, self.quotas.consumed_total
            );
        }
        match cfg.deadline {
            Some(d) => info!("Deadline: {}ms", d.as_millis()),
            None => debug!("no deadline, waiting for every worker"),
        }
    }
}

/// Spawns a named worker thread that waits for one start token before running `work`.
/// If the start sender is dropped first, the thread exits without touching the buffer.
fn spawn_worker<F>(
    name: String,
    exit_tx: channel::Sender<Exit>,
    start: channel::Receiver<()>,
    work: F,
) -> Result<thread::JoinHandle<()>, PileError>
where
    F: FnOnce() -> WorkerReport + Send + 'static,
{
    let thread_name = name.clone();
    let handle = thread::Builder::new().name(thread_name).spawn(move || {
        if start.recv().is_err() {
            debug!("{name} called off before starting");
            return;
        }
        let exit = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(report) => Exit::Finished(report),
            Err(_) => Exit::Panicked(name),
        };
        if exit_tx.send(exit).is_err() {
            debug!("orchestrator stopped waiting before this worker finished");
        }
    })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RemainderPolicy,
        scheduling::pacing::{DelayRange, Pacing},
        sync::Discipline,
    };
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(
        discipline: Discipline,
        capacity: usize,
        producers: usize,
        consumers: usize,
        target: u64,
    ) -> RunConfig {
        RunConfig {
            capacity,
            producers,
            consumers,
            target,
            discipline,
            pacing: Pacing::INSTANT,
            seed: Some(11),
            ..RunConfig::preset(discipline)
        }
    }

    #[test]
    fn three_producers_two_consumers_drain_fully() {
        let orchestrator = Orchestrator::new(config(Discipline::Blocking, 8, 3, 2, 24)).unwrap();
        let report = orchestrator.run().unwrap();

        assert_eq!(report.produced, 24);
        assert_eq!(report.consumed, 24);
        assert_eq!(report.residual, 0);
        assert_eq!(report.efficiency(), 100.0);
        assert!(report.is_balanced());
        assert!(report.workers_of(Role::Producer).all(|w| w.completed == 8));
        assert!(report.workers_of(Role::Consumer).all(|w| w.completed == 12));
        assert_eq!(report.workers.len(), 5);
        assert_eq!(report.workers[0].name(), "producer-1");
        assert_eq!(report.workers[4].name(), "consumer-2");
    }

    #[test]
    fn single_slot_polling_retries_until_done() {
        let mut cfg = config(Discipline::Polling, 1, 1, 1, 5);
        cfg.pacing = Pacing {
            produce: DelayRange::ZERO,
            consume: DelayRange::from_millis(5, 8),
            produce_backoff: DelayRange::fixed(Duration::from_millis(1)),
            consume_backoff: DelayRange::fixed(Duration::from_millis(1)),
        };
        let report = Orchestrator::new(cfg).unwrap().run().unwrap();

        assert_eq!(report.consumed, 5);
        assert_eq!(report.produced, 5);
        assert_eq!(report.residual, 0);
        // the producer outpaces the slow consumer, so it must have met a full slot
        let producer = report.workers_of(Role::Producer).next().unwrap();
        assert!(producer.failed_attempts > 0);
        assert_eq!(producer.completed, 5);
    }

    #[test]
    fn blocking_workers_never_miss() {
        let mut cfg = config(Discipline::Blocking, 12, 3, 2, 30);
        cfg.pacing.produce = DelayRange::from_millis(0, 2);
        cfg.pacing.consume = DelayRange::from_millis(0, 3);
        let report = Orchestrator::new(cfg).unwrap().run().unwrap();

        assert_eq!((report.produced, report.consumed), (30, 30));
        assert_eq!(report.failed_attempts(), 0);
        assert!(report.is_balanced());
    }

    #[test]
    fn polling_many_workers_conserve_items() {
        let mut cfg = config(Discipline::Polling, 4, 4, 6, 48);
        cfg.pacing.produce_backoff = DelayRange::from_millis(0, 1);
        cfg.pacing.consume_backoff = DelayRange::from_millis(0, 1);
        let report = Orchestrator::new(cfg).unwrap().run().unwrap();

        assert_eq!((report.produced, report.consumed), (48, 48));
        assert!(report.workers_of(Role::Consumer).all(|w| w.completed == 8));
        assert!(report.is_balanced());
    }

    #[test]
    fn truncated_run_leaves_declared_surplus() {
        let mut cfg = config(Discipline::Blocking, 8, 5, 4, 26);
        cfg.remainder = RemainderPolicy::Truncate;
        let orchestrator = Orchestrator::new(cfg).unwrap();
        assert_eq!(orchestrator.quotas().produced_total, 25);

        let report = orchestrator.run().unwrap();
        assert_eq!(report.produced, 25);
        assert_eq!(report.consumed, 24);
        assert_eq!(report.residual, 1);
        assert_eq!(report.effective_target, 24);
        assert!(!report.is_balanced());
        assert!((report.efficiency() - 24.0 * 100.0 / 26.0).abs() < 1e-9);
    }

    #[test]
    fn deadline_bounds_a_slow_run() {
        let mut cfg = config(Discipline::Blocking, 1, 1, 1, 2);
        cfg.pacing.consume = DelayRange::fixed(Duration::from_millis(400));
        cfg.deadline = Some(Duration::from_millis(50));

        let err = Orchestrator::new(cfg).unwrap().run().unwrap_err();
        match err {
            PileError::DeadlineExceeded { finished, total, .. } => {
                assert!(finished < total);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_config_never_spawns() {
        let err = Orchestrator::new(config(Discipline::Blocking, 8, 3, 2, 25)).unwrap_err();
        assert!(matches!(err, PileError::UnbalancedQuota { .. }));
    }

    #[test]
    fn panicking_worker_is_reported() {
        let (tx, rx) = channel::unbounded();
        let (start_tx, start_rx) = channel::unbounded();
        let handle =
            spawn_worker("producer-9".to_string(), tx, start_rx, || panic!("boom")).unwrap();
        start_tx.send(()).unwrap();
        match rx.recv().unwrap() {
            Exit::Panicked(name) => assert_eq!(name, "producer-9"),
            Exit::Finished(_) => panic!("worker should not have finished"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn called_off_worker_never_runs() {
        let (tx, rx) = channel::unbounded();
        let (start_tx, start_rx) = channel::unbounded::<()>();
        let ran = Arc::new(AtomicBool::new(false));

        let handle = {
            let ran = Arc::clone(&ran);
            spawn_worker("consumer-3".to_string(), tx, start_rx, move || {
                ran.store(true, SeqCst);
                WorkerReport {
                    role: Role::Consumer,
                    id: 3,
                    quota: 1,
                    completed: 1,
                    failed_attempts: 0,
                    elapsed: Duration::ZERO,
                }
            })
            .unwrap()
        };

        // what a failed spawn of a later worker does to the ones already up
        drop(start_tx);
        handle.join().unwrap();
        assert!(!ran.load(SeqCst));
        assert!(matches!(
            rx.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn gated_worker_starts_on_token() {
        let (tx, rx) = channel::unbounded();
        let (start_tx, start_rx) = channel::unbounded();
        let handle = spawn_worker("producer-4".to_string(), tx, start_rx, || WorkerReport {
            role: Role::Producer,
            id: 4,
            quota: 0,
            completed: 0,
            failed_attempts: 0,
            elapsed: Duration::ZERO,
        })
        .unwrap();

        // nothing happens before the token
        thread::sleep(Duration::from_millis(20));
        assert!(rx.try_recv().is_err());

        start_tx.send(()).unwrap();
        match rx.recv().unwrap() {
            Exit::Finished(report) => assert_eq!(report.name(), "producer-4"),
            Exit::Panicked(_) => panic!("worker should have finished"),
        }
        handle.join().unwrap();
    }
}
