//! Producer and consumer workers.
//!
//! A worker performs one buffer operation per `step` and is `Done` after exactly `quota`
//! successes. Under `Discipline::Polling` a miss keeps the worker on the same operation
//! (a producer keeps the same item) and sleeps a backoff before the next step; under
//! `Discipline::Blocking` a step parks on the buffer until it can succeed and never misses.
//! The shared `Tally` is bumped from the buffer's commit hook, inside the same critical
//! section as the queue mutation.
use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;

use crate::{
    comms::item::{Item, ItemSynth},
    logging::report::{Role, WorkerReport},
    sync::Discipline,
};

use super::{pacing::DelayRange, worker_rng, Station, WorkerState};

#[derive(Debug)]
pub struct Producer {
    id: usize,
    quota: u64,
    station: Station,
    discipline: Discipline,
    think: DelayRange,
    backoff: DelayRange,
    synth: ItemSynth,
    rng: StdRng,
    /// Item synthesized but not yet accepted by the buffer.
    pending: Option<Item>,
    completed: u64,
    failed_attempts: u64,
}

impl Producer {
    pub fn new(id: usize, quota: u64, station: Station, discipline: Discipline) -> Self {
        Self {
            id,
            quota,
            station,
            discipline,
            think: DelayRange::ZERO,
            backoff: DelayRange::ZERO,
            synth: ItemSynth::default(),
            rng: worker_rng(None, Role::Producer, id),
            pending: None,
            completed: 0,
            failed_attempts: 0,
        }
    }

    /// Think-time after a successful insertion and backoff after a full buffer.
    pub fn with_pacing(mut self, think: DelayRange, backoff: DelayRange) -> Self {
        self.think = think;
        self.backoff = backoff;
        self
    }

    pub fn with_synth(mut self, synth: ItemSynth) -> Self {
        self.synth = synth;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> WorkerState {
        if self.completed >= self.quota {
            WorkerState::Done
        } else {
            WorkerState::Running
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Makes one insertion attempt. Returns the state after the attempt.
    pub fn step(&mut self) -> WorkerState {
        if self.state() == WorkerState::Done {
            return WorkerState::Done;
        }
        let item = match self.pending.take() {
            Some(item) => item,
            None => self.synth.synthesize(self.id, self.completed, &mut self.rng),
        };
        let Station { buffer, tally } = &self.station;
        // counted in the same critical section that queues the item
        let commit = |_: usize| {
            tally.increment_produced();
        };

        let inserted = match self.discipline {
            Discipline::Blocking => Some(buffer.insert_with(item, commit)),
            Discipline::Polling => match buffer.try_insert_with(item, commit) {
                Ok(len) => Some(len),
                Err(item) => {
                    self.pending = Some(item);
                    None
                }
            },
        };

        match inserted {
            Some(len) => {
                self.completed += 1;
                info!(
                    "[producer-{}] stored item {item} | inventory {len}/{}",
                    self.id,
                    buffer.capacity()
                );
                self.think.pause(&mut self.rng);
            }
            None => {
                self.failed_attempts += 1;
                debug!("[producer-{}] buffer full, retrying item {item}", self.id);
                self.backoff.pause(&mut self.rng);
            }
        }
        self.state()
    }

    /// Steps until the quota is met.
    pub fn run(mut self) -> WorkerReport {
        let started = Instant::now();
        while self.step() == WorkerState::Running {}
        let elapsed = started.elapsed();
        info!(
            "producer-{} finished {} items in {}ms",
            self.id,
            self.completed,
            elapsed.as_millis()
        );
        WorkerReport {
            role: Role::Producer,
            id: self.id,
            quota: self.quota,
            completed: self.completed,
            failed_attempts: self.failed_attempts,
            elapsed,
        }
    }
}

#[derive(Debug)]
pub struct Consumer {
    id: usize,
    quota: u64,
    station: Station,
    discipline: Discipline,
    processing: DelayRange,
    backoff: DelayRange,
    rng: StdRng,
    completed: u64,
    failed_attempts: u64,
}

impl Consumer {
    pub fn new(id: usize, quota: u64, station: Station, discipline: Discipline) -> Self {
        Self {
            id,
            quota,
            station,
            discipline,
            processing: DelayRange::ZERO,
            backoff: DelayRange::ZERO,
            rng: worker_rng(None, Role::Consumer, id),
            completed: 0,
            failed_attempts: 0,
        }
    }

    /// Processing-time after a successful removal and backoff after an empty buffer.
    pub fn with_pacing(mut self, processing: DelayRange, backoff: DelayRange) -> Self {
        self.processing = processing;
        self.backoff = backoff;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> WorkerState {
        if self.completed >= self.quota {
            WorkerState::Done
        } else {
            WorkerState::Running
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Makes one removal attempt. Returns the state after the attempt.
    pub fn step(&mut self) -> WorkerState {
        if self.state() == WorkerState::Done {
            return WorkerState::Done;
        }
        let Station { buffer, tally } = &self.station;
        let commit = |_: usize| {
            tally.increment_consumed();
        };
        let removed = match self.discipline {
            Discipline::Blocking => Some(buffer.remove_with(commit)),
            Discipline::Polling => buffer.try_remove_with(commit),
        };

        match removed {
            Some((item, len)) => {
                self.completed += 1;
                info!(
                    "[consumer-{}] retrieved item {item} | remaining {len} (order {}/{})",
                    self.id, self.completed, self.quota
                );
                self.processing.pause(&mut self.rng);
            }
            None => {
                self.failed_attempts += 1;
                debug!("[consumer-{}] buffer empty, retrying", self.id);
                self.backoff.pause(&mut self.rng);
            }
        }
        self.state()
    }

    /// Steps until the quota is met.
    pub fn run(mut self) -> WorkerReport {
        let started = Instant::now();
        while self.step() == WorkerState::Running {}
        let elapsed = started.elapsed();
        info!(
            "consumer-{} fulfilled all {} orders in {}ms",
            self.id,
            self.completed,
            elapsed.as_millis()
        );
        WorkerReport {
            role: Role::Consumer,
            id: self.id,
            quota: self.quota,
            completed: self.completed,
            failed_attempts: self.failed_attempts,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::buffer::BoundedBuffer;
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    use std::sync::Arc;
    use std::thread;

    fn station(capacity: usize) -> Station {
        Station::new(BoundedBuffer::new(capacity).unwrap())
    }

    #[test]
    fn polling_producer_keeps_item_until_accepted() {
        let station = station(1);
        let synth = ItemSynth {
            stride: 100,
            jitter: 0,
        };
        let mut producer =
            Producer::new(2, 2, station.clone(), Discipline::Polling).with_synth(synth);

        assert_eq!(producer.step(), WorkerState::Running);
        assert_eq!(station.buffer.size(), 1);

        // full: the second item stays pending across misses
        assert_eq!(producer.step(), WorkerState::Running);
        assert_eq!(producer.step(), WorkerState::Running);
        assert_eq!(producer.completed(), 1);
        assert_eq!(producer.pending, Some(Item(201)));

        assert_eq!(station.buffer.try_remove(), Some((Item(200), 0)));
        assert_eq!(producer.step(), WorkerState::Done);
        assert_eq!(station.buffer.try_remove(), Some((Item(201), 0)));

        let report = producer.run();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed_attempts, 2);
        assert_eq!(station.tally.snapshot().produced, 2);
    }

    #[test]
    fn polling_consumer_counts_misses() {
        let station = station(2);
        let mut consumer = Consumer::new(1, 1, station.clone(), Discipline::Polling);

        assert_eq!(consumer.step(), WorkerState::Running);
        assert_eq!(consumer.completed(), 0);

        station.buffer.try_insert(Item(7)).unwrap();
        assert_eq!(consumer.step(), WorkerState::Done);
        assert!(station.buffer.is_empty());
        // done workers do nothing more
        station.buffer.try_insert(Item(8)).unwrap();
        assert_eq!(consumer.step(), WorkerState::Done);
        assert_eq!(station.buffer.size(), 1);

        let report = consumer.run();
        assert_eq!(report.failed_attempts, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(station.tally.snapshot().consumed, 1);
    }

    #[test]
    fn blocking_pair_finishes_without_misses() {
        let station = station(1);
        let producer = Producer::new(1, 50, station.clone(), Discipline::Blocking);
        let consumer = Consumer::new(1, 50, station.clone(), Discipline::Blocking);

        let p = thread::spawn(move || producer.run());
        let c = thread::spawn(move || consumer.run());
        let (p, c) = (p.join().unwrap(), c.join().unwrap());

        assert_eq!((p.completed, c.completed), (50, 50));
        assert_eq!(p.failed_attempts + c.failed_attempts, 0);
        assert!(station.buffer.is_empty());
        let snap = station.tally.snapshot();
        assert_eq!((snap.produced, snap.consumed), (50, 50));
    }

    #[test]
    fn tally_matches_buffer_throughout_a_run() {
        let station = station(2);
        let done = Arc::new(AtomicBool::new(false));

        let sampler = {
            let station = station.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(SeqCst) {
                    let (snap, len) = station.observe();
                    assert_eq!(snap.in_flight(), len as u64, "tally drifted from buffer");
                    assert!(len <= 2);
                }
            })
        };

        // polling producers and blocking consumers on the same buffer
        let producers: Vec<_> = (1..=3)
            .map(|id| {
                let producer = Producer::new(id, 200, station.clone(), Discipline::Polling);
                thread::spawn(move || producer.run())
            })
            .collect();
        let consumers: Vec<_> = (1..=2)
            .map(|id| {
                let consumer = Consumer::new(id, 300, station.clone(), Discipline::Blocking);
                thread::spawn(move || consumer.run())
            })
            .collect();

        for h in producers.into_iter().chain(consumers) {
            h.join().unwrap();
        }
        done.store(true, SeqCst);
        sampler.join().unwrap();

        let (snap, len) = station.observe();
        assert_eq!((snap.produced, snap.consumed, len), (600, 600, 0));
    }

    #[test]
    fn zero_quota_is_done_immediately() {
        let producer = Producer::new(1, 0, station(1), Discipline::Blocking);
        assert_eq!(producer.state(), WorkerState::Done);
        assert_eq!(producer.run().completed, 0);
    }
}
