//! Randomized pauses that simulate work and space out polling retries.
use std::{thread, time::Duration};

use rand::Rng;

use crate::PileError;

/// Inclusive range a pause length is drawn from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange::fixed(Duration::ZERO);

    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Draws a pause uniformly from `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let span = (self.max - self.min).as_micros() as u64;
        self.min + Duration::from_micros(rng.gen_range(0..=span))
    }

    /// Sleeps for a sampled pause; zero-length pauses return immediately.
    pub fn pause<R: Rng + ?Sized>(&self, rng: &mut R) {
        if self.is_zero() {
            return;
        }
        thread::sleep(self.sample(rng));
    }

    fn validate(&self, what: &str) -> Result<(), PileError> {
        if self.min > self.max {
            return Err(PileError::InvalidParameter {
                description: format!(
                    "{what} delay range is backwards: min {:?} > max {:?}",
                    self.min, self.max
                ),
            });
        }
        Ok(())
    }
}

/// Every pause a run uses, per role.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// Think-time after each successful insertion.
    pub produce: DelayRange,
    /// Processing-time after each successful removal.
    pub consume: DelayRange,
    /// Polling backoff after a producer finds the buffer full.
    pub produce_backoff: DelayRange,
    /// Polling backoff after a consumer finds the buffer empty.
    pub consume_backoff: DelayRange,
}

impl Pacing {
    /// No think-time, no processing-time, no backoff.
    pub const INSTANT: Pacing = Pacing {
        produce: DelayRange::ZERO,
        consume: DelayRange::ZERO,
        produce_backoff: DelayRange::ZERO,
        consume_backoff: DelayRange::ZERO,
    };

    pub fn validate(&self) -> Result<(), PileError> {
        self.produce.validate("think-time")?;
        self.consume.validate("processing-time")?;
        self.produce_backoff.validate("producer backoff")?;
        self.consume_backoff.validate("consumer backoff")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Instant;

    #[test]
    fn samples_stay_in_range() {
        let range = DelayRange::from_millis(60, 140);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let d = range.sample(&mut rng);
            assert!(d >= range.min && d <= range.max, "{d:?} outside range");
        }
    }

    #[test]
    fn fixed_and_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let fixed = DelayRange::fixed(Duration::from_millis(15));
        assert_eq!(fixed.sample(&mut rng), Duration::from_millis(15));
        assert!(DelayRange::ZERO.is_zero());
        assert!(!fixed.is_zero());

        let start = Instant::now();
        DelayRange::ZERO.pause(&mut rng);
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn pause_sleeps_at_least_min() {
        let mut rng = StdRng::seed_from_u64(3);
        let start = Instant::now();
        DelayRange::from_millis(10, 12).pause(&mut rng);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn backwards_range_is_invalid() {
        let pacing = Pacing {
            produce_backoff: DelayRange::from_millis(20, 15),
            ..Pacing::INSTANT
        };
        assert!(matches!(
            pacing.validate(),
            Err(PileError::InvalidParameter { .. })
        ));
        assert!(Pacing::INSTANT.validate().is_ok());
    }
}
