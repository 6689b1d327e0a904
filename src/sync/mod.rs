//! Wait discipline shared by the buffer's callers.
//!
//! `Discipline` selects how a worker behaves when the buffer is full (producers) or empty
//! (consumers).
use std::{fmt::Display, str::FromStr};

use crate::PileError;

/// How a worker waits for the buffer to accept or yield an item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Discipline {
    /// Retry the non-blocking operation, sleeping a randomized backoff after each miss.
    /// Never parks on a condition, so a state change is only noticed on the next retry.
    Polling,
    /// Park on the buffer's not-full / not-empty signal until the operation can succeed.
    #[default]
    Blocking,
}

impl Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::Polling => write!(f, "poll-with-backoff"),
            Discipline::Blocking => write!(f, "block-until-signaled"),
        }
    }
}

impl FromStr for Discipline {
    type Err = PileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(Discipline::Polling),
            "blocking" | "block" => Ok(Discipline::Blocking),
            other => Err(PileError::InvalidParameter {
                description: format!("unknown wait discipline `{other}`"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_disciplines() {
        assert_eq!("polling".parse::<Discipline>().unwrap(), Discipline::Polling);
        assert_eq!("Block".parse::<Discipline>().unwrap(), Discipline::Blocking);
        assert!(matches!(
            "spin".parse::<Discipline>(),
            Err(PileError::InvalidParameter { .. })
        ));
    }
}
