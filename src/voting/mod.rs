//! Casting votes, whether by the voter or by an expired ballot countdown.

mod cast;
mod countdown;
mod timers;

pub use cast::cast_vote;
pub use timers::{BallotTimers, BallotTimersFairing};
