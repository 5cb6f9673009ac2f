use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::{
    election::ElectionCore,
    voter::{Voter, VoterCore},
};

/// Whether a voter can vote right now, and if not, why not.
///
/// The checks run in a fixed order and the first that applies wins, so a
/// voter who has voted always sees `AlreadyVoted`, even once the election
/// has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BallotStatus {
    AlreadyVoted {
        voted_at: Option<DateTime<Utc>>,
    },
    Inactive,
    NotStarted {
        starts_at: DateTime<Utc>,
        /// Whole days until voting opens.
        days: i64,
        /// Whole hours until voting opens, after removing `days`.
        hours: i64,
    },
    Ended {
        ended_at: DateTime<Utc>,
    },
    Open {
        closes_at: DateTime<Utc>,
    },
}

impl BallotStatus {
    pub fn of(election: &ElectionCore, voter: &VoterCore, now: DateTime<Utc>) -> Self {
        if voter.has_voted {
            return Self::AlreadyVoted {
                voted_at: voter.voted_at(),
            };
        }
        if !election.is_active {
            return Self::Inactive;
        }
        if now < election.start_date {
            let starts_in = election.start_date - now;
            return Self::NotStarted {
                starts_at: election.start_date,
                days: starts_in.num_days(),
                hours: starts_in.num_hours() % 24,
            };
        }
        if !election.is_within_window(now) {
            return Self::Ended {
                ended_at: election.end_date,
            };
        }
        Self::Open {
            closes_at: election.end_date,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Turn anything but `Open` into the error that refuses the vote.
    pub fn ensure_open(&self, voter: &Voter) -> Result<()> {
        match self {
            Self::Open { .. } => Ok(()),
            Self::AlreadyVoted { .. } => Err(Error::AlreadyVoted(voter.id)),
            Self::Inactive => Err(Error::ElectionClosed(format!(
                "election {} is not active",
                voter.election_id
            ))),
            Self::NotStarted { starts_at, .. } => Err(Error::ElectionClosed(format!(
                "voting opens at {starts_at}"
            ))),
            Self::Ended { ended_at } => Err(Error::ElectionClosed(format!(
                "voting ended at {ended_at}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson::DateTime as BsonDateTime;

    use crate::model::mongodb::Id;

    fn voter() -> Voter {
        Voter {
            id: Id::new(),
            voter: VoterCore::example1(Id::new()),
        }
    }

    #[test]
    fn open_inside_window() {
        let mut election = ElectionCore::current_example();
        election.is_active = true;
        let voter = voter();
        let status = BallotStatus::of(&election, &voter, Utc::now());
        assert!(status.is_open());
        assert!(status.ensure_open(&voter).is_ok());
    }

    #[test]
    fn inactive_before_window_checks() {
        let election = ElectionCore::past_example();
        let voter = voter();
        let status = BallotStatus::of(&election, &voter, Utc::now());
        assert_eq!(status, BallotStatus::Inactive);
        assert!(matches!(
            status.ensure_open(&voter),
            Err(Error::ElectionClosed(_))
        ));
    }

    #[test]
    fn not_started_countdown() {
        let mut election = ElectionCore::future_example();
        election.is_active = true;
        let voter = voter();
        let now = election.start_date - Duration::days(2) - Duration::hours(5)
            - Duration::minutes(30);
        match BallotStatus::of(&election, &voter, now) {
            BallotStatus::NotStarted { days, hours, .. } => {
                assert_eq!(days, 2);
                assert_eq!(hours, 5);
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn ended_after_window() {
        let mut election = ElectionCore::past_example();
        election.is_active = true;
        let voter = voter();
        assert_eq!(
            BallotStatus::of(&election, &voter, Utc::now()),
            BallotStatus::Ended {
                ended_at: election.end_date
            }
        );
    }

    #[test]
    fn already_voted_wins() {
        let election = ElectionCore::past_example();
        let mut voter = voter();
        let voted_at = BsonDateTime::now();
        voter.has_voted = true;
        voter.voted_at = Some(voted_at);
        let status = BallotStatus::of(&election, &voter, Utc::now());
        assert_eq!(
            status,
            BallotStatus::AlreadyVoted {
                voted_at: Some(voted_at.to_chrono())
            }
        );
        assert!(matches!(
            status.ensure_open(&voter),
            Err(Error::AlreadyVoted(id)) if id == voter.id
        ));
    }
}
