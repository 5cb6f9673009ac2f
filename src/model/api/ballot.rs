use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        candidate::CandidateDescription, election::ElectionDescription, id::ApiId,
        voter::VoterDescription,
    },
    common::{
        ballot::BallotStatus,
        vote::{VoteChoice, VoteTrigger},
    },
};

/// What a voter sees when following their personal link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallot {
    pub voter: VoterDescription,
    pub election: ElectionDescription,
    pub status: BallotStatus,
}

/// An opened ballot: the choices on offer and when the countdown runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedBallot {
    pub election: ElectionDescription,
    pub candidates: Vec<CandidateDescription>,
    /// If no vote arrives by then, a blank vote is cast.
    pub deadline: DateTime<Utc>,
}

/// Confirmation of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub voter_id: ApiId,
    pub election_id: ApiId,
    pub choice: VoteChoice,
    pub trigger: VoteTrigger,
    pub voted_at: DateTime<Utc>,
}
