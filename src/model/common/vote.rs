use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, mongodb::Id};

/// What a voter chose.
///
/// Serialised as `{"candidate": "<id>"}` or `"blank"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Candidate(ApiId),
    Blank,
}

impl VoteChoice {
    /// The chosen candidate, or `None` for a blank vote.
    pub fn candidate(&self) -> Option<Id> {
        match self {
            VoteChoice::Candidate(id) => Some(**id),
            VoteChoice::Blank => None,
        }
    }
}

/// Why a vote is being cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTrigger {
    /// The voter submitted the ballot.
    Explicit,
    /// The ballot countdown ran out.
    Expired,
}
