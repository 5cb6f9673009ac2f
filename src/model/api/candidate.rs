use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{election::ElectionDescription, id::ApiId},
    db::Candidate,
};

/// A candidate's name, as sent to create or rename a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Candidate name must not be empty"));
        }
        Ok(())
    }
}

/// A candidate as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub election_id: ApiId,
    pub votes: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            votes: candidate.votes,
            name: candidate.candidate.name,
        }
    }
}

/// The candidates standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCandidates {
    pub election: ElectionDescription,
    pub candidates: Vec<CandidateDescription>,
}
