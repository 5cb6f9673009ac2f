use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId, voter::VoterDescription},
    db::{Election, NewElection},
};

/// An election specification, as sent to create or update an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub has_blank_vote: bool,
}

impl ElectionSpec {
    /// Reject specs that cannot describe a sensible election.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Election name must not be empty"));
        }
        if self.start_date >= self.end_date {
            return Err(Error::validation(format!(
                "Election must start before it ends ({} >= {})",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

impl From<ElectionSpec> for NewElection {
    fn from(spec: ElectionSpec) -> Self {
        Self::new(
            spec.name.trim().to_string(),
            spec.start_date,
            spec.end_date,
            spec.has_blank_vote,
        )
    }
}

/// An election as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub has_blank_vote: bool,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            name: election.election.name,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            is_active: election.election.is_active,
            has_blank_vote: election.election.has_blank_vote,
        }
    }
}

/// An election together with everything scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetails {
    pub election: ElectionDescription,
    pub candidates: Vec<CandidateDescription>,
    pub voters: Vec<VoterDescription>,
}
