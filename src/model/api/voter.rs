use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    db::{NewVoter, Voter},
    mongodb::Id,
};

/// A voter to add to an election's roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSpec {
    pub name: String,
    pub email: String,
}

impl VoterSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Voter name must not be empty"));
        }
        if self.email.trim().is_empty() {
            return Err(Error::validation(format!(
                "Voter '{}' has no email address",
                self.name.trim()
            )));
        }
        Ok(())
    }

    pub fn into_voter(self, election_id: Id) -> NewVoter {
        NewVoter::new(
            self.name.trim().to_string(),
            self.email.trim().to_string(),
            election_id,
        )
    }
}

/// A voter as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub election_id: ApiId,
    pub generated_link: Option<String>,
    pub has_voted: bool,
    /// `None` both before voting and after a blank vote.
    pub voted_for: Option<ApiId>,
    pub voted_at: Option<DateTime<Utc>>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        let voted_at = voter.voted_at();
        Self {
            id: voter.id.into(),
            election_id: voter.election_id.into(),
            has_voted: voter.has_voted,
            voted_for: voter.voted_for.map(ApiId::from),
            voted_at,
            name: voter.voter.name,
            email: voter.voter.email,
            generated_link: voter.voter.generated_link,
        }
    }
}

/// One row of the generated link export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterUrl {
    pub name: String,
    pub email: String,
    pub url: String,
}

/// Voters to remove from an election's roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub voter_ids: Vec<ApiId>,
}

/// What a bulk delete did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub deleted: Vec<ApiId>,
    /// IDs that do not belong to the election (or do not exist) and were left alone.
    pub skipped: Vec<ApiId>,
}
