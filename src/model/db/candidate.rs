use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    mongodb::Id,
    store::{Record, Records, Table},
};

/// Core candidate data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    /// The election this candidate stands in.
    pub election_id: Id,
    /// Running tally of non-blank votes. Only ever incremented by the store.
    pub votes: u64,
}

impl CandidateCore {
    /// A new candidate with an empty tally.
    pub fn new(name: String, election_id: Id) -> Self {
        Self {
            name,
            election_id,
            votes: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    /// Fetch a candidate, failing with `NotFound` if it does not exist.
    pub async fn get(candidates: &Records<Candidate>, id: Id) -> Result<Candidate> {
        candidates
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

impl Record for CandidateCore {
    const TABLE: Table = Table::Candidates;
}
impl Record for Candidate {
    const TABLE: Table = Table::Candidates;
}
