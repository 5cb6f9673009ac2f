use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::link::VoterLink,
    mongodb::Id,
    store::{Record, Records, Table},
};

/// Core voter data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoterCore {
    pub name: String,
    pub email: String,
    /// The election this voter is on the roll of.
    pub election_id: Id,
    /// Personal voting link, filled in by link generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_link: Option<String>,
    pub has_voted: bool,
    /// The candidate voted for; absent for blank votes and voters yet to vote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_for: Option<Id>,
    /// Set exactly when `has_voted` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_at: Option<BsonDateTime>,
}

impl VoterCore {
    /// A new voter who has not voted yet.
    pub fn new(name: String, email: String, election_id: Id) -> Self {
        Self {
            name,
            email,
            election_id,
            generated_link: None,
            has_voted: false,
            voted_for: None,
            voted_at: None,
        }
    }

    /// When the vote was recorded, if it has been.
    pub fn voted_at(&self) -> Option<DateTime<Utc>> {
        self.voted_at.map(BsonDateTime::to_chrono)
    }

    /// Did this voter cast a blank vote?
    pub fn voted_blank(&self) -> bool {
        self.has_voted && self.voted_for.is_none()
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// Fetch a voter, failing with `NotFound` if it does not exist.
    pub async fn get(voters: &Records<Voter>, id: Id) -> Result<Voter> {
        voters
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {id}")))
    }

    /// Fetch the voter a personal link points at. A link whose election does
    /// not match the voter's is treated as not found.
    pub async fn get_by_link(voters: &Records<Voter>, link: VoterLink) -> Result<Voter> {
        let voter = Self::get(voters, link.voter_id).await?;
        if voter.election_id != link.election_id {
            return Err(Error::not_found(format!("Voter link {link}")));
        }
        Ok(voter)
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

impl Record for VoterCore {
    const TABLE: Table = Table::Voters;
}
impl Record for Voter {
    const TABLE: Table = Table::Voters;
}
