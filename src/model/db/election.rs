use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    mongodb::Id,
    store::{Record, Records, Table},
};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Voting opens at this instant.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// Voting closes at this instant.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    /// Set once, by activation. There is no way back.
    pub is_active: bool,
    /// Whether voters may explicitly vote blank.
    pub has_blank_vote: bool,
}

impl ElectionCore {
    /// A new, inactive election.
    pub fn new(
        name: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        has_blank_vote: bool,
    ) -> Self {
        Self {
            name,
            start_date,
            end_date,
            is_active: false,
            has_blank_vote,
        }
    }

    /// Is `now` inside the voting window (both ends inclusive)?
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    /// The fields overwritten by an update.
    pub fn update_doc(&self) -> Document {
        doc! {
            "name": self.name.as_str(),
            "start_date": mongodb::bson::DateTime::from_chrono(self.start_date),
            "end_date": mongodb::bson::DateTime::from_chrono(self.end_date),
            "has_blank_vote": self.has_blank_vote,
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Fetch an election, failing with `NotFound` if it does not exist.
    pub async fn get(elections: &Records<Election>, id: Id) -> Result<Election> {
        elections
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// Fetch an election that may still be structurally edited.
    pub async fn get_inactive(elections: &Records<Election>, id: Id) -> Result<Election> {
        let election = Self::get(elections, id).await?;
        if election.is_active {
            return Err(Error::ElectionActive(id));
        }
        Ok(election)
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

impl Record for ElectionCore {
    const TABLE: Table = Table::Elections;
}
impl Record for Election {
    const TABLE: Table = Table::Elections;
}


#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson::{from_document, to_document};

    #[test]
    fn stored_layout() {
        let core = ElectionCore::current_example();
        let document = to_document(&core).unwrap();
        assert!(document.get_datetime("start_date").is_ok());
        assert!(!document.get_bool("is_active").unwrap());

        let mut document = document;
        let id = Id::new();
        document.insert("_id", id);
        let election: Election = from_document(document).unwrap();
        assert_eq!(election.id, id);
        assert_eq!(election.election, core);
    }

    #[test]
    fn window_is_inclusive() {
        let core = ElectionCore::current_example();
        assert!(core.is_within_window(core.start_date));
        assert!(core.is_within_window(core.end_date));
        assert!(!core.is_within_window(core.start_date - Duration::milliseconds(1)));
        assert!(!core.is_within_window(core.end_date + Duration::milliseconds(1)));
    }
}
