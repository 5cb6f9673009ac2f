//! The document store that owns all durable state.
//!
//! Domain code talks to the store through a handful of document-level
//! operations on a fixed set of tables. [`Records`] layers typed
//! (de)serialisation on top, the same way a typed MongoDB collection does.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::{
    doc, from_document, to_document, Bson, DateTime as BsonDateTime, Document,
};
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;
use crate::model::mongodb::Id;

mod memory;

pub use memory::MemoryStore;

/// The tables (collections) known to the store.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Table {
    Elections,
    Candidates,
    Voters,
}

impl Table {
    /// The collection name backing this table.
    pub const fn name(self) -> &'static str {
        match self {
            Table::Elections => "elections",
            Table::Candidates => "candidates",
            Table::Voters => "voters",
        }
    }
}

/// Name of the field that scopes candidates and voters to their election.
pub const ELECTION_INDEX: &str = "election_id";

/// Voter field: whether the voter has voted.
pub const HAS_VOTED: &str = "has_voted";
/// Voter field: the candidate voted for, absent for a blank vote.
pub const VOTED_FOR: &str = "voted_for";
/// Voter field: when the vote was recorded.
pub const VOTED_AT: &str = "voted_at";
/// Candidate field: the running tally.
pub const VOTES: &str = "votes";

/// The writes making up a single vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub voter_id: Id,
    /// `None` for a blank vote.
    pub candidate_id: Option<Id>,
    pub voted_at: DateTime<Utc>,
}

impl VoteRecord {
    /// The fields to set on the voter. A blank vote leaves `voted_for` unset.
    pub fn voter_patch(&self) -> Document {
        let mut fields = doc! {
            HAS_VOTED: true,
            VOTED_AT: BsonDateTime::from_chrono(self.voted_at),
        };
        if let Some(candidate_id) = self.candidate_id {
            fields.insert(VOTED_FOR, candidate_id);
        }
        fields
    }
}

/// What happened when a [`VoteRecord`] was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Voter patched and (if non-blank) the tally incremented.
    Recorded,
    /// The voter had already voted; nothing was written.
    AlreadyVoted,
    /// The voter no longer exists; nothing was written.
    VoterMissing,
    /// The candidate no longer exists; nothing was written.
    CandidateMissing,
}

/// Document-level store operations.
///
/// Every method is an independent, serialisable operation. `record_vote` is
/// the only multi-record write and must be atomic: either the voter patch and
/// the tally increment both apply, or neither does.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a record, assigning it a fresh ID.
    async fn insert(&self, table: Table, record: Document) -> Result<Id>;

    async fn get(&self, table: Table, id: Id) -> Result<Option<Document>>;

    /// Overwrite the given fields. Returns false if the record does not exist.
    async fn patch(&self, table: Table, id: Id, fields: Document) -> Result<bool>;

    /// Returns false if the record did not exist.
    async fn delete(&self, table: Table, id: Id) -> Result<bool>;

    /// All records whose `field` equals `value`, in insertion order.
    async fn query_by_index(&self, table: Table, field: &str, value: Bson)
        -> Result<Vec<Document>>;

    /// All records in the table, in insertion order.
    async fn list(&self, table: Table) -> Result<Vec<Document>>;

    /// Delete every record whose `field` equals `value`, returning how many went.
    async fn delete_by_index(&self, table: Table, field: &str, value: Bson) -> Result<u64>;

    /// Atomically mark the voter as having voted and bump the candidate tally.
    async fn record_vote(&self, vote: VoteRecord) -> Result<VoteOutcome>;
}

/// The store as held in Rocket's managed state.
pub type StoreHandle = Arc<dyn Store>;

/// A type that lives in one of the store's tables.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;
}

/// A typed view on one table of the store.
pub struct Records<T> {
    store: StoreHandle,
    _record: PhantomData<fn() -> T>,
}

impl<T> Records<T>
where
    T: Record,
{
    /// Get a handle on this table in the given store.
    pub fn from_store(store: &StoreHandle) -> Self {
        Self {
            store: store.clone(),
            _record: PhantomData,
        }
    }

    pub async fn insert_one(&self, record: &T) -> Result<Id> {
        let document = to_document(record)?;
        self.store.insert(T::TABLE, document).await
    }

    pub async fn find_by_id(&self, id: Id) -> Result<Option<T>> {
        match self.store.get(T::TABLE, id).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Find all records whose indexed `field` equals `value`.
    pub async fn find_by(&self, field: &str, value: impl Into<Bson>) -> Result<Vec<T>> {
        let documents = self
            .store
            .query_by_index(T::TABLE, field, value.into())
            .await?;
        Self::decode_all(documents)
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        let documents = self.store.list(T::TABLE).await?;
        Self::decode_all(documents)
    }

    pub async fn patch(&self, id: Id, fields: Document) -> Result<bool> {
        self.store.patch(T::TABLE, id, fields).await
    }

    pub async fn delete(&self, id: Id) -> Result<bool> {
        self.store.delete(T::TABLE, id).await
    }

    pub async fn delete_by(&self, field: &str, value: impl Into<Bson>) -> Result<u64> {
        self.store
            .delete_by_index(T::TABLE, field, value.into())
            .await
    }

    /// The underlying store.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    fn decode_all(documents: Vec<Document>) -> Result<Vec<T>> {
        documents
            .into_iter()
            .map(|document| from_document(document).map_err(Into::into))
            .collect()
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Records<T>
where
    T: Record,
{
    type Error = ();

    /// Get the store from the managed state and wrap it in a typed view.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<StoreHandle>>().await {
            request::Outcome::Success(store) => request::Outcome::Success(Records::from_store(store)),
            _ => request::Outcome::Error((Status::InternalServerError, ())),
        }
    }
}
