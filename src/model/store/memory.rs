use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::trace;
use mongodb::bson::{Bson, Document};

use crate::error::Result;
use crate::model::mongodb::Id;

use super::{Store, Table, VoteOutcome, VoteRecord, HAS_VOTED, VOTES};

type Tables = HashMap<Table, Vec<Document>>;

/// A process-local document store.
///
/// All tables sit behind one lock, so every operation (including
/// `record_vote`) is serialised against every other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic mid-operation cannot leave a half-written document behind,
        // so a poisoned lock is still safe to use.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_id(document: &Document, id: Id) -> bool {
    document.get_object_id("_id").map_or(false, |oid| oid == *id)
}

fn find_mut(tables: &mut Tables, table: Table, id: Id) -> Option<&mut Document> {
    tables
        .get_mut(&table)
        .and_then(|rows| rows.iter_mut().find(|doc| has_id(doc, id)))
}

/// Increment an integer field in place, treating a missing field as zero.
fn increment(document: &mut Document, field: &str) {
    let next = match document.get(field) {
        Some(Bson::Int32(n)) => Bson::Int32(n + 1),
        Some(Bson::Int64(n)) => Bson::Int64(n + 1),
        _ => Bson::Int64(1),
    };
    document.insert(field, next);
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert(&self, table: Table, mut record: Document) -> Result<Id> {
        let id = Id::new();
        record.insert("_id", id);
        self.lock().entry(table).or_default().push(record);
        trace!("memory store: inserted {id} into {}", table.name());
        Ok(id)
    }

    async fn get(&self, table: Table, id: Id) -> Result<Option<Document>> {
        Ok(self
            .lock()
            .get(&table)
            .and_then(|rows| rows.iter().find(|doc| has_id(doc, id)))
            .cloned())
    }

    async fn patch(&self, table: Table, id: Id, fields: Document) -> Result<bool> {
        let mut tables = self.lock();
        match find_mut(&mut tables, table, id) {
            Some(document) => {
                for (key, value) in fields {
                    document.insert(key, value);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, table: Table, id: Id) -> Result<bool> {
        let mut tables = self.lock();
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|doc| !has_id(doc, id));
        Ok(rows.len() < before)
    }

    async fn query_by_index(
        &self,
        table: Table,
        field: &str,
        value: Bson,
    ) -> Result<Vec<Document>> {
        Ok(self
            .lock()
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|doc| doc.get(field) == Some(&value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, table: Table) -> Result<Vec<Document>> {
        Ok(self.lock().get(&table).cloned().unwrap_or_default())
    }

    async fn delete_by_index(&self, table: Table, field: &str, value: Bson) -> Result<u64> {
        let mut tables = self.lock();
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|doc| doc.get(field) != Some(&value));
        Ok((before - rows.len()) as u64)
    }

    async fn record_vote(&self, vote: VoteRecord) -> Result<VoteOutcome> {
        let mut tables = self.lock();

        // Check everything before writing anything.
        let voter = match find_mut(&mut tables, Table::Voters, vote.voter_id) {
            Some(voter) => voter,
            None => return Ok(VoteOutcome::VoterMissing),
        };
        if voter.get_bool(HAS_VOTED).unwrap_or(false) {
            return Ok(VoteOutcome::AlreadyVoted);
        }
        if let Some(candidate_id) = vote.candidate_id {
            if find_mut(&mut tables, Table::Candidates, candidate_id).is_none() {
                return Ok(VoteOutcome::CandidateMissing);
            }
        }

        if let Some(candidate_id) = vote.candidate_id {
            if let Some(candidate) = find_mut(&mut tables, Table::Candidates, candidate_id) {
                increment(candidate, VOTES);
            }
        }
        if let Some(voter) = find_mut(&mut tables, Table::Voters, vote.voter_id) {
            for (key, value) in vote.voter_patch() {
                voter.insert(key, value);
            }
        }
        Ok(VoteOutcome::Recorded)
    }
}
