use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::FindOptions,
    Client, ClientSession, Collection, Database, IndexModel,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    mongodb::Id,
    store::{Store, Table, VoteOutcome, VoteRecord, ELECTION_INDEX, HAS_VOTED, VOTES},
};

/// How many times a vote transaction is retried after a transient conflict.
const VOTE_ATTEMPTS: usize = 3;

/// The production store, backed by a MongoDB database.
///
/// Votes are recorded in multi-document transactions, so the database must
/// be deployed as a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn collection(&self, table: Table) -> Collection<Document> {
        self.db.collection(table.name())
    }

    /// One attempt at the vote transaction. Aborts (and reports why) if any
    /// precondition fails part-way.
    async fn try_record_vote(
        &self,
        vote: &VoteRecord,
        session: &mut ClientSession,
    ) -> std::result::Result<VoteOutcome, DbError> {
        session.start_transaction(None).await?;

        let filter = doc! {
            "_id": vote.voter_id,
            HAS_VOTED: false,
        };
        let update = doc! {
            "$set": vote.voter_patch(),
        };
        let result = self
            .collection(Table::Voters)
            .update_one_with_session(filter, update, None, session)
            .await?;
        if result.matched_count == 0 {
            session.abort_transaction().await?;
            let exists = self
                .collection(Table::Voters)
                .find_one(vote.voter_id.as_doc(), None)
                .await?
                .is_some();
            return Ok(if exists {
                VoteOutcome::AlreadyVoted
            } else {
                VoteOutcome::VoterMissing
            });
        }

        if let Some(candidate_id) = vote.candidate_id {
            let update = doc! {
                "$inc": { VOTES: 1_i64 }
            };
            let result = self
                .collection(Table::Candidates)
                .update_one_with_session(candidate_id.as_doc(), update, None, session)
                .await?;
            if result.matched_count == 0 {
                session.abort_transaction().await?;
                return Ok(VoteOutcome::CandidateMissing);
            }
        }

        session.commit_transaction().await?;
        Ok(VoteOutcome::Recorded)
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert(&self, table: Table, record: Document) -> Result<Id> {
        let inserted = self.collection(table).insert_one(record, None).await?;
        match inserted.inserted_id {
            Bson::ObjectId(oid) => Ok(oid.into()),
            other => Err(Error::Internal(format!(
                "Database assigned a non-ObjectId key {other} in {}",
                table.name()
            ))),
        }
    }

    async fn get(&self, table: Table, id: Id) -> Result<Option<Document>> {
        Ok(self.collection(table).find_one(id.as_doc(), None).await?)
    }

    async fn patch(&self, table: Table, id: Id, fields: Document) -> Result<bool> {
        let update = doc! {
            "$set": fields,
        };
        let result = self
            .collection(table)
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete(&self, table: Table, id: Id) -> Result<bool> {
        let result = self.collection(table).delete_one(id.as_doc(), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn query_by_index(
        &self,
        table: Table,
        field: &str,
        value: Bson,
    ) -> Result<Vec<Document>> {
        let filter = doc! {
            field: value,
        };
        let in_insertion_order = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let documents = self
            .collection(table)
            .find(filter, in_insertion_order)
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }

    async fn list(&self, table: Table) -> Result<Vec<Document>> {
        let in_insertion_order = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let documents = self
            .collection(table)
            .find(None, in_insertion_order)
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }

    async fn delete_by_index(&self, table: Table, field: &str, value: Bson) -> Result<u64> {
        let filter = doc! {
            field: value,
        };
        let result = self.collection(table).delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn record_vote(&self, vote: VoteRecord) -> Result<VoteOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            match self.try_record_vote(&vote, &mut session).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR) && attempt < VOTE_ATTEMPTS => {
                    warn!(
                        "Vote transaction for voter {} conflicted (attempt {attempt}), retrying",
                        vote.voter_id
                    );
                    // Clear out whatever is left of the failed transaction.
                    let _ = session.abort_transaction().await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> std::result::Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    for table in [Table::Candidates, Table::Voters] {
        let by_election = IndexModel::builder()
            .keys(doc! { ELECTION_INDEX: 1 })
            .build();
        db.collection::<Document>(table.name())
            .create_index(by_election, None)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::model::store::VOTED_FOR;

    /// Runs against the replica set named by `VOTO_TEST_DB_URI`.
    #[test]
    #[ignore = "requires a MongoDB replica set"]
    fn vote_transaction() {
        let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let uri = std::env::var("VOTO_TEST_DB_URI").unwrap();
            let client = Client::with_uri_str(uri).await.unwrap();
            let db = client.database(&format!("test{}", Id::new()));
            ensure_indexes_exist(&db).await.unwrap();
            let store = MongoStore::new(client, db.clone());

            let voter = store
                .insert(Table::Voters, doc! { HAS_VOTED: false })
                .await
                .unwrap();
            let candidate = store
                .insert(Table::Candidates, doc! { VOTES: 0_i64 })
                .await
                .unwrap();
            let vote = VoteRecord {
                voter_id: voter,
                candidate_id: Some(candidate),
                voted_at: Utc::now(),
            };

            assert_eq!(store.record_vote(vote.clone()).await.unwrap(), VoteOutcome::Recorded);
            assert_eq!(store.record_vote(vote).await.unwrap(), VoteOutcome::AlreadyVoted);

            let voter = store.get(Table::Voters, voter).await.unwrap().unwrap();
            assert_eq!(voter.get_object_id(VOTED_FOR).unwrap(), *candidate);
            let candidate = store.get(Table::Candidates, candidate).await.unwrap().unwrap();
            assert_eq!(candidate.get_i64(VOTES).unwrap(), 1);

            db.drop(None).await.unwrap();
        });
    }
}
