//! Change notifications and the read-model cache they keep fresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;
use rocket::tokio::sync::broadcast;
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::tally::Tally, mongodb::Id};

/// Changes buffered per subscriber before it starts missing them.
const FEED_CAPACITY: usize = 256;

/// What part of an election changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Election,
    Candidates,
    Voters,
    Vote,
    Deleted,
}

/// A committed change to one election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub election_id: ApiId,
    pub kind: ChangeKind,
    /// The election's version after this change.
    pub version: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Feed {
    sender: broadcast::Sender<Change>,
    versions: Mutex<HashMap<Id, u64>>,
}

/// Publishes every committed mutation and tracks a version per election.
///
/// Cloning gives another handle on the same feed.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Feed>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Feed {
                sender,
                versions: Default::default(),
            }),
        }
    }

    /// Record a change to `election_id` and notify subscribers.
    /// Call this only once the change has been written.
    pub fn publish(&self, election_id: Id, kind: ChangeKind) -> Change {
        let version = {
            let mut versions = lock(&self.inner.versions);
            let version = versions.entry(election_id).or_default();
            *version += 1;
            *version
        };
        let change = Change {
            election_id: election_id.into(),
            kind,
            version,
        };
        // Nobody listening is fine.
        if self.inner.sender.send(change).is_err() {
            trace!("No subscribers for change {change:?}");
        }
        change
    }

    /// The current version of an election. Unchanged elections are at zero.
    pub fn version(&self, election_id: Id) -> u64 {
        lock(&self.inner.versions)
            .get(&election_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.inner.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Election tallies, each remembered with the version it was computed at.
#[derive(Default)]
pub struct ResultsCache {
    entries: Mutex<HashMap<Id, (u64, Arc<Tally>)>>,
}

impl ResultsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached tally, if it was computed at exactly `version`.
    pub fn get(&self, election_id: Id, version: u64) -> Option<Arc<Tally>> {
        match lock(&self.entries).get(&election_id) {
            Some((cached, tally)) if *cached == version => Some(tally.clone()),
            _ => None,
        }
    }

    pub fn insert(&self, election_id: Id, version: u64, tally: Tally) -> Arc<Tally> {
        let tally = Arc::new(tally);
        let mut entries = lock(&self.entries);
        // Never replace a newer entry with an older one.
        match entries.get(&election_id) {
            Some((cached, _)) if *cached > version => {}
            _ => {
                entries.insert(election_id, (version, tally.clone()));
            }
        }
        tally
    }

    pub fn evict(&self, election_id: Id) {
        lock(&self.entries).remove(&election_id);
    }
}
