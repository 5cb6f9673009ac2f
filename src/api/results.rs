use chrono::Utc;
use log::{debug, warn};
use rocket::{
    response::stream::{Event, EventStream},
    serde::json::Json,
    tokio::{select, sync::broadcast::error::RecvError},
    Route, Shutdown, State,
};

use crate::error::Result;
use crate::live::{ChangeFeed, ResultsCache};
use crate::model::{
    api::results::ElectionResults,
    common::tally::Tally,
    db::{Candidate, Election, Voter},
    mongodb::Id,
    store::{Records, ELECTION_INDEX},
};

pub fn routes() -> Vec<Route> {
    routes![election_results, election_events]
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    election_id: Id,
    elections: Records<Election>,
    candidates: Records<Candidate>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
    cache: &State<ResultsCache>,
) -> Result<Json<ElectionResults>> {
    let election = Election::get(&elections, election_id).await?;
    let now = Utc::now();
    if now < election.start_date {
        return Ok(Json(ElectionResults::NotYetAvailable {
            starts_at: election.start_date,
        }));
    }

    // Read the version before counting, so a vote landing mid-count makes
    // this entry stale rather than hiding the vote.
    let version = feed.version(election_id);
    let tally = match cache.get(election_id, version) {
        Some(tally) => tally,
        None => {
            debug!("Counting votes for election {election_id} at version {version}");
            let candidates = candidates.find_by(ELECTION_INDEX, election_id).await?;
            let voters = voters.find_by(ELECTION_INDEX, election_id).await?;
            let tally = Tally::count(&election, &candidates, &voters);
            cache.insert(election_id, version, tally)
        }
    };
    Ok(Json(ElectionResults::new(&election, &tally, now)))
}

/// Server-sent events for every committed change to one election.
/// A `lagged` event means some changes were missed and the client should reload.
#[get("/elections/<election_id>/events")]
async fn election_events(
    election_id: Id,
    elections: Records<Election>,
    feed: &State<ChangeFeed>,
    mut shutdown: Shutdown,
) -> Result<EventStream![]> {
    Election::get(&elections, election_id).await?;
    let mut changes = feed.subscribe();

    Ok(EventStream! {
        loop {
            let change = select! {
                change = changes.recv() => change,
                _ = &mut shutdown => break,
            };
            match change {
                Ok(change) if *change.election_id == election_id => {
                    yield Event::json(&change).event("change");
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event stream for election {election_id} missed {missed} changes");
                    yield Event::empty().event("lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
