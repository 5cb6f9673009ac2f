use chrono::Utc;
use log::debug;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::live::ChangeFeed;
use crate::logging::RequestId;
use crate::model::{
    api::ballot::{OpenedBallot, VoteReceipt, VoterBallot},
    common::{
        ballot::BallotStatus,
        link::VoterLink,
        vote::{VoteChoice, VoteTrigger},
    },
    db::{Candidate, Election, Voter},
    store::{Records, StoreHandle, ELECTION_INDEX},
};
use crate::voting::{cast_vote, BallotTimers};

pub fn routes() -> Vec<Route> {
    routes![voter_ballot, open_ballot, vote]
}

/// The landing page of a voter's personal link.
#[get("/voto/<link>")]
async fn voter_ballot(
    link: VoterLink,
    elections: Records<Election>,
    voters: Records<Voter>,
) -> Result<Json<VoterBallot>> {
    let voter = Voter::get_by_link(&voters, link).await?;
    let election = Election::get(&elections, link.election_id).await?;
    let status = BallotStatus::of(&election, &voter, Utc::now());
    Ok(Json(VoterBallot {
        voter: voter.into(),
        election: election.into(),
        status,
    }))
}

/// Show the voter their ballot and start the countdown.
#[post("/voto/<link>/open")]
async fn open_ballot(
    link: VoterLink,
    elections: Records<Election>,
    voters: Records<Voter>,
    candidates: Records<Candidate>,
    store: &State<StoreHandle>,
    feed: &State<ChangeFeed>,
    timers: &State<BallotTimers>,
) -> Result<Json<OpenedBallot>> {
    let voter = Voter::get_by_link(&voters, link).await?;
    let election = Election::get(&elections, link.election_id).await?;
    BallotStatus::of(&election, &voter, Utc::now()).ensure_open(&voter)?;

    let candidates = candidates.find_by(ELECTION_INDEX, election.id).await?;
    let deadline = timers
        .open(link, store.inner().clone(), feed.inner().clone())
        .await;
    Ok(Json(OpenedBallot {
        election: election.into(),
        candidates: candidates.into_iter().map(Into::into).collect(),
        deadline,
    }))
}

#[post("/voto/<link>", data = "<choice>", format = "json")]
async fn vote(
    link: VoterLink,
    choice: Json<VoteChoice>,
    request_id: &RequestId,
    store: &State<StoreHandle>,
    feed: &State<ChangeFeed>,
    timers: &State<BallotTimers>,
) -> Result<Json<VoteReceipt>> {
    let receipt = cast_vote(store, feed, link, choice.0, VoteTrigger::Explicit).await?;
    if timers.cancel(link.voter_id).await {
        debug!("req{request_id}: stopped ballot countdown for voter {}", link.voter_id);
    }
    Ok(Json(receipt))
}
