use log::info;
use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::live::{ChangeFeed, ChangeKind, ResultsCache};
use crate::model::{
    api::election::{ElectionDescription, ElectionDetails, ElectionSpec},
    db::{Candidate, Election, NewElection, Voter},
    mongodb::Id,
    store::{Records, ELECTION_INDEX},
};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        create_election,
        election_details,
        update_election,
        activate_election,
        delete_election,
    ]
}

#[get("/elections")]
async fn list_elections(elections: Records<Election>) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = elections.find_all().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    spec: Json<ElectionSpec>,
    new_elections: Records<NewElection>,
    elections: Records<Election>,
    feed: &State<ChangeFeed>,
) -> Result<Json<ElectionDescription>> {
    spec.validate()?;

    // Create and insert the election.
    let election: NewElection = spec.0.into();
    let election_id = new_elections.insert_one(&election).await?;
    feed.publish(election_id, ChangeKind::Election);
    info!("Created election {election_id} '{}'", election.name);

    // Retrieve the full election information including ID.
    let election = Election::get(&elections, election_id).await?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>")]
async fn election_details(
    election_id: Id,
    elections: Records<Election>,
    candidates: Records<Candidate>,
    voters: Records<Voter>,
) -> Result<Json<ElectionDetails>> {
    let election = Election::get(&elections, election_id).await?;
    let candidates = candidates.find_by(ELECTION_INDEX, election_id).await?;
    let voters = voters.find_by(ELECTION_INDEX, election_id).await?;
    Ok(Json(ElectionDetails {
        election: election.into(),
        candidates: candidates.into_iter().map(Into::into).collect(),
        voters: voters.into_iter().map(Into::into).collect(),
    }))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn update_election(
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Records<Election>,
    feed: &State<ChangeFeed>,
) -> Result<Json<ElectionDescription>> {
    // Check we are allowed to modify it.
    Election::get_inactive(&elections, election_id).await?;
    spec.validate()?;

    // Overwrite with the new spec.
    let update: NewElection = spec.0.into();
    if !elections.patch(election_id, update.update_doc()).await? {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    feed.publish(election_id, ChangeKind::Election);

    let election = Election::get(&elections, election_id).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/activate")]
async fn activate_election(
    election_id: Id,
    elections: Records<Election>,
    feed: &State<ChangeFeed>,
) -> Result<Json<ElectionDescription>> {
    let mut election = Election::get(&elections, election_id).await?;

    // Activation is one-way, so activating twice changes nothing.
    if !election.is_active {
        elections
            .patch(election_id, doc! { "is_active": true })
            .await?;
        election.is_active = true;
        feed.publish(election_id, ChangeKind::Election);
        info!("Activated election {election_id}");
    }

    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    election_id: Id,
    elections: Records<Election>,
    candidates: Records<Candidate>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
    results: &State<ResultsCache>,
) -> Result<()> {
    Election::get_inactive(&elections, election_id).await?;

    // Dependents first, so an interrupted delete can simply be retried.
    let deleted_candidates = candidates.delete_by(ELECTION_INDEX, election_id).await?;
    let deleted_voters = voters.delete_by(ELECTION_INDEX, election_id).await?;
    elections.delete(election_id).await?;

    results.evict(election_id);
    feed.publish(election_id, ChangeKind::Deleted);
    info!(
        "Deleted election {election_id} with {deleted_candidates} candidates and {deleted_voters} voters"
    );
    Ok(())
}
