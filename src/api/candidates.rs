use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::live::{ChangeFeed, ChangeKind};
use crate::model::{
    api::candidate::{CandidateDescription, CandidateSpec, ElectionCandidates},
    db::{Candidate, CandidateCore, Election, NewCandidate},
    mongodb::Id,
    store::{Records, ELECTION_INDEX},
};

pub fn routes() -> Vec<Route> {
    routes![
        election_candidates,
        create_candidate,
        rename_candidate,
        delete_candidate,
    ]
}

#[get("/elections/<election_id>/candidates")]
async fn election_candidates(
    election_id: Id,
    elections: Records<Election>,
    candidates: Records<Candidate>,
) -> Result<Json<ElectionCandidates>> {
    let election = Election::get(&elections, election_id).await?;
    let candidates = candidates.find_by(ELECTION_INDEX, election_id).await?;
    Ok(Json(ElectionCandidates {
        election: election.into(),
        candidates: candidates.into_iter().map(Into::into).collect(),
    }))
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    election_id: Id,
    spec: Json<CandidateSpec>,
    elections: Records<Election>,
    new_candidates: Records<NewCandidate>,
    candidates: Records<Candidate>,
    feed: &State<ChangeFeed>,
) -> Result<Json<CandidateDescription>> {
    spec.validate()?;
    Election::get_inactive(&elections, election_id).await?;

    let candidate = CandidateCore::new(spec.name.trim().to_string(), election_id);
    let candidate_id = new_candidates.insert_one(&candidate).await?;
    feed.publish(election_id, ChangeKind::Candidates);

    let candidate = Candidate::get(&candidates, candidate_id).await?;
    Ok(Json(candidate.into()))
}

#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn rename_candidate(
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    elections: Records<Election>,
    candidates: Records<Candidate>,
    feed: &State<ChangeFeed>,
) -> Result<Json<CandidateDescription>> {
    spec.validate()?;
    let mut candidate = Candidate::get(&candidates, candidate_id).await?;
    Election::get_inactive(&elections, candidate.election_id).await?;

    let name = spec.name.trim().to_string();
    if !candidates.patch(candidate_id, doc! { "name": name.as_str() }).await? {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    feed.publish(candidate.election_id, ChangeKind::Candidates);

    candidate.name = name;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    candidate_id: Id,
    elections: Records<Election>,
    candidates: Records<Candidate>,
    feed: &State<ChangeFeed>,
) -> Result<()> {
    let candidate = Candidate::get(&candidates, candidate_id).await?;
    Election::get_inactive(&elections, candidate.election_id).await?;

    candidates.delete(candidate_id).await?;
    feed.publish(candidate.election_id, ChangeKind::Candidates);
    Ok(())
}
