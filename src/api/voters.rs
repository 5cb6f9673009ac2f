use log::{debug, info};
use mongodb::bson::doc;
use rocket::{http::ContentType, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::live::{ChangeFeed, ChangeKind};
use crate::model::{
    api::{
        roll::{read_roll, write_links},
        voter::{BulkDeleteReport, BulkDeleteRequest, VoterDescription, VoterSpec, VoterUrl},
    },
    common::link::VoterLink,
    db::{Election, NewVoter, Voter},
    mongodb::Id,
    store::{Records, ELECTION_INDEX},
};

pub fn routes() -> Vec<Route> {
    routes![
        create_voter,
        create_voters,
        import_voters,
        delete_voters,
        generate_links,
        export_links,
    ]
}

/// Insert voters one by one. Everything is validated before the first insert;
/// a failed insert leaves the earlier ones in place.
async fn add_voters(
    election_id: Id,
    specs: Vec<VoterSpec>,
    new_voters: &Records<NewVoter>,
    voters: &Records<Voter>,
) -> Result<Vec<VoterDescription>> {
    for spec in &specs {
        spec.validate()?;
    }

    let mut added = Vec::with_capacity(specs.len());
    for spec in specs {
        let voter_id = new_voters.insert_one(&spec.into_voter(election_id)).await?;
        added.push(Voter::get(voters, voter_id).await?.into());
    }
    Ok(added)
}

#[post("/elections/<election_id>/voters", data = "<spec>", format = "json")]
async fn create_voter(
    election_id: Id,
    spec: Json<VoterSpec>,
    elections: Records<Election>,
    new_voters: Records<NewVoter>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
) -> Result<Json<VoterDescription>> {
    spec.validate()?;
    Election::get_inactive(&elections, election_id).await?;

    let mut added = add_voters(election_id, vec![spec.0], &new_voters, &voters).await?;
    feed.publish(election_id, ChangeKind::Voters);
    // Exactly one voter was added.
    Ok(Json(added.remove(0)))
}

#[post("/elections/<election_id>/voters/bulk", data = "<specs>", format = "json")]
async fn create_voters(
    election_id: Id,
    specs: Json<Vec<VoterSpec>>,
    elections: Records<Election>,
    new_voters: Records<NewVoter>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
) -> Result<Json<Vec<VoterDescription>>> {
    Election::get_inactive(&elections, election_id).await?;

    let result = add_voters(election_id, specs.0, &new_voters, &voters).await;
    // Earlier inserts stand even if a later one failed.
    feed.publish(election_id, ChangeKind::Voters);
    let added = result?;
    info!("Added {} voters to election {election_id}", added.len());
    Ok(Json(added))
}

/// Bulk-load voters from a CSV roll.
#[post("/elections/<election_id>/voters/import", data = "<roll>")]
async fn import_voters(
    election_id: Id,
    roll: String,
    elections: Records<Election>,
    new_voters: Records<NewVoter>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
) -> Result<Json<Vec<VoterDescription>>> {
    Election::get_inactive(&elections, election_id).await?;
    let specs = read_roll(roll.as_bytes())?;

    let result = add_voters(election_id, specs, &new_voters, &voters).await;
    feed.publish(election_id, ChangeKind::Voters);
    let added = result?;
    info!("Imported {} voters into election {election_id}", added.len());
    Ok(Json(added))
}

#[delete("/elections/<election_id>/voters", data = "<request>", format = "json")]
async fn delete_voters(
    election_id: Id,
    request: Json<BulkDeleteRequest>,
    elections: Records<Election>,
    voters: Records<Voter>,
    feed: &State<ChangeFeed>,
) -> Result<Json<BulkDeleteReport>> {
    Election::get_inactive(&elections, election_id).await?;

    let mut report = BulkDeleteReport::default();
    for voter_id in request.0.voter_ids {
        let belongs = voters
            .find_by_id(*voter_id)
            .await?
            .map_or(false, |voter| voter.election_id == election_id);
        if belongs && voters.delete(*voter_id).await? {
            report.deleted.push(voter_id);
        } else {
            debug!("Not deleting voter {voter_id}: not on the roll of election {election_id}");
            report.skipped.push(voter_id);
        }
    }

    feed.publish(election_id, ChangeKind::Voters);
    Ok(Json(report))
}

/// Give every voter of the election their personal link.
async fn link_voters(
    election_id: Id,
    elections: &Records<Election>,
    voters: &Records<Voter>,
    config: &Config,
    feed: &ChangeFeed,
) -> Result<Vec<VoterUrl>> {
    Election::get_inactive(elections, election_id).await?;

    let roll = voters.find_by(ELECTION_INDEX, election_id).await?;
    let mut urls = Vec::with_capacity(roll.len());
    for voter in roll {
        let url = VoterLink::new(election_id, voter.id).url(config.site_url());
        voters
            .patch(voter.id, doc! { "generated_link": url.as_str() })
            .await?;
        urls.push(VoterUrl {
            name: voter.voter.name,
            email: voter.voter.email,
            url,
        });
    }

    feed.publish(election_id, ChangeKind::Voters);
    info!("Generated {} voter links for election {election_id}", urls.len());
    Ok(urls)
}

#[post("/elections/<election_id>/voters/links")]
async fn generate_links(
    election_id: Id,
    elections: Records<Election>,
    voters: Records<Voter>,
    config: &State<Config>,
    feed: &State<ChangeFeed>,
) -> Result<Json<Vec<VoterUrl>>> {
    let urls = link_voters(election_id, &elections, &voters, config, feed).await?;
    Ok(Json(urls))
}

#[post("/elections/<election_id>/voters/links.csv")]
async fn export_links(
    election_id: Id,
    elections: Records<Election>,
    voters: Records<Voter>,
    config: &State<Config>,
    feed: &State<ChangeFeed>,
) -> Result<(ContentType, String)> {
    let urls = link_voters(election_id, &elections, &voters, config, feed).await?;
    Ok((ContentType::CSV, write_links(&urls)?))
}
