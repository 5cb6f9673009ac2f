use chrono::Utc;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::live::{ChangeFeed, ChangeKind};
use crate::model::{
    api::ballot::VoteReceipt,
    common::{
        ballot::BallotStatus,
        link::VoterLink,
        vote::{VoteChoice, VoteTrigger},
    },
    db::{Candidate, Election, Voter},
    store::{Records, StoreHandle, VoteOutcome, VoteRecord},
};

/// Record `choice` for the voter behind `link`.
///
/// Checks run before anything is written: the voter and election must
/// exist, the ballot must be open, and the choice must be valid for the
/// election. An explicit blank vote needs the election's blank option; a
/// blank vote from an expired countdown is always accepted. The write itself
/// is atomic and refuses a voter who has already voted.
pub async fn cast_vote(
    store: &StoreHandle,
    feed: &ChangeFeed,
    link: VoterLink,
    choice: VoteChoice,
    trigger: VoteTrigger,
) -> Result<VoteReceipt> {
    let now = Utc::now();

    let voter = Voter::get_by_link(&Records::from_store(store), link).await?;
    let election = Election::get(&Records::from_store(store), link.election_id).await?;
    BallotStatus::of(&election, &voter, now).ensure_open(&voter)?;

    match choice.candidate() {
        Some(candidate_id) => {
            let candidate = Candidate::get(&Records::from_store(store), candidate_id).await?;
            if candidate.election_id != election.id {
                return Err(Error::not_found(format!(
                    "Candidate {candidate_id} in election {}",
                    election.id
                )));
            }
        }
        None if trigger == VoteTrigger::Explicit && !election.has_blank_vote => {
            return Err(Error::BlankNotAllowed(election.id));
        }
        None => {}
    }

    let vote = VoteRecord {
        voter_id: voter.id,
        candidate_id: choice.candidate(),
        voted_at: now,
    };
    match store.record_vote(vote).await? {
        VoteOutcome::Recorded => {}
        VoteOutcome::AlreadyVoted => return Err(Error::AlreadyVoted(voter.id)),
        VoteOutcome::VoterMissing => return Err(Error::not_found(format!("Voter {}", voter.id))),
        VoteOutcome::CandidateMissing => {
            return Err(Error::not_found(format!(
                "Candidate {}",
                choice.candidate().map(|id| id.to_string()).unwrap_or_default()
            )))
        }
    }
    feed.publish(election.id, ChangeKind::Vote);

    match trigger {
        VoteTrigger::Explicit => info!("Voter {} voted in election {}", voter.id, election.id),
        VoteTrigger::Expired => info!(
            "Ballot countdown for voter {} expired, cast a blank vote in election {}",
            voter.id, election.id
        ),
    }
    debug!("Vote by {} recorded as {choice:?}", voter.id);

    Ok(VoteReceipt {
        voter_id: voter.id.into(),
        election_id: election.id.into(),
        choice,
        trigger,
        voted_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::model::{
        db::{CandidateCore, ElectionCore, NewCandidate, NewElection, NewVoter, VoterCore},
        mongodb::Id,
        store::{MemoryStore, ELECTION_INDEX},
    };

    struct Fixture {
        store: StoreHandle,
        feed: ChangeFeed,
        election: Id,
        candidates: Vec<Id>,
        voters: Vec<Id>,
    }

    impl Fixture {
        async fn new(election: NewElection) -> Self {
            let store: StoreHandle = Arc::new(MemoryStore::new());
            let election = Records::<NewElection>::from_store(&store)
                .insert_one(&election)
                .await
                .unwrap();
            let mut candidates = vec![];
            for candidate in [CandidateCore::example1(election), CandidateCore::example2(election)] {
                let id = Records::<NewCandidate>::from_store(&store)
                    .insert_one(&candidate)
                    .await
                    .unwrap();
                candidates.push(id);
            }
            let mut voters = vec![];
            for voter in [
                VoterCore::example1(election),
                VoterCore::example2(election),
                VoterCore::example3(election),
            ] {
                let id = Records::<NewVoter>::from_store(&store)
                    .insert_one(&voter)
                    .await
                    .unwrap();
                voters.push(id);
            }
            Self {
                store,
                feed: ChangeFeed::new(),
                election,
                candidates,
                voters,
            }
        }

        async fn active(mut election: NewElection) -> Self {
            election.is_active = true;
            Self::new(election).await
        }

        fn link(&self, voter: usize) -> VoterLink {
            VoterLink::new(self.election, self.voters[voter])
        }

        fn candidate(&self, candidate: usize) -> VoteChoice {
            VoteChoice::Candidate(self.candidates[candidate].into())
        }

        async fn cast(
            &self,
            voter: usize,
            choice: VoteChoice,
            trigger: VoteTrigger,
        ) -> Result<VoteReceipt> {
            cast_vote(&self.store, &self.feed, self.link(voter), choice, trigger).await
        }

        async fn votes(&self, candidate: usize) -> u64 {
            Candidate::get(&Records::from_store(&self.store), self.candidates[candidate])
                .await
                .unwrap()
                .votes
        }

        async fn voter(&self, voter: usize) -> Voter {
            Voter::get(&Records::from_store(&self.store), self.voters[voter])
                .await
                .unwrap()
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        rocket::tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn votes_update_exactly_one_tally() {
        block_on(async {
            let fixture = Fixture::active(ElectionCore::current_example()).await;
            let receipt = fixture
                .cast(0, fixture.candidate(0), VoteTrigger::Explicit)
                .await
                .unwrap();
            assert_eq!(*receipt.voter_id, fixture.voters[0]);
            assert_eq!(fixture.votes(0).await, 1);
            assert_eq!(fixture.votes(1).await, 0);

            let voter = fixture.voter(0).await;
            assert!(voter.has_voted);
            assert_eq!(voter.voted_for, Some(fixture.candidates[0]));
            assert!(voter.voted_at().is_some());
            assert_eq!(fixture.feed.version(fixture.election), 1);
        });
    }

    #[test]
    fn second_vote_is_rejected() {
        block_on(async {
            let fixture = Fixture::active(ElectionCore::current_example()).await;
            fixture
                .cast(0, fixture.candidate(0), VoteTrigger::Explicit)
                .await
                .unwrap();
            let again = fixture.cast(0, fixture.candidate(1), VoteTrigger::Explicit).await;
            assert!(matches!(again, Err(Error::AlreadyVoted(id)) if id == fixture.voters[0]));
            assert_eq!(fixture.votes(0).await, 1);
            assert_eq!(fixture.votes(1).await, 0);
            assert_eq!(fixture.voter(0).await.voted_for, Some(fixture.candidates[0]));
        });
    }

    #[test]
    fn blank_votes() {
        block_on(async {
            let fixture = Fixture::active(ElectionCore::current_example()).await;
            fixture
                .cast(0, VoteChoice::Blank, VoteTrigger::Explicit)
                .await
                .unwrap();
            let voter = fixture.voter(0).await;
            assert!(voter.voted_blank());
            assert!(voter.voted_at().is_some());
            assert_eq!(fixture.votes(0).await + fixture.votes(1).await, 0);
        });
    }

    #[test]
    fn blank_needs_the_option_unless_expired() {
        block_on(async {
            let mut election = ElectionCore::current_example();
            election.has_blank_vote = false;
            let fixture = Fixture::active(election).await;

            let explicit = fixture.cast(0, VoteChoice::Blank, VoteTrigger::Explicit).await;
            assert!(matches!(explicit, Err(Error::BlankNotAllowed(_))));
            assert!(!fixture.voter(0).await.has_voted);

            fixture
                .cast(0, VoteChoice::Blank, VoteTrigger::Expired)
                .await
                .unwrap();
            assert!(fixture.voter(0).await.voted_blank());
        });
    }

    #[test]
    fn closed_elections_refuse_votes() {
        block_on(async {
            let inactive = Fixture::new(ElectionCore::current_example()).await;
            let result = inactive.cast(0, inactive.candidate(0), VoteTrigger::Explicit).await;
            assert!(matches!(result, Err(Error::ElectionClosed(_))));

            let ended = Fixture::active(ElectionCore::past_example()).await;
            let result = ended.cast(0, VoteChoice::Blank, VoteTrigger::Expired).await;
            assert!(matches!(result, Err(Error::ElectionClosed(_))));

            let future = Fixture::active(ElectionCore::future_example()).await;
            let result = future.cast(0, future.candidate(1), VoteTrigger::Explicit).await;
            assert!(matches!(result, Err(Error::ElectionClosed(_))));
            assert_eq!(future.votes(1).await, 0);
        });
    }

    #[test]
    fn foreign_candidates_and_links_are_not_found() {
        block_on(async {
            let fixture = Fixture::active(ElectionCore::current_example()).await;
            let foreign = Records::<NewCandidate>::from_store(&fixture.store)
                .insert_one(&CandidateCore::example3(Id::new()))
                .await
                .unwrap();

            let foreign = VoteChoice::Candidate(foreign.into());
            let result = fixture.cast(0, foreign, VoteTrigger::Explicit).await;
            assert!(matches!(result, Err(Error::NotFound(_))));

            let missing = VoteChoice::Candidate(Id::new().into());
            let result = fixture.cast(0, missing, VoteTrigger::Explicit).await;
            assert!(matches!(result, Err(Error::NotFound(_))));

            let wrong_election = VoterLink::new(Id::new(), fixture.voters[0]);
            let result = cast_vote(
                &fixture.store,
                &fixture.feed,
                wrong_election,
                VoteChoice::Blank,
                VoteTrigger::Explicit,
            )
            .await;
            assert!(matches!(result, Err(Error::NotFound(_))));
            assert!(!fixture.voter(0).await.has_voted);
        });
    }

    #[test]
    fn racing_votes_count_each_voter_once() {
        const VOTERS: usize = 100;

        let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let fixture = Fixture::active(ElectionCore::current_example()).await;
            let new_voters = Records::<NewVoter>::from_store(&fixture.store);
            let mut links = Vec::with_capacity(VOTERS);
            for i in 0..VOTERS {
                let voter = VoterCore::new(
                    format!("Voter {i}"),
                    format!("voter{i}@example.org"),
                    fixture.election,
                );
                let voter_id = new_voters.insert_one(&voter).await.unwrap();
                links.push(VoterLink::new(fixture.election, voter_id));
            }

            // Every voter submits twice at once: a candidate and their expired countdown.
            let mut handles = Vec::with_capacity(VOTERS * 2);
            for (i, link) in links.iter().enumerate() {
                for (choice, trigger) in [
                    (fixture.candidate(i % 2), VoteTrigger::Explicit),
                    (VoteChoice::Blank, VoteTrigger::Expired),
                ] {
                    let store = fixture.store.clone();
                    let feed = fixture.feed.clone();
                    let link = *link;
                    handles.push(rocket::tokio::spawn(async move {
                        (link.voter_id, cast_vote(&store, &feed, link, choice, trigger).await)
                    }));
                }
            }

            let mut recorded = std::collections::HashMap::new();
            for handle in handles {
                let (voter_id, result) = handle.await.unwrap();
                match result {
                    Ok(_) => *recorded.entry(voter_id).or_insert(0) += 1,
                    Err(Error::AlreadyVoted(id)) => assert_eq!(id, voter_id),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(recorded.len(), VOTERS);
            assert!(recorded.values().all(|&count| count == 1));

            let voters = Records::<Voter>::from_store(&fixture.store)
                .find_by(ELECTION_INDEX, fixture.election)
                .await
                .unwrap();
            let voted = voters.iter().filter(|voter| voter.has_voted).count() as u64;
            let blank = voters.iter().filter(|voter| voter.voted_blank()).count() as u64;
            assert_eq!(voted, VOTERS as u64);
            assert_eq!(fixture.votes(0).await + fixture.votes(1).await + blank, voted);
        });
    }
}
