use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::config::Config;
use crate::error::Error;
use crate::live::ChangeFeed;
use crate::model::{
    common::{
        link::VoterLink,
        vote::{VoteChoice, VoteTrigger},
    },
    mongodb::Id,
    store::StoreHandle,
};

use super::{cast_vote, countdown::Countdown};

/// Map from voter IDs to their ballot countdowns.
type CountdownMap = HashMap<Id, Countdown>;

/// Ballot countdowns: when a voter opens their ballot and does not vote in
/// time, a blank vote is cast for them.
pub struct BallotTimers {
    countdowns: Arc<Mutex<CountdownMap>>,
    ttl: Duration,
}

impl BallotTimers {
    /// Create an empty set of countdowns, each lasting `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            countdowns: Default::default(),
            ttl,
        }
    }

    /// Start the countdown for the voter behind `link`, returning its deadline.
    /// If one is already running, it is left alone and its deadline returned.
    pub async fn open(
        &self,
        link: VoterLink,
        store: StoreHandle,
        feed: ChangeFeed,
    ) -> DateTime<Utc> {
        let mut countdowns = self.countdowns.lock().await;
        if let Some(countdown) = countdowns.get(&link.voter_id) {
            return countdown.deadline();
        }
        let deadline = Utc::now() + self.ttl;
        let expiry = Self::expiry(link, store, feed, self.countdowns.clone());
        countdowns.insert(link.voter_id, Countdown::start(deadline, expiry));
        debug!("Ballot countdown for voter {} runs until {deadline}", link.voter_id);
        deadline
    }

    /// The deadline of the voter's running countdown, if any.
    pub async fn deadline(&self, voter_id: Id) -> Option<DateTime<Utc>> {
        self.countdowns.lock().await.get(&voter_id).map(Countdown::deadline)
    }

    /// Stop the voter's countdown. Returns false if none was running.
    pub async fn cancel(&self, voter_id: Id) -> bool {
        let countdown = self.countdowns.lock().await.remove(&voter_id);
        match countdown {
            Some(countdown) => {
                // The lock is released first, as the expiry takes it too.
                if countdown.cancel().await {
                    debug!("Ballot countdown for voter {voter_id} had already run when cancelled");
                }
                true
            }
            None => false,
        }
    }

    /// Cast a blank vote when the countdown runs out, then forget the countdown.
    async fn expiry(
        link: VoterLink,
        store: StoreHandle,
        feed: ChangeFeed,
        countdowns: Arc<Mutex<CountdownMap>>,
    ) {
        let result = cast_vote(&store, &feed, link, VoteChoice::Blank, VoteTrigger::Expired).await;
        match result {
            Ok(_) => {}
            Err(Error::AlreadyVoted(_)) => {
                debug!("Ballot countdown for voter {} expired after they voted", link.voter_id)
            }
            Err(ref e) => warn!(
                "Ballot countdown for voter {} expired but no blank vote was cast: {e}",
                link.voter_id
            ),
        }
        countdowns.lock().await.remove(&link.voter_id);
    }
}

/// A fairing that places `BallotTimers` into managed state, configured from
/// the application config. Must be attached after `ConfigFairing`.
pub struct BallotTimersFairing;

#[rocket::async_trait]
impl Fairing for BallotTimersFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot Timers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let ttl = match rocket.state::<Config>() {
            Some(config) => config.ballot_ttl(),
            None => {
                error!("Config was not available when creating ballot timers");
                return Err(rocket);
            }
        };
        info!("Ballot countdowns last {} seconds", ttl.num_seconds());
        Ok(rocket.manage(BallotTimers::new(ttl)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        db::{ElectionCore, NewElection, NewVoter, Voter, VoterCore},
        store::{MemoryStore, Records},
    };

    struct Fixture {
        store: StoreHandle,
        feed: ChangeFeed,
        link: VoterLink,
    }

    async fn fixture(has_blank_vote: bool) -> Fixture {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let mut election = ElectionCore::current_example();
        election.is_active = true;
        election.has_blank_vote = has_blank_vote;
        let election_id = Records::<NewElection>::from_store(&store)
            .insert_one(&election)
            .await
            .unwrap();
        let voter_id = Records::<NewVoter>::from_store(&store)
            .insert_one(&VoterCore::example1(election_id))
            .await
            .unwrap();
        Fixture {
            store,
            feed: ChangeFeed::new(),
            link: VoterLink::new(election_id, voter_id),
        }
    }

    async fn voter(fixture: &Fixture) -> Voter {
        Voter::get(&Records::from_store(&fixture.store), fixture.link.voter_id)
            .await
            .unwrap()
    }

    fn runtime() -> rocket::tokio::runtime::Runtime {
        rocket::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn expiry_casts_blank_vote() {
        runtime().block_on(async {
            let fixture = fixture(false).await;
            let timers = BallotTimers::new(Duration::milliseconds(50));
            timers
                .open(fixture.link, fixture.store.clone(), fixture.feed.clone())
                .await;

            let mut expired = false;
            for _ in 0..100 {
                rocket::tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                if timers.deadline(fixture.link.voter_id).await.is_none() {
                    expired = true;
                    break;
                }
            }
            assert!(expired);
            assert!(voter(&fixture).await.voted_blank());
        });
    }

    #[test]
    fn reopening_keeps_the_deadline() {
        runtime().block_on(async {
            let fixture = fixture(true).await;
            let timers = BallotTimers::new(Duration::minutes(5));
            let first = timers
                .open(fixture.link, fixture.store.clone(), fixture.feed.clone())
                .await;
            rocket::tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            let second = timers
                .open(fixture.link, fixture.store.clone(), fixture.feed.clone())
                .await;
            assert_eq!(first, second);
            assert_eq!(timers.deadline(fixture.link.voter_id).await, Some(first));
        });
    }

    #[test]
    fn cancelled_countdown_casts_nothing() {
        runtime().block_on(async {
            let fixture = fixture(true).await;
            let timers = BallotTimers::new(Duration::milliseconds(50));
            timers
                .open(fixture.link, fixture.store.clone(), fixture.feed.clone())
                .await;
            assert!(timers.cancel(fixture.link.voter_id).await);
            assert!(!timers.cancel(fixture.link.voter_id).await);

            rocket::tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            assert!(!voter(&fixture).await.has_voted);
        });
    }
}
