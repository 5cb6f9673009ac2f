#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{Config, ConfigFairing, StoreFairing};
use crate::live::{ChangeFeed, ResultsCache};
use crate::logging::LoggerFairing;
use crate::model::store::StoreHandle;
use crate::voting::BallotTimersFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod logging;
pub mod model;
pub mod voting;

/// Build the server, with its config and store taken from the figment.
pub fn build() -> Rocket<Build> {
    with_shared_state(rocket::build())
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(BallotTimersFairing)
}

/// Build the server over an existing store and config.
pub fn rocket_for_store(store: StoreHandle, config: Config) -> Rocket<Build> {
    with_shared_state(rocket::build())
        .manage(store)
        .manage(config)
        .attach(BallotTimersFairing)
}

fn with_shared_state(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(ChangeFeed::new())
        .manage(ResultsCache::new())
}
