//! Domain types shared between the database and API layers.

pub mod ballot;
pub mod link;
pub mod tally;
pub mod vote;
