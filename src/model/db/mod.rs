//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate};

pub mod election;
pub use election::{Election, ElectionCore, NewElection};

pub mod voter;
pub use voter::{NewVoter, Voter, VoterCore};
