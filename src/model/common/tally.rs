use crate::model::{
    db::{candidate::Candidate, election::ElectionCore, voter::Voter},
    mongodb::Id,
};

/// Vote counts for one election, derived from the candidate tallies and the
/// voter roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Number of voters who have voted, blank votes included.
    pub total_votes: u64,
    /// Candidate tallies, in candidate order.
    pub candidates: Vec<CandidateCount>,
    /// Blank votes, counted only when the election offers a blank option.
    pub blank_votes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCount {
    pub id: Id,
    pub name: String,
    pub votes: u64,
}

impl Tally {
    pub fn count(election: &ElectionCore, candidates: &[Candidate], voters: &[Voter]) -> Self {
        let voted = voters.iter().filter(|voter| voter.has_voted);
        let total_votes = voted.clone().count() as u64;
        let blank_votes = election
            .has_blank_vote
            .then(|| voted.filter(|voter| voter.voted_blank()).count() as u64);
        let candidates = candidates
            .iter()
            .map(|candidate| CandidateCount {
                id: candidate.id,
                name: candidate.name.clone(),
                votes: candidate.votes,
            })
            .collect();
        Self {
            total_votes,
            candidates,
            blank_votes,
        }
    }

    /// `votes` as a percentage of all votes cast, or zero if there are none.
    pub fn percentage(&self, votes: u64) -> f64 {
        if self.total_votes == 0 {
            0.0
        } else {
            votes as f64 / self.total_votes as f64 * 100.0
        }
    }
}
