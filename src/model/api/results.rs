use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::tally::Tally,
    db::ElectionCore,
};

/// Label of the synthetic blank-vote entry.
pub const BLANK_LABEL: &str = "En Blanco";

/// Elections with at most this many candidates are shown as bars.
const MAX_BAR_CANDIDATES: usize = 3;

/// The results of an election, in one of three distinct states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ElectionResults {
    /// Voting has not opened yet, whatever the store holds.
    NotYetAvailable { starts_at: DateTime<Utc> },
    NoVotes,
    Tallied {
        total_votes: u64,
        layout: ResultLayout,
        entries: Vec<ResultEntry>,
    },
}

/// How a client should draw the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultLayout {
    Bars,
    Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// `None` for the blank-vote entry.
    pub candidate_id: Option<ApiId>,
    pub name: String,
    pub votes: u64,
    pub percentage: f64,
}

impl ElectionResults {
    /// Present `tally` as seen at `now`.
    pub fn new(election: &ElectionCore, tally: &Tally, now: DateTime<Utc>) -> Self {
        if now < election.start_date {
            return Self::NotYetAvailable {
                starts_at: election.start_date,
            };
        }
        if tally.total_votes == 0 {
            return Self::NoVotes;
        }

        let mut entries: Vec<_> = tally
            .candidates
            .iter()
            .map(|count| ResultEntry {
                candidate_id: Some(count.id.into()),
                name: count.name.clone(),
                votes: count.votes,
                percentage: tally.percentage(count.votes),
            })
            .collect();
        if let Some(blank_votes) = tally.blank_votes {
            entries.push(ResultEntry {
                candidate_id: None,
                name: BLANK_LABEL.to_string(),
                votes: blank_votes,
                percentage: tally.percentage(blank_votes),
            });
        }
        let layout = if tally.candidates.len() <= MAX_BAR_CANDIDATES {
            ResultLayout::Bars
        } else {
            ResultLayout::Chart
        };

        Self::Tallied {
            total_votes: tally.total_votes,
            layout,
            entries,
        }
    }
}
