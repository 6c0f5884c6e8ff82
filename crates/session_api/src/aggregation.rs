//! Vote statistics for a poker room.
//!
//! Statistics exist only once the room is revealed. Unsure ("?") cards and players who
//! have not voted are reported but never enter the numeric math.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use shared::domain::{PlayerData, PokerRoom, UserId, VoteValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VoteSummary {
    /// Votes are still face down.
    Concealed,
    /// Revealed, but nobody put a numeric card on the table.
    NoVotes {
        unsure_count: usize,
        waiting_on: Vec<String>,
    },
    Tallied(VoteTally),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub voted_count: usize,
    pub histogram: Vec<HistogramBucket>,
    /// The value every numeric voter chose, if they all chose the same one.
    pub consensus: Option<u32>,
    pub unsure_count: usize,
    pub waiting_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub value: u32,
    pub label: String,
    pub count: usize,
    pub percentage: u32,
    pub participant_names: Vec<String>,
}

pub fn summarize(room: &PokerRoom) -> VoteSummary {
    summarize_players(&room.players, room.revealed)
}

pub fn summarize_players(players: &BTreeMap<UserId, PlayerData>, revealed: bool) -> VoteSummary {
    if !revealed {
        return VoteSummary::Concealed;
    }

    let mut buckets: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut unsure_count = 0;
    let mut waiting_on = Vec::new();
    for player in players.values() {
        match player.vote {
            Some(VoteValue::Points(points)) => {
                buckets.entry(points).or_default().push(player.name.clone())
            }
            Some(VoteValue::Unsure) => unsure_count += 1,
            None => waiting_on.push(player.name.clone()),
        }
    }
    waiting_on.sort();

    let voted_count: usize = buckets.values().map(Vec::len).sum();
    if voted_count == 0 {
        return VoteSummary::NoVotes {
            unsure_count,
            waiting_on,
        };
    }

    let histogram: Vec<HistogramBucket> = buckets
        .into_iter()
        .map(|(value, mut participant_names)| {
            participant_names.sort();
            let count = participant_names.len();
            HistogramBucket {
                value,
                label: display_label(VoteValue::Points(value)),
                count,
                percentage: rounded_percentage(count, voted_count),
                participant_names,
            }
        })
        .collect();

    let consensus = match histogram.as_slice() {
        [only] if only.count == voted_count => Some(only.value),
        _ => None,
    };

    VoteSummary::Tallied(VoteTally {
        voted_count,
        histogram,
        consensus,
        unsure_count,
        waiting_on,
    })
}

/// Card face for a vote. Presentation only; aggregation always uses the numeric value.
pub fn display_label(value: VoteValue) -> String {
    match value {
        VoteValue::Points(points) => card_faces()
            .get(&points)
            .map(|face| face.to_string())
            .unwrap_or_else(|| points.to_string()),
        VoteValue::Unsure => "?".to_string(),
    }
}

fn card_faces() -> HashMap<u32, &'static str> {
    HashMap::from([(1, "a"), (13, "j"), (21, "q"), (34, "k")])
}

/// `round(100 * count / total)` with halves rounded up, in integer math.
fn rounded_percentage(count: usize, total: usize) -> u32 {
    let scaled = (200 * count + total) / (2 * total);
    u32::try_from(scaled).unwrap_or(100)
}

#[cfg(test)]
#[path = "tests/aggregation_tests.rs"]
mod tests;
