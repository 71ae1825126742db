//! Reward-rank encodings: a single rank (`"1"`), a comma list (`"2,3"`), a
//! dash range (`"4-10"`), or any comma-separated mix of those.

use crate::constants::MIN_LEADERBOARD_SIZE;
use crate::models::Reward;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankSpan {
    Single(u32),
    Range(u32, u32),
}

impl RankSpan {
    pub fn contains(&self, rank: u32) -> bool {
        match *self {
            RankSpan::Single(value) => value == rank,
            RankSpan::Range(start, end) => rank >= start && rank <= end,
        }
    }

    pub fn upper(&self) -> u32 {
        match *self {
            RankSpan::Single(value) => value,
            RankSpan::Range(start, end) => start.max(end),
        }
    }
}

/// Unparseable tokens are skipped.
pub fn parse_reward_rank(encoded: &str) -> Vec<RankSpan> {
    encoded
        .split(',')
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            match token.split_once('-') {
                Some((start, end)) => {
                    let start = start.trim().parse::<u32>().ok()?;
                    let end = end.trim().parse::<u32>().ok()?;
                    Some(RankSpan::Range(start.min(end), start.max(end)))
                }
                None => token.parse::<u32>().ok().map(RankSpan::Single),
            }
        })
        .collect()
}

pub fn matches_rank(encoded: &str, rank: u32) -> bool {
    parse_reward_rank(encoded)
        .iter()
        .any(|span| span.contains(rank))
}

/// Number of top ranks to subscribe to: the highest rank any reward pays
/// out for, never less than the floor.
pub fn derive_top_ranks(rewards: &[Reward]) -> u32 {
    derive_top_ranks_with_floor(rewards, MIN_LEADERBOARD_SIZE)
}

pub fn derive_top_ranks_with_floor(rewards: &[Reward], floor: u32) -> u32 {
    rewards
        .iter()
        .flat_map(|reward| parse_reward_rank(&reward.reward_rank))
        .map(|span| span.upper())
        .fold(floor, u32::max)
}

pub fn rewards_for_rank(rewards: &[Reward], rank: u32) -> impl Iterator<Item = &Reward> {
    rewards
        .iter()
        .filter(move |reward| matches_rank(&reward.reward_rank, rank))
}
