//! Listing loaders. Each listing is fetched first, then its rewards are
//! fetched in one batch keyed by the listed ids and joined in memory.

use chrono::{Duration as ChronoDuration, Utc};
use tracing::debug;

use crate::config::WidgetConfig;
use crate::constants::{PAGE_SIZE, SINGLE_WHEEL_TYPE};
use crate::error::Result;
use crate::gateway::{DateRange, Gateway, ListQuery, SortOrder};
use crate::models::{Achievement, Award, Competition, Contest, InstantWin, Product, Reward};
use crate::status::{
    achievement_current, is_competition_closed, OptInState, StatusRange, ACHIEVEMENT_PAST,
    AWARD_AVAILABLE, AWARD_CLAIMED, AWARD_EXPIRED, COMPETITION_ACTIVE, COMPETITION_FINISHED,
    COMPETITION_READY, CONTEST_ANY, OPT_IN_STATES,
};
use crate::store::{Achievements, Awards, Partition, TournamentCategory, Tournaments};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TournamentPages {
    pub ready: u32,
    pub active: u32,
    pub finished: u32,
}

impl Default for TournamentPages {
    fn default() -> Self {
        Self {
            ready: 1,
            active: 1,
            finished: 1,
        }
    }
}

fn page_query(page: u32) -> ListQuery {
    let page = page.max(1);
    ListQuery::page((page - 1) * PAGE_SIZE, PAGE_SIZE)
}

pub async fn list_tournaments(
    gateway: &dyn Gateway,
    config: &WidgetConfig,
    pages: TournamentPages,
) -> Result<Tournaments> {
    let ready = list_tournament_page(gateway, config, TournamentCategory::Ready, pages.ready).await?;
    let active = list_tournament_page(gateway, config, TournamentCategory::Active, pages.active).await?;
    let finished = if config.show_finished_tournaments {
        list_tournament_page(gateway, config, TournamentCategory::Finished, pages.finished).await?
    } else {
        Partition::default()
    };

    let mut active = active;
    for competition in active.items.iter_mut() {
        competition.products = competition_products(gateway, &competition.id).await?;
    }

    Ok(Tournaments {
        ready,
        active,
        finished,
    })
}

pub async fn list_tournament_page(
    gateway: &dyn Gateway,
    config: &WidgetConfig,
    category: TournamentCategory,
    page: u32,
) -> Result<Partition<Competition>> {
    let range = match category {
        TournamentCategory::Ready => COMPETITION_READY,
        TournamentCategory::Active => COMPETITION_ACTIVE,
        TournamentCategory::Finished => COMPETITION_FINISHED,
    };
    let mut query = page_query(page)
        .with_status(range)
        .sorted("created", SortOrder::Desc);
    if category == TournamentCategory::Finished {
        let end = Utc::now();
        query.end_date_range = Some(DateRange {
            start: end - ChronoDuration::days(config.finished_history_days),
            end,
        });
    }

    let listed = gateway.competitions(&query).await?;
    let mut competitions = listed.data;
    let rewards = rewards_for(gateway, "Competition", competitions.iter().map(|c| c.id.clone())).await?;
    join_competition_rewards(&mut competitions, &rewards);
    Ok(Partition::new(competitions, listed.total, page.max(1)))
}

/// Every reward whose entity id matches is attached.
pub fn join_competition_rewards(competitions: &mut [Competition], rewards: &[Reward]) {
    for competition in competitions.iter_mut() {
        competition.rewards = rewards
            .iter()
            .filter(|reward| reward.entity_id == competition.id)
            .cloned()
            .collect();
    }
}

/// Only the first matching reward is attached.
pub fn join_achievement_rewards(achievements: &mut [Achievement], rewards: &[Reward]) {
    for achievement in achievements.iter_mut() {
        achievement.reward = rewards
            .iter()
            .find(|reward| reward.entity_id == achievement.id)
            .cloned();
    }
}

/// Awards reference their reward by id rather than by entity.
pub fn join_award_rewards(awards: &mut [Award], rewards: &[Reward]) {
    for award in awards.iter_mut() {
        award.reward = rewards
            .iter()
            .find(|reward| reward.id == award.reward_id)
            .cloned();
    }
}

async fn rewards_for(
    gateway: &dyn Gateway,
    entity_type: &str,
    entity_ids: impl Iterator<Item = String>,
) -> Result<Vec<Reward>> {
    let entity_ids: Vec<String> = entity_ids.collect();
    if entity_ids.is_empty() {
        return Ok(Vec::new());
    }
    let limit = (entity_ids.len() as u32 * PAGE_SIZE).max(PAGE_SIZE);
    let query = ListQuery::page(0, limit).with_entity_ids(entity_type, entity_ids);
    Ok(gateway.rewards(&query).await?.data)
}

pub async fn list_contests(gateway: &dyn Gateway, competition: &Competition) -> Result<Vec<Contest>> {
    let mut query = ListQuery::page(0, PAGE_SIZE).with_status(CONTEST_ANY);
    query.competition_ids = vec![competition.id.clone()];
    if is_competition_closed(competition.status_code) {
        query = query.sorted("scheduledEndDate", SortOrder::Desc);
    }
    Ok(gateway.contests(&query).await?.data)
}

pub async fn contest_rewards(gateway: &dyn Gateway, contest_id: &str) -> Result<Vec<Reward>> {
    rewards_for(gateway, "Contest", std::iter::once(contest_id.to_string())).await
}

pub async fn competition_products(gateway: &dyn Gateway, competition_id: &str) -> Result<Vec<Product>> {
    let query = ListQuery::page(0, PAGE_SIZE).with_entity_ids("Competition", vec![competition_id.to_string()]);
    Ok(gateway.products(&query).await?.data)
}

pub async fn opt_in_state(
    gateway: &dyn Gateway,
    entity_type: &str,
    entity_id: &str,
) -> Result<OptInState> {
    let query = ListQuery::page(0, 1)
        .with_entity_ids(entity_type, vec![entity_id.to_string()])
        .with_status(OPT_IN_STATES);
    let states = gateway.opt_in_states(&query).await?;
    Ok(states
        .data
        .iter()
        .find(|state| state.entity_id == entity_id)
        .map(|state| OptInState::from_code(state.status_code))
        .unwrap_or(OptInState::NotOptedIn))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AchievementPages {
    pub current: u32,
    pub past: u32,
}

impl Default for AchievementPages {
    fn default() -> Self {
        Self { current: 1, past: 1 }
    }
}

pub async fn list_achievements(
    gateway: &dyn Gateway,
    config: &WidgetConfig,
    pages: AchievementPages,
) -> Result<Achievements> {
    let current = achievement_page(
        gateway,
        achievement_current(config.show_ready_achievements),
        pages.current,
    )
    .await?;
    let past = achievement_page(gateway, ACHIEVEMENT_PAST, pages.past).await?;
    Ok(Achievements { current, past })
}

async fn achievement_page(
    gateway: &dyn Gateway,
    range: StatusRange,
    page: u32,
) -> Result<Partition<Achievement>> {
    let query = page_query(page)
        .with_status(range)
        .sorted("created", SortOrder::Desc);
    let listed = gateway.achievements(&query).await?;
    let mut achievements = listed.data;

    let rewards = rewards_for(gateway, "Achievement", achievements.iter().map(|a| a.id.clone())).await?;
    join_achievement_rewards(&mut achievements, &rewards);

    let gated: Vec<String> = achievements
        .iter()
        .filter(|achievement| achievement.requires_opt_in())
        .map(|achievement| achievement.id.clone())
        .collect();
    if !gated.is_empty() {
        let query = ListQuery::page(0, gated.len() as u32)
            .with_entity_ids("Achievement", gated)
            .with_status(OPT_IN_STATES);
        let states = gateway.opt_in_states(&query).await?.data;
        for achievement in achievements.iter_mut().filter(|a| a.requires_opt_in()) {
            achievement.opt_in_status = states
                .iter()
                .find(|state| state.entity_id == achievement.id)
                .map(|state| state.status_code);
        }
    }

    Ok(Partition::new(achievements, listed.total, page.max(1)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AwardCategory {
    Available,
    Claimed,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AwardPages {
    pub available: u32,
    pub claimed: u32,
    pub expired: u32,
}

impl Default for AwardPages {
    fn default() -> Self {
        Self {
            available: 1,
            claimed: 1,
            expired: 1,
        }
    }
}

pub async fn list_awards(gateway: &dyn Gateway, pages: AwardPages) -> Result<Awards> {
    Ok(Awards {
        available: award_page(gateway, AwardCategory::Available, pages.available).await?,
        claimed: award_page(gateway, AwardCategory::Claimed, pages.claimed).await?,
        expired: award_page(gateway, AwardCategory::Expired, pages.expired).await?,
    })
}

pub async fn award_page(
    gateway: &dyn Gateway,
    category: AwardCategory,
    page: u32,
) -> Result<Partition<Award>> {
    let range = match category {
        AwardCategory::Available => AWARD_AVAILABLE,
        AwardCategory::Claimed => AWARD_CLAIMED,
        AwardCategory::Expired => AWARD_EXPIRED,
    };
    let query = page_query(page)
        .with_status(range)
        .sorted("created", SortOrder::Desc);
    let listed = gateway.awards(&query).await?;
    let mut awards = listed.data;
    join_rewards_by_id(gateway, &mut awards).await?;
    Ok(Partition::new(awards, listed.total, page.max(1)))
}

async fn join_rewards_by_id(gateway: &dyn Gateway, awards: &mut [Award]) -> Result<()> {
    let reward_ids: Vec<String> = awards
        .iter()
        .map(|award| award.reward_id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    if reward_ids.is_empty() {
        return Ok(());
    }
    let query = ListQuery::page(0, reward_ids.len() as u32).with_ids(reward_ids);
    let rewards = gateway.rewards(&query).await?.data;
    join_award_rewards(awards, &rewards);
    Ok(())
}

/// Single award with its reward joined and reward icon resolved to a file URI.
pub async fn award_details(gateway: &dyn Gateway, award_id: &str) -> Result<Option<Award>> {
    let query = ListQuery::page(0, 1).with_ids(vec![award_id.to_string()]);
    let mut awards = gateway.awards(&query).await?.data;
    join_rewards_by_id(gateway, &mut awards).await?;
    let Some(mut award) = awards.into_iter().next() else {
        return Ok(None);
    };

    if let Some(icon) = award.reward.as_ref().and_then(|reward| reward.icon.clone()) {
        let query = ListQuery::page(0, 1).with_ids(vec![icon.clone()]);
        let files = gateway.files(&query).await?.data;
        award.icon_uri = files.into_iter().find(|file| file.id == icon).map(|file| file.uri);
        if award.icon_uri.is_none() {
            debug!(award_id, "reward icon not found");
        }
    }
    Ok(Some(award))
}

pub async fn single_wheels(gateway: &dyn Gateway) -> Result<Vec<InstantWin>> {
    let mut query = ListQuery::page(0, PAGE_SIZE);
    query.instant_win_types = vec![SINGLE_WHEEL_TYPE];
    Ok(gateway.instant_wins(&query).await?.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reward(id: &str, entity_id: &str) -> Reward {
        Reward {
            id: id.to_string(),
            entity_id: entity_id.to_string(),
            ..Reward::default()
        }
    }

    #[test]
    fn competitions_collect_every_matching_reward() {
        let mut competitions = vec![
            Competition { id: "a".to_string(), ..Competition::default() },
            Competition { id: "b".to_string(), ..Competition::default() },
        ];
        let rewards = vec![reward("r1", "a"), reward("r2", "b"), reward("r3", "a")];
        join_competition_rewards(&mut competitions, &rewards);
        assert_eq!(competitions[0].rewards.len(), 2);
        assert_eq!(competitions[1].rewards.len(), 1);
    }

    #[test]
    fn achievements_take_the_first_match_or_nothing() {
        let mut achievements = vec![
            Achievement { id: "a".to_string(), ..Achievement::default() },
            Achievement { id: "z".to_string(), ..Achievement::default() },
        ];
        let rewards = vec![reward("r1", "a"), reward("r2", "a")];
        join_achievement_rewards(&mut achievements, &rewards);
        assert_eq!(achievements[0].reward.as_ref().map(|r| r.id.as_str()), Some("r1"));
        assert!(achievements[1].reward.is_none());
    }

    #[test]
    fn awards_join_on_reward_id() {
        let mut awards = vec![Award {
            id: "aw".to_string(),
            reward_id: "r2".to_string(),
            entity_id: "a".to_string(),
            ..Award::default()
        }];
        let rewards = vec![reward("r1", "a"), reward("r2", "x")];
        join_award_rewards(&mut awards, &rewards);
        assert_eq!(awards[0].reward.as_ref().map(|r| r.id.as_str()), Some("r2"));
    }
}
