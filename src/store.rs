//! The authoritative model of what the widget is currently showing.
//!
//! All mutation goes through the methods here. Every field group is replaced
//! wholesale by the most recent data; partial merges never happen.

use crate::models::{
    Achievement, Award, Competition, Contest, LeaderboardEntry, Member, Product, Reward,
};
use crate::rank::derive_top_ranks_with_floor;
use crate::status::{
    is_competition_closed, OptInState, CONTEST_FALLBACK, CONTEST_IMMINENT, CONTEST_RUNNING,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    /// No competition is available; competition, contest and leaderboard are cleared.
    Deactivated,
}

/// A list together with the backend's total count for its category.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
        }
    }
}

impl<T> Partition<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32) -> Self {
        Self { items, total, page }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tournaments {
    pub ready: Partition<Competition>,
    pub active: Partition<Competition>,
    pub finished: Partition<Competition>,
}

impl Tournaments {
    pub fn find(&self, id: &str) -> Option<&Competition> {
        self.active
            .items
            .iter()
            .chain(self.ready.items.iter())
            .chain(self.finished.items.iter())
            .find(|competition| competition.id == id)
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.ready.items.iter().any(|competition| competition.id == id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Achievements {
    pub current: Partition<Achievement>,
    pub past: Partition<Achievement>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Awards {
    pub available: Partition<Award>,
    pub claimed: Partition<Award>,
    pub expired: Partition<Award>,
}

impl Awards {
    /// Claimed followed by expired.
    pub fn past(&self) -> Vec<&Award> {
        self.claimed
            .items
            .iter()
            .chain(self.expired.items.iter())
            .collect()
    }
}

/// Which entity the leaderboard subscription should follow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaderboardTarget {
    Contest(String),
    Competition(String),
    Empty,
}

impl LeaderboardTarget {
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            LeaderboardTarget::Contest(id) | LeaderboardTarget::Competition(id) => Some(id),
            LeaderboardTarget::Empty => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompetitionChange {
    Unchanged,
    Switched { previous: Option<String> },
    Deactivated,
}

/// A candidate competition with its contests, contest rewards and products,
/// fetched before any of it touches the store.
#[derive(Clone, Debug)]
pub struct PreparedCompetition {
    pub competition: Competition,
    pub contests: Vec<Contest>,
    pub active: Option<Contest>,
    pub rewards: Vec<Reward>,
    pub products: Vec<Product>,
}

/// Captured before a leaderboard request; the response only applies if the
/// store has not moved on since.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardTicket {
    generation: u64,
    entity_id: Option<String>,
}

/// Pinned id first (searching active, ready, then finished), else the first
/// active competition, else the first ready one.
pub fn select_competition(pinned: Option<&str>, tournaments: &Tournaments) -> Option<Competition> {
    if let Some(pinned) = pinned {
        if let Some(found) = tournaments.find(pinned) {
            return Some(found.clone());
        }
    }
    tournaments
        .active
        .items
        .first()
        .or_else(|| tournaments.ready.items.first())
        .cloned()
}

/// A live single-contest competition (status 15) takes its last status-15
/// contest. Otherwise the running contest wins, then the first contest
/// strictly between starting and archived.
pub fn select_contest(competition: &Competition, contests: &[Contest]) -> Option<Contest> {
    if competition.status_code == CONTEST_IMMINENT {
        return contests
            .iter()
            .rev()
            .find(|contest| contest.status_code == CONTEST_IMMINENT)
            .cloned();
    }
    contests
        .iter()
        .find(|contest| contest.status_code == CONTEST_RUNNING)
        .or_else(|| {
            contests
                .iter()
                .find(|contest| CONTEST_FALLBACK.contains(contest.status_code))
        })
        .cloned()
}

#[derive(Debug)]
pub struct Store {
    phase: Phase,
    pinned_competition_id: Option<String>,
    tournaments: Tournaments,
    active_competition: Option<Competition>,
    contests: Vec<Contest>,
    active_contest: Option<Contest>,
    opt_in: Option<OptInState>,
    leaderboard: Vec<LeaderboardEntry>,
    leaderboard_size: u32,
    size_floor: u32,
    subscription: Option<String>,
    achievements: Achievements,
    awards: Awards,
    member: Option<Member>,
    error: bool,
    generation: u64,
}

impl Store {
    pub fn new(size_floor: u32) -> Self {
        Self {
            phase: Phase::Idle,
            pinned_competition_id: None,
            tournaments: Tournaments::default(),
            active_competition: None,
            contests: Vec::new(),
            active_contest: None,
            opt_in: None,
            leaderboard: Vec::new(),
            leaderboard_size: size_floor,
            size_floor,
            subscription: None,
            achievements: Achievements::default(),
            awards: Awards::default(),
            member: None,
            error: false,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pinned_competition_id(&self) -> Option<&str> {
        self.pinned_competition_id.as_deref()
    }

    pub fn tournaments(&self) -> &Tournaments {
        &self.tournaments
    }

    pub fn active_competition(&self) -> Option<&Competition> {
        self.active_competition.as_ref()
    }

    pub fn active_competition_id(&self) -> Option<&str> {
        self.active_competition.as_ref().map(|c| c.id.as_str())
    }

    pub fn contests(&self) -> &[Contest] {
        &self.contests
    }

    pub fn active_contest(&self) -> Option<&Contest> {
        self.active_contest.as_ref()
    }

    pub fn active_contest_id(&self) -> Option<&str> {
        self.active_contest.as_ref().map(|c| c.id.as_str())
    }

    pub fn active_rewards(&self) -> &[Reward] {
        self.active_contest
            .as_ref()
            .map(|contest| contest.rewards.as_slice())
            .unwrap_or(&[])
    }

    pub fn opt_in(&self) -> Option<OptInState> {
        self.opt_in
    }

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    pub fn leaderboard_size(&self) -> u32 {
        self.leaderboard_size
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub fn achievements(&self) -> &Achievements {
        &self.achievements
    }

    pub fn awards(&self) -> &Awards {
        &self.awards
    }

    pub fn member(&self) -> Option<&Member> {
        self.member.as_ref()
    }

    pub fn member_ref_id(&self) -> Option<&str> {
        self.member.as_ref().map(|member| member.member_ref_id.as_str())
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    pub fn set_member(&mut self, member: Member) {
        self.member = Some(member);
    }

    pub fn pin_competition(&mut self, competition_id: impl Into<String>) {
        self.pinned_competition_id = Some(competition_id.into());
    }

    pub fn set_tournaments(&mut self, tournaments: Tournaments) {
        self.tournaments = tournaments;
    }

    pub fn set_tournament_page(&mut self, category: TournamentCategory, page: Partition<Competition>) {
        match category {
            TournamentCategory::Ready => self.tournaments.ready = page,
            TournamentCategory::Active => self.tournaments.active = page,
            TournamentCategory::Finished => self.tournaments.finished = page,
        }
    }

    pub fn set_achievements(&mut self, achievements: Achievements) {
        self.achievements = achievements;
    }

    pub fn set_awards(&mut self, awards: Awards) {
        self.awards = awards;
    }

    /// Runs competition selection against the current listings and applies it.
    pub fn select_active_competition(&mut self) -> CompetitionChange {
        let selected = select_competition(self.pinned_competition_id.as_deref(), &self.tournaments);
        self.apply_competition(selected)
    }

    /// Applies a fully fetched competition refresh in one step. `None`
    /// deactivates the store.
    pub fn apply_listing(
        &mut self,
        tournaments: Tournaments,
        prepared: Option<PreparedCompetition>,
    ) -> CompetitionChange {
        self.tournaments = tournaments;
        let Some(prepared) = prepared else {
            return self.apply_competition(None);
        };
        let PreparedCompetition {
            competition,
            contests,
            active,
            rewards,
            products,
        } = prepared;
        let competition_id = competition.id.clone();
        let change = self.apply_competition(Some(competition));
        let active_id = active.as_ref().map(|contest| contest.id.clone());
        self.set_contests(contests, active);
        if let Some(contest_id) = active_id {
            if !rewards.is_empty() {
                self.set_contest_rewards(&contest_id, rewards);
            }
        }
        self.set_active_products(&competition_id, products);
        change
    }

    /// Forgets everything that belonged to the signed-in member. The
    /// leaderboard is cleared too so responses fetched for them are dropped.
    pub fn reset_member(&mut self) {
        self.member = None;
        self.opt_in = None;
        self.achievements = Achievements::default();
        self.awards = Awards::default();
        self.clear_leaderboard();
    }

    pub fn apply_competition(&mut self, selected: Option<Competition>) -> CompetitionChange {
        let Some(selected) = selected else {
            self.deactivate();
            return CompetitionChange::Deactivated;
        };

        self.phase = Phase::Active;
        let previous = self.active_competition_id().map(str::to_string);
        if previous.as_deref() == Some(selected.id.as_str()) {
            if let Some(current) = self.active_competition.as_mut() {
                let products = std::mem::take(&mut current.products);
                *current = selected;
                if current.products.is_empty() {
                    current.products = products;
                }
            }
            return CompetitionChange::Unchanged;
        }

        self.pinned_competition_id = Some(selected.id.clone());
        self.active_competition = Some(selected);
        self.contests.clear();
        self.active_contest = None;
        self.opt_in = None;
        self.clear_leaderboard();
        CompetitionChange::Switched { previous }
    }

    /// Terminal state: nothing to show. The live subscription id is kept so
    /// the caller can release it through `switch_subscription`.
    pub fn deactivate(&mut self) {
        self.phase = Phase::Deactivated;
        self.active_competition = None;
        self.contests.clear();
        self.active_contest = None;
        self.opt_in = None;
        self.clear_leaderboard();
    }

    pub fn set_active_products(&mut self, competition_id: &str, products: Vec<Product>) {
        if let Some(competition) = self.active_competition.as_mut() {
            if competition.id == competition_id {
                competition.products = products;
            }
        }
    }

    /// Replaces the contest list and active contest. Returns true when the
    /// active contest changed.
    pub fn set_contests(&mut self, contests: Vec<Contest>, active: Option<Contest>) -> bool {
        self.contests = contests;
        self.set_active_contest(active)
    }

    pub fn set_active_contest(&mut self, active: Option<Contest>) -> bool {
        let changed = self.active_contest_id() != active.as_ref().map(|c| c.id.as_str());
        if changed {
            self.clear_leaderboard();
        } else if let (Some(current), Some(next)) = (self.active_contest.as_ref(), active.as_ref()) {
            // Rewards fetched separately survive a same-contest refresh.
            if next.rewards.is_empty() && !current.rewards.is_empty() {
                let rewards = current.rewards.clone();
                self.active_contest = active;
                if let Some(contest) = self.active_contest.as_mut() {
                    contest.rewards = rewards;
                }
                self.recompute_size();
                return false;
            }
        }
        self.active_contest = active;
        self.recompute_size();
        changed
    }

    /// Picks a contest of the active competition by id. Returns false when
    /// the id is unknown.
    pub fn choose_contest(&mut self, contest_id: &str) -> bool {
        let Some(contest) = self.contests.iter().find(|c| c.id == contest_id).cloned() else {
            return false;
        };
        self.set_active_contest(Some(contest));
        true
    }

    pub fn set_contest_rewards(&mut self, contest_id: &str, rewards: Vec<Reward>) -> bool {
        match self.active_contest.as_mut() {
            Some(contest) if contest.id == contest_id => {
                contest.rewards = rewards;
                self.recompute_size();
                true
            }
            _ => false,
        }
    }

    fn recompute_size(&mut self) {
        self.leaderboard_size = derive_top_ranks_with_floor(self.active_rewards(), self.size_floor);
    }

    pub fn set_opt_in(&mut self, competition_id: &str, state: OptInState) {
        if self.active_competition_id() == Some(competition_id) {
            self.opt_in = Some(state);
        }
    }

    /// True when the leaderboard may be subscribed: no opt-in needed, or
    /// the member's opt-in is confirmed.
    pub fn may_subscribe(&self) -> bool {
        match self.active_competition.as_ref() {
            Some(competition) if competition.requires_opt_in() => {
                self.opt_in.map(OptInState::is_confirmed).unwrap_or(false)
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn needs_opt_in_poll(&self) -> bool {
        self.active_competition
            .as_ref()
            .map(|competition| competition.requires_opt_in())
            .unwrap_or(false)
            && !self.opt_in.map(OptInState::is_confirmed).unwrap_or(false)
    }

    pub fn leaderboard_target(&self) -> LeaderboardTarget {
        let Some(competition) = self.active_competition.as_ref() else {
            return LeaderboardTarget::Empty;
        };
        match self.active_contest.as_ref() {
            Some(_) if self.tournaments.is_ready(&competition.id) => LeaderboardTarget::Empty,
            Some(contest) => LeaderboardTarget::Contest(contest.id.clone()),
            None if is_competition_closed(competition.status_code) => {
                LeaderboardTarget::Competition(competition.id.clone())
            }
            None => LeaderboardTarget::Empty,
        }
    }

    /// Records the new exclusive subscription. Returns the previous one when
    /// it must be released first.
    pub fn switch_subscription(&mut self, next: Option<&str>) -> Option<String> {
        if self.subscription.as_deref() == next {
            return None;
        }
        let previous = self.subscription.take();
        self.subscription = next.map(str::to_string);
        previous
    }

    pub fn ticket(&self) -> LeaderboardTicket {
        LeaderboardTicket {
            generation: self.generation,
            entity_id: self.leaderboard_target().entity_id().map(str::to_string),
        }
    }

    /// Applies fetched rows unless the active contest moved since `ticket`
    /// was taken.
    pub fn apply_leaderboard(&mut self, ticket: &LeaderboardTicket, rows: Vec<LeaderboardEntry>) -> bool {
        if ticket.generation != self.generation
            || ticket.entity_id.as_deref() != self.leaderboard_target().entity_id()
        {
            return false;
        }
        self.leaderboard = rows;
        true
    }

    /// Pushed rows apply only to the active contest.
    pub fn apply_leaderboard_push(&mut self, contest_id: &str, rows: Vec<LeaderboardEntry>) -> bool {
        if self.active_contest_id() != Some(contest_id) {
            return false;
        }
        self.leaderboard = rows;
        true
    }

    pub fn clear_leaderboard(&mut self) {
        self.leaderboard.clear();
        self.generation += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TournamentCategory {
    Ready,
    Active,
    Finished,
}
