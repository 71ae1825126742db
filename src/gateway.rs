//! Resource operations offered by the remote gamification gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    Achievement, Award, Competition, Contest, FileObject, InstantWin, InstantWinPlay,
    LeaderboardEntry, Member, OptInStatus, Product, Reward,
};
use crate::status::StatusRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortBy {
    pub query_field: String,
    pub order: SortOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Filter, sort and pagination body shared by every list resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entity_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub competition_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instant_win_types: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_by: Vec<SortBy>,
    pub skip: u32,
    pub limit: u32,
}

impl ListQuery {
    pub fn page(skip: u32, limit: u32) -> Self {
        Self {
            skip,
            limit,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, range: StatusRange) -> Self {
        self.status_code = Some(range);
        self
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_entity_ids(mut self, entity_type: &str, entity_ids: Vec<String>) -> Self {
        self.entity_types = vec![entity_type.to_string()];
        self.entity_ids = entity_ids;
        self
    }

    pub fn sorted(mut self, query_field: &str, order: SortOrder) -> Self {
        self.sort_by.push(SortBy {
            query_field: query_field.to_string(),
            order,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>) -> Self {
        let total = data.len() as u64;
        Self { data, total }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardFilter {
    pub top_ranks_to_include: u32,
    pub ranks_above_to_include: u32,
    pub ranks_below_to_include: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSubscription {
    pub entity_id: String,
    pub action: SubscriptionAction,
    pub leaderboard_filter: LeaderboardFilter,
}

impl LeaderboardSubscription {
    pub fn subscribe(entity_id: impl Into<String>, top_ranks: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            action: SubscriptionAction::Subscribe,
            leaderboard_filter: LeaderboardFilter {
                top_ranks_to_include: top_ranks,
                ranks_above_to_include: 0,
                ranks_below_to_include: 0,
            },
        }
    }

    pub fn unsubscribe(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            action: SubscriptionAction::Unsubscribe,
            leaderboard_filter: LeaderboardFilter {
                top_ranks_to_include: 0,
                ranks_above_to_include: 0,
                ranks_below_to_include: 0,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptInAction {
    Join,
    Leave,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInRequest {
    pub entity_id: String,
    pub entity_type: String,
    pub action: OptInAction,
}

/// Unsolicited message pushed by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub callback: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushEvent {
    pub fn entity_type(&self) -> Option<&str> {
        self.data.get("entityType").and_then(|value| value.as_str())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|value| value.as_str())
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn competitions(&self, query: &ListQuery) -> Result<Page<Competition>>;
    async fn contests(&self, query: &ListQuery) -> Result<Page<Contest>>;
    async fn rewards(&self, query: &ListQuery) -> Result<Page<Reward>>;
    async fn achievements(&self, query: &ListQuery) -> Result<Page<Achievement>>;
    async fn awards(&self, query: &ListQuery) -> Result<Page<Award>>;
    async fn claim_awards(&self, award_ids: &[String]) -> Result<()>;
    async fn products(&self, query: &ListQuery) -> Result<Page<Product>>;
    async fn files(&self, query: &ListQuery) -> Result<Page<FileObject>>;
    async fn opt_in_states(&self, query: &ListQuery) -> Result<Page<OptInStatus>>;
    async fn manage_opt_in(&self, request: &OptInRequest) -> Result<()>;
    /// Subscribes (or unsubscribes) and returns the current leaderboard
    /// snapshot. Unsubscribe returns an empty list.
    async fn leaderboard(
        &self,
        subscription: &LeaderboardSubscription,
    ) -> Result<Vec<LeaderboardEntry>>;
    async fn member(&self) -> Result<Member>;
    async fn instant_wins(&self, query: &ListQuery) -> Result<Page<InstantWin>>;
    async fn play_instant_win(&self, instant_win_id: &str) -> Result<InstantWinPlay>;
}
