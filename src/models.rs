use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::OPT_IN_REQUIRED_CONSTRAINT;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status_code: i32,
    #[serde(default)]
    pub scheduled_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Competition {
    pub fn requires_opt_in(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| constraint == OPT_IN_REQUIRED_CONSTRAINT)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub id: String,
    #[serde(default)]
    pub competition_id: String,
    pub status_code: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scheduled_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardType {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub uom_symbol: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub reward_rank: String,
    #[serde(default)]
    pub reward_value: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub reward_type: Option<RewardType>,
}

impl Reward {
    pub fn uom_symbol(&self) -> Option<&str> {
        self.reward_type
            .as_ref()
            .and_then(|reward_type| reward_type.uom_symbol.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub member_ref_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<LeaderboardMember>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
}

impl LeaderboardEntry {
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        self.members
            .iter()
            .map(|member| member.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn includes_member(&self, member_ref_id: &str) -> bool {
        !member_ref_id.is_empty()
            && self
                .members
                .iter()
                .any(|member| member.member_ref_id == member_ref_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status_code: i32,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub scheduled_end_date: Option<DateTime<Utc>>,
    /// First reward whose entity id matches, joined after listing.
    #[serde(default)]
    pub reward: Option<Reward>,
    /// Opt-in status code, attached only when the achievement requires opt-in.
    #[serde(default)]
    pub opt_in_status: Option<i32>,
}

impl Achievement {
    pub fn requires_opt_in(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| constraint == OPT_IN_REQUIRED_CONSTRAINT)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub id: String,
    #[serde(default)]
    pub reward_id: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub claimed: bool,
    pub status_code: i32,
    #[serde(default)]
    pub reward: Option<Reward>,
    /// Resolved location of the reward icon.
    #[serde(default)]
    pub icon_uri: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_ref_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInStatus {
    pub entity_id: String,
    pub status_code: i32,
    #[serde(default)]
    pub percentage_complete: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub member_ref_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantWin {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instant_win_type: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinPlay {
    pub instant_win_id: String,
    #[serde(default)]
    pub award_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_entry_accepts_member_list() {
        let entry: LeaderboardEntry = serde_json::from_value(serde_json::json!({
            "rank": 2,
            "members": [
                { "name": "Ann", "memberRefId": "m-1" },
                { "name": "Bob", "memberRefId": "m-2" }
            ],
            "score": 120.5,
            "change": -1
        }))
        .expect("entry");
        assert_eq!(entry.display_name(), "Ann, Bob");
        assert!(entry.includes_member("m-2"));
        assert!(!entry.includes_member(""));
        assert_eq!(entry.change, Some(-1.0));
    }

    #[test]
    fn competition_reads_opt_in_constraint() {
        let competition: Competition = serde_json::from_value(serde_json::json!({
            "id": "c-1",
            "statusCode": 25,
            "constraints": ["optinRequiredForEntrants"],
            "scheduledEndDate": "2026-01-31T12:00:00Z"
        }))
        .expect("competition");
        assert!(competition.requires_opt_in());
        assert!(competition.scheduled_end_date.is_some());
        assert!(competition.rewards.is_empty());
    }
}
