//! Numeric lifecycle codes shared with the gamification backend.
//!
//! Ranges are exclusive on both ends, matching the `moreThan`/`lessThan`
//! filters the backend accepts.

use serde::{Deserialize, Serialize};

/// Exclusive status-code window, serialized as a backend status filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRange {
    pub more_than: i32,
    pub less_than: i32,
}

impl StatusRange {
    pub const fn new(more_than: i32, less_than: i32) -> Self {
        Self {
            more_than,
            less_than,
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        code > self.more_than && code < self.less_than
    }
}

pub const COMPETITION_READY: StatusRange = StatusRange::new(10, 20);
pub const COMPETITION_ACTIVE: StatusRange = StatusRange::new(10, 30);
pub const COMPETITION_FINISHED: StatusRange = StatusRange::new(30, 50);
pub const CONTEST_ANY: StatusRange = StatusRange::new(0, 100);
/// Contests eligible as a fallback pick once no running contest exists.
pub const CONTEST_FALLBACK: StatusRange = StatusRange::new(20, 50);

pub const AWARD_AVAILABLE: StatusRange = StatusRange::new(14, 16);
pub const AWARD_CLAIMED: StatusRange = StatusRange::new(34, 36);
pub const AWARD_EXPIRED: StatusRange = StatusRange::new(114, 116);

pub const ACHIEVEMENT_PAST: StatusRange = StatusRange::new(30, 40);
pub const OPT_IN_STATES: StatusRange = StatusRange::new(-5, 40);

pub const CONTEST_IMMINENT: i32 = 15;
pub const CONTEST_STARTING: i32 = 20;
pub const CONTEST_RUNNING: i32 = 25;
pub const CONTEST_FINISHING: i32 = 30;
pub const CONTEST_FINISHED: i32 = 35;

/// Competition codes whose leaderboard is read from the competition itself
/// when no contest is selected.
pub const COMPETITION_CLOSED: [i32; 2] = [35, 45];

pub fn achievement_current(show_ready: bool) -> StatusRange {
    if show_ready {
        StatusRange::new(10, 30)
    } else {
        StatusRange::new(20, 30)
    }
}

pub fn is_contest_finished(code: i32) -> bool {
    code >= CONTEST_FINISHED
}

pub fn is_competition_closed(code: i32) -> bool {
    COMPETITION_CLOSED.contains(&code)
}

/// Opt-in state as reported by the opt-in states resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptInState {
    Pending,
    Confirmed,
    NotOptedIn,
}

impl OptInState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 | 10 => OptInState::Pending,
            15..=35 => OptInState::Confirmed,
            _ => OptInState::NotOptedIn,
        }
    }

    pub fn is_confirmed(self) -> bool {
        self == OptInState::Confirmed
    }
}

/// Display name used in status-change notifications. Unknown codes are
/// reported numerically.
pub fn status_name(code: i32) -> String {
    let name = match code {
        5 => "Draft",
        10 => "Pending",
        15 => "Ready",
        20 => "Starting",
        25 => "Active",
        30 => "Finishing",
        35 => "Finished",
        40 => "Finalising",
        45 => "Finalised",
        50 => "Archived",
        _ => return code.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_exclusive() {
        assert!(COMPETITION_READY.contains(15));
        assert!(!COMPETITION_READY.contains(10));
        assert!(!COMPETITION_READY.contains(20));
        assert!(COMPETITION_ACTIVE.contains(15));
        assert!(COMPETITION_ACTIVE.contains(25));
        assert!(COMPETITION_FINISHED.contains(35));
        assert!(AWARD_AVAILABLE.contains(15));
        assert!(AWARD_EXPIRED.contains(115));
    }

    #[test]
    fn opt_in_codes_map_to_states() {
        assert_eq!(OptInState::from_code(0), OptInState::Pending);
        assert_eq!(OptInState::from_code(10), OptInState::Pending);
        assert_eq!(OptInState::from_code(15), OptInState::Confirmed);
        assert_eq!(OptInState::from_code(35), OptInState::Confirmed);
        assert_eq!(OptInState::from_code(-1), OptInState::NotOptedIn);
        assert_eq!(OptInState::from_code(40), OptInState::NotOptedIn);
    }

    #[test]
    fn status_names_fall_back_to_code() {
        assert_eq!(status_name(25), "Active");
        assert_eq!(status_name(77), "77");
    }
}
