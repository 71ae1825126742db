//! Incremental leaderboard rendering.
//!
//! Rendered rows are keyed by `(rank, occurrence)`. A reconcile pass removes
//! rows that disappeared, patches rows whose content changed and inserts new
//! ones next to their neighbours. Unchanged rows are never touched, so
//! reconciling the same input twice performs no surface mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};

use crate::constants::{DEFAULT_MEMBER_LABEL, DEFAULT_SHOWN_RANKS, PLACEHOLDER, VIEWPORT_INDENTATION};
use crate::models::{LeaderboardEntry, Reward};
use crate::rank::rewards_for_rank;
use crate::surface::{Growth, Rect, RowContent, RowKey, RowSurface};
use crate::util::{format_points, mask_name, reward_label};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub member_ref_id: Option<String>,
    pub member_label: String,
    /// Non-zero masks other members' names to this many characters.
    pub name_length: usize,
    /// Ranks `1..=always_shown` keep a row even without data.
    pub always_shown: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            member_ref_id: None,
            member_label: DEFAULT_MEMBER_LABEL.to_string(),
            name_length: 0,
            always_shown: DEFAULT_SHOWN_RANKS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MemberVisibility {
    #[default]
    Absent,
    Visible,
    /// The member's row exists but is scrolled out of view.
    Hidden,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub cleared: usize,
    pub member: MemberVisibility,
}

impl ReconcileReport {
    pub fn mutations(&self) -> usize {
        self.inserted + self.updated + self.removed + self.cleared
    }
}

struct Rendered<R> {
    row: R,
    content: RowContent,
}

pub struct LeaderboardView<S: RowSurface> {
    surface: S,
    rendered: BTreeMap<RowKey, Rendered<S::Row>>,
    options: RenderOptions,
}

impl<S: RowSurface> LeaderboardView<S> {
    pub fn new(surface: S, options: RenderOptions) -> Self {
        Self {
            surface,
            rendered: BTreeMap::new(),
            options,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Later passes pick up the new member; already rendered rows change on
    /// their next patch.
    pub fn set_member(&mut self, member_ref_id: Option<String>) {
        self.options.member_ref_id = member_ref_id;
    }

    pub fn rendered_keys(&self) -> Vec<RowKey> {
        self.rendered.keys().copied().collect()
    }

    pub fn content(&self, key: RowKey) -> Option<&RowContent> {
        self.rendered.get(&key).map(|rendered| &rendered.content)
    }

    pub fn reconcile(&mut self, entries: &[LeaderboardEntry], rewards: &[Reward]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let desired = desired_rows(entries, rewards, &self.options);
        let incoming_keys: HashSet<RowKey> = desired.iter().map(|(key, _)| *key).collect();
        let incoming_ranks: HashSet<u32> = entries.iter().map(|entry| entry.rank).collect();

        let stale: Vec<RowKey> = self
            .rendered
            .keys()
            .filter(|key| !incoming_keys.contains(key))
            .copied()
            .collect();
        for key in stale {
            let keeps_slot = key.occurrence == 0
                && key.rank >= 1
                && key.rank <= self.options.always_shown
                && !incoming_ranks.contains(&key.rank);
            if keeps_slot {
                let placeholder = placeholder_content(key.rank, rewards, &self.options);
                if let Some(rendered) = self.rendered.get_mut(&key) {
                    if rendered.content != placeholder {
                        self.surface.patch_row(&rendered.row, &placeholder);
                        rendered.content = placeholder;
                        report.cleared += 1;
                    }
                }
                continue;
            }
            if let Some(rendered) = self.rendered.remove(&key) {
                self.surface.remove_row(&rendered.row);
                report.removed += 1;
            }
        }

        for (key, content) in desired {
            if let Some(rendered) = self.rendered.get_mut(&key) {
                if rendered.content != content {
                    self.surface.patch_row(&rendered.row, &content);
                    rendered.content = content;
                    report.updated += 1;
                }
                continue;
            }

            let row = self.surface.create_row(key, &content);
            let tie_anchor = key
                .occurrence
                .checked_sub(1)
                .and_then(|previous| self.rendered.get(&RowKey::new(key.rank, previous)))
                .map(|rendered| rendered.row.clone());
            match tie_anchor {
                Some(anchor) => self.surface.insert_after(&row, Some(&anchor)),
                None => {
                    let next = self
                        .rendered
                        .range((Excluded(key), Unbounded))
                        .next()
                        .map(|(_, rendered)| rendered.row.clone());
                    match next {
                        Some(next) => self.surface.insert_before(&row, &next),
                        None => self.surface.insert_after(&row, None),
                    }
                }
            }
            self.rendered.insert(key, Rendered { row, content });
            report.inserted += 1;
        }

        report.member = self.member_visibility();
        report
    }

    pub fn member_visibility(&self) -> MemberVisibility {
        let Some(rendered) = self.rendered.values().find(|rendered| rendered.content.is_member) else {
            return MemberVisibility::Absent;
        };
        match (self.surface.row_rect(&rendered.row), self.surface.container_rect()) {
            (Some(row), Some(container)) if is_visible_in_view(row, container) => {
                MemberVisibility::Visible
            }
            (Some(_), Some(_)) => MemberVisibility::Hidden,
            _ => MemberVisibility::Visible,
        }
    }
}

/// A row counts as visible while it has not scrolled further than its own
/// height past the top indentation or below the container bottom.
pub fn is_visible_in_view(row: Rect, container: Rect) -> bool {
    let shifted_top = row.top - VIEWPORT_INDENTATION;
    if shifted_top <= container.top {
        container.top - shifted_top <= row.height()
    } else {
        row.bottom - container.bottom <= row.height()
    }
}

fn desired_rows(
    entries: &[LeaderboardEntry],
    rewards: &[Reward],
    options: &RenderOptions,
) -> Vec<(RowKey, RowContent)> {
    let last_gap = match entries {
        [.., before, last] => last.rank > before.rank + 1,
        _ => false,
    };
    let mut seen: HashMap<u32, u32> = HashMap::new();
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let occurrence = seen.entry(entry.rank).or_insert(0);
            let key = RowKey::new(entry.rank, *occurrence);
            *occurrence += 1;
            let is_last = last_gap && index + 1 == entries.len();
            (key, row_content(entry, key.occurrence, is_last, rewards, options))
        })
        .collect()
}

pub fn row_content(
    entry: &LeaderboardEntry,
    occurrence: u32,
    is_last: bool,
    rewards: &[Reward],
    options: &RenderOptions,
) -> RowContent {
    let display_name = entry.display_name();
    let is_member = options
        .member_ref_id
        .as_deref()
        .map(|member_ref_id| entry.includes_member(member_ref_id))
        .unwrap_or(false);
    let name = if is_member {
        options.member_label.clone()
    } else if display_name.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        mask_name(&display_name, options.name_length)
    };
    let reward = if entry.rank == 0 {
        String::new()
    } else {
        rewards_for_rank(rewards, entry.rank)
            .next()
            .map(reward_label)
            .unwrap_or_default()
    };

    RowContent {
        rank: if entry.rank == 0 {
            PLACEHOLDER.to_string()
        } else {
            entry.rank.to_string()
        },
        icon: display_name.chars().next().map(String::from).unwrap_or_default(),
        name,
        points: format_points(entry.score),
        reward,
        growth: Growth::from_change(entry.change),
        is_member,
        shared_rank: occurrence > 0,
        is_last,
    }
}

pub fn placeholder_content(rank: u32, rewards: &[Reward], options: &RenderOptions) -> RowContent {
    let entry = LeaderboardEntry {
        rank,
        ..LeaderboardEntry::default()
    };
    row_content(&entry, 0, false, rewards, options)
}

/// Rows shown when there is no leaderboard data: ranks `1..=count`.
pub fn placeholder_rows(count: u32) -> Vec<LeaderboardEntry> {
    (1..=count)
        .map(|rank| LeaderboardEntry {
            rank,
            ..LeaderboardEntry::default()
        })
        .collect()
}
