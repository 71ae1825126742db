//! Click routing.
//!
//! Every actionable node carries an optional [`ActionTag`]. A click is
//! classified by walking from the clicked node up through its ancestors: the
//! first non-region tag wins and region tags met on the way become context.
//! The dispatcher only routes; the handler does the work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    Dashboard,
    TournamentList,
    AchievementList,
    RewardList,
    RewardDrawer,
    OptInDrawer,
    Celebration,
    ErrorOverlay,
}

impl Region {
    pub fn is_drawer(self) -> bool {
        matches!(self, Region::RewardDrawer | Region::OptInDrawer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptInSurface {
    MiniScoreboard,
    Details,
    Leaderboard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListKind {
    ReadyTournaments,
    ActiveTournaments,
    FinishedTournaments,
    CurrentAchievements,
    PastAchievements,
    AvailableAwards,
    ClaimedAwards,
    ExpiredAwards,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Dashboard,
    Leaderboard,
    Tournaments,
    Achievements,
    Rewards,
    Inbox,
    InstantWins,
}

impl View {
    /// Views whose opening loads data from the gateway.
    pub fn loads_data(self) -> bool {
        !matches!(self, View::Tournaments)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionTag {
    OptInActiveCompetition { surface: OptInSurface },
    OptInCompetition { competition_id: String },
    OptOutActiveCompetition,
    JoinAchievement { achievement_id: String },
    LeaveAchievement { achievement_id: String },
    SelectContest { contest_id: String },
    OpenTournament { competition_id: String },
    OpenAchievement { achievement_id: String },
    OpenAward { award_id: String },
    ClaimAward { award_id: String },
    DeclineAward { award_id: String },
    Paginate { list: ListKind, page: u32 },
    ShowMore { list: ListKind },
    OpenInstantWins,
    PlayInstantWin { instant_win_id: String },
    Navigate { view: View },
    Back { view: View },
    CloseWidget,
    ErrorBack,
    ErrorClose,
    CloseNotification,
    Toggle { section: String },
    /// Context marker; never an action by itself.
    Region { region: Region },
}

impl ActionTag {
    /// Actions that reach the network and must not run twice concurrently.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ActionTag::OptInActiveCompetition { .. }
                | ActionTag::OptInCompetition { .. }
                | ActionTag::OptOutActiveCompetition
                | ActionTag::JoinAchievement { .. }
                | ActionTag::LeaveAchievement { .. }
                | ActionTag::SelectContest { .. }
                | ActionTag::OpenTournament { .. }
                | ActionTag::OpenAward { .. }
                | ActionTag::ClaimAward { .. }
                | ActionTag::Paginate { .. }
                | ActionTag::ShowMore { .. }
                | ActionTag::OpenInstantWins
                | ActionTag::PlayInstantWin { .. }
                | ActionTag::ErrorBack
        ) || matches!(
            self,
            ActionTag::Navigate { view } | ActionTag::Back { view } if view.loads_data()
        )
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            ActionTag::Region { region } => Some(*region),
            _ => None,
        }
    }
}

/// A node in the clickable tree. The wasm binding builds these from element
/// attributes; tests build them directly.
#[derive(Debug, Default)]
pub struct ActionNode {
    tag: Option<ActionTag>,
    parent: Option<Arc<ActionNode>>,
    busy: AtomicBool,
}

impl ActionNode {
    pub fn root(tag: Option<ActionTag>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            ..Self::default()
        })
    }

    pub fn child(parent: &Arc<ActionNode>, tag: Option<ActionTag>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            parent: Some(Arc::clone(parent)),
            busy: AtomicBool::new(false),
        })
    }

    pub fn tag(&self) -> Option<&ActionTag> {
        self.tag.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn ancestry(&self) -> impl Iterator<Item = &ActionNode> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub tag: ActionTag,
    /// Regions enclosing the tagged node, innermost first.
    pub regions: Vec<Region>,
}

impl Action {
    pub fn within(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    /// The tagged node already has a network action in flight.
    Busy,
    Unmatched,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Drawer currently open, if any.
    fn open_drawer(&self) -> Option<Region> {
        None
    }

    async fn close_drawer(&self, _drawer: Region) {}

    async fn perform(&self, action: &Action);
}

/// Returns the matched action and the node that carries its tag.
pub fn classify(node: &ActionNode) -> Option<(Action, &ActionNode)> {
    let mut regions = Vec::new();
    let mut matched: Option<(ActionTag, &ActionNode)> = None;
    for ancestor in node.ancestry() {
        match ancestor.tag() {
            Some(tag) => match tag.region() {
                Some(region) => regions.push(region),
                None if matched.is_none() => {
                    matched = Some((tag.clone(), ancestor));
                    regions.clear();
                }
                None => {}
            },
            None => {}
        }
    }
    matched.map(|(tag, owner)| (Action { tag, regions }, owner))
}

fn enclosing_regions(node: &ActionNode) -> Vec<Region> {
    node.ancestry()
        .filter_map(|ancestor| ancestor.tag().and_then(ActionTag::region))
        .collect()
}

pub async fn dispatch<H>(node: &ActionNode, handler: &H) -> Dispatched
where
    H: ActionHandler + ?Sized,
{
    if let Some(drawer) = handler.open_drawer() {
        if !enclosing_regions(node).contains(&drawer) {
            handler.close_drawer(drawer).await;
        }
    }

    let Some((action, owner)) = classify(node) else {
        return Dispatched::Unmatched;
    };

    if !action.tag.is_network() {
        handler.perform(&action).await;
        return Dispatched::Handled;
    }

    if owner
        .busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!(action = ?action.tag, "ignoring click on busy node");
        return Dispatched::Busy;
    }
    handler.perform(&action).await;
    owner.busy.store(false, Ordering::SeqCst);
    Dispatched::Handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Recorder {
        performed: Mutex<Vec<Action>>,
        closed: Mutex<Vec<Region>>,
        drawer: Option<Region>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        fn open_drawer(&self) -> Option<Region> {
            self.drawer
        }

        async fn close_drawer(&self, drawer: Region) {
            self.closed.lock().unwrap().push(drawer);
        }

        async fn perform(&self, action: &Action) {
            self.performed.lock().unwrap().push(action.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    fn claim(award_id: &str) -> ActionTag {
        ActionTag::ClaimAward {
            award_id: award_id.to_string(),
        }
    }

    #[test]
    fn nearest_tag_wins_and_collects_regions() {
        let dashboard = ActionNode::root(Some(ActionTag::Region {
            region: Region::Dashboard,
        }));
        let list = ActionNode::child(
            &dashboard,
            Some(ActionTag::Region {
                region: Region::TournamentList,
            }),
        );
        let item = ActionNode::child(
            &list,
            Some(ActionTag::OpenTournament {
                competition_id: "c-1".to_string(),
            }),
        );
        let button = ActionNode::child(
            &item,
            Some(ActionTag::OptInCompetition {
                competition_id: "c-1".to_string(),
            }),
        );
        let icon = ActionNode::child(&button, None);

        let (action, owner) = classify(&icon).expect("classified");
        assert_eq!(
            action.tag,
            ActionTag::OptInCompetition {
                competition_id: "c-1".to_string()
            }
        );
        assert!(std::ptr::eq(owner, button.as_ref()));
        assert_eq!(action.regions, vec![Region::TournamentList, Region::Dashboard]);
        assert!(action.within(Region::Dashboard));
    }

    #[test]
    fn untagged_click_is_unmatched() {
        let region = ActionNode::root(Some(ActionTag::Region {
            region: Region::Dashboard,
        }));
        let plain = ActionNode::child(&region, None);
        assert!(classify(&plain).is_none());
    }

    #[test]
    fn tags_parse_from_attribute_json() {
        let tag: ActionTag =
            serde_json::from_str(r#"{"action":"paginate","list":"claimedAwards","page":3}"#).unwrap();
        assert_eq!(
            tag,
            ActionTag::Paginate {
                list: ListKind::ClaimedAwards,
                page: 3
            }
        );
        let tag: ActionTag =
            serde_json::from_str(r#"{"action":"selectContest","contestId":"k-9"}"#).unwrap();
        assert!(tag.is_network());
    }

    #[tokio::test]
    async fn busy_node_ignores_second_click() {
        let tags = [
            claim("a-1"),
            ActionTag::OpenAward {
                award_id: "a-1".to_string(),
            },
            ActionTag::OpenTournament {
                competition_id: "c-1".to_string(),
            },
            ActionTag::OpenInstantWins,
            ActionTag::Navigate {
                view: View::Rewards,
            },
            ActionTag::ErrorBack,
        ];
        for tag in tags {
            let gate = Arc::new(Notify::new());
            let handler = Arc::new(Recorder {
                gate: Some(Arc::clone(&gate)),
                ..Recorder::default()
            });
            let node = ActionNode::root(Some(tag.clone()));

            let first = {
                let handler = Arc::clone(&handler);
                let node = Arc::clone(&node);
                tokio::spawn(async move { dispatch(node.as_ref(), handler.as_ref()).await })
            };
            tokio::task::yield_now().await;
            assert!(node.is_busy(), "{tag:?} should mark its node busy");
            assert_eq!(dispatch(node.as_ref(), handler.as_ref()).await, Dispatched::Busy);

            gate.notify_one();
            assert_eq!(first.await.unwrap(), Dispatched::Handled);
            assert!(!node.is_busy());
            assert_eq!(handler.performed.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn presentation_only_actions_skip_the_busy_guard() {
        assert!(!ActionTag::Navigate {
            view: View::Tournaments
        }
        .is_network());
        assert!(!ActionTag::CloseNotification.is_network());
        assert!(!ActionTag::DeclineAward {
            award_id: "a-1".to_string()
        }
        .is_network());
        assert!(ActionTag::Back {
            view: View::Achievements
        }
        .is_network());
    }

    #[tokio::test]
    async fn click_outside_open_drawer_closes_it() {
        let handler = Recorder {
            drawer: Some(Region::RewardDrawer),
            ..Recorder::default()
        };
        let outside = ActionNode::root(Some(ActionTag::Navigate {
            view: View::Achievements,
        }));
        assert_eq!(dispatch(outside.as_ref(), &handler).await, Dispatched::Handled);
        assert_eq!(*handler.closed.lock().unwrap(), vec![Region::RewardDrawer]);

        let drawer = ActionNode::root(Some(ActionTag::Region {
            region: Region::RewardDrawer,
        }));
        let inside = ActionNode::child(&drawer, Some(claim("a-2")));
        dispatch(inside.as_ref(), &handler).await;
        assert_eq!(handler.closed.lock().unwrap().len(), 1);
    }
}
