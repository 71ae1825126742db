//! Connection lifecycle: token issuance, channel open/teardown, proactive
//! renewal, and translation of pushes into routes for the widget.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::auth::{IssuedToken, TokenIssuer};
use crate::config::Credentials;
use crate::constants::TOKEN_RENEWAL_RATIO;
use crate::error::{Result, WidgetError};
use crate::gateway::{Gateway, PushEvent};
use crate::models::LeaderboardEntry;
use crate::status::status_name;

/// An open channel. Dropping the task handle does not close it; `Session`
/// aborts the task on teardown.
pub struct Connection {
    pub gateway: Arc<dyn Gateway>,
    pub pushes: mpsc::UnboundedReceiver<PushEvent>,
    pub task: Option<JoinHandle<()>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, token: &IssuedToken) -> Result<Connection>;
}

#[derive(Debug)]
pub enum SessionEvent {
    Push(PushEvent),
    Connected,
    AuthFailed(String),
    Disconnected,
}

#[derive(Default)]
struct Live {
    credentials: Credentials,
    channel_task: Option<JoinHandle<()>>,
    forwarder: Option<AbortHandle>,
    renewal: Option<AbortHandle>,
}

pub struct Session {
    issuer: Arc<dyn TokenIssuer>,
    connector: Arc<dyn Connector>,
    renewal_ratio: f64,
    live: Mutex<Live>,
    gateway: RwLock<Option<Arc<dyn Gateway>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Session {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        connector: Arc<dyn Connector>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            issuer,
            connector,
            renewal_ratio: TOKEN_RENEWAL_RATIO,
            live: Mutex::new(Live::default()),
            gateway: RwLock::new(None),
            events,
        });
        (session, receiver)
    }

    pub fn gateway(&self) -> Option<Arc<dyn Gateway>> {
        self.gateway.read().ok().and_then(|gateway| gateway.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.gateway().is_some()
    }

    /// Tears down any existing channel, then issues a token and opens a new one.
    pub async fn connect(self: &Arc<Self>, credentials: Credentials) -> Result<Arc<dyn Gateway>> {
        let mut live = self.live.lock().await;
        live.credentials = credentials;
        self.open_locked(&mut live).await
    }

    /// Rebuilds the channel for a different member or token.
    pub async fn refresh_credentials(
        self: &Arc<Self>,
        credentials: Credentials,
    ) -> Result<Arc<dyn Gateway>> {
        info!("refreshing session credentials");
        self.connect(credentials).await
    }

    /// Safe to call repeatedly.
    pub async fn disconnect(&self) -> bool {
        let mut live = self.live.lock().await;
        self.teardown(&mut live)
    }

    async fn renew(self: &Arc<Self>) {
        let mut live = self.live.lock().await;
        // This task is the renewal timer; leave it running while it reconnects.
        live.renewal.take();
        info!("renewing member token");
        if let Err(err) = self.open_locked(&mut live).await {
            warn!(?err, "token renewal failed");
        }
    }

    async fn open_locked(self: &Arc<Self>, live: &mut Live) -> Result<Arc<dyn Gateway>> {
        self.teardown(live);

        let token = match self.issuer.issue(&live.credentials).await {
            Ok(token) => token,
            Err(err) => {
                let message = err.to_string();
                let _ = self.events.send(SessionEvent::AuthFailed(message.clone()));
                return Err(match err {
                    WidgetError::Auth(_) => err,
                    other => WidgetError::Auth(other.to_string()),
                });
            }
        };

        let connection = self.connector.open(&token).await?;
        let gateway = Arc::clone(&connection.gateway);
        if let Ok(mut slot) = self.gateway.write() {
            *slot = Some(Arc::clone(&gateway));
        }
        live.channel_task = connection.task;
        live.forwarder = Some(self.spawn_forwarder(connection.pushes));
        live.renewal = Some(self.spawn_renewal(&token));

        let _ = self.events.send(SessionEvent::Connected);
        Ok(gateway)
    }

    fn teardown(&self, live: &mut Live) -> bool {
        if let Some(renewal) = live.renewal.take() {
            renewal.abort();
        }
        if let Some(forwarder) = live.forwarder.take() {
            forwarder.abort();
        }
        if let Some(task) = live.channel_task.take() {
            task.abort();
        }
        let previous = self
            .gateway
            .write()
            .ok()
            .and_then(|mut gateway| gateway.take());
        if previous.is_some() {
            debug!("session channel torn down");
        }
        previous.is_some()
    }

    fn spawn_forwarder(&self, mut pushes: mpsc::UnboundedReceiver<PushEvent>) -> AbortHandle {
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(push) = pushes.recv().await {
                if events.send(SessionEvent::Push(push)).is_err() {
                    return;
                }
            }
            warn!("gateway channel closed");
            let _ = events.send(SessionEvent::Disconnected);
        })
        .abort_handle()
    }

    fn spawn_renewal(self: &Arc<Self>, token: &IssuedToken) -> AbortHandle {
        let delay = token.expires.mul_f64(self.renewal_ratio);
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(session) = session.upgrade() {
                session.renew().await;
            }
        })
        .abort_handle()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Contest,
    Competition,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PushRoute {
    LeaderboardUpdate {
        contest_id: String,
        entries: Vec<LeaderboardEntry>,
    },
    AwardIssued {
        award_id: String,
    },
    /// Competition listings must be refreshed; `status` is set when the push
    /// reported a lifecycle transition.
    CompetitionsChanged {
        status: Option<StatusChange>,
    },
    AchievementProgress {
        achievement_id: String,
        percentage: f64,
    },
    AchievementsChanged,
    Ignored,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusChange {
    pub kind: EntityKind,
    pub entity_id: String,
    pub current: String,
    pub previous: String,
}

const STATE_CHANGED: &str = "entityStateChanged";
const OPT_IN_STATUS: &str = "optinStatus";

/// Pure dispatch table from an inbound push to what the widget should do.
pub fn route(push: &PushEvent) -> PushRoute {
    if push.object_type.as_deref() == Some("Leaderboard") {
        let Some(contest_id) = push.str_field("id") else {
            return PushRoute::Ignored;
        };
        let entries = match push.data.get("leaderboardEntries") {
            Some(value) if !value.is_null() => {
                match serde_json::from_value::<Vec<LeaderboardEntry>>(value.clone()) {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!(?err, "undecodable leaderboard push");
                        return PushRoute::Ignored;
                    }
                }
            }
            _ => Vec::new(),
        };
        return PushRoute::LeaderboardUpdate {
            contest_id: contest_id.to_string(),
            entries,
        };
    }

    let callback = push.callback.as_deref();
    match push.entity_type() {
        Some("Award") => match push.str_field("entityId") {
            Some(award_id) => PushRoute::AwardIssued {
                award_id: award_id.to_string(),
            },
            None => PushRoute::Ignored,
        },
        Some(entity @ ("Contest" | "Competition")) => {
            let kind = if entity == "Contest" {
                EntityKind::Contest
            } else {
                EntityKind::Competition
            };
            let status = (callback == Some(STATE_CHANGED)).then(|| StatusChange {
                kind,
                entity_id: push.str_field("entityId").unwrap_or_default().to_string(),
                current: state_label(push.data.get("currentState")),
                previous: state_label(push.data.get("previousState")),
            });
            PushRoute::CompetitionsChanged { status }
        }
        Some("Achievement") if callback == Some(OPT_IN_STATUS) => {
            match push.str_field("entityId") {
                Some(achievement_id) => PushRoute::AchievementProgress {
                    achievement_id: achievement_id.to_string(),
                    percentage: push
                        .data
                        .get("percentageComplete")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                },
                None => PushRoute::Ignored,
            }
        }
        Some("Achievement") => PushRoute::AchievementsChanged,
        _ => PushRoute::Ignored,
    }
}

fn state_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .map(|code| status_name(code as i32))
            .unwrap_or_else(|| number.to_string()),
        Some(Value::String(text)) => text
            .parse::<i32>()
            .map(status_name)
            .unwrap_or_else(|_| text.clone()),
        _ => String::new(),
    }
}
