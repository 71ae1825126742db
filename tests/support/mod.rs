#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use portpicker::pick_unused_port;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use leaderboard_widget::auth::{IssuedToken, TokenIssuer};
use leaderboard_widget::dispatch::Region;
use leaderboard_widget::gateway::{
    Gateway, LeaderboardSubscription, ListQuery, OptInAction, OptInRequest, Page, PushEvent,
    SubscriptionAction,
};
use leaderboard_widget::models::{
    Achievement, Award, Competition, Contest, FileObject, InstantWin, InstantWinPlay,
    LeaderboardEntry, LeaderboardMember, Member, OptInStatus, Product, Reward,
};
use leaderboard_widget::reconcile::ReconcileReport;
use leaderboard_widget::session::{Connection, Connector, StatusChange};
use leaderboard_widget::surface::MemorySurface;
use leaderboard_widget::{Credentials, Result, Widget, WidgetConfig, WidgetError, WidgetObserver};

pub fn test_config() -> WidgetConfig {
    let mut config = WidgetConfig::new("test-key");
    config.competition_refresh = Duration::from_secs(60);
    config.leaderboard_refresh = Duration::from_secs(30);
    config.request_timeout = Duration::from_millis(500);
    config.show_finished_tournaments = false;
    config
}

pub fn competition(id: &str, status_code: i32) -> Competition {
    Competition {
        id: id.to_string(),
        name: format!("Competition {id}"),
        status_code,
        ..Competition::default()
    }
}

pub fn contest(id: &str, competition_id: &str, status_code: i32) -> Contest {
    Contest {
        id: id.to_string(),
        competition_id: competition_id.to_string(),
        status_code,
        name: format!("Contest {id}"),
        ..Contest::default()
    }
}

pub fn contest_reward(id: &str, contest_id: &str, reward_rank: &str) -> Reward {
    Reward {
        id: id.to_string(),
        entity_id: contest_id.to_string(),
        entity_type: "Contest".to_string(),
        reward_rank: reward_rank.to_string(),
        reward_value: 10.0,
        name: format!("Reward {id}"),
        ..Reward::default()
    }
}

pub fn entry(rank: u32, name: &str, member_ref_id: &str, score: f64) -> LeaderboardEntry {
    LeaderboardEntry {
        rank,
        name: None,
        members: vec![LeaderboardMember {
            name: name.to_string(),
            member_ref_id: member_ref_id.to_string(),
        }],
        score: Some(score),
        change: None,
    }
}

pub fn leaderboard_push(contest_id: &str, entries: &[LeaderboardEntry]) -> PushEvent {
    PushEvent {
        object_type: Some("Leaderboard".to_string()),
        callback: None,
        data: json!({ "id": contest_id, "leaderboardEntries": entries }),
    }
}

pub fn entity_push(entity_type: &str, entity_id: &str, callback: Option<&str>, extra: Value) -> PushEvent {
    let mut data = json!({ "entityType": entity_type, "entityId": entity_id });
    if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
        data.extend(extra);
    }
    PushEvent {
        object_type: None,
        callback: callback.map(str::to_string),
        data,
    }
}

/// Backend contents served by `MockGateway`.
#[derive(Default)]
pub struct Script {
    pub competitions: Vec<Competition>,
    pub contests: Vec<Contest>,
    pub rewards: Vec<Reward>,
    pub achievements: Vec<Achievement>,
    pub awards: Vec<Award>,
    pub products: Vec<Product>,
    pub files: Vec<FileObject>,
    pub opt_ins: Vec<OptInStatus>,
    pub instant_wins: Vec<InstantWin>,
    pub leaderboards: HashMap<String, Vec<LeaderboardEntry>>,
    pub member: Member,
    /// Status code recorded for an entity once it is joined.
    pub join_status: i32,
}

impl Script {
    pub fn running_tournament() -> Self {
        let mut leaderboards = HashMap::new();
        leaderboards.insert(
            "ct-2".to_string(),
            vec![
                entry(1, "Alice", "m-2", 300.0),
                entry(2, "Bob", "m-1", 200.0),
                entry(3, "Carol", "m-3", 100.0),
            ],
        );
        Self {
            competitions: vec![competition("comp-a", 25), competition("comp-r", 15)],
            contests: vec![
                contest("ct-1", "comp-a", 20),
                contest("ct-2", "comp-a", 25),
                contest("ct-r", "comp-r", 15),
            ],
            rewards: vec![contest_reward("rw-1", "ct-2", "1-5")],
            leaderboards,
            member: Member {
                id: "id-1".to_string(),
                member_ref_id: "m-1".to_string(),
                name: "Bob".to_string(),
            },
            join_status: 15,
            ..Self::default()
        }
    }
}

fn status_matches(query: &ListQuery, code: i32) -> bool {
    query.status_code.map(|range| range.contains(code)).unwrap_or(true)
}

fn paged<T: Clone>(items: Vec<T>, query: &ListQuery) -> Page<T> {
    let total = items.len() as u64;
    let data = items
        .into_iter()
        .skip(query.skip as usize)
        .take(if query.limit == 0 { usize::MAX } else { query.limit as usize })
        .collect();
    Page { data, total }
}

#[derive(Default)]
pub struct MockGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    stalled: Mutex<HashSet<&'static str>>,
}

impl MockGateway {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    /// Makes every later call of the named `Gateway` method fail as a
    /// transport error.
    pub fn fail(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn recover(&self, method: &'static str) {
        self.failing.lock().unwrap().remove(method);
    }

    /// Makes every later call of the named method hang forever.
    pub fn stall(&self, method: &'static str) {
        self.stalled.lock().unwrap().insert(method);
    }

    async fn gate(&self, method: &'static str) -> Result<()> {
        let stalled = self.stalled.lock().unwrap().contains(method);
        if stalled {
            std::future::pending::<()>().await;
        }
        let failing = self.failing.lock().unwrap().contains(method);
        if failing {
            return Err(WidgetError::Transport(format!("{method} unavailable")));
        }
        Ok(())
    }

    pub fn update(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c.as_str() == call)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn competitions(&self, query: &ListQuery) -> Result<Page<Competition>> {
        self.record("competitions");
        self.gate("competitions").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .competitions
            .iter()
            .filter(|c| status_matches(query, c.status_code))
            .filter(|c| query.ids.is_empty() || query.ids.contains(&c.id))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn contests(&self, query: &ListQuery) -> Result<Page<Contest>> {
        self.record("contests");
        self.gate("contests").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .contests
            .iter()
            .filter(|c| status_matches(query, c.status_code))
            .filter(|c| query.competition_ids.is_empty() || query.competition_ids.contains(&c.competition_id))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn rewards(&self, query: &ListQuery) -> Result<Page<Reward>> {
        self.record("rewards");
        self.gate("rewards").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .rewards
            .iter()
            .filter(|r| query.ids.is_empty() || query.ids.contains(&r.id))
            .filter(|r| query.entity_ids.is_empty() || query.entity_ids.contains(&r.entity_id))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn achievements(&self, query: &ListQuery) -> Result<Page<Achievement>> {
        self.record("achievements");
        self.gate("achievements").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .achievements
            .iter()
            .filter(|a| status_matches(query, a.status_code))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn awards(&self, query: &ListQuery) -> Result<Page<Award>> {
        self.record("awards");
        self.gate("awards").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .awards
            .iter()
            .filter(|a| query.ids.is_empty() || query.ids.contains(&a.id))
            .filter(|a| !query.ids.is_empty() || status_matches(query, a.status_code))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn claim_awards(&self, award_ids: &[String]) -> Result<()> {
        self.record(format!("claim:{}", award_ids.join(",")));
        self.gate("claim_awards").await?;
        let mut script = self.script.lock().unwrap();
        for award in script.awards.iter_mut().filter(|a| award_ids.contains(&a.id)) {
            award.claimed = true;
            award.status_code = 35;
        }
        Ok(())
    }

    async fn products(&self, query: &ListQuery) -> Result<Page<Product>> {
        self.record("products");
        self.gate("products").await?;
        Ok(paged(self.script.lock().unwrap().products.clone(), query))
    }

    async fn files(&self, query: &ListQuery) -> Result<Page<FileObject>> {
        self.record("files");
        self.gate("files").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .files
            .iter()
            .filter(|f| query.ids.is_empty() || query.ids.contains(&f.id))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn opt_in_states(&self, query: &ListQuery) -> Result<Page<OptInStatus>> {
        self.record("opt-in-states");
        self.gate("opt_in_states").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .opt_ins
            .iter()
            .filter(|s| query.entity_ids.is_empty() || query.entity_ids.contains(&s.entity_id))
            .filter(|s| status_matches(query, s.status_code))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn manage_opt_in(&self, request: &OptInRequest) -> Result<()> {
        let verb = match request.action {
            OptInAction::Join => "join",
            OptInAction::Leave => "leave",
        };
        self.record(format!("{verb}:{}", request.entity_id));
        self.gate("manage_opt_in").await?;
        let mut script = self.script.lock().unwrap();
        script.opt_ins.retain(|s| s.entity_id != request.entity_id);
        if request.action == OptInAction::Join {
            let status_code = script.join_status;
            script.opt_ins.push(OptInStatus {
                entity_id: request.entity_id.clone(),
                status_code,
                percentage_complete: None,
            });
        }
        Ok(())
    }

    async fn leaderboard(
        &self,
        subscription: &LeaderboardSubscription,
    ) -> Result<Vec<LeaderboardEntry>> {
        self.gate("leaderboard").await?;
        match subscription.action {
            SubscriptionAction::Subscribe => {
                self.record(format!("subscribe:{}", subscription.entity_id));
                let script = self.script.lock().unwrap();
                Ok(script
                    .leaderboards
                    .get(&subscription.entity_id)
                    .cloned()
                    .unwrap_or_default())
            }
            SubscriptionAction::Unsubscribe => {
                self.record(format!("unsubscribe:{}", subscription.entity_id));
                Ok(Vec::new())
            }
        }
    }

    async fn member(&self) -> Result<Member> {
        self.record("member");
        self.gate("member").await?;
        Ok(self.script.lock().unwrap().member.clone())
    }

    async fn instant_wins(&self, query: &ListQuery) -> Result<Page<InstantWin>> {
        self.record("instant-wins");
        self.gate("instant_wins").await?;
        let script = self.script.lock().unwrap();
        let items = script
            .instant_wins
            .iter()
            .filter(|w| query.instant_win_types.is_empty() || query.instant_win_types.contains(&w.instant_win_type))
            .cloned()
            .collect();
        Ok(paged(items, query))
    }

    async fn play_instant_win(&self, instant_win_id: &str) -> Result<InstantWinPlay> {
        self.record(format!("play:{instant_win_id}"));
        self.gate("play_instant_win").await?;
        Ok(InstantWinPlay {
            instant_win_id: instant_win_id.to_string(),
            award_ids: Vec::new(),
        })
    }
}

/// Hands out `MockGateway` connections and keeps the push side of the
/// latest one.
pub struct MockConnector {
    gateway: Arc<MockGateway>,
    pushes: Mutex<Option<mpsc::UnboundedSender<PushEvent>>>,
    opens: AtomicUsize,
}

impl MockConnector {
    pub fn new(gateway: Arc<MockGateway>) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            pushes: Mutex::new(None),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, event: PushEvent) -> bool {
        self.pushes
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Closes the push side as a dropped socket would.
    pub fn drop_channel(&self) {
        self.pushes.lock().unwrap().take();
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _token: &IssuedToken) -> Result<Connection> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.pushes.lock().unwrap() = Some(tx);
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Connection {
            gateway: Arc::clone(&self.gateway) as Arc<dyn Gateway>,
            pushes: rx,
            task: None,
        })
    }
}

#[derive(Default)]
pub struct StaticIssuer {
    rejecting: AtomicBool,
    issued: Mutex<Vec<Credentials>>,
}

impl StaticIssuer {
    pub fn rejecting() -> Arc<Self> {
        let issuer = Self::default();
        issuer.rejecting.store(true, Ordering::SeqCst);
        Arc::new(issuer)
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn issued(&self) -> usize {
        self.issued.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue(&self, credentials: &Credentials) -> Result<IssuedToken> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(WidgetError::Auth("token rejected".to_string()));
        }
        self.issued.lock().unwrap().push(credentials.clone());
        Ok(IssuedToken {
            token: "jwt-test".to_string(),
            expires: Duration::from_secs(3600),
        })
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub paints: Mutex<Vec<ReconcileReport>>,
    pub errors: Mutex<Vec<bool>>,
    pub celebrations: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<StatusChange>>,
    pub progress: Mutex<Vec<(String, f64)>>,
    pub drawers: Mutex<Vec<Region>>,
    pub award_details: Mutex<Vec<String>>,
    pub disconnects: AtomicUsize,
    pub recoveries: AtomicUsize,
}

impl WidgetObserver for RecordingObserver {
    fn leaderboard_painted(&self, report: &ReconcileReport) {
        self.paints.lock().unwrap().push(report.clone());
    }

    fn error_state(&self, active: bool) {
        self.errors.lock().unwrap().push(active);
    }

    fn award_details(&self, award: &Award) {
        self.award_details.lock().unwrap().push(award.id.clone());
    }

    fn award_celebration(&self, award: &Award) {
        self.celebrations.lock().unwrap().push(award.id.clone());
    }

    fn status_changed(&self, change: &StatusChange) {
        self.statuses.lock().unwrap().push(change.clone());
    }

    fn achievement_progress(&self, achievement_id: &str, percentage: f64) {
        self.progress
            .lock()
            .unwrap()
            .push((achievement_id.to_string(), percentage));
    }

    fn drawer_closed(&self, drawer: Region) {
        self.drawers.lock().unwrap().push(drawer);
    }

    fn preloader_recovered(&self) {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnected(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub widget: Arc<Widget<MemorySurface>>,
    pub gateway: Arc<MockGateway>,
    pub connector: Arc<MockConnector>,
    pub issuer: Arc<StaticIssuer>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        Self::with_issuer(script, Arc::new(StaticIssuer::default()))
    }

    pub fn with_issuer(script: Script, issuer: Arc<StaticIssuer>) -> Self {
        let gateway = MockGateway::new(script);
        let connector = MockConnector::new(Arc::clone(&gateway));
        let observer = Arc::new(RecordingObserver::default());
        let widget = Widget::new(
            test_config(),
            Arc::clone(&issuer) as Arc<dyn TokenIssuer>,
            Arc::clone(&connector) as Arc<dyn Connector>,
            MemorySurface::default(),
            Arc::clone(&observer) as Arc<dyn WidgetObserver>,
        );
        Self {
            widget,
            gateway,
            connector,
            issuer,
            observer,
        }
    }
}

/// Lets spawned tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Serves the member-token resource. Tokens are issued only for
/// `good-key`; any other key gets a reply without `jwtToken`.
pub async fn spawn_token_server() -> String {
    let port = pick_unused_port().expect("free port");
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind token server");
    let app = Router::new().route("/member-token", post(issue_token));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://127.0.0.1:{port}/member-token")
}

async fn issue_token(Json(body): Json<Value>) -> Json<Value> {
    if body["apiKey"] != "good-key" {
        return Json(json!({ "data": {} }));
    }
    let member = body["member"].as_str().unwrap_or_default();
    Json(json!({
        "data": {
            "jwtToken": format!("jwt-for-{member}"),
            "isReferenceId": body["isReferenceId"],
            "expires": body["expires"],
        }
    }))
}

/// Minimal gateway speaking the request/reply frame format. Every request
/// is answered from `replies` keyed by resource; the first request is
/// followed by one leaderboard push. Returns the URL and the bearer header
/// seen during the handshake.
pub async fn spawn_ws_gateway(replies: HashMap<String, Value>) -> (String, Arc<Mutex<Option<String>>>) {
    let port = pick_unused_port().expect("free port");
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind ws gateway");
    let authorization = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&authorization);

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let seen = Arc::clone(&seen);
        let callback = move |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            *seen.lock().unwrap() = request
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            Ok(response)
        };
        let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
            return;
        };
        let (mut sink, mut source) = ws.split();
        let mut pushed = false;
        while let Some(Ok(message)) = source.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let resource = frame["resource"].as_str().unwrap_or_default();
            let reply = match replies.get(resource) {
                Some(data) => json!({ "id": frame["id"], "data": data, "meta": { "totalRecordsFound": 42 } }),
                None => json!({ "id": frame["id"], "error": { "message": format!("unknown resource {resource}") } }),
            };
            if sink.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
            if !pushed {
                pushed = true;
                let push = json!({
                    "objectType": "Leaderboard",
                    "data": { "id": "ct-1", "leaderboardEntries": [{ "rank": 1, "name": "Ann", "score": 5.0 }] }
                });
                if sink.send(Message::Text(push.to_string())).await.is_err() {
                    return;
                }
            }
        }
    });

    (format!("ws://127.0.0.1:{port}/ws"), authorization)
}
