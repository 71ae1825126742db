//! JSON request/response and push delivery over one websocket.
//!
//! Outbound requests carry a numeric `id`; the matching reply echoes it.
//! Frames without an `id` are pushes and are forwarded in arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message};
use tracing::{debug, info, warn};

use crate::auth::IssuedToken;
use crate::config::WidgetConfig;
use crate::error::{Result, WidgetError};
use crate::gateway::{Gateway, LeaderboardSubscription, ListQuery, OptInRequest, Page, PushEvent};
use crate::models::{
    Achievement, Award, Competition, Contest, FileObject, InstantWin, InstantWinPlay,
    LeaderboardEntry, Member, OptInStatus, Product, Reward,
};
use crate::session::{Connection, Connector};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Reply>>>>>;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Meta {
    total_records_found: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    id: Option<u64>,
    #[serde(default)]
    data: Value,
    error: Option<ErrorBody>,
    meta: Option<Meta>,
    object_type: Option<String>,
    callback: Option<String>,
}

struct Reply {
    data: Value,
    total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardReply {
    #[serde(default)]
    leaderboard_entries: Vec<LeaderboardEntry>,
}

pub struct WsGateway {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
}

impl WsGateway {
    async fn call(&self, resource: &str, body: Value) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }

        let frame = serde_json::json!({
            "id": id,
            "resource": resource,
            "body": body,
        });
        if self.outbound.send(Message::Text(frame.to_string())).is_err() {
            self.forget(id);
            return Err(WidgetError::Disconnected);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(WidgetError::Disconnected),
            Err(_) => {
                self.forget(id);
                Err(WidgetError::Timeout(resource.to_string()))
            }
        }
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }

    async fn call_data<T: DeserializeOwned>(&self, resource: &str, body: Value) -> Result<T> {
        let reply = self.call(resource, body).await?;
        Ok(serde_json::from_value(reply.data)?)
    }

    async fn call_page<T: DeserializeOwned>(&self, resource: &str, query: &ListQuery) -> Result<Page<T>> {
        let reply = self.call(resource, serde_json::to_value(query)?).await?;
        let data: Vec<T> = if reply.data.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(reply.data)?
        };
        let total = reply.total.unwrap_or(data.len() as u64);
        Ok(Page { data, total })
    }
}

#[async_trait]
impl Gateway for WsGateway {
    async fn competitions(&self, query: &ListQuery) -> Result<Page<Competition>> {
        self.call_page("competitions", query).await
    }

    async fn contests(&self, query: &ListQuery) -> Result<Page<Contest>> {
        self.call_page("contests", query).await
    }

    async fn rewards(&self, query: &ListQuery) -> Result<Page<Reward>> {
        self.call_page("rewards", query).await
    }

    async fn achievements(&self, query: &ListQuery) -> Result<Page<Achievement>> {
        self.call_page("achievements", query).await
    }

    async fn awards(&self, query: &ListQuery) -> Result<Page<Award>> {
        self.call_page("awards", query).await
    }

    async fn claim_awards(&self, award_ids: &[String]) -> Result<()> {
        self.call("awards.claim", serde_json::json!({ "awardIds": award_ids }))
            .await
            .map(|_| ())
    }

    async fn products(&self, query: &ListQuery) -> Result<Page<Product>> {
        self.call_page("products", query).await
    }

    async fn files(&self, query: &ListQuery) -> Result<Page<FileObject>> {
        self.call_page("files", query).await
    }

    async fn opt_in_states(&self, query: &ListQuery) -> Result<Page<OptInStatus>> {
        self.call_page("opt-ins.states", query).await
    }

    async fn manage_opt_in(&self, request: &OptInRequest) -> Result<()> {
        self.call("opt-ins.manage", serde_json::to_value(request)?)
            .await
            .map(|_| ())
    }

    async fn leaderboard(
        &self,
        subscription: &LeaderboardSubscription,
    ) -> Result<Vec<LeaderboardEntry>> {
        let reply = self
            .call("leaderboards.subscribe", serde_json::to_value(subscription)?)
            .await?;
        if reply.data.is_null() {
            return Ok(Vec::new());
        }
        let reply: LeaderboardReply = serde_json::from_value(reply.data)?;
        Ok(reply.leaderboard_entries)
    }

    async fn member(&self) -> Result<Member> {
        self.call_data("members.me", Value::Null).await
    }

    async fn instant_wins(&self, query: &ListQuery) -> Result<Page<InstantWin>> {
        self.call_page("instant-wins", query).await
    }

    async fn play_instant_win(&self, instant_win_id: &str) -> Result<InstantWinPlay> {
        self.call_data(
            "instant-wins.play",
            serde_json::json!({ "instantWinId": instant_win_id }),
        )
        .await
    }
}

const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Opens websocket connections to the gateway URL from the configuration.
pub struct WsConnector {
    url: String,
    ping_interval: Duration,
    request_timeout: Duration,
}

impl WsConnector {
    pub fn new(config: &WidgetConfig) -> Self {
        Self {
            url: config.gateway_url.clone(),
            // `interval` panics on a zero period.
            ping_interval: config.ws_ping_interval.max(MIN_PING_INTERVAL),
            request_timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, token: &IssuedToken) -> Result<Connection> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| WidgetError::Config(format!("invalid websocket URL: {err}")))?;
        let header_value = HeaderValue::from_str(&format!("Bearer {}", token.token))
            .map_err(|err| WidgetError::Auth(format!("invalid token: {err}")))?;
        request.headers_mut().insert("Authorization", header_value);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|err| WidgetError::transport(format!("websocket connect failed: {err}")))?;
        info!(url = %self.url, "gateway channel connected");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let task = tokio::spawn(pump(
            ws_stream,
            outbound_rx,
            push_tx,
            Arc::clone(&pending),
            self.ping_interval,
        ));

        let gateway = WsGateway {
            outbound: outbound_tx,
            pending,
            next_id: AtomicU64::new(1),
            timeout: self.request_timeout,
        };

        Ok(Connection {
            gateway: Arc::new(gateway),
            pushes: push_rx,
            task: Some(task),
        })
    }
}

async fn pump<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    pushes: mpsc::UnboundedSender<PushEvent>,
    pending: Pending,
    ping_every: Duration,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut ping_interval = tokio::time::interval(ping_every);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if let Err(err) = ws_sink.send(Message::Ping(Vec::new())).await {
                    warn!(?err, "failed to send ping");
                    break;
                }
            }
            frame = outbound.recv() => {
                let frame = match frame {
                    Some(frame) => frame,
                    None => break,
                };
                if let Err(err) = ws_sink.send(frame).await {
                    warn!(?err, "failed to send request");
                    break;
                }
            }
            message = ws_stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        warn!(?err, "websocket stream error");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => handle_frame(&text, &pending, &pushes),
                    Message::Ping(payload) => {
                        if let Err(err) = ws_sink.send(Message::Pong(payload)).await {
                            warn!(?err, "failed to respond to ping");
                            break;
                        }
                    }
                    Message::Close(frame) => {
                        info!(?frame, "gateway closed the channel");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    fail_pending(&pending);
}

fn handle_frame(text: &str, pending: &Pending, pushes: &mpsc::UnboundedSender<PushEvent>) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(?err, "failed to parse gateway frame");
            return;
        }
    };

    if let Some(id) = envelope.id {
        let waiter = pending.lock().ok().and_then(|mut pending| pending.remove(&id));
        let Some(waiter) = waiter else {
            debug!(id, "reply for unknown request");
            return;
        };
        let reply = match envelope.error {
            Some(error) => Err(WidgetError::Transport(error.message)),
            None => Ok(Reply {
                data: envelope.data,
                total: envelope.meta.and_then(|meta| meta.total_records_found),
            }),
        };
        let _ = waiter.send(reply);
        return;
    }

    let _ = pushes.send(PushEvent {
        object_type: envelope.object_type,
        callback: envelope.callback,
        data: envelope.data,
    });
}

fn fail_pending(pending: &Pending) {
    let waiters: Vec<_> = match pending.lock() {
        Ok(mut pending) => pending.drain().map(|(_, waiter)| waiter).collect(),
        Err(_) => return,
    };
    for waiter in waiters {
        let _ = waiter.send(Err(WidgetError::Disconnected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_resolve_their_request_and_pushes_are_forwarded() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (push_tx, mut push_rx) = mpsc::unbounded_channel();
        let (tx, rx) = oneshot::channel();
        pending.lock().expect("lock").insert(7, tx);

        handle_frame(
            r#"{"id":7,"data":[{"id":"c-1","statusCode":25}],"meta":{"totalRecordsFound":41}}"#,
            &pending,
            &push_tx,
        );
        handle_frame(
            r#"{"objectType":"Leaderboard","data":{"id":"ct-1","leaderboardEntries":[]}}"#,
            &pending,
            &push_tx,
        );

        let reply = rx.await.expect("reply").expect("ok reply");
        assert_eq!(reply.total, Some(41));
        let push = push_rx.recv().await.expect("push");
        assert_eq!(push.object_type.as_deref(), Some("Leaderboard"));
        assert_eq!(push.str_field("id"), Some("ct-1"));
    }

    #[tokio::test]
    async fn error_replies_become_transport_errors() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (push_tx, _push_rx) = mpsc::unbounded_channel();
        let (tx, rx) = oneshot::channel();
        pending.lock().expect("lock").insert(1, tx);

        handle_frame(r#"{"id":1,"error":{"message":"boom"}}"#, &pending, &push_tx);

        let reply = rx.await.expect("reply");
        assert!(matches!(reply, Err(WidgetError::Transport(message)) if message == "boom"));
    }

    #[tokio::test]
    async fn dropped_channel_fails_waiters() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().expect("lock").insert(3, tx);
        fail_pending(&pending);
        assert!(matches!(rx.await.expect("reply"), Err(WidgetError::Disconnected)));
    }

    #[test]
    fn zero_ping_interval_is_clamped() {
        let mut config = WidgetConfig::new("key");
        config.ws_ping_interval = Duration::ZERO;
        assert_eq!(WsConnector::new(&config).ping_interval, MIN_PING_INTERVAL);
    }
}
