//! Fake platform bridge
//!
//! Serves the bridge's JSON API from in-memory state so the real
//! `HttpPlatformClient` can be exercised end to end. Each test gets its own
//! bridge on a random port.

use super::constants::*;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teledeck_updater::platform::{ChannelInfo, DialogFolder, Message, MessageMedia};
use tokio::net::TcpListener;

type Params = HashMap<String, String>;

#[derive(Default)]
struct BridgeState {
    channels: BTreeMap<i64, ChannelInfo>,
    /// Dialog order as the session reports it.
    dialogs: Vec<i64>,
    folders: Vec<DialogFolder>,
    messages: BTreeMap<i64, Vec<Message>>,
    unread: HashMap<i64, u64>,
    /// File ids for which the bridge answers 204.
    empty_payloads: HashSet<String>,
    /// Remaining media requests answered with a flood wait.
    flood_waits: u32,
    reads: Vec<(i64, i64)>,
    media_requests: Vec<Params>,
    message_queries: Vec<(i64, Params)>,
    link_requests: Vec<(i64, i64)>,
}

type Shared = Arc<Mutex<BridgeState>>;

/// Handle to a running fake bridge.
///
/// When dropped, the server shuts down.
pub struct FakeBridge {
    /// Base URL for the platform client (e.g. "http://127.0.0.1:12345")
    pub base_url: String,

    state: Shared,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeBridge {
    /// Binds to 127.0.0.1:0, serves the bridge routes in a background task
    /// and waits until they answer.
    pub async fn spawn() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/dialogs", get(dialogs))
            .route("/folders", get(folders))
            .route("/channels/{id}", get(channel))
            .route("/channels/{id}/messages", get(messages))
            .route("/channels/{id}/unread", get(unread))
            .route("/channels/{id}/messages/{message_id}/link", get(link))
            .route("/channels/{id}/read", post(read))
            .route("/media", get(media))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Bridge failed");
        });

        let bridge = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        };
        bridge.wait_for_ready().await;
        bridge
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(BRIDGE_READY_TIMEOUT_MS);
        loop {
            if start.elapsed() > timeout {
                panic!("Bridge did not become ready within {}ms", BRIDGE_READY_TIMEOUT_MS);
            }
            match client.get(format!("{}/dialogs", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(BRIDGE_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Adds a channel and opens a dialog for it.
    pub fn add_channel(&self, id: i64, title: &str) -> ChannelInfo {
        let channel = ChannelInfo::new(id, title);
        let mut state = self.state.lock().unwrap();
        state.channels.insert(id, channel.clone());
        state.dialogs.push(id);
        state.messages.entry(id).or_default();
        channel
    }

    /// Adds a message to the history of its channel.
    pub fn add_message(&self, message: Message) {
        let mut state = self.state.lock().unwrap();
        state
            .messages
            .entry(message.channel_id)
            .or_default()
            .push(message);
    }

    pub fn set_unread(&self, channel_id: i64, count: u64) {
        self.state.lock().unwrap().unread.insert(channel_id, count);
    }

    pub fn add_folder(&self, title: &str, peers: Vec<i64>) {
        self.state.lock().unwrap().folders.push(DialogFolder {
            title: title.to_string(),
            peers,
        });
    }

    /// The next `count` media requests answer 429.
    pub fn flood_next_downloads(&self, count: u32) {
        self.state.lock().unwrap().flood_waits = count;
    }

    /// Downloads of `file_id` produce no content.
    pub fn empty_payload(&self, file_id: &str) {
        self.state
            .lock()
            .unwrap()
            .empty_payloads
            .insert(file_id.to_string());
    }

    /// (channel id, max id) pairs acknowledged through the read endpoint.
    pub fn reads(&self) -> Vec<(i64, i64)> {
        let mut reads = self.state.lock().unwrap().reads.clone();
        reads.sort();
        reads
    }

    pub fn media_requests(&self) -> usize {
        self.state.lock().unwrap().media_requests.len()
    }

    pub fn message_queries(&self) -> Vec<(i64, Params)> {
        self.state.lock().unwrap().message_queries.clone()
    }

    pub fn link_requests(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().link_requests.clone()
    }
}

impl Drop for FakeBridge {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, what.to_string()).into_response()
}

fn param<T: std::str::FromStr>(params: &Params, key: &str) -> Option<T> {
    params.get(key).and_then(|v| v.parse().ok())
}

fn declared_size(message: &Message) -> Option<u64> {
    match message.media.as_ref()? {
        MessageMedia::Document(doc) => Some(doc.size),
        MessageMedia::Photo(photo) => Some(photo.size),
        MessageMedia::WebPage(page) => page.document.as_ref().map(|doc| doc.size),
        MessageMedia::Unsupported { .. } => None,
    }
}

fn is_video(message: &Message) -> bool {
    let mime = match message.media.as_ref() {
        Some(MessageMedia::Document(doc)) => doc.mime_type.as_deref(),
        Some(MessageMedia::WebPage(page)) => {
            page.document.as_ref().and_then(|doc| doc.mime_type.as_deref())
        }
        _ => None,
    };
    mime.is_some_and(|m| m.starts_with("video/"))
}

async fn dialogs(State(state): State<Shared>) -> Json<Vec<ChannelInfo>> {
    let state = state.lock().unwrap();
    Json(
        state
            .dialogs
            .iter()
            .filter_map(|id| state.channels.get(id).cloned())
            .collect(),
    )
}

async fn folders(State(state): State<Shared>) -> Json<Vec<DialogFolder>> {
    Json(state.lock().unwrap().folders.clone())
}

async fn channel(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    match state.lock().unwrap().channels.get(&id) {
        Some(channel) => Json(channel.clone()).into_response(),
        None => not_found("no such channel"),
    }
}

async fn messages(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Query(params): Query<Params>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.message_queries.push((id, params.clone()));
    let Some(history) = state.messages.get(&id) else {
        return not_found("no such channel");
    };

    let limit: usize = param(&params, "limit").unwrap_or(100);
    let min_id: Option<i64> = param(&params, "min_id");
    let offset_id: Option<i64> = param(&params, "offset_id");
    let cursor: Option<i64> = param(&params, "cursor");
    let filter = params.get("filter").map(String::as_str);

    let mut selected: Vec<Message> = history
        .iter()
        .filter(|m| min_id.map_or(true, |min| m.id > min))
        .filter(|m| offset_id.map_or(true, |offset| m.id < offset))
        .filter(|m| match filter {
            Some("url") => m.has_url,
            Some("video") => is_video(m),
            _ => true,
        })
        .filter(|m| cursor.map_or(true, |after| m.id < after))
        .cloned()
        .collect();
    selected.sort_by_key(|m| std::cmp::Reverse(m.id));

    let more = selected.len() > limit;
    selected.truncate(limit);
    let next_cursor = if more {
        selected.last().map(|m| m.id.to_string())
    } else {
        None
    };
    Json(json!({ "messages": selected, "next_cursor": next_cursor })).into_response()
}

async fn unread(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = state.lock().unwrap();
    if !state.channels.contains_key(&id) {
        return not_found("no such channel");
    }
    let count = state.unread.get(&id).copied().unwrap_or(0);
    Json(json!({ "unread_count": count })).into_response()
}

async fn link(
    State(state): State<Shared>,
    Path((id, message_id)): Path<(i64, i64)>,
) -> Json<serde_json::Value> {
    state.lock().unwrap().link_requests.push((id, message_id));
    Json(json!({ "link": format!("https://t.me/c/{}/{}", id, message_id) }))
}

#[derive(Deserialize)]
struct ReadBody {
    max_id: i64,
}

async fn read(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<ReadBody>,
) -> Json<serde_json::Value> {
    state.lock().unwrap().reads.push((id, body.max_id));
    Json(json!({}))
}

async fn media(State(state): State<Shared>, Query(params): Query<Params>) -> Response {
    let mut state = state.lock().unwrap();
    state.media_requests.push(params.clone());

    if state.flood_waits > 0 {
        state.flood_waits -= 1;
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "0")],
            "slow down",
        )
            .into_response();
    }

    let (Some(channel_id), Some(message_id), Some(file_id)) = (
        param::<i64>(&params, "channel_id"),
        param::<i64>(&params, "message_id"),
        params.get("file_id"),
    ) else {
        return (StatusCode::BAD_REQUEST, "missing locator").into_response();
    };
    if state.empty_payloads.contains(file_id) {
        return StatusCode::NO_CONTENT.into_response();
    }

    let size = state
        .messages
        .get(&channel_id)
        .and_then(|history| history.iter().find(|m| m.id == message_id))
        .and_then(declared_size);
    match size {
        Some(size) => vec![0u8; size as usize].into_response(),
        None => not_found("no such media"),
    }
}
