//! Live search over a WebSocket.
//!
//! Each connection owns a [`SearchEngine`] and a [`SessionContext`]. The
//! client sends keystrokes and session changes as JSON commands; the server
//! pushes every new view and session summary as JSON events.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures::stream::SplitSink;
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, Instant};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::auth::{Session, TokenVerifier, Viewer};
use crate::features::catalog::EntityKind;
use crate::features::search::dispatcher::SearchDispatcher;
use crate::features::search::engine::{SearchEngine, SearchHandle, SearchView};
use crate::features::session::{RoleGate, SessionContext, SessionSummary};

#[derive(Clone)]
pub struct LiveSearchState {
    pub dispatcher: Arc<SearchDispatcher>,
    pub gate: Arc<RoleGate>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Client to server frame
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveCommand {
    Query { text: String },
    Clear,
    Dismiss,
    Select { kind: EntityKind, id: Uuid },
    SignIn { token: String },
    SignOut,
}

/// Server to client frame
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveEvent {
    Search { view: SearchView },
    Session { summary: SessionSummary },
    /// A selected result; the client should navigate to `path`
    Navigate { path: String },
    Error { message: String },
}

/// Open a live search connection
///
/// A bearer token on the upgrade request signs the connection in; `signIn`
/// and `signOut` commands change the session afterwards.
#[utoipa::path(
    get,
    path = "/api/search/live",
    responses(
        (status = 101, description = "Switching to WebSocket; frames are LiveCommand in, LiveEvent out")
    ),
    security(
        (),
        ("bearer_auth" = [])
    ),
    tag = "search"
)]
pub async fn live_search(
    State(state): State<LiveSearchState>,
    viewer: Viewer,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, viewer.session))
}

async fn run_connection(socket: WebSocket, state: LiveSearchState, session: Option<Session>) {
    let engine = SearchEngine::spawn(state.dispatcher.clone());
    let context = SessionContext::init(state.gate.clone(), session).await;
    let (mut sender, mut receiver) = futures::StreamExt::split(socket);

    // both streams yield their current value first, then every change
    let sessions = WatchStream::new(context.subscribe()).map(|s| LiveEvent::Session {
        summary: s.summary(),
    });
    let views = WatchStream::new(engine.subscribe()).map(|view| LiveEvent::Search { view });
    let mut events = sessions.merge(views);
    let mut expiry = session_deadline(&context);
    info!("Live search connection opened");

    loop {
        tokio::select! {
            message = receiver.next() => {
                let command = match message {
                    Some(Ok(Message::Text(text))) => serde_json::from_str::<LiveCommand>(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Live search socket error: {}", e);
                        break;
                    }
                };
                let reply = match command {
                    Ok(command) => {
                        let reply = handle_command(&state, &engine, &context, command).await;
                        expiry = session_deadline(&context);
                        reply
                    }
                    Err(e) => {
                        debug!("Malformed live search command: {}", e);
                        Some(LiveEvent::Error {
                            message: format!("Invalid command: {}", e),
                        })
                    }
                };
                if let Some(event) = reply {
                    if !emit(&mut sender, &event).await {
                        break;
                    }
                }
            }
            Some(event) = events.next() => {
                if !emit(&mut sender, &event).await {
                    break;
                }
            }
            _ = sleep_until(expiry.unwrap_or_else(Instant::now)), if expiry.is_some() => {
                info!("Live search session expired; signing out");
                context.sign_out();
                expiry = None;
            }
        }
    }

    engine.shutdown().await;
    context.teardown();
    info!("Live search connection closed");
}

/// Apply one client command; returns the direct reply, if any
async fn handle_command(
    state: &LiveSearchState,
    engine: &SearchHandle,
    context: &SessionContext,
    command: LiveCommand,
) -> Option<LiveEvent> {
    match command {
        LiveCommand::Query { text } => engine.query(text),
        LiveCommand::Clear => engine.clear(),
        LiveCommand::Dismiss => engine.dismiss(),
        LiveCommand::Select { kind, id } => {
            return Some(match engine.select(kind, id).await {
                Some(path) => LiveEvent::Navigate { path },
                None => LiveEvent::Error {
                    message: format!("No displayed {} with id {}", kind, id),
                },
            });
        }
        LiveCommand::SignIn { token } => match state.verifier.verify(&token).await {
            Ok(session) if !session.is_expired() => {
                let role = context.sign_in(session).await;
                debug!("Live search connection signed in as {}", role);
            }
            Ok(session) => {
                debug!("Rejected expired live sign-in of {}", session.subject);
                return Some(rejected_sign_in());
            }
            Err(e) => {
                warn!("Live search sign-in rejected: {}", e);
                return Some(rejected_sign_in());
            }
        },
        LiveCommand::SignOut => context.sign_out(),
    }
    None
}

fn rejected_sign_in() -> LiveEvent {
    LiveEvent::Error {
        message: "Invalid or expired token".to_string(),
    }
}

/// When the connection's current session stops being valid
fn session_deadline(context: &SessionContext) -> Option<Instant> {
    context.current().session.map(|session| {
        let remaining = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Instant::now() + remaining
    })
}

/// Returns whether the socket is still writable
async fn emit(sender: &mut SplitSink<WebSocket, Message>, event: &LiveEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize live search event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use crate::core::config::SearchConfig;
    use crate::features::auth::Session;
    use crate::features::search::dispatcher::SearchDispatcher;
    use crate::features::search::routes::routes;
    use crate::features::session::RoleGate;
    use crate::modules::backend::{Collection, DataBackend, InMemoryBackend, Record};
    use crate::shared::test_helpers::{test_session, StaticTokenVerifier};
    use axum_test::{TestServer, TestWebSocket};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000101";

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn server() -> TestServer {
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        backend
            .insert(
                Collection::Products,
                record(json!({
                    "id": PRODUCT_ID,
                    "name": "Cheville nylon 8mm",
                    "code": "CN-8",
                    "description": null,
                    "image_url": null,
                    "subcategory_id": "00000000-0000-0000-0000-0000000000a1",
                    "created_at": "2025-01-01T00:00:00Z",
                })),
            )
            .await
            .unwrap();
        backend
            .insert(
                Collection::Profiles,
                record(json!({"id": "admin-1", "role": "admin", "created_at": "2025-01-01T00:00:00Z"})),
            )
            .await
            .unwrap();

        let config = SearchConfig {
            debounce: Duration::from_millis(20),
            ..SearchConfig::default()
        };
        let dispatcher = Arc::new(SearchDispatcher::new(backend.clone(), config));
        let gate = Arc::new(RoleGate::new(backend));
        let lapsed = Session {
            expires_at: Utc::now() - chrono::Duration::minutes(5),
            ..test_session("admin-1")
        };
        let brief = Session {
            expires_at: Utc::now() + chrono::Duration::milliseconds(400),
            ..test_session("admin-1")
        };
        let verifier = StaticTokenVerifier::default()
            .with_token("admin-token", "admin-1")
            .with_session("lapsed-token", lapsed)
            .with_session("brief-token", brief);

        TestServer::builder()
            .http_transport()
            .build(routes(dispatcher, gate, Arc::new(verifier)))
            .unwrap()
    }

    async fn next_of(socket: &mut TestWebSocket, kind: &str) -> Value {
        loop {
            let event: Value = socket.receive_json().await;
            if event["type"] == kind {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_live_search_and_select() {
        let server = server().await;
        let mut socket = server
            .get_websocket("/api/search/live")
            .await
            .into_websocket()
            .await;

        // the current session and view open the stream, in either order
        let mut greeting = Vec::new();
        for _ in 0..2 {
            let event: Value = socket.receive_json().await;
            greeting.push(event);
        }
        let session = greeting.iter().find(|e| e["type"] == "session").unwrap();
        assert_eq!(session["summary"]["role"], "client");
        let initial = greeting.iter().find(|e| e["type"] == "search").unwrap();
        assert_eq!(initial["view"]["state"]["status"], "notSearched");

        socket.send_json(&json!({"type": "query", "text": "chev"})).await;
        let results = loop {
            let event = next_of(&mut socket, "search").await;
            if event["view"]["state"]["status"] == "results" {
                break event;
            }
        };
        assert_eq!(results["view"]["query"], "chev");
        assert_eq!(results["view"]["open"], true);
        assert_eq!(
            results["view"]["state"]["sections"][0]["rows"][0]["code"],
            "CN-8"
        );

        socket
            .send_json(&json!({"type": "select", "kind": "product", "id": PRODUCT_ID}))
            .await;
        let navigate = next_of(&mut socket, "navigate").await;
        assert_eq!(navigate["path"], format!("/product/{}", PRODUCT_ID));

        socket.close().await;
    }

    #[tokio::test]
    async fn test_sign_in_and_out_over_socket() {
        let server = server().await;
        let mut socket = server
            .get_websocket("/api/search/live")
            .await
            .into_websocket()
            .await;
        next_of(&mut socket, "search").await;

        socket
            .send_json(&json!({"type": "signIn", "token": "nope"}))
            .await;
        let error = next_of(&mut socket, "error").await;
        assert_eq!(error["message"], "Invalid or expired token");

        socket
            .send_json(&json!({"type": "signIn", "token": "admin-token"}))
            .await;
        let admin = loop {
            let event = next_of(&mut socket, "session").await;
            if event["summary"]["role"] == "admin" {
                break event;
            }
        };
        assert_eq!(admin["summary"]["subject"], "admin-1");
        assert_eq!(admin["summary"]["capabilities"]["mutateCatalog"], true);

        socket.send_json(&json!({"type": "signOut"})).await;
        let signed_out = next_of(&mut socket, "session").await;
        assert_eq!(signed_out["summary"]["authenticated"], false);
        assert_eq!(signed_out["summary"]["role"], "client");

        socket.close().await;
    }

    #[tokio::test]
    async fn test_malformed_command_reports_error() {
        let server = server().await;
        let mut socket = server
            .get_websocket("/api/search/live")
            .await
            .into_websocket()
            .await;

        socket.send_json(&json!({"type": "teleport"})).await;
        let error = next_of(&mut socket, "error").await;
        assert!(error["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid command"));

        socket.close().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let server = server().await;
        let mut socket = server
            .get_websocket("/api/search/live")
            .await
            .into_websocket()
            .await;
        next_of(&mut socket, "search").await;

        socket
            .send_json(&json!({"type": "signIn", "token": "lapsed-token"}))
            .await;
        let error = next_of(&mut socket, "error").await;
        assert_eq!(error["message"], "Invalid or expired token");

        socket.close().await;
    }

    #[tokio::test]
    async fn test_connection_signs_out_when_session_lapses() {
        let server = server().await;
        let mut socket = server
            .get_websocket("/api/search/live")
            .await
            .into_websocket()
            .await;
        next_of(&mut socket, "search").await;

        socket
            .send_json(&json!({"type": "signIn", "token": "brief-token"}))
            .await;
        loop {
            let event = next_of(&mut socket, "session").await;
            if event["summary"]["role"] == "admin" {
                break;
            }
        }

        let lapsed = next_of(&mut socket, "session").await;
        assert_eq!(lapsed["summary"]["authenticated"], false);
        assert_eq!(lapsed["summary"]["role"], "client");

        socket.close().await;
    }
}
