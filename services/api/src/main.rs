mod config;

use crate::config::Config;
use anyhow::Context;
use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use experience_core::config::{DEFAULT_SIGNED_URL_TTL_SECS, SessionConfig};
use experience_core::forwarder::OutboundForwarder;
use experience_core::resolver::VideoResolver;
use experience_core::session::{self, SessionHandle};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Shared by every connection; each socket still gets its own session.
#[derive(Clone)]
struct AppState {
    config: Arc<experience_service::config::Config>,
    resolver: Arc<VideoResolver>,
    forwarder: OutboundForwarder,
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    conversation_id: Option<String>,
    demo_id: Option<String>,
}

/// Frames the host UI sends about its own widgets, as opposed to relayed
/// conversation messages.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "host", rename_all = "snake_case")]
enum HostControl {
    CtaClicked,
    ClearSubtitles,
}

/// Handles WebSocket upgrade requests.
///
/// The session settings are validated before upgrading so a bad request is
/// answered with a plain 400.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SessionParams>,
    State(state): State<AppState>,
) -> Response {
    let session_config = match experience_service::session_config(
        &state.config,
        params.conversation_id.as_deref(),
        params.demo_id.as_deref(),
    ) {
        Ok(session_config) => session_config,
        Err(e) => {
            tracing::warn!("Rejected WebSocket request: {e:#}");
            return (StatusCode::BAD_REQUEST, format!("{e:#}")).into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, session_config, state))
}

/// Runs one session for the lifetime of the socket.
///
/// Text frames from the host are relayed into the session; every command the
/// session produces goes back as a JSON text frame.
async fn handle_socket(socket: WebSocket, session_config: SessionConfig, state: AppState) {
    let conversation_id = session_config.conversation_id().to_string();
    info!(conversation_id, "WebSocket connection established");

    let (handle, mut commands) =
        session::spawn(session_config, state.resolver.clone(), state.forwarder.clone());
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let text = match serde_json::to_string(&command) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to serialize command: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                // Client disconnected.
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if relay(&handle, text.as_str()).await.is_err() {
                    info!(conversation_id, "Session ended");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                // Client disconnected.
                info!("WebSocket error: {}", e);
                break;
            }
        }
    }

    // Already gone if the conversation shut itself down.
    let _ = handle.leave().await;
    let _ = writer.await;
    info!(conversation_id, "WebSocket connection closed");
}

/// Errors only when the session has ended.
async fn relay(handle: &SessionHandle, text: &str) -> anyhow::Result<()> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring frame that is not JSON: {}", e);
            return Ok(());
        }
    };

    match HostControl::deserialize(&value) {
        Ok(HostControl::CtaClicked) => handle.cta_clicked().await,
        Ok(HostControl::ClearSubtitles) => handle.clear_subtitles().await,
        Err(_) => handle.ingest(value).await,
    }
}

async fn health() -> &'static str {
    "ok"
}

fn app(state: AppState) -> Router {
    // Configure a permissive CORS policy to allow connections from any origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.service.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Initialize Collaborators ---
    let resolver = experience_service::build_resolver(&config.service, DEFAULT_SIGNED_URL_TTL_SECS)
        .context("Failed to set up the video resolver")?;
    let state = AppState {
        forwarder: experience_service::build_forwarder(&config.service),
        resolver: Arc::new(resolver),
        config: Arc::new(config.service),
    };

    // --- 4. Serve ---
    info!("Starting WebSocket relay, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use experience_core::resolver::InMemoryCatalog;
    use experience_core::types::VideoAsset;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite;

    async fn serve() -> SocketAddr {
        let catalog = InMemoryCatalog::new().with_asset(
            "demo-1",
            VideoAsset::new("v1", "Pricing Overview", "https://cdn.example.com/v1.mp4"),
        );
        let state = AppState {
            config: Arc::new(experience_service::config::Config::from_lookup(|_| None).unwrap()),
            resolver: Arc::new(VideoResolver::new(Arc::new(catalog), 3600)),
            forwarder: OutboundForwarder::disabled(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app(state)).await.unwrap() });
        addr
    }

    #[tokio::test]
    async fn health_check() {
        let addr = serve().await;
        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn missing_demo_id_is_rejected() {
        let addr = serve().await;
        let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?conversation_id=c-1"))
            .await
            .unwrap_err();
        match err {
            tungstenite::Error::Http(response) => {
                assert_eq!(response.status().as_u16(), 400)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn relays_tool_calls_and_returns_commands() {
        let addr = serve().await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!(
            "ws://{addr}/ws?conversation_id=c-1&demo_id=demo-1"
        ))
        .await
        .unwrap();

        let tool_call = json!({
            "event_type": "conversation.toolcall",
            "name": "fetch_video",
            "arguments": { "title": "pricing overview" },
        });
        ws.send(tungstenite::Message::Text(tool_call.to_string()))
            .await
            .unwrap();

        let command = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(Ok(message)) = ws.next().await {
                if let tungstenite::Message::Text(text) = message {
                    return serde_json::from_str::<Value>(&text).unwrap();
                }
            }
            panic!("socket closed before any command arrived");
        })
        .await
        .unwrap();

        assert_eq!(command["command"], "play_video");
        assert_eq!(command["asset"]["id"], "v1");
    }

    #[tokio::test]
    async fn shutdown_closes_the_socket() {
        let addr = serve().await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!(
            "ws://{addr}/ws?conversation_id=c-1&demo_id=demo-1"
        ))
        .await
        .unwrap();

        ws.send(tungstenite::Message::Text(
            json!({"event_type": "system.shutdown"}).to_string(),
        ))
        .await
        .unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    None | Some(Err(_)) | Some(Ok(tungstenite::Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }

    #[test]
    fn host_control_frames() {
        assert_eq!(
            HostControl::deserialize(&json!({"host": "cta_clicked"})).unwrap(),
            HostControl::CtaClicked
        );
        assert!(HostControl::deserialize(&json!({"event_type": "system.shutdown"})).is_err());
    }
}
