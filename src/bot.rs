use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use futures::FutureExt;
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::ServerConfig;
use crate::platform::line::{verify_signature, WebhookPayload, SIGNATURE_HEADER};
use crate::tasks::TaskSpawner;

/// Webhook bodies from LINE are small; anything bigger is refused.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    channel_secret: String,
    agent: Arc<Agent>,
    tasks: Arc<dyn TaskSpawner>,
}

impl AppState {
    pub fn new(channel_secret: String, agent: Arc<Agent>, tasks: Arc<dyn TaskSpawner>) -> Self {
        Self {
            channel_secret,
            agent,
            tasks,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handle_health).get(handle_health))
        .route("/callback", post(handle_callback))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
}

/// Serve the webhook until `shutdown` resolves.
pub async fn run<F>(state: Arc<AppState>, server: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    info!("  POST /          health check");
    info!("  POST /callback  LINE webhook");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    Ok(())
}

async fn handle_health() -> Json<Value> {
    Json(json!({"message": "Healthy"}))
}

/// POST /callback: verify the signature, hand events off, acknowledge at once.
async fn handle_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !verify_signature(&state.channel_secret, &body, signature) {
        warn!(
            "LINE webhook signature verification failed (signature: {})",
            if signature.is_empty() {
                "missing"
            } else {
                "invalid"
            }
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid signature"})),
        );
    }

    let payload = match WebhookPayload::parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected webhook body: {:#}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid payload"})),
            );
        }
    };

    if let Some(destination) = payload.destination.as_deref() {
        debug!("Webhook delivered for bot {}", destination);
    }

    for event in payload.into_inbound_events() {
        let event_id = Uuid::new_v4();
        info!(
            "LINE message from {} (event {}): {}",
            event.user_id.as_deref().unwrap_or("unknown"),
            event_id,
            event.text
        );

        let agent = state.agent.clone();
        let span = info_span!("event", id = %event_id);
        state.tasks.spawn(
            "handle_event",
            async move { agent.handle_event(event).await }
                .instrument(span)
                .boxed(),
        );
    }

    (StatusCode::OK, Json(json!({"message": "OK"})))
}
