// src/server.rs

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        ConnectInfo, Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::core::dispatcher::Dispatcher;
use crate::core::emitter::SessionHandle;
use crate::core::models::{InboundFrame, JobRequest};
use crate::limiter::{RateDecision, RateLimiter};

#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Outbound queue depth for each new session.
    pub session_buffer: usize,
    pub max_message_bytes: usize,
    pub limiter: Arc<RateLimiter>,
}

/// Builds the application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// `/ws` rate limit is keyed by the peer address.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn enforce_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match state.limiter.check(peer.ip()) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Rejected { retry_after } => {
            warn!(%peer, ?retry_after, "Rate limit exceeded.");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.as_secs().max(1).to_string())],
                "Too many requests",
            )
                .into_response()
        }
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serves one client session until the socket closes.
///
/// Jobs started here hold clones of the session handle. Once the writer task is
/// gone their sends become no-ops and any running tool is abandoned.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (session, mut rx) = SessionHandle::channel(state.session_buffer);
    let session_id = session.id();
    info!(session = %session_id, "Session opened.");

    // --- Writer ---
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(session = %session_id, error = %e, "Failed to encode update.");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // --- Reader ---
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(request) = parse_frame(text.as_str()) {
                    info!(session = %session_id, kind = %request.kind, "Job requested.");
                    // Detached: the job reports through the session, not the handle.
                    drop(state.dispatcher.dispatch(request, session.clone()));
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(session = %session_id, error = %e, "WebSocket error.");
                break;
            }
            _ => {}
        }
    }

    writer.abort();
    info!(session = %session_id, "Session closed.");
}

/// Turns an inbound text frame into a job request.
///
/// Malformed JSON and unknown event names are logged and yield `None`.
pub fn parse_frame(text: &str) -> Option<JobRequest> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed frame.");
            return None;
        }
    };
    let request = JobRequest::from_frame(&frame);
    if request.is_none() {
        debug!(event = %frame.event, "Ignoring unknown event.");
    }
    request
}
