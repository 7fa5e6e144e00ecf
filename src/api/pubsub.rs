//! Push endpoints for build events

use axum::{
    body::Bytes,
    extract::{Query, State as AxumState},
    http::{HeaderMap, StatusCode, header},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use tracing::{debug, error, warn};

use crate::SharedState;
use crate::relay::Outcome;

/// Pub/Sub push request body
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// POST /pubsub - Pub/Sub push subscription endpoint
pub async fn handle_push(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&state, &params, &headers) {
        return StatusCode::UNAUTHORIZED;
    }

    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            state.counters.received.fetch_add(1, Ordering::Relaxed);
            state.counters.rejected.fetch_add(1, Ordering::Relaxed);
            error!("Could not parse push envelope: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    debug!(
        message_id = %envelope.message.message_id,
        subscription = %envelope.subscription,
        "Received push message"
    );

    invoke(&state, &envelope.message.data).await
}

/// POST /invoke - body is the base64-encoded build event itself
pub async fn handle_invoke(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&state, &params, &headers) {
        return StatusCode::UNAUTHORIZED;
    }

    invoke(&state, &String::from_utf8_lossy(&body)).await
}

async fn invoke(state: &SharedState, data: &str) -> StatusCode {
    state.counters.received.fetch_add(1, Ordering::Relaxed);

    match state.relay.handle_payload(data).await {
        Ok(Outcome::Skipped { .. }) => {
            state.counters.skipped.fetch_add(1, Ordering::Relaxed);
            StatusCode::NO_CONTENT
        }
        // The delivery handle is dropped: the notification is sent in the background.
        Ok(Outcome::Dispatched { .. }) => {
            state.counters.dispatched.fetch_add(1, Ordering::Relaxed);
            StatusCode::OK
        }
        Err(e) => {
            state.counters.rejected.fetch_add(1, Ordering::Relaxed);
            error!("Invocation failed: {}", e);
            StatusCode::BAD_REQUEST
        }
    }
}

/// Accepts `Authorization: Bearer <token>` or `?token=<token>`.
fn authorized(
    state: &SharedState,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> bool {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| params.get("token").map(String::as_str));

    let ok = state.relay.config().accepts_push_token(presented);
    if !ok {
        warn!("Rejected push request with missing or invalid token");
    }
    ok
}
