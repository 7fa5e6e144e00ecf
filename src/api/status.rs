//! Liveness and status endpoints

use axum::{Json, extract::State as AxumState};
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub enrich_commits: bool,
    pub mapped_triggers: usize,
    pub invocations: InvocationStats,
}

#[derive(Debug, Serialize)]
pub struct InvocationStats {
    pub received: u64,
    pub skipped: u64,
    pub dispatched: u64,
    pub rejected: u64,
}

pub async fn root() -> &'static str {
    "build_notifier is running"
}

/// GET /status - server info and invocation counters since start
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    let config = state.relay.config();
    let counters = &state.counters;

    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
        enrich_commits: config.enrich_commits,
        mapped_triggers: config.trigger_name_to_url_mapping.len(),
        invocations: InvocationStats {
            received: counters.received.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
        },
    })
}
