//! HTTP surface hosting the relay
//!
//! Every request to a push endpoint is one invocation of the pipeline.

pub mod pubsub;
pub mod status;

use axum::{Router, routing};

use crate::SharedState;

// Re-export handlers
pub use pubsub::{handle_invoke, handle_push};
pub use status::{root, status};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route("/pubsub", routing::post(handle_push))
        .route("/invoke", routing::post(handle_invoke))
        .with_state(state)
}
