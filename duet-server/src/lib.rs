//! Room-scoped signaling relay for two-party calls.

mod config;
pub mod room;
pub mod signaling;

pub use config::ServerConfig;
pub use room::*;
pub use signaling::*;

use axum::Router;
use axum::routing::get;

/// The relay's HTTP surface: a single WebSocket endpoint at `/ws`.
pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service)
}
