use crate::controller::{health_check_controller, websocket_controller};
use crate::AppState;
use axum::{routing::get, Router};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(websocket_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

// Authentication happens on the socket itself through the first frame, so these
// routes carry no auth middleware.
fn websocket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_controller::user_socket))
        .route(
            "/groups/chat/ws",
            get(websocket_controller::group_chat_socket),
        )
        .with_state(app_state)
}
