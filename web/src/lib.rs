use axum::http::{header, HeaderValue, Method};
use log::*;
use service::config::Config;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use service::AppState;

mod controller;
pub mod error;
pub mod router;

/// Binds the configured interface and serves until Ctrl-C.
///
/// On shutdown every live WebSocket is closed through the hub before the server
/// drains its remaining HTTP connections.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state.config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_addr = format!("{host}:{}", app_state.config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    let hub = app_state.hub.clone();
    let cors_layer = build_cors_layer(&app_state.config);
    let app = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            hub.shutdown().await;
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
