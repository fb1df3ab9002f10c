//! Axum-based WebSocket server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::canvas::canvas_ws_handler;
use crate::connection::handle_display_connection;
use crate::state::BrowserState;

/// Build the application router.
///
/// When `ui_enabled` is true, the embedded browser page is served at `/`.
pub fn router(state: Arc<BrowserState>, ui_enabled: bool) -> Router {
    // Socket and health routes take priority over the UI catch-all
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/canvas/{name}/ws", get(canvas_ws_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics_handler));

    let mut app = app.with_state(state);

    if ui_enabled {
        app = app.merge(rbrowser_web::ui_router());
    }

    app.layer(TraceLayer::new_for_http())
}

/// Bind the configured address, with `port` overriding the config.
pub async fn bind(state: &BrowserState, port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("{}:{port}", state.config.bind());
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    Ok(listener)
}

/// Serve on an already bound listener until Ctrl-C or `QUIT_ROOT`.
pub async fn serve(
    listener: TcpListener,
    state: Arc<BrowserState>,
    ui_enabled: bool,
) -> anyhow::Result<()> {
    #[cfg(feature = "metrics")]
    crate::metrics::install_prometheus_recorder()?;

    let shutdown = state.shutdown.clone();
    let app = router(state, ui_enabled);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Start the server on `port`.
pub async fn start_server(
    state: Arc<BrowserState>,
    port: u16,
    ui_enabled: bool,
) -> anyhow::Result<()> {
    let listener = bind(&state, port).await?;
    serve(listener, state, ui_enabled).await
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BrowserState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_display_connection(state, socket))
}

async fn health_handler(State(state): State<Arc<BrowserState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    let connections = state.connection_count().await;
    let session = state.session.lock().await;

    axum::Json(json!({
        "status": "ok",
        "version": version,
        "connections": connections,
        "canvases": session.canvases.len(),
        "active_canvas": session.canvases.active_name(),
    }))
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    crate::metrics::render()
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(%e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = token.cancelled() => info!("Quit requested"),
    }

    // Wake connection loops still waiting on their sockets
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rbrowser_core::config::Config;
    use tower::ServiceExt;

    use crate::session::Session;

    fn test_state(dir: &std::path::Path) -> Arc<BrowserState> {
        let config = Config::default();
        let session = Session::from_config(&config, dir.to_path_buf());
        Arc::new(BrowserState::new(Arc::new(config), session))
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), false);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 0);
        assert_eq!(json["canvases"], 1);
        assert_eq!(json["active_canvas"], "webcanv1");
    }

    #[tokio::test]
    async fn test_ui_disabled_has_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), false);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ui_index_served() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), true);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
