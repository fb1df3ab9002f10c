//! Browser page and canvas viewer, embedded static assets served by the gateway.
//!
//! Uses `rust-embed` to bake the `ui/` directory into the binary.

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rust_embed::Embed;
use tracing::debug;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// Build an axum `Router` that serves the embedded UI.
///
/// Register this **after** `/ws` and `/health` so those routes take priority
/// over the catch-all.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/canvas/{name}/", get(canvas_page_handler))
        .route("/{*path}", get(static_handler))
}

async fn index_handler() -> impl IntoResponse {
    serve_file("index.html")
}

/// Every canvas shares one viewer page; it reads its name from the URL.
async fn canvas_page_handler(Path(name): Path<String>) -> impl IntoResponse {
    debug!(canvas = %name, "Serving canvas page");
    serve_file("canvas.html")
}

async fn static_handler(Path(path): Path<String>) -> impl IntoResponse {
    try_serve_file(&path).unwrap_or_else(not_found)
}

fn try_serve_file(path: &str) -> Option<Response> {
    let asset = UiAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.as_ref())],
            asset.data.into_owned(),
        )
            .into_response(),
    )
}

fn serve_file(path: &str) -> Response {
    try_serve_file(path).unwrap_or_else(not_found)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response()
}
