//! Canvas viewer WebSocket handler.
//!
//! `/canvas/{name}/ws` streams one canvas' state: a snapshot on connect, then
//! `drawn`, `wiped` and `closed` events.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::state::BrowserState;

/// WebSocket upgrade handler for canvas viewers.
pub async fn canvas_ws_handler(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<Arc<BrowserState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_canvas_viewer(state, name, socket))
}

async fn handle_canvas_viewer(state: Arc<BrowserState>, name: String, ws: WebSocket) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(state.config.window().max_queue_length.max(1));

    let subscribed = {
        let mut session = state.session.lock().await;
        match session.canvases.get_mut(&name) {
            Some(canvas) => {
                canvas.subscribe(tx);
                true
            }
            None => false,
        }
    };

    if !subscribed {
        debug!(canvas = %name, "Viewer asked for unknown canvas");
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "unknown canvas".into(),
            })))
            .await;
        return;
    }

    info!(canvas = %name, "Canvas viewer connected");

    // Ends when the canvas is closed and its subscribers are dropped
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    debug!(canvas = %name, "Canvas viewer disconnected");
}
