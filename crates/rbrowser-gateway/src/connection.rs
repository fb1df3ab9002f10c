//! Display connection lifecycle: limit check, init listing, read/write loops.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::{Outcome, dispatch_frame};
use crate::state::{BrowserState, Outbound, queue_reply};

/// Handle a new display WebSocket connection.
pub async fn handle_display_connection(state: Arc<BrowserState>, ws: WebSocket) {
    let conn_id = Uuid::new_v4().to_string();
    let window = state.config.window();

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(window.max_queue_length.max(1));

    if !state.try_register(&conn_id, tx.clone()).await {
        warn!(conn_id = %conn_id, limit = window.conn_limit, "Refusing display connection");
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "connection limit reached".into(),
            })))
            .await;
        return;
    }

    info!(conn_id = %conn_id, "Display connection opened");
    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_connect();

    {
        let mut session = state.session.lock().await;
        session.set_conn_id(Some(conn_id.clone()));
        queue_reply(&tx, &conn_id, &session.init_reply());
    }

    let send_task = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            _ = state.shutdown.cancelled() => break,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                let outcome = {
                    let mut session = state.session.lock().await;
                    dispatch_frame(&mut session, text.as_str()).await
                };
                match outcome {
                    Outcome::Silent => {}
                    Outcome::Reply(reply) => {
                        queue_reply(&tx, &conn_id, &reply);
                    }
                    // The session lock is already released here
                    Outcome::RunMacro(job) => {
                        tokio::select! {
                            _ = job.run() => {}
                            _ = state.shutdown.cancelled() => break,
                        }
                    }
                    Outcome::Quit => {
                        state.request_quit();
                        break;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(conn_id = %conn_id, "Client closed connection");
                break;
            }
            Some(Err(e)) => {
                error!(conn_id = %conn_id, %e, "WebSocket error");
                break;
            }
            Some(Ok(_)) => {}
        }
    }

    send_task.abort();
    state.unregister(&conn_id).await;
    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_disconnect();
    info!(conn_id = %conn_id, "Display connection closed");
}
