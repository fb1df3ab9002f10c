//! Server shared state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rbrowser_core::config::Config;
use rbrowser_core::protocol::Reply;

use crate::session::Session;

/// Shared state accessible from all connections and handlers.
pub struct BrowserState {
    pub config: Arc<Config>,
    pub session: Mutex<Session>,
    pub connections: RwLock<HashMap<String, ConnectionState>>,
    /// Cancelled on `QUIT_ROOT` or Ctrl-C.
    pub shutdown: CancellationToken,
}

/// Per-connection state.
pub struct ConnectionState {
    pub conn_id: String,
    pub tx: mpsc::Sender<Outbound>,
}

/// Work item for a connection's send task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Close,
}

/// Result of [`BrowserState::show`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    /// A new window was requested at `url`; `launched` tells whether a program was started.
    Opened { url: String, launched: bool },
    /// Existing connections were sent the canvas listing again.
    Reloaded { connections: usize },
}

impl BrowserState {
    pub fn new(config: Arc<Config>, session: Session) -> Self {
        Self {
            config,
            session: Mutex::new(session),
            connections: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the state with a fresh session rooted at the configured working directory.
    pub fn from_config(config: Config) -> Self {
        let session = Session::from_config(&config, config.working_dir());
        Self::new(Arc::new(config), session)
    }

    /// Address a browser should open to reach the display page.
    pub fn page_url(&self) -> String {
        let bind = self.config.bind();
        let host = match bind.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{host}:{}/", self.config.port())
    }

    /// Register a display connection unless the connection limit is reached.
    pub async fn try_register(&self, conn_id: &str, tx: mpsc::Sender<Outbound>) -> bool {
        let limit = self.config.window().conn_limit;
        let mut connections = self.connections.write().await;
        if connections.len() >= limit {
            return false;
        }
        connections.insert(
            conn_id.to_string(),
            ConnectionState {
                conn_id: conn_id.to_string(),
                tx,
            },
        );
        true
    }

    pub async fn unregister(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);

        let mut session = self.session.lock().await;
        if session.conn_id() == Some(conn_id) {
            session.set_conn_id(None);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue a reply for one connection.
    pub async fn send_reply(&self, conn_id: &str, reply: &Reply) -> bool {
        let connections = self.connections.read().await;
        match connections.get(conn_id) {
            Some(conn) => queue_reply(&conn.tx, conn_id, reply),
            None => false,
        }
    }

    /// Open a browser window, or refresh the ones already connected.
    pub async fn show(&self, force_new: bool) -> ShowOutcome {
        let count = self.connection_count().await;

        if count == 0 || force_new {
            let url = self.page_url();
            info!(%url, "Browser page available at {url}");
            let launched = self.launch(&url);
            return ShowOutcome::Opened { url, launched };
        }

        let reply = self.session.lock().await.init_reply();
        let connections = self.connections.read().await;
        for conn in connections.values() {
            queue_reply(&conn.tx, &conn.conn_id, &reply);
        }
        debug!(connections = connections.len(), "Re-sent canvas listing");
        ShowOutcome::Reloaded {
            connections: connections.len(),
        }
    }

    /// Close every display connection.
    pub async fn hide(&self) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if conn.tx.try_send(Outbound::Close).is_err() {
                debug!(conn_id = %conn.conn_id, "Connection already going away");
            }
        }
        info!(connections = connections.len(), "Closing display connections");
    }

    /// Ask the server to shut down.
    pub fn request_quit(&self) {
        self.shutdown.cancel();
    }

    fn launch(&self, url: &str) -> bool {
        let command = self.config.window().launch_command;
        let Some((program, args)) = command.split_first() else {
            return false;
        };

        match tokio::process::Command::new(program)
            .args(args)
            .arg(url)
            .spawn()
        {
            Ok(_) => {
                info!(program = %program, "Launched browser");
                true
            }
            Err(e) => {
                warn!(program = %program, %e, "Failed to launch browser");
                false
            }
        }
    }
}

/// Encode `reply` and queue it, dropping it if the connection is backed up.
pub fn queue_reply(tx: &mpsc::Sender<Outbound>, conn_id: &str, reply: &Reply) -> bool {
    let frame = match reply.encode() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(conn_id, %e, "Failed to encode reply");
            return false;
        }
    };

    match tx.try_send(Outbound::Frame(frame)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn_id, "Outbound queue full, dropping frame");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn_id, "Connection closed, dropping frame");
            false
        }
    }
}
