//! WebSocket server for the web-based object browser.
//!
//! One browser page holds the display connection (`/ws`): it sends short text
//! commands, the dispatcher applies them to the [`session::Session`], and
//! replies go back on the same connection. Each canvas is shown by its own
//! viewer socket (`/canvas/{name}/ws`), which receives canvas state as JSON.

pub mod canvas;
pub mod connection;
pub mod dispatch;
pub mod files;
pub mod macros;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod session;
pub mod state;

pub use dispatch::{Outcome, dispatch, dispatch_frame};
pub use server::{bind, router, serve, start_server};
pub use session::Session;
pub use state::{BrowserState, ShowOutcome};
