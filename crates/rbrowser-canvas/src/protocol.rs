//! Canvas events sent to viewers.

use serde::{Deserialize, Serialize};

use crate::canvas::Primitive;

/// Events sent to connected canvas viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasEvent {
    /// Full canvas state, sent on subscribe and after a forced update.
    Snapshot {
        canvas: String,
        width: u32,
        height: u32,
        primitives: Vec<Primitive>,
    },
    /// A primitive was appended.
    Drawn { index: usize, primitive: Primitive },
    /// All primitives were removed.
    Wiped,
    /// The canvas was closed; no further events follow.
    Closed,
}
