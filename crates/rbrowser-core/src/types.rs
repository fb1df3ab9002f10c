//! Shared domain types.

use serde::{Deserialize, Serialize};

/// An object that can be placed on a canvas.
///
/// Drawables are always owned by value: whoever draws one keeps its own copy,
/// independent of the tree element it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawable {
    pub name: String,
    pub mime: String,
    /// Base64-encoded payload.
    pub data: String,
}

impl Drawable {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }
}

/// The two canvas flavours a browser session can host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasKind {
    #[default]
    Legacy,
    NextGen,
}

impl CanvasKind {
    /// Tag sent to the client in canvas listings.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            CanvasKind::Legacy => "root6",
            CanvasKind::NextGen => "root7",
        }
    }

    /// Prefix for generated canvas names.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            CanvasKind::Legacy => "webcanv",
            CanvasKind::NextGen => "rcanv",
        }
    }
}

/// One `[kind, url, name]` triple as sent in `INMSG:` and `CANVS:` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEntry(pub String, pub String, pub String);

impl CanvasEntry {
    pub fn new(kind: CanvasKind, name: &str) -> Self {
        Self(kind.wire_tag().to_string(), canvas_url(name), name.to_string())
    }

    pub fn kind(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> &str {
        &self.1
    }

    pub fn name(&self) -> &str {
        &self.2
    }
}

/// Relative URL the client uses to open a canvas viewer.
pub fn canvas_url(name: &str) -> String {
    format!("canvas/{name}/")
}
