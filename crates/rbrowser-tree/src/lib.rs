//! Browsable tree: the hierarchical view over files the client walks.
//!
//! The gateway only talks to the [`Browsable`] trait: list a path, resolve a
//! path to an [`Element`], and re-root the tree. [`SysFileTree`] is the
//! filesystem-backed implementation used by the server.

pub mod sys_file;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use rbrowser_core::protocol::{BrowseReply, BrowseRequest};
use rbrowser_core::types::Drawable;

pub use sys_file::{SysFileTree, TreeOptions};

/// Something found at a tree path.
///
/// An element may expose text, a drawable object, both, or neither (folders).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: Option<String>,
    pub drawable: Option<Drawable>,
}

impl Element {
    pub fn has_text_content(&self) -> bool {
        self.text.is_some()
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// A copy of the drawable object, owned by the caller.
    pub fn object_to_draw(&self) -> Option<Drawable> {
        self.drawable.clone()
    }
}

#[async_trait]
pub trait Browsable: Send + Sync {
    /// List one page of children of `request.path`.
    async fn process_request(&self, request: &BrowseRequest) -> anyhow::Result<BrowseReply>;

    /// Resolve a tree path. `Ok(None)` when nothing lives there.
    async fn element(&self, path: &str) -> anyhow::Result<Option<Element>>;

    /// Re-root the tree, e.g. after a directory change.
    fn set_top_item(&mut self, root: PathBuf);

    fn top_item(&self) -> &Path;
}
