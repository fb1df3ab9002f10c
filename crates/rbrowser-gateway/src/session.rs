//! Browser session: working directory, canvases, tree and display connection.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use rbrowser_canvas::CanvasRegistry;
use rbrowser_core::config::Config;
use rbrowser_core::protocol::{BrowseRequest, Reply};
use rbrowser_core::types::CanvasKind;
use rbrowser_tree::{Browsable, SysFileTree, TreeOptions};

use crate::files;
use crate::macros::{MacroJob, MacroRunner};

/// All mutable state behind one display connection.
pub struct Session {
    workdir: PathBuf,
    mode: CanvasKind,
    pub canvases: CanvasRegistry,
    tree: Box<dyn Browsable>,
    macros: MacroRunner,
    conn_id: Option<String>,
}

impl Session {
    pub fn new(
        workdir: PathBuf,
        mode: CanvasKind,
        canvases: CanvasRegistry,
        tree: Box<dyn Browsable>,
        macros: MacroRunner,
    ) -> Self {
        Self {
            workdir,
            mode,
            canvases,
            tree,
            macros,
            conn_id: None,
        }
    }

    /// Build a session rooted at `workdir` with one canvas already open.
    pub fn from_config(config: &Config, workdir: PathBuf) -> Self {
        let canvas = config.canvas();
        let mode = if canvas.use_rcanvas {
            CanvasKind::NextGen
        } else {
            CanvasKind::Legacy
        };
        let tree = SysFileTree::new(workdir.clone(), TreeOptions::from(&config.browse()));

        let mut session = Self::new(
            workdir,
            mode,
            CanvasRegistry::new(canvas.width, canvas.height),
            Box::new(tree),
            MacroRunner::new(&config.macros()),
        );
        session.canvases.create(mode);
        session
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Kind of canvas `NEWCANVAS` creates.
    pub fn mode(&self) -> CanvasKind {
        self.mode
    }

    pub fn conn_id(&self) -> Option<&str> {
        self.conn_id.as_deref()
    }

    pub fn set_conn_id(&mut self, conn_id: Option<String>) {
        self.conn_id = conn_id;
    }

    pub fn tree(&self) -> &dyn Browsable {
        self.tree.as_ref()
    }

    /// Listing of every open canvas, sent on (re)connect.
    pub fn init_reply(&self) -> Reply {
        Reply::Init(self.canvases.entries())
    }

    pub fn workdir_reply(&self) -> Reply {
        Reply::WorkDir(self.workdir.to_string_lossy().into_owned())
    }

    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        files::resolve(raw, &self.workdir)
    }

    /// Move to another directory and re-root the tree there.
    ///
    /// Returns false (and keeps the current directory) if `raw` is not a directory.
    pub async fn change_dir(&mut self, raw: &str) -> bool {
        let target = self.resolve_path(raw);
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                let target = tokio::fs::canonicalize(&target).await.unwrap_or(target);
                info!(dir = %target.display(), "Changed working directory");
                self.tree.set_top_item(target.clone());
                self.workdir = target;
                true
            }
            _ => {
                warn!(dir = %target.display(), "Not a directory, keeping working directory");
                false
            }
        }
    }

    /// Forward a listing request to the tree.
    pub async fn browse(&self, request: &BrowseRequest) -> Option<Reply> {
        match self.tree.process_request(request).await {
            Ok(reply) => Some(Reply::Browse(reply)),
            Err(e) => {
                warn!(path = %request.path, %e, "Browse request failed");
                None
            }
        }
    }

    /// Create a canvas of the session's kind; it becomes active.
    pub fn new_canvas(&mut self) -> Reply {
        let canvas = self.canvases.create(self.mode);
        Reply::Canvas(canvas.entry())
    }

    /// Open a tree item: text comes back as-is, drawables go onto the active canvas.
    pub async fn double_click(&mut self, path: &str, options: &str) -> Reply {
        debug!(path, options, "Double click");

        let element = match self.tree.element(path).await {
            Ok(Some(element)) => element,
            Ok(None) => return Reply::Empty,
            Err(e) => {
                warn!(path, %e, "Cannot resolve tree item");
                return Reply::Empty;
            }
        };

        if let Some(text) = element.text_content() {
            return Reply::FileText(text.to_string());
        }

        let Some(object) = element.object_to_draw() else {
            return Reply::Empty;
        };

        match self.canvases.active_mut() {
            Some(canvas) => {
                canvas.draw(object, options);
                Reply::CanvasSelected(canvas.name().to_string())
            }
            None => {
                info!(path, "No active canvas to process double click");
                Reply::Empty
            }
        }
    }

    /// Resolve a macro against the working directory; the caller runs it.
    pub fn macro_job(&self, raw: &str) -> MacroJob {
        MacroJob::new(
            self.macros.clone(),
            self.resolve_path(raw),
            self.workdir.clone(),
        )
    }

    pub async fn save_file(&self, raw: &str, content: &str) {
        let path = self.resolve_path(raw);
        if let Err(e) = files::save_file(&path, content).await {
            warn!(path = %path.display(), %e, "Failed to save file");
        }
    }
}
