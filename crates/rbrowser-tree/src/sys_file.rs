//! Filesystem-backed browsable tree.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Local};
use regex::Regex;
use tracing::{debug, warn};

use rbrowser_core::config::BrowseConfig;
use rbrowser_core::protocol::{BrowseNode, BrowseReply, BrowseRequest};
use rbrowser_core::types::Drawable;

use crate::{Browsable, Element};

/// What the tree shows and how much it will read.
#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub show_hidden: bool,
    pub max_text_bytes: u64,
    pub text_extensions: Vec<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self::from(&BrowseConfig::default())
    }
}

impl From<&BrowseConfig> for TreeOptions {
    fn from(config: &BrowseConfig) -> Self {
        Self {
            show_hidden: config.show_hidden,
            max_text_bytes: config.max_text_bytes,
            text_extensions: config
                .text_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}

/// A tree whose items are the files and folders below a root directory.
///
/// Tree paths are `/`-separated and relative to the root. `..` never
/// resolves, so nothing above the root is reachable through the tree.
pub struct SysFileTree {
    root: PathBuf,
    options: TreeOptions,
}

struct Child {
    name: String,
    folder: bool,
    size: u64,
    modified: Option<SystemTime>,
}

impl SysFileTree {
    pub fn new(root: impl Into<PathBuf>, options: TreeOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut full = self.root.clone();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                name => full.push(name),
            }
        }
        Some(full)
    }

    fn is_text(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.options.text_extensions.contains(&e))
    }

    fn image_mime(path: &Path) -> Option<String> {
        let mime = mime_guess::from_path(path).first()?;
        (mime.type_() == mime_guess::mime::IMAGE).then(|| mime.essence_str().to_string())
    }

    fn icon(&self, path: &Path, folder: bool) -> &'static str {
        if folder {
            "folder"
        } else if self.is_text(path) {
            "text"
        } else if Self::image_mime(path).is_some() {
            "image"
        } else {
            "file"
        }
    }

    async fn collect_children(&self, dir: &Path) -> std::io::Result<Vec<Child>> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut children = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.options.show_hidden && name.starts_with('.') {
                continue;
            }
            // Follow symlinks; a dangling link still shows up as a plain file.
            let (folder, size, modified) = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => (meta.is_dir(), meta.len(), meta.modified().ok()),
                Err(_) => (false, 0, None),
            };
            children.push(Child {
                name,
                folder,
                size,
                modified,
            });
        }
        Ok(children)
    }
}

fn sort_children(children: &mut [Child], sort: &str) {
    let (key, reverse) = match sort.strip_prefix('-') {
        Some(key) => (key, true),
        None => (sort, false),
    };

    children.sort_by(|a, b| {
        // Folders always come first, regardless of direction
        let folders = b.folder.cmp(&a.folder);
        if folders != Ordering::Equal {
            return folders;
        }
        let order = match key {
            "size" => a.size.cmp(&b.size),
            "mtime" => a.modified.cmp(&b.modified),
            _ => Ordering::Equal,
        }
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name));
        if reverse { order.reverse() } else { order }
    });
}

fn format_mtime(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn child_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[async_trait]
impl Browsable for SysFileTree {
    async fn process_request(&self, request: &BrowseRequest) -> anyhow::Result<BrowseReply> {
        let mut reply = BrowseReply {
            path: request.path.clone(),
            first: request.first,
            ..Default::default()
        };

        let Some(dir) = self.resolve(&request.path) else {
            debug!(path = %request.path, "Browse path outside tree");
            return Ok(reply);
        };

        let mut children = match self.collect_children(&dir).await {
            Ok(children) => children,
            Err(e) => {
                debug!(path = %dir.display(), %e, "Cannot list directory");
                return Ok(reply);
            }
        };

        if !request.regex.is_empty() {
            match Regex::new(&request.regex) {
                Ok(re) => children.retain(|c| re.is_match(&c.name)),
                Err(e) => warn!(regex = %request.regex, %e, "Ignoring invalid browse filter"),
            }
        }

        sort_children(&mut children, &request.sort);
        reply.nchilds = children.len();

        let number = if request.number == 0 {
            usize::MAX
        } else {
            request.number
        };

        reply.nodes = children
            .into_iter()
            .skip(request.first)
            .take(number)
            .map(|c| {
                let full = dir.join(&c.name);
                BrowseNode {
                    title: child_path(&request.path, &c.name),
                    icon: self.icon(&full, c.folder).to_string(),
                    folder: c.folder,
                    size: (!c.folder).then_some(c.size),
                    mtime: c.modified.map(format_mtime),
                    name: c.name,
                }
            })
            .collect();

        Ok(reply)
    }

    async fn element(&self, path: &str) -> anyhow::Result<Option<Element>> {
        let Some(full) = self.resolve(path) else {
            return Ok(None);
        };

        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        let mut element = Element {
            name,
            text: None,
            drawable: None,
        };

        if meta.is_dir() {
            return Ok(Some(element));
        }

        if self.is_text(&full) {
            if meta.len() > self.options.max_text_bytes {
                debug!(path = %full.display(), size = meta.len(), "File too large to show as text");
            } else {
                let bytes = tokio::fs::read(&full).await?;
                match String::from_utf8(bytes) {
                    Ok(text) => element.text = Some(text),
                    Err(_) => debug!(path = %full.display(), "File is not valid UTF-8"),
                }
            }
        } else if let Some(mime) = Self::image_mime(&full) {
            let bytes = tokio::fs::read(&full).await?;
            let data = base64::engine::general_purpose::STANDARD.encode(bytes);
            element.drawable = Some(Drawable::new(element.name.clone(), mime, data));
        }

        Ok(Some(element))
    }

    fn set_top_item(&mut self, root: PathBuf) {
        debug!(root = %root.display(), "Re-rooting browse tree");
        self.root = root;
    }

    fn top_item(&self) -> &Path {
        &self.root
    }
}
