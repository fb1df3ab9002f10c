//! Browser wire protocol.
//!
//! The display connection carries UTF-8 text frames. Inbound frames are either
//! a bare literal (`QUIT_ROOT`, `NEWCANVAS`, `RELOAD`) or `PREFIX:payload`, the
//! payload often being JSON. Outbound frames use the same shape. Nothing is
//! versioned or acknowledged; a frame that does not parse is simply dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CanvasEntry;

pub const QUIT: &str = "QUIT_ROOT";
pub const RELOAD: &str = "RELOAD";
pub const NEW_CANVAS: &str = "NEWCANVAS";
pub const BROWSE_REQUEST: &str = "BRREQ:";
pub const DOUBLE_CLICK: &str = "DBLCLK:";
pub const RUN_MACRO: &str = "RUNMACRO:";
pub const SAVE_FILE: &str = "SAVEFILE:";
pub const SELECT_CANVAS: &str = "SELECT_CANVAS:";
pub const CLOSE_CANVAS: &str = "CLOSE_CANVAS:";
pub const GET_WORKDIR: &str = "GETWORKDIR:";
pub const CHANGE_DIR: &str = "CHDIR:";

pub const INIT_REPLY: &str = "INMSG:";
pub const BROWSE_REPLY: &str = "BREPL:";
pub const CANVAS_REPLY: &str = "CANVS:";
pub const FILE_REPLY: &str = "FREAD:";
pub const SELECT_REPLY: &str = "SLCTCANV:";

/// Default page size of a browse request.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A client command, parsed from one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Terminate the host process.
    Quit,
    /// Re-send the init listing.
    Reload,
    /// List a tree path.
    Browse(BrowseRequest),
    /// Create a canvas of the session's kind.
    NewCanvas,
    /// Open an item: read its text or draw it on the active canvas.
    DoubleClick {
        path: String,
        options: String,
        /// Plain-path requests always get a frame back, even an empty one.
        send_empty: bool,
    },
    RunMacro { path: String },
    SaveFile { path: String, content: String },
    SelectCanvas { name: String },
    CloseCanvas { name: String },
    GetWorkDir,
    ChangeDir { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unrecognized command: {0}")]
    Unknown(String),

    #[error("malformed {command} payload: {reason}")]
    Malformed {
        command: &'static str,
        reason: String,
    },
}

impl CommandError {
    fn malformed(command: &'static str, reason: impl Into<String>) -> Self {
        CommandError::Malformed {
            command,
            reason: reason.into(),
        }
    }
}

impl Command {
    /// Parse one inbound frame.
    pub fn parse(frame: &str) -> Result<Self, CommandError> {
        match frame {
            QUIT => return Ok(Command::Quit),
            RELOAD => return Ok(Command::Reload),
            NEW_CANVAS => return Ok(Command::NewCanvas),
            _ => {}
        }

        if let Some(payload) = frame.strip_prefix(BROWSE_REQUEST) {
            return parse_browse(payload);
        }
        if let Some(payload) = frame.strip_prefix(DOUBLE_CLICK) {
            return parse_double_click(payload);
        }
        if let Some(payload) = frame.strip_prefix(RUN_MACRO) {
            // Anything after a second ':' is ignored.
            let path = payload.split(':').next().unwrap_or_default();
            if path.is_empty() {
                return Err(CommandError::malformed("RUNMACRO", "empty path"));
            }
            return Ok(Command::RunMacro {
                path: path.to_string(),
            });
        }
        if let Some(payload) = frame.strip_prefix(SAVE_FILE) {
            let (path, content) = payload
                .split_once(':')
                .ok_or_else(|| CommandError::malformed("SAVEFILE", "missing ':' separator"))?;
            if path.is_empty() {
                return Err(CommandError::malformed("SAVEFILE", "empty path"));
            }
            return Ok(Command::SaveFile {
                path: path.to_string(),
                content: content.to_string(),
            });
        }
        if let Some(name) = frame.strip_prefix(SELECT_CANVAS) {
            return Ok(Command::SelectCanvas {
                name: name.to_string(),
            });
        }
        if let Some(name) = frame.strip_prefix(CLOSE_CANVAS) {
            return Ok(Command::CloseCanvas {
                name: name.to_string(),
            });
        }
        if frame.starts_with(GET_WORKDIR) {
            return Ok(Command::GetWorkDir);
        }
        if let Some(path) = frame.strip_prefix(CHANGE_DIR) {
            if path.is_empty() {
                return Err(CommandError::malformed("CHDIR", "empty path"));
            }
            return Ok(Command::ChangeDir {
                path: path.to_string(),
            });
        }

        Err(CommandError::Unknown(preview(frame)))
    }

    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::Reload => "reload",
            Command::Browse(_) => "browse",
            Command::NewCanvas => "new_canvas",
            Command::DoubleClick { .. } => "double_click",
            Command::RunMacro { .. } => "run_macro",
            Command::SaveFile { .. } => "save_file",
            Command::SelectCanvas { .. } => "select_canvas",
            Command::CloseCanvas { .. } => "close_canvas",
            Command::GetWorkDir => "get_workdir",
            Command::ChangeDir { .. } => "change_dir",
        }
    }
}

fn parse_browse(payload: &str) -> Result<Command, CommandError> {
    if payload.is_empty() {
        return Ok(Command::Browse(BrowseRequest::default()));
    }
    serde_json::from_str(payload)
        .map(Command::Browse)
        .map_err(|e| CommandError::malformed("BRREQ", e.to_string()))
}

fn parse_double_click(payload: &str) -> Result<Command, CommandError> {
    if !payload.starts_with('[') {
        return Ok(Command::DoubleClick {
            path: payload.to_string(),
            options: String::new(),
            send_empty: true,
        });
    }

    let args: Vec<String> = serde_json::from_str(payload)
        .map_err(|e| CommandError::malformed("DBLCLK", e.to_string()))?;
    let mut args = args.into_iter();
    let path = args
        .next()
        .ok_or_else(|| CommandError::malformed("DBLCLK", "empty argument list"))?;
    Ok(Command::DoubleClick {
        path,
        options: args.next().unwrap_or_default(),
        send_empty: false,
    })
}

/// First line of a frame, for logging. Frames can carry whole files.
pub fn preview(frame: &str) -> String {
    let line = frame.lines().next().unwrap_or_default();
    if line.len() > 80 {
        let mut end = 80;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &line[..end])
    } else {
        line.to_string()
    }
}

/// Listing request for one tree path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseRequest {
    pub path: String,
    pub first: usize,
    /// Page size; 0 means everything.
    pub number: usize,
    /// `name` (default), `size` or `mtime`; a leading `-` reverses.
    pub sort: String,
    /// Regex applied to child names.
    pub regex: String,
}

impl Default for BrowseRequest {
    fn default() -> Self {
        Self {
            path: "/".into(),
            first: 0,
            number: DEFAULT_PAGE_SIZE,
            sort: String::new(),
            regex: String::new(),
        }
    }
}

/// One page of children under a tree path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseReply {
    pub path: String,
    /// Children matching the request, before pagination.
    pub nchilds: usize,
    pub first: usize,
    pub nodes: Vec<BrowseNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseNode {
    pub name: String,
    pub title: String,
    pub icon: String,
    pub folder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
}

/// An outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// All open canvases, sent when a client (re)connects.
    Init(Vec<CanvasEntry>),
    Browse(BrowseReply),
    /// A freshly created canvas.
    Canvas(CanvasEntry),
    FileText(String),
    CanvasSelected(String),
    WorkDir(String),
    Empty,
}

impl Reply {
    /// Encode into the text frame sent over the display connection.
    pub fn encode(&self) -> serde_json::Result<String> {
        Ok(match self {
            Reply::Init(entries) => format!("{INIT_REPLY}{}", serde_json::to_string(entries)?),
            Reply::Browse(reply) => format!("{BROWSE_REPLY}{}", serde_json::to_string(reply)?),
            Reply::Canvas(entry) => format!("{CANVAS_REPLY}{}", serde_json::to_string(entry)?),
            Reply::FileText(text) => format!("{FILE_REPLY}{text}"),
            Reply::CanvasSelected(name) => format!("{SELECT_REPLY}{name}"),
            // Exact wire text: `GETWORKDIR: {"path": "/tmp"}`
            Reply::WorkDir(path) => format!(
                "{GET_WORKDIR} {{\"path\": {}}}",
                serde_json::to_string(path)?
            ),
            Reply::Empty => String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanvasKind;

    #[test]
    fn test_parse_literals() {
        assert_eq!(Command::parse("QUIT_ROOT").unwrap(), Command::Quit);
        assert_eq!(Command::parse("NEWCANVAS").unwrap(), Command::NewCanvas);
        assert_eq!(Command::parse("RELOAD").unwrap(), Command::Reload);
        // Literals must match exactly
        assert!(Command::parse("QUIT_ROOT_NOW").is_err());
        assert!(Command::parse("NEWCANVAS2").is_err());
    }

    #[test]
    fn test_parse_every_prefix() {
        let cases = [
            ("BRREQ:", "browse"),
            ("DBLCLK:/a.txt", "double_click"),
            ("RUNMACRO:run.sh", "run_macro"),
            ("SAVEFILE:a.txt:x", "save_file"),
            ("SELECT_CANVAS:webcanv1", "select_canvas"),
            ("CLOSE_CANVAS:webcanv1", "close_canvas"),
            ("GETWORKDIR:", "get_workdir"),
            ("CHDIR:/tmp", "change_dir"),
        ];
        for (frame, name) in cases {
            let cmd = Command::parse(frame).unwrap_or_else(|e| panic!("{frame}: {e}"));
            assert_eq!(cmd.name(), name, "frame {frame}");
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            Command::parse("HELLO:world"),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!(Command::parse(""), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn test_parse_browse_default_and_partial() {
        assert_eq!(
            Command::parse("BRREQ:").unwrap(),
            Command::Browse(BrowseRequest::default())
        );

        let Command::Browse(req) = Command::parse(r#"BRREQ:{"path":"/src","first":10}"#).unwrap()
        else {
            panic!("expected browse");
        };
        assert_eq!(req.path, "/src");
        assert_eq!(req.first, 10);
        assert_eq!(req.number, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_parse_browse_malformed_json() {
        let err = Command::parse("BRREQ:{not json").unwrap_err();
        assert!(matches!(err, CommandError::Malformed { command: "BRREQ", .. }));
    }

    #[test]
    fn test_parse_double_click_forms() {
        assert_eq!(
            Command::parse("DBLCLK:/dir/file.txt").unwrap(),
            Command::DoubleClick {
                path: "/dir/file.txt".into(),
                options: String::new(),
                send_empty: true,
            }
        );
        assert_eq!(
            Command::parse(r#"DBLCLK:["/img.png","colz"]"#).unwrap(),
            Command::DoubleClick {
                path: "/img.png".into(),
                options: "colz".into(),
                send_empty: false,
            }
        );
        assert!(Command::parse("DBLCLK:[\"/a\"").is_err());
        assert!(Command::parse("DBLCLK:[]").is_err());
    }

    #[test]
    fn test_parse_save_file_keeps_colons_in_content() {
        assert_eq!(
            Command::parse("SAVEFILE:notes.txt:a:b:c").unwrap(),
            Command::SaveFile {
                path: "notes.txt".into(),
                content: "a:b:c".into(),
            }
        );
        assert!(Command::parse("SAVEFILE:no-separator").is_err());
        assert!(Command::parse("SAVEFILE::content").is_err());
    }

    #[test]
    fn test_parse_run_macro_ignores_trailing_text() {
        assert_eq!(
            Command::parse("RUNMACRO:hist.sh:ignored").unwrap(),
            Command::RunMacro {
                path: "hist.sh".into()
            }
        );
        assert!(Command::parse("RUNMACRO:").is_err());
    }

    #[test]
    fn test_select_canvas_accepts_any_name() {
        assert_eq!(
            Command::parse("SELECT_CANVAS:").unwrap(),
            Command::SelectCanvas {
                name: String::new()
            }
        );
    }

    #[test]
    fn test_encode_replies() {
        let entry = CanvasEntry::new(CanvasKind::NextGen, "rcanv2");
        assert_eq!(
            Reply::Canvas(entry.clone()).encode().unwrap(),
            r#"CANVS:["root7","canvas/rcanv2/","rcanv2"]"#
        );
        assert_eq!(
            Reply::Init(vec![entry]).encode().unwrap(),
            r#"INMSG:[["root7","canvas/rcanv2/","rcanv2"]]"#
        );
        assert_eq!(
            Reply::FileText("line 1\nline: 2".into()).encode().unwrap(),
            "FREAD:line 1\nline: 2"
        );
        assert_eq!(
            Reply::CanvasSelected("webcanv1".into()).encode().unwrap(),
            "SLCTCANV:webcanv1"
        );
        assert_eq!(Reply::Empty.encode().unwrap(), "");
    }

    #[test]
    fn test_encode_workdir_escapes_path() {
        let frame = Reply::WorkDir(r#"/tmp/we"ird"#.into()).encode().unwrap();
        let json = frame.strip_prefix("GETWORKDIR: ").unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["path"], r#"/tmp/we"ird"#);
    }

    #[test]
    fn test_encode_workdir_spacing() {
        assert_eq!(
            Reply::WorkDir("/tmp".into()).encode().unwrap(),
            r#"GETWORKDIR: {"path": "/tmp"}"#
        );
    }

    #[test]
    fn test_preview_truncates_long_frames() {
        let frame = format!("SAVEFILE:x:{}\nsecond line", "y".repeat(200));
        let p = preview(&frame);
        assert!(p.ends_with("..."));
        assert!(!p.contains("second line"));
    }
}
