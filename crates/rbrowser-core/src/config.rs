//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level rbrowser configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse: Option<BrowseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<MacroConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    8090
}

/// The browser window: display connection limits and how to open it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum number of simultaneous display connections (default: 1).
    #[serde(default = "default_conn_limit")]
    pub conn_limit: usize,

    /// Outbound frames buffered per connection before new ones are dropped.
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,

    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,

    /// Program (plus arguments) used to open the page; the URL is appended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launch_command: Vec<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            conn_limit: default_conn_limit(),
            max_queue_length: default_max_queue_length(),
            width: default_window_width(),
            height: default_window_height(),
            launch_command: Vec::new(),
        }
    }
}

fn default_conn_limit() -> usize {
    1
}

fn default_max_queue_length() -> usize {
    30
}

fn default_window_width() -> u32 {
    1200
}

fn default_window_height() -> u32 {
    700
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Create next-generation canvases instead of legacy ones.
    #[serde(default)]
    pub use_rcanvas: bool,

    #[serde(default = "default_canvas_width")]
    pub width: u32,

    #[serde(default = "default_canvas_height")]
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            use_rcanvas: false,
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

fn default_canvas_width() -> u32 {
    800
}

fn default_canvas_height() -> u32 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Initial working directory (default: the process working directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub show_hidden: bool,

    /// Files larger than this are never returned as text.
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: u64,

    /// Extensions (without the dot, case-insensitive) treated as text.
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            show_hidden: false,
            max_text_bytes: default_max_text_bytes(),
            text_extensions: default_text_extensions(),
        }
    }
}

fn default_max_text_bytes() -> u64 {
    1_048_576
}

fn default_text_extensions() -> Vec<String> {
    [
        "txt", "md", "log", "csv", "json", "xml", "yaml", "yml", "toml", "c", "cc", "cpp", "cxx",
        "h", "hh", "hpp", "hxx", "py", "rs", "sh", "js", "css", "html",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// How `RUNMACRO` executes a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroConfig {
    /// Interpreter program and leading arguments; the macro path is appended.
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,

    #[serde(default = "default_macro_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_ms: default_macro_timeout_ms(),
        }
    }
}

fn default_interpreter() -> Vec<String> {
    vec!["sh".into()]
}

fn default_macro_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "rbrowser_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::BrowserError::Io)?;

        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::BrowserError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or_else(default_port)
    }

    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn window(&self) -> WindowConfig {
        self.window.clone().unwrap_or_default()
    }

    pub fn canvas(&self) -> CanvasConfig {
        self.canvas.clone().unwrap_or_default()
    }

    pub fn browse(&self) -> BrowseConfig {
        self.browse.clone().unwrap_or_default()
    }

    pub fn macros(&self) -> MacroConfig {
        self.macros.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Starting working directory: configured value, else the process cwd.
    pub fn working_dir(&self) -> PathBuf {
        self.browse
            .as_ref()
            .and_then(|b| b.working_dir.as_ref())
            .map(|w| PathBuf::from(shellexpand::tilde(w).as_ref()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get a config value by dotted path (e.g. "server.port", "window.conn_limit").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("Server port cannot be 0".to_string());
            }
        }

        let window = self.window();
        if window.conn_limit == 0 {
            errors.push("window.conn_limit must be at least 1".to_string());
        }
        if window.max_queue_length == 0 {
            errors.push("window.max_queue_length must be at least 1".to_string());
        }

        if self.macros().interpreter.is_empty() {
            errors.push("macros.interpreter cannot be empty".to_string());
        }

        if let Some(dir) = self.browse.as_ref().and_then(|b| b.working_dir.as_ref()) {
            let expanded = PathBuf::from(shellexpand::tilde(dir).as_ref());
            if !expanded.is_dir() {
                warnings.push(format!("Working directory not found: {}", expanded.display()));
            }
        }

        if self.bind() != "127.0.0.1" && self.bind() != "localhost" {
            warnings.push(format!(
                "Server bound to {}: anyone who can reach it may read and write local files",
                self.bind()
            ));
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for rbrowser data: `~/.rbrowser/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rbrowser")
}
