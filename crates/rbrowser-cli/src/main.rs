use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use rbrowser_core::config::{Config, LoggingConfig, ServerConfig};
use rbrowser_gateway::{BrowserState, ShowOutcome};

#[derive(Parser)]
#[command(
    name = "rbrowser",
    about = "Web-based file and canvas browser served over WebSocket",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the browser server
    Serve {
        /// Port to listen on (default: 8090)
        #[arg(long)]
        port: Option<u16>,

        /// Starting working directory
        #[arg(long)]
        dir: Option<String>,

        /// Create next-generation canvases
        #[arg(long)]
        rcanvas: bool,

        /// Open the page in a browser
        #[arg(long)]
        open: bool,
    },

    /// Show configuration and whether a server is running
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print one value by dotted path (e.g. window.conn_limit)
    Get { key: String },
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);

    let config = Config::load(&config_path)?;

    init_logging(&config.logging(), cli.verbose);

    match cli.command {
        Commands::Serve {
            port,
            dir,
            rcanvas,
            open,
        } => serve(config, port, dir, rcanvas, open).await?,
        Commands::Status => {
            println!("RBrowser v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Port: {}", config.port());
            println!("Working directory: {}", config.working_dir().display());
            println!("Status: {}", probe(&config).await);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{key} is not set"),
            },
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                filled_in(&config).save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}

async fn serve(
    mut config: Config,
    port: Option<u16>,
    dir: Option<String>,
    rcanvas: bool,
    open: bool,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        let bind = config.server.as_ref().and_then(|s| s.bind.clone());
        config.server = Some(ServerConfig { port, bind });
    }
    if let Some(dir) = dir {
        config.browse.get_or_insert_with(Default::default).working_dir = Some(dir);
    }
    if rcanvas {
        config.canvas.get_or_insert_with(Default::default).use_rcanvas = true;
    }
    if open {
        let window = config.window.get_or_insert_with(Default::default);
        if window.launch_command.is_empty() {
            window.launch_command = default_launcher();
        }
    }

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration: {}", errors.join("; "));
    }

    let port = config.port();
    let state = Arc::new(BrowserState::from_config(config));
    let workdir = state.session.lock().await.workdir().display().to_string();
    tracing::info!(%workdir, "Starting RBrowser on port {port}");

    let listener = rbrowser_gateway::bind(&state, port).await?;
    match state.show(false).await {
        ShowOutcome::Opened { url, launched: false } => println!("Open {url} in a browser"),
        ShowOutcome::Opened { .. } | ShowOutcome::Reloaded { .. } => {}
    }

    rbrowser_gateway::serve(listener, state, true).await
}

/// Ask a running server for its health summary.
async fn probe(config: &Config) -> String {
    let url = format!("http://127.0.0.1:{}/health", config.port());
    let response = reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_secs(2))
        .send()
        .await;

    match response {
        Ok(resp) => match resp.json::<serde_json::Value>().await {
            Ok(body) => format!(
                "running ({} connection(s), {} canvas(es), active: {})",
                body["connections"], body["canvases"], body["active_canvas"]
            ),
            Err(_) => "running".to_string(),
        },
        Err(_) => "not running".to_string(),
    }
}

/// The config with every section present, for `config init`.
fn filled_in(config: &Config) -> Config {
    Config {
        server: Some(ServerConfig {
            port: config.port(),
            bind: Some(config.bind()),
        }),
        window: Some(config.window()),
        canvas: Some(config.canvas()),
        browse: Some(config.browse()),
        macros: Some(config.macros()),
        logging: Some(config.logging()),
    }
}

fn default_launcher() -> Vec<String> {
    let command: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if cfg!(windows) {
        &["cmd", "/C", "start", ""]
    } else {
        &["xdg-open"]
    };
    command.iter().map(|s| s.to_string()).collect()
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let mut filter = if verbose {
        EnvFilter::new("debug")
    } else {
        let level = config.level.as_deref().unwrap_or("info");
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    for directive in &config.filters {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log filter {directive:?}: {e}"),
        }
    }

    let writer = if config.output == "stdout" {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
