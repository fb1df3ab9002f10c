//! Command dispatch for the display connection.

use tracing::{debug, info};

use rbrowser_core::protocol::{Command, CommandError, Reply, preview};

use crate::macros::MacroJob;
use crate::session::Session;

/// What the connection should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to send back.
    Silent,
    /// Send this frame to the client.
    Reply(Reply),
    /// Run this macro once the session is released. Nothing is sent back.
    RunMacro(MacroJob),
    /// Shut the whole server down.
    Quit,
}

/// Parse and run one inbound frame. Unknown or malformed frames are dropped.
pub async fn dispatch_frame(session: &mut Session, frame: &str) -> Outcome {
    debug!(frame = %preview(frame), "Received frame");

    match Command::parse(frame) {
        Ok(command) => dispatch(session, command).await,
        Err(CommandError::Unknown(_)) => {
            debug!("Ignoring unrecognized frame");
            Outcome::Silent
        }
        Err(e) => {
            debug!(%e, "Dropping malformed frame");
            Outcome::Silent
        }
    }
}

/// Run a parsed command against the session.
pub async fn dispatch(session: &mut Session, command: Command) -> Outcome {
    debug!(command = command.name(), "Dispatching command");

    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();
    #[cfg(feature = "metrics")]
    let name = command.name();

    let outcome = dispatch_inner(session, command).await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_command(name, start.elapsed().as_secs_f64());

    outcome
}

async fn dispatch_inner(session: &mut Session, command: Command) -> Outcome {
    match command {
        Command::Quit => {
            info!("Quit requested by client");
            Outcome::Quit
        }
        Command::Reload => Outcome::Reply(session.init_reply()),
        Command::Browse(request) => session
            .browse(&request)
            .await
            .map_or(Outcome::Silent, Outcome::Reply),
        Command::NewCanvas => Outcome::Reply(session.new_canvas()),
        Command::DoubleClick {
            path,
            options,
            send_empty,
        } => match session.double_click(&path, &options).await {
            Reply::Empty if !send_empty => Outcome::Silent,
            reply => Outcome::Reply(reply),
        },
        Command::RunMacro { path } => Outcome::RunMacro(session.macro_job(&path)),
        Command::SaveFile { path, content } => {
            session.save_file(&path, &content).await;
            Outcome::Silent
        }
        Command::SelectCanvas { name } => {
            session.canvases.select(name);
            Outcome::Silent
        }
        Command::CloseCanvas { name } => {
            session.canvases.close(&name);
            Outcome::Silent
        }
        Command::GetWorkDir => Outcome::Reply(session.workdir_reply()),
        Command::ChangeDir { path } => {
            session.change_dir(&path).await;
            Outcome::Reply(session.workdir_reply())
        }
    }
}
