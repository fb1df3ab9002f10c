//! Macro execution for `RUNMACRO`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use rbrowser_core::config::MacroConfig;
use rbrowser_core::error::{BrowserError, Result};

/// Runs macro files through the configured interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroRunner {
    interpreter: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MacroOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MacroOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl Default for MacroRunner {
    fn default() -> Self {
        Self::new(&MacroConfig::default())
    }
}

impl MacroRunner {
    pub fn new(config: &MacroConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Execute `script` with `workdir` as the current directory and wait for it.
    pub async fn run(&self, script: &Path, workdir: &Path) -> Result<MacroOutput> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| BrowserError::Macro("no interpreter configured".into()))?;

        info!(script = %script.display(), interpreter = %program, "Running macro");

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .args(args)
                .arg(script)
                .current_dir(workdir)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let out = MacroOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!(exit_code = out.exit_code, "Macro finished");
                Ok(out)
            }
            Ok(Err(e)) => Err(BrowserError::Macro(format!(
                "failed to start {program}: {e}"
            ))),
            Err(_) => Err(BrowserError::Macro(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// A macro ready to run, detached from the session that resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroJob {
    pub script: PathBuf,
    pub workdir: PathBuf,
    runner: MacroRunner,
}

impl MacroJob {
    pub fn new(runner: MacroRunner, script: PathBuf, workdir: PathBuf) -> Self {
        Self {
            script,
            workdir,
            runner,
        }
    }

    /// Run to completion. Output and failures are only logged.
    pub async fn run(self) {
        let script = self.script.display();
        match self.runner.run(&self.script, &self.workdir).await {
            Ok(out) if out.success() => {
                info!(%script, stdout = %out.stdout.trim_end(), "Macro completed");
            }
            Ok(out) => {
                warn!(
                    %script,
                    exit_code = out.exit_code,
                    stderr = %out.stderr.trim_end(),
                    "Macro failed"
                );
            }
            Err(e) => warn!(%script, %e, "Macro did not run"),
        }
    }
}
