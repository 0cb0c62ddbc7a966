use crate::error::{Result, VersyncError};
use crate::output::Console;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound for the package manager to regenerate its lock file.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// LockRefreshAgent regenerates `pixi.lock` after the manifest version changed.
#[derive(Debug, Clone)]
pub struct LockRefreshAgent {
    project_path: PathBuf,
    program: String,
    args: Vec<String>,
    manifest: String,
    lock_file: String,
    timeout: Duration,
}

impl LockRefreshAgent {
    pub fn pixi<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            program: "pixi".to_string(),
            args: vec!["lock".to_string()],
            manifest: "pixi.toml".to_string(),
            lock_file: "pixi.lock".to_string(),
            timeout: LOCK_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_command(mut self, program: &str, args: &[&str]) -> Self {
        self.program = program.to_string();
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only projects with the package manager's manifest are refreshed.
    pub fn applies(&self) -> bool {
        self.project_path.join(&self.manifest).is_file()
    }

    /// Lock file the command rewrites; backed up along with the version files.
    pub fn lock_file(&self) -> PathBuf {
        self.project_path.join(&self.lock_file)
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command, failing on spawn error, non-zero exit or timeout.
    pub fn run(&self, console: &Console) -> Result<()> {
        console.line(format!("$ {}", self.command_line()));

        let mut stderr_log = tempfile::tempfile().map_err(|e| {
            VersyncError::ExternalTool(format!("Failed to capture output of '{}': {e}", self.program))
        })?;
        let stderr_handle = stderr_log.try_clone()?;

        let mut child = Command::new(&self.program)
            .current_dir(&self.project_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_handle))
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => VersyncError::ExternalTool(format!(
                    "'{}' not found; install it or drop --update-lock",
                    self.program
                )),
                _ => VersyncError::ExternalTool(format!(
                    "Failed to spawn '{}': {e}",
                    self.command_line()
                )),
            })?;

        let spinner = ProgressBar::new_spinner();
        if console.is_machine() {
            spinner.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Running {}", self.command_line()));
        spinner.enable_steady_tick(POLL_INTERVAL);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    spinner.finish_and_clear();
                    return Err(VersyncError::ExternalTool(format!(
                        "'{}' timed out after {}s",
                        self.command_line(),
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(VersyncError::ExternalTool(format!(
                        "Failed to wait for '{}': {e}",
                        self.command_line()
                    )));
                }
            }
        };
        spinner.finish_and_clear();
        debug!(command = %self.command_line(), ?status, elapsed = ?started.elapsed(), "lock refresh finished");

        if !status.success() {
            let mut stderr = String::new();
            stderr_log.seek(SeekFrom::Start(0))?;
            let _ = stderr_log.read_to_string(&mut stderr);
            return Err(VersyncError::ExternalTool(format!(
                "'{}' failed with exit code {}: {}",
                self.command_line(),
                status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(())
    }
}
