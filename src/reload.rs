//! Making dnsmasq pick up changes in the managed directory.
//!
//! dnsmasq only reads its `conf-dir` at startup, so every applied change-set ends with one run
//! of the configured [`Config::reload_command`][`crate::config::Config::reload_command`],
//! by default `sudo systemctl restart firerouter_dns`.

use crate::error::Error;
use std::sync::Arc;
use tokio::process::Command;

/// `DynReloader` is a type alias for a shareable [`Reloader`].
pub type DynReloader = Arc<dyn Reloader + Send + Sync>;

/// An async trait describing the action that makes the resolver reload its configuration.
#[async_trait::async_trait]
pub trait Reloader {
    /// Run the reload action once. Failures aren't retried.
    async fn reload(&self) -> Result<(), Error>;
}

/// Runs a shell command to reload the resolver.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    command: String,
    dry_run: bool,
}

impl CommandReloader {
    pub fn new(command: impl Into<String>, dry_run: bool) -> Self {
        Self {
            command: command.into(),
            dry_run,
        }
    }

    fn failed(&self, detail: impl Into<String>) -> Error {
        Error::ReloadFailed {
            command: self.command.clone(),
            detail: detail.into(),
        }
    }
}

#[async_trait::async_trait]
impl Reloader for CommandReloader {
    async fn reload(&self) -> Result<(), Error> {
        tracing::info!(command = %self.command, "reloading DNS service");

        if self.dry_run {
            tracing::info!(dry_run = true, command = %self.command, "would reload DNS service");
            return Ok(());
        }

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| self.failed(format!("could not run: {err}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim(), "reload stdout");
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim(), "reload stderr");
        }

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}"));
            tracing::error!(
                command = %self.command,
                %status,
                stderr = %stderr.trim(),
                "reload failed"
            );
            let detail = if stderr.trim().is_empty() {
                status
            } else {
                format!("{status}: {}", stderr.trim())
            };
            return Err(self.failed(detail));
        }

        tracing::info!("reloaded DNS service");
        Ok(())
    }
}
