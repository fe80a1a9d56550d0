//! Host-backed collaborators: the media player's command line, the desktop browser and
//! systemd power actions.

use std::collections::HashMap;
use std::time::Duration;
use teodoro_core::actions::media::MediaCommand;
use teodoro_core::actions::system::PowerAction;
use teodoro_core::{BrowserLauncher, CoreError, CoreResult, MediaPlayer, PowerControl};

/// Runs `program args..` and returns trimmed stdout. A non-zero exit is a handler failure.
async fn run_command(handler: &str, line: &str, timeout: Duration) -> CoreResult<String> {
    let mut parts = line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| CoreError::handler(handler, "empty command line"))?;
    let call = tokio::process::Command::new(program)
        .args(parts)
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| CoreError::Timeout(timeout))??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::handler(
            handler,
            format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Media player driven by the command lines of the `SpotifyActions` table.
pub struct ShellMediaPlayer {
    actions: HashMap<String, String>,
    timeout: Duration,
}

impl ShellMediaPlayer {
    pub fn new(actions: HashMap<String, String>, timeout: Duration) -> Self {
        Self { actions, timeout }
    }
}

#[async_trait::async_trait]
impl MediaPlayer for ShellMediaPlayer {
    async fn run(&self, command: MediaCommand) -> CoreResult<String> {
        let line = self.actions.get(command.key()).ok_or_else(|| {
            CoreError::handler("media", format!("no command line for '{}'", command.key()))
        })?;
        tracing::debug!(target: "teodoro::daemon", command = command.key(), "Media command");
        run_command("media", line, self.timeout).await
    }
}

/// Opens URLs with `xdg-open` without waiting for the browser.
pub struct SystemBrowser;

#[async_trait::async_trait]
impl BrowserLauncher for SystemBrowser {
    async fn open(&self, url: &str) -> CoreResult<()> {
        tokio::process::Command::new("xdg-open")
            .arg(url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        tracing::info!(target: "teodoro::daemon", url = url, "Browser opened");
        Ok(())
    }
}

/// `systemctl poweroff|suspend|reboot`. Only applied when `TEODORO_POWER_ENABLED=1`, so a
/// stray "apaga el equipo" during development does not switch the machine off.
pub struct ShellPower {
    enabled: bool,
    timeout: Duration,
}

impl ShellPower {
    pub fn from_env(timeout: Duration) -> Self {
        let enabled = std::env::var("TEODORO_POWER_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { enabled, timeout }
    }
}

#[async_trait::async_trait]
impl PowerControl for ShellPower {
    async fn apply(&self, action: PowerAction) -> CoreResult<()> {
        let verb = action.systemctl_verb();
        if !self.enabled {
            tracing::warn!(target: "teodoro::daemon", action = verb, "Power actions disabled; skipped");
            return Ok(());
        }
        tracing::info!(target: "teodoro::daemon", action = verb, "Applying power action");
        run_command("power", &format!("systemctl {}", verb), self.timeout)
            .await
            .map(|_| ())
    }
}
