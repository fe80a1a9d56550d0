//! Fire-and-forget alarms.
//!
//! Each alarm is its own tokio task. Nothing keeps its handle: there is no cancellation and no
//! persistence, and a running alarm never blocks the dispatch loop.

use crate::actions::media::{self, MediaCommand, PlaybackStatus};
use crate::collab::Collaborators;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_ALARM_NAME: &str = "Alarma";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSpec {
    pub delay: Duration,
    pub speech: String,
    pub display: String,
}

impl AlarmSpec {
    pub fn new(delay_secs: u64, name: &str) -> Self {
        Self {
            delay: Duration::from_secs(delay_secs),
            speech: format!(
                "Riiiiiiiiiing riiiiiiiiiing. Fin de la alarma de nombre {}",
                name
            ),
            display: format!("Fin de la alarma \n {}", name),
        }
    }
}

/// Spawns the alarm. `media_control` is false when no player table is configured, in which
/// case playback is never touched. Each player call is bounded by `io_timeout`.
pub fn schedule(
    spec: AlarmSpec,
    collab: Collaborators,
    media_control: bool,
    io_timeout: Duration,
) -> JoinHandle<()> {
    tracing::info!(
        target: "teodoro::alarm",
        delay_secs = spec.delay.as_secs(),
        "Alarm scheduled"
    );
    tokio::spawn(async move {
        tokio::time::sleep(spec.delay).await;
        fire(&spec, &collab, media_control, io_timeout).await;
    })
}

async fn fire(spec: &AlarmSpec, collab: &Collaborators, media_control: bool, io_timeout: Duration) {
    let playing = media_control
        && matches!(
            tokio::time::timeout(io_timeout, media::status(collab.media.as_ref())).await,
            Ok(PlaybackStatus::Playing)
        );
    if playing {
        player_command(collab, MediaCommand::Pause, io_timeout).await;
        collab.speech.speak(&spec.speech);
        player_command(collab, MediaCommand::Play, io_timeout).await;
    } else {
        collab.speech.speak(&spec.speech);
    }
    collab.screen.show(&spec.display);
    tracing::info!(target: "teodoro::alarm", resumed = playing, "Alarm fired");
}

async fn player_command(collab: &Collaborators, command: MediaCommand, io_timeout: Duration) {
    match tokio::time::timeout(io_timeout, collab.media.run(command)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!(target: "teodoro::alarm", command = command.key(), error = %e, "Player command failed")
        }
        Err(_) => {
            tracing::warn!(target: "teodoro::alarm", command = command.key(), "Player command timed out")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_texts() {
        let spec = AlarmSpec::new(300, "pasta");
        assert_eq!(spec.delay, Duration::from_secs(300));
        assert!(spec.speech.ends_with("de nombre pasta"));
        assert_eq!(spec.display, "Fin de la alarma \n pasta");
    }
}
