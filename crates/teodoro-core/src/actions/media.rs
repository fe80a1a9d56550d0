//! Media player control.

use crate::collab::MediaPlayer;
use crate::error::CoreResult;
use crate::lexicon::Intent;
use crate::outcome::Reply;

pub const MEDIA_ERROR_DISPLAY: &str = "Ha habido algún \nproblema con Spotify";

/// Commands addressable through the `SpotifyActions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCommand {
    Status,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Title,
    Album,
    Artist,
}

impl MediaCommand {
    /// Key of the command in the `SpotifyActions` table.
    pub fn key(self) -> &'static str {
        match self {
            MediaCommand::Status => "status",
            MediaCommand::Play => "play",
            MediaCommand::Pause => "pause",
            MediaCommand::Stop => "stop",
            MediaCommand::Next => "next",
            MediaCommand::Previous => "previous",
            MediaCommand::Title => "title",
            MediaCommand::Album => "album",
            MediaCommand::Artist => "artist",
        }
    }

    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Play => Some(MediaCommand::Play),
            Intent::Next => Some(MediaCommand::Next),
            Intent::Previous => Some(MediaCommand::Previous),
            Intent::Pause => Some(MediaCommand::Pause),
            Intent::Stop => Some(MediaCommand::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    Unknown,
}

impl PlaybackStatus {
    pub fn parse(output: &str) -> Self {
        match output.trim() {
            "Playing" => PlaybackStatus::Playing,
            "Paused" => PlaybackStatus::Paused,
            "Stopped" => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Unknown,
        }
    }
}

/// Runs a transport command. "previous" is sent twice: once restarts the current track.
pub async fn control(player: &dyn MediaPlayer, command: MediaCommand) -> CoreResult<()> {
    player.run(command).await?;
    if command == MediaCommand::Previous {
        player.run(command).await?;
    }
    tracing::debug!(target: "teodoro::media", command = command.key(), "Media command sent");
    Ok(())
}

/// Point-in-time playback status. Any failure reads as `Unknown`.
pub async fn status(player: &dyn MediaPlayer) -> PlaybackStatus {
    match player.run(MediaCommand::Status).await {
        Ok(out) => PlaybackStatus::parse(&out),
        Err(e) => {
            tracing::debug!(target: "teodoro::media", error = %e, "Status read failed");
            PlaybackStatus::Unknown
        }
    }
}

pub async fn song_info(player: &dyn MediaPlayer) -> CoreResult<Reply> {
    let title = player.run(MediaCommand::Title).await?;
    let album = player.run(MediaCommand::Album).await?;
    let artist = player.run(MediaCommand::Artist).await?;
    let (title, album, artist) = (title.trim(), album.trim(), artist.trim());
    Ok(Reply::new(
        format!("Es {}, del album {}, de {}", title, album, artist),
        format!("Canción: {}\nAlbum: {}\nArtista: {}", title, album, artist),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::PlaceholderMedia;

    #[tokio::test]
    async fn previous_is_sent_twice() {
        let player = PlaceholderMedia::new();
        control(&player, MediaCommand::Previous).await.unwrap();
        control(&player, MediaCommand::Next).await.unwrap();
        assert_eq!(
            player.commands(),
            vec![MediaCommand::Previous, MediaCommand::Previous, MediaCommand::Next]
        );
    }

    #[tokio::test]
    async fn song_info_formats_metadata() {
        let player = PlaceholderMedia::new().with_metadata("Lucía", "Hijo de la luna", "Serrat");
        let reply = song_info(&player).await.unwrap();
        assert_eq!(
            reply.speech.as_deref(),
            Some("Es Lucía, del album Hijo de la luna, de Serrat")
        );
    }

    #[tokio::test]
    async fn failed_status_reads_unknown() {
        let player = PlaceholderMedia::new().failing();
        assert_eq!(status(&player).await, PlaybackStatus::Unknown);
        assert!(control(&player, MediaCommand::Play).await.is_err());
    }
}
