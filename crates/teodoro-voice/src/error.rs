//! Error types for the voice front end

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Channel receive error: {0}")]
    ChannelReceive(String),

    /// The input source closed (stdin EOF or the script ran out).
    #[error("Input closed")]
    InputClosed,

    #[error("Invalid answer for {field}: {value}")]
    InvalidAnswer { field: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
