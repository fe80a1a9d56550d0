//! # Teodoro Voice - front-end collaborators
//!
//! Implementations of the core's I/O traits:
//!
//! ```text
//!   stdin lines ──► ConsoleInput ──► WakeListener ──► ConsoleTranscriber ──► Dispatcher
//!                        │
//!                        └──────────► ConsolePrompter (forms)
//!   Dispatcher ──► ConsoleSpeech / ConsoleScreen ──► stdout
//! ```
//!
//! The scripted doubles replay fixed answers for tests and demos.

pub mod console;
pub mod error;
pub mod scripted;
pub mod wake;

pub use console::{ConsoleInput, ConsolePrompter, ConsoleScreen, ConsoleSpeech, ConsoleTranscriber};
pub use error::{VoiceError, VoiceResult};
pub use scripted::{RecordingScreen, RecordingSpeech, ScriptedPrompter, ScriptedTranscriber};
pub use wake::{WakeEvent, WakeListener};
