//! teodoro-core: command dispatch for a Spanish voice assistant.
//!
//! A transcript is matched against the stored lexicon, checked against the session's
//! capabilities, has its arguments extracted (prompting when the utterance lacks them) and is
//! executed through collaborator traits. Speech, screen, prompts and every external service
//! live behind those traits so the daemon and the tests can supply their own.

pub mod actions;
pub mod assistant;
pub mod bootstrap;
pub mod collab;
pub mod config;
pub mod dispatcher;
mod error;
pub mod extract;
pub mod lexicon;
pub mod matcher;
pub mod outcome;
pub mod placeholder;
pub mod session;
pub mod store;

pub use assistant::Assistant;
pub use collab::{
    BrowserLauncher, CalendarEvent, CalendarService, Collaborators, EventStart, LoginForm,
    MediaPlayer, NewEvent, PhoneRelay, PowerControl, PromptKind, PromptReply, PromptRequest,
    Prompter, Screen, SearchService, SpeechOutput, Transcriber, WeatherService,
};
pub use config::AssistantConfig;
pub use dispatcher::{DispatchState, Dispatcher};
pub use error::{CoreError, CoreResult};
pub use lexicon::{Intent, Lexicon};
pub use outcome::{DispatchOutcome, DispatchStatus, ErrorCode, Reply};
pub use session::{Authorization, SessionContext, UserRecord};
pub use store::{DocumentStore, KnowledgeStore};
