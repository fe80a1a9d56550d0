//! Collaborator interfaces.
//!
//! Speech, screen and prompt I/O are synchronous: they sit on the single control thread and
//! block it, the same way the user would. Everything that reaches the network, a process or
//! the OS is async and bounded by the dispatcher's timeout.

use crate::actions::media::MediaCommand;
use crate::actions::system::PowerAction;
use crate::error::CoreResult;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;

/// Source of already wake-filtered command transcripts.
pub trait Transcriber: Send + Sync {
    /// Next command addressed to the assistant, or `None` when nothing usable was heard.
    fn listen_for_command(&self) -> Option<String>;

    /// A single follow-up utterance (repeat request, yes/no answers).
    fn listen_for_repeat(&self) -> Option<String>;
}

pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str);

    fn current_voice(&self) -> String;

    fn set_voice(&self, voice: &str);

    /// Voice used for asides ("Secret", "Nothing").
    fn whisper_voice(&self) -> String {
        "spanish+whisper".to_string()
    }

    fn default_voice(&self) -> String {
        "spanish+m3".to_string()
    }
}

/// Text surface for the display half of every outcome.
pub trait Screen: Send + Sync {
    fn show(&self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Text,
    /// Text whose value must not be echoed or logged.
    Secret,
    Date,
    Hour,
    Duration,
    Login,
    EventDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub kind: PromptKind,
    pub label: String,
    pub default: Option<String>,
}

impl PromptRequest {
    pub fn new(kind: PromptKind, label: &str, default: Option<&str>) -> Self {
        Self {
            kind,
            label: label.to_string(),
            default: default.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub name: String,
    pub password: String,
    /// User asked to enable phone integration for this session.
    pub phone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    Text(String),
    Date(NaiveDate),
    Hour(String),
    Duration { amount: u64, unit_seconds: u64 },
    Login(LoginForm),
    EventDetails { description: String, location: String },
    Cancelled,
}

/// Interactive form collaborator. The result is the return value, nothing else.
pub trait Prompter: Send + Sync {
    fn prompt(&self, request: PromptRequest) -> PromptReply;
}

#[async_trait::async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Runs one player command and returns its textual output.
    async fn run(&self, command: MediaCommand) -> CoreResult<String>;
}

#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, url: &str) -> CoreResult<()>;
}

#[async_trait::async_trait]
pub trait WeatherService: Send + Sync {
    /// Raw "<description><signed temperature>°C" report for `place`.
    async fn current(&self, place: &str) -> CoreResult<String>;
}

#[async_trait::async_trait]
pub trait SearchService: Send + Sync {
    /// Body of a results page, used to pick the first video of a search.
    async fn fetch(&self, url: &str) -> CoreResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    At(NaiveDateTime),
    AllDay(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: EventStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub start: NaiveDateTime,
    pub description: String,
    pub location: String,
}

#[async_trait::async_trait]
pub trait CalendarService: Send + Sync {
    /// Events of `calendar_id` starting in `[from, to)`.
    async fn events(
        &self,
        calendar_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> CoreResult<Vec<CalendarEvent>>;

    async fn create_event(&self, calendar_id: &str, event: NewEvent) -> CoreResult<()>;
}

#[async_trait::async_trait]
pub trait PhoneRelay: Send + Sync {
    /// Delivers the unlock key that triggers the "find my phone" macro.
    async fn send_key(&self, key: &str) -> CoreResult<()>;

    async fn play_emergency_audio(&self) -> CoreResult<()>;
}

#[async_trait::async_trait]
pub trait PowerControl: Send + Sync {
    async fn apply(&self, action: PowerAction) -> CoreResult<()>;
}

/// One instance of each capability, shared with detached alarm tasks.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub speech: Arc<dyn SpeechOutput>,
    pub screen: Arc<dyn Screen>,
    pub prompter: Arc<dyn Prompter>,
    pub media: Arc<dyn MediaPlayer>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub search: Arc<dyn SearchService>,
    pub weather: Arc<dyn WeatherService>,
    pub calendar: Arc<dyn CalendarService>,
    pub phone: Arc<dyn PhoneRelay>,
    pub power: Arc<dyn PowerControl>,
}
