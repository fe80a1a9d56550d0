//! Placeholder service collaborators.
//!
//! In-memory stand-ins that record what they were asked to do. The daemon falls back to them
//! when a real backend is not configured, and tests use them to observe side effects.

use crate::actions::media::MediaCommand;
use crate::actions::system::PowerAction;
use crate::collab::{
    BrowserLauncher, CalendarEvent, CalendarService, Collaborators, MediaPlayer, NewEvent,
    PhoneRelay, Prompter, PowerControl, Screen, SearchService, SpeechOutput, Transcriber,
    WeatherService,
};
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};

fn lock<T: Clone>(m: &Mutex<T>) -> T {
    match m.lock() {
        Ok(g) => g.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn push<T>(m: &Mutex<Vec<T>>, item: T) {
    match m.lock() {
        Ok(mut g) => g.push(item),
        Err(poisoned) => poisoned.into_inner().push(item),
    }
}

/// Media player with a fixed status and metadata.
#[derive(Debug)]
pub struct PlaceholderMedia {
    status: String,
    metadata: (String, String, String),
    fail: bool,
    commands: Mutex<Vec<MediaCommand>>,
}

impl Default for PlaceholderMedia {
    fn default() -> Self {
        Self {
            status: "Stopped".to_string(),
            metadata: Default::default(),
            fail: false,
            commands: Mutex::new(Vec::new()),
        }
    }
}

impl PlaceholderMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing() -> Self {
        Self {
            status: "Playing".to_string(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, title: &str, album: &str, artist: &str) -> Self {
        self.metadata = (title.to_string(), album.to_string(), artist.to_string());
        self
    }

    /// Every command fails, as when the player is not running.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Commands received so far, status reads excluded.
    pub fn commands(&self) -> Vec<MediaCommand> {
        lock(&self.commands)
    }
}

#[async_trait::async_trait]
impl MediaPlayer for PlaceholderMedia {
    async fn run(&self, command: MediaCommand) -> CoreResult<String> {
        if self.fail {
            return Err(CoreError::handler("media", "player not running"));
        }
        let out = match command {
            MediaCommand::Status => return Ok(self.status.clone()),
            MediaCommand::Title => self.metadata.0.clone(),
            MediaCommand::Album => self.metadata.1.clone(),
            MediaCommand::Artist => self.metadata.2.clone(),
            _ => String::new(),
        };
        push(&self.commands, command);
        Ok(out)
    }
}

/// Records opened URLs.
#[derive(Debug, Default)]
pub struct PlaceholderBrowser {
    opened: Mutex<Vec<String>>,
}

impl PlaceholderBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened)
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for PlaceholderBrowser {
    async fn open(&self, url: &str) -> CoreResult<()> {
        tracing::info!(target: "teodoro::placeholder", url = url, "Browser open (placeholder)");
        push(&self.opened, url.to_string());
        Ok(())
    }
}

/// Returns the same page for every URL.
#[derive(Debug, Default)]
pub struct PlaceholderSearch {
    page: String,
}

impl PlaceholderSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(page: impl Into<String>) -> Self {
        Self { page: page.into() }
    }
}

#[async_trait::async_trait]
impl SearchService for PlaceholderSearch {
    async fn fetch(&self, _url: &str) -> CoreResult<String> {
        Ok(self.page.clone())
    }
}

/// Fixed weather report. Without one, every request fails.
#[derive(Debug, Default)]
pub struct PlaceholderWeather {
    response: Option<String>,
    asked: Mutex<Vec<String>>,
}

impl PlaceholderWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(report: impl Into<String>) -> Self {
        Self {
            response: Some(report.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn places(&self) -> Vec<String> {
        lock(&self.asked)
    }
}

#[async_trait::async_trait]
impl WeatherService for PlaceholderWeather {
    async fn current(&self, place: &str) -> CoreResult<String> {
        push(&self.asked, place.to_string());
        self.response
            .clone()
            .ok_or_else(|| CoreError::handler("weather", "no weather backend configured"))
    }
}

/// In-memory calendar. `unavailable()` makes every call fail like a revoked API grant.
#[derive(Debug, Default)]
pub struct PlaceholderCalendar {
    events: Vec<CalendarEvent>,
    unavailable: bool,
    created: Mutex<Vec<(String, NewEvent)>>,
}

impl PlaceholderCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<(String, NewEvent)> {
        lock(&self.created)
    }
}

#[async_trait::async_trait]
impl CalendarService for PlaceholderCalendar {
    async fn events(
        &self,
        _calendar_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> CoreResult<Vec<CalendarEvent>> {
        if self.unavailable {
            return Err(CoreError::handler("calendar", "no calendar access"));
        }
        Ok(self
            .events
            .iter()
            .filter(|e| {
                let start = match e.start {
                    crate::collab::EventStart::At(at) => at,
                    crate::collab::EventStart::AllDay(d) => d.and_time(chrono::NaiveTime::MIN),
                };
                start >= from && start < to
            })
            .cloned()
            .collect())
    }

    async fn create_event(&self, calendar_id: &str, event: NewEvent) -> CoreResult<()> {
        if self.unavailable {
            return Err(CoreError::handler("calendar", "no calendar access"));
        }
        push(&self.created, (calendar_id.to_string(), event));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneCall {
    Key(String),
    EmergencyAudio,
}

#[derive(Debug, Default)]
pub struct PlaceholderPhone {
    calls: Mutex<Vec<PhoneCall>>,
}

impl PlaceholderPhone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PhoneCall> {
        lock(&self.calls)
    }
}

#[async_trait::async_trait]
impl PhoneRelay for PlaceholderPhone {
    async fn send_key(&self, key: &str) -> CoreResult<()> {
        tracing::info!(target: "teodoro::placeholder", "Phone key relayed (placeholder)");
        push(&self.calls, PhoneCall::Key(key.to_string()));
        Ok(())
    }

    async fn play_emergency_audio(&self) -> CoreResult<()> {
        push(&self.calls, PhoneCall::EmergencyAudio);
        Ok(())
    }
}

/// Logs power actions instead of applying them.
#[derive(Debug, Default)]
pub struct PlaceholderPower {
    applied: Mutex<Vec<PowerAction>>,
}

impl PlaceholderPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<PowerAction> {
        lock(&self.applied)
    }
}

#[async_trait::async_trait]
impl PowerControl for PlaceholderPower {
    async fn apply(&self, action: PowerAction) -> CoreResult<()> {
        tracing::warn!(
            target: "teodoro::placeholder",
            action = action.systemctl_verb(),
            "Power action not applied (placeholder)"
        );
        push(&self.applied, action);
        Ok(())
    }
}

impl Collaborators {
    /// I/O collaborators as given, every service a default placeholder.
    pub fn with_placeholders(
        transcriber: Arc<dyn Transcriber>,
        speech: Arc<dyn SpeechOutput>,
        screen: Arc<dyn Screen>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            transcriber,
            speech,
            screen,
            prompter,
            media: Arc::new(PlaceholderMedia::new()),
            browser: Arc::new(PlaceholderBrowser::new()),
            search: Arc::new(PlaceholderSearch::new()),
            weather: Arc::new(PlaceholderWeather::new()),
            calendar: Arc::new(PlaceholderCalendar::new()),
            phone: Arc::new(PlaceholderPhone::new()),
            power: Arc::new(PlaceholderPower::new()),
        }
    }
}
