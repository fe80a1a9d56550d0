//! Terminal front end.
//!
//! Typed lines stand in for transcribed speech; spoken replies and screen text go to stdout.
//! A reader thread owns stdin and feeds every consumer through one channel, so the
//! transcriber and the prompter never race for input.

use crate::error::{VoiceError, VoiceResult};
use crate::wake::{WakeEvent, WakeListener};
use chrono::NaiveDate;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teodoro_core::lexicon::UnitTable;
use teodoro_core::{LoginForm, PromptKind, PromptReply, PromptRequest, Prompter, Screen, SpeechOutput, Transcriber};
use tracing::{debug, warn};

pub const WAKE_REPLY: &str = "¿Si?";

/// Line source shared by the console collaborators.
pub struct ConsoleInput {
    rx: Mutex<Receiver<String>>,
    closed: AtomicBool,
}

impl ConsoleInput {
    /// Starts the stdin reader thread.
    pub fn spawn() -> VoiceResult<Arc<Self>> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("teodoro-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(target: "teodoro::console", error = %e, "stdin read failed");
                            break;
                        }
                    }
                }
                debug!(target: "teodoro::console", "stdin closed");
            })?;
        Ok(Self::from_receiver(rx))
    }

    /// Input fed from an existing channel instead of stdin.
    pub fn from_receiver(rx: Receiver<String>) -> Arc<Self> {
        Arc::new(Self {
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        })
    }

    /// Next line, waiting at most `timeout` when given.
    pub fn next_line(&self, timeout: Option<Duration>) -> VoiceResult<String> {
        let rx = self
            .rx
            .lock()
            .map_err(|e| VoiceError::ChannelReceive(e.to_string()))?;
        match timeout {
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(line) => Ok(line),
                Err(RecvTimeoutError::Timeout) => {
                    Err(VoiceError::ChannelReceive("timed out".to_string()))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.closed.store(true, Ordering::SeqCst);
                    Err(VoiceError::InputClosed)
                }
            },
            None => rx.recv().map_err(|_| {
                self.closed.store(true, Ordering::SeqCst);
                VoiceError::InputClosed
            }),
        }
    }

    /// The source is exhausted; every later read fails.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn print_prompt(label: &str) {
    print!("{} > ", label.replace('\n', " "));
    let _ = std::io::stdout().flush();
}

/// Transcriber gated by the wake word.
pub struct ConsoleTranscriber {
    input: Arc<ConsoleInput>,
    wake: Mutex<WakeListener>,
    speech: Arc<dyn SpeechOutput>,
    follow_up_timeout: Duration,
}

impl ConsoleTranscriber {
    pub fn new(
        input: Arc<ConsoleInput>,
        names: &[String],
        speech: Arc<dyn SpeechOutput>,
        follow_up_timeout: Duration,
    ) -> Self {
        Self {
            input,
            wake: Mutex::new(WakeListener::new(names)),
            speech,
            follow_up_timeout,
        }
    }

    fn feed(&self, line: &str) -> WakeEvent {
        match self.wake.lock() {
            Ok(mut wake) => wake.process(line),
            Err(poisoned) => poisoned.into_inner().process(line),
        }
    }

    fn reset_wake(&self) {
        match self.wake.lock() {
            Ok(mut wake) => wake.reset(),
            Err(poisoned) => poisoned.into_inner().reset(),
        }
    }
}

impl Transcriber for ConsoleTranscriber {
    fn listen_for_command(&self) -> Option<String> {
        loop {
            let line = self.input.next_line(None).ok()?;
            match self.feed(&line) {
                WakeEvent::Ignored => continue,
                WakeEvent::Command(command) => return Some(command),
                WakeEvent::Awakened => {
                    self.speech.speak(WAKE_REPLY);
                    let Ok(follow_up) = self.input.next_line(Some(self.follow_up_timeout)) else {
                        self.reset_wake();
                        return None;
                    };
                    match self.feed(&follow_up) {
                        WakeEvent::Command(command) => return Some(command),
                        _ => return None,
                    }
                }
            }
        }
    }

    fn listen_for_repeat(&self) -> Option<String> {
        let line = self.input.next_line(Some(self.follow_up_timeout)).ok()?;
        let line = line.trim().to_lowercase();
        (!line.is_empty()).then_some(line)
    }
}

/// Prints what would be spoken, tagged with the active voice.
pub struct ConsoleSpeech {
    voice: Mutex<String>,
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self {
            voice: Mutex::new("spanish+m3".to_string()),
        }
    }
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeechOutput for ConsoleSpeech {
    fn speak(&self, text: &str) {
        println!("[{}] {}", self.current_voice(), text);
    }

    fn current_voice(&self) -> String {
        match self.voice.lock() {
            Ok(v) => v.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_voice(&self, voice: &str) {
        debug!(target: "teodoro::console", voice = voice, "Voice set");
        match self.voice.lock() {
            Ok(mut v) => *v = voice.to_string(),
            Err(poisoned) => *poisoned.into_inner() = voice.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleScreen;

impl Screen for ConsoleScreen {
    fn show(&self, text: &str) {
        println!("+--------------------------------");
        for line in text.lines() {
            println!("| {}", line.trim_end());
        }
        println!("+--------------------------------");
    }
}

/// Line-based forms. An empty answer takes the default, or cancels when there is none.
pub struct ConsolePrompter {
    input: Arc<ConsoleInput>,
    units: UnitTable,
}

impl ConsolePrompter {
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self {
            input,
            units: UnitTable::spanish_units(),
        }
    }

    fn ask(&self, label: &str, default: Option<&str>) -> Option<String> {
        match default {
            Some(d) => print_prompt(&format!("{} [{}]", label, d)),
            None => print_prompt(label),
        }
        let line = self.input.next_line(None).ok()?;
        let line = line.trim();
        if line.is_empty() {
            default.map(str::to_string)
        } else {
            Some(line.to_string())
        }
    }

    fn answer(&self, request: &PromptRequest) -> VoiceResult<PromptReply> {
        let label = request.label.as_str();
        let default = request.default.as_deref();
        let missing = || VoiceError::InvalidAnswer {
            field: label.to_string(),
            value: String::new(),
        };
        let reply = match request.kind {
            PromptKind::Text | PromptKind::Secret => {
                PromptReply::Text(self.ask(label, default).ok_or_else(missing)?)
            }
            PromptKind::Hour => PromptReply::Hour(self.ask(label, default).ok_or_else(missing)?),
            PromptKind::Date => {
                let text = self.ask(&format!("{} (dd/mm/aaaa)", label), default).ok_or_else(missing)?;
                PromptReply::Date(parse_date(&text).ok_or(VoiceError::InvalidAnswer {
                    field: label.to_string(),
                    value: text,
                })?)
            }
            PromptKind::Duration => {
                let text = self.ask(&format!("{} (p.ej. 5 minutos)", label), default).ok_or_else(missing)?;
                let (amount, unit_seconds) =
                    parse_duration(&text, &self.units).ok_or(VoiceError::InvalidAnswer {
                        field: label.to_string(),
                        value: text,
                    })?;
                PromptReply::Duration {
                    amount,
                    unit_seconds,
                }
            }
            PromptKind::Login => {
                println!("{}", label);
                let name = self.ask("Usuario", default).ok_or_else(missing)?;
                let password = self.ask("Contraseña", None).unwrap_or_default();
                let phone = self
                    .ask("Funciones de móvil (s/n)", Some("n"))
                    .is_some_and(|a| a.eq_ignore_ascii_case("s") || a.eq_ignore_ascii_case("si"));
                PromptReply::Login(LoginForm {
                    name,
                    password,
                    phone,
                })
            }
            PromptKind::EventDetails => {
                println!("{}", label);
                PromptReply::EventDetails {
                    description: self.ask("Descripción", Some("")).unwrap_or_default(),
                    location: self.ask("Lugar", Some("")).unwrap_or_default(),
                }
            }
        };
        Ok(reply)
    }
}

impl Prompter for ConsolePrompter {
    fn prompt(&self, request: PromptRequest) -> PromptReply {
        match self.answer(&request) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(target: "teodoro::console", kind = ?request.kind, error = %e, "Prompt cancelled");
                PromptReply::Cancelled
            }
        }
    }
}

/// "dd/mm/aaaa" or "aaaa-mm-dd".
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// "5 minutos" into (5, 60). A bare number is taken as minutes.
pub fn parse_duration(text: &str, units: &UnitTable) -> Option<(u64, u64)> {
    let mut parts = text.split_whitespace();
    let amount = parts.next()?.parse::<u64>().ok()?;
    let unit = match parts.next() {
        Some(word) => units.value_of(word)?,
        None => 60,
    };
    Some((amount, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(lines: &[&str]) -> Arc<ConsoleInput> {
        let (tx, rx) = mpsc::channel();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        ConsoleInput::from_receiver(rx)
    }

    #[test]
    fn transcriber_waits_for_wake_word() {
        let speech = Arc::new(ConsoleSpeech::new());
        let names = vec!["Teodoro".to_string()];
        let t = ConsoleTranscriber::new(
            input(&["hola a todos", "teodoro", "qué hora es"]),
            &names,
            speech,
            Duration::from_millis(50),
        );
        assert_eq!(t.listen_for_command().as_deref(), Some("qué hora es"));
        assert_eq!(t.listen_for_command(), None);
        assert!(t.input.is_closed());
    }

    #[test]
    fn prompter_parses_typed_answers() {
        let p = ConsolePrompter::new(input(&["", "10 segundos", "25/12/2026", "ana", "secreto", "s"]));
        assert_eq!(
            p.prompt(PromptRequest::new(PromptKind::Text, "Lugar", Some("Madrid"))),
            PromptReply::Text("Madrid".to_string())
        );
        assert_eq!(
            p.prompt(PromptRequest::new(PromptKind::Duration, "Duración", None)),
            PromptReply::Duration { amount: 10, unit_seconds: 1 }
        );
        assert_eq!(
            p.prompt(PromptRequest::new(PromptKind::Date, "Fecha", None)),
            PromptReply::Date(NaiveDate::from_ymd_opt(2026, 12, 25).unwrap())
        );
        let PromptReply::Login(form) = p.prompt(PromptRequest::new(PromptKind::Login, "Login", None)) else {
            panic!("expected login form");
        };
        assert_eq!(form.name, "ana");
        assert!(form.phone);
        assert_eq!(
            p.prompt(PromptRequest::new(PromptKind::Text, "Nada", None)),
            PromptReply::Cancelled
        );
    }

    #[test]
    fn duration_words() {
        let units = UnitTable::spanish_units();
        assert_eq!(parse_duration("2 horas", &units), Some((2, 3600)));
        assert_eq!(parse_duration("3", &units), Some((3, 60)));
        assert_eq!(parse_duration("tres minutos", &units), None);
    }
}
