//! Scripted collaborators for driving the dispatcher without a microphone or a terminal.
//!
//! Each double replays queued answers in order and records what it was given.

use std::collections::VecDeque;
use std::sync::Mutex;
use teodoro_core::{PromptReply, PromptRequest, Prompter, Screen, SpeechOutput, Transcriber};

fn guard<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Replays commands and repeats. An exhausted queue behaves like silence.
#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    commands: Mutex<VecDeque<String>>,
    repeats: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: Mutex::new(commands.into_iter().map(Into::into).collect()),
            repeats: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues answers for `listen_for_repeat`; `None` is a silent turn.
    pub fn with_repeats<I>(self, repeats: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        *guard(&self.repeats) = repeats.into_iter().map(|r| r.map(str::to_string)).collect();
        self
    }
}

impl Transcriber for ScriptedTranscriber {
    fn listen_for_command(&self) -> Option<String> {
        guard(&self.commands).pop_front()
    }

    fn listen_for_repeat(&self) -> Option<String> {
        guard(&self.repeats).pop_front().flatten()
    }
}

/// Replays prompt replies and keeps every request. Runs out as `Cancelled`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    replies: Mutex<VecDeque<PromptReply>>,
    requests: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = PromptReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        guard(&self.requests).clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&self, request: PromptRequest) -> PromptReply {
        guard(&self.requests).push(request);
        guard(&self.replies)
            .pop_front()
            .unwrap_or(PromptReply::Cancelled)
    }
}

/// Speech sink that remembers each utterance with the voice it was spoken in.
#[derive(Debug)]
pub struct RecordingSpeech {
    voice: Mutex<String>,
    spoken: Mutex<Vec<(String, String)>>,
}

impl Default for RecordingSpeech {
    fn default() -> Self {
        Self {
            voice: Mutex::new("spanish+m3".to_string()),
            spoken: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        guard(&self.spoken).iter().map(|(text, _)| text.clone()).collect()
    }

    /// (text, voice) pairs.
    pub fn spoken_with_voice(&self) -> Vec<(String, String)> {
        guard(&self.spoken).clone()
    }

    pub fn clear(&self) {
        guard(&self.spoken).clear();
    }
}

impl SpeechOutput for RecordingSpeech {
    fn speak(&self, text: &str) {
        let voice = self.current_voice();
        guard(&self.spoken).push((text.to_string(), voice));
    }

    fn current_voice(&self) -> String {
        guard(&self.voice).clone()
    }

    fn set_voice(&self, voice: &str) {
        *guard(&self.voice) = voice.to_string();
    }
}

#[derive(Debug, Default)]
pub struct RecordingScreen {
    shown: Mutex<Vec<String>>,
}

impl RecordingScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<String> {
        guard(&self.shown).clone()
    }
}

impl Screen for RecordingScreen {
    fn show(&self, text: &str) {
        guard(&self.shown).push(text.to_string());
    }
}
