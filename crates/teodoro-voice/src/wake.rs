//! Wake-word gating for transcribed utterances
//!
//! Only utterances addressed to the assistant become commands. An utterance that contains
//! one of the assistant's names either carries the command after the name, or wakes the
//! listener so the next utterance is taken as the command.

use tracing::{debug, info};

/// Result of feeding one utterance to the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeEvent {
    /// Not addressed to the assistant.
    Ignored,
    /// The name was said alone; the next utterance is the command.
    Awakened,
    /// A command, with the wake word already stripped.
    Command(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeState {
    Idle,
    Awake,
}

pub struct WakeListener {
    names: Vec<String>,
    state: WakeState,
}

impl WakeListener {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        // "teodoro" must be tried before "teo".
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        Self {
            names,
            state: WakeState::Idle,
        }
    }

    pub fn process(&mut self, utterance: &str) -> WakeEvent {
        let text = utterance.trim().to_lowercase();
        match self.state {
            WakeState::Awake => {
                self.state = WakeState::Idle;
                if text.is_empty() {
                    debug!(target: "teodoro::wake", "Empty follow-up, going back to idle");
                    return WakeEvent::Ignored;
                }
                WakeEvent::Command(text)
            }
            WakeState::Idle => {
                let Some((name, at)) = self.find_name(&text) else {
                    return WakeEvent::Ignored;
                };
                let rest = text[at + name.len()..]
                    .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
                    .trim_end();
                if rest.is_empty() {
                    info!(target: "teodoro::wake", name = %name, "Wake word heard");
                    self.state = WakeState::Awake;
                    WakeEvent::Awakened
                } else {
                    WakeEvent::Command(rest.to_string())
                }
            }
        }
    }

    fn find_name(&self, text: &str) -> Option<(String, usize)> {
        self.names
            .iter()
            .find_map(|n| text.find(n.as_str()).map(|at| (n.clone(), at)))
    }

    /// Drops a pending wake-up, e.g. when the follow-up timed out.
    pub fn reset(&mut self) {
        self.state = WakeState::Idle;
    }

    pub fn state(&self) -> &str {
        match self.state {
            WakeState::Idle => "idle",
            WakeState::Awake => "awake",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> WakeListener {
        WakeListener::new(["Teodoro", "Teo"])
    }

    #[test]
    fn command_after_name() {
        let mut wake = listener();
        assert_eq!(
            wake.process("Teodoro, qué hora es"),
            WakeEvent::Command("qué hora es".to_string())
        );
        assert_eq!(wake.state(), "idle");
    }

    #[test]
    fn name_alone_wakes_for_next_utterance() {
        let mut wake = listener();
        assert_eq!(wake.process("teo"), WakeEvent::Awakened);
        assert_eq!(wake.state(), "awake");
        assert_eq!(
            wake.process("pon música"),
            WakeEvent::Command("pon música".to_string())
        );
        assert_eq!(wake.state(), "idle");
    }

    #[test]
    fn unaddressed_speech_is_ignored() {
        let mut wake = listener();
        assert_eq!(wake.process("qué hora es"), WakeEvent::Ignored);
        wake.process("teodoro");
        wake.reset();
        assert_eq!(wake.process("qué hora es"), WakeEvent::Ignored);
    }
}
