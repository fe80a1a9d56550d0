//! Interactive voice selection.

use crate::collab::{SpeechOutput, Transcriber};
use crate::outcome::Reply;

pub const VOICE_TEST_PROMPT: &str = "Esta es una prueba de voz. ¿Le gusta?";
const SILENCE_RETRIES: usize = 2;

pub fn voice_name(index: u8) -> String {
    format!("spanish+m{}", index)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceChoice {
    Chosen(String),
    Default,
    KeptPrevious,
}

/// Plays each voice and asks. "si" keeps it, "no" moves on, anything else restores the
/// default voice. Running out of voices restores the voice in use before the dialog.
pub fn choose_voice(speech: &dyn SpeechOutput, listener: &dyn Transcriber, max_voices: u8) -> VoiceChoice {
    let previous = speech.current_voice();
    let mut index = 1;
    let mut silences = 0;
    while index <= max_voices {
        let candidate = voice_name(index);
        speech.set_voice(&candidate);
        speech.speak(VOICE_TEST_PROMPT);
        match listener.listen_for_repeat().map(|a| a.trim().to_lowercase()) {
            Some(answer) if answer == "si" || answer == "sí" => {
                tracing::info!(target: "teodoro::voice", voice = %candidate, "Voice chosen");
                return VoiceChoice::Chosen(candidate);
            }
            Some(answer) if answer == "no" => {
                index += 1;
                silences = 0;
            }
            Some(_) => {
                speech.set_voice(&speech.default_voice());
                return VoiceChoice::Default;
            }
            None if silences < SILENCE_RETRIES => {
                silences += 1;
                speech.speak("Por favor, pruebe otra vez");
            }
            None => {
                index += 1;
                silences = 0;
            }
        }
    }
    speech.set_voice(&previous);
    VoiceChoice::KeptPrevious
}

pub fn choice_reply(choice: &VoiceChoice) -> Reply {
    match choice {
        VoiceChoice::Chosen(_) => Reply::new("Ha cambiado la voz correctamente", "Voz cambiada"),
        VoiceChoice::Default => Reply::new("Ha elegido la voz por defecto", "Voz por defecto"),
        VoiceChoice::KeptPrevious => Reply::new(
            "No ha seleccionado ninguna de las voces disponibles. Se mantiene la voz anterior",
            "Se mantiene la voz anterior",
        ),
    }
}
