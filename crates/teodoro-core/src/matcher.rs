//! Intent matching: first intent in priority order with a trigger contained in the transcript.
//!
//! Containment is plain substring search on the lower-cased transcript, not word matching,
//! so "hola" also matches inside "holanda". Stored command tables rely on this.

use crate::lexicon::{Intent, Lexicon};

pub fn match_intent(transcript: &str, lexicon: &Lexicon) -> Option<Intent> {
    matching_trigger(transcript, lexicon).map(|(intent, _)| intent)
}

/// The winning intent together with the trigger that selected it.
pub fn matching_trigger<'a>(transcript: &str, lexicon: &'a Lexicon) -> Option<(Intent, &'a str)> {
    let lowered = transcript.to_lowercase();
    Intent::PRIORITY.iter().find_map(|&intent| {
        lexicon
            .triggers(intent)
            .iter()
            .find(|t| lowered.contains(t.as_str()))
            .map(|t| (intent, t.as_str()))
    })
}
