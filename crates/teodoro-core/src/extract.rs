//! Positional argument extraction over whitespace-tokenized transcripts.
//!
//! The free functions are pure and return [`CoreError::ExtractionFailure`] when an anchor or a
//! table lookup is missing. [`ArgumentResolver`] wraps them with the interactive fallbacks, so
//! an extraction failure never reaches the dispatcher.

use crate::collab::{PromptKind, PromptReply, PromptRequest, Prompter};
use crate::error::{CoreError, CoreResult};
use crate::lexicon::{Lexicon, MonthTable, NumberTable, UnitTable};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Seconds used when neither the transcript nor the prompt yield a duration.
pub const DEFAULT_DURATION_SECS: u64 = 300;

/// Attempts allowed for the hour prompt before falling back to the current time.
pub const HOUR_ATTEMPTS: usize = 3;

static HOUR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").expect("static hour pattern")
});

pub fn tokenize(transcript: &str) -> Vec<String> {
    transcript
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Index of the first token equal to `anchor`.
pub fn position(tokens: &[String], anchor: &str) -> Option<usize> {
    tokens.iter().position(|t| t == anchor)
}

/// Token at a signed offset from the first occurrence of `anchor`.
pub fn token_at<'a>(tokens: &'a [String], anchor: &str, offset: isize) -> Option<&'a str> {
    let idx = position(tokens, anchor)? as isize + offset;
    if idx < 0 {
        return None;
    }
    tokens.get(idx as usize).map(String::as_str)
}

/// Table lookup first, then a literal integer.
pub fn parse_number(word: &str, numbers: Option<&NumberTable>) -> CoreResult<i64> {
    if let Some(n) = numbers.and_then(|t| t.value_of(word)) {
        return Ok(n);
    }
    word.trim()
        .parse::<i64>()
        .map_err(|_| CoreError::extraction(format!("'{}' is not a number", word)))
}

/// "de <magnitude> <unit>" to seconds.
pub fn extract_duration(
    tokens: &[String],
    numbers: Option<&NumberTable>,
    units: &UnitTable,
) -> CoreResult<u64> {
    let magnitude = token_at(tokens, "de", 1)
        .ok_or_else(|| CoreError::extraction("no duration after 'de'"))?;
    let unit = token_at(tokens, "de", 2)
        .ok_or_else(|| CoreError::extraction("no duration unit"))?;
    let magnitude = parse_number(magnitude, numbers)?;
    let magnitude = u64::try_from(magnitude)
        .map_err(|_| CoreError::extraction("negative duration"))?;
    let multiplier = units
        .value_of(unit)
        .ok_or_else(|| CoreError::extraction(format!("unknown unit '{}'", unit)))?;
    magnitude
        .checked_mul(multiplier)
        .ok_or_else(|| CoreError::extraction(format!("duration of {} {} overflows", magnitude, unit)))
}

/// Every token after "nombre", joined by spaces.
pub fn extract_name(tokens: &[String]) -> Option<String> {
    let idx = position(tokens, "nombre")?;
    let name = tokens[idx + 1..].join(" ");
    (!name.is_empty()).then_some(name)
}

/// Day offset for "hoy", "mañana" and "pasado [mañana]".
pub fn relative_day(word: &str) -> Option<i64> {
    match word {
        "hoy" => Some(0),
        "mañana" => Some(1),
        "pasado" => Some(2),
        _ => None,
    }
}

/// "<anchor> hoy|mañana|pasado" or "<anchor> el D de M de Y".
///
/// Month and year default to those of `today` when absent or unreadable. The day is required.
pub fn resolve_date(
    tokens: &[String],
    anchor: &str,
    numbers: Option<&NumberTable>,
    months: Option<&MonthTable>,
    today: NaiveDate,
) -> CoreResult<NaiveDate> {
    let first = token_at(tokens, anchor, 1)
        .ok_or_else(|| CoreError::extraction(format!("nothing after '{}'", anchor)))?;
    if let Some(days) = relative_day(first) {
        return Ok(today + ChronoDuration::days(days));
    }

    let day = token_at(tokens, anchor, 2)
        .ok_or_else(|| CoreError::extraction("no day in date expression"))
        .and_then(|w| parse_number(w, numbers))?;
    let month = token_at(tokens, anchor, 4)
        .and_then(|w| {
            months
                .and_then(|m| m.value_of(w))
                .or_else(|| w.parse::<u32>().ok())
        })
        .unwrap_or_else(|| today.month());
    let year = token_at(tokens, anchor, 6)
        .and_then(|w| w.parse::<i32>().ok())
        .unwrap_or_else(|| today.year());

    u32::try_from(day)
        .ok()
        .and_then(|d| NaiveDate::from_ymd_opt(year, month, d))
        .ok_or_else(|| {
            CoreError::extraction(format!("invalid date {}/{}/{}", day, month, year))
        })
}

pub fn is_valid_hour(text: &str) -> bool {
    HOUR_RE.is_match(text.trim())
}

/// Extraction with interactive fallbacks.
pub struct ArgumentResolver<'a> {
    lexicon: &'a Lexicon,
    prompter: &'a dyn Prompter,
    now: NaiveDateTime,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(lexicon: &'a Lexicon, prompter: &'a dyn Prompter, now: NaiveDateTime) -> Self {
        Self {
            lexicon,
            prompter,
            now,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Free-text prompt. A cancelled prompt yields the default, or an empty string.
    pub fn text(&self, label: &str, default: Option<&str>) -> String {
        let reply = self.prompter.prompt(PromptRequest::new(PromptKind::Text, label, default));
        match reply {
            PromptReply::Text(text) => text.trim().to_string(),
            _ => default.unwrap_or_default().to_string(),
        }
    }

    pub fn secret(&self, label: &str) -> Option<String> {
        match self.prompter.prompt(PromptRequest::new(PromptKind::Secret, label, None)) {
            PromptReply::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn name(&self, tokens: &[String], label: &str, default: &str) -> String {
        match extract_name(tokens) {
            Some(name) => name,
            None => {
                tracing::debug!(target: "teodoro::extract", label = label, "No 'nombre' anchor, prompting");
                let name = self.text(label, Some(default));
                if name.is_empty() {
                    default.to_string()
                } else {
                    name
                }
            }
        }
    }

    pub fn duration(&self, tokens: &[String]) -> u64 {
        match extract_duration(tokens, self.lexicon.numbers(), self.lexicon.units()) {
            Ok(secs) => secs,
            Err(e) => {
                tracing::debug!(target: "teodoro::extract", error = %e, "Duration fallback to prompt");
                let request =
                    PromptRequest::new(PromptKind::Duration, "Introduce duración", Some("5"));
                match self.prompter.prompt(request) {
                    PromptReply::Duration {
                        amount,
                        unit_seconds,
                    } => amount.saturating_mul(unit_seconds),
                    _ => DEFAULT_DURATION_SECS,
                }
            }
        }
    }

    pub fn date(&self, tokens: &[String], anchor: &str, label: &str) -> NaiveDate {
        let today = self.now.date();
        match resolve_date(
            tokens,
            anchor,
            self.lexicon.numbers(),
            self.lexicon.months(),
            today,
        ) {
            Ok(date) => date,
            Err(e) => {
                tracing::debug!(target: "teodoro::extract", error = %e, "Date fallback to prompt");
                match self.prompter.prompt(PromptRequest::new(PromptKind::Date, label, None)) {
                    PromptReply::Date(date) => date,
                    _ => today,
                }
            }
        }
    }

    /// "HH:MM" from the hour prompt, re-asked on invalid input.
    pub fn hour(&self, label: &str) -> String {
        for attempt in 1..=HOUR_ATTEMPTS {
            let reply = self.prompter.prompt(PromptRequest::new(PromptKind::Hour, label, None));
            let candidate = match reply {
                PromptReply::Hour(h) | PromptReply::Text(h) => h,
                PromptReply::Cancelled => break,
                _ => continue,
            };
            if is_valid_hour(&candidate) {
                return normalize_hour(&candidate);
            }
            tracing::debug!(target: "teodoro::extract", attempt = attempt, "Invalid hour entered");
        }
        self.now.format("%H:%M").to_string()
    }
}

/// "9:05" to "09:05" so stored hours compare lexicographically.
fn normalize_hour(text: &str) -> String {
    let text = text.trim();
    match text.split_once(':') {
        Some((h, m)) if h.len() == 1 => format!("0{}:{}", h, m),
        _ => text.to_string(),
    }
}
