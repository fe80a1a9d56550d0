//! Per-user session context and the authorization gate.
//!
//! The gate is a pure function of (intent, context). It is evaluated on every dispatch and its
//! result is never cached, so enabling a feature mid-session (a phone macro arriving over UDP)
//! takes effect on the next command.

use crate::lexicon::{Intent, Lexicon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A macro endpoint, or the stored `false` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawHook", into = "RawHook")]
pub enum MacroHook {
    #[default]
    Disabled,
    Url(String),
}

impl MacroHook {
    pub fn url(&self) -> Option<&str> {
        match self {
            MacroHook::Url(u) if !u.trim().is_empty() => Some(u.as_str()),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url().is_some()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawHook {
    Flag(bool),
    Url(String),
    Missing(Option<()>),
}

impl From<RawHook> for MacroHook {
    fn from(raw: RawHook) -> Self {
        match raw {
            RawHook::Url(u) => MacroHook::Url(u),
            RawHook::Flag(_) | RawHook::Missing(_) => MacroHook::Disabled,
        }
    }
}

impl From<MacroHook> for RawHook {
    fn from(hook: MacroHook) -> Self {
        match hook {
            MacroHook::Url(u) => RawHook::Url(u),
            MacroHook::Disabled => RawHook::Flag(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarIds {
    #[serde(default)]
    pub personal: Option<String>,
    #[serde(default)]
    pub trello: Option<String>,
}

impl CalendarIds {
    pub fn any(&self) -> bool {
        self.personal.is_some() || self.trello.is_some()
    }
}

/// Stored shape of a "Users" document. Underscore-prefixed fields are private settings;
/// everything else the user added lives in `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "_CalendarsID", default)]
    pub calendars: CalendarIds,
    /// Provider credentials blob, or `false`.
    #[serde(rename = "_CalendarsAPI", default)]
    pub calendar_api: Value,
    #[serde(rename = "_PhoneFunctions", default)]
    pub phone_functions: bool,
    #[serde(rename = "_OnMacro", default)]
    pub on_macro: MacroHook,
    #[serde(rename = "_OffMacro", default)]
    pub off_macro: MacroHook,
    #[serde(rename = "_EmergencyMacro", default)]
    pub emergency_macro: MacroHook,
    /// Argon2 PHC string.
    #[serde(rename = "_hash", default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(flatten)]
    pub info: Map<String, Value>,
}

impl UserRecord {
    pub fn new_default(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calendars: CalendarIds::default(),
            calendar_api: Value::Bool(false),
            phone_functions: false,
            on_macro: MacroHook::Disabled,
            off_macro: MacroHook::Disabled,
            emergency_macro: MacroHook::Disabled,
            password_hash: None,
            info: Map::new(),
        }
    }

    /// User-visible fields, private settings excluded.
    pub fn public_info(&self) -> Vec<(String, String)> {
        self.info
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

/// Mutable state of the logged-in user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: String,
    pub calendars: CalendarIds,
    pub calendar_api: bool,
    /// Phone integration is active for this session.
    pub phone_functions: bool,
    pub on_macro: MacroHook,
    pub off_macro: MacroHook,
    pub emergency_macro: MacroHook,
    /// Unlock key announced by the phone ("on<key>").
    pub phone_macro: Option<String>,
    lexicon: Arc<Lexicon>,
}

impl SessionContext {
    pub fn from_record(record: &UserRecord, phone_requested: bool, lexicon: Arc<Lexicon>) -> Self {
        Self {
            user: record.name.clone(),
            calendars: record.calendars.clone(),
            calendar_api: !matches!(record.calendar_api, Value::Bool(false) | Value::Null),
            phone_functions: phone_requested && record.phone_functions,
            on_macro: record.on_macro.clone(),
            off_macro: record.off_macro.clone(),
            emergency_macro: record.emergency_macro.clone(),
            phone_macro: None,
            lexicon,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn lexicon_handle(&self) -> Arc<Lexicon> {
        Arc::clone(&self.lexicon)
    }
}

/// Capability an intent depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    DayNames,
    MonthNames,
    Numbers,
    SpotifyActions,
    MathOperations,
    PhoneMacro,
    EmergencyMacro,
    CalendarIds,
}

impl Feature {
    pub fn name(self) -> &'static str {
        match self {
            Feature::DayNames => "day names",
            Feature::MonthNames => "month names",
            Feature::Numbers => "numbers table",
            Feature::SpotifyActions => "spotify actions",
            Feature::MathOperations => "math operations",
            Feature::PhoneMacro => "phone macro",
            Feature::EmergencyMacro => "emergency macro",
            Feature::CalendarIds => "calendar ids",
        }
    }

    pub fn available(self, ctx: &SessionContext) -> bool {
        let lex = ctx.lexicon();
        match self {
            Feature::DayNames => lex.days().is_some(),
            Feature::MonthNames => lex.months().is_some(),
            Feature::Numbers => lex.numbers().is_some(),
            Feature::SpotifyActions => lex.spotify_actions().is_some(),
            Feature::MathOperations => lex.math_operations().is_some(),
            Feature::PhoneMacro => ctx.phone_macro.as_deref().is_some_and(|k| !k.is_empty()),
            Feature::EmergencyMacro => ctx.emergency_macro.is_enabled(),
            Feature::CalendarIds => ctx.calendars.any(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn required_features(intent: Intent) -> &'static [Feature] {
    match intent {
        Intent::Today => &[Feature::DayNames, Feature::MonthNames],
        Intent::Play
        | Intent::Next
        | Intent::Previous
        | Intent::Pause
        | Intent::Stop
        | Intent::Song => &[Feature::SpotifyActions],
        Intent::Reminder => &[Feature::Numbers],
        Intent::Math => &[Feature::Numbers, Feature::MathOperations],
        Intent::Phone => &[Feature::PhoneMacro],
        Intent::EmergencyCall => &[Feature::EmergencyMacro],
        Intent::GetCalendar | Intent::SetCalendar => {
            &[Feature::CalendarIds, Feature::MonthNames, Feature::Numbers]
        }
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied { missing: Vec<Feature> },
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

pub fn authorize(intent: Intent, ctx: &SessionContext) -> Authorization {
    let missing: Vec<Feature> = required_features(intent)
        .iter()
        .copied()
        .filter(|f| !f.available(ctx))
        .collect();
    if missing.is_empty() {
        Authorization::Allowed
    } else {
        Authorization::Denied { missing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document;
    use serde_json::json;

    fn lexicon(with_apps: bool) -> Arc<Lexicon> {
        let general = vec![
            document(json!({
                "Time": {"Days": ["lunes"], "Months": ["enero"]},
                "Numbers": {"1": "uno"}
            }))
            .unwrap(),
            document(json!({"Commands": {}})).unwrap(),
        ];
        let apps = if with_apps {
            vec![document(json!({
                "SpotifyActions": {"play": "true"},
                "MathOperations": [{"keyword": "más", "operation": "+"}]
            }))
            .unwrap()]
        } else {
            vec![]
        };
        Arc::new(Lexicon::from_documents(&general, &apps, "Teodoro").unwrap())
    }

    #[test]
    fn record_reads_stored_shape() {
        let doc = json!({
            "nombre": "ana",
            "_CalendarsID": {"personal": "ana@example.org", "trello": null},
            "_CalendarsAPI": false,
            "_PhoneFunctions": true,
            "_OnMacro": "https://macro.example/on",
            "_OffMacro": false,
            "_EmergencyMacro": false,
            "_salt": "legacy",
            "ciudad": "Soria"
        });
        let record: UserRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.on_macro.url(), Some("https://macro.example/on"));
        assert!(!record.off_macro.is_enabled());
        assert_eq!(record.public_info(), vec![("ciudad".to_string(), "Soria".to_string())]);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["_OffMacro"], json!(false));
        assert_eq!(back["ciudad"], json!("Soria"));
    }

    #[test]
    fn gate_denies_without_tables() {
        let ctx = SessionContext::from_record(&UserRecord::new_default("usuario"), false, lexicon(false));
        assert_eq!(
            authorize(Intent::Play, &ctx),
            Authorization::Denied {
                missing: vec![Feature::SpotifyActions]
            }
        );
        assert!(authorize(Intent::Time, &ctx).is_allowed());
        assert!(authorize(Intent::Today, &ctx).is_allowed());
    }

    #[test]
    fn gate_is_idempotent_and_tracks_session_changes() {
        let mut ctx =
            SessionContext::from_record(&UserRecord::new_default("usuario"), true, lexicon(true));
        let first = authorize(Intent::Phone, &ctx);
        assert_eq!(first, authorize(Intent::Phone, &ctx));
        assert!(!first.is_allowed());

        ctx.phone_macro = Some("clave".to_string());
        assert!(authorize(Intent::Phone, &ctx).is_allowed());
        assert!(authorize(Intent::Math, &ctx).is_allowed());
    }

    #[test]
    fn calendar_needs_at_least_one_id() {
        let mut record = UserRecord::new_default("ana");
        let ctx = SessionContext::from_record(&record, false, lexicon(true));
        assert_eq!(
            authorize(Intent::GetCalendar, &ctx),
            Authorization::Denied {
                missing: vec![Feature::CalendarIds]
            }
        );
        record.calendars.trello = Some("tablero".to_string());
        let ctx = SessionContext::from_record(&record, false, lexicon(true));
        assert!(authorize(Intent::SetCalendar, &ctx).is_allowed());
    }
}
