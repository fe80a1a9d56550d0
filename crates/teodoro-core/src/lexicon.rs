//! Lexicon: intent triggers and the word tables used by argument extraction.
//!
//! Loaded once from the "General" and "Applications" collections and never mutated afterwards.
//! A missing command table is fatal. Every other missing table only disables the intents that
//! depend on it and is reported through [`MissingTable`].

use crate::actions::math::MathOp;
use crate::error::{CoreError, CoreResult};
use crate::store::{Document, DocumentStore, Filter, APPLICATIONS, GENERAL};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Every intent the dispatcher understands, declared in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Name,
    Greetings,
    CheerUp,
    Secret,
    Today,
    Time,
    Users,
    NewInformation,
    Information,
    DelInformation,
    ChgInformation,
    ChangeVoice,
    Google,
    Wikipedia,
    Youtube,
    Play,
    Next,
    Previous,
    Pause,
    Stop,
    Song,
    Weather,
    Alarm,
    Reminder,
    Math,
    Phone,
    EmergencyCall,
    GetCalendar,
    SetCalendar,
    Shutdown,
    Suspend,
    Restart,
    Nothing,
    Del,
}

impl Intent {
    /// Evaluation order of the matcher. The first intent with a matching trigger wins.
    pub const PRIORITY: [Intent; 34] = [
        Intent::Name,
        Intent::Greetings,
        Intent::CheerUp,
        Intent::Secret,
        Intent::Today,
        Intent::Time,
        Intent::Users,
        Intent::NewInformation,
        Intent::Information,
        Intent::DelInformation,
        Intent::ChgInformation,
        Intent::ChangeVoice,
        Intent::Google,
        Intent::Wikipedia,
        Intent::Youtube,
        Intent::Play,
        Intent::Next,
        Intent::Previous,
        Intent::Pause,
        Intent::Stop,
        Intent::Song,
        Intent::Weather,
        Intent::Alarm,
        Intent::Reminder,
        Intent::Math,
        Intent::Phone,
        Intent::EmergencyCall,
        Intent::GetCalendar,
        Intent::SetCalendar,
        Intent::Shutdown,
        Intent::Suspend,
        Intent::Restart,
        Intent::Nothing,
        Intent::Del,
    ];

    /// Key of this intent inside the stored `Commands` table.
    pub fn key(self) -> &'static str {
        match self {
            Intent::Name => "Name",
            Intent::Greetings => "Greetings",
            Intent::CheerUp => "Cheer up",
            Intent::Secret => "Secret",
            Intent::Today => "Today",
            Intent::Time => "Time",
            Intent::Users => "Users",
            Intent::NewInformation => "NewInformation",
            Intent::Information => "Information",
            Intent::DelInformation => "DelInformation",
            Intent::ChgInformation => "ChgInformation",
            Intent::ChangeVoice => "ChangeVoice",
            Intent::Google => "Google",
            Intent::Wikipedia => "Wikipedia",
            Intent::Youtube => "Youtube",
            Intent::Play => "Play",
            Intent::Next => "Next",
            Intent::Previous => "Previous",
            Intent::Pause => "Pause",
            Intent::Stop => "Stop",
            Intent::Song => "Song",
            Intent::Weather => "Weather",
            Intent::Alarm => "Alarm",
            Intent::Reminder => "Reminder",
            Intent::Math => "Math",
            Intent::Phone => "Phone",
            Intent::EmergencyCall => "EmergencyCall",
            Intent::GetCalendar => "GetCalendar",
            Intent::SetCalendar => "SetCalendar",
            Intent::Shutdown => "Shutdown",
            Intent::Suspend => "Suspend",
            Intent::Restart => "Restart",
            Intent::Nothing => "Nothing",
            Intent::Del => "Del",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::PRIORITY.iter().copied().find(|i| i.key() == key)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Bidirectional spoken-word ↔ value table. Words are compared lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct WordTable<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for WordTable<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V: Copy + PartialEq> WordTable<V> {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (word, value) in pairs {
            table.insert(word, value);
        }
        table
    }

    pub fn insert(&mut self, word: impl Into<String>, value: V) {
        self.entries.push((word.into().to_lowercase(), value));
    }

    pub fn value_of(&self, word: &str) -> Option<V> {
        let word = word.to_lowercase();
        self.entries
            .iter()
            .find(|(w, _)| *w == word)
            .map(|(_, v)| *v)
    }

    /// First spoken form registered for `value`.
    pub fn word_for(&self, value: V) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(w, _)| w.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number words, e.g. "cinco" ↔ 5.
pub type NumberTable = WordTable<i64>;

/// Duration unit words mapped to their multiplier in seconds.
pub type UnitTable = WordTable<u64>;

/// Month words mapped to 1..=12.
pub type MonthTable = WordTable<u32>;

impl UnitTable {
    pub fn spanish_units() -> Self {
        Self::from_pairs([
            ("horas", 3600),
            ("hora", 3600),
            ("minutos", 60),
            ("minuto", 60),
            ("segundos", 1),
            ("segundo", 1),
        ])
    }
}

/// Keyword-driven arithmetic entry of the `MathOperations` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MathOperation {
    pub name: String,
    pub keyword: String,
    pub op: MathOp,
}

/// Optional lexicon table that was absent or unreadable at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTable {
    Days,
    Months,
    Numbers,
    SpotifyActions,
    MathOperations,
}

impl MissingTable {
    /// Operator-facing notice listing the functions that become unavailable.
    pub fn notice(self) -> &'static str {
        match self {
            MissingTable::Days => {
                "Funcionalidad 'Today' no disponible.\nCompruebe la Base de Conocimiento"
            }
            MissingTable::Months => {
                "Funcionalidades 'Today', 'getCalendar'\n y 'setCalendar' no disponibles.\nCompruebe la Base de Conocimiento"
            }
            MissingTable::Numbers => {
                "Funcionalidades 'Reminder', 'Math', \n'getCalendar' y 'setCalendar' no disponibles.\nCompruebe la Base de Conocimiento"
            }
            MissingTable::SpotifyActions => {
                "Funcionalidades de control de Spotify\n no disponibles.\n Compruebe la Base de Conocimiento"
            }
            MissingTable::MathOperations => {
                "Funcionalidad 'Math' no disponible.\nCompruebe la Base de Conocimiento"
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    names: Vec<String>,
    commands: HashMap<Intent, Vec<String>>,
    days: Option<Vec<String>>,
    months: Option<MonthTable>,
    numbers: Option<NumberTable>,
    units: UnitTable,
    spotify_actions: Option<HashMap<String, String>>,
    math_operations: Option<Vec<MathOperation>>,
    missing: Vec<MissingTable>,
}

impl Lexicon {
    /// Reads and validates the lexicon from the store.
    pub fn load(store: &dyn DocumentStore, default_name: &str) -> CoreResult<Self> {
        let general = store.find_many(GENERAL, &Filter::all())?;
        let applications = store.find_many(APPLICATIONS, &Filter::all())?;
        let lexicon = Self::from_documents(&general, &applications, default_name)?;
        tracing::info!(
            target: "teodoro::lexicon",
            names = lexicon.names.len(),
            intents = lexicon.commands.len(),
            missing = lexicon.missing.len(),
            "Lexicon loaded"
        );
        Ok(lexicon)
    }

    pub fn from_documents(
        general: &[Document],
        applications: &[Document],
        default_name: &str,
    ) -> CoreResult<Self> {
        let commands_doc = general
            .iter()
            .find(|d| d.contains_key("Commands"))
            .ok_or_else(|| CoreError::fatal("General collection has no Commands table"))?;
        let commands = parse_commands(&commands_doc["Commands"])?;

        let common = general.iter().find(|d| !d.contains_key("Commands"));
        let application = applications.first();
        let mut missing = Vec::new();

        let names = common
            .and_then(|d| d.get("Names"))
            .and_then(string_list)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| vec![default_name.to_string()]);

        let time = common.and_then(|d| d.get("Time"));
        let days = time.and_then(|t| t.get("Days")).and_then(string_list);
        if days.is_none() {
            missing.push(MissingTable::Days);
        }
        let months = time
            .and_then(|t| t.get("Months"))
            .and_then(string_list)
            .map(|list| MonthTable::from_pairs(list.into_iter().zip(1u32..)));
        if months.is_none() {
            missing.push(MissingTable::Months);
        }
        let numbers = common.and_then(|d| d.get("Numbers")).and_then(parse_numbers);
        if numbers.is_none() {
            missing.push(MissingTable::Numbers);
        }

        let spotify_actions = application
            .and_then(|d| d.get("SpotifyActions"))
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect::<HashMap<_, _>>()
            });
        if spotify_actions.is_none() {
            missing.push(MissingTable::SpotifyActions);
        }
        let math_operations = application
            .and_then(|d| d.get("MathOperations"))
            .and_then(parse_math_operations);
        if math_operations.is_none() {
            missing.push(MissingTable::MathOperations);
        }

        for table in &missing {
            tracing::warn!(
                target: "teodoro::lexicon",
                table = ?table,
                "Optional lexicon table unavailable"
            );
        }

        Ok(Self {
            names,
            commands,
            days,
            months,
            numbers,
            units: UnitTable::spanish_units(),
            spotify_actions,
            math_operations,
            missing,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Lower-cased triggers of `intent`. Empty when the table did not define it.
    pub fn triggers(&self, intent: Intent) -> &[String] {
        self.commands
            .get(&intent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Day names starting on Monday.
    pub fn days(&self) -> Option<&[String]> {
        self.days.as_deref()
    }

    pub fn months(&self) -> Option<&MonthTable> {
        self.months.as_ref()
    }

    pub fn numbers(&self) -> Option<&NumberTable> {
        self.numbers.as_ref()
    }

    pub fn units(&self) -> &UnitTable {
        &self.units
    }

    pub fn spotify_actions(&self) -> Option<&HashMap<String, String>> {
        self.spotify_actions.as_ref()
    }

    pub fn math_operations(&self) -> Option<&[MathOperation]> {
        self.math_operations.as_deref()
    }

    pub fn missing_tables(&self) -> &[MissingTable] {
        &self.missing
    }
}

fn parse_commands(value: &Value) -> CoreResult<HashMap<Intent, Vec<String>>> {
    let table = value
        .as_object()
        .ok_or_else(|| CoreError::fatal("Commands must be a table of trigger lists"))?;
    let mut commands = HashMap::new();
    for (key, triggers) in table {
        let Some(intent) = Intent::from_key(key) else {
            tracing::debug!(target: "teodoro::lexicon", key = %key, "Ignoring unknown command key");
            continue;
        };
        let list = string_list(triggers).ok_or_else(|| {
            CoreError::fatal(format!("Commands.{} must be a list of strings", key))
        })?;
        let list: Vec<String> = list
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        commands.insert(intent, list);
    }
    for intent in Intent::PRIORITY {
        if !commands.contains_key(&intent) {
            tracing::warn!(
                target: "teodoro::lexicon",
                intent = %intent,
                "No triggers for intent; it will never match"
            );
        }
    }
    Ok(commands)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// `{"1": "uno", "2": "dos"}`. A key may also map to a list of spoken forms.
fn parse_numbers(value: &Value) -> Option<NumberTable> {
    let obj = value.as_object()?;
    let mut entries: Vec<(i64, Vec<String>)> = Vec::new();
    for (k, v) in obj {
        let Ok(n) = k.trim().parse::<i64>() else {
            continue;
        };
        let words = match v {
            Value::String(s) => vec![s.clone()],
            other => string_list(other)?,
        };
        entries.push((n, words));
    }
    entries.sort_by_key(|(n, _)| *n);
    let mut table = NumberTable::default();
    for (n, words) in entries {
        for w in words {
            table.insert(w, n);
        }
    }
    Some(table)
}

/// Accepts a list of `{name?, keyword, operation}` entries, or a table keyed by operation name.
fn parse_math_operations(value: &Value) -> Option<Vec<MathOperation>> {
    let entries: Vec<(String, &Value)> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (name, item)
            })
            .collect(),
        Value::Object(obj) => obj.iter().map(|(k, v)| (k.clone(), v)).collect(),
        _ => return None,
    };

    let mut ops = Vec::new();
    for (name, entry) in entries {
        let keyword = entry.get("keyword").and_then(Value::as_str);
        let operation = entry.get("operation").and_then(Value::as_str);
        match (keyword, operation.and_then(MathOp::parse)) {
            (Some(keyword), Some(op)) => ops.push(MathOperation {
                name,
                keyword: keyword.to_lowercase(),
                op,
            }),
            _ => tracing::warn!(
                target: "teodoro::lexicon",
                name = %name,
                "Skipping unreadable math operation"
            ),
        }
    }
    Some(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document;
    use serde_json::json;

    fn general() -> Vec<Document> {
        vec![
            document(json!({
                "Names": ["Teodoro", "Teo"],
                "Time": {
                    "Days": ["lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo"],
                    "Months": ["enero", "febrero", "marzo"]
                },
                "Numbers": {"1": "uno", "2": "dos", "5": "cinco"}
            }))
            .unwrap(),
            document(json!({
                "Commands": {"Time": ["Qué Hora", " "], "Del": ["adiós"]}
            }))
            .unwrap(),
        ]
    }

    #[test]
    fn priority_lists_every_intent_once() {
        let mut keys: Vec<_> = Intent::PRIORITY.iter().map(|i| i.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 34);
        assert_eq!(Intent::from_key("Cheer up"), Some(Intent::CheerUp));
        assert_eq!(Intent::from_key("Unknown"), None);
    }

    #[test]
    fn word_table_is_bidirectional() {
        let numbers = parse_numbers(&json!({"1": "uno", "10": ["diez", "Décimo"]})).unwrap();
        assert_eq!(numbers.value_of("UNO"), Some(1));
        assert_eq!(numbers.value_of("décimo"), Some(10));
        assert_eq!(numbers.word_for(10), Some("diez"));
        assert_eq!(UnitTable::spanish_units().value_of("minutos"), Some(60));
    }

    #[test]
    fn loads_tables_and_normalizes_triggers() {
        let lex = Lexicon::from_documents(&general(), &[], "Teodoro").unwrap();
        assert_eq!(lex.names(), ["Teodoro", "Teo"]);
        assert_eq!(lex.triggers(Intent::Time), ["qué hora"]);
        assert!(lex.triggers(Intent::Play).is_empty());
        assert_eq!(lex.months().unwrap().value_of("marzo"), Some(3));
        assert_eq!(
            lex.missing_tables(),
            [MissingTable::SpotifyActions, MissingTable::MathOperations]
        );
    }

    #[test]
    fn missing_commands_is_fatal() {
        let general = vec![general().remove(0)];
        let err = Lexicon::from_documents(&general, &[], "Teodoro").unwrap_err();
        assert!(matches!(err, CoreError::FatalConfig(_)));
    }

    #[test]
    fn malformed_commands_is_fatal() {
        let general = vec![document(json!({"Commands": {"Time": "qué hora"}})).unwrap()];
        let err = Lexicon::from_documents(&general, &[], "Teodoro").unwrap_err();
        assert!(matches!(err, CoreError::FatalConfig(_)));
    }

    #[test]
    fn names_fall_back_to_default() {
        let general = vec![document(json!({"Commands": {}})).unwrap()];
        let lex = Lexicon::from_documents(&general, &[], "Teodoro").unwrap();
        assert_eq!(lex.names(), ["Teodoro"]);
        assert!(lex.missing_tables().contains(&MissingTable::Numbers));
    }

    #[test]
    fn math_operations_accept_list_and_table() {
        let list = json!([
            {"name": "suma", "keyword": "más", "operation": "+"},
            {"name": "rota", "keyword": "x"}
        ]);
        let ops = parse_math_operations(&list).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, MathOp::Add);

        let table = json!({"resta": {"keyword": "menos", "operation": "sub"}});
        let ops = parse_math_operations(&table).unwrap();
        assert_eq!(ops[0].name, "resta");
        assert_eq!(ops[0].op, MathOp::Sub);
    }
}
