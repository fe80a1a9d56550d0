//! Calendar queries and event creation.

use crate::collab::{CalendarEvent, EventStart};
use crate::extract::{parse_number, position, relative_day, resolve_date, token_at, tokenize};
use crate::lexicon::{MonthTable, NumberTable};
use crate::outcome::Reply;
use crate::session::CalendarIds;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};

pub const CALENDAR_FAILURE_SPEECH: &str = "Usted no tiene acceso a la API de Google Calendar";
pub const CALENDAR_FAILURE_DISPLAY: &str = "Gestione su acceso a la\nAPI de Google Calendar";
pub const DEFAULT_EVENT_NAME: &str = "Evento";

/// Which of the user's calendars a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    /// Personal calendar: "eventos".
    Events,
    /// Task board calendar: "tareas".
    Tasks,
}

impl CalendarKind {
    pub fn label(self) -> &'static str {
        match self {
            CalendarKind::Events => "eventos",
            CalendarKind::Tasks => "tareas",
        }
    }

    pub fn calendar_id(self, ids: &CalendarIds) -> Option<&str> {
        match self {
            CalendarKind::Events => ids.personal.as_deref(),
            CalendarKind::Tasks => ids.trello.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarRange {
    /// `days` days starting `offset` days from today.
    Relative { days: i64, offset: i64 },
    Day(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarQuery {
    pub kind: CalendarKind,
    pub range: CalendarRange,
    /// Spoken form of the range, e.g. "la próxima semana".
    pub when: String,
}

impl CalendarQuery {
    /// `[from, to)` window of the query, `None` when it leaves the representable dates.
    pub fn window(&self, today: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);
        let (from, days) = match self.range {
            CalendarRange::Relative { days, offset } => {
                (today.checked_add_signed(ChronoDuration::try_days(offset)?)?, days)
            }
            CalendarRange::Day(day) => (day, 1),
        };
        let to = from.checked_add_signed(ChronoDuration::try_days(days)?)?;
        Some((midnight(from), midnight(to)))
    }
}

/// `None` when the request names no usable range.
pub fn parse_query(
    transcript: &str,
    numbers: Option<&NumberTable>,
    months: Option<&MonthTable>,
    today: NaiveDate,
) -> Option<CalendarQuery> {
    let tokens = tokenize(transcript);
    let has = |w: &str| position(&tokens, w).is_some();
    let kind = if has("eventos") || has("calendario") {
        CalendarKind::Events
    } else {
        CalendarKind::Tasks
    };

    let (range, when) = if has("semanas") {
        let word = token_at(&tokens, "semanas", -1)?;
        let n = parse_number(word, numbers).ok().filter(|n| *n > 0)?;
        (
            CalendarRange::Relative { days: n.checked_mul(7)?, offset: 0 },
            format!("las próximas {} semanas", word),
        )
    } else if has("semana") {
        match token_at(&tokens, "semana", -1)? {
            "esta" => (
                CalendarRange::Relative { days: 7, offset: 0 },
                "esta semana".to_string(),
            ),
            "próxima" | "siguiente" => (
                CalendarRange::Relative { days: 7, offset: 7 },
                "la próxima semana".to_string(),
            ),
            _ => return None,
        }
    } else if has("meses") {
        let word = token_at(&tokens, "meses", -1)?;
        let n = parse_number(word, numbers).ok().filter(|n| *n > 0)?;
        (
            CalendarRange::Relative { days: n.checked_mul(30)?, offset: 0 },
            format!("los próximos {} meses", word),
        )
    } else if has("mes") {
        match token_at(&tokens, "mes", -1)? {
            "este" => (
                CalendarRange::Relative { days: 30, offset: 0 },
                "este mes".to_string(),
            ),
            "próximo" | "siguiente" => (
                CalendarRange::Relative { days: 30, offset: 30 },
                "el próximo mes".to_string(),
            ),
            _ => return None,
        }
    } else {
        let anchor = if has("para") {
            "para"
        } else if has("de") {
            "de"
        } else {
            return None;
        };
        let date = resolve_date(&tokens, anchor, numbers, months, today).ok()?;
        let when = match token_at(&tokens, anchor, 1).and_then(relative_day) {
            Some(0) => "hoy".to_string(),
            Some(1) => "mañana".to_string(),
            Some(_) => "pasado mañana".to_string(),
            None => format!(
                "el día {} de {} de {}",
                date.day(),
                months
                    .and_then(|m| m.word_for(date.month()))
                    .map(str::to_string)
                    .unwrap_or_else(|| date.month().to_string()),
                date.year()
            ),
        };
        (CalendarRange::Day(date), when)
    };

    let query = CalendarQuery { kind, range, when };
    query.window(today).map(|_| query)
}

pub fn events_reply(query: &CalendarQuery, events: &[CalendarEvent]) -> Reply {
    if events.is_empty() {
        let text = format!("No tienes nada para {}", query.when);
        return Reply::new(text.clone(), text);
    }
    let single_day = matches!(query.range, CalendarRange::Day(_));
    let lines: Vec<String> = events
        .iter()
        .map(|e| match &e.start {
            EventStart::At(at) if single_day => {
                format!("   -{} a las {}", e.summary, at.format("%H:%M"))
            }
            EventStart::At(at) => {
                format!("   -{} el día {}", e.summary, at.format("%d/%m/%Y a las %H:%M"))
            }
            EventStart::AllDay(day) => format!("   -{} el día {}", e.summary, day.format("%d/%m/%Y")),
        })
        .collect();
    Reply::new(
        format!("Tus {} para {} son:", query.kind.label(), query.when),
        lines.join("\n"),
    )
}

pub fn failure_reply() -> Reply {
    Reply::new(CALENDAR_FAILURE_SPEECH, CALENDAR_FAILURE_DISPLAY)
}

/// "cumpleaños de ana" to "Cumpleaños De Ana".
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers() -> NumberTable {
        NumberTable::from_pairs([("dos", 2), ("tres", 3), ("cinco", 5)])
    }

    fn months() -> MonthTable {
        MonthTable::from_pairs([("enero", 1), ("junio", 6)])
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn parse(q: &str) -> Option<CalendarQuery> {
        parse_query(q, Some(&numbers()), Some(&months()), today())
    }

    #[test]
    fn relative_ranges() {
        let q = parse("enséñame mis eventos de las próximas dos semanas").unwrap();
        assert_eq!(q.kind, CalendarKind::Events);
        assert_eq!(q.range, CalendarRange::Relative { days: 14, offset: 0 });

        let q = parse("muéstrame mis tareas de la próxima semana").unwrap();
        assert_eq!(q.kind, CalendarKind::Tasks);
        assert_eq!(q.range, CalendarRange::Relative { days: 7, offset: 7 });

        let q = parse("enséñame mi calendario de este mes").unwrap();
        assert_eq!(q.range, CalendarRange::Relative { days: 30, offset: 0 });
        assert_eq!(q.when, "este mes");
    }

    #[test]
    fn single_days() {
        let q = parse("enséñame mis eventos para mañana").unwrap();
        assert_eq!(q.range, CalendarRange::Day(NaiveDate::from_ymd_opt(2024, 6, 11).unwrap()));
        assert_eq!(q.when, "mañana");

        let q = parse("enséñame mis eventos para el cinco de enero").unwrap();
        assert_eq!(q.range, CalendarRange::Day(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        assert_eq!(q.when, "el día 5 de enero de 2024");
    }

    #[test]
    fn malformed_requests() {
        assert!(parse("enséñame mis eventos").is_none());
        assert!(parse("enséñame mis eventos de la otra semana").is_none());
        assert!(parse("enséñame mis eventos de muchas semanas").is_none());
    }

    #[test]
    fn out_of_range_counts_are_malformed() {
        assert!(parse("enséñame mis tareas para 20000000 semanas").is_none());
        assert!(parse("enséñame mis tareas para 9223372036854775807 meses").is_none());

        let far = CalendarQuery {
            kind: CalendarKind::Tasks,
            range: CalendarRange::Relative { days: 7, offset: i64::MAX / 2 },
            when: String::new(),
        };
        assert!(far.window(today()).is_none());
        let last = CalendarQuery {
            kind: CalendarKind::Events,
            range: CalendarRange::Day(NaiveDate::MAX),
            when: String::new(),
        };
        assert!(last.window(today()).is_none());
    }

    #[test]
    fn window_and_reply() {
        let q = parse("muéstrame mis tareas de la próxima semana").unwrap();
        let (from, to) = q.window(today()).unwrap();
        assert_eq!(from.date(), NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());
        assert_eq!((to - from).num_days(), 7);

        let empty = events_reply(&q, &[]);
        assert_eq!(empty.speech.as_deref(), Some("No tienes nada para la próxima semana"));

        let day = parse("enséñame mis eventos para hoy").unwrap();
        let at = today().and_hms_opt(10, 30, 0).unwrap();
        let reply = events_reply(
            &day,
            &[CalendarEvent {
                summary: "Dentista".into(),
                start: EventStart::At(at),
            }],
        );
        assert_eq!(reply.speech.as_deref(), Some("Tus eventos para hoy son:"));
        assert_eq!(reply.display.as_deref(), Some("   -Dentista a las 10:30"));
    }

    #[test]
    fn titles() {
        assert_eq!(title_case("cumpleaños de ana"), "Cumpleaños De Ana");
    }
}
