//! Time, date and name replies.

use crate::lexicon::MonthTable;
use crate::outcome::Reply;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

pub fn tell_time(now: NaiveDateTime) -> Reply {
    Reply::new(
        format!(
            "Son las {} horas y {} minutos",
            now.format("%H"),
            now.format("%M")
        ),
        now.format("%H:%M").to_string(),
    )
}

/// `None` when the tables lack the current weekday or month.
pub fn tell_day(today: NaiveDate, days: &[String], months: &MonthTable) -> Option<Reply> {
    let day = days.get(today.weekday().num_days_from_monday() as usize)?;
    let month = months.word_for(today.month())?;
    Some(Reply::new(
        format!(
            "Hoy es {}, {:02} de {} de {}",
            day,
            today.day(),
            month,
            today.year()
        ),
        format!(
            "{}, {:02} de\n{} de {}",
            day,
            today.day(),
            month,
            today.year()
        ),
    ))
}

pub fn tell_names(names: &[String]) -> Reply {
    Reply::new(
        format!("Me puedes llamar {}, tu asistente fiel", names.join(", o ")),
        names.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_speaks_hours_and_minutes() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 3)
            .unwrap()
            .and_hms_opt(9, 7, 0)
            .unwrap();
        let reply = tell_time(now);
        assert_eq!(reply.speech.as_deref(), Some("Son las 09 horas y 07 minutos"));
        assert_eq!(reply.display.as_deref(), Some("09:07"));
    }

    #[test]
    fn day_uses_locale_tables() {
        let days: Vec<String> = ["lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let months = MonthTable::from_pairs([("abril", 4), ("mayo", 5)]);
        let friday = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let reply = tell_day(friday, &days, &months).unwrap();
        assert_eq!(reply.speech.as_deref(), Some("Hoy es viernes, 03 de mayo de 2024"));

        let june = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert!(tell_day(june, &days, &months).is_none());
    }

    #[test]
    fn names_are_listed() {
        let reply = tell_names(&["Teodoro".to_string(), "Teo".to_string()]);
        assert_eq!(
            reply.speech.as_deref(),
            Some("Me puedes llamar Teodoro, o Teo, tu asistente fiel")
        );
    }
}
