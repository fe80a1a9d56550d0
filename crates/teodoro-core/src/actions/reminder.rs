//! Persisted single-shot reminders.

use crate::error::{CoreError, CoreResult};
use crate::outcome::Reply;
use crate::store::{DocumentStore, Filter, REMINDERS};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_REMINDER_NAME: &str = "Recordatorio";

/// Stored shape of a "Reminders" document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(rename = "usuario")]
    pub owner: String,
    #[serde(rename = "nombre")]
    pub name: String,
    /// YYYY-MM-DD
    #[serde(rename = "día")]
    pub date: String,
    /// HH:MM
    #[serde(rename = "hora")]
    pub time: String,
}

impl Reminder {
    fn filter(&self) -> Filter {
        Filter::eq("usuario", self.owner.as_str())
            .and("nombre", self.name.as_str())
            .and("día", self.date.as_str())
            .and("hora", self.time.as_str())
    }

    pub fn created_reply(&self) -> Reply {
        Reply::new(
            "Recordatorio creado",
            format!("Recordatorio de nombre: {}\ncreado correctamente", self.name),
        )
    }

    pub fn due_reply(&self) -> Reply {
        Reply::new(
            format!("Tienes un recordatorio para esta hora de nombre {}", self.name),
            format!("Recordatorio {}", self.name),
        )
    }
}

pub struct ReminderBook<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ReminderBook<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn create(&self, reminder: &Reminder) -> CoreResult<String> {
        let doc = match serde_json::to_value(reminder)? {
            Value::Object(doc) => doc,
            _ => return Err(CoreError::fatal("reminder did not serialize to an object")),
        };
        let id = self.store.insert_one(REMINDERS, doc)?;
        tracing::info!(
            target: "teodoro::reminder",
            user = %reminder.owner,
            date = %reminder.date,
            time = %reminder.time,
            "Reminder stored"
        );
        Ok(id)
    }

    pub fn for_user(&self, user: &str) -> CoreResult<Vec<Reminder>> {
        let docs = self.store.find_many(REMINDERS, &Filter::eq("usuario", user))?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<Reminder>(Value::Object(doc)) {
                Ok(r) => out.push(r),
                Err(e) => tracing::warn!(target: "teodoro::reminder", error = %e, "Skipping malformed reminder"),
            }
        }
        Ok(out)
    }

    /// Reminders of `user` due at `now`. Due and expired reminders are deleted; only the due
    /// ones are returned.
    pub fn check_due(&self, user: &str, now: NaiveDateTime) -> CoreResult<Vec<Reminder>> {
        let today = now.format("%Y-%m-%d").to_string();
        let hour = now.format("%H:%M").to_string();
        let mut due = Vec::new();
        for reminder in self.for_user(user)? {
            if reminder.date == today && reminder.time <= hour {
                self.store.delete_one(REMINDERS, &reminder.filter())?;
                due.push(reminder);
            } else if reminder.date < today {
                self.store.delete_one(REMINDERS, &reminder.filter())?;
                tracing::debug!(target: "teodoro::reminder", name = %reminder.name, "Expired reminder dropped");
            }
        }
        Ok(due)
    }
}
