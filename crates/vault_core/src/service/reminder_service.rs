//! Reminder use-case service.
//!
//! Scheduling platform notifications is the shell's job; this service keeps
//! reminder records and answers which ones are due.

use super::{require_text, ServiceResult};
use crate::model::reminder::Reminder;
use crate::model::timestamp::format_timestamp;
use crate::repo::RecordCollection;
use crate::store::Store;
use chrono::{DateTime, Utc};
use log::warn;

#[derive(Clone)]
pub struct ReminderService {
    reminders: RecordCollection<Reminder>,
}

impl ReminderService {
    pub fn open(store: &Store) -> ServiceResult<Self> {
        Ok(Self {
            reminders: RecordCollection::open(store)?,
        })
    }

    pub fn collection(&self) -> &RecordCollection<Reminder> {
        &self.reminders
    }

    pub fn schedule(
        &self,
        title: &str,
        due_at: DateTime<Utc>,
        record_id: Option<String>,
    ) -> ServiceResult<Reminder> {
        let title = require_text("reminder title", title)?;
        Ok(self.reminders.insert_front(Reminder {
            id: String::new(),
            title,
            due_at: format_timestamp(due_at),
            done: false,
            record_id,
        })?)
    }

    pub fn reschedule(&self, id: &str, due_at: DateTime<Utc>) -> ServiceResult<Reminder> {
        Ok(self.reminders.modify(id, |reminder| {
            reminder.due_at = format_timestamp(due_at);
            reminder.done = false;
        })?)
    }

    pub fn complete(&self, id: &str) -> ServiceResult<Reminder> {
        Ok(self.reminders.modify(id, |reminder| reminder.done = true)?)
    }

    pub fn delete(&self, id: &str) -> ServiceResult<Reminder> {
        Ok(self.reminders.remove(id)?)
    }

    /// All reminders, soonest first; unparseable due times sort last.
    pub fn list_reminders(&self) -> Vec<Reminder> {
        let mut reminders = self.reminders.all();
        reminders.sort_by_key(|reminder| {
            let due = reminder.due_at().ok();
            (due.is_none(), due)
        });
        reminders
    }

    /// Open reminders due at or before `now`, soonest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.list_reminders()
            .into_iter()
            .filter(|reminder| !reminder.done)
            .filter(|reminder| match reminder.due_at() {
                Ok(due_at) => due_at <= now,
                Err(err) => {
                    warn!(
                        "event=reminder_due module=service status=skipped id={} error={err}",
                        reminder.id
                    );
                    false
                }
            })
            .collect()
    }
}
