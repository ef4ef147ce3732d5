//! Selecting the reminders that are due at an evaluation instant.

use crate::reminder::{Binding, Category};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One notification to send: a due reminder for one subject, with the tokens
/// of every user bound to that pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueNotification {
    pub category: Category,
    pub reminder_id: String,
    pub subject_id: String,
    pub title: String,
    pub body: String,
    pub tokens: Vec<String>,
}

/// Keeps the bindings that are due at `now` and merges them per
/// (reminder, subject), in order of first appearance.
pub fn select_due(
    bindings: impl IntoIterator<Item = Binding>,
    now: DateTime<Utc>,
) -> Vec<DueNotification> {
    let mut due: Vec<DueNotification> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for binding in bindings.into_iter().filter(|b| b.is_due(now)) {
        let key = (binding.reminder.id.clone(), binding.subject.id.clone());
        match index.get(&key) {
            Some(&idx) => due[idx].tokens.extend(binding.tokens),
            None => {
                index.insert(key, due.len());
                due.push(DueNotification {
                    category: binding.category,
                    reminder_id: binding.reminder.id,
                    subject_id: binding.subject.id,
                    title: binding.subject.title,
                    body: binding.reminder.body,
                    tokens: binding.tokens,
                });
            }
        }
    }

    due.retain(|notification| !notification.tokens.is_empty());
    due
}
