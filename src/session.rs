//! Per-user session state: the selected note, the activity log and the
//! statistics derived from it.
//!
//! Kept in the key-value database next to the notes so that separate CLI
//! invocations see the same selection and history.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Database;
use crate::local::LocalError;
use crate::models::{Note, NoteId};

/// Storage key of the selected note.
pub const SELECTED_KEY: &str = "ssp_selected";
/// Storage key of the activity log.
pub const ACTIVITY_KEY: &str = "ssp_activity";
/// Maximum number of activity entries kept.
pub const ACTIVITY_LIMIT: usize = 100;

/// The note currently used as chat context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedNote {
    pub id: NoteId,
    pub title: String,
    pub text: String,
}

impl From<&Note> for SelectedNote {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id().clone(),
            title: note.title().to_string(),
            text: note.text().to_string(),
        }
    }
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub text: String,
}

/// Figures shown in the statistics panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub focus_percent: u8,
    pub topics: usize,
    pub interactions: usize,
}

/// Focus score for a number of recorded interactions.
///
/// Zero without interactions, otherwise `35 + 5n` capped at 99.
pub fn focus_percent(interactions: usize) -> u8 {
    if interactions == 0 {
        return 0;
    }
    interactions.saturating_mul(5).saturating_add(35).min(99) as u8
}

pub struct Session {
    db: Database,
}

impl Session {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Makes `note` the chat context.
    pub fn select(&self, note: &Note) -> Result<SelectedNote, LocalError> {
        let selected = SelectedNote::from(note);
        write_json(&self.db, SELECTED_KEY, &selected)?;
        Ok(selected)
    }

    pub fn selected(&self) -> Option<SelectedNote> {
        read_json(&self.db, SELECTED_KEY)
    }

    /// Text of the selected note, or an empty string when nothing is selected.
    pub fn selected_text(&self) -> String {
        self.selected().map(|s| s.text).unwrap_or_default()
    }

    /// Clears the selection if it points at `id`. Returns whether it did.
    pub fn clear_selection_if(&self, id: &NoteId) -> Result<bool, LocalError> {
        match self.selected() {
            Some(selected) if &selected.id == id => {
                self.db.remove(SELECTED_KEY)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Prepends an entry to the activity log.
    pub fn record(&self, text: impl Into<String>) -> Result<(), LocalError> {
        let mut entries: Vec<ActivityEntry> = read_json(&self.db, ACTIVITY_KEY).unwrap_or_default();
        entries.insert(
            0,
            ActivityEntry {
                at: OffsetDateTime::now_utc(),
                text: text.into(),
            },
        );
        entries.truncate(ACTIVITY_LIMIT);
        write_json(&self.db, ACTIVITY_KEY, &entries)
    }

    /// Returns up to `limit` activity entries, newest first.
    pub fn activity(&self, limit: usize) -> Vec<ActivityEntry> {
        let mut entries: Vec<ActivityEntry> = read_json(&self.db, ACTIVITY_KEY).unwrap_or_default();
        entries.truncate(limit);
        entries
    }

    pub fn interactions(&self) -> usize {
        self.activity(ACTIVITY_LIMIT).len()
    }

    /// Statistics for a collection of `topics` notes.
    pub fn stats(&self, topics: usize) -> Stats {
        let interactions = self.interactions();
        Stats {
            focus_percent: focus_percent(interactions),
            topics,
            interactions,
        }
    }
}

fn read_json<T: DeserializeOwned>(db: &Database, key: &str) -> Option<T> {
    let raw = match db.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read session state");
            return None;
        }
    };
    serde_json::from_str(&raw)
        .inspect_err(|e| tracing::warn!(key, error = %e, "failed to decode session state"))
        .ok()
}

fn write_json<T: Serialize>(db: &Database, key: &str, value: &T) -> Result<(), LocalError> {
    let raw = serde_json::to_string(value)?;
    db.set(key, &raw)?;
    Ok(())
}
