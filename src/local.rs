//! Local note collection.
//!
//! The whole collection is one JSON array stored under a single key of the
//! key-value [`Database`]. Every mutation reads, modifies and rewrites the full
//! array, which is fine for a personal note list.

use thiserror::Error;

use crate::Database;
use crate::models::{Note, NoteId};

/// Storage key holding the serialized note collection.
pub const NOTES_KEY: &str = "ssp_notes";

/// Errors raised while writing the local collection.
///
/// Reads never fail: unreadable or undecodable data is treated as an empty
/// collection.
#[derive(Debug, Error)]
pub enum LocalError {
    #[error("Local storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to encode notes: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Ordered, newest-first list of notes kept in durable local storage.
pub struct LocalCollection {
    db: Database,
    key: String,
}

impl LocalCollection {
    /// Creates a collection stored under [`NOTES_KEY`].
    pub fn new(db: Database) -> Self {
        Self::with_key(db, NOTES_KEY)
    }

    /// Creates a collection stored under a custom key.
    pub fn with_key(db: Database, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }

    /// Returns every stored note, newest first.
    ///
    /// Returns an empty list if nothing has been stored yet or the stored
    /// value cannot be read or decoded.
    pub fn list(&self) -> Vec<Note> {
        let raw = match self.db.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read local notes");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(notes) => notes,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to decode local notes");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Looks up a note by ID.
    pub fn find(&self, id: &NoteId) -> Option<Note> {
        self.list().into_iter().find(|n| n.id() == id)
    }

    /// Prepends `note` and persists the collection.
    ///
    /// IDs are not checked for duplicates; callers hand in freshly generated IDs.
    pub fn insert_first(&self, note: Note) -> Result<(), LocalError> {
        let mut notes = self.list();
        notes.insert(0, note);
        self.save_all(&notes)
    }

    /// Removes every note with the given ID. Absent IDs are a no-op.
    pub fn remove_by_id(&self, id: &NoteId) -> Result<(), LocalError> {
        let mut notes = self.list();
        let before = notes.len();
        notes.retain(|n| n.id() != id);
        if notes.len() == before {
            return Ok(());
        }
        self.save_all(&notes)
    }

    /// Replaces the ID of the note identified by `old` with `new`, keeping its
    /// position and other fields. Returns `false` if no note matched.
    pub fn update_id(&self, old: &NoteId, new: &NoteId) -> Result<bool, LocalError> {
        let mut notes = self.list();
        let Some(note) = notes.iter_mut().find(|n| n.id() == old) else {
            return Ok(false);
        };
        note.set_id(new.clone());
        self.save_all(&notes)?;
        Ok(true)
    }

    /// Returns a reference to the backing database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn save_all(&self, notes: &[Note]) -> Result<(), LocalError> {
        let raw = serde_json::to_string(notes)?;
        self.db.set(&self.key, &raw)?;
        Ok(())
    }
}
