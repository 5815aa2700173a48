use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;

/// Identifier of a note.
///
/// Starts life as a locally generated millisecond timestamp and is replaced
/// by the remote row id once the note has been written to the remote table.
/// Both forms are plain strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Creates a note ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a local note ID from the millisecond component of `at`.
    pub fn from_timestamp(at: OffsetDateTime) -> Self {
        Self(unix_millis(at).to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Hands out timestamp-derived local note IDs.
///
/// IDs are the creation time in Unix milliseconds, bumped by one whenever two
/// notes are created within the same millisecond so that every ID issued by
/// one generator is distinct.
#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    /// Creates a generator that has not issued any IDs yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh ID for a note created at `at`.
    pub fn next_id(&self, at: OffsetDateTime) -> NoteId {
        let millis = unix_millis(at);
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = if millis > prev { millis } else { prev + 1 };
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return NoteId::new(candidate.to_string()),
                Err(actual) => prev = actual,
            }
        }
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
