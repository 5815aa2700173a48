use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::NoteId;

/// Title given to notes saved without one.
pub const UNTITLED: &str = "Untitled";

/// A study note.
///
/// Title, text and creation time never change once a note exists. The ID
/// changes exactly once at most, when the local ID is reconciled with the
/// remote row ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    title: String,
    text: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl Note {
    pub fn id(&self) -> &NoteId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub(crate) fn set_id(&mut self, id: NoteId) {
        self.id = id;
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use ssp::NoteBuilder;
///
/// let note = NoteBuilder::new()
///     .id("1")
///     .title("   ")
///     .text("Mitosis notes")
///     .build();
///
/// assert_eq!(note.id().as_str(), "1");
/// assert_eq!(note.title(), "Untitled");
/// assert_eq!(note.text(), "Mitosis notes");
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    title: Option<String>,
    text: Option<String>,
    created_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: impl Into<NoteId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the title. Blank titles become [`UNTITLED`].
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the note body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the `Note`.
    ///
    /// Missing timestamps default to the current time truncated to whole
    /// milliseconds; a missing ID is derived from that timestamp.
    pub fn build(self) -> Note {
        let created_at = self.created_at.unwrap_or_else(now_millis);
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        Note {
            id: self
                .id
                .unwrap_or_else(|| NoteId::from_timestamp(created_at)),
            title,
            text: self.text.unwrap_or_default(),
            created_at,
        }
    }
}

/// The current UTC time at millisecond precision.
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}
