use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::models::{Note, NoteBuilder, NoteId};

/// A row of the remote `notes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRow {
    /// Server-assigned ID. Integer and string IDs are both accepted.
    #[serde(deserialize_with = "deserialize_row_id")]
    pub id: NoteId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(
        serialize_with = "time::serde::rfc3339::serialize",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: OffsetDateTime,
}

impl RemoteRow {
    /// Converts the row into the note shape shown to the user.
    pub fn into_note(self) -> Note {
        NoteBuilder::new()
            .id(self.id)
            .title(self.title)
            .text(self.content)
            .created_at(self.created_at)
            .build()
    }
}

/// Body of an insert request. The server assigns the ID.
#[derive(Debug, Serialize)]
pub struct NewRow<'a> {
    pub title: &'a str,
    pub content: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'a> From<&'a Note> for NewRow<'a> {
    fn from(note: &'a Note) -> Self {
        Self {
            title: note.title(),
            content: note.text(),
            created_at: note.created_at(),
        }
    }
}

fn deserialize_row_id<'de, D>(deserializer: D) -> Result<NoteId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => NoteId::new(n.to_string()),
        RawId::Text(s) => NoteId::new(s),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 timestamps and, for `timestamp without time zone`
/// columns, offset-less ISO timestamps interpreted as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = OffsetDateTime::parse(&raw, &Rfc3339) {
        return Ok(at);
    }

    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(&raw, &naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accepts_integer_ids() {
        let row: RemoteRow = serde_json::from_str(
            r#"{"id": 17, "title": "T", "content": "C", "created_at": "2024-03-01T12:00:00+00:00"}"#,
        )
        .unwrap();

        assert_eq!(row.id.as_str(), "17");
        assert_eq!(row.created_at, datetime!(2024-03-01 12:00:00 UTC));
    }

    #[test]
    fn accepts_uuid_ids() {
        let row: RemoteRow = serde_json::from_str(
            r#"{"id": "7d0c6f1e-1111-2222-3333-444455556666", "title": "T", "content": "C", "created_at": "2024-03-01T12:00:00.123Z"}"#,
        )
        .unwrap();

        assert_eq!(row.id.as_str(), "7d0c6f1e-1111-2222-3333-444455556666");
    }

    #[test]
    fn accepts_timestamps_without_offset() {
        let row: RemoteRow = serde_json::from_str(
            r#"{"id": 1, "title": "T", "content": "C", "created_at": "2024-03-01T12:00:00.25"}"#,
        )
        .unwrap();

        assert_eq!(row.created_at, datetime!(2024-03-01 12:00:00.25 UTC));
    }

    #[test]
    fn null_text_columns_become_empty() {
        let row: RemoteRow = serde_json::from_str(
            r#"{"id": 1, "title": null, "content": null, "created_at": "2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(row.title, "");
        assert_eq!(row.content, "");
        assert_eq!(row.into_note().title(), "Untitled");
    }

    #[test]
    fn into_note_maps_content_to_text() {
        let row = RemoteRow {
            id: NoteId::new("r1"),
            title: "Biology".to_string(),
            content: "Mitosis notes".to_string(),
            created_at: datetime!(2024-03-01 12:00:00 UTC),
        };

        let note = row.into_note();
        assert_eq!(note.id().as_str(), "r1");
        assert_eq!(note.title(), "Biology");
        assert_eq!(note.text(), "Mitosis notes");
    }

    #[test]
    fn new_row_uses_remote_column_names() {
        let note = NoteBuilder::new()
            .id("1")
            .title("Biology")
            .text("Mitosis notes")
            .created_at(datetime!(2024-03-01 12:00:00 UTC))
            .build();

        let value = serde_json::to_value(NewRow::from(&note)).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "title": "Biology",
                "content": "Mitosis notes",
                "created_at": "2024-03-01T12:00:00Z"
            })
        );
    }
}
