//! Writing notes out of the app: the JSON backup of the whole collection and
//! the single-note download in text or document form.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::models::Note;

/// File name used when exporting without an explicit path.
pub const DEFAULT_EXPORT_FILE: &str = "my-notes.json";

/// Download format for a single note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteFormat {
    #[default]
    Txt,
    /// An HTML document word processors open as `.doc`.
    Doc,
}

impl NoteFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Doc => "doc",
        }
    }

    /// Parses a format name case-insensitively. Anything unknown is plain text.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("doc") {
            Self::Doc
        } else {
            Self::Txt
        }
    }
}

impl FromStr for NoteFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for NoteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes `notes` to `path` as a pretty-printed JSON array.
///
/// The file is written next to its destination and renamed into place, so a
/// failed export never leaves a truncated file behind.
pub fn export_notes(notes: &[Note], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(notes).context("Failed to encode notes")?;
    write_atomically(path, json.as_bytes())?;
    tracing::info!(path = %path.display(), count = notes.len(), "notes exported");
    Ok(())
}

/// Renders a note body in the given format.
pub fn render_note(title: &str, text: &str, format: NoteFormat) -> String {
    match format {
        NoteFormat::Txt => text.to_string(),
        NoteFormat::Doc => {
            let title = escape_html(title);
            format!(
                "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
                 <body><h1>{title}</h1>\
                 <pre style=\"white-space:pre-wrap;font-family:inherit\">{}</pre>\
                 </body></html>",
                escape_html(text)
            )
        }
    }
}

/// File name for a downloaded note.
///
/// ```
/// use ssp::export::{download_file_name, NoteFormat};
///
/// assert_eq!(download_file_name("Cell/Bio: 1", NoteFormat::Txt), "CellBio 1.txt");
/// assert_eq!(download_file_name("///", NoteFormat::Doc), "note.doc");
/// ```
pub fn download_file_name(title: &str, format: NoteFormat) -> String {
    let stem: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let stem = if stem.is_empty() { "note" } else { stem.as_str() };
    format!("{stem}.{}", format.extension())
}

/// Writes a rendered note into `dir` and returns the file's path.
pub fn write_note_file(dir: &Path, title: &str, text: &str, format: NoteFormat) -> Result<PathBuf> {
    let path = dir.join(download_file_name(title, format));
    write_atomically(&path, render_note(title, text, format).as_bytes())?;
    tracing::debug!(path = %path.display(), "note file written");
    Ok(path)
}

/// Escapes the characters that are significant in HTML text and attributes.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Failed to move export into place at {}", path.display()))?;
    Ok(())
}
