//! Turning files into note title/text pairs.
//!
//! Text and markdown files are read as-is, images become a placeholder line,
//! and PDFs are converted by shelling out to poppler's `pdftotext`.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// Image extensions accepted as attachments.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File type not supported for automatic text extraction: {name}")]
    Unsupported { name: String },

    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
}

impl ImportError {
    /// Whether the error was caused by the user's choice of file.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// How a file's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Text,
    Image,
    Pdf,
}

/// Title and body extracted from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNote {
    pub file_name: String,
    pub title: String,
    pub text: String,
    pub kind: ImportKind,
}

/// Determines the import kind from the file extension, case-insensitively.
pub fn classify(path: &Path) -> Option<ImportKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" => Some(ImportKind::Text),
        "pdf" => Some(ImportKind::Pdf),
        e if IMAGE_EXTENSIONS.contains(&e) => Some(ImportKind::Image),
        _ => None,
    }
}

/// Reads `path` into an [`ImportedNote`] titled after the file stem.
pub fn import_file(path: &Path) -> Result<ImportedNote, ImportError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picked-file".to_string());

    let kind = classify(path).ok_or_else(|| ImportError::Unsupported {
        name: file_name.clone(),
    })?;

    let read_error = |source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    };

    let text = match kind {
        ImportKind::Text => {
            let bytes = std::fs::read(path).map_err(read_error)?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        ImportKind::Image => {
            std::fs::metadata(path).map_err(read_error)?;
            format!("[Image attached: {file_name}]")
        }
        ImportKind::Pdf => {
            std::fs::metadata(path).map_err(read_error)?;
            extract_pdf_text(path)?
        }
    };

    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());

    tracing::info!(file = %file_name, kind = ?kind, bytes = text.len(), "file imported");
    Ok(ImportedNote {
        file_name,
        title,
        text,
        kind,
    })
}

/// Extracts the text of every page, one page per block.
///
/// Runs `pdftotext`, or the program named by `SSP_PDFTOTEXT`.
fn extract_pdf_text(path: &Path) -> Result<String, ImportError> {
    let _span = tracing::info_span!("extract_pdf_text", path = %path.display()).entered();

    let program = std::env::var("SSP_PDFTOTEXT").unwrap_or_else(|_| "pdftotext".to_string());
    let output = Command::new(&program)
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| ImportError::Pdf(format!("could not run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(stderr = %stderr, "PDF conversion failed");
        return Err(ImportError::Pdf(stderr.trim().to_string()));
    }

    // Pages are separated by form feeds.
    let text = String::from_utf8_lossy(&output.stdout).replace('\u{c}', "\n");
    if text.trim().is_empty() {
        tracing::warn!("PDF produced no text (possibly image-only)");
        return Err(ImportError::Pdf("no text found".to_string()));
    }
    Ok(text)
}
