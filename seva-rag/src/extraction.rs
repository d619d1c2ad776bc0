//! Text extraction from source PDFs.
//!
//! Extraction failures are per-document: callers skip the failing file and
//! keep going.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// A source file queued for extraction, paired with its logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path to the file on disk.
    pub path: PathBuf,
    /// Logical document name (the file stem).
    pub document_name: String,
}

/// Turns a source file into raw text.
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the file at `path`.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// A [`TextExtractor`] for PDF files backed by the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let document = document_name(path);
        debug!(document = %document, path = %path.display(), "extracting pdf text");

        // pdf-extract panics on some malformed files; treat that as a failed extraction.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)));
        match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(RagError::Extraction { document, message: e.to_string() }),
            Err(_) => Err(RagError::Extraction {
                document,
                message: "pdf parser panicked".to_string(),
            }),
        }
    }
}

/// List the PDF files directly inside `dir`, sorted by path.
///
/// The extension match is case-insensitive.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] if the directory cannot be read.
pub fn collect_sources(dir: &Path) -> Result<Vec<SourceFile>> {
    let entries = fs::read_dir(dir).map_err(|e| RagError::Extraction {
        document: dir.display().to_string(),
        message: format!("failed to read directory: {e}"),
    })?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            sources.push(SourceFile { document_name: document_name(&path), path });
        }
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

fn document_name(path: &Path) -> String {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}
