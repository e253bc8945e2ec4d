// src/sources/pdf.rs
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use super::{has_extension, TextSource};
use crate::utils::error::SourceError;

/// Pulls the text layer out of report PDFs with `pdf-extract`.
///
/// Scanned PDFs without a text layer come back as (nearly) empty text,
/// which the extractor turns into an empty record.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextSource;

impl PdfTextSource {
    pub fn new() -> Self {
        Self
    }
}

impl TextSource for PdfTextSource {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "pdf")
    }

    fn read_text(&self, path: &Path) -> Result<String, SourceError> {
        tracing::debug!("Extracting PDF text from {}", path.display());

        let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // pdf-extract panics on some malformed documents; keep that per-file.
        let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)))
            .map_err(|payload| SourceError::Panicked {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            })?;

        let text = result.map_err(|e| SourceError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if text.trim().is_empty() {
            tracing::warn!("No text layer found in {} (scanned image?)", path.display());
        }

        Ok(text)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
