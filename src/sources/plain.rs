// src/sources/plain.rs
use std::path::Path;

use super::{has_extension, TextSource};
use crate::utils::error::SourceError;

/// Reads report text that was already extracted to `.txt` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl PlainTextSource {
    pub fn new() -> Self {
        Self
    }
}

impl TextSource for PlainTextSource {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }

    fn read_text(&self, path: &Path) -> Result<String, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Read {} bytes of text from {}", text.len(), path.display());
        Ok(text)
    }
}
