// src/sources/mod.rs
use std::path::Path;

use crate::utils::error::SourceError;

pub mod pdf;
pub mod plain;

pub use pdf::PdfTextSource;
pub use plain::PlainTextSource;

/// Produces the plain text of one report document.
///
/// Implementations are shared across worker threads during batch runs.
pub trait TextSource: Send + Sync {
    /// Short name used in logs and run metadata.
    fn name(&self) -> &'static str;

    /// Whether this source can read the given file (by extension).
    fn accepts(&self, path: &Path) -> bool;

    fn read_text(&self, path: &Path) -> Result<String, SourceError>;
}

/// Which upstream text extractor to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    /// Text layer of PDF reports.
    #[default]
    Pdf,
    /// Pre-extracted `.txt` files.
    Text,
}

impl SourceKind {
    pub fn build(self) -> Box<dyn TextSource> {
        match self {
            SourceKind::Pdf => Box::new(PdfTextSource::new()),
            SourceKind::Text => Box::new(PlainTextSource::new()),
        }
    }
}

/// Case-insensitive extension check shared by the sources.
pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}
