// src/storage/mod.rs
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::extractors::record::ExtractedRecord;
use crate::extractors::report::ExtractionMode;
use crate::utils::error::StorageError;

/// Summary of one batch run, written next to the records.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input_dir: String,
    pub mode: ExtractionMode,
    pub source: String,
    pub post_processed: bool,
    pub records_written: usize,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub file_path: String,
    pub error: String,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes the records as a pretty-printed JSON array.
    pub fn save_records(&self, file_name: &str, records: &[ExtractedRecord]) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(file_name);

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, json)
            .map_err(StorageError::IoError)?;

        tracing::info!("Saved {} records to {}", records.len(), file_path.display());

        Ok(file_path)
    }

    /// Reads a JSON array of records, e.g. the output of a previous batch run.
    pub fn load_records<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ExtractedRecord>, StorageError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(StorageError::IoError)?;

        let records: Vec<ExtractedRecord> = serde_json::from_str(&json)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Loaded {} records from {}", records.len(), path.display());

        Ok(records)
    }

    /// Saves metadata about the run in JSON format
    pub fn save_run_metadata(&self, file_name: &str, summary: &RunSummary) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(file_name);

        let metadata = serde_json::json!({
            "summary": summary,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str)
            .map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }

    /// Dumps the raw extracted text of a document under `debug/` for
    /// inspecting why a section was or wasn't found.
    ///
    /// The dump mirrors the document's path below `root` and keeps its full
    /// file name (`a/Brain_MRI_1.pdf` -> `debug/a/Brain_MRI_1.pdf.txt`), so
    /// documents sharing a stem never overwrite each other.
    pub fn save_raw_text(&self, root: &Path, source_path: &Path, text: &str) -> Result<PathBuf, StorageError> {
        let relative = source_path
            .strip_prefix(root)
            .ok()
            .filter(|rel| rel.file_name().is_some() && rel.components().all(|c| matches!(c, Component::Normal(_))))
            .map(Path::to_path_buf)
            .or_else(|| source_path.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("document"));

        let mut dump_name = relative.as_os_str().to_os_string();
        dump_name.push(".txt");
        let file_path = self.base_dir.join("debug").join(dump_name);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(StorageError::IoError)?;
        }

        fs::write(&file_path, text)
            .map_err(StorageError::IoError)?;

        tracing::debug!("Saved raw text to {}", file_path.display());

        Ok(file_path)
    }
}
