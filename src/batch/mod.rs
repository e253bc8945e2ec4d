// src/batch/mod.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::{DirEntry, WalkDir};

use crate::extractors::{ExtractedRecord, PostProcessor, ReportFieldExtractor};
use crate::sources::TextSource;
use crate::storage::StorageManager;
use crate::utils::error::{BatchError, SourceError};

const DEFAULT_CONCURRENCY: usize = 4;

/// A document that could not be turned into a record.
#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: SourceError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Extracted records, sorted by source path.
    pub records: Vec<ExtractedRecord>,
    pub failures: Vec<BatchFailure>,
}

/// Extracts every report under a directory.
///
/// Documents are independent: each one is read and parsed on tokio's
/// blocking pool, and a failing document is logged and left out of the
/// output instead of aborting the run.
pub struct BatchRunner {
    source: Arc<dyn TextSource>,
    extractor: ReportFieldExtractor,
    concurrency: usize,
    post_process: bool,
    debug_storage: Option<Arc<StorageManager>>,
}

impl BatchRunner {
    pub fn new(source: Arc<dyn TextSource>, extractor: ReportFieldExtractor) -> Self {
        Self {
            source,
            extractor,
            concurrency: DEFAULT_CONCURRENCY,
            post_process: false,
            debug_storage: None,
        }
    }

    /// Maximum number of documents processed at once (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.post_process = enabled;
        self
    }

    /// Save the raw text of every document for debugging.
    pub fn with_debug_dumps(mut self, storage: Arc<StorageManager>) -> Self {
        self.debug_storage = Some(storage);
        self
    }

    /// Files under `root` the configured source can read, in path order.
    /// Hidden files and directories are skipped.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, BatchError> {
        if !root.exists() {
            return Err(BatchError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(BatchError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.source.accepts(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        files.sort();
        tracing::info!("Found {} {} files under {}", files.len(), self.source.name(), root.display());
        Ok(files)
    }

    pub async fn run(&self, root: &Path) -> Result<BatchOutcome, BatchError> {
        let files = self.discover(root)?;
        tracing::info!(
            "Extracting {} documents ({:?} mode, {} at a time)",
            files.len(),
            self.extractor.mode(),
            self.concurrency
        );
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for path in files {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let extractor = self.extractor;
            let post_process = self.post_process;
            let debug_storage = self.debug_storage.clone();
            let root = root.to_path_buf();

            tasks.spawn(async move {
                // The semaphore is never closed, so this only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                let task_path = path.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    process_document(source.as_ref(), extractor, post_process, debug_storage.as_deref(), &root, &task_path)
                })
                .await;

                let result = joined.unwrap_or_else(|e| {
                    Err(SourceError::Panicked {
                        path: path.clone(),
                        message: e.to_string(),
                    })
                });
                (path, result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(record))) => outcome.records.push(record),
                Ok((path, Err(error))) => {
                    tracing::error!("Failed to process {}: {}", path.display(), error);
                    outcome.failures.push(BatchFailure { path, error });
                }
                Err(e) => {
                    // Only reachable if the task itself was cancelled.
                    tracing::error!("Batch task aborted: {}", e);
                }
            }
        }

        outcome.records.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        outcome.failures.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            "Batch finished. Success: {}, Failures: {}",
            outcome.records.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }
}

fn process_document(
    source: &dyn TextSource,
    extractor: ReportFieldExtractor,
    post_process: bool,
    debug_storage: Option<&StorageManager>,
    root: &Path,
    path: &Path,
) -> Result<ExtractedRecord, SourceError> {
    let text = source.read_text(path)?;

    if let Some(storage) = debug_storage {
        if let Err(e) = storage.save_raw_text(root, path, &text) {
            tracing::warn!("Failed to save debug text for {}: {}", path.display(), e);
        }
    }

    let record = extractor.extract(&text, &path.to_string_lossy());
    if record.is_empty() {
        tracing::warn!("No fields found in {}", path.display());
    }
    if post_process {
        Ok(PostProcessor::new().process(&record))
    } else {
        Ok(record)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionMode;
    use crate::sources::PlainTextSource;
    use std::fs;

    const VALID_REPORT: &str = "Age: 38.\nSex: Female.\nRace: White.\nREPORT\nNormal brain parenchyma.\nCONCLUSION\nNo tumor.\nRECOMMENDATIONS\nNone.\nYear of study and report: 2020\n";

    fn runner() -> BatchRunner {
        BatchRunner::new(
            Arc::new(PlainTextSource::new()),
            ReportFieldExtractor::new(ExtractionMode::LineState),
        )
        .with_concurrency(2)
    }

    fn populate(dir: &Path, valid: usize) {
        fs::create_dir_all(dir.join("nested")).unwrap();
        for i in 0..valid {
            let sub = if i % 2 == 0 { dir.to_path_buf() } else { dir.join("nested") };
            fs::write(sub.join(format!("Brain_MRI_{}.txt", i)), VALID_REPORT).unwrap();
        }
    }

    #[test]
    fn test_one_corrupt_file_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 3);
        fs::write(dir.path().join("corrupt.txt"), [0xffu8, 0xfe, 0xfd]).unwrap();

        let outcome = tokio_test::block_on(runner().run(dir.path())).unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].path.ends_with("corrupt.txt"));
        for record in &outcome.records {
            assert_eq!(record.conclusion.as_deref(), Some("No tumor."));
            assert_eq!(record.year_of_study.as_deref(), Some("2020"));
        }
    }

    #[test]
    fn test_records_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 5);

        let outcome = tokio_test::block_on(runner().with_concurrency(8).run(dir.path())).unwrap();

        let paths: Vec<&str> = outcome.records.iter().map(|r| r.source_path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn test_discover_skips_hidden_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), 2);
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache").join("old.txt"), VALID_REPORT).unwrap();
        fs::write(dir.path().join("scan.pdf"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("notes.TXT"), "REPORT\nx").unwrap();

        let files = runner().discover(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(files.len(), 3, "{:?}", names);
        assert!(!names.iter().any(|n| n == "old.txt" || n == "scan.pdf"));
    }

    #[test]
    fn test_missing_root_is_systemic_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = tokio_test::block_on(runner().run(&missing));
        assert!(matches!(result, Err(BatchError::RootNotFound(_))));

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(runner().discover(&file), Err(BatchError::NotADirectory(_))));
    }

    #[test]
    fn test_post_processing_and_debug_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("r1.txt"), "Age: 70..\nREPORT\nBody.\nYear of study: n/a\nRECOMMENDATIONS\nRe-scan.\nyear of study and report 2016").unwrap();

        let storage = Arc::new(StorageManager::new(dir.path().join("out")).unwrap());
        let outcome = tokio_test::block_on(
            runner()
                .with_post_processing(true)
                .with_debug_dumps(Arc::clone(&storage))
                .run(&input),
        )
        .unwrap();

        let record = &outcome.records[0];
        assert_eq!(record.age.as_deref(), Some("70"));
        assert_eq!(record.year_of_study.as_deref(), Some("2016"));
        assert_eq!(record.recommendations.as_deref(), Some("Re-scan."));
        assert!(storage.base_dir().join("debug").join("r1.txt.txt").exists());
    }

    struct PanickingSource;

    impl TextSource for PanickingSource {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn accepts(&self, path: &Path) -> bool {
            crate::sources::has_extension(path, "txt")
        }

        fn read_text(&self, path: &Path) -> Result<String, SourceError> {
            if path.ends_with("bad.txt") {
                panic!("decoder blew up");
            }
            Ok("REPORT\nFine.".to_string())
        }
    }

    #[test]
    fn test_panicking_document_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), "x").unwrap();
        fs::write(dir.path().join("good.txt"), "x").unwrap();

        let runner = BatchRunner::new(Arc::new(PanickingSource), ReportFieldExtractor::default());
        let outcome = tokio_test::block_on(runner.run(dir.path())).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].report_body.as_deref(), Some("Fine."));
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(outcome.failures[0].error, SourceError::Panicked { .. }));
    }
}
