// src/extractors/mod.rs
pub mod postprocess;
pub mod record;
pub mod report;

// Re-export key extraction types for convenience
pub use postprocess::PostProcessor;
pub use record::ExtractedRecord;
pub use report::{ExtractionMode, ReportFieldExtractor};
