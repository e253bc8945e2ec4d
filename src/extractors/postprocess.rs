// src/extractors/postprocess.rs
use crate::extractors::record::ExtractedRecord;
use crate::extractors::report::{clean_value, find_year_after_phrase};

/// Normalization pass over already extracted records.
///
/// Pure and idempotent: running it on its own output changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessor;

impl PostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, record: &ExtractedRecord) -> ExtractedRecord {
        let mut cleaned = ExtractedRecord {
            age: record.age.as_deref().and_then(clean_value),
            sex: record.sex.as_deref().and_then(clean_value),
            race: record.race.as_deref().and_then(clean_value),
            year_of_study: record.year_of_study.as_deref().and_then(non_empty),
            report_body: record.report_body.as_deref().and_then(non_empty),
            conclusion: record.conclusion.as_deref().and_then(non_empty),
            recommendations: record.recommendations.as_deref().and_then(non_empty),
            source_path: record.source_path.clone(),
        };

        if cleaned.year_of_study.is_none() {
            cleaned.year_of_study = [&cleaned.report_body, &cleaned.conclusion, &cleaned.recommendations]
                .into_iter()
                .flatten()
                .find_map(|text| find_year_after_phrase(text));

            if let Some(year) = &cleaned.year_of_study {
                tracing::debug!("Recovered year of study {} for {}", year, cleaned.source_path);
            }
        }

        cleaned
    }

    pub fn process_all(&self, records: &[ExtractedRecord]) -> Vec<ExtractedRecord> {
        records.iter().map(|r| self.process(r)).collect()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
