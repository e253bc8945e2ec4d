// src/extractors/record.rs
use serde::{Deserialize, Deserializer, Serialize};

/// Structured fields pulled out of one radiology report.
///
/// Serialized with the key names the downstream tooling already expects
/// (`year`, `report`, `file_path`); absent fields are written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub race: Option<String>,
    #[serde(rename = "year", default, deserialize_with = "empty_as_none")]
    pub year_of_study: Option<String>,
    #[serde(rename = "report", default, deserialize_with = "empty_as_none")]
    pub report_body: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub conclusion: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub recommendations: Option<String>,
    #[serde(rename = "file_path", default)]
    pub source_path: String,
}

impl ExtractedRecord {
    /// Empty record for a document; only the source path is known.
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Default::default()
        }
    }

    /// True when nothing but the source path was captured.
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.sex.is_none()
            && self.race.is_none()
            && self.year_of_study.is_none()
            && self.report_body.is_none()
            && self.conclusion.is_none()
            && self.recommendations.is_none()
    }
}

/// Older dumps wrote `""` for missing values.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_downstream_keys() {
        let mut record = ExtractedRecord::new("data/brain-mri/Brain_MRI_1.pdf");
        record.age = Some("45".to_string());
        record.year_of_study = Some("2019".to_string());

        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["age", "conclusion", "file_path", "race", "recommendations", "report", "sex", "year"]
        );
        assert_eq!(obj["age"], "45");
        assert_eq!(obj["year"], "2019");
        assert!(obj["report"].is_null(), "Absent fields must serialize as null");
        assert_eq!(obj["file_path"], "data/brain-mri/Brain_MRI_1.pdf");
    }

    #[test]
    fn test_deserializes_empty_strings_and_missing_keys_as_absent() {
        let json = r#"{"age": "", "sex": "Male", "report": "  ", "file_path": "a.pdf"}"#;
        let record: ExtractedRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.age, None);
        assert_eq!(record.sex.as_deref(), Some("Male"));
        assert_eq!(record.report_body, None);
        assert_eq!(record.conclusion, None);
        assert_eq!(record.source_path, "a.pdf");
    }

    #[test]
    fn test_is_empty_ignores_source_path() {
        let record = ExtractedRecord::new("x.pdf");
        assert!(record.is_empty());

        let mut filled = record.clone();
        filled.conclusion = Some("Normal study".to_string());
        assert!(!filled.is_empty());
    }
}
