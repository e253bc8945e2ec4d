// src/extractors/report.rs

// --- Imports ---
use crate::extractors::record::ExtractedRecord;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// --- Regex Patterns (Lazy Static) ---
// "Age: 45." / "sex : Female" / "RACE: Asian."
static DEMOGRAPHIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(age|sex|race)\s*:(.*)$").expect("Failed to compile DEMOGRAPHIC_RE")
});

// The "Year of study and report: 2019" trailer. OCR sometimes doubles the spaces.
static YEAR_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)year\s+of\s+study").expect("Failed to compile YEAR_PHRASE_RE")
});

static YEAR_DIGITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9]{4})\b").expect("Failed to compile YEAR_DIGITS_RE")
});

// Header keyword at the start of a trimmed line, as a whole word.
// Anything after the keyword and its punctuation is captured.
static HEADER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(REPORT|CONCLUSION|RECOMMENDATIONS)\b[\s.:]*(.*)$")
        .expect("Failed to compile HEADER_LINE_RE")
});

// Line-anchored REPORT header inside the full text (index-based mode).
static REPORT_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*REPORT\b").expect("Failed to compile REPORT_HEADER_RE")
});

const CONCLUSION_KEYWORD: &str = "CONCLUSION";
const RECOMMENDATIONS_KEYWORD: &str = "RECOMMENDATIONS";

// --- Data Structures ---

/// How section boundaries are located in the report text.
///
/// The two strategies can disagree, most visibly when a keyword shows up
/// mid-sentence: index-based mode treats it as a boundary, line-state mode
/// only reacts to keywords at the start of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Per-line state machine over the document's lines.
    #[default]
    #[value(name = "line-state")]
    LineState,
    /// Character-offset search and slicing over the whole text.
    #[value(name = "index")]
    #[serde(rename = "index")]
    IndexBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Report,
    Conclusion,
    Recommendations,
}

impl Section {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "REPORT" => Some(Section::Report),
            "CONCLUSION" => Some(Section::Conclusion),
            "RECOMMENDATIONS" => Some(Section::Recommendations),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Demographic {
    Age,
    Sex,
    Race,
}

impl Demographic {
    fn label(self) -> &'static str {
        match self {
            Demographic::Age => "age",
            Demographic::Sex => "sex",
            Demographic::Race => "race",
        }
    }

    fn slot(self, record: &mut ExtractedRecord) -> &mut Option<String> {
        match self {
            Demographic::Age => &mut record.age,
            Demographic::Sex => &mut record.sex,
            Demographic::Race => &mut record.race,
        }
    }
}

/// What a single trimmed line means to the line-state machine.
#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Demographic(Demographic, String),
    Year(String),
    Header(Section, &'a str),
    Text(&'a str),
}

// --- Main Extractor Structure ---

/// Parses the text of one radiology report into an [`ExtractedRecord`].
///
/// Construct once and reuse for every document; it holds no per-document
/// state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFieldExtractor {
    mode: ExtractionMode,
}

impl ReportFieldExtractor {
    pub fn new(mode: ExtractionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extracts demographic fields and report sections. Never fails:
    /// malformed lines are logged and skipped, missing sections stay absent.
    pub fn extract(&self, raw_text: &str, source_path: &str) -> ExtractedRecord {
        tracing::debug!("Extracting fields from {} ({:?} mode, {} bytes)", source_path, self.mode, raw_text.len());

        let record = match self.mode {
            ExtractionMode::LineState => self.extract_line_state(raw_text, source_path),
            ExtractionMode::IndexBased => self.extract_index_based(raw_text, source_path),
        };

        if record.report_body.is_none() {
            tracing::debug!("No REPORT section found in {}", source_path);
        }
        if record.conclusion.is_none() {
            tracing::debug!("No CONCLUSION section found in {}", source_path);
        }
        if record.recommendations.is_none() {
            tracing::debug!("No RECOMMENDATIONS section found in {}", source_path);
        }

        record
    }

    /// Single forward pass; each line lands in at most one section.
    fn extract_line_state(&self, raw_text: &str, source_path: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(source_path);
        let mut current: Option<Section> = None;
        let mut buffers: [Vec<&str>; 3] = [Vec::new(), Vec::new(), Vec::new()];

        for (idx, raw_line) in raw_text.lines().enumerate() {
            let line = raw_line.trim();
            match classify_line(line, idx + 1) {
                Ok(LineKind::Demographic(field, value)) => {
                    set_first(&mut record, field, value, source_path);
                    // A demographic line can also carry the year trailer.
                    if record.year_of_study.is_none() {
                        if let Ok(Some(year)) = parse_year_line(line, idx + 1) {
                            record.year_of_study = Some(year);
                        }
                    }
                }
                Ok(LineKind::Year(year)) => {
                    if record.year_of_study.is_none() {
                        record.year_of_study = Some(year);
                    }
                }
                Ok(LineKind::Header(section, rest)) => {
                    current = Some(section);
                    if !rest.is_empty() {
                        buffers[section.index()].push(rest);
                    }
                }
                Ok(LineKind::Text(text)) => {
                    if let Some(section) = current {
                        buffers[section.index()].push(text);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed line in {}: {}", source_path, e);
                }
            }
        }

        let [report, conclusion, recommendations] = buffers;
        record.report_body = join_section(&report);
        record.conclusion = join_section(&conclusion);
        record.recommendations = join_section(&recommendations);
        record
    }

    /// Slices the full text between keyword offsets. A slice needs both
    /// of its bounding markers; no boundary is guessed.
    fn extract_index_based(&self, raw_text: &str, source_path: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(source_path);

        for (idx, raw_line) in raw_text.lines().enumerate() {
            match parse_demographic(raw_line.trim(), idx + 1) {
                Ok(Some((field, value))) => set_first(&mut record, field, value, source_path),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping malformed line in {}: {}", source_path, e),
            }
        }

        // ASCII uppercasing keeps byte offsets identical to raw_text.
        let upper = raw_text.to_ascii_uppercase();
        let report_start = REPORT_HEADER_RE.find(raw_text).map(|m| m.end());
        let conclusion_at = upper.find(CONCLUSION_KEYWORD);
        let recommendations_at = upper.find(RECOMMENDATIONS_KEYWORD);
        let year_at = YEAR_PHRASE_RE.find(raw_text).map(|m| m.start());

        tracing::trace!(
            "Offsets in {}: report={:?} conclusion={:?} recommendations={:?} year={:?}",
            source_path, report_start, conclusion_at, recommendations_at, year_at
        );

        // Sections never overlap: each slice has to start at or after the
        // end of the one accepted before it.
        let mut floor = 0;
        let mut take = |start: Option<usize>, end: Option<usize>| -> Option<String> {
            let (start, end) = (start?, end?);
            if start < floor {
                return None;
            }
            let body = slice_between(raw_text, start, end)?;
            floor = end;
            Some(body)
        };

        record.report_body = take(report_start, conclusion_at);
        record.conclusion = take(
            conclusion_at.map(|at| at + CONCLUSION_KEYWORD.len()),
            recommendations_at,
        );
        record.recommendations = take(
            recommendations_at.map(|at| at + RECOMMENDATIONS_KEYWORD.len()),
            year_at,
        );
        record.year_of_study = year_at.and_then(|at| find_year(&raw_text[at..]));

        if year_at.is_some() && record.year_of_study.is_none() {
            tracing::warn!("Year of study phrase in {} has no 4-digit year", source_path);
        }

        record
    }
}

// --- Line Helpers ---

fn classify_line(line: &str, line_no: usize) -> Result<LineKind<'_>, ExtractError> {
    if let Some((field, value)) = parse_demographic(line, line_no)? {
        return Ok(LineKind::Demographic(field, value));
    }
    if let Some(year) = parse_year_line(line, line_no)? {
        return Ok(LineKind::Year(year));
    }
    if let Some((section, rest)) = parse_header(line) {
        return Ok(LineKind::Header(section, rest));
    }
    Ok(LineKind::Text(line))
}

fn parse_demographic(line: &str, line_no: usize) -> Result<Option<(Demographic, String)>, ExtractError> {
    let Some(caps) = DEMOGRAPHIC_RE.captures(line) else {
        return Ok(None);
    };

    let field = match caps[1].to_ascii_lowercase().as_str() {
        "age" => Demographic::Age,
        "sex" => Demographic::Sex,
        _ => Demographic::Race,
    };

    match clean_value(&caps[2]) {
        Some(value) => Ok(Some((field, value))),
        None => Err(ExtractError::EmptyField { field: field.label(), line: line_no }),
    }
}

fn parse_year_line(line: &str, line_no: usize) -> Result<Option<String>, ExtractError> {
    let Some(phrase) = YEAR_PHRASE_RE.find(line) else {
        return Ok(None);
    };
    find_year(&line[phrase.end()..])
        .map(Some)
        .ok_or(ExtractError::MissingYear { line: line_no })
}

fn parse_header(line: &str) -> Option<(Section, &str)> {
    let caps = HEADER_LINE_RE.captures(line)?;
    let section = Section::from_keyword(caps.get(1)?.as_str())?;
    let rest = caps.get(2).map_or("", |m| m.as_str().trim());
    Some((section, rest))
}

/// First standalone 4-digit numeral in `text`.
pub(crate) fn find_year(text: &str) -> Option<String> {
    YEAR_DIGITS_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Year following the "year of study" phrase, if both are present.
pub(crate) fn find_year_after_phrase(text: &str) -> Option<String> {
    let phrase = YEAR_PHRASE_RE.find(text)?;
    find_year(&text[phrase.end()..])
}

/// Trims whitespace and every trailing period (`45. .` -> `45`); empty
/// results are absent.
pub(crate) fn clean_value(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn set_first(record: &mut ExtractedRecord, field: Demographic, value: String, source_path: &str) {
    let slot = field.slot(record);
    if slot.is_some() {
        tracing::debug!("Ignoring repeated '{}' line in {}", field.label(), source_path);
        return;
    }
    *slot = Some(value);
}

fn join_section(lines: &[&str]) -> Option<String> {
    let joined = lines.join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Text between two byte offsets with header punctuation removed.
fn slice_between(text: &str, start: usize, end: usize) -> Option<String> {
    if end < start {
        return None;
    }
    let body = text
        .get(start..end)?
        .trim_start_matches(|c: char| c == '.' || c == ':' || c.is_whitespace())
        .trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}
