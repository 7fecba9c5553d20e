//! Resume text extraction and keyword scoring.
//!
//! Extraction never fails up the call stack: unsupported or unreadable
//! documents produce an empty string, which the upload boundary reports as
//! [`UploadOutcome::NoTextExtracted`].

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "f1dash-resume";

pub const WORK_AUTH_KEYWORDS: [&str; 11] = [
    "authorized to work",
    "sponsorship",
    "H1B",
    "OPT",
    "CPT",
    "F1",
    "work authorization",
    "eligible to work",
    "US work authorization",
    "immigration",
    "visa",
];

pub const SKILL_KEYWORDS: [&str; 20] = [
    "Python",
    "SQL",
    "JavaScript",
    "Java",
    "R",
    "machine learning",
    "data analysis",
    "Excel",
    "Tableau",
    "Power BI",
    "communication",
    "leadership",
    "project management",
    "agile",
    "scrum",
    "Git",
    "AWS",
    "cloud",
    "REST API",
    "statistics",
];

const MAX_JD_TOKENS: usize = 30;
const MAX_FOUND: usize = 30;
const MAX_MISSING: usize = 20;
const MAX_MISSING_REPORTED: usize = 15;
const MAX_SUGGESTIONS: usize = 10;
const MENTION_CANDIDATES: usize = 5;
const SHORT_RESUME_CHARS: usize = 200;

pub const SUGGEST_WORK_AUTH: &str =
    "Add a clear 'Work Authorization' or 'Eligibility to Work' line (e.g., F1 OPT, H1B).";
pub const SUGGEST_LONGER: &str =
    "Resume may be too short; add more bullet points for projects and experience.";
pub const SUGGEST_SUMMARY: &str =
    "Consider adding a short Professional Summary or Objective at the top.";
pub const NO_TEXT_MESSAGE: &str = "No text extracted. Check file format.";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("pdf: {0}")]
    Pdf(String),
    #[error("docx container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Pulls plain text out of one document format.
pub trait TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        // The PDF parser panics on some malformed inputs.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes)
        }));
        match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(ExtractError::Pdf(err.to_string())),
            Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

struct DocxPatterns {
    paragraph: Regex,
    run: Regex,
    /// Text, tab and line-break elements of a run, in document order.
    content: Regex,
}

impl DocxPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            paragraph: Regex::new(r"(?s)<w:p[\s>].*?</w:p>")?,
            run: Regex::new(r"(?s)<w:r[\s>].*?</w:r>")?,
            content: Regex::new(
                r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)(?:\s[^>]*)?/>",
            )?,
        })
    }

    fn paragraph_text(&self, paragraph: &str) -> String {
        let mut text = String::new();
        for run in self.run.find_iter(paragraph) {
            for c in self.content.captures_iter(run.as_str()) {
                if let Some(t) = c.get(1) {
                    text.push_str(&decode_entities(t.as_str()));
                } else if c.get(2).map(|m| m.as_str()) == Some("tab") {
                    text.push('\t');
                } else {
                    text.push('\n');
                }
            }
        }
        text
    }
}

fn docx_patterns() -> Result<&'static DocxPatterns, ExtractError> {
    static PATTERNS: OnceLock<Result<DocxPatterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(DocxPatterns::compile)
        .as_ref()
        .map_err(|err| ExtractError::Pattern(err.clone()))
}

impl TextExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let patterns = docx_patterns()?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")?
            .read_to_string(&mut xml)?;

        let lines: Vec<String> = patterns
            .paragraph
            .find_iter(&xml)
            .map(|p| patterns.paragraph_text(p.as_str()))
            .collect();
        Ok(lines.join("\n"))
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    /// `.docx`, and legacy `.doc` which only extracts when it is a ZIP container.
    Docx,
    PlainText,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn extractor(self) -> &'static dyn TextExtractor {
        match self {
            Self::Pdf => &PdfExtractor,
            Self::Docx => &DocxExtractor,
            Self::PlainText => &PlainTextExtractor,
        }
    }
}

/// A document payload as received from an upload or read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

pub fn extract_text(document: &UploadedDocument) -> String {
    let Some(kind) = DocumentKind::from_file_name(&document.file_name) else {
        debug!(file = %document.file_name, "unsupported document extension");
        return String::new();
    };
    match kind.extractor().extract(&document.bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(file = %document.file_name, ?kind, error = %err, "text extraction failed");
            String::new()
        }
    }
}

/// Missing or unreadable files yield an empty string.
pub fn extract_text_from_path(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "resume file not readable");
            return String::new();
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    extract_text(&UploadedDocument::new(file_name, bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReport {
    pub ats_score: u32,
    pub f1_score: u32,
    pub word_count: usize,
    pub keywords_found: Vec<String>,
    pub keywords_missing: Vec<String>,
    pub f1_keywords_found: Vec<String>,
    pub suggestions: Vec<String>,
}

fn jd_token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b[a-z]{4,}\b").ok())
        .as_ref()
}

/// First distinct lowercase words of four or more letters in a job description.
pub fn job_description_tokens(job_description: &str) -> Vec<String> {
    let Some(pattern) = jd_token_pattern() else {
        return Vec::new();
    };
    let lowered = job_description.to_lowercase();
    let mut seen = HashSet::new();
    pattern
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| seen.insert(*token))
        .take(MAX_JD_TOKENS)
        .map(str::to_string)
        .collect()
}

fn percent_score(base: u32, span: u32, hits: usize, total: usize) -> u32 {
    let scaled = base as f64 + span as f64 * hits as f64 / total.max(1) as f64;
    (scaled as u32).min(100)
}

pub fn analyze_resume(text: &str, job_description: Option<&str>) -> ResumeReport {
    let lowered = text.to_lowercase();
    let contains = |keyword: &str| lowered.contains(&keyword.to_lowercase());

    let mut universe: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let vocab = SKILL_KEYWORDS
        .iter()
        .chain(WORK_AUTH_KEYWORDS.iter())
        .map(|k| k.to_string());
    let tokens = job_description_tokens(job_description.unwrap_or_default());
    for keyword in vocab.chain(tokens) {
        if seen.insert(keyword.clone()) {
            universe.push(keyword);
        }
    }

    let found: Vec<String> = universe
        .iter()
        .filter(|k| contains(k.as_str()))
        .cloned()
        .collect();
    let vocab_size = SKILL_KEYWORDS.len() + WORK_AUTH_KEYWORDS.len();
    let vocab_hits = universe[..vocab_size]
        .iter()
        .filter(|k| contains(k.as_str()))
        .count();

    let missing: Vec<&str> = SKILL_KEYWORDS
        .iter()
        .chain(WORK_AUTH_KEYWORDS.iter())
        .copied()
        .filter(|k| !contains(*k))
        .take(MAX_MISSING)
        .collect();

    let f1_found: Vec<String> = WORK_AUTH_KEYWORDS
        .iter()
        .filter(|k| contains(**k))
        .map(|k| k.to_string())
        .collect();

    let mut suggestions = Vec::new();
    if !["work authorization", "authorized", "eligib"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        suggestions.push(SUGGEST_WORK_AUTH.to_string());
    }
    if text.trim().chars().count() < SHORT_RESUME_CHARS {
        suggestions.push(SUGGEST_LONGER.to_string());
    }
    if !lowered.contains("objective") && !lowered.contains("summary") {
        suggestions.push(SUGGEST_SUMMARY.to_string());
    }
    for keyword in missing.iter().take(MENTION_CANDIDATES) {
        if SKILL_KEYWORDS.contains(keyword) {
            suggestions.push(format!("If relevant, consider mentioning: {keyword}."));
        }
    }
    suggestions.truncate(MAX_SUGGESTIONS);

    ResumeReport {
        ats_score: percent_score(50, 50, vocab_hits, vocab_size),
        f1_score: percent_score(30, 70, f1_found.len(), WORK_AUTH_KEYWORDS.len()),
        word_count: text.split_whitespace().count(),
        keywords_found: found.into_iter().take(MAX_FOUND).collect(),
        keywords_missing: missing
            .into_iter()
            .take(MAX_MISSING_REPORTED)
            .map(str::to_string)
            .collect(),
        f1_keywords_found: f1_found,
        suggestions,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Report(ResumeReport),
    NoTextExtracted,
}

pub fn score_upload(document: &UploadedDocument, job_description: Option<&str>) -> UploadOutcome {
    let text = extract_text(document);
    if text.trim().is_empty() {
        debug!(file = %document.file_name, "no text extracted from upload");
        return UploadOutcome::NoTextExtracted;
    }
    UploadOutcome::Report(analyze_resume(&text, job_description))
}
