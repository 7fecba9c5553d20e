//! Core record types, enumerations and configuration for the F1 job dashboard.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "f1dash-core";

/// Sentinel filter value that passes every row for its dimension.
pub const ALL: &str = "All";

/// Canonical state list: 50 states plus DC.
pub const USA_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC",
];

pub fn is_known_state(code: &str) -> bool {
    USA_STATES.contains(&code)
}

/// True when a filter value is omitted or the `All` sentinel.
pub fn passes_all(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == ALL,
    }
}

/// H1B petition count for one state and fiscal period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePetitions {
    pub state: String,
    pub petitions: u64,
    pub fiscal_year: i32,
}

/// Job posting count for one state on one snapshot date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateJobPostings {
    pub state: String,
    pub job_count: u64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyJobPostings {
    pub date: NaiveDate,
    pub total_postings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationSource {
    LinkedIn,
    CompanySite,
    Indeed,
    Other,
}

impl ApplicationSource {
    pub const ALL: [ApplicationSource; 4] = [
        ApplicationSource::LinkedIn,
        ApplicationSource::CompanySite,
        ApplicationSource::Indeed,
        ApplicationSource::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ApplicationSource::LinkedIn => "LinkedIn",
            ApplicationSource::CompanySite => "Company Site",
            ApplicationSource::Indeed => "Indeed",
            ApplicationSource::Other => "Other",
        }
    }

    /// Unrecognised labels collapse into `Other`.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.label() == label.trim())
            .unwrap_or(ApplicationSource::Other)
    }
}

impl fmt::Display for ApplicationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for ApplicationSource {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<ApplicationSource> for String {
    fn from(value: ApplicationSource) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MistakeType {
    WrongPage,
    DuplicateApply,
    ExpiredPosting,
    WrongJobTitle,
    Other,
}

impl MistakeType {
    pub const ALL: [MistakeType; 5] = [
        MistakeType::WrongPage,
        MistakeType::DuplicateApply,
        MistakeType::ExpiredPosting,
        MistakeType::WrongJobTitle,
        MistakeType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MistakeType::WrongPage => "Wrong page (LinkedIn form)",
            MistakeType::DuplicateApply => "Duplicate apply",
            MistakeType::ExpiredPosting => "Expired posting",
            MistakeType::WrongJobTitle => "Wrong job title",
            MistakeType::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.label() == label.trim())
            .unwrap_or(MistakeType::Other)
    }
}

impl fmt::Display for MistakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for MistakeType {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<MistakeType> for String {
    fn from(value: MistakeType) -> Self {
        value.label().to_string()
    }
}

/// One logged job-application mistake. Rows are never mutated once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mistake {
    pub id: u64,
    pub date: NaiveDate,
    pub company: String,
    pub job_title: String,
    pub source: ApplicationSource,
    pub mistake_type: MistakeType,
    pub intended_url: String,
    pub actual_url: String,
}

/// Per-state join of job postings and H1B petitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetric {
    pub state: String,
    pub job_count: u64,
    pub petitions: u64,
    pub effectiveness_score: u64,
}

impl StateMetric {
    pub fn new(state: impl Into<String>, job_count: u64, petitions: u64) -> Self {
        Self {
            state: state.into(),
            job_count,
            petitions,
            effectiveness_score: job_count.saturating_add(petitions.saturating_mul(2)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Dropdown vocabularies offered to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub job_types: Vec<String>,
    pub company_types: Vec<String>,
    pub industries: Vec<String>,
    pub application_sources: Vec<String>,
    pub mistake_types: Vec<String>,
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for FilterOptions {
    fn default() -> Self {
        let mut mistake_types = vec![ALL.to_string()];
        mistake_types.extend(MistakeType::ALL.iter().map(|t| t.label().to_string()));
        let mut application_sources = vec![ALL.to_string()];
        application_sources.extend(ApplicationSource::ALL.iter().map(|s| s.label().to_string()));
        Self {
            job_types: labels(&[ALL, "Full-time", "Part-time", "Contract", "Internship"]),
            company_types: labels(&[ALL, "Startup", "Enterprise", "Nonprofit", "Government"]),
            industries: labels(&[
                ALL,
                "Technology",
                "Healthcare",
                "Finance",
                "Education",
                "Manufacturing",
                "Other",
            ]),
            application_sources,
            mistake_types,
        }
    }
}

impl FilterOptions {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

pub const DEFAULT_REFRESH_CRON: &str = "0 0 6 * * *";
pub const DEFAULT_FILTERS_FILE: &str = "dashboard.yaml";

/// Explicit configuration handed to storage, metrics and the web layer.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub synthetic_seed: u64,
    /// Last day covered by synthetic tables; `None` means today (UTC).
    pub synthetic_anchor: Option<NaiveDate>,
    pub scheduler_enabled: bool,
    pub refresh_cron: String,
    pub web_port: u16,
    pub log_level: String,
    pub filters: FilterOptions,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/processed"),
            synthetic_seed: 42,
            synthetic_anchor: None,
            scheduler_enabled: false,
            refresh_cron: DEFAULT_REFRESH_CRON.to_string(),
            web_port: 8050,
            log_level: "info".to_string(),
            filters: FilterOptions::default(),
        }
    }
}

impl DashboardConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let synthetic_seed = match var("F1DASH_SYNTHETIC_SEED") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "F1DASH_SYNTHETIC_SEED",
                value: v,
            })?,
            None => defaults.synthetic_seed,
        };
        let synthetic_anchor = match var("F1DASH_SYNTHETIC_ANCHOR") {
            Some(v) => Some(NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue {
                    key: "F1DASH_SYNTHETIC_ANCHOR",
                    value: v,
                }
            })?),
            None => None,
        };
        let web_port = match var("F1DASH_WEB_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "F1DASH_WEB_PORT",
                value: v,
            })?,
            None => defaults.web_port,
        };

        let filters_path = var("F1DASH_FILTERS_FILE").map(PathBuf::from);
        let filters = match filters_path {
            Some(path) => FilterOptions::from_yaml_file(&path)?,
            None if Path::new(DEFAULT_FILTERS_FILE).exists() => {
                FilterOptions::from_yaml_file(Path::new(DEFAULT_FILTERS_FILE))?
            }
            None => defaults.filters,
        };

        Ok(Self {
            data_dir: var("F1DASH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            synthetic_seed,
            synthetic_anchor,
            scheduler_enabled: var("F1DASH_SCHEDULER_ENABLED")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            refresh_cron: var("F1DASH_REFRESH_CRON").unwrap_or(defaults.refresh_cron),
            web_port,
            log_level: var("F1DASH_LOG").unwrap_or(defaults.log_level),
            filters,
        })
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.synthetic_anchor
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn canonical_state_list_is_unique() {
        let unique: HashSet<_> = USA_STATES.iter().collect();
        assert_eq!(unique.len(), 51);
        assert!(is_known_state("DC"));
        assert!(!is_known_state("PR"));
    }

    #[test]
    fn unknown_labels_collapse_to_other() {
        assert_eq!(ApplicationSource::from_label("Company Site"), ApplicationSource::CompanySite);
        assert_eq!(ApplicationSource::from_label("Glassdoor"), ApplicationSource::Other);
        assert_eq!(MistakeType::from_label("Duplicate apply"), MistakeType::DuplicateApply);
        assert_eq!(MistakeType::from_label("typo"), MistakeType::Other);
    }

    #[test]
    fn mistake_serializes_with_display_labels() {
        let mistake = Mistake {
            id: 7,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            company: "Tech Corp".into(),
            job_title: "Data Analyst".into(),
            source: ApplicationSource::CompanySite,
            mistake_type: MistakeType::WrongPage,
            intended_url: "https://company.com/careers".into(),
            actual_url: "https://company.com/careers".into(),
        };
        let value = serde_json::to_value(&mistake).unwrap();
        assert_eq!(value["source"], "Company Site");
        assert_eq!(value["mistake_type"], "Wrong page (LinkedIn form)");
        assert_eq!(value["date"], "2025-03-01");
    }

    #[test]
    fn effectiveness_weights_petitions_twice() {
        let metric = StateMetric::new("CA", 2500, 300);
        assert_eq!(metric.effectiveness_score, 3100);
    }

    #[test]
    fn all_sentinel_passes_filters() {
        assert!(passes_all(None));
        assert!(passes_all(Some("All")));
        assert!(passes_all(Some("")));
        assert!(!passes_all(Some("LinkedIn")));
    }

    #[test]
    fn filter_overrides_merge_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.yaml");
        std::fs::write(&path, "industries:\n  - All\n  - Aerospace\n").unwrap();
        let options = FilterOptions::from_yaml_file(&path).unwrap();
        assert_eq!(options.industries, vec!["All", "Aerospace"]);
        assert_eq!(options.job_types, FilterOptions::default().job_types);
    }
}
