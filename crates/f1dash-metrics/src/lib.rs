//! State-level and mistake-log aggregations behind the dashboard views.
//!
//! Every view is available as a pure function over table slices and as a
//! method on [`Aggregator`], which loads the tables it needs on each call.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use f1dash_core::{
    passes_all, CategoryCount, DailyJobPostings, DashboardConfig, FilterOptions, Mistake,
    StateJobPostings, StateMetric, StatePetitions, TimeSeriesPoint,
};
use f1dash_storage::TableStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "f1dash-metrics";

/// Job-side filters for the state views.
///
/// Accepted for every state view, but the H1B side is reported at full
/// granularity and the job-postings table carries no job/company/industry
/// columns, so these never narrow the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFilters {
    pub job_type: Option<String>,
    pub company_type: Option<String>,
    pub industry: Option<String>,
}

impl MetricFilters {
    pub fn is_unfiltered(&self) -> bool {
        passes_all(self.job_type.as_deref())
            && passes_all(self.company_type.as_deref())
            && passes_all(self.industry.as_deref())
    }
}

/// Inclusive date window; an open end passes everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeQuery {
    pub range: DateRange,
    pub source: Option<String>,
    pub mistake_type: Option<String>,
}

impl MistakeQuery {
    pub fn in_range(range: DateRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    fn matches(&self, mistake: &Mistake) -> bool {
        self.range.contains(mistake.date)
            && (passes_all(self.source.as_deref())
                || self.source.as_deref() == Some(mistake.source.label()))
            && (passes_all(self.mistake_type.as_deref())
                || self.mistake_type.as_deref() == Some(mistake.mistake_type.label()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Day,
    #[default]
    Week,
    Month,
}

#[derive(Debug, Error)]
#[error("unknown time bucket {0:?}; expected day, week or month")]
pub struct ParseBucketError(String);

impl FromStr for TimeBucket {
    type Err = ParseBucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(TimeBucket::Day),
            "w" | "week" | "weekly" => Ok(TimeBucket::Week),
            "m" | "month" | "monthly" => Ok(TimeBucket::Month),
            _ => Err(ParseBucketError(s.to_string())),
        }
    }
}

impl TimeBucket {
    /// Bucket label: the day itself, the Sunday closing its week, or the last
    /// day of its month.
    pub fn label_for(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeBucket::Day => date,
            TimeBucket::Week => {
                let to_sunday = (7 - date.weekday().num_days_from_sunday()) % 7;
                date + Duration::days(to_sunday as i64)
            }
            TimeBucket::Month => month_end(date),
        }
    }

    fn next_label(self, label: NaiveDate) -> NaiveDate {
        match self {
            TimeBucket::Day => label + Duration::days(1),
            TimeBucket::Week => label + Duration::days(7),
            TimeBucket::Month => month_end(label + Duration::days(1)),
        }
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Left join of job postings with petitions on state code.
///
/// A state appears at most once: the latest posting snapshot and the latest
/// fiscal year win, and later rows win ties. Output follows the order in which
/// states first appear in `postings`.
pub fn state_metrics(
    postings: &[StateJobPostings],
    petitions: &[StatePetitions],
    filters: &MetricFilters,
) -> Vec<StateMetric> {
    if !filters.is_unfiltered() {
        debug!(?filters, "job filters do not narrow state metrics");
    }

    let mut order = Vec::new();
    let mut latest_postings: HashMap<&str, &StateJobPostings> = HashMap::new();
    for row in postings {
        match latest_postings.entry(row.state.as_str()) {
            Entry::Vacant(slot) => {
                order.push(row.state.as_str());
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if row.date >= slot.get().date {
                    slot.insert(row);
                }
            }
        }
    }

    let mut latest_petitions: HashMap<&str, &StatePetitions> = HashMap::new();
    for row in petitions {
        match latest_petitions.entry(row.state.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if row.fiscal_year >= slot.get().fiscal_year {
                    slot.insert(row);
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|state| latest_postings.get(state))
        .map(|posting| {
            let petitions = latest_petitions
                .get(posting.state.as_str())
                .map_or(0, |p| p.petitions);
            StateMetric::new(posting.state.clone(), posting.job_count, petitions)
        })
        .collect()
}

fn top_by(metrics: &[StateMetric], n: usize, key: impl Fn(&StateMetric) -> u64) -> Vec<StateMetric> {
    let mut ranked = metrics.to_vec();
    // Stable sort: ties keep input order.
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

pub fn top_states_by_jobs(metrics: &[StateMetric], n: usize) -> Vec<StateMetric> {
    top_by(metrics, n, |m| m.job_count)
}

pub fn top_states_by_h1b(metrics: &[StateMetric], n: usize) -> Vec<StateMetric> {
    top_by(metrics, n, |m| m.petitions)
}

pub fn state_detail(metrics: &[StateMetric], code: &str) -> Option<StateMetric> {
    let code = code.trim().to_ascii_uppercase();
    metrics.iter().find(|m| m.state == code).cloned()
}

pub fn daily_job_trend(rows: &[DailyJobPostings], range: DateRange) -> Vec<DailyJobPostings> {
    let mut trend = rows
        .iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect::<Vec<_>>();
    trend.sort_by_key(|r| r.date);
    trend
}

pub fn filter_mistakes(rows: &[Mistake], query: &MistakeQuery) -> Vec<Mistake> {
    rows.iter().filter(|m| query.matches(m)).cloned().collect()
}

/// Group-count, largest group first; equal counts order by label.
fn group_count<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut counts = BTreeMap::<&str, u64>::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut groups = counts
        .into_iter()
        .map(|(label, count)| CategoryCount {
            label: label.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

pub fn count_by_type(rows: &[Mistake]) -> Vec<CategoryCount> {
    group_count(rows.iter().map(|m| m.mistake_type.label()))
}

pub fn count_by_source(rows: &[Mistake]) -> Vec<CategoryCount> {
    group_count(rows.iter().map(|m| m.source.label()))
}

/// Mistake counts per calendar bucket.
///
/// Buckets between the first and last non-empty one are zero-filled; no
/// matching rows yields an empty series.
pub fn time_series(rows: &[Mistake], bucket: TimeBucket) -> Vec<TimeSeriesPoint> {
    let mut counts = BTreeMap::<NaiveDate, u64>::new();
    for row in rows {
        *counts.entry(bucket.label_for(row.date)).or_default() += 1;
    }
    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut label = first;
    while label <= last {
        series.push(TimeSeriesPoint {
            date: label,
            count: counts.get(&label).copied().unwrap_or(0),
        });
        label = bucket.next_label(label);
    }
    series
}

/// Query boundary over the persisted (or synthetic) tables.
#[derive(Debug, Clone)]
pub struct Aggregator {
    store: TableStore,
    filters: FilterOptions,
}

impl Aggregator {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            store: TableStore::new(config),
            filters: config.filters.clone(),
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.filters
    }

    pub fn state_metrics(&self, filters: &MetricFilters) -> Vec<StateMetric> {
        state_metrics(
            &self.store.load_state_job_postings(),
            &self.store.load_state_petitions(),
            filters,
        )
    }

    pub fn top_states_by_jobs(&self, n: usize) -> Vec<StateMetric> {
        top_states_by_jobs(&self.state_metrics(&MetricFilters::default()), n)
    }

    pub fn top_states_by_h1b(&self, n: usize) -> Vec<StateMetric> {
        top_states_by_h1b(&self.state_metrics(&MetricFilters::default()), n)
    }

    pub fn state_detail(&self, code: &str, filters: &MetricFilters) -> Option<StateMetric> {
        state_detail(&self.state_metrics(filters), code)
    }

    pub fn daily_job_trend(&self, range: DateRange) -> Vec<DailyJobPostings> {
        daily_job_trend(&self.store.load_daily_job_postings(), range)
    }

    pub fn mistakes_filtered(&self, query: &MistakeQuery) -> Vec<Mistake> {
        filter_mistakes(&self.store.load_mistakes(), query)
    }

    pub fn mistakes_by_type(&self, range: DateRange) -> Vec<CategoryCount> {
        count_by_type(&self.mistakes_filtered(&MistakeQuery::in_range(range)))
    }

    pub fn mistakes_by_source(&self, range: DateRange) -> Vec<CategoryCount> {
        count_by_source(&self.mistakes_filtered(&MistakeQuery::in_range(range)))
    }

    pub fn mistakes_time_series(&self, range: DateRange, bucket: TimeBucket) -> Vec<TimeSeriesPoint> {
        time_series(&self.mistakes_filtered(&MistakeQuery::in_range(range)), bucket)
    }
}
