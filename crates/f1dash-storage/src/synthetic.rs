//! Deterministic stand-in tables used when nothing has been persisted yet.
//!
//! Randomness is derived from SHA-256 over `(seed, stream, index)`, so a given
//! seed and anchor date always yield the same tables on every platform.

use chrono::{Duration, NaiveDate};
use f1dash_core::{
    ApplicationSource, DailyJobPostings, Mistake, MistakeType, StateJobPostings, StatePetitions,
    USA_STATES,
};
use sha2::{Digest, Sha256};

pub const DAILY_DAYS: usize = 90;
pub const MISTAKE_ROWS: usize = 500;
pub const FISCAL_YEAR: i32 = 2024;

const INTENDED_URL: &str = "https://company.com/careers";
const EASY_APPLY_URL: &str = "https://www.linkedin.com/easy-apply/...";

const COMPANIES: [&str; 5] = ["Tech Corp", "Health Inc", "Finance Co", "Startup XYZ", "Big Retail"];
const JOB_TITLES: [&str; 4] = [
    "Software Engineer",
    "Data Analyst",
    "Product Manager",
    "UX Designer",
];

// Petition weight per state, aligned with USA_STATES (CA, TX, NY, WA, NJ lead).
const PETITION_WEIGHTS: [f64; 51] = [
    3.0, 0.5, 2.0, 0.8, 15.0, 2.0, 1.5, 0.3, 5.0, 2.0, 0.5, 0.5, 4.0, 1.5, 0.8, 0.6, 0.8, 0.5, 0.3,
    1.0, 2.5, 2.0, 1.5, 0.5, 1.2, 0.3, 0.6, 1.0, 0.4, 1.5, 0.5, 4.0, 2.0, 0.3, 2.0, 1.0, 0.8, 1.2,
    1.5, 0.3, 0.2, 1.0, 8.0, 1.0, 0.2, 1.0, 1.5, 0.5, 1.0, 0.3, 1.0,
];

// Baseline job postings per state, aligned with USA_STATES.
const POSTING_BASE: [u64; 51] = [
    500, 100, 400, 150, 2500, 400, 300, 80, 1200, 600, 120, 150, 900, 350, 200, 180, 220, 100, 80,
    250, 400, 350, 280, 120, 300, 90, 150, 200, 100, 280, 120, 800, 450, 80, 400, 200, 250, 350,
    100, 200, 60, 180, 1200, 250, 60, 220, 350, 120, 200, 80, 180,
];

const SOURCE_WEIGHTS: [(ApplicationSource, f64); 3] = [
    (ApplicationSource::LinkedIn, 0.7),
    (ApplicationSource::CompanySite, 0.2),
    (ApplicationSource::Indeed, 0.1),
];

const MISTAKE_WEIGHTS: [(MistakeType, f64); 5] = [
    (MistakeType::WrongPage, 0.5),
    (MistakeType::DuplicateApply, 0.2),
    (MistakeType::ExpiredPosting, 0.15),
    (MistakeType::WrongJobTitle, 0.1),
    (MistakeType::Other, 0.05),
];

#[derive(Debug, Clone, Copy)]
struct Noise {
    seed: u64,
    stream: &'static str,
}

impl Noise {
    fn new(seed: u64, stream: &'static str) -> Self {
        Self { seed, stream }
    }

    /// Uniform sample in `[0, 1)`.
    fn uniform(&self, index: u64) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(self.stream.as_bytes());
        hasher.update(index.to_le_bytes());
        let digest = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(word) >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Approximately standard-normal sample (Irwin-Hall, twelve draws).
    fn normal(&self, index: u64) -> f64 {
        (0..12).map(|k| self.uniform(index * 12 + k)).sum::<f64>() - 6.0
    }

    fn below(&self, index: u64, bound: usize) -> usize {
        ((self.uniform(index) * bound as f64) as usize).min(bound.saturating_sub(1))
    }

    fn weighted<T: Copy>(&self, index: u64, choices: &[(T, f64)]) -> T {
        let total: f64 = choices.iter().map(|(_, w)| w).sum();
        let mut target = self.uniform(index) * total;
        for (value, weight) in choices {
            if target < *weight {
                return *value;
            }
            target -= weight;
        }
        choices[choices.len() - 1].0
    }
}

pub fn state_petitions(seed: u64) -> Vec<StatePetitions> {
    let noise = Noise::new(seed, "h1b_by_state");
    USA_STATES
        .iter()
        .zip(PETITION_WEIGHTS)
        .enumerate()
        .map(|(i, (state, weight))| StatePetitions {
            state: state.to_string(),
            petitions: (noise.uniform(i as u64) * 2000.0 + weight * 1500.0) as u64,
            fiscal_year: FISCAL_YEAR,
        })
        .collect()
}

pub fn state_job_postings(seed: u64, anchor: NaiveDate) -> Vec<StateJobPostings> {
    let noise = Noise::new(seed, "job_postings_by_state");
    USA_STATES
        .iter()
        .zip(POSTING_BASE)
        .enumerate()
        .map(|(i, (state, base))| StateJobPostings {
            state: state.to_string(),
            job_count: base + (noise.uniform(i as u64) * 200.0) as u64,
            date: anchor,
        })
        .collect()
}

/// Ninety consecutive days ending on `anchor`, trending from 8000 to 12000.
pub fn daily_job_postings(seed: u64, anchor: NaiveDate) -> Vec<DailyJobPostings> {
    let noise = Noise::new(seed, "job_postings_daily");
    let first = anchor - Duration::days(DAILY_DAYS as i64 - 1);
    (0..DAILY_DAYS)
        .map(|i| {
            let trend = 8000.0 + 4000.0 * i as f64 / (DAILY_DAYS - 1) as f64;
            let value = trend + noise.normal(i as u64) * 500.0;
            DailyJobPostings {
                date: first + Duration::days(i as i64),
                total_postings: value.max(1000.0) as u64,
            }
        })
        .collect()
}

pub fn mistakes(seed: u64, anchor: NaiveDate) -> Vec<Mistake> {
    let noise = Noise::new(seed, "job_application_mistakes");
    (0..MISTAKE_ROWS as u64)
        .map(|id| {
            let draw = |field: u64| id * 8 + field;
            let days_back = noise.below(draw(0), DAILY_DAYS) as i64;
            let actual_url = if noise.uniform(draw(5)) < 0.5 {
                EASY_APPLY_URL
            } else {
                INTENDED_URL
            };
            Mistake {
                id,
                date: anchor - Duration::days(days_back),
                company: COMPANIES[noise.below(draw(1), COMPANIES.len())].to_string(),
                job_title: JOB_TITLES[noise.below(draw(2), JOB_TITLES.len())].to_string(),
                source: noise.weighted(draw(3), &SOURCE_WEIGHTS),
                mistake_type: noise.weighted(draw(4), &MISTAKE_WEIGHTS),
                intended_url: INTENDED_URL.to_string(),
                actual_url: actual_url.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn state_tables_cover_every_state_once() {
        let petitions = state_petitions(42);
        let postings = state_job_postings(42, anchor());
        assert_eq!(petitions.len(), 51);
        assert_eq!(postings.len(), 51);
        let states: HashSet<_> = postings.iter().map(|p| p.state.as_str()).collect();
        assert_eq!(states.len(), 51);
        assert!(postings.iter().all(|p| p.date == anchor()));
    }

    #[test]
    fn california_leads_petitions() {
        let petitions = state_petitions(42);
        let top = petitions.iter().max_by_key(|p| p.petitions).unwrap();
        assert_eq!(top.state, "CA");
    }

    #[test]
    fn daily_series_spans_ninety_days_ending_at_anchor() {
        let daily = daily_job_postings(42, anchor());
        assert_eq!(daily.len(), DAILY_DAYS);
        assert_eq!(daily.last().unwrap().date, anchor());
        assert!(daily.windows(2).all(|w| w[0].date < w[1].date));
        assert!(daily.iter().all(|d| d.total_postings >= 1000));
    }

    #[test]
    fn mistakes_stay_inside_window() {
        let rows = mistakes(42, anchor());
        assert_eq!(rows.len(), MISTAKE_ROWS);
        let earliest = anchor() - Duration::days(DAILY_DAYS as i64 - 1);
        assert!(rows.iter().all(|m| m.date >= earliest && m.date <= anchor()));
        assert!(rows.iter().all(|m| m.source != ApplicationSource::Other));
        let linkedin = rows
            .iter()
            .filter(|m| m.source == ApplicationSource::LinkedIn)
            .count();
        assert!(linkedin > rows.len() / 2);
    }

    #[test]
    fn same_seed_same_tables() {
        assert_eq!(mistakes(7, anchor()), mistakes(7, anchor()));
        assert_eq!(daily_job_postings(7, anchor()), daily_job_postings(7, anchor()));
        assert_ne!(state_petitions(7), state_petitions(8));
    }
}
