//! Whole-table refresh of the dashboard data directory, plus the daily
//! scheduler that drives it.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use f1dash_core::DashboardConfig;
use f1dash_metrics::count_by_type;
use f1dash_storage::{replace_atomically, synthetic, StoredTable, TableStore};
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

pub const CRATE_NAME: &str = "f1dash-refresh";

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWrite {
    pub name: String,
    pub path: String,
    pub rows: usize,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Always `true` when returned; a failed refresh surfaces as `Err`.
    pub success: bool,
    pub anchor_date: NaiveDate,
    pub data_dir: String,
    pub manifest_path: String,
    pub tables: Vec<TableWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub name: String,
    /// Relative to the data directory.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
    pub rows: usize,
}

/// Regenerates every table, writes each one atomically, then the manifest.
pub fn run_full_refresh(config: &DashboardConfig) -> Result<RefreshSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let span = info_span!("refresh", %run_id);
    let _entered = span.enter();

    let store = TableStore::new(config);
    let seed = store.seed();
    let anchor = store.anchor_date();
    info!(data_dir = %store.root().display(), seed, %anchor, "starting full refresh");

    let petitions = synthetic::state_petitions(seed);
    let postings = synthetic::state_job_postings(seed, anchor);
    let daily = synthetic::daily_job_postings(seed, anchor);
    let mistakes = synthetic::mistakes(seed, anchor);
    let by_type = count_by_type(&mistakes);

    let tables = vec![
        table_write(
            "h1b_by_state",
            store
                .write_state_petitions(&petitions)
                .context("writing h1b_by_state")?,
        ),
        table_write(
            "job_postings_by_state",
            store
                .write_state_job_postings(&postings)
                .context("writing job_postings_by_state")?,
        ),
        table_write(
            "job_postings_daily",
            store
                .write_daily_job_postings(&daily)
                .context("writing job_postings_daily")?,
        ),
        table_write(
            "job_application_mistakes",
            store
                .write_mistakes(&mistakes)
                .context("writing job_application_mistakes")?,
        ),
        table_write(
            "mistakes_by_type",
            store
                .write_mistakes_by_type(&by_type)
                .context("writing mistakes_by_type")?,
        ),
    ];

    let completed_at = Utc::now();
    let manifest = RefreshManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        run_id,
        completed_at,
        files: tables
            .iter()
            .map(|t| manifest_entry(t, store.root()))
            .collect(),
    };
    let manifest_path = store.paths().manifest.clone();
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing refresh manifest")?;
    replace_atomically(&manifest_path, &bytes)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    info!(tables = tables.len(), %completed_at, "daily refresh completed");
    Ok(RefreshSummary {
        run_id,
        started_at,
        completed_at,
        success: true,
        anchor_date: anchor,
        data_dir: store.root().display().to_string(),
        manifest_path: manifest_path.display().to_string(),
        tables,
    })
}

fn table_write(name: &str, stored: StoredTable) -> TableWrite {
    info!(table = name, rows = stored.rows, bytes = stored.bytes, "wrote table");
    TableWrite {
        name: name.to_string(),
        path: stored.path.display().to_string(),
        rows: stored.rows,
        bytes: stored.bytes,
        sha256: stored.sha256,
    }
}

fn manifest_entry(table: &TableWrite, data_dir: &Path) -> ManifestFile {
    let path = Path::new(&table.path);
    let rel = path
        .strip_prefix(data_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    ManifestFile {
        name: table.name.clone(),
        path: rel,
        sha256: table.sha256.clone(),
        bytes: table.bytes,
        rows: table.rows,
    }
}

/// The manifest left by the last completed refresh, if any.
pub fn read_manifest(config: &DashboardConfig) -> Result<Option<RefreshManifest>> {
    let path = TableStore::new(config).paths().manifest.clone();
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let manifest =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(manifest))
}

pub fn render_refresh_markdown(summary: &RefreshSummary) -> String {
    let mut lines = vec![
        "# F1 Job Dashboard Refresh".to_string(),
        String::new(),
        format!("- run: `{}`", summary.run_id),
        "- status: ok".to_string(),
        format!("- completed: {}", summary.completed_at.to_rfc3339()),
        format!("- anchor date: {}", summary.anchor_date),
        format!("- manifest: `{}`", summary.manifest_path),
        String::new(),
        "| table | rows | bytes |".to_string(),
        "|---|---:|---:|".to_string(),
    ];
    for table in &summary.tables {
        lines.push(format!("| {} | {} | {} |", table.name, table.rows, table.bytes));
    }
    lines.join("\n")
}

/// One scheduler firing: the refresh runs on a blocking thread and its
/// outcome is logged.
pub async fn run_scheduled_refresh(config: DashboardConfig) -> Option<RefreshSummary> {
    match tokio::task::spawn_blocking(move || run_full_refresh(&config)).await {
        Ok(Ok(summary)) => {
            info!(run_id = %summary.run_id, tables = summary.tables.len(), "scheduled refresh finished");
            Some(summary)
        }
        Ok(Err(err)) => {
            error!(error = ?err, "scheduled refresh failed");
            None
        }
        Err(err) => {
            error!(error = %err, "scheduled refresh task aborted");
            None
        }
    }
}

pub struct RefreshScheduler {
    scheduler: JobScheduler,
    cron: String,
}

impl RefreshScheduler {
    pub async fn new(config: DashboardConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await.context("creating scheduler")?;
        let cron = config.refresh_cron.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let config = config.clone();
            Box::pin(async move {
                run_scheduled_refresh(config).await;
            })
        })
        .with_context(|| format!("creating refresh job for cron {cron}"))?;
        scheduler.add(job).await.context("adding refresh job")?;
        Ok(Self { scheduler, cron })
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await.context("starting scheduler")?;
        info!(cron = %self.cron, "refresh scheduler started");
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .context("stopping scheduler")?;
        info!("refresh scheduler stopped");
        Ok(())
    }
}

/// `None` unless the scheduler is enabled in configuration.
pub async fn maybe_build_scheduler(config: &DashboardConfig) -> Result<Option<RefreshScheduler>> {
    if !config.scheduler_enabled {
        debug!("refresh scheduler disabled");
        return Ok(None);
    }
    RefreshScheduler::new(config.clone()).await.map(Some)
}
