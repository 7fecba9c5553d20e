use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use f1dash_core::DashboardConfig;
use f1dash_metrics::{Aggregator, DateRange};
use f1dash_refresh::{read_manifest, render_refresh_markdown, run_full_refresh, RefreshScheduler};
use f1dash_resume::{analyze_resume, extract_text_from_path, NO_TEXT_MESSAGE};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "f1dash-cli")]
#[command(about = "F1 job dashboard command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Regenerate every table in the data directory.
    Refresh,
    /// Run the daily refresh on its cron schedule until Ctrl-C.
    Schedule {
        /// Refresh once before waiting for the first firing.
        #[arg(long)]
        now: bool,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Score a resume file and print the report as JSON.
    Analyze {
        path: PathBuf,
        #[arg(long)]
        job_description: Option<String>,
    },
    /// Markdown summary of top states and mistake counts.
    Report {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn init_tracing(config: &DashboardConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log filter {:?}", config.log_level))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
        .context("installing tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::from_env().context("loading configuration")?;
    init_tracing(&config)?;

    match cli.command.unwrap_or(Commands::Refresh) {
        Commands::Refresh => {
            let summary = tokio::task::spawn_blocking({
                let config = config.clone();
                move || run_full_refresh(&config)
            })
            .await
            .context("refresh task panicked")??;
            println!("{}", render_refresh_markdown(&summary));
        }
        Commands::Schedule { now } => {
            if now {
                let summary = f1dash_refresh::run_scheduled_refresh(config.clone()).await;
                if summary.is_none() {
                    bail!("initial refresh failed");
                }
            }
            let scheduler = RefreshScheduler::new(config).await?;
            scheduler.start().await?;
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            scheduler.shutdown().await?;
        }
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.web_port = port;
            }
            let scheduler = f1dash_refresh::maybe_build_scheduler(&config).await?;
            if let Some(scheduler) = &scheduler {
                scheduler.start().await?;
            }
            f1dash_web::serve(config).await?;
            if let Some(scheduler) = scheduler {
                scheduler.shutdown().await?;
            }
        }
        Commands::Analyze {
            path,
            job_description,
        } => {
            let text = extract_text_from_path(&path);
            if text.trim().is_empty() {
                bail!("{}: {NO_TEXT_MESSAGE}", path.display());
            }
            let report = analyze_resume(&text, job_description.as_deref());
            info!(ats = report.ats_score, f1 = report.f1_score, "resume analyzed");
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serializing resume report")?
            );
        }
        Commands::Report { top } => {
            println!("{}", render_dashboard_report(&config, top)?);
        }
    }

    Ok(())
}

fn render_dashboard_report(config: &DashboardConfig, top: usize) -> Result<String> {
    let aggregator = Aggregator::new(config);
    let mut lines = vec!["# F1 Job Dashboard Report".to_string(), String::new()];

    match read_manifest(config)? {
        Some(manifest) => lines.push(format!(
            "- last refresh: {} (run `{}`)",
            manifest.completed_at.to_rfc3339(),
            manifest.run_id
        )),
        None => lines.push("- last refresh: none (synthetic data)".to_string()),
    }
    lines.push(String::new());

    lines.push("## Top states by job postings".to_string());
    lines.push("| state | jobs | H1B | score |".to_string());
    lines.push("|---|---:|---:|---:|".to_string());
    for m in aggregator.top_states_by_jobs(top) {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            m.state, m.job_count, m.petitions, m.effectiveness_score
        ));
    }
    lines.push(String::new());

    lines.push("## Top states by H1B petitions".to_string());
    lines.push("| state | H1B | jobs |".to_string());
    lines.push("|---|---:|---:|".to_string());
    for m in aggregator.top_states_by_h1b(top) {
        lines.push(format!("| {} | {} | {} |", m.state, m.petitions, m.job_count));
    }
    lines.push(String::new());

    lines.push("## Mistakes by type".to_string());
    for c in aggregator.mistakes_by_type(DateRange::default()) {
        lines.push(format!("- {}: {}", c.label, c.count));
    }
    lines.push(String::new());

    lines.push("## Mistakes by source".to_string());
    for c in aggregator.mistakes_by_source(DateRange::default()) {
        lines.push(format!("- {}: {}", c.label, c.count));
    }

    Ok(lines.join("\n"))
}
