use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::Parser;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod config;
mod dates;
mod diff;
mod extract;
mod models;
mod notify;
mod pipeline;
mod records;
mod report;
mod session;
mod store;

use config::{Config, EmailConfig};
use pipeline::Comparison;
use report::{ReportContext, ReportMode};
use session::Session;
use store::SnapshotStore;

#[derive(Parser)]
#[command(name = "grade-tracker")]
#[command(about = "Scrapes recent assignment grades from a student portal and tracks changes", long_about = None)]
struct Cli {
    /// Print the grade report to stdout
    #[arg(short, long)]
    print: bool,
    /// Email the grade report
    #[arg(short, long)]
    email: bool,
    /// Diff against the grades as they stood a week ago
    #[arg(short, long)]
    weekly: bool,
    /// Do not append this run's grades to the grade log
    #[arg(short, long)]
    no_log: bool,
    /// Trace the portal traffic and log skipped rows
    #[arg(short, long)]
    verbose: bool,
    /// Only report grades that are new or have changed
    #[arg(short, long)]
    diff: bool,
    /// Grade log location, overrides GRADES_DATA_FILE
    #[arg(long)]
    data_file: Option<PathBuf>,
    /// How many days back the weekly diff looks
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(0..=3650))]
    window_days: u32,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "grade_tracker=debug,reqwest=trace,hyper_util=debug"
    } else {
        "grade_tracker=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_env().context("grade portal settings are incomplete")?;
    if let Some(path) = cli.data_file.clone() {
        config.data_file = path;
    }
    let email = if cli.email {
        Some(EmailConfig::from_env().context("--email needs SMTP settings")?)
    } else {
        None
    };

    let run_id = Uuid::new_v4();
    run(cli, config, email, run_id)
        .instrument(info_span!("run", %run_id))
        .await
}

async fn run(
    cli: Cli,
    config: Config,
    email: Option<EmailConfig>,
    run_id: Uuid,
) -> anyhow::Result<()> {
    let session = Session::new(cli.verbose)?;
    session.login(&config).await?;
    let page = session.fetch_grades_page(&config).await?;

    let extracted_at = Utc::now();
    let today = extracted_at.with_timezone(&Local);
    let batch = pipeline::extract_batch(&page, &today);
    info!(grades = batch.records.len(), skipped = batch.skipped, "read grades page");

    let store = SnapshotStore::new(&config.data_file);
    let comparison = Comparison::from_flags(cli.weekly, cli.diff, cli.window_days);
    let diff = comparison.run(batch.records.clone(), &store, extracted_at)?;

    if cli.no_log {
        info!("not logging grades");
    } else {
        let written = store.append(&batch.records, extracted_at, run_id)?;
        info!(written, path = %store.path().display(), "logged grades");
    }

    let label = comparison.baseline_label();
    let generated_on = today.date_naive();
    let report = report::build_report(
        &ReportContext {
            generated_on,
            mode: comparison.report,
            baseline_label: label.as_deref(),
            skipped_rows: batch.skipped,
        },
        &diff,
    );

    if cli.print {
        print!("{report}");
    }
    if let Some(email) = email {
        if comparison.report == ReportMode::ChangesOnly && !diff.has_changes() {
            info!("no grade changes, skipping email");
        } else {
            notify::send_report(&email, generated_on, &report).await?;
        }
    }

    Ok(())
}
