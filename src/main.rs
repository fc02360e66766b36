mod config;
mod error;
mod extract;
mod normalize;
mod notify;
mod pipeline;
mod source;
mod store;
mod table;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{Backend, LinkPick, Settings};
use crate::extract::TabulaExtractor;
use crate::notify::{Notifier, QueueNotifier};
use crate::error::PipelineError;
use crate::pipeline::{Collaborators, Response};
use crate::source::HttpFetch;
use crate::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "ota_vacancy", about = "Ota ward nursery vacancy PDF → keyed dataset")]
struct Cli {
    /// SQLite file holding the datasets
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Local backend: skip autoscaling registration
    #[arg(long, global = true)]
    local: bool,
    /// Queue endpoint to notify after a successful write
    #[arg(long, global = true)]
    queue_url: Option<String>,
    /// Which PDF link to use when the index page has several
    #[arg(long, global = true, value_enum)]
    link_pick: Option<LinkPick>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate, extract, normalize and store the current PDF
    Run,
    /// Locate the current PDF and report whether it is already ingested
    Check,
    /// List stored datasets
    Datasets,
    /// Print a dataset's records as JSON lines
    Show {
        dataset: String,
        /// Max records to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(db) = &self.db {
            settings.db_path = db.clone();
        }
        if self.local {
            settings.backend = Backend::Local;
        }
        if let Some(q) = &self.queue_url {
            settings.queue_url = Some(q.clone());
        }
        if let Some(pick) = self.link_pick {
            settings.link_pick = pick;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let loaded = Settings::load().map(|mut settings| {
        cli.apply(&mut settings);
        settings
    });

    let code = match &cli.command {
        Commands::Run => {
            let response = run_once(loaded).await;
            println!("{}", serde_json::to_string(&response)?);
            if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Check => check(&loaded.context("loading settings")?).await?,
        Commands::Datasets => list_datasets(&loaded.context("loading settings")?)?,
        Commands::Show { dataset, limit } => {
            show(&loaded.context("loading settings")?, dataset, *limit)?
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    Ok(code)
}

/// One scheduled invocation. Every failure, setup included, ends as a 400.
async fn run_once(settings: Result<Settings, PipelineError>) -> Response {
    let settings = match settings {
        Ok(s) => s,
        Err(e) => return pipeline::failure(&e),
    };
    let store = match open_store(&settings) {
        Ok(s) => s,
        Err(e) => return pipeline::failure(&e),
    };

    let fetch = HttpFetch::default();
    let extractor = TabulaExtractor::new(&settings.java_bin, &settings.tabula_jar);
    let queue = settings.queue_url.as_deref().map(QueueNotifier::new);
    let deps = Collaborators {
        fetch: &fetch,
        extractor: &extractor,
        store: &store,
        notifier: queue.as_ref().map(|q| q as &dyn Notifier),
    };
    pipeline::handle(&settings, &deps).await
}

async fn check(settings: &Settings) -> anyhow::Result<ExitCode> {
    let store = open_store(settings)?;
    let fetch = HttpFetch::default();
    let probe = pipeline::probe(settings, &fetch, &store).await?;
    println!("URL:      {}", probe.source.url);
    println!("Version:  {}", probe.source.version);
    println!("Dataset:  {}", probe.dataset);
    println!(
        "Ingested: {}",
        if probe.already_ingested { "yes" } else { "no" }
    );
    Ok(ExitCode::SUCCESS)
}

fn list_datasets(settings: &Settings) -> anyhow::Result<ExitCode> {
    let store = open_store(settings)?;
    let datasets = store.datasets()?;
    if datasets.is_empty() {
        println!("No datasets. Run 'run' first.");
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "{:<24} | {:<25} | {:>4} | {:>5} | {:>7}",
        "Dataset", "Created", "RCU", "WCU", "Records"
    );
    println!("{}", "-".repeat(76));
    for d in &datasets {
        println!(
            "{:<24} | {:<25} | {:>4} | {:>5} | {:>7}",
            truncate(&d.name, 24),
            d.created_at,
            d.capacity.read,
            d.capacity.write,
            d.records
        );
    }
    println!("\n{} datasets", datasets.len());
    Ok(ExitCode::SUCCESS)
}

fn show(settings: &Settings, dataset: &str, limit: Option<usize>) -> anyhow::Result<ExitCode> {
    let store = open_store(settings)?;
    if !store.dataset_exists(dataset)? {
        anyhow::bail!("no dataset named {:?}", dataset);
    }
    let records = store.records(dataset)?;
    let take = limit.unwrap_or(records.len());
    for r in records.iter().take(take) {
        println!("{}", serde_json::to_string(r)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn open_store(settings: &Settings) -> Result<SqliteStore, PipelineError> {
    if let Some(dir) = settings.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
            path: dir.display().to_string(),
            source,
        })?;
    }
    SqliteStore::open(&settings.db_path)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
