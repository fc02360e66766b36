use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Backend, Settings};
use crate::error::{PipelineError, Result};
use crate::extract::TableExtractor;
use crate::normalize::{self, NormalizedRecord};
use crate::notify::Notifier;
use crate::source::{self, Fetch, PdfSource};
use crate::store::{Capacity, Dimension, ScalingPolicy, Store};

const READY_POLLS: u32 = 20;
const READY_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a run talks to besides its settings.
pub struct Collaborators<'a> {
    pub fetch: &'a dyn Fetch,
    pub extractor: &'a dyn TableExtractor,
    pub store: &'a dyn Store,
    pub notifier: Option<&'a dyn Notifier>,
}

/// What the locator found and whether the gate would stop there.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub source: PdfSource,
    pub dataset: String,
    pub already_ingested: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    AlreadyIngested {
        dataset: String,
    },
    Ingested {
        dataset: String,
        records: usize,
        /// Queue endpoint, when a message was sent.
        notified: Option<String>,
    },
}

impl Outcome {
    fn body(&self) -> String {
        match self {
            Outcome::Ingested {
                notified: Some(queue),
                ..
            } => format!("successfully sent a message to {}", queue),
            _ => "succeeded".to_string(),
        }
    }
}

/// Result contract handed back to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Runs once and collapses any failure into a 400 after logging it.
pub async fn handle(settings: &Settings, deps: &Collaborators<'_>) -> Response {
    match run(settings, deps).await {
        Ok(outcome) => Response {
            status_code: 200,
            body: outcome.body(),
        },
        Err(e) => failure(&e),
    }
}

/// Logs `err` with its kind and answers 400. Also used for failures before a
/// run can start (settings, store).
pub fn failure(err: &PipelineError) -> Response {
    error!(kind = err.kind(), "Run failed: {}", err);
    Response {
        status_code: 400,
        body: "error".to_string(),
    }
}

/// Locate the PDF and check the version gate.
pub async fn probe(settings: &Settings, fetch: &dyn Fetch, store: &dyn Store) -> Result<Probe> {
    let source = source::locate(fetch, &settings.index_url, settings.link_pick).await?;
    let dataset = settings.dataset_name(&source.version);
    let already_ingested = settings.is_versioned() && store.dataset_exists(&dataset)?;
    Ok(Probe {
        source,
        dataset,
        already_ingested,
    })
}

pub async fn run(settings: &Settings, deps: &Collaborators<'_>) -> Result<Outcome> {
    let Probe {
        source,
        dataset,
        already_ingested,
    } = probe(settings, deps.fetch, deps.store).await?;
    if already_ingested {
        info!(dataset = %dataset, "Version already ingested, nothing to do");
        return Ok(Outcome::AlreadyIngested { dataset });
    }

    info!("Downloading {}", source.url);
    let pdf = deps.fetch.bytes(&source.url).await?;
    let frames = deps.extractor.extract(&pdf).await?;
    let records = normalize::normalize(&frames)?;
    let unparsed = records
        .iter()
        .flat_map(|r| r.ages())
        .filter(Option::is_none)
        .count();
    if unparsed > 0 {
        warn!(unparsed, "Some age cells were not numbers");
    }
    info!(records = records.len(), "Normalized {} tables", frames.len());

    sink(settings, deps, &dataset, &records).await
}

async fn sink(
    settings: &Settings,
    deps: &Collaborators<'_>,
    dataset: &str,
    records: &[NormalizedRecord],
) -> Result<Outcome> {
    let capacity = Capacity {
        read: settings.read_capacity,
        write: settings.write_capacity,
    };
    let created = deps.store.ensure_dataset(dataset, capacity)?;

    // A dataset created by this run is dropped again if the write fails.
    let written = match fill(settings, deps.store, dataset, created, records).await {
        Ok(n) => n,
        Err(e) => {
            if created {
                warn!(dataset = %dataset, "Write failed, dropping new dataset");
                if let Err(undo) = deps.store.drop_dataset(dataset) {
                    warn!(dataset = %dataset, "Could not drop dataset: {}", undo);
                }
            }
            return Err(e);
        }
    };

    let notified = match deps.notifier {
        Some(n) => {
            n.send(dataset).await?;
            Some(n.endpoint().to_string())
        }
        None => None,
    };

    Ok(Outcome::Ingested {
        dataset: dataset.to_string(),
        records: written,
        notified,
    })
}

async fn fill(
    settings: &Settings,
    store: &dyn Store,
    dataset: &str,
    created: bool,
    records: &[NormalizedRecord],
) -> Result<usize> {
    wait_until_ready(store, dataset).await?;
    if created && settings.backend == Backend::Managed {
        let policy = ScalingPolicy::default();
        for dimension in [Dimension::Read, Dimension::Write] {
            store.register_scaling(dataset, dimension, &policy)?;
        }
    }
    store.upsert(dataset, records)
}

async fn wait_until_ready(store: &dyn Store, dataset: &str) -> Result<()> {
    for _ in 0..READY_POLLS {
        if store.is_ready(dataset)? {
            return Ok(());
        }
        tokio::time::sleep(READY_INTERVAL).await;
    }
    Err(PipelineError::NotReady(dataset.to_string()))
}

// ── Tests ──
