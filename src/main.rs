use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::sleep;

use catalog_collector::{
    collector::{Collector, QueuedRunner, SpawnRunner, TaskRunner},
    config::{Config, RunnerKind},
    metrics::METRICS,
    schema::ItemRecord,
    sources::SourceRegistry,
};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Runs one collection per enabled source in config order.
//
// Responsibilities:
// - Initialize logging
// - Load configuration
// - Build the task runner and source registry
// - Write every fetched record as one JSON line
//
// A failing source is logged and skipped; the process exits
// non-zero at the end if any source failed.
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = config_path();
    let config = load_config(&path)?;

    let runner: Arc<dyn TaskRunner> = match config.runner.kind {
        RunnerKind::Spawn => Arc::new(SpawnRunner),
        RunnerKind::Queued => Arc::new(QueuedRunner::new(config.runner.workers_per_queue)),
    };
    let collector = Collector::new(runner, SourceRegistry::builtin());

    // --------------------------------------------------------
    // Metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    tokio::spawn(async {
        loop {
            sleep(Duration::from_secs(10)).await;
            log::info!("[METRICS] {}", METRICS.summary());
        }
    });

    let mut out = open_output(config.output.as_deref())?;
    let mut failed = Vec::new();

    for source in config.sources.iter().filter(|s| s.enabled) {
        if !collector.registry().contains(&source.name) {
            log::error!("Source '{}' is not supported", source.name);
            failed.push(source.name.clone());
            continue;
        }

        log::info!("Starting {} collection", source.name);

        match collector.collect_source(source).await {
            Ok(records) => {
                write_records(&mut out, &records)?;
                log::info!("{}: {} records", source.name, records.len());
            }
            Err(e) => {
                log::error!("{} failed: {}", source.name, e);
                failed.push(source.name.clone());
            }
        }

        log::info!("[METRICS] {}", METRICS.summary());
    }

    out.flush()?;

    if !failed.is_empty() {
        anyhow::bail!("collection failed for: {}", failed.join(", "));
    }

    Ok(())
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Path resolution: first CLI argument, then the
// COLLECTOR_CONFIG environment variable, then `config.json`.
//
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("COLLECTOR_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let cfg = serde_json::from_str(&data).with_context(|| format!("parsing {}", path))?;
    Ok(cfg)
}

fn open_output(path: Option<&str>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn write_records(out: &mut dyn Write, records: &[ItemRecord]) -> anyhow::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
