use std::sync::Arc;

use serde_json::Value;

use crate::{
    collector::{
        aggregate::{self, PhaseProgress},
        dispatch::{Dispatch, Phase, UnitOutput, WorkUnit},
        runner::TaskRunner,
    },
    config::RunConfig,
    error::{CollectError, Result},
    schema::{DiscoveryEntry, ItemRecord},
    sources::adapter::SourceAdapter,
    util,
};

/// Fetches the item records behind discovered locations.
///
/// FLOW:
/// - Sync: one entry at a time, on the calling task
/// - Distributed: chunks of `fetch_concurrency` entries, one
///   group per chunk, strictly one group in flight
///
/// OUTPUT:
/// - Every record of every entry, flattened in entry order
/// - A location yielding zero records contributes nothing
/// - Entries are not deduplicated
///
/// FAILURE:
/// - The first failing location fails the whole call
///
pub async fn fetch_records(
    adapter: &Arc<dyn SourceAdapter>,
    entries: &[DiscoveryEntry],
    config: &RunConfig,
    runner: &Arc<dyn TaskRunner>,
) -> Result<Vec<ItemRecord>> {
    let dispatch = Dispatch::new(Phase::Fetch, config, runner);

    let mut progress = PhaseProgress::start(
        Phase::Fetch,
        adapter.name(),
        entries.len(),
        dispatch.queue_name(),
    );

    let chunks = util::chunk(entries, dispatch.chunk_size(config.fetch_concurrency))?;
    let mut records = Vec::new();

    for (idx, chunk) in chunks.iter().enumerate() {
        let labels: Vec<String> = chunk.iter().map(|e| e.location.to_string()).collect();
        progress.chunk_started(idx, &labels);

        let units = chunk
            .iter()
            .map(|entry| fetch_unit(adapter.clone(), entry.clone(), config.extra_args.clone()))
            .collect();

        let outputs = dispatch.run_chunk(units).await?;
        aggregate::merge_records(&mut records, chunk, outputs, &mut progress)?;
    }

    progress.finish();
    Ok(records)
}

/// One fetch unit: a single location on a single adapter.
fn fetch_unit(adapter: Arc<dyn SourceAdapter>, entry: DiscoveryEntry, extra_args: Value) -> WorkUnit {
    Box::pin(async move {
        let DiscoveryEntry { location, category } = entry;

        let fetched = adapter
            .fetch_items_at_location(&location, &category, &extra_args)
            .await;

        match fetched {
            Ok(records) => Ok(UnitOutput::Records(records)),
            Err(cause) => Err(CollectError::Fetch {
                source_name: adapter.name().to_string(),
                location,
                category,
                cause,
            }),
        }
    })
}
