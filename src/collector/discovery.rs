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
    schema::{Category, DiscoveryEntry},
    sources::adapter::SourceAdapter,
    util,
};

/// Categories to process: the declared ones, restricted to `requested`.
///
/// Order always follows `declared`. Requested categories the
/// source does not declare are dropped silently.
pub fn effective_categories(declared: Vec<Category>, requested: Option<&[Category]>) -> Vec<Category> {
    match requested {
        None => declared,
        Some(requested) => declared
            .into_iter()
            .filter(|c| requested.contains(c))
            .collect(),
    }
}

/// Discovers `(location, category)` pairs for a source.
///
/// FLOW:
/// - Resolve the category list
/// - Sync: one category at a time, on the calling task
/// - Distributed: chunks of `discovery_concurrency` categories,
///   one group per chunk; the next chunk is submitted only after
///   the previous group fully resolved
///
/// ORDER:
/// - Category order, then adapter order within a category
///
/// FAILURE:
/// - The first failing category fails the whole call; nothing
///   discovered so far is returned
///
pub async fn discover_locations(
    adapter: &Arc<dyn SourceAdapter>,
    categories: Option<&[Category]>,
    config: &RunConfig,
    runner: &Arc<dyn TaskRunner>,
) -> Result<Vec<DiscoveryEntry>> {
    let categories = effective_categories(adapter.categories(), categories);
    let dispatch = Dispatch::new(Phase::Discovery, config, runner);

    let mut progress = PhaseProgress::start(
        Phase::Discovery,
        adapter.name(),
        categories.len(),
        dispatch.queue_name(),
    );

    let chunks = util::chunk(&categories, dispatch.chunk_size(config.discovery_concurrency))?;
    let mut entries = Vec::new();

    for (idx, chunk) in chunks.iter().enumerate() {
        let labels: Vec<String> = chunk.iter().map(Category::to_string).collect();
        progress.chunk_started(idx, &labels);

        let units = chunk
            .iter()
            .map(|category| discovery_unit(adapter.clone(), category.clone(), config.extra_args.clone()))
            .collect();

        let outputs = dispatch.run_chunk(units).await?;
        aggregate::merge_locations(&mut entries, chunk, outputs, &mut progress)?;
    }

    progress.finish();
    Ok(entries)
}

/// One discovery unit: a single category on a single adapter.
fn discovery_unit(adapter: Arc<dyn SourceAdapter>, category: Category, extra_args: Value) -> WorkUnit {
    Box::pin(async move {
        let discovered = adapter
            .discover_locations_for_category(&category, &extra_args)
            .await;

        match discovered {
            Ok(locations) => Ok(UnitOutput::Locations(locations)),
            Err(cause) => Err(CollectError::Discovery {
                source_name: adapter.name().to_string(),
                category,
                cause,
            }),
        }
    })
}
