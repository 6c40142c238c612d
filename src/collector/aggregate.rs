use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};

use crate::{
    collector::dispatch::{Phase, UnitOutput},
    error::{CollectError, Result},
    metrics::METRICS,
    schema::{Category, DiscoveryEntry, ItemRecord},
};

/// Merges chunk outputs back into phase order and reports progress.
///
/// Progress reporting is observational only: logs and metrics.
/// The merge functions are the part the phases depend on.
pub struct PhaseProgress {
    phase: Phase,
    source: String,
    queue: Option<String>,
    started_at: DateTime<Utc>,
    chunks: usize,
    units: usize,
    produced: usize,
}

impl PhaseProgress {
    pub fn start(phase: Phase, source: &str, inputs: usize, queue: Option<&str>) -> Self {
        match phase {
            Phase::Discovery => log::info!(
                "Discovering URLs for: {} ({} categories, {})",
                source,
                inputs,
                queue.unwrap_or("sync")
            ),
            Phase::Fetch => log::info!(
                "Obtaining products for: {} ({} URLs, {})",
                source,
                inputs,
                queue.unwrap_or("sync")
            ),
        }

        Self {
            phase,
            source: source.to_string(),
            queue: queue.map(str::to_string),
            started_at: Utc::now(),
            chunks: 0,
            units: 0,
            produced: 0,
        }
    }

    /// Called before a chunk is dispatched.
    pub fn chunk_started(&mut self, index: usize, labels: &[String]) {
        self.chunks += 1;
        self.units += labels.len();

        log::log!(
            self.chunk_level(),
            "[{} {}] chunk {} ({} units): {}",
            self.source,
            self.phase,
            index,
            labels.len(),
            labels.join(", ")
        );
    }

    // Sync chunks hold a single unit, so their line goes to debug
    fn chunk_level(&self) -> log::Level {
        match self.queue {
            Some(_) => log::Level::Info,
            None => log::Level::Debug,
        }
    }

    fn unit_finished(&mut self, label: &str, produced: usize) {
        self.produced += produced;
        log::debug!("[{} {}] {} -> {}", self.source, self.phase, label, produced);
    }

    /// Logs the phase summary and updates the global counters.
    pub fn finish(self) -> usize {
        let elapsed = Utc::now() - self.started_at;

        log::info!(
            "[{} {}] done: {} chunks, {} units, {} results in {} ms",
            self.source,
            self.phase,
            self.chunks,
            self.units,
            self.produced,
            elapsed.num_milliseconds()
        );

        let counter = match self.phase {
            Phase::Discovery => &METRICS.locations_discovered,
            Phase::Fetch => &METRICS.records_fetched,
        };
        counter.fetch_add(self.produced, Ordering::Relaxed);

        self.produced
    }
}

fn mismatch(progress: &PhaseProgress, detail: &str) -> CollectError {
    CollectError::dispatch(progress.queue.as_deref().unwrap_or("sync"), detail)
}

/// Appends `(location, category)` pairs for one discovery chunk.
///
/// `outputs[i]` belongs to `chunk[i]`; locations keep the order
/// the adapter returned them in.
pub fn merge_locations(
    entries: &mut Vec<DiscoveryEntry>,
    chunk: &[Category],
    outputs: Vec<UnitOutput>,
    progress: &mut PhaseProgress,
) -> Result<()> {
    if outputs.len() != chunk.len() {
        return Err(mismatch(progress, "group returned a different number of results"));
    }

    for (category, output) in chunk.iter().zip(outputs) {
        let UnitOutput::Locations(locations) = output else {
            return Err(mismatch(progress, "discovery unit returned records"));
        };

        progress.unit_finished(category.as_str(), locations.len());
        for (idx, location) in locations.iter().enumerate() {
            log::debug!("{} - {}", idx, location);
        }

        entries.extend(
            locations
                .into_iter()
                .map(|location| DiscoveryEntry::new(location, category.clone())),
        );
    }

    Ok(())
}

/// Appends every record returned for one fetch chunk, in order.
pub fn merge_records(
    records: &mut Vec<ItemRecord>,
    chunk: &[DiscoveryEntry],
    outputs: Vec<UnitOutput>,
    progress: &mut PhaseProgress,
) -> Result<()> {
    if outputs.len() != chunk.len() {
        return Err(mismatch(progress, "group returned a different number of results"));
    }

    for (entry, output) in chunk.iter().zip(outputs) {
        let UnitOutput::Records(found) = output else {
            return Err(mismatch(progress, "fetch unit returned locations"));
        };

        progress.unit_finished(entry.location.as_str(), found.len());
        records.extend(found);
    }

    Ok(())
}
