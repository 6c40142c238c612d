#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};

use catalog_collector::{
    collector::{
        SpawnRunner, TaskRunner,
        dispatch::{UnitOutput, WorkUnit},
    },
    error::Result,
    schema::{Category, ItemRecord, Location},
    sources::adapter::SourceAdapter,
};

/// Tracks how many calls are running at once.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// In-memory adapter answering from scripted tables.
#[derive(Default)]
pub struct ScriptedSource {
    pub categories: Vec<Category>,
    pub locations: HashMap<Category, Vec<Location>>,
    /// Records per location; locations not listed yield one record
    pub fan_out: HashMap<Location, usize>,
    pub failing_categories: Vec<Category>,
    pub failing_locations: Vec<Location>,
    pub delay: Duration,

    pub discovery_calls: Mutex<Vec<Category>>,
    pub fetch_calls: AtomicUsize,
    pub discovery_in_flight: InFlight,
    pub fetch_in_flight: InFlight,
}

impl ScriptedSource {
    pub fn new(listing: &[(&str, &[&str])]) -> Self {
        Self {
            categories: listing.iter().map(|(c, _)| Category::new(*c)).collect(),
            locations: listing
                .iter()
                .map(|(c, urls)| (Category::new(*c), urls.iter().map(|u| Location::new(*u)).collect()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn discovered(&self) -> Vec<String> {
        self.discovery_calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}

/// Record named after its location: `rec(u1)`, then `rec(u1)#1`, …
pub fn record(location: &Location, category: &Category, idx: usize) -> ItemRecord {
    let name = match idx {
        0 => format!("rec({})", location),
        n => format!("rec({})#{}", location, n),
    };

    ItemRecord {
        name: name.clone(),
        source: "scripted".into(),
        category: category.clone(),
        url: location.to_string(),
        discovery_url: location.to_string(),
        key: name,
        stock: -1,
        normal_price: "1000".into(),
        offer_price: "900".into(),
        currency: "CLP".into(),
        sku: None,
        picture_urls: Vec::new(),
        attributes: Map::new(),
    }
}

pub fn names(records: &[ItemRecord]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

#[async_trait::async_trait]
impl SourceAdapter for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn categories(&self) -> Vec<Category> {
        self.categories.clone()
    }

    async fn discover_locations_for_category(
        &self,
        category: &Category,
        _extra_args: &Value,
    ) -> anyhow::Result<Vec<Location>> {
        self.discovery_in_flight.enter();
        self.discovery_calls.lock().unwrap().push(category.clone());
        tokio::time::sleep(self.delay).await;
        self.discovery_in_flight.leave();

        if self.failing_categories.contains(category) {
            anyhow::bail!("page overflow: {}", category);
        }

        Ok(self.locations.get(category).cloned().unwrap_or_default())
    }

    async fn fetch_items_at_location(
        &self,
        location: &Location,
        category: &Category,
        _extra_args: &Value,
    ) -> anyhow::Result<Vec<ItemRecord>> {
        self.fetch_in_flight.enter();
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.fetch_in_flight.leave();

        if self.failing_locations.contains(location) {
            anyhow::bail!("unparseable page");
        }

        let count = self.fan_out.get(location).copied().unwrap_or(1);
        Ok((0..count).map(|i| record(location, category, i)).collect())
    }
}

/// Runner that remembers every group it was handed.
#[derive(Default)]
pub struct RecordingRunner {
    pub groups: Mutex<Vec<(String, usize)>>,
}

impl RecordingRunner {
    pub fn groups(&self) -> Vec<(String, usize)> {
        self.groups.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TaskRunner for RecordingRunner {
    async fn run_group(&self, queue: &str, units: Vec<WorkUnit>) -> Result<Vec<UnitOutput>> {
        self.groups
            .lock()
            .unwrap()
            .push((queue.to_string(), units.len()));

        SpawnRunner.run_group(queue, units).await
    }
}
