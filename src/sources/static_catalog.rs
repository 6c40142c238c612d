use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::SourcePreferences,
    schema::{Category, ItemRecord, Location},
};

use super::adapter::SourceAdapter;

pub const NAME: &str = "static_catalog";

/// Catalog declared inline in the source settings.
///
/// Used for dry runs of a collection config without touching
/// the network. Category and location order follow the settings.
///
/// SETTINGS:
/// ```json
/// {
///   "preferences": { "mode": "sync" },
///   "categories": [
///     { "name": "Notebook",
///       "locations": [ { "url": "https://…/nb-1", "records": [ … ] } ] }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    preferences: SourcePreferences,

    categories: Vec<StaticCategory>,
}

#[derive(Debug, Deserialize)]
struct StaticCategory {
    name: Category,

    #[serde(default)]
    locations: Vec<StaticLocation>,
}

#[derive(Debug, Deserialize)]
struct StaticLocation {
    url: Location,

    #[serde(default)]
    records: Vec<ItemRecord>,
}

pub fn build(settings: &Value) -> anyhow::Result<Arc<dyn SourceAdapter>> {
    let catalog = StaticCatalog::deserialize(settings)
        .context("invalid static_catalog settings")?;
    Ok(Arc::new(catalog))
}

impl StaticCatalog {
    fn category(&self, category: &Category) -> Option<&StaticCategory> {
        self.categories.iter().find(|c| &c.name == category)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for StaticCatalog {

    fn name(&self) -> &str {
        NAME
    }

    fn categories(&self) -> Vec<Category> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    fn preferences(&self) -> SourcePreferences {
        self.preferences.clone()
    }

    async fn discover_locations_for_category(
        &self,
        category: &Category,
        _extra_args: &Value,
    ) -> anyhow::Result<Vec<Location>> {
        let Some(entry) = self.category(category) else {
            anyhow::bail!("category {} is not declared", category);
        };

        if entry.locations.is_empty() {
            log::warn!("Empty category: {}", category);
        }

        Ok(entry.locations.iter().map(|l| l.url.clone()).collect())
    }

    async fn fetch_items_at_location(
        &self,
        location: &Location,
        category: &Category,
        _extra_args: &Value,
    ) -> anyhow::Result<Vec<ItemRecord>> {
        // Unknown locations hold no item
        let records = self
            .category(category)
            .and_then(|c| c.locations.iter().find(|l| &l.url == location))
            .map(|l| l.records.clone())
            .unwrap_or_default();

        Ok(records)
    }
}
