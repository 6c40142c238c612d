use std::sync::Arc;

use anyhow::Context;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::SourcePreferences,
    schema::{Category, ItemRecord, Location},
};

use super::adapter::SourceAdapter;

pub const NAME: &str = "json_feed";

/// Generic JSON-over-HTTP catalog source.
///
/// DISCOVERY:
/// - GET `{base_url}/{path}?page=N`, N = 1, 2, …
/// - Each page is a JSON array of item URLs
/// - The first empty page ends the category
/// - Going past `max_pages` fails the category (page overflow)
///
/// FETCH:
/// - GET the item URL
/// - Body is one `ItemRecord` object or an array of them
/// - HTTP 404 means the item is gone: zero records
///
/// EXTRA ARGS:
/// - `{"headers": {"name": "value", …}}` added to every request
///
pub struct JsonFeedAdapter {
    client: Client,
    settings: JsonFeedSettings,
}

#[derive(Debug, Deserialize)]
struct JsonFeedSettings {
    base_url: String,

    categories: Vec<FeedCategory>,

    #[serde(default = "default_max_pages")]
    max_pages: u32,

    #[serde(default)]
    preferences: SourcePreferences,
}

#[derive(Debug, Deserialize)]
struct FeedCategory {
    name: Category,
    path: String,
}

fn default_max_pages() -> u32 {
    10
}

pub fn build(settings: &Value) -> anyhow::Result<Arc<dyn SourceAdapter>> {
    let settings = JsonFeedSettings::deserialize(settings)
        .context("invalid json_feed settings")?;

    Ok(Arc::new(JsonFeedAdapter {
        client: Client::new(),
        settings,
    }))
}

impl JsonFeedAdapter {
    fn page_url(&self, path: &str, page: u32) -> String {
        format!(
            "{}/{}?page={}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            page
        )
    }

    fn category_path(&self, category: &Category) -> Option<&str> {
        self.settings
            .categories
            .iter()
            .find(|c| &c.name == category)
            .map(|c| c.path.as_str())
    }
}

/// Adds `extra_args.headers` to the request, if present.
fn with_headers(mut request: RequestBuilder, extra_args: &Value) -> RequestBuilder {
    if let Some(headers) = extra_args.get("headers").and_then(Value::as_object) {
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                request = request.header(name.as_str(), value);
            }
        }
    }
    request
}

/// Decodes an item body: a single record or an array of records.
fn decode_records(body: Value) -> anyhow::Result<Vec<ItemRecord>> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(anyhow::Error::from))
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

#[async_trait::async_trait]
impl SourceAdapter for JsonFeedAdapter {

    fn name(&self) -> &str {
        NAME
    }

    fn categories(&self) -> Vec<Category> {
        self.settings.categories.iter().map(|c| c.name.clone()).collect()
    }

    fn preferences(&self) -> SourcePreferences {
        self.settings.preferences.clone()
    }

    async fn discover_locations_for_category(
        &self,
        category: &Category,
        extra_args: &Value,
    ) -> anyhow::Result<Vec<Location>> {
        let path = self
            .category_path(category)
            .with_context(|| format!("category {} is not declared", category))?;

        let mut locations = Vec::new();
        let mut page = 1;

        loop {
            if page > self.settings.max_pages {
                anyhow::bail!("page overflow: {}", path);
            }

            let url = self.page_url(path, page);
            let urls: Vec<String> = with_headers(self.client.get(&url), extra_args)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .with_context(|| format!("invalid listing page {}", url))?;

            if urls.is_empty() {
                if page == 1 {
                    log::warn!("Empty category: {}", path);
                }
                break;
            }

            locations.extend(urls.into_iter().map(Location::new));
            page += 1;
        }

        Ok(locations)
    }

    async fn fetch_items_at_location(
        &self,
        location: &Location,
        _category: &Category,
        extra_args: &Value,
    ) -> anyhow::Result<Vec<ItemRecord>> {
        let response = with_headers(self.client.get(location.as_str()), extra_args)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let body: Value = response.error_for_status()?.json().await?;
        decode_records(body).with_context(|| format!("invalid item at {}", location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> JsonFeedAdapter {
        let settings = JsonFeedSettings::deserialize(&json!({
            "base_url": "https://catalog.example/api/",
            "categories": [
                { "name": "Notebook", "path": "/notebooks" },
                { "name": "Mouse", "path": "accessories/mice" }
            ]
        }))
        .unwrap();

        JsonFeedAdapter {
            client: Client::new(),
            settings,
        }
    }

    fn record(key: &str) -> Value {
        json!({
            "name": key,
            "source": NAME,
            "category": "Mouse",
            "url": key,
            "discovery_url": key,
            "key": key,
            "stock": 0,
            "normal_price": "1",
            "offer_price": "1",
            "currency": "USD"
        })
    }

    #[test]
    fn builds_page_urls() {
        let adapter = adapter();

        assert_eq!(
            adapter.page_url("/notebooks", 3),
            "https://catalog.example/api/notebooks?page=3"
        );
        assert_eq!(adapter.settings.max_pages, 10);
        assert_eq!(
            adapter.categories(),
            vec![Category::new("Notebook"), Category::new("Mouse")]
        );
    }

    #[test]
    fn decodes_single_and_many_records() {
        assert_eq!(decode_records(record("a")).unwrap().len(), 1);

        let many = decode_records(json!([record("a"), record("b")])).unwrap();
        assert_eq!(many.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        assert!(decode_records(Value::Null).unwrap().is_empty());
        assert!(decode_records(json!({ "name": "broken" })).is_err());
    }

    #[tokio::test]
    async fn undeclared_category_is_an_error() {
        let err = adapter()
            .discover_locations_for_category(&"Tablet".into(), &Value::Null)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not declared"));
    }
}
