use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ------------------------------------------------------------
// Category
// ------------------------------------------------------------
//
// Opaque tag naming a class of items a source carries
// (e.g. "Notebook", "Headphones").
//
// The collector only compares categories; their meaning is
// owned by each source adapter.
//
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ------------------------------------------------------------
// Location
// ------------------------------------------------------------
//
// Opaque pointer to one item listing, usually a URL.
// Produced by discovery, consumed by fetch.
//
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A discovered location paired with the category it was found under.
///
/// This is the unit of work threaded from discovery into fetch.
/// The same location found under two categories yields two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEntry {
    pub location: Location,
    pub category: Category,
}

impl DiscoveryEntry {
    pub fn new(location: Location, category: Category) -> Self {
        Self { location, category }
    }
}

// ------------------------------------------------------------
// Item record
// ------------------------------------------------------------
//
// Fully fetched representation of one catalog item, built by
// source adapters and passed through the pipeline untouched.
//
// DESIGN DECISION:
// Prices are kept as strings to avoid floating-point precision
// issues, the same way amounts travel through the rest of the
// ingestion stack.
//
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Display name as published by the source
    pub name: String,

    /// Source identifier (registry name of the adapter)
    pub source: String,

    /// Category the item was discovered under
    pub category: Category,

    /// Canonical item URL
    pub url: String,

    /// Location the item was fetched from
    pub discovery_url: String,

    /// Source-unique item key
    pub key: String,

    /// Units in stock, -1 when unknown but available
    pub stock: i64,

    pub normal_price: String,
    pub offer_price: String,
    pub currency: String,

    #[serde(default)]
    pub sku: Option<String>,

    #[serde(default)]
    pub picture_urls: Vec<String>,

    /// Free-form, source-specific attributes
    #[serde(default)]
    pub attributes: Map<String, Value>,
}
