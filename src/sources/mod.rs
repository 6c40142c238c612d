//! Source adapter registry and factory
//!
//! This module provides:
//! - The `SourceAdapter` trait every catalog source implements
//! - An explicit registry resolving adapters by name
//! - Generic built-in adapters
//!
//! All source-specific logic must live in dedicated adapter modules.
//! The collection engine interacts exclusively through the
//! `SourceAdapter` trait.

pub mod adapter;
pub mod json_feed;
pub mod static_catalog;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use adapter::SourceAdapter;

/// Builds an adapter from the `settings` object of its source config.
pub type SourceConstructor = fn(&Value) -> anyhow::Result<Arc<dyn SourceAdapter>>;

/// Maps source names to adapter constructors.
///
/// DESIGN:
/// - Keeps adapter creation in one place
/// - Passed explicitly to the collector; there is no global lookup
///
/// THREADING:
/// - Adapters are wrapped in `Arc`
/// - The same adapter instance is shared across all units of a run
///
#[derive(Clone, Default)]
pub struct SourceRegistry {
    constructors: BTreeMap<String, SourceConstructor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every adapter shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(static_catalog::NAME, static_catalog::build);
        registry.register(json_feed::NAME, json_feed::build);
        registry
    }

    /// Registers `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, constructor: SourceConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Builds the adapter registered under `name`.
    ///
    /// RETURNS:
    /// - `None` if the name is unknown
    /// - `Some(Err(_))` if the constructor rejected `settings`
    pub fn build(
        &self,
        name: &str,
        settings: &Value,
    ) -> Option<anyhow::Result<Arc<dyn SourceAdapter>>> {
        self.constructors.get(name).map(|ctor| ctor(settings))
    }
}
