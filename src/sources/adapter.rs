use serde_json::Value;

use crate::config::SourcePreferences;
use crate::schema::{Category, ItemRecord, Location};

/// SourceAdapter is the abstraction layer between:
/// - The generic collection engine
/// - A source-specific catalog (HTML pages, JSON APIs, …)
///
/// Each source implementation must:
/// - Declare the categories it carries
/// - Discover item locations for one category
/// - Fetch the item record(s) found at one location
///
/// DESIGN GOALS:
/// - Zero source-specific logic outside adapters
/// - One adapter per source
/// - Uniform `ItemRecord` output across all sources
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One instance is invoked from many concurrently running units
///
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {

    /// Returns the canonical source name.
    ///
    /// CONTRACT:
    /// - Must match the name the adapter is registered under
    /// - Used for logging, error reporting and `ItemRecord::source`
    ///
    fn name(&self) -> &str;

    /// Returns the categories this source carries, in the order
    /// they should be processed.
    ///
    /// MUST NOT:
    /// - Perform network I/O
    /// - Change between calls
    ///
    fn categories(&self) -> Vec<Category>;

    /// How this source prefers to be run.
    ///
    /// Anything left unset falls back to the collector defaults.
    fn preferences(&self) -> SourcePreferences {
        SourcePreferences::default()
    }

    /// Discovers every item location listed under `category`.
    ///
    /// RETURNS:
    /// - Locations in source order, possibly empty
    ///
    /// ERRORS:
    /// - Unrecoverable anomalies (e.g. pagination overflow) must
    ///   fail instead of returning a silently truncated list
    ///
    async fn discover_locations_for_category(
        &self,
        category: &Category,
        extra_args: &Value,
    ) -> anyhow::Result<Vec<Location>>;

    /// Fetches the item record(s) at `location`.
    ///
    /// RETURNS:
    /// - Zero records when the location holds no valid item
    ///   (delisted, malformed page). This is not an error.
    /// - One or more records otherwise, in source order
    ///
    async fn fetch_items_at_location(
        &self,
        location: &Location,
        category: &Category,
        extra_args: &Value,
    ) -> anyhow::Result<Vec<ItemRecord>>;
}
