use thiserror::Error;

use crate::schema::{Category, Location};

/// Errors surfaced by the collection engine.
///
/// A run either returns every record or exactly one of these.
/// The variant names the failing phase; the fields name the
/// category or location involved and the adapter's cause.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Invalid run configuration (e.g. zero concurrency)
    #[error("config error: {0}")]
    Config(String),

    /// The adapter failed to discover locations for a category
    #[error("discovery failed for {source_name} [{category}]: {cause:#}")]
    Discovery {
        source_name: String,
        category: Category,
        #[source]
        cause: anyhow::Error,
    },

    /// The adapter failed to fetch the item at a location
    #[error("fetch failed for {source_name} [{category}] {location}: {cause:#}")]
    Fetch {
        source_name: String,
        location: Location,
        category: Category,
        #[source]
        cause: anyhow::Error,
    },

    /// A unit could not be submitted to, or returned from, the task runner
    #[error("dispatch failed on queue {queue}: {reason}")]
    Dispatch { queue: String, reason: String },

    /// No adapter is registered under this name
    #[error("source '{0}' is not supported")]
    UnknownSource(String),
}

impl CollectError {
    pub fn dispatch(queue: &str, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            queue: queue.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectError>;
