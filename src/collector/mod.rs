/// Collector module
///
/// This module groups all logic responsible for:
/// - Turning a source's categories into item locations (discovery)
/// - Turning item locations into item records (fetch)
/// - Running both phases locally or on a task runner
///
/// The collector layer acts as the orchestration layer between:
/// - Source adapters (static catalogs, JSON feeds, …)
/// - The task runner executing distributed groups
///
/// Design notes:
/// - Source-specific logic MUST NOT live here
/// - Only one chunk per phase is in flight at any time
pub mod aggregate;
pub mod discovery;
pub mod dispatch;
pub mod fetch;
pub mod pipeline;
pub mod runner;

pub use dispatch::Phase;
pub use pipeline::Collector;
pub use runner::{QueuedRunner, SpawnRunner, TaskRunner};
