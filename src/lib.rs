// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs and run config resolution
// - schema:    Category, location and item record types
// - error:     Error kinds surfaced by a collection run
// - util:      Shared helpers (chunking)
// - metrics:   Global runtime counters
// - sources:   Source adapters and adapter registry
// - collector: Discovery / fetch orchestration and task runners
//
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod schema;
pub mod sources;
pub mod util;

pub use collector::Collector;
pub use error::{CollectError, Result};
