use serde::Deserialize;
use serde_json::Value;

use crate::collector::dispatch::Phase;
use crate::error::{CollectError, Result};
use crate::schema::Category;

// ------------------------------------------------------------
// Hard defaults
// ------------------------------------------------------------
//
// Used when neither the caller nor the source adapter states
// a preference.
//
pub const DEFAULT_MODE: ExecutionMode = ExecutionMode::Distributed;
pub const DEFAULT_QUEUE: &str = "us";
pub const DEFAULT_DISCOVERY_CONCURRENCY: usize = 5;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 40;

/// Where units of work execute.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// In sequence, on the calling task
    Sync,

    /// As groups on the distributed task runner, one chunk at a time
    Distributed,
}

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - Which sources to collect and how
// - Which task runner executes distributed groups
// - Where fetched records are written
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Sources to collect, in run order
    pub sources: Vec<SourceConfig>,

    /// Task runner used for distributed execution
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Optional JSON-lines output file (stdout when absent)
    pub output: Option<String>,
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// One collection run per enabled source.
//
// Notes:
// - `name` must match a name in the source registry.
// - `categories` restricts the run; unknown entries are ignored.
// - `settings` is handed verbatim to the adapter constructor.
//
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,

    pub enabled: bool,

    #[serde(default)]
    pub categories: Option<Vec<Category>>,

    #[serde(default)]
    pub options: RunOptions,

    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// One tokio task per unit
    #[default]
    Spawn,

    /// Queue-routed worker pools
    Queued,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    #[serde(default)]
    pub kind: RunnerKind,

    /// Worker tasks per derived queue (queued runner only)
    #[serde(default = "default_workers_per_queue")]
    pub workers_per_queue: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            kind: RunnerKind::default(),
            workers_per_queue: default_workers_per_queue(),
        }
    }
}

fn default_workers_per_queue() -> usize {
    8
}

// ------------------------------------------------------------
// Adapter preferences
// ------------------------------------------------------------
//
// Each source may state how it prefers to be run. Any field
// left as `None` falls back to the hard defaults above.
//
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SourcePreferences {
    pub mode: Option<ExecutionMode>,
    pub queue: Option<String>,
    pub discovery_concurrency: Option<usize>,
    pub fetch_concurrency: Option<usize>,
}

// ------------------------------------------------------------
// Caller overrides
// ------------------------------------------------------------
//
// Everything is optional. `RunOptions` layers phase-specific
// overrides on top of the shared ones, so discovery and fetch
// may run with different modes, queues or concurrency.
//
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RunOverrides {
    pub mode: Option<ExecutionMode>,
    pub queue: Option<String>,
    pub discovery_concurrency: Option<usize>,
    pub fetch_concurrency: Option<usize>,
    pub extra_args: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RunOptions {
    #[serde(flatten)]
    pub shared: RunOverrides,

    #[serde(default)]
    pub discovery: RunOverrides,

    #[serde(default)]
    pub fetch: RunOverrides,
}

impl RunOptions {
    /// Same overrides for both phases.
    pub fn shared(overrides: RunOverrides) -> Self {
        Self {
            shared: overrides,
            ..Self::default()
        }
    }

    fn for_phase(&self, phase: Phase) -> &RunOverrides {
        match phase {
            Phase::Discovery => &self.discovery,
            Phase::Fetch => &self.fetch,
        }
    }
}

/// Fully resolved, immutable configuration for one phase run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub mode: ExecutionMode,
    pub queue: String,
    pub discovery_concurrency: usize,
    pub fetch_concurrency: usize,

    /// Opaque passthrough to the adapter (`Null` when unset)
    pub extra_args: Value,
}

impl RunConfig {
    /// Resolves the effective config of `phase`.
    ///
    /// Precedence, field by field:
    /// phase override > shared override > adapter preference > hard default.
    ///
    /// ERRORS:
    /// - `CollectError::Config` if a resolved concurrency is zero
    pub fn resolve(
        phase: Phase,
        options: &RunOptions,
        preferences: &SourcePreferences,
    ) -> Result<Self> {
        let phase_overrides = options.for_phase(phase);
        let shared = &options.shared;

        let cfg = Self {
            mode: phase_overrides
                .mode
                .or(shared.mode)
                .or(preferences.mode)
                .unwrap_or(DEFAULT_MODE),
            queue: phase_overrides
                .queue
                .clone()
                .or_else(|| shared.queue.clone())
                .or_else(|| preferences.queue.clone())
                .unwrap_or_else(|| DEFAULT_QUEUE.to_string()),
            discovery_concurrency: phase_overrides
                .discovery_concurrency
                .or(shared.discovery_concurrency)
                .or(preferences.discovery_concurrency)
                .unwrap_or(DEFAULT_DISCOVERY_CONCURRENCY),
            fetch_concurrency: phase_overrides
                .fetch_concurrency
                .or(shared.fetch_concurrency)
                .or(preferences.fetch_concurrency)
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
            extra_args: phase_overrides
                .extra_args
                .clone()
                .or_else(|| shared.extra_args.clone())
                .unwrap_or(Value::Null),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.discovery_concurrency == 0 {
            return Err(CollectError::Config(
                "discovery_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(CollectError::Config(
                "fetch_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
