//! Lazarus Engine -- scenario state persistence and load-time reconciliation.
//!
//! The [`PersistenceEngine`](engine::PersistenceEngine) records what happens
//! during a scenario run (losses, last-known positions), saves it to the
//! scenario's save slot, and on the next run of the same scenario brings the
//! live world back in line with the save: destroyed entities are removed and
//! surviving composites are respawned where they were left.
//!
//! # Modules
//!
//! - [`engine`]: the façade the host drives with events and elapsed time.
//! - [`scheduler`]: virtual-time one-shot and repeating timers.
//! - [`config`]: engine tunables.
//! - [`save`]: debounced, forced and periodic saving.
//! - [`ingest`]: destroyed-entity ingestion.
//! - [`templates`]: composite templates and the member index.
//! - [`reconcile`]: load validation, removal and respawn.
//! - [`logging`]: tracing subscriber setup.
//!
//! # Quick Start
//!
//! ```
//! use lazarus_engine::prelude::*;
//! use lazarus_store::prelude::*;
//! use lazarus_world::prelude::*;
//!
//! let desc = ScenarioDescription::new("Caucasus", "Quick Start");
//! let mut world = SimWorld::from_scenario(&desc).unwrap();
//! let mut engine =
//!     PersistenceEngine::new(EngineConfig::default(), desc, StorageGateway::disabled()).unwrap();
//!
//! engine.handle_event(&mut world, HostEvent::ScenarioStart);
//! assert_eq!(engine.phase(), ReconcilePhase::Disabled);
//! assert_eq!(world.notices().len(), 1);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod ingest;
pub mod logging;
pub mod reconcile;
pub mod save;
pub mod scheduler;
pub mod templates;

/// Re-export the host vocabulary crate for convenience.
pub use lazarus_world;

/// Re-export the storage crate for convenience.
pub use lazarus_store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A save was attempted before the previous session's snapshot was
    /// loaded; writing now would overwrite it.
    #[error("snapshot not loaded yet; refusing to overwrite the save slot")]
    NotLoaded,

    #[error(transparent)]
    Store(#[from] lazarus_store::StoreError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use crate::config::{ConfigError, EngineConfig, RepositionCategories};
    pub use crate::engine::PersistenceEngine;
    pub use crate::reconcile::{LoadOutcome, PendingOp, ReconcilePhase, RespawnOutcome};
    pub use crate::save::SaveStats;
    pub use crate::scheduler::{Scheduler, TimerHandle};
    pub use crate::templates::{CompositeTemplate, MemberConflict, TemplateIndex};
    pub use crate::EngineError;
}
