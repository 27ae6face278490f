//! Lazarus World -- host vocabulary for scenario persistence.
//!
//! This crate defines everything the persistence engine knows about the
//! simulation it runs inside: generational entity handles, the static
//! [`ScenarioDescription`](scenario::ScenarioDescription) a scenario was
//! authored with, the lifecycle [`HostEvent`](host::HostEvent)s the host
//! delivers, and the collaborator traits in [`host`] the engine calls into.
//!
//! [`SimWorld`](world::SimWorld) is an in-memory host implementing every
//! collaborator trait. The engine's tests and demo run against it.
//!
//! # Quick Start
//!
//! ```
//! use lazarus_world::prelude::*;
//!
//! let desc = ScenarioDescription::new("Caucasus", "Op Anvil").with_faction(
//!     FactionSpec::new(FactionId(1), "red").with_composite(
//!         CompositeCategory::Ground,
//!         CompositeSpec::new("Armor-1", vec![MemberSpec::new("Tank-1", "T-72B", 0.0, 0.0)]),
//!     ),
//! );
//!
//! let mut world = SimWorld::from_scenario(&desc).unwrap();
//! assert!(world.kill("Tank-1"));
//! assert_eq!(world.drain_events(), vec![HostEvent::unit_destroyed("Tank-1")]);
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod host;
pub mod identity;
pub mod scenario;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by host collaborators.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The handle is stale or was never issued.
    #[error("entity {handle:?} does not exist (stale or never issued)")]
    UnknownEntity { handle: entity::EntityHandle },

    /// No live entity carries the identity.
    #[error("no live entity named '{0}'")]
    UnknownIdentity(String),

    /// The host refused to spawn a composite.
    #[error("failed to spawn composite '{composite}': {reason}")]
    SpawnFailure { composite: String, reason: String },

    /// The host refused to destroy an entity.
    #[error("failed to destroy '{target}': {reason}")]
    DestroyFailure { target: String, reason: String },

    /// A composite template cannot be spawned as given.
    #[error("invalid template for composite '{composite}': {reason}")]
    InvalidTemplate { composite: String, reason: String },

    /// A scenario description could not be parsed.
    #[error("invalid scenario description: {0}")]
    InvalidDescription(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{EntityHandle, HandleAllocator};
    pub use crate::host::{
        EntityRegistry, EntitySpawner, Host, HostEvent, Notifier, Region, WorldQuery,
    };
    pub use crate::identity::{CompositeCategory, EntityCategory, FactionId, Skill};
    pub use crate::scenario::{
        CompositeEntry, CompositeSpec, FactionSpec, MemberSpec, ScenarioDescription, StaticSpec,
        Transform,
    };
    pub use crate::world::SimWorld;
    pub use crate::WorldError;
}
