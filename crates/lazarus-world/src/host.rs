//! Collaborator interfaces the persistence engine calls into.
//!
//! A simulation host implements these traits over its own entity system. The
//! engine never touches host entities any other way, which keeps it testable
//! against [`SimWorld`](crate::world::SimWorld) and portable to any host that
//! can answer the same questions.
//!
//! | trait              | role                                              |
//! |--------------------|---------------------------------------------------|
//! | [`EntityRegistry`] | look up entities by identity, test, destroy       |
//! | [`EntitySpawner`]  | spawn a composite from a (modified) template      |
//! | [`WorldQuery`]     | enumerate live entities for position capture      |
//! | [`Notifier`]       | user-visible notices                              |
//!
//! [`Host`] is the blanket combination of all four.

use serde::{Deserialize, Serialize};

use crate::entity::EntityHandle;
use crate::identity::{CompositeCategory, EntityCategory, FactionId};
use crate::scenario::{CompositeSpec, Transform};
use crate::WorldError;

// ---------------------------------------------------------------------------
// HostEvent
// ---------------------------------------------------------------------------

/// A lifecycle notification delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    /// The scenario has started running.
    ScenarioStart,
    /// An entity was destroyed in play.
    Destroyed {
        identity: String,
        category: EntityCategory,
        player_controlled: bool,
    },
}

impl HostEvent {
    /// Convenience constructor for a destroyed AI-controlled unit.
    pub fn unit_destroyed(identity: impl Into<String>) -> Self {
        HostEvent::Destroyed {
            identity: identity.into(),
            category: EntityCategory::Unit,
            player_controlled: false,
        }
    }

    /// Convenience constructor for a destroyed static object.
    pub fn static_destroyed(identity: impl Into<String>) -> Self {
        HostEvent::Destroyed {
            identity: identity.into(),
            category: EntityCategory::Static,
            player_controlled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A search volume for [`WorldQuery::find_all_in_region`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// The whole map.
    Everywhere,
    /// Ground-plane disc around `(x, z)`.
    Disc { x: f64, z: f64, radius: f64 },
}

impl Region {
    /// `true` if `t` lies inside the region.
    pub fn contains(&self, t: &Transform) -> bool {
        match *self {
            Region::Everywhere => true,
            Region::Disc { x, z, radius } => {
                let dx = t.x - x;
                let dz = t.z - z;
                dx * dx + dz * dz <= radius * radius
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Lookup and removal of live entities.
pub trait EntityRegistry {
    /// Find a live member or static object by identity.
    fn find_by_identity(&self, category: EntityCategory, name: &str) -> Option<EntityHandle>;

    /// Find a live composite entity by name.
    fn find_composite(&self, name: &str) -> Option<EntityHandle>;

    /// `true` if the handle still refers to a live entity.
    fn exists(&self, handle: EntityHandle) -> bool;

    /// Remove an entity from the world. Destroying a composite removes all
    /// of its members. Removal is silent: no [`HostEvent::Destroyed`] is
    /// emitted.
    fn destroy(&mut self, handle: EntityHandle) -> Result<(), WorldError>;
}

/// Composite spawning.
pub trait EntitySpawner {
    /// Spawn `template` as a composite owned by `faction`.
    fn spawn_composite(
        &mut self,
        faction: FactionId,
        category: CompositeCategory,
        template: &CompositeSpec,
    ) -> Result<EntityHandle, WorldError>;
}

/// Read access used for position capture.
pub trait WorldQuery {
    /// Every live member of a composite of `category` inside `region`.
    fn find_all_in_region(&self, category: CompositeCategory, region: &Region)
        -> Vec<EntityHandle>;

    /// Identity and current placement of a live member.
    fn transform_of(&self, handle: EntityHandle) -> Option<(String, Transform)>;
}

/// User-visible messaging.
pub trait Notifier {
    /// Show `message` to every player for `display_secs` seconds.
    fn notify(&mut self, message: &str, display_secs: f64);
}

/// Everything the persistence engine needs from its host.
pub trait Host: EntityRegistry + EntitySpawner + WorldQuery + Notifier {}

impl<T> Host for T where T: EntityRegistry + EntitySpawner + WorldQuery + Notifier {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
