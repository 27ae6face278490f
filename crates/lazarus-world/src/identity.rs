//! Classification vocabulary shared by hosts and the persistence engine.
//!
//! - [`FactionId`]: the owning side of a composite or static object.
//! - [`CompositeCategory`]: what kind of composite entity a template spawns
//!   (ground, sea, fixed-wing air, rotary-wing air).
//! - [`EntityCategory`]: which death bucket an individual entity belongs to
//!   (unit-like members of composites, or static-like objects).
//! - [`Skill`]: the control designation of a member. `Client` and `Player`
//!   mean a human occupies the seat.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FactionId
// ---------------------------------------------------------------------------

/// Numeric identifier of the faction that owns a composite.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FactionId(pub u32);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CompositeCategory
// ---------------------------------------------------------------------------

/// The spawn category of a composite entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeCategory {
    /// Ground vehicles and infantry.
    Ground,
    /// Surface vessels.
    Ship,
    /// Fixed-wing aircraft.
    Plane,
    /// Rotary-wing aircraft.
    Helicopter,
}

impl CompositeCategory {
    /// Every category, in index order.
    pub const ALL: [CompositeCategory; 4] = [
        CompositeCategory::Ground,
        CompositeCategory::Ship,
        CompositeCategory::Plane,
        CompositeCategory::Helicopter,
    ];

    /// `true` for the air categories, where altitude is meaningful and
    /// human-occupied composites must never be respawned.
    pub fn is_air(self) -> bool {
        matches!(self, CompositeCategory::Plane | CompositeCategory::Helicopter)
    }

    /// Stable lowercase name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CompositeCategory::Ground => "ground",
            CompositeCategory::Ship => "ship",
            CompositeCategory::Plane => "plane",
            CompositeCategory::Helicopter => "helicopter",
        }
    }
}

impl fmt::Display for CompositeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityCategory
// ---------------------------------------------------------------------------

/// Death bucket of an individual entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// A member of a composite entity.
    Unit,
    /// A standalone static object (buildings, parked cargo, ...).
    Static,
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// Skill or control designation of a composite member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Skill {
    #[default]
    Average,
    Good,
    High,
    Excellent,
    Random,
    /// A human slot available to connecting clients.
    Client,
    /// The local human player.
    Player,
}

impl Skill {
    /// `true` when the seat is controlled by a human.
    pub fn is_human(self) -> bool {
        matches!(self, Skill::Client | Skill::Player)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
