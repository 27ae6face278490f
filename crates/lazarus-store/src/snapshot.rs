//! The persisted snapshot schema and the in-memory Snapshot Store.
//!
//! [`Snapshot`] is the unit of persistence. On disk it looks like:
//!
//! ```json
//! {
//!   "deadUnits":   { "Tank-1": true },
//!   "deadStatics": { "Depot": true },
//!   "unitPos":     { "Tank-2": { "x": 100.0, "y": 0.0, "z": 200.0, "heading": 1.57 } },
//!   "meta":        { "key": "op_anvil", "fp": "3f1c...", "theatre": "Caucasus",
//!                    "missionName": "Op Anvil" }
//! }
//! ```
//!
//! Unknown top-level fields are rejected. `meta` may be absent (files
//! written before fingerprinting existed) and is then accepted without
//! validation.
//!
//! [`SnapshotStore`] owns the live snapshot during a session and enforces
//! the one invariant that matters: death is authoritative over position. An
//! identity marked dead never keeps (or gains) a saved transform.

use std::collections::{BTreeMap, BTreeSet};

use lazarus_world::identity::EntityCategory;
use lazarus_world::scenario::Transform;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::StoreError;

// ---------------------------------------------------------------------------
// SnapshotMeta
// ---------------------------------------------------------------------------

/// Identification stamped onto every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Save-slot key the file was written under.
    pub key: String,
    /// Fingerprint of the scenario that produced the file.
    pub fp: Fingerprint,
    /// Theatre / map name.
    pub theatre: String,
    /// Scenario title.
    #[serde(rename = "missionName")]
    pub mission_name: String,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Persisted scenario state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Destroyed composite members.
    #[serde(rename = "deadUnits", default, with = "truth_set")]
    pub dead_units: BTreeSet<String>,
    /// Destroyed static objects.
    #[serde(rename = "deadStatics", default, with = "truth_set")]
    pub dead_statics: BTreeSet<String>,
    /// Last-known placement of live members.
    #[serde(rename = "unitPos", default)]
    pub unit_pos: BTreeMap<String, Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
}

impl Snapshot {
    /// `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.dead_units.is_empty() && self.dead_statics.is_empty() && self.unit_pos.is_empty()
    }

    /// The dead set for a category.
    pub fn dead(&self, category: EntityCategory) -> &BTreeSet<String> {
        match category {
            EntityCategory::Unit => &self.dead_units,
            EntityCategory::Static => &self.dead_statics,
        }
    }

    /// Check that a loaded snapshot belongs to the running scenario.
    ///
    /// A snapshot without `meta` is accepted as-is.
    ///
    /// # Errors
    ///
    /// [`StoreError::ValidationMismatch`] naming the first field (`key`, then
    /// `fp`) that differs.
    pub fn validate(&self, key: &str, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        if meta.key != key {
            return Err(StoreError::ValidationMismatch {
                field: "key",
                expected: key.to_owned(),
                found: meta.key.clone(),
            });
        }
        if &meta.fp != fingerprint {
            return Err(StoreError::ValidationMismatch {
                field: "fp",
                expected: fingerprint.to_string(),
                found: meta.fp.to_string(),
            });
        }
        Ok(())
    }
}

/// Serde adapter storing a set of names as `{ name: true }`.
///
/// Entries whose value is `false` are treated as absent on read.
mod truth_set {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(set.iter().map(|name| (name, true)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        let raw = BTreeMap::<String, bool>::deserialize(d)?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, dead)| dead.then_some(name))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// The session's authoritative in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Snapshot,
}

impl SnapshotStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an identity dead in the bucket for `category`.
    ///
    /// Returns `true` if the identity was not already dead. Any saved
    /// transform for a dead unit is dropped.
    pub fn mark_dead(&mut self, category: EntityCategory, identity: &str) -> bool {
        let newly = match category {
            EntityCategory::Unit => self.current.dead_units.insert(identity.to_owned()),
            EntityCategory::Static => self.current.dead_statics.insert(identity.to_owned()),
        };
        if category == EntityCategory::Unit {
            self.current.unit_pos.remove(identity);
        }
        newly
    }

    /// `true` if the identity is dead in the bucket for `category`.
    pub fn is_dead(&self, category: EntityCategory, identity: &str) -> bool {
        self.current.dead(category).contains(identity)
    }

    /// Record the last-known placement of a live unit.
    ///
    /// Ignored (returns `false`) when the unit is dead or the transform is
    /// not finite.
    pub fn record_transform(&mut self, identity: &str, transform: Transform) -> bool {
        if self.current.dead_units.contains(identity) {
            return false;
        }
        let finite = [transform.x, transform.y, transform.z, transform.heading]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            debug!(identity, ?transform, "ignoring non-finite transform");
            return false;
        }
        self.current.unit_pos.insert(identity.to_owned(), transform);
        true
    }

    /// Saved placement of a unit, if any.
    pub fn transform(&self, identity: &str) -> Option<&Transform> {
        self.current.unit_pos.get(identity)
    }

    /// Replace the whole snapshot (load).
    ///
    /// Transforms of identities the incoming snapshot also marks dead are
    /// purged so the invariant holds even for hand-edited files.
    pub fn replace(&mut self, mut snapshot: Snapshot) {
        let before = snapshot.unit_pos.len();
        snapshot
            .unit_pos
            .retain(|name, _| !snapshot.dead_units.contains(name));
        let purged = before - snapshot.unit_pos.len();
        if purged > 0 {
            debug!(purged, "dropped transforms of dead units from loaded snapshot");
        }
        self.current = snapshot;
    }

    /// Overwrite `meta` ahead of a save.
    pub fn stamp_meta(&mut self, meta: SnapshotMeta) {
        self.current.meta = Some(meta);
    }

    /// Forget everything, including `meta`.
    pub fn clear(&mut self) {
        self.current = Snapshot::default();
    }

    /// Read access to the current snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
