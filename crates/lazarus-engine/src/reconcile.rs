//! Load-time reconciliation of the live world against a saved snapshot.
//!
//! On scenario start the engine loads and validates the snapshot for its
//! save slot, then brings the world in line with it in two concurrent
//! strands:
//!
//! 1. **Removal.** A bounded number of passes destroy every live entity
//!    whose identity the snapshot records as dead. Passes are idempotent, so
//!    entities the host spawns late are still caught.
//! 2. **Respawn.** After a short delay every composite the snapshot touches
//!    is queued as a [`PendingOp`]. One op runs per throttle tick: the live
//!    composite is destroyed and respawned from its authored template with
//!    dead members dropped and saved transforms overlaid.
//!
//! Air composites with a human seat are never respawned, so connected
//! players are not yanked out of their aircraft.
//!
//! ```text
//! Idle -> Loading -> RemovalRetry -> RespawnQueued -> Steady
//!            |
//!            +-> Disabled   (storage unavailable)
//! ```
//!
//! The pure pieces ([`plan_respawns`], [`build_respawn_template`],
//! [`removal_pass`], [`apply_pending_op`]) take their collaborators as
//! arguments and are tested in isolation; the `impl PersistenceEngine` block
//! below drives them from scheduler tasks.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use lazarus_store::fingerprint::Fingerprint;
use lazarus_store::gateway::StorageGateway;
use lazarus_store::snapshot::{Snapshot, SnapshotStore};
use lazarus_store::StoreError;
use lazarus_world::host::{EntityRegistry, Host};
use lazarus_world::identity::EntityCategory;
use lazarus_world::scenario::{CompositeSpec, Transform};
use tracing::{debug, info, warn};

use crate::config::RepositionCategories;
use crate::engine::{EngineTask, PersistenceEngine};
use crate::templates::{CompositeTemplate, TemplateIndex};

/// How long the storage-unavailable notice stays on screen.
const UNAVAILABLE_NOTICE_SECS: f64 = 10.0;

// ---------------------------------------------------------------------------
// ReconcilePhase
// ---------------------------------------------------------------------------

/// Where the engine is in the load/reconcile lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Waiting for the scenario to start.
    Idle,
    /// Reading and validating the snapshot.
    Loading,
    /// Snapshot applied to the store; removal passes running, respawn not
    /// yet planned.
    RemovalRetry,
    /// Respawn ops are being applied, one per throttle tick.
    RespawnQueued,
    /// Reconciliation finished. Saves and event ingestion continue.
    Steady,
    /// Durable storage is unavailable; nothing is loaded or saved.
    Disabled,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcilePhase::Idle => "idle",
            ReconcilePhase::Loading => "loading",
            ReconcilePhase::RemovalRetry => "removal-retry",
            ReconcilePhase::RespawnQueued => "respawn-queued",
            ReconcilePhase::Steady => "steady",
            ReconcilePhase::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// LoadOutcome
// ---------------------------------------------------------------------------

/// What the load step found in the save slot.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A valid snapshot was applied.
    Restored {
        dead_units: usize,
        dead_statics: usize,
        transforms: usize,
    },
    /// Nothing saved yet for this slot.
    FirstRun,
    /// The file was unreadable, malformed, or belongs to another slot or
    /// scenario. The session starts from an empty snapshot.
    Rejected { reason: String },
    /// Storage is unavailable for this session.
    Unavailable,
}

/// Read the snapshot at `path` and check it belongs to `key` and
/// `fingerprint`.
///
/// Every failure other than unavailability degrades to an empty snapshot.
pub fn load_validated(
    gateway: &StorageGateway,
    path: &Path,
    key: &str,
    fingerprint: &Fingerprint,
) -> (Snapshot, LoadOutcome) {
    let snapshot = match gateway.read_snapshot(path) {
        Ok(snapshot) => snapshot,
        Err(StoreError::NotFound { .. }) => {
            info!(path = %path.display(), "no snapshot yet; first run for this slot");
            return (Snapshot::default(), LoadOutcome::FirstRun);
        }
        Err(StoreError::IoUnavailable) => return (Snapshot::default(), LoadOutcome::Unavailable),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot unreadable; starting empty");
            return (
                Snapshot::default(),
                LoadOutcome::Rejected {
                    reason: e.to_string(),
                },
            );
        }
    };

    if snapshot.meta.is_none() {
        debug!("snapshot carries no meta block; accepting as legacy");
    }
    if let Err(e) = snapshot.validate(key, fingerprint) {
        warn!(error = %e, "snapshot rejected; starting empty");
        return (
            Snapshot::default(),
            LoadOutcome::Rejected {
                reason: e.to_string(),
            },
        );
    }

    let outcome = LoadOutcome::Restored {
        dead_units: snapshot.dead_units.len(),
        dead_statics: snapshot.dead_statics.len(),
        transforms: snapshot.unit_pos.len(),
    };
    (snapshot, outcome)
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Result of one removal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub destroyed: usize,
    pub failed: usize,
}

/// Destroy every live entity whose identity `store` records as dead.
///
/// Entities already gone are skipped, so repeated passes are harmless.
pub fn removal_pass<H: EntityRegistry + ?Sized>(
    host: &mut H,
    store: &SnapshotStore,
) -> RemovalReport {
    let mut report = RemovalReport::default();
    for category in [EntityCategory::Unit, EntityCategory::Static] {
        for identity in store.snapshot().dead(category) {
            let Some(handle) = host.find_by_identity(category, identity) else {
                continue;
            };
            if !host.exists(handle) {
                continue;
            }
            match host.destroy(handle) {
                Ok(()) => {
                    debug!(%identity, ?category, "removed dead entity");
                    report.destroyed += 1;
                }
                Err(e) => {
                    warn!(%identity, error = %e, "failed to remove dead entity");
                    report.failed += 1;
                }
            }
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Respawn
// ---------------------------------------------------------------------------

/// One composite waiting to be respawned.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub composite: String,
    /// Saved transforms of the members still alive at planning time.
    pub member_transforms: BTreeMap<String, Transform>,
    pub template: CompositeTemplate,
}

/// Queue a respawn for every composite the snapshot touches.
///
/// A composite is touched when at least one member is dead or has a saved
/// transform. Composites in a category disabled by `reposition`, and air
/// composites with a human seat, are skipped.
pub fn plan_respawns(
    index: &TemplateIndex,
    store: &SnapshotStore,
    reposition: &RepositionCategories,
) -> Vec<PendingOp> {
    let mut ops = Vec::new();
    for template in index.iter() {
        let category = template.category;
        if !reposition.allows(category) {
            continue;
        }
        if category.is_air() && template.has_human_member {
            info!(composite = template.name(), "human-occupied aircraft left in place");
            continue;
        }

        let mut touched = false;
        let mut member_transforms = BTreeMap::new();
        for member in &template.spec.members {
            if store.is_dead(EntityCategory::Unit, &member.name) {
                touched = true;
                continue;
            }
            if let Some(t) = store.transform(&member.name) {
                touched = true;
                member_transforms.insert(member.name.clone(), *t);
            }
        }
        if !touched {
            continue;
        }

        ops.push(PendingOp {
            composite: template.name().to_owned(),
            member_transforms,
            template: template.clone(),
        });
    }
    ops
}

/// The template a pending op respawns: the authored template without the
/// members `store` records as dead, with saved transforms overlaid.
///
/// Skill, type and extra fields of survivors are carried over untouched.
/// Altitude is only overlaid for air categories.
pub fn build_respawn_template(op: &PendingOp, store: &SnapshotStore) -> CompositeSpec {
    let air = op.template.category.is_air();
    let mut spec = op.template.spec.clone();
    spec.members
        .retain(|m| !store.is_dead(EntityCategory::Unit, &m.name));
    for member in &mut spec.members {
        if let Some(t) = op.member_transforms.get(&member.name) {
            member.x = t.x;
            member.z = t.z;
            member.heading = t.heading;
            if air {
                member.alt = Some(t.y);
            }
        }
    }
    spec
}

/// What applying a [`PendingOp`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnOutcome {
    /// Respawned with this many members.
    Respawned { members: usize },
    /// Every member is dead; the composite was only destroyed.
    Removed,
    /// The host refused the spawn.
    Failed,
}

/// Replace the live composite with its respawn template.
pub fn apply_pending_op<H: Host + ?Sized>(
    host: &mut H,
    op: &PendingOp,
    store: &SnapshotStore,
) -> RespawnOutcome {
    let spec = build_respawn_template(op, store);

    if let Some(handle) = host.find_composite(&op.composite) {
        if host.exists(handle) {
            if let Err(e) = host.destroy(handle) {
                warn!(composite = %op.composite, error = %e, "failed to destroy composite before respawn");
            }
        }
    }

    if spec.members.is_empty() {
        debug!(composite = %op.composite, "every member dead; composite removed");
        return RespawnOutcome::Removed;
    }

    let members = spec.members.len();
    match host.spawn_composite(op.template.faction, op.template.category, &spec) {
        Ok(_) => {
            debug!(composite = %op.composite, members, "composite respawned");
            RespawnOutcome::Respawned { members }
        }
        Err(e) => {
            warn!(composite = %op.composite, error = %e, "respawn failed; skipping");
            RespawnOutcome::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

impl PersistenceEngine {
    /// Leave `Idle`: load the snapshot and start reconciliation.
    ///
    /// Runs at most once per engine, from whichever comes first of the
    /// scenario-start event and the bootstrap fallback timer.
    pub(crate) fn bootstrap<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.bootstrapped {
            debug!("already bootstrapped");
            return;
        }
        self.bootstrapped = true;
        if let Some(timer) = self.bootstrap_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.set_phase(ReconcilePhase::Loading);

        let path = match self.gateway.resolve_path(&self.key) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "durable storage unavailable; persistence disabled");
                host.notify(
                    "Scenario persistence is disabled: durable storage is unavailable on this host.",
                    UNAVAILABLE_NOTICE_SECS,
                );
                self.load_outcome = Some(LoadOutcome::Unavailable);
                self.set_phase(ReconcilePhase::Disabled);
                return;
            }
        };

        let (snapshot, outcome) = load_validated(&self.gateway, &path, &self.key, &self.fingerprint);
        if outcome == LoadOutcome::Unavailable {
            host.notify(
                "Scenario persistence is disabled: durable storage is unavailable on this host.",
                UNAVAILABLE_NOTICE_SECS,
            );
            self.load_outcome = Some(outcome);
            self.set_phase(ReconcilePhase::Disabled);
            return;
        }

        // Deaths reported before the load are authoritative too.
        let early = self.store.snapshot().clone();
        self.store.replace(snapshot);
        let mut carried = 0;
        for id in &early.dead_units {
            carried += usize::from(self.store.mark_dead(EntityCategory::Unit, id));
        }
        for id in &early.dead_statics {
            carried += usize::from(self.store.mark_dead(EntityCategory::Static, id));
        }

        info!(path = %path.display(), ?outcome, carried, "snapshot loaded");
        self.load_outcome = Some(outcome);
        self.set_phase(ReconcilePhase::RemovalRetry);

        if self.config.removal_retries > 0 {
            self.removal_timer = Some(
                self.scheduler
                    .every(self.config.removal_interval_secs, EngineTask::RemovalPass),
            );
        }
        self.scheduler
            .after(self.config.respawn_delay_secs, EngineTask::PlanRespawn);
        self.start_periodic(self.config.periodic_save_secs);
        if carried > 0 {
            self.request_save();
        }
    }

    pub(crate) fn run_removal_pass<H: Host + ?Sized>(&mut self, host: &mut H) {
        let report = removal_pass(host, &self.store);
        self.removal_passes += 1;
        debug!(
            pass = self.removal_passes,
            destroyed = report.destroyed,
            failed = report.failed,
            "removal pass"
        );
        if self.removal_passes >= self.config.removal_retries {
            if let Some(timer) = self.removal_timer.take() {
                self.scheduler.cancel(timer);
            }
            info!(passes = self.removal_passes, "removal passes finished");
        }
    }

    pub(crate) fn plan_respawn(&mut self) {
        if self.phase != ReconcilePhase::RemovalRetry {
            debug!(phase = %self.phase, "respawn planning skipped");
            return;
        }
        self.templates.build(&self.description);
        let ops = plan_respawns(&self.templates, &self.store, &self.config.reposition);
        if ops.is_empty() {
            info!("nothing to respawn");
            self.set_phase(ReconcilePhase::Steady);
            return;
        }
        info!(composites = ops.len(), "respawn queued");
        self.pending.extend(ops);
        self.respawn_timer = Some(
            self.scheduler
                .every(self.config.respawn_throttle_secs, EngineTask::RespawnNext),
        );
        self.set_phase(ReconcilePhase::RespawnQueued);
    }

    pub(crate) fn respawn_next<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let Some(op) = self.pending.pop_front() {
            let outcome = apply_pending_op(host, &op, &self.store);
            self.respawn_log.push((op.composite, outcome));
        }
        if self.pending.is_empty() {
            if let Some(timer) = self.respawn_timer.take() {
                self.scheduler.cancel(timer);
            }
            info!(respawned = self.respawn_log.len(), "respawn queue drained");
            self.set_phase(ReconcilePhase::Steady);
        }
    }

    fn set_phase(&mut self, next: ReconcilePhase) {
        if self.phase != next {
            info!(from = %self.phase, to = %next, "reconcile phase");
            self.phase = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
