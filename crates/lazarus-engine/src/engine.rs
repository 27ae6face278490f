//! The persistence engine façade.
//!
//! A [`PersistenceEngine`] owns all persistence state of one scenario run:
//! the in-memory snapshot, the template index, the reconciler's progress and
//! the virtual-time scheduler that sequences everything. The host drives it
//! through two calls:
//!
//! - [`handle_event`](PersistenceEngine::handle_event) for every lifecycle
//!   notification;
//! - [`advance`](PersistenceEngine::advance) once per frame with the elapsed
//!   virtual time.
//!
//! Both take the host as an argument, so the engine never holds a reference
//! into the world and scheduled work never captures engine state.
//!
//! # Example
//!
//! ```
//! use lazarus_engine::prelude::*;
//! use lazarus_store::prelude::*;
//! use lazarus_world::prelude::*;
//!
//! let desc = ScenarioDescription::new("Caucasus", "Op Anvil").with_faction(
//!     FactionSpec::new(FactionId(1), "red").with_composite(
//!         CompositeCategory::Ground,
//!         CompositeSpec::new("Armor-1", vec![MemberSpec::new("Tank-1", "T-72B", 0.0, 0.0)]),
//!     ),
//! );
//! let mut world = SimWorld::from_scenario(&desc).unwrap();
//! let dir = std::env::temp_dir().join("lazarus-doctest-engine");
//! let mut engine =
//!     PersistenceEngine::new(EngineConfig::default(), desc, StorageGateway::new(&dir)).unwrap();
//!
//! engine.handle_event(&mut world, HostEvent::ScenarioStart);
//! assert_ne!(engine.phase(), ReconcilePhase::Idle);
//!
//! world.kill("Tank-1");
//! for event in world.drain_events() {
//!     engine.handle_event(&mut world, event);
//! }
//! assert!(engine.store().is_dead(EntityCategory::Unit, "Tank-1"));
//! # let _ = std::fs::remove_dir_all(&dir);
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;

use lazarus_store::fingerprint::{self, Fingerprint};
use lazarus_store::gateway::StorageGateway;
use lazarus_store::snapshot::SnapshotStore;
use lazarus_store::StoreError;
use lazarus_world::host::{Host, HostEvent};
use lazarus_world::scenario::ScenarioDescription;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::reconcile::{LoadOutcome, PendingOp, ReconcilePhase, RespawnOutcome};
use crate::save::SaveStats;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::templates::TemplateIndex;
use crate::EngineError;

// ---------------------------------------------------------------------------
// EngineTask
// ---------------------------------------------------------------------------

/// Work the scheduler hands back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineTask {
    /// Fallback load if the host never announces the scenario start.
    Bootstrap,
    /// Debounced save.
    FlushSave,
    PeriodicSave,
    RemovalPass,
    PlanRespawn,
    RespawnNext,
}

// ---------------------------------------------------------------------------
// PersistenceEngine
// ---------------------------------------------------------------------------

/// Snapshot persistence and load-time reconciliation for one scenario run.
#[derive(Debug)]
pub struct PersistenceEngine {
    pub(crate) config: EngineConfig,
    pub(crate) description: ScenarioDescription,
    pub(crate) key: String,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) gateway: StorageGateway,
    pub(crate) store: SnapshotStore,
    pub(crate) scheduler: Scheduler<EngineTask>,
    pub(crate) templates: TemplateIndex,

    // Reconciler
    pub(crate) phase: ReconcilePhase,
    pub(crate) bootstrapped: bool,
    pub(crate) bootstrap_timer: Option<TimerHandle>,
    pub(crate) load_outcome: Option<LoadOutcome>,
    pub(crate) removal_timer: Option<TimerHandle>,
    pub(crate) removal_passes: u32,
    pub(crate) respawn_timer: Option<TimerHandle>,
    pub(crate) pending: VecDeque<PendingOp>,
    pub(crate) respawn_log: Vec<(String, RespawnOutcome)>,

    // Save scheduler
    pub(crate) save_pending: bool,
    pub(crate) periodic_timer: Option<TimerHandle>,
    pub(crate) stats: SaveStats,
}

impl PersistenceEngine {
    /// Create an engine for `description`, saving through `gateway`.
    ///
    /// The save slot is `config.save_key`, or the scenario title when unset.
    /// A fallback timer is armed so the snapshot loads even if the host never
    /// sends [`HostEvent::ScenarioStart`].
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if the config fails validation.
    pub fn new(
        config: EngineConfig,
        description: ScenarioDescription,
        gateway: StorageGateway,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let key = config
            .save_key
            .clone()
            .unwrap_or_else(|| description.title.clone());
        let fingerprint = fingerprint::compute(&description);

        let mut scheduler = Scheduler::new();
        let bootstrap_timer =
            scheduler.after(config.bootstrap_fallback_secs, EngineTask::Bootstrap);

        info!(
            %key,
            %fingerprint,
            theatre = %description.theatre,
            storage = gateway.available(),
            "persistence engine created"
        );

        Ok(Self {
            config,
            description,
            key,
            fingerprint,
            gateway,
            store: SnapshotStore::new(),
            scheduler,
            templates: TemplateIndex::new(),
            phase: ReconcilePhase::Idle,
            bootstrapped: false,
            bootstrap_timer: Some(bootstrap_timer),
            load_outcome: None,
            removal_timer: None,
            removal_passes: 0,
            respawn_timer: None,
            pending: VecDeque::new(),
            respawn_log: Vec::new(),
            save_pending: false,
            periodic_timer: None,
            stats: SaveStats::default(),
        })
    }

    /// React to a host lifecycle notification.
    pub fn handle_event<H: Host + ?Sized>(&mut self, host: &mut H, event: HostEvent) {
        match event {
            HostEvent::ScenarioStart => self.bootstrap(host),
            HostEvent::Destroyed {
                identity,
                category,
                player_controlled,
            } => {
                self.on_entity_destroyed(&identity, category, player_controlled);
            }
        }
    }

    /// Advance virtual time by `dt` seconds, running every task that comes
    /// due, including tasks armed by earlier tasks in the same step.
    pub fn advance<H: Host + ?Sized>(&mut self, host: &mut H, dt: f64) {
        let until = self.scheduler.now() + dt.max(0.0);
        while let Some((_, task)) = self.scheduler.pop_due(until) {
            self.dispatch(host, task);
        }
        self.scheduler.settle(until);
    }

    fn dispatch<H: Host + ?Sized>(&mut self, host: &mut H, task: EngineTask) {
        debug!(?task, now = self.scheduler.now(), "task due");
        match task {
            EngineTask::Bootstrap => {
                self.bootstrap_timer = None;
                if !self.bootstrapped {
                    info!("no scenario-start event received; loading from fallback timer");
                }
                self.bootstrap(host);
            }
            EngineTask::FlushSave => self.flush_debounced(host),
            EngineTask::PeriodicSave => self.periodic_save(host),
            EngineTask::RemovalPass => self.run_removal_pass(host),
            EngineTask::PlanRespawn => self.plan_respawn(),
            EngineTask::RespawnNext => self.respawn_next(host),
        }
    }

    // -- menu actions -------------------------------------------------------

    /// "Save now": capture positions and write immediately.
    ///
    /// # Errors
    ///
    /// See [`force_save`](Self::force_save).
    pub fn save_now<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<PathBuf, EngineError> {
        self.force_save(host)
    }

    /// "Show file name": where this engine saves.
    ///
    /// # Errors
    ///
    /// [`StoreError::IoUnavailable`] when storage is disabled.
    pub fn save_file_name(&self) -> Result<PathBuf, EngineError> {
        Ok(self.gateway.resolve_path(&self.key)?)
    }

    /// "Reset": forget all saved state and overwrite the save file with an
    /// empty snapshot.
    ///
    /// Reconciliation already under way is not undone.
    ///
    /// # Errors
    ///
    /// [`StoreError::IoUnavailable`] when storage is disabled, or the write
    /// error.
    pub fn reset<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<PathBuf, EngineError> {
        if self.phase == ReconcilePhase::Disabled || !self.gateway.available() {
            return Err(StoreError::IoUnavailable.into());
        }
        self.store.clear();
        let path = self.write_store()?;
        info!(path = %path.display(), "snapshot reset");
        host.notify("Saved scenario state has been reset.", 5.0);
        Ok(path)
    }

    // -- accessors ----------------------------------------------------------

    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn templates(&self) -> &TemplateIndex {
        &self.templates
    }

    pub fn save_stats(&self) -> &SaveStats {
        &self.stats
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The save-slot key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn description(&self) -> &ScenarioDescription {
        &self.description
    }

    /// Current virtual time in seconds since construction.
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// What the load step found, once it has run.
    pub fn load_outcome(&self) -> Option<&LoadOutcome> {
        self.load_outcome.as_ref()
    }

    /// Removal passes run so far.
    pub fn removal_passes(&self) -> u32 {
        self.removal_passes
    }

    /// Respawn ops still queued.
    pub fn pending_respawns(&self) -> usize {
        self.pending.len()
    }

    /// Every applied respawn op and what it did, in order.
    pub fn respawn_log(&self) -> &[(String, RespawnOutcome)] {
        &self.respawn_log
    }

    /// `true` while a debounced save is waiting for its quiet interval.
    pub fn save_pending(&self) -> bool {
        self.save_pending
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
