//! Debounced and periodic saving.
//!
//! Bursts of losses (a bomb run, an artillery barrage) arrive as many
//! destroyed events within a few frames. [`request_save`] coalesces them:
//! the first request arms a one-shot timer for the quiet interval and later
//! requests are no-ops until it fires, so a burst costs one write.
//!
//! [`force_save`] bypasses the debounce. Before writing it captures the
//! current placement of every live member in a repositioned category and
//! stamps the save-slot identification onto the snapshot. The periodic save
//! is a repeating forced save.
//!
//! [`request_save`]: PersistenceEngine::request_save
//! [`force_save`]: PersistenceEngine::force_save

use std::collections::HashSet;
use std::path::PathBuf;

use lazarus_store::snapshot::SnapshotMeta;
use lazarus_store::StoreError;
use lazarus_world::host::{Region, WorldQuery};
use tracing::{debug, info, warn};

use crate::engine::{EngineTask, PersistenceEngine};
use crate::reconcile::ReconcilePhase;
use crate::scheduler::TimerHandle;
use crate::EngineError;

/// Write counters for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveStats {
    /// Successful writes.
    pub writes: u64,
    /// Writes that failed after a save was attempted.
    pub failures: u64,
    /// Virtual time of the last successful write.
    pub last_saved_at: Option<f64>,
    pub last_path: Option<PathBuf>,
}

impl PersistenceEngine {
    /// Ask for a save after the quiet interval. Requests made while one is
    /// already pending are absorbed by it.
    pub fn request_save(&mut self) {
        if self.save_pending {
            debug!("save already pending");
            return;
        }
        self.save_pending = true;
        self.scheduler
            .after(self.config.save_debounce_secs, EngineTask::FlushSave);
        debug!(in_secs = self.config.save_debounce_secs, "save requested");
    }

    /// Capture live positions and write the snapshot now.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotLoaded`] before the snapshot has been loaded, so
    ///   a save can never clobber the previous session's file.
    /// - [`StoreError::IoUnavailable`] when persistence is disabled.
    /// - Any [`StoreError`] raised writing the file.
    pub fn force_save<H: WorldQuery + ?Sized>(&mut self, host: &H) -> Result<PathBuf, EngineError> {
        match self.phase {
            ReconcilePhase::Disabled => return Err(StoreError::IoUnavailable.into()),
            ReconcilePhase::Idle | ReconcilePhase::Loading => return Err(EngineError::NotLoaded),
            _ => {}
        }
        let captured = self.capture_positions(host);
        debug!(captured, "positions captured");
        self.write_store()
    }

    /// Arm the repeating save. Idempotent: a second call returns the handle
    /// of the running timer. An interval that is zero, negative or not
    /// finite disables it.
    pub fn start_periodic(&mut self, interval_secs: f64) -> Option<TimerHandle> {
        if let Some(handle) = self.periodic_timer {
            return Some(handle);
        }
        if !(interval_secs > 0.0 && interval_secs.is_finite()) {
            debug!(interval_secs, "periodic save disabled");
            return None;
        }
        let handle = self.scheduler.every(interval_secs, EngineTask::PeriodicSave);
        info!(interval_secs, "periodic save started");
        self.periodic_timer = Some(handle);
        Some(handle)
    }

    pub(crate) fn flush_debounced<H: WorldQuery + ?Sized>(&mut self, host: &H) {
        self.save_pending = false;
        self.timed_save(host, "debounced");
    }

    pub(crate) fn periodic_save<H: WorldQuery + ?Sized>(&mut self, host: &H) {
        self.timed_save(host, "periodic");
    }

    /// A save nobody waits on: every failure ends here, in the log.
    fn timed_save<H: WorldQuery + ?Sized>(&mut self, host: &H, trigger: &'static str) {
        match self.force_save(host) {
            Ok(_) => {}
            Err(EngineError::NotLoaded) => debug!(trigger, "save dropped before load"),
            Err(e) => debug!(trigger, error = %e, "save failed"),
        }
    }

    /// Record the placement of every live member in a repositioned category.
    ///
    /// Members still waiting to be respawned stand at their authored
    /// positions; capturing them would overwrite the loaded transforms, so
    /// nothing is captured before respawn planning and queued composites are
    /// skipped afterwards.
    fn capture_positions<H: WorldQuery + ?Sized>(&mut self, host: &H) -> usize {
        if self.phase == ReconcilePhase::RemovalRetry {
            return 0;
        }
        let queued: HashSet<&str> = self.pending.iter().map(|op| op.composite.as_str()).collect();
        let mut updates = Vec::new();
        for category in self.config.reposition.enabled() {
            for handle in host.find_all_in_region(category, &Region::Everywhere) {
                let Some((name, transform)) = host.transform_of(handle) else {
                    continue;
                };
                let awaiting = self
                    .templates
                    .owner_of(&name)
                    .is_some_and(|owner| queued.contains(owner));
                if !awaiting {
                    updates.push((name, transform));
                }
            }
        }
        updates
            .into_iter()
            .filter(|(name, transform)| self.store.record_transform(name, *transform))
            .count()
    }

    /// Stamp identification onto the store and write it to the save slot.
    pub(crate) fn write_store(&mut self) -> Result<PathBuf, EngineError> {
        self.store.stamp_meta(SnapshotMeta {
            key: self.key.clone(),
            fp: self.fingerprint.clone(),
            theatre: self.description.theatre.clone(),
            mission_name: self.description.title.clone(),
        });
        let result = self.gateway.resolve_path(&self.key).and_then(|path| {
            self.gateway
                .write_snapshot(&path, self.store.snapshot())
                .map(|()| path)
        });
        match result {
            Ok(path) => {
                self.stats.writes += 1;
                self.stats.last_saved_at = Some(self.scheduler.now());
                self.stats.last_path = Some(path.clone());
                let snap = self.store.snapshot();
                info!(
                    path = %path.display(),
                    dead_units = snap.dead_units.len(),
                    dead_statics = snap.dead_statics.len(),
                    positions = snap.unit_pos.len(),
                    "snapshot saved"
                );
                Ok(path)
            }
            Err(e) => {
                self.stats.failures += 1;
                warn!(error = %e, "snapshot save failed");
                Err(e.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
