//! Destroyed-entity ingestion.

use lazarus_world::identity::EntityCategory;
use tracing::{debug, info};

use crate::engine::PersistenceEngine;

impl PersistenceEngine {
    /// Record a loss reported by the host.
    ///
    /// Player-controlled losses are ignored unless `track_player_losses` is
    /// set. A new death marks the identity dead in its bucket, drops its
    /// saved transform and requests a debounced save. Repeated reports of
    /// the same death change nothing.
    ///
    /// Returns `true` if the identity was newly marked dead.
    pub fn on_entity_destroyed(
        &mut self,
        identity: &str,
        category: EntityCategory,
        player_controlled: bool,
    ) -> bool {
        if player_controlled && !self.config.track_player_losses {
            debug!(identity, "player-controlled loss not tracked");
            return false;
        }
        if !self.store.mark_dead(category, identity) {
            debug!(identity, ?category, "already recorded dead");
            return false;
        }
        info!(identity, ?category, "entity destroyed");
        self.request_save();
        true
    }
}

#[cfg(test)]
mod tests {
    use lazarus_store::gateway::StorageGateway;
    use lazarus_world::prelude::*;

    use crate::config::EngineConfig;
    use crate::engine::PersistenceEngine;

    fn engine(track_player_losses: bool) -> PersistenceEngine {
        let config = EngineConfig {
            track_player_losses,
            ..Default::default()
        };
        PersistenceEngine::new(
            config,
            ScenarioDescription::new("Caucasus", "Ingest"),
            StorageGateway::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn ai_loss_is_recorded_once() {
        let mut engine = engine(false);
        assert!(engine.on_entity_destroyed("Tank-1", EntityCategory::Unit, false));
        assert!(engine.save_pending());
        assert!(!engine.on_entity_destroyed("Tank-1", EntityCategory::Unit, false));
        assert!(engine.store().is_dead(EntityCategory::Unit, "Tank-1"));
    }

    #[test]
    fn statics_go_to_their_own_bucket() {
        let mut engine = engine(false);
        engine.on_entity_destroyed("Depot", EntityCategory::Static, false);
        assert!(engine.store().is_dead(EntityCategory::Static, "Depot"));
        assert!(!engine.store().is_dead(EntityCategory::Unit, "Depot"));
    }

    #[test]
    fn player_losses_respect_config() {
        let mut ignoring = engine(false);
        assert!(!ignoring.on_entity_destroyed("Viper-1-1", EntityCategory::Unit, true));
        assert!(!ignoring.store().is_dead(EntityCategory::Unit, "Viper-1-1"));
        assert!(!ignoring.save_pending());

        let mut tracking = engine(true);
        assert!(tracking.on_entity_destroyed("Viper-1-1", EntityCategory::Unit, true));
    }
}
