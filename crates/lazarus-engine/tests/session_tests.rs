//! End-to-end sessions: save in one run, reconcile in the next.
//!
//! Every test drives a [`PersistenceEngine`] against a [`SimWorld`] the way a
//! host would: forward the world's lifecycle events, then advance virtual
//! time in small frames.

use std::fs;

use lazarus_engine::prelude::*;
use lazarus_store::prelude::*;
use lazarus_world::prelude::*;
use tempfile::TempDir;

const FRAME: f64 = 0.1;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn armor_scenario() -> ScenarioDescription {
    ScenarioDescription::new("Caucasus", "Op Anvil").with_faction(
        FactionSpec::new(FactionId(1), "red")
            .with_composite(
                CompositeCategory::Ground,
                CompositeSpec::new(
                    "Armor-1",
                    vec![
                        MemberSpec::new("Tank-1", "T-72B", 0.0, 0.0),
                        MemberSpec::new("Tank-2", "T-72B", 10.0, 0.0)
                            .with_skill(Skill::High)
                            .with_extra("callsign", serde_json::json!("Bear 2")),
                    ],
                ),
            )
            .with_composite(
                CompositeCategory::Ground,
                CompositeSpec::new(
                    "Armor-2",
                    vec![MemberSpec::new("Tank-3", "T-80U", 500.0, 500.0)],
                ),
            )
            .with_static(StaticSpec::new("Depot", "Warehouse", 50.0, 50.0)),
    )
}

fn air_scenario() -> ScenarioDescription {
    ScenarioDescription::new("Caucasus", "Air Ops").with_faction(
        FactionSpec::new(FactionId(2), "blue")
            .with_composite(
                CompositeCategory::Plane,
                CompositeSpec::new(
                    "Viper-1",
                    vec![MemberSpec::new("Viper-1-1", "F-16C", 0.0, 0.0)
                        .with_alt(3000.0)
                        .with_skill(Skill::Client)],
                ),
            )
            .with_composite(
                CompositeCategory::Helicopter,
                CompositeSpec::new(
                    "Hip-1",
                    vec![MemberSpec::new("Hip-1-1", "Mi-8", 0.0, 0.0).with_alt(100.0)],
                ),
            ),
    )
}

fn start(desc: &ScenarioDescription, gateway: StorageGateway) -> (PersistenceEngine, SimWorld) {
    let world = SimWorld::from_scenario(desc).expect("scenario spawns");
    let engine = PersistenceEngine::new(EngineConfig::default(), desc.clone(), gateway)
        .expect("default config is valid");
    (engine, world)
}

/// Forward world events and advance time for `secs` seconds.
fn run(engine: &mut PersistenceEngine, world: &mut SimWorld, secs: f64) {
    let frames = (secs / FRAME).round() as usize;
    for _ in 0..frames {
        for event in world.drain_events() {
            engine.handle_event(world, event);
        }
        engine.advance(world, FRAME);
    }
}

/// Write a snapshot stamped for `desc` under its default key.
fn seed_snapshot(temp: &TempDir, desc: &ScenarioDescription, mut snap: Snapshot) {
    snap.meta = Some(SnapshotMeta {
        key: desc.title.clone(),
        fp: compute_fingerprint(desc),
        theatre: desc.theatre.clone(),
        mission_name: desc.title.clone(),
    });
    let gw = StorageGateway::new(temp.path());
    let path = gw.resolve_path(&desc.title).unwrap();
    gw.write_snapshot(&path, &snap).unwrap();
}

// -- 1. Tank-1 / Tank-2 ----------------------------------------------------

#[test]
fn dead_tank_removed_and_survivor_repositioned() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.dead_units.insert("Tank-1".to_owned());
    snap.unit_pos
        .insert("Tank-2".to_owned(), Transform::new(100.0, 0.0, 200.0, 1.57));
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    assert!(matches!(
        engine.load_outcome(),
        Some(LoadOutcome::Restored { dead_units: 1, transforms: 1, .. })
    ));

    run(&mut engine, &mut world, 10.0);

    assert_eq!(engine.phase(), ReconcilePhase::Steady);
    assert!(!world.is_alive("Tank-1"));
    assert!(world.destroy_log().contains(&"Tank-1".to_owned()));
    assert_eq!(world.composite_members("Armor-1"), Some(vec!["Tank-2".to_owned()]));
    assert_eq!(
        world.member_transform("Tank-2"),
        Some(Transform::new(100.0, 0.0, 200.0, 1.57))
    );

    let respawned = world.spawned_template("Armor-1").unwrap();
    let tank2 = respawned.member("Tank-2").unwrap();
    assert_eq!(tank2.skill, Skill::High);
    assert_eq!(tank2.extra["callsign"], serde_json::json!("Bear 2"));
    assert!(respawned.member("Tank-1").is_none());

    // Armor-2 was never touched by the snapshot.
    assert_eq!(world.spawn_log(), &["Armor-1".to_owned()]);
}

// -- 2. Two full sessions ----------------------------------------------------

#[test]
fn losses_and_positions_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();

    {
        let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
        engine.handle_event(&mut world, HostEvent::ScenarioStart);
        run(&mut engine, &mut world, 8.0);

        world.kill("Tank-1");
        world.kill("Depot");
        world
            .move_member("Tank-3", Transform::new(420.0, 0.0, 380.0, 3.0))
            .unwrap();
        run(&mut engine, &mut world, 6.0);
        assert!(engine.save_stats().writes >= 1, "debounced save ran");
        engine.save_now(&mut world).unwrap();
    }

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    assert!(world.is_alive("Tank-1"));
    assert!(world.is_alive("Depot"));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert!(!world.is_alive("Tank-1"));
    assert!(!world.is_alive("Depot"));
    assert_eq!(
        world.member_transform("Tank-3"),
        Some(Transform::new(420.0, 0.0, 380.0, 3.0))
    );
    assert_eq!(
        world.member_transform("Tank-2"),
        Some(Transform::new(10.0, 0.0, 0.0, 0.0))
    );
}

// -- 3. Load validation ------------------------------------------------------

#[test]
fn foreign_fingerprint_is_rejected() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.dead_units.insert("Tank-1".to_owned());
    snap.meta = Some(SnapshotMeta {
        key: desc.title.clone(),
        fp: Fingerprint::from_hex("ffffffffffffffff"),
        theatre: desc.theatre.clone(),
        mission_name: desc.title.clone(),
    });
    let gw = StorageGateway::new(temp.path());
    gw.write_snapshot(&gw.resolve_path(&desc.title).unwrap(), &snap)
        .unwrap();

    let (mut engine, mut world) = start(&desc, gw);
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert!(matches!(engine.load_outcome(), Some(LoadOutcome::Rejected { .. })));
    assert!(engine.store().snapshot().dead_units.is_empty());
    assert!(world.is_alive("Tank-1"));
    assert!(world.spawn_log().is_empty());
    assert!(world.notices().is_empty(), "rejection is not user-visible");
}

#[test]
fn legacy_snapshot_without_meta_is_accepted() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let gw = StorageGateway::new(temp.path());
    fs::write(
        gw.resolve_path(&desc.title).unwrap(),
        r#"{ "deadUnits": { "Tank-3": true }, "deadStatics": { "Depot": true } }"#,
    )
    .unwrap();

    let (mut engine, mut world) = start(&desc, gw);
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert!(!world.is_alive("Tank-3"));
    assert!(!world.is_alive("Depot"));
    assert_eq!(world.composite_members("Armor-2"), None);
}

#[test]
fn corrupt_file_degrades_to_empty() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let gw = StorageGateway::new(temp.path());
    let path = gw.resolve_path(&desc.title).unwrap();
    fs::write(&path, "{ not json").unwrap();

    let (mut engine, mut world) = start(&desc, gw);
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert!(matches!(engine.load_outcome(), Some(LoadOutcome::Rejected { .. })));
    assert_eq!(engine.phase(), ReconcilePhase::Steady);
    assert_eq!(world.member_count(), 3);
}

// -- 4. Player protection ----------------------------------------------------

#[test]
fn human_aircraft_stay_put() {
    let temp = TempDir::new().unwrap();
    let desc = air_scenario();
    let mut snap = Snapshot::default();
    snap.unit_pos
        .insert("Viper-1-1".to_owned(), Transform::new(9.0, 9000.0, 9.0, 0.0));
    snap.unit_pos
        .insert("Hip-1-1".to_owned(), Transform::new(40.0, 250.0, 60.0, 0.7));
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert_eq!(world.spawn_log(), &["Hip-1".to_owned()]);
    assert_eq!(
        world.member_transform("Viper-1-1"),
        Some(Transform::new(0.0, 3000.0, 0.0, 0.0))
    );
    assert_eq!(
        world.member_transform("Hip-1-1"),
        Some(Transform::new(40.0, 250.0, 60.0, 0.7))
    );
}

#[test]
fn player_losses_are_not_recorded_by_default() {
    let temp = TempDir::new().unwrap();
    let desc = air_scenario();
    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);

    world.kill("Viper-1-1");
    world.kill("Hip-1-1");
    run(&mut engine, &mut world, 1.0);

    assert!(!engine.store().is_dead(EntityCategory::Unit, "Viper-1-1"));
    assert!(engine.store().is_dead(EntityCategory::Unit, "Hip-1-1"));
}

// -- 5. Failure handling -----------------------------------------------------

#[test]
fn spawn_failure_skips_to_next_composite() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.unit_pos
        .insert("Tank-1".to_owned(), Transform::new(1.0, 0.0, 1.0, 0.0));
    snap.unit_pos
        .insert("Tank-3".to_owned(), Transform::new(3.0, 0.0, 3.0, 0.0));
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    world.reject_spawns_of("Armor-1");
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);

    assert_eq!(
        engine.respawn_log(),
        &[
            ("Armor-1".to_owned(), RespawnOutcome::Failed),
            ("Armor-2".to_owned(), RespawnOutcome::Respawned { members: 1 }),
        ]
    );
    assert_eq!(engine.phase(), ReconcilePhase::Steady);
    assert_eq!(
        world.member_transform("Tank-3"),
        Some(Transform::new(3.0, 0.0, 3.0, 0.0))
    );
}

#[test]
fn unavailable_storage_notifies_once_and_disables() {
    let desc = armor_scenario();
    let (mut engine, mut world) = start(&desc, StorageGateway::disabled());
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    world.kill("Tank-1");
    run(&mut engine, &mut world, 120.0);

    assert_eq!(engine.phase(), ReconcilePhase::Disabled);
    assert_eq!(engine.load_outcome(), Some(&LoadOutcome::Unavailable));
    assert_eq!(world.notices().len(), 1);
    assert_eq!(engine.save_stats().writes, 0);
    assert!(matches!(
        engine.save_now(&mut world),
        Err(EngineError::Store(StoreError::IoUnavailable))
    ));
    assert!(matches!(
        engine.save_file_name(),
        Err(EngineError::Store(StoreError::IoUnavailable))
    ));
}

// -- 6. Removal retries ------------------------------------------------------

#[test]
fn late_spawns_are_caught_and_passes_are_bounded() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.dead_units.insert("Tank-3".to_owned());
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 8.0);
    assert!(!world.is_alive("Tank-3"));

    // The host brings the dead unit back under another composite.
    world
        .spawn_composite(
            FactionId(1),
            CompositeCategory::Ground,
            &CompositeSpec::new("Reinforcements", vec![MemberSpec::new("Tank-3", "T-80U", 0.0, 0.0)]),
        )
        .unwrap();
    assert!(world.is_alive("Tank-3"));
    run(&mut engine, &mut world, 5.0);
    assert!(!world.is_alive("Tank-3"));

    run(&mut engine, &mut world, 200.0);
    assert_eq!(engine.removal_passes(), 30);
}

// -- 7. Respawn pacing -------------------------------------------------------

fn column_scenario(groups: usize) -> ScenarioDescription {
    let mut faction = FactionSpec::new(FactionId(1), "red");
    for g in 0..groups {
        let x = g as f64 * 100.0;
        faction = faction.with_composite(
            CompositeCategory::Ground,
            CompositeSpec::new(
                format!("Group-{g}"),
                vec![
                    MemberSpec::new(format!("Group-{g}-lead"), "BMP-2", x, 0.0),
                    MemberSpec::new(format!("Group-{g}-wing"), "BMP-2", x, 10.0),
                ],
            ),
        );
    }
    ScenarioDescription::new("Caucasus", "Column").with_faction(faction)
}

fn saved_lead(g: usize) -> Transform {
    Transform::new(1_000.0 + g as f64, 0.0, 2_000.0, 0.5)
}

#[test]
fn respawn_applies_one_composite_per_throttle_tick() {
    const GROUPS: usize = 4;
    let temp = TempDir::new().unwrap();
    let desc = column_scenario(GROUPS);
    let mut snap = Snapshot::default();
    for g in 0..GROUPS {
        snap.unit_pos.insert(format!("Group-{g}-lead"), saved_lead(g));
    }
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    engine.advance(&mut world, 6.0);
    assert_eq!(engine.phase(), ReconcilePhase::RespawnQueued);
    assert_eq!(engine.pending_respawns(), GROUPS);
    assert!(world.spawn_log().is_empty());

    let throttle = engine.config().respawn_throttle_secs;
    engine.advance(&mut world, throttle);
    assert_eq!(engine.pending_respawns(), GROUPS - 1);
    assert_eq!(world.spawn_log(), &["Group-0".to_owned()]);

    // Saving now must not overwrite the loaded positions of groups that are
    // still queued with their authored ones.
    let path = engine.save_now(&mut world).unwrap();
    let saved = StorageGateway::new(temp.path()).read_snapshot(&path).unwrap();
    for g in 0..GROUPS {
        assert_eq!(saved.unit_pos.get(&format!("Group-{g}-lead")), Some(&saved_lead(g)));
    }
    assert!(saved.unit_pos.contains_key("Group-0-wing"));
    assert!(!saved.unit_pos.contains_key("Group-3-wing"));

    for left in (0..GROUPS - 1).rev() {
        assert_eq!(engine.phase(), ReconcilePhase::RespawnQueued);
        engine.advance(&mut world, throttle);
        assert_eq!(engine.pending_respawns(), left);
        assert_eq!(world.spawn_log().len(), GROUPS - left);
    }
    assert_eq!(engine.phase(), ReconcilePhase::Steady);
    for g in 0..GROUPS {
        assert_eq!(world.member_transform(&format!("Group-{g}-lead")), Some(saved_lead(g)));
    }
}

// -- 8. Ordering around the load --------------------------------------------

#[test]
fn deaths_before_load_are_kept() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.unit_pos
        .insert("Tank-3".to_owned(), Transform::new(7.0, 0.0, 7.0, 0.0));
    seed_snapshot(&temp, &desc, snap);

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    world.kill("Tank-1");
    for event in world.drain_events() {
        engine.handle_event(&mut world, event);
    }
    assert_eq!(engine.phase(), ReconcilePhase::Idle);

    run(&mut engine, &mut world, 7.0);
    assert!(engine.store().is_dead(EntityCategory::Unit, "Tank-1"));
    assert_eq!(
        engine.store().transform("Tank-3"),
        Some(&Transform::new(7.0, 0.0, 7.0, 0.0)),
        "debounced save before respawn must not clobber loaded positions"
    );

    let path = engine.save_file_name().unwrap();
    let saved = StorageGateway::new(temp.path()).read_snapshot(&path).unwrap();
    assert!(saved.dead_units.contains("Tank-1"));
}

#[test]
fn reset_forgets_previous_session() {
    let temp = TempDir::new().unwrap();
    let desc = armor_scenario();
    let mut snap = Snapshot::default();
    snap.dead_units.insert("Tank-3".to_owned());
    seed_snapshot(&temp, &desc, snap);

    {
        let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
        engine.handle_event(&mut world, HostEvent::ScenarioStart);
        engine.reset(&mut world).unwrap();
    }

    let (mut engine, mut world) = start(&desc, StorageGateway::new(temp.path()));
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 10.0);
    assert!(world.is_alive("Tank-3"));
}
