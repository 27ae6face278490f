//! Two-session skirmish demo -- losses and positions persist across runs.
//!
//! Run with:
//!   cargo run --example skirmish -p lazarus-engine [-- path/to/config.json]
//!
//! Session one plays a seeded skirmish against the in-memory host and saves.
//! Session two restarts the same scenario and reconciles it against the save.
//! Set `RUST_LOG=info` (or `debug`) to watch the engine work.

use anyhow::Context;
use lazarus_engine::logging::init_tracing;
use lazarus_engine::prelude::*;
use lazarus_store::prelude::*;
use lazarus_world::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const FRAME: f64 = 0.1;
const SEED: u64 = 2024;

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

fn scenario() -> ScenarioDescription {
    let armor = |name: &str, x: f64| {
        CompositeSpec::new(
            name,
            (1..=4)
                .map(|i| MemberSpec::new(format!("{name}-{i}"), "T-72B", x, i as f64 * 15.0))
                .collect(),
        )
    };
    ScenarioDescription::new("Caucasus", "Operation Lazarus")
        .with_faction(
            FactionSpec::new(FactionId(1), "red")
                .with_composite(CompositeCategory::Ground, armor("Red Armor 1", 0.0))
                .with_composite(CompositeCategory::Ground, armor("Red Armor 2", 200.0))
                .with_static(StaticSpec::new("Red Fuel Depot", "Tank farm", -50.0, 0.0)),
        )
        .with_faction(
            FactionSpec::new(FactionId(2), "blue")
                .with_composite(CompositeCategory::Ground, armor("Blue Armor 1", 2_000.0))
                .with_composite(
                    CompositeCategory::Plane,
                    CompositeSpec::new(
                        "Enfield 1",
                        vec![MemberSpec::new("Enfield 1-1", "F-16C", 3_000.0, 0.0)
                            .with_alt(6_000.0)
                            .with_skill(Skill::Client)],
                    ),
                )
                .with_composite(
                    CompositeCategory::Helicopter,
                    CompositeSpec::new(
                        "Dodge 1",
                        vec![MemberSpec::new("Dodge 1-1", "AH-64D", 2_500.0, 100.0)
                            .with_alt(150.0)
                            .with_extra("loadout", serde_json::json!("hellfire-8"))],
                    ),
                ),
        )
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

fn run(engine: &mut PersistenceEngine, world: &mut SimWorld, secs: f64) {
    let frames = (secs / FRAME).round() as usize;
    for _ in 0..frames {
        for event in world.drain_events() {
            engine.handle_event(world, event);
        }
        engine.advance(world, FRAME);
    }
}

fn first_session(config: &EngineConfig, gateway: &StorageGateway) -> anyhow::Result<()> {
    let desc = scenario();
    let mut world = SimWorld::from_scenario(&desc)?;
    let mut engine = PersistenceEngine::new(config.clone(), desc.clone(), gateway.clone())?;
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    run(&mut engine, &mut world, 7.0);

    let mut rng = Pcg64::seed_from_u64(SEED);
    let names: Vec<String> = desc
        .composites()
        .flat_map(|entry| entry.spec.members.iter().map(|m| m.name.clone()))
        .collect();
    let mut losses = 0;
    for _ in 0..60 {
        let name = &names[rng.gen_range(0..names.len())];
        if rng.gen_bool(0.2) {
            losses += usize::from(world.kill(name));
        } else if world.is_alive(name) {
            let t = world.member_transform(name).unwrap_or_default();
            world.move_member(
                name,
                Transform::new(
                    t.x + rng.gen_range(-250.0..250.0),
                    t.y,
                    t.z + rng.gen_range(-250.0..250.0),
                    rng.gen_range(0.0..std::f64::consts::TAU),
                ),
            )?;
        }
        run(&mut engine, &mut world, 1.0);
    }
    losses += usize::from(world.kill("Red Fuel Depot"));
    run(&mut engine, &mut world, 6.0);
    let path = engine.save_now(&mut world)?;

    println!("session 1: {losses} losses, {} members alive", world.member_count());
    println!("           saved {} time(s) to {}", engine.save_stats().writes, path.display());
    Ok(())
}

fn second_session(config: &EngineConfig, gateway: &StorageGateway) -> anyhow::Result<()> {
    let desc = scenario();
    let mut world = SimWorld::from_scenario(&desc)?;
    println!("session 2: {} members alive before reconciliation", world.member_count());

    let mut engine = PersistenceEngine::new(config.clone(), desc, gateway.clone())?;
    engine.handle_event(&mut world, HostEvent::ScenarioStart);
    println!("           load: {:?}", engine.load_outcome());
    run(&mut engine, &mut world, 15.0);

    println!(
        "           phase {}, {} members alive, depot alive: {}",
        engine.phase(),
        world.member_count(),
        world.is_alive("Red Fuel Depot")
    );
    for (composite, outcome) in engine.respawn_log() {
        println!("           {composite}: {outcome:?}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing("warn");

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(&path)?,
        None => EngineConfig::default(),
    };
    let dir = tempfile::tempdir().context("creating save directory")?;
    let gateway = StorageGateway::new(dir.path());

    first_session(&config, &gateway)?;
    second_session(&config, &gateway)?;
    Ok(())
}
