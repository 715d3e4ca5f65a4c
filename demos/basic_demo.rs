//! Basic demonstration of the Skirmish simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=skirmish_sim=debug` to see orders and group events.

use glam::Vec2;
use skirmish_sim::{Owner, SimWorld, UnitConfig};

fn main() -> skirmish_sim::Result<()> {
    init_tracing();
    println!("=== Skirmish - Simulation Demo ===\n");

    let mut sim = SimWorld::new();

    let blue = UnitConfig {
        owner: Owner::Blue,
        ..Default::default()
    };
    let red = UnitConfig {
        owner: Owner::Red,
        max_speed: 2.5,
        ..Default::default()
    };
    let blues = sim.spawn_block(&blue, Vec2::new(-15.0, 0.0), 12, 1.5)?;
    let reds = sim.spawn_block(&red, Vec2::new(15.0, 0.0), 12, 1.5)?;

    println!("Initial state:");
    print_snapshot(&sim);

    println!("\n--- Blue attack-moves east, Red holds the line ---\n");
    sim.issue_attack_move_order(&blues, Vec2::new(20.0, 0.0))?;
    sim.set_hold_position(&reds, true)?;

    // 20 seconds at 60 ticks/sec
    for _ in 0..1200 {
        sim.step(1.0 / 60.0);
        // Death handling is the caller's job.
        sim.remove_dead_units();

        if sim.current_tick() % 120 == 0 {
            println!(
                "--- Tick {} (t={:.1}s, groups={}) ---",
                sim.current_tick(),
                sim.current_time(),
                sim.group_count()
            );
            print_snapshot(&sim);
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn print_snapshot(sim: &SimWorld) {
    let snapshot = sim.snapshot();
    for owner in [Owner::Blue, Owner::Red] {
        let units: Vec<_> = snapshot.units.iter().filter(|u| u.owner == owner).collect();
        let health: i32 = units.iter().map(|u| u.health).sum();
        let fighting = units.iter().filter(|u| u.attacking).count();
        println!(
            "  {}: {} units, {} hp total, {} fighting",
            owner.name(),
            units.len(),
            health,
            fighting
        );
    }
}
