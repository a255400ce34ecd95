//! Fixed timestep simulation tic
//!
//! The only mutating entry point. System order is fixed:
//! movement/collision, wander, destinations, combat, then read-models.

use super::behavior::{run_destinations, run_wander};
use super::combat::run_combat;
use super::motion::{MotionKey, MotionModel};
use super::movement::run_movement;
use super::state::{SimEvent, Simulation, TicReport};
use super::store::EntityId;
use super::terrain::TileMap;
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::view::{TileRect, extract_minimap, update_pointer_tile};

/// Read-only inputs shared by every system during one tic
#[derive(Debug, Clone, Copy)]
pub struct TicContext<'a> {
    pub seed: u64,
    /// Index of the tic being computed
    pub tic: u64,
    /// Simulation time at the start of the tic
    pub time_ms: u64,
    pub dt_ms: f32,
    pub config: &'a SimConfig,
    pub terrain: &'a TileMap,
    pub motion: &'a MotionModel,
}

impl TicContext<'_> {
    /// Random stream key for `entity` under this simulation's seed
    #[inline]
    pub fn key(&self, entity: EntityId) -> MotionKey {
        MotionKey::new(self.seed, entity.raw())
    }
}

impl Simulation {
    /// Advance the simulation by one tic of `dt_ms` milliseconds.
    ///
    /// Rejects a non-positive or non-finite `dt_ms` without touching state.
    pub fn advance_tic(&mut self, dt_ms: f32) -> Result<TicReport> {
        if !(dt_ms.is_finite() && dt_ms > 0.0) {
            return Err(SimError::InvalidTicDuration(dt_ms));
        }

        let mut events: Vec<SimEvent> = self
            .spawn_due()
            .into_iter()
            .map(|entity| SimEvent::Spawned { entity })
            .collect();

        let ctx = TicContext {
            seed: self.seed,
            tic: self.tic,
            time_ms: self.elapsed_ms.floor() as u64,
            dt_ms,
            config: &self.config,
            terrain: &self.terrain,
            motion: &self.motion,
        };

        run_movement(&mut self.store, &ctx, &mut events);
        run_wander(&mut self.store, &ctx, &mut events);
        run_destinations(&mut self.store, &ctx, &mut events);
        run_combat(&mut self.store, &ctx, &mut events);

        self.refresh_read_models();

        self.tic += 1;
        self.elapsed_ms += dt_ms as f64;
        Ok(TicReport { tic: self.tic, events })
    }

    /// Run `count` tics, stopping at the first error
    pub fn advance_tics(&mut self, count: u64, dt_ms: f32) -> Result<Vec<TicReport>> {
        (0..count).map(|_| self.advance_tic(dt_ms)).collect()
    }

    fn refresh_read_models(&mut self) {
        self.minimap = extract_minimap(&self.store, TileRect::covering(&self.terrain));

        if let Some(input) = self.pointer_input {
            if self.store.is_alive(self.pointer) {
                update_pointer_tile(&mut self.store, self.pointer, input.screen, &input.camera);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use proptest::prelude::*;

    use super::*;
    use crate::consts::*;
    use crate::coords::Camera;
    use crate::parity::{ParityInput, verify_parity};
    use crate::sim::components::*;
    use crate::sim::state::Behavior;

    fn world(seed: u64, bots: usize) -> Simulation {
        let terrain = TileMap::generate(seed, 24, 16, 8);
        let mut sim = Simulation::new(seed, terrain, SimConfig::default()).unwrap();
        let ids = sim.populate(bots, Behavior::Wander);
        sim.populate(bots / 2, Behavior::Seek);
        for (i, id) in ids.iter().enumerate() {
            let (faction, enemy) = if i % 2 == 0 { (FACTION_A, FACTION_B) } else { (FACTION_B, FACTION_A) };
            sim.arm(*id, faction, enemy).unwrap();
            let home = sim.store.get::<Position>(*id).unwrap().0;
            let food = sim.spawn_food(home);
            sim.load_canon(*id, food, 2).unwrap();
        }
        sim
    }

    #[test]
    fn test_rejects_invalid_tic_duration() {
        let mut sim = world(1, 4);
        let before = sim.state_hash();
        for dt in [0.0, -16.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(sim.advance_tic(dt), Err(SimError::InvalidTicDuration(_))));
        }
        assert_eq!(sim.tic(), 0);
        assert_eq!(sim.state_hash(), before);
    }

    #[test]
    fn test_tic_and_time_advance() {
        let mut sim = world(1, 2);
        let report = sim.advance_tic(50.0).unwrap();
        assert_eq!(report.tic, 1);
        sim.advance_tic(16.5).unwrap();
        assert_eq!(sim.tic(), 2);
        assert!((sim.elapsed_ms() - 66.5).abs() < 1e-9);
    }

    #[test]
    fn test_determinism() {
        // Two simulations with the same seed must agree bit for bit
        let mut a = world(99999, 10);
        let mut b = world(99999, 10);

        for _ in 0..200 {
            let ra = a.advance_tic(50.0).unwrap();
            let rb = b.advance_tic(50.0).unwrap();
            assert_eq!(ra.events, rb.events);
        }
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_determinism_across_threads() {
        let run = || {
            std::thread::spawn(|| {
                let mut sim = world(2024, 12);
                sim.advance_tics(300, 50.0).unwrap();
                (sim.state_hash(), sim.snapshot())
            })
        };
        let (left, right) = (run(), run());
        let (hash_a, snap_a) = left.join().unwrap();
        let (hash_b, snap_b) = right.join().unwrap();
        assert_eq!(hash_a, hash_b);

        let report = verify_parity(&ParityInput::from_snapshots(&snap_a, &snap_b, 0.5));
        assert!(report.ok, "{report:?}");
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = world(5, 6);
        let mut b = world(6, 6);
        a.advance_tics(20, 50.0).unwrap();
        b.advance_tics(20, 50.0).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_bots_stay_in_bounds() {
        let mut sim = world(77, 16);
        for _ in 0..400 {
            sim.advance_tic(50.0).unwrap();
            for (id, pos) in sim.store.iter::<Position>() {
                assert!(pos.0.is_finite(), "{id} left the finite plane");
                assert!(pos.0.cmpge(Vec2::ZERO).all() && pos.0.cmple(sim.terrain.bounds()).all());
            }
        }
    }

    #[test]
    fn test_queued_bots_spawn_on_their_tic() {
        let mut sim = Simulation::new(3, TileMap::bordered(10, 10), SimConfig::default()).unwrap();
        sim.queue_bot(2, Vec2::new(4.5, 4.5), Behavior::Wander);
        assert_eq!(sim.pending_bots(), 1);

        sim.advance_tic(50.0).unwrap();
        sim.advance_tic(50.0).unwrap();
        assert_eq!(sim.bot_count(), 0);

        let report = sim.advance_tic(50.0).unwrap();
        assert!(matches!(report.events[0], SimEvent::Spawned { .. }));
        assert_eq!(sim.bot_count(), 1);
        assert_eq!(sim.pending_bots(), 0);
    }

    #[test]
    fn test_head_on_bots_bounce() {
        let mut sim = Simulation::new(3, TileMap::bordered(12, 6), SimConfig::default()).unwrap();
        let a = sim.spawn_bot(Vec2::new(5.0, 3.0), Behavior::Wander);
        let b = sim.spawn_bot(Vec2::new(5.65, 3.0), Behavior::Wander);
        for (id, dir) in [(a, Vec2::X), (b, Vec2::NEG_X)] {
            sim.store.attach(id, TargetDirection::new(dir, 1.0));
            sim.store.attach(id, WanderPersistence { tics_until_next_change: 100 });
        }

        let report = sim.advance_tic(50.0).unwrap();
        assert!(report.events.contains(&SimEvent::Collision { a, b }));
        assert_eq!(sim.store.get::<Position>(a).unwrap().0, Vec2::new(5.0, 3.0));
        assert_eq!(sim.store.get::<Collided>(b).unwrap().ticks_remaining, COLLISION_COOLDOWN_TICS);
    }

    #[test]
    fn test_combat_round_trip() {
        let mut sim = Simulation::new(11, TileMap::bordered(16, 8), SimConfig::default()).unwrap();
        let shooter = sim.spawn_bot(Vec2::new(3.5, 4.5), Behavior::Wander);
        let target = sim.spawn_bot(Vec2::new(8.5, 4.5), Behavior::Wander);
        for id in [shooter, target] {
            sim.store.attach(id, WanderPersistence { tics_until_next_change: 1000 });
        }
        sim.arm(shooter, FACTION_A, FACTION_B).unwrap();
        sim.arm(target, FACTION_B, FACTION_NEUTRAL).unwrap();
        let food = sim.spawn_food(Vec2::new(1.5, 1.5));
        sim.load_canon(shooter, food, 1).unwrap();

        let first = sim.advance_tic(50.0).unwrap();
        assert!(first.events.iter().any(|e| matches!(e, SimEvent::CanonFired { .. })));
        assert!(matches!(sim.load_canon(shooter, food, 1), Err(SimError::FoodInFlight(_))));

        let mut retired = false;
        for _ in 0..400 {
            let report = sim.advance_tic(50.0).unwrap();
            if report.events.contains(&SimEvent::ProjectileRetired { projectile: food }) {
                retired = true;
                break;
            }
        }
        assert!(retired, "projectile never used up its shots");
        assert!(sim.store.is_alive(food));
        assert_eq!(sim.store.get::<Position>(food).unwrap().0, Vec2::new(1.5, 1.5));
        // Back in the pool: reloading works again
        sim.load_canon(shooter, food, 1).unwrap();
    }

    #[test]
    fn test_read_models_refresh_every_tic() {
        let mut sim = Simulation::new(3, TileMap::bordered(10, 10), SimConfig::default()).unwrap();
        let bot = sim.spawn_bot(Vec2::new(4.5, 4.5), Behavior::Wander);
        let pointer = sim.spawn_pointer();
        sim.set_pointer(Vec2::new(129.0, 193.0), Camera::default());

        sim.advance_tic(50.0).unwrap();
        assert_eq!(sim.minimap().len(), 1);
        assert_eq!(
            sim.store.get::<PointerTile>(pointer),
            Some(&PointerTile { tile_x: 2, tile_y: 3 })
        );

        sim.store.remove::<MinimapPixel>(bot);
        sim.advance_tic(50.0).unwrap();
        assert!(sim.minimap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_cooldown_monotonic(seed in any::<u64>(), bots in 4usize..24) {
            let terrain = TileMap::generate(seed, 12, 10, 15);
            let mut sim = Simulation::new(seed, terrain, SimConfig::default()).unwrap();
            sim.populate(bots, Behavior::Wander);

            let cooldowns = |sim: &Simulation| -> Vec<(EntityId, u32)> {
                sim.store.iter::<Collided>().map(|(id, c)| (id, c.ticks_remaining)).collect()
            };

            let mut before = cooldowns(&sim);
            for _ in 0..120 {
                sim.advance_tic(50.0).unwrap();
                let after = cooldowns(&sim);
                for (id, now) in &after {
                    let was = before.iter().find(|(b, _)| b == id).map(|(_, t)| *t);
                    match was {
                        Some(was) => prop_assert!(
                            *now == COLLISION_COOLDOWN_TICS || *now == was.saturating_sub(1),
                            "{id}: {was} -> {now}"
                        ),
                        None => prop_assert_eq!(*now, COLLISION_COOLDOWN_TICS),
                    }
                }
                before = after;
            }
        }
    }
}
