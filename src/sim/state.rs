//! Simulation state and entity construction
//!
//! A [`Simulation`] owns its component store, terrain and configuration.
//! Nothing is shared between instances, so two simulations with the same seed
//! can run side by side (e.g. on separate threads) and must agree exactly.

use std::collections::BTreeMap;

use glam::{IVec2, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::components::*;
use super::facing::Facing;
use super::motion::{MotionKey, MotionModel, splitmix64};
use super::store::{AnyComponent, ComponentStore, EntityId};
use super::terrain::TileMap;
use crate::config::SimConfig;
use crate::coords::Camera;
use crate::error::{Result, SimError};
use crate::parity::{Point, Snapshot};
use crate::view::MinimapPoint;

/// Salt for the RNG stream used to place bots
const PLACEMENT_SALT: u64 = 0x504C_4143;

/// Gameplay events emitted during a tic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Bot spawned from the pending queue
    Spawned { entity: EntityId },
    /// Obstacle collision response (reverted to previous position)
    Bounce { entity: EntityId, normal: Vec2 },
    /// Entity-entity collision response
    Collision { a: EntityId, b: EntityId },
    /// New heading or destination chosen
    Retarget { entity: EntityId, reason: RetargetReason },
    CanonFired {
        shooter: EntityId,
        projectile: EntityId,
        target: EntityId,
        /// Ammo still owed to the reload rule after this shot
        ammo_left: u32,
    },
    /// `target` is `EntityId::NONE` for terrain hits
    ProjectileHit { projectile: EntityId, target: EntityId },
    /// Projectile ran out of shots and returned to its origin
    ProjectileRetired { projectile: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetargetReason {
    Wander,
    Arrived,
    Deadline,
}

/// Summary of one tic
#[derive(Debug, Clone, Default)]
pub struct TicReport {
    pub tic: u64,
    pub events: Vec<SimEvent>,
}

/// How a spawned bot picks where to go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    /// Motion-model driven wandering
    Wander,
    /// Walk to picked destinations under a deadline
    Seek,
}

/// Bot waiting in the spawn queue
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingSpawn {
    at_tic: u64,
    pos: Vec2,
    behavior: Behavior,
}

/// Pointer input recorded by the host, converted every tic
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointerInput {
    pub screen: Vec2,
    pub camera: Camera,
}

/// Complete simulation instance
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) seed: u64,
    pub(crate) config: SimConfig,
    pub(crate) motion: MotionModel,
    pub store: ComponentStore,
    pub terrain: TileMap,
    pub(crate) tic: u64,
    pub(crate) elapsed_ms: f64,
    pending: Vec<PendingSpawn>,
    pub(crate) pointer: EntityId,
    pub(crate) pointer_input: Option<PointerInput>,
    pub(crate) minimap: Vec<MinimapPoint>,
}

impl Simulation {
    /// Create an empty simulation over `terrain`
    pub fn new(seed: u64, terrain: TileMap, config: SimConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Simulation created: seed={seed}, terrain {}x{}, tic {}ms",
            terrain.width(),
            terrain.height(),
            config.tic_ms
        );
        Ok(Self {
            seed,
            motion: MotionModel::new(config.min_speed, config.max_speed),
            config,
            store: ComponentStore::new(),
            terrain,
            tic: 0,
            elapsed_ms: 0.0,
            pending: Vec::new(),
            pointer: EntityId::NONE,
            pointer_input: None,
            minimap: Vec::new(),
        })
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of tics advanced so far
    #[inline]
    pub fn tic(&self) -> u64 {
        self.tic
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Spawn a bot immediately
    pub fn spawn_bot(&mut self, pos: Vec2, behavior: Behavior) -> EntityId {
        let pos = self.terrain.clamp_position(pos, self.config.bot_radius);
        let mut bundle: Vec<AnyComponent> = vec![
            Bot.into(),
            Position(pos).into(),
            PreviousPosition(pos).into(),
            TargetDirection::STOPPED.into(),
            Collider { radius: self.config.bot_radius }.into(),
            Facing::default().into(),
            MinimapPixel { r: 240, g: 240, b: 240 }.into(),
        ];
        match behavior {
            Behavior::Wander => {
                bundle.push(WanderPersistence::default().into());
                bundle.push(MotionMemory::default().into());
            }
            // Zero deadline forces a destination pick on the first tic
            Behavior::Seek => bundle.push(DestinationDeadline::default().into()),
        }
        let id = self.store.spawn_with(bundle);
        log::debug!("Spawned {behavior:?} bot {id} at {pos}");
        id
    }

    /// Queue a bot to appear at the start of tic `at_tic`
    pub fn queue_bot(&mut self, at_tic: u64, pos: Vec2, behavior: Behavior) {
        self.pending.push(PendingSpawn { at_tic, pos, behavior });
    }

    /// Number of bots still waiting in the spawn queue
    pub fn pending_bots(&self) -> usize {
        self.pending.len()
    }

    /// Spawn queued bots that are due; returns their ids in queue order
    pub(crate) fn spawn_due(&mut self) -> Vec<EntityId> {
        let tic = self.tic;
        let (due, later): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.at_tic <= tic);
        self.pending = later;
        due.into_iter()
            .map(|p| self.spawn_bot(p.pos, p.behavior))
            .collect()
    }

    /// Scatter `count` bots over distinct walkable tiles, chosen from the seed
    pub fn populate(&mut self, count: usize, behavior: Behavior) -> Vec<EntityId> {
        let mut tiles: Vec<IVec2> = self.terrain.walkable_tiles().collect();
        let mut rng = MotionKey::new(self.seed, 0).rng(PLACEMENT_SALT);

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            if tiles.is_empty() {
                log::warn!("Ran out of walkable tiles after placing {} bots", ids.len());
                break;
            }
            let tile = tiles.swap_remove(rng.random_range(0..tiles.len()));
            ids.push(self.spawn_bot(tile.as_vec2() + Vec2::splat(0.5), behavior));
        }
        ids
    }

    /// Give a bot a faction, a hostility mask and an empty canon
    pub fn arm(&mut self, entity: EntityId, faction: u8, hostile_mask: u8) -> Result<()> {
        if !self.store.is_alive(entity) {
            return Err(SimError::NoSuchEntity(entity));
        }
        self.store.attach(entity, Faction { bits: faction });
        self.store.attach(entity, HostileToFactions { mask: hostile_mask });
        if !self.store.has::<FoodCanon>(entity) {
            self.store.attach(entity, FoodCanon::default());
        }
        if let Some(pixel) = self.store.get_mut::<MinimapPixel>(entity) {
            *pixel = faction_color(faction);
        }
        Ok(())
    }

    /// Pooled food item resting at `origin`
    pub fn spawn_food(&mut self, origin: Vec2) -> EntityId {
        self.store.spawn_with([
            AnyComponent::from(Position(origin)),
            ShotCount::full(self.config.projectile_shots).into(),
        ])
    }

    /// Load `food` into `canon` with `ammo` rounds.
    ///
    /// Entry point for the reload rule, which lives outside the simulation.
    pub fn load_canon(&mut self, canon: EntityId, food: EntityId, ammo: u32) -> Result<()> {
        if !self.store.is_alive(food) {
            return Err(SimError::NoSuchEntity(food));
        }
        if self.store.has::<Projectile>(food) {
            return Err(SimError::FoodInFlight(food));
        }
        let slot = self
            .store
            .get_mut::<FoodCanon>(canon)
            .ok_or(SimError::NoSuchEntity(canon))?;
        if ammo == 0 {
            *slot = FoodCanon::default();
        } else {
            *slot = FoodCanon {
                loaded_food: food,
                ammo_remaining: ammo,
            };
        }
        Ok(())
    }

    /// Create the singleton pointer entity (returns the existing one if present)
    pub fn spawn_pointer(&mut self) -> EntityId {
        if self.store.is_alive(self.pointer) {
            return self.pointer;
        }
        self.pointer = self.store.spawn_with([AnyComponent::from(PointerTile::default())]);
        self.pointer
    }

    #[inline]
    pub fn pointer(&self) -> Option<EntityId> {
        self.store.is_alive(self.pointer).then_some(self.pointer)
    }

    /// Record the pointer's screen position; converted to a tile every tic
    pub fn set_pointer(&mut self, screen: Vec2, camera: Camera) {
        self.pointer_input = Some(PointerInput { screen, camera });
    }

    /// Number of live bots
    pub fn bot_count(&self) -> usize {
        self.store.iter::<Bot>().count()
    }

    /// Minimap points computed at the end of the last tic
    pub fn minimap(&self) -> &[MinimapPoint] {
        &self.minimap
    }

    /// Export bot positions and terrain count for parity checks
    pub fn snapshot(&self) -> Snapshot {
        let bots: BTreeMap<String, Point> = self
            .store
            .iter::<Bot>()
            .filter_map(|(id, _)| {
                let pos = self.store.get::<Position>(id)?;
                Some((bot_label(id), Point::from(pos.0)))
            })
            .collect();
        Snapshot {
            tic: self.tic,
            bots,
            terrain_tiles: self.terrain.terrain_tile_count(),
        }
    }

    /// Hash of positions, cooldowns and the tic counter, in ascending id order.
    ///
    /// Built from a fixed SplitMix64 fold, so the value is stable across
    /// machines and toolchains.
    pub fn state_hash(&self) -> u64 {
        let mut ids = self.store.ids_with::<Position>();
        ids.sort_unstable();

        let mut hash = fold_hash(0, self.tic);
        hash = fold_hash(hash, ids.len() as u64);

        for id in ids {
            hash = fold_hash(hash, id.raw() as u64);
            if let Some(pos) = self.store.get::<Position>(id) {
                hash = fold_hash(hash, pos.0.x.to_bits() as u64);
                hash = fold_hash(hash, pos.0.y.to_bits() as u64);
            }
            if let Some(target) = self.store.get::<TargetDirection>(id) {
                hash = fold_hash(hash, target.dir.x.to_bits() as u64);
                hash = fold_hash(hash, target.dir.y.to_bits() as u64);
                hash = fold_hash(hash, target.magnitude.to_bits() as u64);
            }
            if let Some(collided) = self.store.get::<Collided>(id) {
                hash = fold_hash(hash, collided.ticks_remaining as u64);
            }
        }
        hash
    }
}

#[inline]
fn fold_hash(hash: u64, value: u64) -> u64 {
    splitmix64(hash.wrapping_add(0x9E37_79B9_7F4A_7C15) ^ value)
}

/// Snapshot label for a bot id
pub fn bot_label(id: EntityId) -> String {
    format!("b{id}")
}

/// Minimap color for a faction bit
pub fn faction_color(faction: u8) -> MinimapPixel {
    use crate::consts::*;
    match faction {
        FACTION_A => MinimapPixel { r: 220, g: 60, b: 60 },
        FACTION_B => MinimapPixel { r: 60, g: 110, b: 230 },
        _ => MinimapPixel { r: 240, g: 240, b: 240 },
    }
}
