//! Component types
//!
//! Plain data only. Cross-entity relations are stored as [`EntityId`]s and
//! resolved through the store, never as references.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::facing::Facing;
use super::motion::MotionState;
use super::store::EntityId;

/// Marker for autonomous agents that appear in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bot;

/// Current position (tile units)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position(pub Vec2);

/// Position at the start of the current tic, before movement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviousPosition(pub Vec2);

/// Desired heading; `magnitude` scales the configured bot speed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetDirection {
    pub dir: Vec2,
    pub magnitude: f32,
}

impl TargetDirection {
    /// Components of `dir` are clamped to [-1, 1] and magnitude to [0, 1]
    pub fn new(dir: Vec2, magnitude: f32) -> Self {
        Self {
            dir: dir.clamp(Vec2::NEG_ONE, Vec2::ONE),
            magnitude: if magnitude.is_finite() { magnitude.clamp(0.0, 1.0) } else { 0.0 },
        }
    }

    pub const STOPPED: TargetDirection = TargetDirection {
        dir: Vec2::ZERO,
        magnitude: 0.0,
    };

    /// Displacement for one tic given the full-magnitude distance
    #[inline]
    pub fn displacement(&self, tic_distance: f32) -> Vec2 {
        self.dir * self.magnitude * tic_distance
    }
}

/// Collision response cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collided {
    pub ticks_remaining: u32,
}

/// Participates in entity-entity collision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub radius: f32,
}

/// Tics left before the wander behavior picks a new heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WanderPersistence {
    pub tics_until_next_change: u32,
}

/// Previous motion-model output, threaded back in on the next retarget
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionMemory {
    pub state: Option<MotionState>,
    pub facing: Option<Facing>,
}

/// Tile the entity is currently heading for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub tile_x: i32,
    pub tile_y: i32,
}

impl Destination {
    /// Center of the destination tile in world units
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.tile_x as f32 + 0.5, self.tile_y as f32 + 0.5)
    }
}

/// Forces a retarget when it runs out, whether or not the goal was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestinationDeadline {
    pub tics_remaining: u32,
    /// Path length when the destination was assigned (telemetry only)
    pub path_tiles: u32,
}

/// The entity's own faction bit (see `consts::FACTION_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    pub bits: u8,
}

/// Factions this entity will fire on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostileToFactions {
    pub mask: u8,
}

impl HostileToFactions {
    #[inline]
    pub fn is_hostile_to(&self, faction: Faction) -> bool {
        self.mask & faction.bits != 0
    }
}

/// Projectile launcher. `loaded_food == EntityId::NONE` means unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FoodCanon {
    pub loaded_food: EntityId,
    pub ammo_remaining: u32,
}

impl FoodCanon {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        !self.loaded_food.is_none()
    }

    #[inline]
    pub fn can_fire(&self) -> bool {
        self.is_loaded() && self.ammo_remaining > 0
    }
}

/// Hits a projectile can take before it is retired to its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotCount {
    pub max: u32,
    pub remaining: u32,
}

impl ShotCount {
    pub fn full(max: u32) -> Self {
        let max = max.max(1);
        Self { max, remaining: max }
    }
}

/// Present only while a food entity is in flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Tiles per second
    pub velocity: Vec2,
    /// Where the food returns when retired
    pub origin: Vec2,
    pub owner: EntityId,
    /// Last entity hit, so one contact is not counted every tic
    pub last_hit: EntityId,
}

/// Color of the entity's minimap dot; presence alone means "on the minimap"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimapPixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Floor tile under the pointer (singleton pointer entity only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointerTile {
    pub tile_x: i32,
    pub tile_y: i32,
}
