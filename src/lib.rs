//! Botworld - deterministic fixed-tic bot simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (component store, motion, collisions, AI, combat)
//! - `view`: Read-models derived from simulation state for rendering (minimap, pointer tile)
//! - `coords`: Screen/world/grid coordinate conversion
//! - `parity`: Comparison of two independently produced simulation snapshots
//! - `config`: Data-driven simulation tuning

pub mod config;
pub mod coords;
pub mod error;
pub mod parity;
pub mod sim;
pub mod view;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use parity::{ParityInput, ParityReport, verify_parity};
pub use sim::{EntityId, Simulation, Snapshot};

use glam::Vec2;

/// Simulation constants that are not tunable through [`SimConfig`]
pub mod consts {
    /// Size of one floor tile on screen at zoom 1.0
    pub const TILE_SIZE_PX: f32 = 64.0;

    /// Cooldown written to `Collided` when a collision response is applied
    pub const COLLISION_COOLDOWN_TICS: u32 = 4;

    /// Speed bounds of the motion model (tiles per second)
    pub const MIN_BOT_SPEED: f32 = 0.5;
    pub const MAX_BOT_SPEED: f32 = 2.0;

    /// Wander persistence window (milliseconds)
    pub const WANDER_MIN_MS: f32 = 1000.0;
    pub const WANDER_MAX_MS: f32 = 3000.0;

    /// Length of one motion-model keyframe segment (milliseconds)
    pub const MOTION_SEGMENT_MS: u64 = 1500;

    /// Faction bits used by `HostileToFactions` and `Faction`
    pub const FACTION_NEUTRAL: u8 = 1 << 0;
    pub const FACTION_A: u8 = 1 << 1;
    pub const FACTION_B: u8 = 1 << 2;
    pub const FACTION_ALL: u8 = FACTION_NEUTRAL | FACTION_A | FACTION_B;
}

/// Convert a duration in milliseconds to a whole number of tics (at least 1)
#[inline]
pub fn ms_to_tics(ms: f32, tic_ms: f32) -> u32 {
    ((ms / tic_ms).round() as u32).max(1)
}

/// Normalize a vector, falling back to `fallback` for (near) zero input
#[inline]
pub fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > 1e-12 { v / len_sq.sqrt() } else { fallback }
}
