//! Deterministic simulation module
//!
//! All entity logic lives here. This module must be pure and deterministic:
//! - Fixed tics only, driven through [`Simulation::advance_tic`]
//! - Keyed RNG streams only (seed, entity, salt)
//! - Stable resolution order (ascending entity id)
//! - Structural changes deferred to the end of each system pass
//! - No rendering or platform dependencies

pub mod behavior;
pub mod collision;
pub mod combat;
pub mod components;
pub mod facing;
pub mod motion;
pub mod movement;
pub mod state;
pub mod store;
pub mod terrain;
pub mod tick;

pub use collision::{CollisionResult, circle_vs_circle, circle_vs_terrain, reflect};
pub use facing::Facing;
pub use motion::{MotionKey, MotionModel, MotionState, MotionStep, step_motion};
pub use state::{Behavior, RetargetReason, SimEvent, Simulation, TicReport, bot_label};
pub use store::{CommandBuffer, Component, ComponentStore, EntityId};
pub use terrain::{Tile, TileMap};
pub use tick::TicContext;

pub use crate::parity::Snapshot;
