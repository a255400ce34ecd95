//! Wander and destination-deadline retargeting
//!
//! Both systems only write `TargetDirection` (and their own persistence
//! components); the movement system consumes the result next tic.

use glam::{IVec2, Vec2};
use rand::Rng;

use super::components::*;
use super::state::{RetargetReason, SimEvent};
use super::store::{CommandBuffer, ComponentStore, EntityId};
use super::tick::TicContext;
use crate::coords::world_to_tile;
use crate::normalize_or;

const WANDER_SALT: u64 = 0x5741_4E44;
const DESTINATION_SALT: u64 = 0x4445_5354;

/// Candidate tiles tried per destination pick
const DESTINATION_ATTEMPTS: usize = 8;

/// Wander system: hold the current heading until the persistence counter
/// runs out, then ask the motion model for a new one.
pub fn run_wander(store: &mut ComponentStore, ctx: &TicContext<'_>, events: &mut Vec<SimEvent>) {
    let (min_tics, max_tics) = ctx.config.wander_tic_range();
    let columns = &mut store.columns;

    for (id, persistence) in columns.wander.iter_mut() {
        if persistence.tics_until_next_change > 0 {
            persistence.tics_until_next_change -= 1;
            continue;
        }

        let memory = columns.motion.get(id).copied().unwrap_or_default();
        let step = ctx.motion.step(
            ctx.key(id),
            ctx.time_ms,
            ctx.dt_ms,
            memory.state.as_ref(),
            memory.facing,
        );

        let heading = normalize_or(step.velocity, Vec2::ZERO);
        let magnitude = step.speed() / ctx.config.bot_speed;
        if let Some(target) = columns.target_direction.get_mut(id) {
            *target = TargetDirection::new(heading, magnitude);
        }
        columns.motion.insert(
            id,
            MotionMemory {
                state: Some(step.motion),
                facing: Some(step.facing),
            },
        );

        let mut rng = ctx.key(id).rng(WANDER_SALT ^ ctx.tic);
        persistence.tics_until_next_change = rng.random_range(min_tics..=max_tics);
        events.push(SimEvent::Retarget {
            entity: id,
            reason: RetargetReason::Wander,
        });
    }
}

/// Destination system: steer toward the current destination, picking a new
/// one on arrival or when the deadline expires.
///
/// The deadline counts down every tic regardless of progress, so an
/// unreachable goal is abandoned after at most `deadline` tics.
pub fn run_destinations(store: &mut ComponentStore, ctx: &TicContext<'_>, events: &mut Vec<SimEvent>) {
    let mut commands = CommandBuffer::new();
    let columns = &mut store.columns;

    for (id, deadline) in columns.deadline.iter_mut() {
        let Some(pos) = columns.position.get(id).map(|p| p.0) else {
            continue;
        };
        deadline.tics_remaining = deadline.tics_remaining.saturating_sub(1);

        let current = columns.destination.get(id).copied();
        let reason = match current {
            None => Some(RetargetReason::Deadline),
            Some(_) if deadline.tics_remaining == 0 => Some(RetargetReason::Deadline),
            Some(dest) if pos.distance(dest.center()) <= ctx.config.arrival_radius => {
                Some(RetargetReason::Arrived)
            }
            Some(_) => None,
        };

        let destination = match (reason, current) {
            (Some(reason), _) => {
                let (dest, path_tiles) = pick_destination(ctx, id, pos);
                deadline.path_tiles = path_tiles;
                deadline.tics_remaining =
                    path_tiles * ctx.config.destination_tics_per_tile + ctx.config.destination_slack_tics;
                commands.attach(id, dest);
                log::debug!(
                    "Bot {id} heading to ({}, {}) over {path_tiles} tiles ({reason:?})",
                    dest.tile_x,
                    dest.tile_y
                );
                events.push(SimEvent::Retarget { entity: id, reason });
                dest
            }
            (None, Some(dest)) => dest,
            (None, None) => continue,
        };

        if let Some(target) = columns.target_direction.get_mut(id) {
            let to_goal = destination.center() - pos;
            *target = if to_goal.length_squared() <= ctx.config.arrival_radius * ctx.config.arrival_radius {
                TargetDirection::STOPPED
            } else {
                TargetDirection::new(normalize_or(to_goal, Vec2::ZERO), 1.0)
            };
        }
    }

    store.apply(&mut commands);
}

/// Choose a walkable tile near `pos`; returns it with its path length.
///
/// Unreachable candidates fall back to Manhattan distance. If no candidate
/// is walkable the bot keeps its own tile.
fn pick_destination(ctx: &TicContext<'_>, id: EntityId, pos: Vec2) -> (Destination, u32) {
    let here = world_to_tile(pos);
    let radius = ctx.config.destination_radius;
    let search_budget = ((2 * radius + 1) * (2 * radius + 1)) as usize * 4;
    let mut rng = ctx.key(id).rng(DESTINATION_SALT ^ ctx.tic);

    for _ in 0..DESTINATION_ATTEMPTS {
        let offset = IVec2::new(
            rng.random_range(-radius..=radius),
            rng.random_range(-radius..=radius),
        );
        let tile = here + offset;
        if tile == here || !ctx.terrain.is_walkable(tile) {
            continue;
        }
        let path_tiles = ctx
            .terrain
            .path_length(here, tile, search_budget)
            .unwrap_or_else(|| (offset.x.abs() + offset.y.abs()) as u32);
        return (Destination { tile_x: tile.x, tile_y: tile.y }, path_tiles);
    }

    (Destination { tile_x: here.x, tile_y: here.y }, 0)
}
