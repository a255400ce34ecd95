//! Movement and collision response
//!
//! Runs first in every tic:
//! 1. Tick down `Collided` cooldowns (every holder, floored at 0)
//! 2. Record `PreviousPosition`, apply `TargetDirection` displacement, clamp to bounds
//! 3. Resolve terrain contacts in ascending id order
//! 4. Resolve entity-entity contacts in ascending `(a, b)` id order
//! 5. Derive `Facing` from the displacement actually travelled
//!
//! A response reverts the entity to its previous position, reflects its
//! target direction off the contact normal and restarts the cooldown.

use std::collections::BTreeMap;

use glam::Vec2;

use super::collision::{circle_vs_circle, circle_vs_terrain, reflect};
use super::components::*;
use super::facing::Facing;
use super::state::SimEvent;
use super::store::{ComponentStore, EntityId};
use super::tick::TicContext;

/// Advance positions and resolve collisions for one tic
pub fn run_movement(store: &mut ComponentStore, ctx: &TicContext<'_>, events: &mut Vec<SimEvent>) {
    tick_cooldowns(store);
    let displacements = apply_displacement(store, ctx);
    resolve_terrain(store, ctx, &displacements, events);
    resolve_entities(store, ctx, &displacements, events);
    update_facing(store, &displacements);
}

/// Decrement every cooldown by one, floored at zero
fn tick_cooldowns(store: &mut ComponentStore) {
    for (_, collided) in store.columns.collided.iter_mut() {
        collided.ticks_remaining = collided.ticks_remaining.saturating_sub(1);
    }
}

/// Move every entity with a target direction. Returns the intended
/// displacement per mover, keyed (and therefore ordered) by id.
fn apply_displacement(store: &mut ComponentStore, ctx: &TicContext<'_>) -> BTreeMap<EntityId, Vec2> {
    let columns = &mut store.columns;

    // PreviousPosition mirrors the start-of-tic position for every holder
    for (id, prev) in columns.previous_position.iter_mut() {
        if let Some(pos) = columns.position.get(id) {
            prev.0 = pos.0;
        }
    }

    let tic_distance = ctx.config.tic_distance(ctx.dt_ms);
    let mut displacements = BTreeMap::new();
    for (id, target) in columns.target_direction.iter() {
        let Some(pos) = columns.position.get_mut(id) else {
            continue;
        };
        let radius = columns
            .collider
            .get(id)
            .map_or(ctx.config.bot_radius, |c| c.radius);

        if !columns.previous_position.contains(id) {
            columns.previous_position.insert(id, PreviousPosition(pos.0));
        }

        let delta = target.displacement(tic_distance);
        pos.0 = ctx.terrain.clamp_position(pos.0 + delta, radius);
        displacements.insert(id, delta);
    }
    displacements
}

/// Start (or restart) the cooldown, attaching `Collided` on first contact
fn start_cooldown(store: &mut ComponentStore, id: EntityId, tics: u32) {
    store.columns.collided.insert(id, Collided { ticks_remaining: tics });
}

#[inline]
fn cooldown(store: &ComponentStore, id: EntityId) -> u32 {
    store.get::<Collided>(id).map_or(0, |c| c.ticks_remaining)
}

/// Put the entity back where it started the tic and bounce its heading
fn bounce(store: &mut ComponentStore, id: EntityId, normal: Vec2) {
    let columns = &mut store.columns;
    if let (Some(pos), Some(prev)) = (columns.position.get_mut(id), columns.previous_position.get(id)) {
        pos.0 = prev.0;
    }
    if let Some(target) = columns.target_direction.get_mut(id) {
        if target.dir.dot(normal) < 0.0 {
            *target = TargetDirection::new(reflect(target.dir, normal), target.magnitude);
        }
    }
}

fn resolve_terrain(
    store: &mut ComponentStore,
    ctx: &TicContext<'_>,
    displacements: &BTreeMap<EntityId, Vec2>,
    events: &mut Vec<SimEvent>,
) {
    for (&id, &delta) in displacements {
        let Some(pos) = store.get::<Position>(id).map(|p| p.0) else {
            continue;
        };
        let radius = store.get::<Collider>(id).map_or(ctx.config.bot_radius, |c| c.radius);

        let contact = circle_vs_terrain(pos, radius, ctx.terrain);
        if !contact.hit {
            continue;
        }
        // Still cooling down and already heading out: let it separate
        if cooldown(store, id) > 0 && contact.is_separating(delta) {
            continue;
        }

        bounce(store, id, contact.normal);
        start_cooldown(store, id, ctx.config.collision_cooldown_tics);
        log::debug!("Bot {id} bounced off terrain at {}", contact.point);
        events.push(SimEvent::Bounce {
            entity: id,
            normal: contact.normal,
        });
    }
}

fn resolve_entities(
    store: &mut ComponentStore,
    ctx: &TicContext<'_>,
    displacements: &BTreeMap<EntityId, Vec2>,
    events: &mut Vec<SimEvent>,
) {
    let mut bodies: Vec<(EntityId, f32)> = store
        .iter::<Collider>()
        .filter(|(id, _)| store.has::<Position>(*id))
        .map(|(id, c)| (id, c.radius))
        .collect();
    bodies.sort_unstable_by_key(|(id, _)| *id);

    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (a, radius_a) = bodies[i];
            let (b, radius_b) = bodies[j];
            let (Some(pos_a), Some(pos_b)) = (store.get::<Position>(a), store.get::<Position>(b)) else {
                continue;
            };

            let contact = circle_vs_circle(pos_a.0, radius_a, pos_b.0, radius_b);
            if !contact.hit {
                continue;
            }

            let delta_a = displacements.get(&a).copied().unwrap_or(Vec2::ZERO);
            let delta_b = displacements.get(&b).copied().unwrap_or(Vec2::ZERO);
            let both_cooling = cooldown(store, a) > 0 && cooldown(store, b) > 0;
            if both_cooling && contact.is_separating(delta_a - delta_b) {
                continue;
            }

            bounce(store, a, contact.normal);
            bounce(store, b, -contact.normal);
            start_cooldown(store, a, ctx.config.collision_cooldown_tics);
            start_cooldown(store, b, ctx.config.collision_cooldown_tics);
            log::debug!("Bots {a} and {b} collided");
            events.push(SimEvent::Collision { a, b });
        }
    }
}

fn update_facing(store: &mut ComponentStore, displacements: &BTreeMap<EntityId, Vec2>) {
    let columns = &mut store.columns;
    for &id in displacements.keys() {
        let (Some(pos), Some(prev)) = (columns.position.get(id), columns.previous_position.get(id)) else {
            continue;
        };
        let travelled = pos.0 - prev.0;
        if let Some(facing) = columns.facing.get_mut(id) {
            *facing = Facing::from_velocity(travelled, *facing);
        }
    }
}
