//! Hostility, canon firing and projectile flight
//!
//! Food items are pooled: firing turns the loaded food entity into a
//! projectile by attaching `Projectile`, and retirement removes it again and
//! puts the food back at its origin. Food entities are never destroyed here.

use glam::Vec2;

use super::collision::{circle_vs_circle, circle_vs_terrain, reflect};
use super::components::*;
use super::state::SimEvent;
use super::store::{CommandBuffer, ComponentStore, EntityId};
use super::tick::TicContext;
use crate::normalize_or;

/// Fire every loaded canon that has a hostile target in range, then fly
/// projectiles. Each phase applies its structural changes before the next.
pub fn run_combat(store: &mut ComponentStore, ctx: &TicContext<'_>, events: &mut Vec<SimEvent>) {
    let mut commands = CommandBuffer::new();
    fire_canons(store, ctx, &mut commands, events);
    store.apply(&mut commands);

    fly_projectiles(store, ctx, &mut commands, events);
    store.apply(&mut commands);
}

/// Nearest hostile within range; ties go to the lower id
fn select_target(store: &ComponentStore, shooter: EntityId, from: Vec2, range: f32) -> Option<(EntityId, Vec2)> {
    let hostile = store.get::<HostileToFactions>(shooter)?;
    let range_sq = range * range;

    store
        .iter::<Faction>()
        .filter(|(id, faction)| *id != shooter && hostile.is_hostile_to(**faction))
        .filter_map(|(id, _)| {
            let pos = store.get::<Position>(id)?.0;
            let dist_sq = pos.distance_squared(from);
            (dist_sq <= range_sq).then_some((id, pos, dist_sq))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)))
        .map(|(id, pos, _)| (id, pos))
}

/// Restore "unloaded implies no ammo" if something broke it
fn check_canon(id: EntityId, canon: &mut FoodCanon) {
    if !canon.is_loaded() && canon.ammo_remaining > 0 {
        debug_assert!(false, "canon {id} has {} ammo but nothing loaded", canon.ammo_remaining);
        log::warn!("Canon {id} had ammo without a loaded food; clearing");
        canon.ammo_remaining = 0;
    }
}

fn fire_canons(
    store: &mut ComponentStore,
    ctx: &TicContext<'_>,
    commands: &mut CommandBuffer,
    events: &mut Vec<SimEvent>,
) {
    let mut shooters = store.ids_with::<FoodCanon>();
    shooters.sort_unstable();

    for shooter in shooters {
        let Some(mut canon) = store.get::<FoodCanon>(shooter).copied() else {
            continue;
        };
        check_canon(shooter, &mut canon);
        if !canon.can_fire() {
            store.attach(shooter, canon);
            continue;
        }

        let food = canon.loaded_food;
        if !store.is_alive(food) {
            // Dangling reference: the canon is simply empty
            log::debug!("Canon {shooter} referenced missing food {food}; unloading");
            store.attach(shooter, FoodCanon::default());
            continue;
        }
        if store.has::<Projectile>(food) {
            continue;
        }

        let Some(from) = store.get::<Position>(shooter).map(|p| p.0) else {
            continue;
        };
        let Some((target, target_pos)) = select_target(store, shooter, from, ctx.config.canon_range) else {
            continue;
        };

        let origin = store.get::<Position>(food).map_or(from, |p| p.0);
        let max_shots = store
            .get::<ShotCount>(food)
            .map_or(ctx.config.projectile_shots, |s| s.max);
        let velocity = normalize_or(target_pos - from, Vec2::X) * ctx.config.projectile_speed;

        commands.attach(food, Position(from));
        commands.attach(food, ShotCount::full(max_shots));
        commands.attach(
            food,
            Projectile {
                velocity,
                origin,
                owner: shooter,
                last_hit: EntityId::NONE,
            },
        );

        let ammo_left = canon.ammo_remaining - 1;
        store.attach(shooter, FoodCanon::default());

        log::debug!("Canon {shooter} fired food {food} at {target} ({ammo_left} ammo owed)");
        events.push(SimEvent::CanonFired {
            shooter,
            projectile: food,
            target,
            ammo_left,
        });
    }
}

/// Lowest-id collider overlapping the projectile, skipping its owner and the
/// entity it hit last
fn first_contact(store: &ComponentStore, projectile: &Projectile, pos: Vec2, radius: f32) -> Option<EntityId> {
    store
        .iter::<Collider>()
        .filter(|(id, _)| *id != projectile.owner && *id != projectile.last_hit)
        .filter(|(id, collider)| {
            store
                .get::<Position>(*id)
                .is_some_and(|p| circle_vs_circle(pos, radius, p.0, collider.radius).hit)
        })
        .map(|(id, _)| id)
        .min()
}

fn fly_projectiles(
    store: &mut ComponentStore,
    ctx: &TicContext<'_>,
    commands: &mut CommandBuffer,
    events: &mut Vec<SimEvent>,
) {
    let mut projectiles = store.ids_with::<Projectile>();
    projectiles.sort_unstable();
    let radius = ctx.config.projectile_radius;
    let dt = ctx.dt_ms / 1000.0;

    for id in projectiles {
        let (Some(mut projectile), Some(pos)) = (
            store.get::<Projectile>(id).copied(),
            store.get::<Position>(id).map(|p| p.0),
        ) else {
            continue;
        };

        let next = pos + projectile.velocity * dt;
        let wall = circle_vs_terrain(next, radius, ctx.terrain);

        let (new_pos, hit) = if wall.hit {
            if projectile.velocity.dot(wall.normal) < 0.0 {
                projectile.velocity = reflect(projectile.velocity, wall.normal);
            }
            projectile.last_hit = EntityId::NONE;
            (pos, Some(EntityId::NONE))
        } else {
            let target = first_contact(store, &projectile, next, radius);
            if let Some(target) = target {
                projectile.last_hit = target;
            }
            (next, target)
        };

        if let Some(position) = store.get_mut::<Position>(id) {
            position.0 = new_pos;
        }

        let Some(target) = hit else {
            store.attach(id, projectile);
            continue;
        };

        events.push(SimEvent::ProjectileHit { projectile: id, target });

        let mut shots = store
            .get::<ShotCount>(id)
            .copied()
            .unwrap_or_else(|| ShotCount::full(ctx.config.projectile_shots));
        if shots.remaining == 0 || shots.remaining > shots.max {
            debug_assert!(false, "projectile {id} in flight with shot count {shots:?}");
            log::warn!("Projectile {id} had shot count {shots:?}; clamping");
            shots.max = shots.max.max(1);
            shots.remaining = shots.remaining.clamp(1, shots.max);
        }
        shots.remaining -= 1;
        store.attach(id, shots);

        if shots.remaining == 0 {
            // Retire to the pool instead of destroying
            if let Some(position) = store.get_mut::<Position>(id) {
                position.0 = projectile.origin;
            }
            commands.remove::<Projectile>(id);
            log::debug!("Projectile {id} retired to {}", projectile.origin);
            events.push(SimEvent::ProjectileRetired { projectile: id });
        } else {
            store.attach(id, projectile);
        }
    }
}
