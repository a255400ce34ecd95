//! Collision detection for circular bodies on the tile grid
//!
//! Detection only; the movement system decides the response.

use glam::{IVec2, Vec2};

use super::terrain::TileMap;

/// Result of a collision check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point on the obstacle surface
    pub point: Vec2,
    /// Unit normal pointing from the obstacle toward the body
    pub normal: Vec2,
    /// Overlap depth
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }

    /// True if `motion` carries the body away from the contact surface
    #[inline]
    pub fn is_separating(&self, motion: Vec2) -> bool {
        motion.dot(self.normal) > 0.0
    }
}

/// Deepest overlap between a circle and any obstacle tile
///
/// Tiles are scanned row-major, so equal-depth contacts resolve to the
/// top-left-most tile.
pub fn circle_vs_terrain(pos: Vec2, radius: f32, map: &TileMap) -> CollisionResult {
    let min = (pos - Vec2::splat(radius)).floor().as_ivec2();
    let max = (pos + Vec2::splat(radius)).floor().as_ivec2();

    let mut best = CollisionResult::miss();
    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let tile = IVec2::new(x, y);
            if !map.get(tile).is_obstacle() {
                continue;
            }
            let result = circle_vs_tile(pos, radius, tile);
            if result.hit && result.penetration > best.penetration {
                best = result;
            }
        }
    }
    best
}

/// Circle against the unit square of `tile`
pub fn circle_vs_tile(pos: Vec2, radius: f32, tile: IVec2) -> CollisionResult {
    let tile_min = tile.as_vec2();
    let tile_max = tile_min + Vec2::ONE;
    let closest = pos.clamp(tile_min, tile_max);
    let offset = pos - closest;
    let dist_sq = offset.length_squared();

    if dist_sq >= radius * radius {
        return CollisionResult::miss();
    }

    if dist_sq > 1e-12 {
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: closest,
            normal: offset / dist,
            penetration: radius - dist,
        };
    }

    // Center inside the tile: push out through the nearest face
    let to_min = pos - tile_min;
    let to_max = tile_max - pos;
    let faces = [
        (to_min.x, Vec2::NEG_X),
        (to_max.x, Vec2::X),
        (to_min.y, Vec2::NEG_Y),
        (to_max.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .fold((f32::INFINITY, Vec2::NEG_X), |acc, face| if face.0 < acc.0 { face } else { acc });
    CollisionResult {
        hit: true,
        point: pos - normal * depth,
        normal,
        penetration: radius + depth,
    }
}

/// Overlap between two circles; the normal points from `b` toward `a`
pub fn circle_vs_circle(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> CollisionResult {
    let offset = a - b;
    let reach = radius_a + radius_b;
    let dist_sq = offset.length_squared();
    if dist_sq >= reach * reach {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { offset / dist } else { Vec2::X };
    CollisionResult {
        hit: true,
        point: b + normal * radius_b,
        normal,
        penetration: reach - dist,
    }
}

/// Reflect a direction about a surface normal
#[inline]
pub fn reflect(dir: Vec2, normal: Vec2) -> Vec2 {
    dir - 2.0 * dir.dot(normal) * normal
}
