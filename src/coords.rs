//! Coordinate conversion between screen pixels, world tiles and grid cells
//!
//! World space is measured in tiles with +y pointing down (screen convention).
//! All functions are pure.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::consts::TILE_SIZE_PX;

/// Camera transform used to place the world on screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen position (px) of world origin
    pub root_offset: Vec2,
    /// Zoom multiplier applied on top of the tile size
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            root_offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    /// Camera that centers `camera_pos` (grid units) on a screen of `screen_size` px
    pub fn centered_on(camera_pos: Vec2, screen_size: Vec2, zoom: f32) -> Self {
        Self {
            root_offset: compute_viewport_offset(camera_pos, screen_size, zoom),
            zoom,
        }
    }

    #[inline]
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen_to_world(screen, self.root_offset, self.zoom)
    }

    #[inline]
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        grid_to_display(world, self.zoom) + self.root_offset
    }

    /// Floor-grid tile under a screen point
    #[inline]
    pub fn screen_to_tile(&self, screen: Vec2) -> IVec2 {
        world_to_tile(self.screen_to_world(screen))
    }
}

/// `world = (screen - root_offset) / (tile_size * zoom)`
#[inline]
pub fn screen_to_world(screen: Vec2, root_offset: Vec2, zoom: f32) -> Vec2 {
    (screen - root_offset) / (TILE_SIZE_PX * zoom)
}

/// `pixel = grid * tile_size * zoom`
#[inline]
pub fn grid_to_display(grid: Vec2, zoom: f32) -> Vec2 {
    grid * TILE_SIZE_PX * zoom
}

/// Root offset that centers `camera_pos` on screen
#[inline]
pub fn compute_viewport_offset(camera_pos: Vec2, screen_size: Vec2, zoom: f32) -> Vec2 {
    screen_size / 2.0 - grid_to_display(camera_pos, zoom)
}

/// Floor-rounded tile containing a world position
#[inline]
pub fn world_to_tile(world: Vec2) -> IVec2 {
    world.floor().as_ivec2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_viewport_centering() {
        let offset = compute_viewport_offset(Vec2::new(0.5, 0.5), Vec2::new(800.0, 600.0), 1.0);
        assert_eq!(offset, Vec2::new(368.0, 268.0));
    }

    #[test]
    fn test_tile_picking() {
        let world = screen_to_world(Vec2::new(129.0, 193.0), Vec2::ZERO, 1.0);
        assert!((world.x - (2.0 + 1.0 / 64.0)).abs() < 1e-6);
        assert!((world.y - (3.0 + 1.0 / 64.0)).abs() < 1e-6);
        assert_eq!(world_to_tile(world), IVec2::new(2, 3));
    }

    #[test]
    fn test_tile_floor_not_nearest() {
        // 2.9 tiles rounds to 3 but floors to 2
        assert_eq!(world_to_tile(Vec2::new(2.9, -0.1)), IVec2::new(2, -1));
    }

    #[test]
    fn test_camera_centered_tile() {
        let camera = Camera::centered_on(Vec2::new(10.5, 4.5), Vec2::new(800.0, 600.0), 2.0);
        assert_eq!(camera.screen_to_tile(Vec2::new(400.0, 300.0)), IVec2::new(10, 4));
    }

    proptest! {
        #[test]
        fn prop_screen_world_round_trip(
            sx in -4000.0f32..4000.0,
            sy in -4000.0f32..4000.0,
            ox in -500.0f32..500.0,
            oy in -500.0f32..500.0,
            zoom in 0.25f32..4.0,
        ) {
            let offset = Vec2::new(ox, oy);
            let screen = Vec2::new(sx, sy);
            let world = screen_to_world(screen, offset, zoom);
            let back = grid_to_display(world, zoom) + offset;
            prop_assert!((back - screen).abs().max_element() < 1e-2);
        }
    }
}
