//! Eight-way compass facing derived from velocity
//!
//! Screen convention: +x is right, +y is down.

use std::f32::consts::FRAC_PI_4;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Compass octant, ordered clockwise from right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
    Up,
    UpRight,
}

impl Facing {
    pub const ALL: [Facing; 8] = [
        Facing::Right,
        Facing::DownRight,
        Facing::Down,
        Facing::DownLeft,
        Facing::Left,
        Facing::UpLeft,
        Facing::Up,
        Facing::UpRight,
    ];

    /// Nearest octant to `velocity`, or `fallback` for a zero vector.
    ///
    /// Halfway angles round toward +infinity (e.g. 22.5 deg maps to `DownRight`).
    pub fn from_velocity(velocity: Vec2, fallback: Facing) -> Facing {
        if velocity == Vec2::ZERO || !velocity.is_finite() {
            return fallback;
        }
        let octant = (velocity.y.atan2(velocity.x) / FRAC_PI_4 + 0.5).floor() as i32;
        Self::ALL[octant.rem_euclid(8) as usize]
    }

    /// Unit vector pointing in this direction
    pub fn to_vector(self) -> Vec2 {
        let d = std::f32::consts::FRAC_1_SQRT_2;
        match self {
            Facing::Right => Vec2::new(1.0, 0.0),
            Facing::DownRight => Vec2::new(d, d),
            Facing::Down => Vec2::new(0.0, 1.0),
            Facing::DownLeft => Vec2::new(-d, d),
            Facing::Left => Vec2::new(-1.0, 0.0),
            Facing::UpLeft => Vec2::new(-d, -d),
            Facing::Up => Vec2::new(0.0, -1.0),
            Facing::UpRight => Vec2::new(d, -d),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Right => "right",
            Facing::DownRight => "down-right",
            Facing::Down => "down",
            Facing::DownLeft => "down-left",
            Facing::Left => "left",
            Facing::UpLeft => "up-left",
            Facing::Up => "up",
            Facing::UpRight => "up-right",
        }
    }
}
