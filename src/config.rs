//! Simulation tuning
//!
//! Loaded from JSON; every field falls back to its default when absent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};

/// Tunable simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Timing ===
    /// Nominal tic duration (ms), used to turn millisecond windows into tic counts
    pub tic_ms: f32,

    // === Movement ===
    /// Tiles per second at full `TargetDirection` magnitude
    pub bot_speed: f32,
    /// Motion-model speed floor (tiles/s)
    pub min_speed: f32,
    /// Motion-model speed ceiling (tiles/s)
    pub max_speed: f32,
    /// Bot collision radius (tiles)
    pub bot_radius: f32,
    /// Value written to `Collided.ticks_remaining` on a collision response
    pub collision_cooldown_tics: u32,

    // === Wander ===
    pub wander_min_ms: f32,
    pub wander_max_ms: f32,

    // === Destinations ===
    /// Max tile distance (per axis) when picking a new destination
    pub destination_radius: i32,
    /// Deadline budget per path tile
    pub destination_tics_per_tile: u32,
    /// Deadline budget added on top of the per-tile budget
    pub destination_slack_tics: u32,
    /// Distance at which a destination counts as reached
    pub arrival_radius: f32,

    // === Combat ===
    pub canon_range: f32,
    /// Projectile speed (tiles/s)
    pub projectile_speed: f32,
    /// Default `ShotCount.max` for fired food
    pub projectile_shots: u32,
    pub projectile_radius: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tic_ms: 50.0,

            bot_speed: MAX_BOT_SPEED,
            min_speed: MIN_BOT_SPEED,
            max_speed: MAX_BOT_SPEED,
            bot_radius: 0.3,
            collision_cooldown_tics: COLLISION_COOLDOWN_TICS,

            wander_min_ms: WANDER_MIN_MS,
            wander_max_ms: WANDER_MAX_MS,

            destination_radius: 6,
            destination_tics_per_tile: 12,
            destination_slack_tics: 40,
            arrival_radius: 0.25,

            canon_range: 6.0,
            projectile_speed: 6.0,
            projectile_shots: 3,
            projectile_radius: 0.15,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    /// Reject parameter combinations the systems cannot honor
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_owned()));

        if !(self.tic_ms.is_finite() && self.tic_ms > 0.0) {
            return invalid("tic_ms must be positive");
        }
        if !(self.min_speed > 0.0 && self.min_speed <= self.max_speed) {
            return invalid("speed bounds must satisfy 0 < min_speed <= max_speed");
        }
        if !(self.bot_speed >= self.max_speed) {
            return invalid("bot_speed must be at least max_speed");
        }
        if self.wander_min_ms > self.wander_max_ms || self.wander_min_ms <= 0.0 {
            return invalid("wander window must satisfy 0 < wander_min_ms <= wander_max_ms");
        }
        if !(self.bot_radius > 0.0 && self.bot_radius < 0.5) {
            return invalid("bot_radius must be in (0, 0.5)");
        }
        if !(self.projectile_radius > 0.0) || self.projectile_shots == 0 {
            return invalid("projectiles need a positive radius and at least one shot");
        }
        if self.destination_radius < 1 {
            return invalid("destination_radius must be at least 1");
        }
        Ok(())
    }

    /// Per-tic travel distance at full magnitude for a tic of `dt_ms`
    #[inline]
    pub fn tic_distance(&self, dt_ms: f32) -> f32 {
        self.bot_speed * dt_ms / 1000.0
    }

    /// Tic count range corresponding to the wander persistence window
    pub fn wander_tic_range(&self) -> (u32, u32) {
        (
            crate::ms_to_tics(self.wander_min_ms, self.tic_ms),
            crate::ms_to_tics(self.wander_max_ms, self.tic_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collision_cooldown_tics, 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(r#"{ "tic_ms": 20.0 }"#).unwrap();
        assert_eq!(config.tic_ms, 20.0);
        assert_eq!(config.max_speed, MAX_BOT_SPEED);
    }

    #[test]
    fn test_rejects_inverted_speed_bounds() {
        let err = SimConfig::from_json_str(r#"{ "min_speed": 3.0, "max_speed": 1.0 }"#);
        assert!(matches!(err, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bot_speed_below_max_speed() {
        // Wander magnitude is speed / bot_speed, capped at 1
        let err = SimConfig::from_json_str(r#"{ "bot_speed": 0.25 }"#);
        assert!(matches!(err, Err(SimError::InvalidConfig(_))));
        let err = SimConfig::from_json_str(r#"{ "bot_speed": 1.5, "max_speed": 2.0 }"#);
        assert!(matches!(err, Err(SimError::InvalidConfig(_))));

        let config = SimConfig::from_json_str(r#"{ "bot_speed": 3.0 }"#).unwrap();
        assert_eq!(config.bot_speed, 3.0);
    }

    #[test]
    fn test_wander_tic_range_at_50ms() {
        let config = SimConfig::default();
        assert_eq!(config.wander_tic_range(), (20, 60));
        assert!((config.tic_distance(50.0) - 0.1).abs() < 1e-6);
    }
}
