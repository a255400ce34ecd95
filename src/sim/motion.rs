//! Deterministic motion model
//!
//! Maps `(seed, entity, time)` to a velocity without any mutable global
//! randomness. Time is cut into fixed segments; each segment boundary has a
//! keyframe (heading + speed) drawn from a PCG stream keyed by
//! `(seed, entity, segment)`. Inside a segment heading and speed are blended
//! with a smoothstep, so direction changes are spread over many tics.
//!
//! Only IEEE-exact operations (add, mul, div, sqrt) are used on the output
//! path, so results are bit-identical across machines.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::facing::Facing;
use crate::consts::{MAX_BOT_SPEED, MIN_BOT_SPEED, MOTION_SEGMENT_MS};
use crate::normalize_or;

/// Identifies one entity's random stream within one simulation seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotionKey {
    pub seed: u64,
    pub entity: u32,
}

impl MotionKey {
    pub fn new(seed: u64, entity: u32) -> Self {
        Self { seed, entity }
    }

    /// Independent RNG for `(seed, entity, salt)`
    pub fn rng(&self, salt: u64) -> Pcg32 {
        Pcg32::seed_from_u64(mix_key(self.seed, self.entity, salt))
    }
}

/// SplitMix64 finalizer over the combined key
fn mix_key(seed: u64, entity: u32, salt: u64) -> u64 {
    let mut z = seed
        .wrapping_add((entity as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(salt.wrapping_mul(0xD1B5_4A32_D192_ED03));
    splitmix64(z)
}

/// SplitMix64 output mix
#[inline]
pub(crate) fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Keyframe pair for the segment containing the current time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub segment: u64,
    pub from_heading: Vec2,
    pub from_speed: f32,
    pub to_heading: Vec2,
    pub to_speed: f32,
}

/// Output of one motion step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    /// Tiles per second
    pub velocity: Vec2,
    /// Displacement over `dt_ms`
    pub delta: Vec2,
    pub facing: Facing,
    /// Feed back in as `previous_motion` on the next call
    pub motion: MotionState,
}

impl MotionStep {
    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Motion-model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionModel {
    pub min_speed: f32,
    pub max_speed: f32,
    pub segment_ms: u64,
}

impl Default for MotionModel {
    fn default() -> Self {
        Self {
            min_speed: MIN_BOT_SPEED,
            max_speed: MAX_BOT_SPEED,
            segment_ms: MOTION_SEGMENT_MS,
        }
    }
}

impl MotionModel {
    pub fn new(min_speed: f32, max_speed: f32) -> Self {
        Self {
            min_speed,
            max_speed,
            ..Self::default()
        }
    }

    /// Velocity at `time_ms` and displacement over the following `dt_ms`.
    ///
    /// Pure: identical arguments always produce identical output.
    pub fn step(
        &self,
        key: MotionKey,
        time_ms: u64,
        dt_ms: f32,
        previous_motion: Option<&MotionState>,
        previous_facing: Option<Facing>,
    ) -> MotionStep {
        let segment_ms = self.segment_ms.max(1);
        let segment = time_ms / segment_ms;

        let motion = match previous_motion {
            Some(prev) if prev.segment == segment => *prev,
            // Continue the chain from the last keyframe we were heading for
            Some(prev) if prev.segment < segment => self.advance(key, prev, segment),
            _ => self.fresh(key, segment),
        };

        let u = (time_ms % segment_ms) as f32 / segment_ms as f32;
        let s = u * u * (3.0 - 2.0 * u);

        let heading = normalize_or(
            motion.from_heading.lerp(motion.to_heading, s),
            motion.from_heading,
        );
        let speed = (motion.from_speed + (motion.to_speed - motion.from_speed) * s)
            .clamp(self.min_speed, self.max_speed);

        let velocity = heading * speed;
        let fallback = previous_facing.unwrap_or_default();
        MotionStep {
            velocity,
            delta: velocity * (dt_ms / 1000.0),
            facing: Facing::from_velocity(velocity, fallback),
            motion,
        }
    }

    fn advance(&self, key: MotionKey, prev: &MotionState, segment: u64) -> MotionState {
        let (to_heading, to_speed) = self.keyframe(key, segment + 1, Some(prev.to_heading));
        MotionState {
            segment,
            from_heading: prev.to_heading,
            from_speed: prev.to_speed,
            to_heading,
            to_speed,
        }
    }

    fn fresh(&self, key: MotionKey, segment: u64) -> MotionState {
        let (from_heading, from_speed) = self.keyframe(key, segment, None);
        let (to_heading, to_speed) = self.keyframe(key, segment + 1, Some(from_heading));
        MotionState {
            segment,
            from_heading,
            from_speed,
            to_heading,
            to_speed,
        }
    }

    /// Heading and speed for keyframe `index`.
    ///
    /// When `relative_to` is given, the heading is reflected into the half-plane
    /// facing `relative_to`, so consecutive keyframes are at most 90 degrees
    /// apart and the blend never passes through zero.
    fn keyframe(&self, key: MotionKey, index: u64, relative_to: Option<Vec2>) -> (Vec2, f32) {
        let mut rng = key.rng(index);

        let mut heading = Vec2::X;
        for _ in 0..16 {
            let candidate = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
            let len_sq = candidate.length_squared();
            if len_sq > 1e-4 && len_sq <= 1.0 {
                heading = candidate / len_sq.sqrt();
                break;
            }
        }

        if let Some(reference) = relative_to {
            let dot = heading.dot(reference);
            if dot < 0.0 {
                heading = normalize_or(heading - reference * (2.0 * dot), reference);
            }
        }

        let speed = if self.max_speed > self.min_speed {
            rng.random_range(self.min_speed..=self.max_speed)
        } else {
            self.min_speed
        };
        (heading, speed)
    }
}

/// [`MotionModel::step`] with the default speed bounds
pub fn step_motion(
    key: MotionKey,
    time_ms: u64,
    dt_ms: f32,
    previous_motion: Option<&MotionState>,
    previous_facing: Option<Facing>,
) -> MotionStep {
    MotionModel::default().step(key, time_ms, dt_ms, previous_motion, previous_facing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Run `steps` chained calls and collect the outputs
    fn run_chain(key: MotionKey, steps: u64, dt_ms: u64) -> Vec<MotionStep> {
        let mut out = Vec::with_capacity(steps as usize);
        let mut prev: Option<MotionStep> = None;
        for i in 0..steps {
            let step = step_motion(
                key,
                i * dt_ms,
                dt_ms as f32,
                prev.as_ref().map(|p| &p.motion),
                prev.map(|p| p.facing),
            );
            out.push(step);
            prev = Some(step);
        }
        out
    }

    #[test]
    fn test_speed_bound_long_run() {
        for entity in 0..16 {
            let key = MotionKey::new(42, entity);
            for step in run_chain(key, 400, 50) {
                let speed = step.speed();
                assert!(
                    (MIN_BOT_SPEED - 1e-6..=MAX_BOT_SPEED + 1e-6).contains(&speed),
                    "speed {speed} out of bounds for entity {entity}"
                );
            }
        }
    }

    #[test]
    fn test_chains_are_bit_identical() {
        let key = MotionKey::new(42, 3);
        let a = run_chain(key, 400, 50);
        let b = run_chain(key, 400, 50);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.velocity.x.to_bits(), y.velocity.x.to_bits());
            assert_eq!(x.velocity.y.to_bits(), y.velocity.y.to_bits());
            assert_eq!(x.facing, y.facing);
        }
    }

    #[test]
    fn test_direction_changes_are_smooth() {
        let steps = run_chain(MotionKey::new(7, 1), 400, 50);
        for pair in steps.windows(2) {
            let a = pair[0].velocity.normalize();
            let b = pair[1].velocity.normalize();
            assert!(a.dot(b) > 0.99, "heading snapped: {a} -> {b}");
        }
    }

    #[test]
    fn test_entities_get_independent_streams() {
        let a = step_motion(MotionKey::new(42, 1), 0, 50.0, None, None);
        let b = step_motion(MotionKey::new(42, 2), 0, 50.0, None, None);
        assert_ne!(a.velocity, b.velocity);
    }

    #[test]
    fn test_delta_scales_with_dt() {
        let step = step_motion(MotionKey::new(1, 1), 0, 100.0, None, None);
        assert!((step.delta - step.velocity * 0.1).length() < 1e-6);
    }

    #[test]
    fn test_degenerate_bounds_pin_speed() {
        let model = MotionModel::new(1.0, 1.0);
        let step = model.step(MotionKey::new(9, 9), 700, 50.0, None, None);
        assert!((step.speed() - 1.0).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_motion_is_pure(
            seed in any::<u64>(),
            entity in any::<u32>(),
            time_ms in 0u64..10_000_000,
            dt_ms in 1.0f32..200.0,
        ) {
            let key = MotionKey::new(seed, entity);
            let a = step_motion(key, time_ms, dt_ms, None, None);
            let b = step_motion(key, time_ms, dt_ms, None, None);
            prop_assert_eq!(a.velocity.x.to_bits(), b.velocity.x.to_bits());
            prop_assert_eq!(a.velocity.y.to_bits(), b.velocity.y.to_bits());
            prop_assert_eq!(a.delta.x.to_bits(), b.delta.x.to_bits());
            prop_assert_eq!(a.motion, b.motion);

            // Same again when threading the previous state through
            let c = step_motion(key, time_ms + 50, dt_ms, Some(&a.motion), Some(a.facing));
            let d = step_motion(key, time_ms + 50, dt_ms, Some(&b.motion), Some(b.facing));
            prop_assert_eq!(c.velocity.x.to_bits(), d.velocity.x.to_bits());
            prop_assert_eq!(c.velocity.y.to_bits(), d.velocity.y.to_bits());
        }

        #[test]
        fn prop_speed_always_bounded(seed in any::<u64>(), entity in 0u32..1000, time_ms in 0u64..1_000_000) {
            let step = step_motion(MotionKey::new(seed, entity), time_ms, 50.0, None, None);
            let speed = step.speed();
            prop_assert!(speed >= MIN_BOT_SPEED - 1e-6 && speed <= MAX_BOT_SPEED + 1e-6);
        }
    }
}
