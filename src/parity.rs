//! Parity verification between two independently computed simulations
//!
//! Compares bot position maps and terrain tile counts from a "legacy" and a
//! "unified" run. Reports every discrepancy and never corrects anything.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::sim::Simulation;

/// Serialized position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Exported simulation state: bot positions keyed by label plus terrain count
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tic: u64,
    pub bots: BTreeMap<String, Point>,
    pub terrain_tiles: usize,
}

impl Snapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Everything the verifier needs from both sides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityInput {
    /// Ids the unified side expects to exist
    pub expected_bot_ids: Vec<String>,
    pub legacy_bots: HashMap<String, Point>,
    pub unified_bots: HashMap<String, Point>,
    pub legacy_terrain_tiles: usize,
    pub unified_terrain_tiles: usize,
    /// Max allowed Euclidean distance between matching bots
    pub tolerance: f32,
}

impl ParityInput {
    /// Compare two snapshots; the unified snapshot's bots are the expected set
    pub fn from_snapshots(legacy: &Snapshot, unified: &Snapshot, tolerance: f32) -> Self {
        Self {
            expected_bot_ids: unified.bots.keys().cloned().collect(),
            legacy_bots: legacy.bots.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            unified_bots: unified.bots.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            legacy_terrain_tiles: legacy.terrain_tiles,
            unified_terrain_tiles: unified.terrain_tiles,
            tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainParity {
    pub legacy: usize,
    pub unified: usize,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMismatch {
    pub id: String,
    pub legacy: Point,
    pub unified: Point,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotParity {
    pub missing_in_legacy: Vec<String>,
    pub missing_in_unified: Vec<String>,
    pub position_mismatches: Vec<PositionMismatch>,
}

/// Structured verification result; all id lists are sorted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    pub ok: bool,
    pub terrain: TerrainParity,
    pub bots: BotParity,
}

/// Compare both sides of `input`.
///
/// `ok` holds iff terrain counts match, neither side is missing a bot and
/// no shared bot is further apart than the tolerance.
pub fn verify_parity(input: &ParityInput) -> ParityReport {
    let expected: BTreeSet<&str> = input.expected_bot_ids.iter().map(String::as_str).collect();

    let missing_in_legacy: Vec<String> = expected
        .iter()
        .filter(|id| !input.legacy_bots.contains_key(**id))
        .map(|id| id.to_string())
        .collect();

    let mut should_be_unified = expected.clone();
    should_be_unified.extend(input.legacy_bots.keys().map(String::as_str));
    let missing_in_unified: Vec<String> = should_be_unified
        .into_iter()
        .filter(|id| !input.unified_bots.contains_key(*id))
        .map(str::to_owned)
        .collect();

    let shared: BTreeSet<&String> = input
        .legacy_bots
        .keys()
        .filter(|id| input.unified_bots.contains_key(*id))
        .collect();
    let position_mismatches: Vec<PositionMismatch> = shared
        .into_iter()
        .filter_map(|id| {
            let legacy = input.legacy_bots[id];
            let unified = input.unified_bots[id];
            let distance = Vec2::from(legacy).distance(Vec2::from(unified));
            // NaN distances are mismatches too
            (!(distance <= input.tolerance)).then(|| PositionMismatch {
                id: id.clone(),
                legacy,
                unified,
                distance,
            })
        })
        .collect();

    let terrain = TerrainParity {
        legacy: input.legacy_terrain_tiles,
        unified: input.unified_terrain_tiles,
        ok: input.legacy_terrain_tiles == input.unified_terrain_tiles,
    };
    let ok = terrain.ok
        && missing_in_legacy.is_empty()
        && missing_in_unified.is_empty()
        && position_mismatches.is_empty();

    if !ok {
        log::warn!(
            "Parity failed: terrain {} vs {}, {} missing in legacy, {} missing in unified, {} position mismatches",
            terrain.legacy,
            terrain.unified,
            missing_in_legacy.len(),
            missing_in_unified.len(),
            position_mismatches.len()
        );
    }

    ParityReport {
        ok,
        terrain,
        bots: BotParity {
            missing_in_legacy,
            missing_in_unified,
            position_mismatches,
        },
    }
}

/// Snapshot both simulations and verify them against each other
pub fn compare_simulations(legacy: &Simulation, unified: &Simulation, tolerance: f32) -> ParityReport {
    verify_parity(&ParityInput::from_snapshots(
        &legacy.snapshot(),
        &unified.snapshot(),
        tolerance,
    ))
}

/// Advance `sim` until at least `expected` bots exist, giving up after
/// `max_tics`. Returns the number of tics it took.
pub fn wait_for_entities(sim: &mut Simulation, expected: usize, max_tics: u64, dt_ms: f32) -> Result<u64> {
    let mut tics = 0;
    while sim.bot_count() < expected {
        if tics >= max_tics {
            return Err(SimError::EntityBudgetExhausted {
                expected,
                found: sim.bot_count(),
                tics,
            });
        }
        sim.advance_tic(dt_ms)?;
        tics += 1;
    }
    log::info!("{expected} bots present after {tics} tics");
    Ok(tics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::{Behavior, TileMap};

    fn bots(entries: &[(&str, f32, f32)]) -> HashMap<String, Point> {
        entries
            .iter()
            .map(|(id, x, y)| (id.to_string(), Point { x: *x, y: *y }))
            .collect()
    }

    #[test]
    fn test_parity_match() {
        let input = ParityInput {
            expected_bot_ids: vec!["b1".into(), "b2".into()],
            legacy_bots: bots(&[("b1", 10.0, 20.0), ("b2", 30.0, 40.0)]),
            unified_bots: bots(&[("b1", 10.2, 20.1), ("b2", 30.0, 39.7)]),
            legacy_terrain_tiles: 400,
            unified_terrain_tiles: 400,
            tolerance: 0.5,
        };
        let report = verify_parity(&input);
        assert!(report.ok);
        assert!(report.terrain.ok);
        assert_eq!(report.bots, BotParity::default());
    }

    #[test]
    fn test_parity_mismatch() {
        let input = ParityInput {
            expected_bot_ids: vec!["b1".into(), "b2".into()],
            legacy_bots: bots(&[("b1", 10.0, 20.0)]),
            unified_bots: bots(&[("b1", 999.0, 20.0), ("b2", 5.0, 5.0)]),
            legacy_terrain_tiles: 400,
            unified_terrain_tiles: 400,
            tolerance: 0.5,
        };
        let report = verify_parity(&input);
        assert!(!report.ok);
        assert_eq!(report.bots.missing_in_legacy, vec!["b2".to_string()]);
        assert!(report.bots.missing_in_unified.is_empty());

        let mismatches = &report.bots.position_mismatches;
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].id, "b1");
        assert_eq!(mismatches[0].legacy, Point { x: 10.0, y: 20.0 });
        assert_eq!(mismatches[0].unified, Point { x: 999.0, y: 20.0 });
        assert!((mismatches[0].distance - 989.0).abs() < 1e-3);
    }

    #[test]
    fn test_terrain_mismatch_alone_fails() {
        let input = ParityInput {
            legacy_terrain_tiles: 10,
            unified_terrain_tiles: 11,
            tolerance: 0.5,
            ..Default::default()
        };
        let report = verify_parity(&input);
        assert!(!report.ok);
        assert!(!report.terrain.ok);
    }

    #[test]
    fn test_legacy_only_bot_is_missing_in_unified() {
        let input = ParityInput {
            expected_bot_ids: vec!["b1".into()],
            legacy_bots: bots(&[("b1", 1.0, 1.0), ("b9", 2.0, 2.0)]),
            unified_bots: bots(&[("b1", 1.0, 1.0)]),
            tolerance: 0.5,
            ..Default::default()
        };
        let report = verify_parity(&input);
        assert_eq!(report.bots.missing_in_unified, vec!["b9".to_string()]);
        assert!(!report.ok);
    }

    #[test]
    fn test_nan_position_is_a_mismatch() {
        let input = ParityInput {
            expected_bot_ids: vec!["b1".into()],
            legacy_bots: bots(&[("b1", f32::NAN, 1.0)]),
            unified_bots: bots(&[("b1", 1.0, 1.0)]),
            tolerance: 0.5,
            ..Default::default()
        };
        assert_eq!(verify_parity(&input).bots.position_mismatches.len(), 1);
    }

    #[test]
    fn test_report_json_shape() {
        let report = verify_parity(&ParityInput {
            expected_bot_ids: vec!["b2".into()],
            tolerance: 0.5,
            ..Default::default()
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["bots"]["missingInLegacy"][0], "b2");
        assert!(json["bots"]["positionMismatches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut sim = Simulation::new(5, TileMap::bordered(8, 8), SimConfig::default()).unwrap();
        sim.populate(3, Behavior::Wander);
        let snapshot = sim.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("terrainTiles"));
        assert_eq!(Snapshot::from_json_str(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_compare_identical_runs() {
        let build = || {
            let mut sim = Simulation::new(8, TileMap::generate(8, 16, 12, 10), SimConfig::default()).unwrap();
            sim.populate(6, Behavior::Wander);
            sim.advance_tics(50, 50.0).unwrap();
            sim
        };
        assert!(compare_simulations(&build(), &build(), 0.0).ok);
    }

    #[test]
    fn test_wait_for_entities() {
        let mut sim = Simulation::new(4, TileMap::bordered(10, 10), SimConfig::default()).unwrap();
        sim.queue_bot(3, glam::Vec2::new(3.5, 3.5), Behavior::Wander);
        sim.queue_bot(5, glam::Vec2::new(6.5, 6.5), Behavior::Seek);

        assert!(matches!(
            wait_for_entities(&mut sim.clone(), 2, 4, 50.0),
            Err(SimError::EntityBudgetExhausted { expected: 2, found: 1, tics: 4 })
        ));
        assert_eq!(wait_for_entities(&mut sim, 2, 10, 50.0).unwrap(), 6);
    }
}
