//! Tile grid terrain
//!
//! Tile `(x, y)` covers world square `[x, x+1) x [y, y+1)`. Anything outside
//! the grid behaves as a wall.

use std::collections::VecDeque;

use glam::{IVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Terrain tile kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    /// No terrain at all (not rendered, not walkable)
    Void,
    #[default]
    Floor,
    Wall,
}

impl Tile {
    #[inline]
    pub fn is_walkable(self) -> bool {
        self == Tile::Floor
    }

    #[inline]
    pub fn is_obstacle(self) -> bool {
        !self.is_walkable()
    }

    /// Whether the tile exists as rendered terrain
    #[inline]
    pub fn is_terrain(self) -> bool {
        self != Tile::Void
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Tile::Floor),
            '#' => Some(Tile::Wall),
            ' ' | '_' => Some(Tile::Void),
            _ => None,
        }
    }
}

/// Rectangular tile grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// All-floor map
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Floor; (width * height) as usize],
        }
    }

    /// Floor map enclosed by a one-tile wall border
    pub fn bordered(width: u32, height: u32) -> Self {
        let mut map = Self::new(width, height);
        for x in 0..width as i32 {
            map.set(IVec2::new(x, 0), Tile::Wall);
            map.set(IVec2::new(x, height as i32 - 1), Tile::Wall);
        }
        for y in 0..height as i32 {
            map.set(IVec2::new(0, y), Tile::Wall);
            map.set(IVec2::new(width as i32 - 1, y), Tile::Wall);
        }
        map
    }

    /// Bordered map with scattered wall tiles, fully determined by `seed`
    pub fn generate(seed: u64, width: u32, height: u32, wall_percent: u32) -> Self {
        let mut map = Self::bordered(width, height);
        let mut rng = Pcg32::seed_from_u64(seed);
        for y in 1..height as i32 - 1 {
            for x in 1..width as i32 - 1 {
                if rng.random_range(0..100) < wall_percent {
                    map.set(IVec2::new(x, y), Tile::Wall);
                }
            }
        }
        map
    }

    /// Parse rows of `.` (floor), `#` (wall) and ` `/`_` (void)
    ///
    /// Blank lines before the first and after the last tile row are ignored.
    /// Blank lines between them are rows of void tiles.
    pub fn from_ascii(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.iter().position(|line| !line.trim().is_empty()).unwrap_or(lines.len());
        let end = lines.iter().rposition(|line| !line.trim().is_empty()).map_or(start, |last| last + 1);
        let rows = &lines[start..end];
        let height = rows.len() as u32;
        let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err(SimError::InvalidTerrain("empty map".to_owned()));
        }

        let mut map = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            let mut chars = row.chars();
            for x in 0..width as usize {
                let c = chars.next().unwrap_or(' ');
                let tile = Tile::from_char(c).ok_or_else(|| {
                    SimError::InvalidTerrain(format!("unknown tile {c:?} at ({x}, {y})"))
                })?;
                map.set(IVec2::new(x as i32, y as i32), tile);
            }
        }
        Ok(map)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// World-space extent
    #[inline]
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    #[inline]
    pub fn contains(&self, tile: IVec2) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }

    #[inline]
    fn index(&self, tile: IVec2) -> Option<usize> {
        self.contains(tile)
            .then(|| tile.y as usize * self.width as usize + tile.x as usize)
    }

    /// Tile at `tile`; out-of-bounds reads as `Wall`
    pub fn get(&self, tile: IVec2) -> Tile {
        self.index(tile)
            .and_then(|i| self.tiles.get(i).copied())
            .unwrap_or(Tile::Wall)
    }

    pub fn set(&mut self, tile: IVec2, value: Tile) {
        if let Some(i) = self.index(tile) {
            self.tiles[i] = value;
        }
    }

    #[inline]
    pub fn is_walkable(&self, tile: IVec2) -> bool {
        self.get(tile).is_walkable()
    }

    /// Number of rendered terrain tiles (everything except `Void`)
    pub fn terrain_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_terrain()).count()
    }

    /// Walkable tiles in row-major order
    pub fn walkable_tiles(&self) -> impl Iterator<Item = IVec2> + '_ {
        let width = self.width as i32;
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_walkable())
            .map(move |(i, _)| IVec2::new(i as i32 % width, i as i32 / width))
    }

    /// Keep a circle of `radius` inside the grid
    pub fn clamp_position(&self, pos: Vec2, radius: f32) -> Vec2 {
        let max = (self.bounds() - Vec2::splat(radius)).max(Vec2::splat(radius));
        pos.clamp(Vec2::splat(radius), max)
    }

    /// Shortest 4-connected walkable path length in tiles, visiting at most
    /// `max_nodes` tiles. `None` if unreachable within the budget.
    pub fn path_length(&self, from: IVec2, to: IVec2, max_nodes: usize) -> Option<u32> {
        if !self.is_walkable(from) || !self.is_walkable(to) {
            return None;
        }
        if from == to {
            return Some(0);
        }

        let mut dist = vec![u32::MAX; self.tiles.len()];
        let mut queue = VecDeque::new();
        dist[self.index(from)?] = 0;
        queue.push_back(from);
        let mut visited = 1;

        while let Some(tile) = queue.pop_front() {
            let d = dist[self.index(tile)?];
            for step in [IVec2::X, IVec2::Y, IVec2::NEG_X, IVec2::NEG_Y] {
                let next = tile + step;
                if !self.is_walkable(next) {
                    continue;
                }
                let Some(i) = self.index(next) else { continue };
                if dist[i] != u32::MAX {
                    continue;
                }
                if next == to {
                    return Some(d + 1);
                }
                dist[i] = d + 1;
                visited += 1;
                if visited >= max_nodes {
                    return None;
                }
                queue.push_back(next);
            }
        }
        None
    }
}
