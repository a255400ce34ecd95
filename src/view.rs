//! Derived read-models for rendering
//!
//! Recomputed from component state at the end of every tic. Nothing here
//! feeds back into the simulation.

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::coords::{Camera, world_to_tile};
use crate::sim::components::{MinimapPixel, PointerTile, Position};
use crate::sim::facing::Facing;
use crate::sim::store::{ComponentStore, EntityId};
use crate::sim::terrain::TileMap;

/// One minimap dot, laid out for direct upload to a GPU buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct MinimapPoint {
    pub tile_x: i32,
    pub tile_y: i32,
    /// Alpha is always 255
    pub rgba: [u8; 4],
}

/// Inclusive tile rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl TileRect {
    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// The whole map
    pub fn covering(map: &TileMap) -> Self {
        Self::new(
            IVec2::ZERO,
            IVec2::new(map.width() as i32 - 1, map.height() as i32 - 1),
        )
    }

    #[inline]
    pub fn contains(&self, tile: IVec2) -> bool {
        tile.cmpge(self.min).all() && tile.cmple(self.max).all()
    }
}

/// Minimap dots for every entity in `region` holding a `MinimapPixel`.
///
/// The component's presence is the only inclusion test. Output follows the
/// attachment order of `MinimapPixel`.
pub fn extract_minimap(store: &ComponentStore, region: TileRect) -> Vec<MinimapPoint> {
    store
        .iter::<MinimapPixel>()
        .filter_map(|(id, pixel)| {
            let tile = world_to_tile(store.get::<Position>(id)?.0);
            region.contains(tile).then_some(MinimapPoint {
                tile_x: tile.x,
                tile_y: tile.y,
                rgba: [pixel.r, pixel.g, pixel.b, 255],
            })
        })
        .collect()
}

/// Write the floor tile under `screen` into the pointer entity
pub fn update_pointer_tile(store: &mut ComponentStore, pointer: EntityId, screen: Vec2, camera: &Camera) -> bool {
    let tile = camera.screen_to_tile(screen);
    match store.get_mut::<PointerTile>(pointer) {
        Some(slot) => {
            *slot = PointerTile {
                tile_x: tile.x,
                tile_y: tile.y,
            };
            true
        }
        None => false,
    }
}

/// What a renderer needs to draw one entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BotView {
    pub id: EntityId,
    pub pos: Vec2,
    pub facing: Facing,
}

/// Positioned, facing-aware entities in ascending id order
pub fn bot_views(store: &ComponentStore) -> Vec<BotView> {
    let mut views: Vec<BotView> = store
        .iter::<Facing>()
        .filter_map(|(id, facing)| {
            Some(BotView {
                id,
                pos: store.get::<Position>(id)?.0,
                facing: *facing,
            })
        })
        .collect();
    views.sort_unstable_by_key(|v| v.id);
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::store::AnyComponent;

    fn dot(store: &mut ComponentStore, pos: Vec2, r: u8) -> EntityId {
        store.spawn_with([
            AnyComponent::from(Position(pos)),
            MinimapPixel { r, g: 0, b: 0 }.into(),
        ])
    }

    #[test]
    fn test_minimap_requires_pixel_component() {
        let mut store = ComponentStore::new();
        let a = dot(&mut store, Vec2::new(1.5, 2.5), 10);
        store.spawn_with([AnyComponent::from(Position(Vec2::new(3.5, 3.5)))]);
        let c = dot(&mut store, Vec2::new(4.9, 0.1), 30);

        let region = TileRect::new(IVec2::ZERO, IVec2::splat(9));
        let points = extract_minimap(&store, region);
        assert_eq!(
            points,
            vec![
                MinimapPoint { tile_x: 1, tile_y: 2, rgba: [10, 0, 0, 255] },
                MinimapPoint { tile_x: 4, tile_y: 0, rgba: [30, 0, 0, 255] },
            ]
        );

        store.remove::<MinimapPixel>(a);
        assert_eq!(extract_minimap(&store, region).len(), 1);
        store.destroy(c);
        assert!(extract_minimap(&store, region).is_empty());
    }

    #[test]
    fn test_minimap_is_bounded_to_region() {
        let mut store = ComponentStore::new();
        dot(&mut store, Vec2::new(1.5, 1.5), 1);
        dot(&mut store, Vec2::new(8.5, 8.5), 2);
        let points = extract_minimap(&store, TileRect::new(IVec2::splat(5), IVec2::splat(0)));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].rgba[0], 1);
    }

    #[test]
    fn test_minimap_points_cast_to_bytes() {
        let points = [MinimapPoint { tile_x: 1, tile_y: -1, rgba: [1, 2, 3, 255] }];
        let bytes: &[u8] = bytemuck::cast_slice(&points);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[8..], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_pointer_tile_floors() {
        let mut store = ComponentStore::new();
        let pointer = store.spawn_with([AnyComponent::from(PointerTile::default())]);
        let camera = Camera::default();

        assert!(update_pointer_tile(&mut store, pointer, Vec2::new(129.0, 193.0), &camera));
        assert_eq!(store.get::<PointerTile>(pointer), Some(&PointerTile { tile_x: 2, tile_y: 3 }));

        // Just left of the origin lands in tile -1, not 0
        update_pointer_tile(&mut store, pointer, Vec2::new(-1.0, 63.0), &camera);
        assert_eq!(store.get::<PointerTile>(pointer), Some(&PointerTile { tile_x: -1, tile_y: 0 }));

        let other = store.spawn();
        assert!(!update_pointer_tile(&mut store, other, Vec2::ZERO, &camera));
    }

    #[test]
    fn test_bot_views_sorted() {
        let mut store = ComponentStore::new();
        let a = store.spawn();
        let b = store.spawn();
        store.attach(b, Facing::Left);
        store.attach(b, Position(Vec2::ONE));
        store.attach(a, Facing::Down);
        store.attach(a, Position(Vec2::ZERO));
        let ids: Vec<_> = bot_views(&store).into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
