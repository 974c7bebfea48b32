//! In-memory geometry model: tiles, chunks, shared objects, and their bounds (§3, §4.4).

pub mod doodad;
pub mod object;
pub mod tile;

pub use doodad::Doodad;
pub use object::WorldObject;
pub use tile::{Chunk, Tile};

use crate::constants::{CHUNKS_PER_TILE, CHUNK_SIZE, TILES_PER_SIDE, TILE_SIZE};
use glam::Vec3;

/// A 32-bit identifier of a placed shared object instance; the dedup index key.
pub type UniqueId = u32;

/// Axis-aligned bounding box. Z starts degenerate (`min > max`) so the first
/// call to [`Bounds::include_z`] establishes it; XY bounds (for a tile) are
/// fixed at construction and never change.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn empty_z(min_xy: (f32, f32), max_xy: (f32, f32)) -> Self {
        Bounds {
            min: Vec3::new(min_xy.0, min_xy.1, f32::MAX),
            max: Vec3::new(max_xy.0, max_xy.1, f32::MIN),
        }
    }

    /// Grows the Z extent to include `z`. Per invariant 5, Z bounds only
    /// ever grow as geometry is added.
    pub fn include_z(&mut self, z: f32) {
        self.max.z = self.max.z.max(z);
        self.min.z = self.min.z.min(z);
    }

    pub fn include_point(&mut self, p: Vec3) {
        self.include_z(p.z);
    }

    pub fn union(&mut self, other: &Bounds) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Half-open containment test used for placement-to-chunk assignment
    /// (invariant 4): `min < x <= max`.
    pub fn contains_xy_half_open(&self, x: f32, y: f32) -> bool {
        x > self.min.x && x <= self.max.x && y > self.min.y && y <= self.max.y
    }

    /// True if the XY projections of `self` and `other` overlap at all.
    /// Used to cull halo geometry (§4.6) and doodad placements (§4.6 policy)
    /// against a build target's tile bounds.
    pub fn intersects_xy(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Bounds> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Bounds {
            min: first,
            max: first,
        };
        for p in iter {
            b.min = b.min.min(p);
            b.max = b.max.max(p);
        }
        Some(b)
    }
}

/// Integer (x, y) tile coordinate in the [0, 63] grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u8,
    pub y: u8,
}

impl TileCoord {
    pub fn new(x: u8, y: u8) -> Self {
        TileCoord { x, y }
    }

    pub fn in_range(x: i32, y: i32) -> bool {
        (0..TILES_PER_SIDE as i32).contains(&x) && (0..TILES_PER_SIDE as i32).contains(&y)
    }

    /// World-space XY bounds of this tile. Axis convention matches the
    /// source data: the world X extent is driven by the tile's Y index and
    /// vice versa, and both increase toward tile index 0 (§3, §9).
    pub fn xy_bounds(self) -> Bounds {
        let side = TILES_PER_SIDE as f32;
        let min_x = (side - self.y as f32 - 1.0) * TILE_SIZE;
        let max_x = (side - self.y as f32) * TILE_SIZE;
        let min_y = (side - self.x as f32 - 1.0) * TILE_SIZE;
        let max_y = (side - self.x as f32) * TILE_SIZE;
        Bounds::empty_z((min_x, min_y), (max_x, max_y))
    }

    /// Returns the 3x3 neighborhood (self included) clipped to the grid,
    /// used to build halo geometry for a single-tile build (§4.6, §9).
    pub fn neighborhood_3x3(self) -> Vec<TileCoord> {
        let mut out = Vec::with_capacity(9);
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let x = self.x as i32 + dx;
                let y = self.y as i32 + dy;
                if TileCoord::in_range(x, y) {
                    out.push(TileCoord::new(x as u8, y as u8));
                }
            }
        }
        out
    }
}

/// Maps a world-space point within a tile's bounds to the (chunk_x, chunk_y)
/// whose footprint contains it, under the half-open edge rule (invariant 4).
/// Returns `None` if the point does not fall within the tile at all.
pub fn chunk_index_for_point(tile_bounds: &Bounds, x: f32, y: f32) -> Option<(usize, usize)> {
    if !tile_bounds.contains_xy_half_open(x, y) {
        return None;
    }
    let chunk_col = ((tile_bounds.max.y - y) / CHUNK_SIZE) as usize;
    let chunk_row = ((tile_bounds.max.x - x) / CHUNK_SIZE) as usize;
    let chunk_col = chunk_col.min(CHUNKS_PER_TILE as usize - 1);
    let chunk_row = chunk_row.min(CHUNKS_PER_TILE as usize - 1);
    Some((chunk_row, chunk_col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_grid_is_contiguous_and_non_overlapping() {
        // Every tile's max corner is the next tile's min corner along each axis.
        for i in 0..63u8 {
            let a = TileCoord::new(0, i).xy_bounds();
            let b = TileCoord::new(0, i + 1).xy_bounds();
            assert!((a.min.y - b.max.y).abs() < 1e-3);
        }
    }

    #[test]
    fn neighborhood_clips_at_grid_edge() {
        let corner = TileCoord::new(0, 0);
        assert_eq!(corner.neighborhood_3x3().len(), 4);
        let interior = TileCoord::new(32, 32);
        assert_eq!(interior.neighborhood_3x3().len(), 9);
    }
}
