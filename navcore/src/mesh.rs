//! Mesh Builder: geometry model -> navmesh generator input (§4.6).
//!
//! Produces a flat vertex array, a triangle-index array, and a per-triangle
//! [`AreaFlag`] so the runtime can tell terrain from liquid from baked-in
//! object geometry. A per-tile build additionally folds in a one-tile halo
//! of neighbor geometry that spills across the tile boundary (§9).

use crate::geometry::object::TriangleMaterial;
use crate::geometry::{Bounds, Tile, WorldObject};
use crate::map::Map;
use glam::Vec3;

/// Per-triangle area classification carried into the navmesh generator and
/// on into the serialized tile mesh, so the runtime can filter by surface
/// kind (e.g. excluding liquid from a walkability test).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaFlag {
    Terrain,
    Liquid,
    Object,
    ObjectLiquid,
    Doodad,
}

/// Flat triangle soup handed to the navmesh generator adapter.
#[derive(Default, Clone)]
pub struct MeshInput {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub area: Vec<AreaFlag>,
}

impl MeshInput {
    fn push_triangle_soup(&mut self, vertices: &[Vec3], indices: &[u32], area: AreaFlag) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        for tri in indices.chunks(3) {
            if tri.len() < 3 {
                continue;
            }
            let (a, b, c) = (base + tri[0], base + tri[1], base + tri[2]);
            if is_degenerate(&self.vertices, a, b, c) {
                continue;
            }
            self.triangles.push([a, b, c]);
            self.area.push(area);
        }
    }

    fn push_world_object(&mut self, wmo: &WorldObject) {
        let walkable_indices: Vec<u32> = wmo
            .indices
            .chunks(3)
            .zip(wmo.triangle_materials.iter())
            .filter(|(_, mat)| **mat == TriangleMaterial::Solid)
            .flat_map(|(tri, _)| tri.iter().copied())
            .collect();
        self.push_triangle_soup(&wmo.vertices, &walkable_indices, AreaFlag::Object);
        self.push_triangle_soup(&wmo.liquid_vertices, &wmo.liquid_indices, AreaFlag::ObjectLiquid);
        self.push_triangle_soup(&wmo.doodad_vertices, &wmo.doodad_indices, AreaFlag::Doodad);
    }
}

fn is_degenerate(vertices: &[Vec3], a: u32, b: u32, c: u32) -> bool {
    let (a, b, c) = (
        vertices[a as usize],
        vertices[b as usize],
        vertices[c as usize],
    );
    (b - a).cross(c - a).length_squared() <= f32::EPSILON
}

/// Builds the triangle soup for one tile build target: the tile's own
/// terrain/liquid plus every WMO/doodad placement (from the tile itself or
/// from `halo` neighbors) whose placement bounds intersect `target`'s XY
/// range (§4.6, §9). `halo` should be the already-assembled 3x3 neighborhood
/// minus `target` itself; an empty slice is fine for a map with no
/// neighboring tiles loaded.
pub fn build_mesh_for_tile(map: &Map, target: &Tile, halo: &[&Tile]) -> MeshInput {
    let mut mesh = MeshInput::default();

    for row in &target.chunks {
        for chunk in row {
            mesh.push_triangle_soup(&chunk.terrain_vertices, &chunk.terrain_indices, AreaFlag::Terrain);
            mesh.push_triangle_soup(&chunk.liquid_vertices, &chunk.liquid_indices, AreaFlag::Liquid);
        }
    }

    let mut seen_wmo = std::collections::HashSet::new();
    let mut seen_doodad = std::collections::HashSet::new();

    let sources = std::iter::once(target).chain(halo.iter().copied());
    for tile in sources {
        for placement in &tile.wmo_placements {
            if !placement.bounds.intersects_xy(&target.bounds) {
                continue;
            }
            if !seen_wmo.insert(placement.unique_id) {
                continue;
            }
            if let Some(wmo) = map.loaded_wmo(placement.unique_id) {
                mesh.push_world_object(&wmo);
            }
        }
        for placement in &tile.doodad_placements {
            // Doodads whose placement bounds don't intersect the build
            // target are skipped outright (§4.6 policy).
            if !placement.bounds.intersects_xy(&target.bounds) {
                continue;
            }
            if !seen_doodad.insert(placement.unique_id) {
                continue;
            }
            if let Some(doodad) = map.loaded_doodad(placement.unique_id) {
                mesh.push_triangle_soup(&doodad.vertices, &doodad.indices, AreaFlag::Doodad);
            }
        }
    }

    mesh
}

/// Builds the triangle soup for a global map: a single root WorldObject with
/// no tile grid, no halo, no doodad-bounds culling (§4.4 `assemble_global`).
pub fn build_mesh_for_global(wmo: &WorldObject) -> MeshInput {
    let mut mesh = MeshInput::default();
    mesh.push_world_object(wmo);
    mesh
}

/// Coarse bounds of the geometry actually gathered, unioning the target's
/// own bounds with every contributing halo tile's bounds. Used by callers
/// that want to log/report the extent covered by a single build job.
pub fn gathered_bounds(target: &Tile, halo: &[&Tile]) -> Bounds {
    let mut bounds = target.bounds;
    for tile in halo {
        bounds.union(&tile.bounds);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobProvider;
    use crate::error::NavCoreResult;
    use crate::geometry::tile::Placement;
    use crate::geometry::TileCoord;
    use std::sync::Arc;

    struct EmptyBlob;
    impl BlobProvider for EmptyBlob {
        fn open(&self, _logical_name: &str) -> NavCoreResult<Vec<u8>> {
            Err(crate::error::NavError::NotFound("stub".into()))
        }
    }

    #[test]
    fn terrain_only_tile_emits_flat_soup() {
        let map = Map::new("Azeroth", Arc::new(EmptyBlob) as Arc<dyn BlobProvider>, false);
        let mut tile = Tile::new(TileCoord::new(10, 10));
        for row in tile.chunks.iter_mut() {
            for chunk in row.iter_mut() {
                chunk.terrain_vertices = vec![
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ];
                chunk.terrain_indices = vec![0, 1, 2];
            }
        }
        let mesh = build_mesh_for_tile(&map, &tile, &[]);
        assert_eq!(mesh.triangles.len(), 16 * 16);
        assert!(mesh.area.iter().all(|a| *a == AreaFlag::Terrain));
    }

    #[test]
    fn doodad_outside_target_bounds_is_skipped() {
        let map = Map::new("Azeroth", Arc::new(EmptyBlob) as Arc<dyn BlobProvider>, false);
        let mut tile = Tile::new(TileCoord::new(10, 10));
        tile.doodad_placements.push(Placement {
            unique_id: 7,
            name_id: 0,
            position: Vec3::ZERO,
            rotation_deg: Vec3::ZERO,
            scale: 1.0,
            bounds: Bounds::empty_z((1_000_000.0, 1_000_000.0), (1_000_001.0, 1_000_001.0)),
        });
        let mesh = build_mesh_for_tile(&map, &tile, &[]);
        assert!(mesh.triangles.is_empty());
    }
}
