//! Navmesh Generator Adapter (§4.8): a small interface in front of the
//! external navmesh generator.
//!
//! The generator itself (voxelization, region growing, contour/detail-mesh
//! extraction) is explicitly out of scope (§1): it is a third-party
//! collaborator. This module defines the boundary — the config it expects
//! and the tile mesh it hands back — plus a [`PassthroughNavGen`] stand-in
//! used by this workspace's tests and by callers that haven't wired in the
//! real generator yet. A production adapter implements [`NavmeshGenerator`]
//! against that external library and is otherwise a drop-in replacement.

use crate::error::NavCoreResult;
use crate::geometry::Bounds;
use crate::mesh::{AreaFlag, MeshInput};
use glam::Vec3;

/// Generator configuration, enumerated per §4.8.
#[derive(Clone, Copy, Debug)]
pub struct NavGenConfig {
    pub cell_size: f32,
    pub cell_height: f32,
    pub walkable_slope_deg: f32,
    pub walkable_height: f32,
    pub walkable_climb: f32,
    pub walkable_radius: f32,
    pub max_edge_length: f32,
    pub max_simplification_error: f32,
    pub min_region_area: f32,
    pub merge_region_area: f32,
    pub detail_sample_distance: f32,
    pub detail_sample_max_error: f32,
}

impl Default for NavGenConfig {
    /// Values in the generator's usual units (world units / degrees),
    /// chosen as reasonable defaults for a human-scale character.
    fn default() -> Self {
        NavGenConfig {
            cell_size: 0.3,
            cell_height: 0.2,
            walkable_slope_deg: 45.0,
            walkable_height: 2.0,
            walkable_climb: 0.9,
            walkable_radius: 0.5,
            max_edge_length: 12.0,
            max_simplification_error: 1.3,
            min_region_area: 8.0,
            merge_region_area: 20.0,
            detail_sample_distance: 6.0,
            detail_sample_max_error: 1.0,
        }
    }
}

/// A generated navmesh tile: the polygon (here: triangle) soup the runtime
/// loads, plus the per-triangle area it was generated from.
#[derive(Default, Clone)]
pub struct TileMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub area: Vec<AreaFlag>,
}

impl TileMesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Adapter contract: hand the assembled geometry to the external generator
/// and get back a navmesh tile, or surface its failure verbatim (§4.8).
pub trait NavmeshGenerator: Send + Sync {
    fn build(
        &self,
        mesh: &MeshInput,
        tile_bounds: Bounds,
        cfg: &NavGenConfig,
    ) -> NavCoreResult<TileMesh>;
}

/// Stand-in adapter: walkability-filters by slope and otherwise passes the
/// triangle soup through unchanged, skipping the generator's voxelization
/// and simplification passes entirely. Exists so the rest of the pipeline
/// (orchestrator, serializer, runtime) can be built and tested end-to-end
/// ahead of wiring in the real external generator.
pub struct PassthroughNavGen;

impl NavmeshGenerator for PassthroughNavGen {
    fn build(
        &self,
        mesh: &MeshInput,
        _tile_bounds: Bounds,
        cfg: &NavGenConfig,
    ) -> NavCoreResult<TileMesh> {
        let max_slope = cfg.walkable_slope_deg.to_radians().cos();
        let mut vertices = Vec::with_capacity(mesh.vertices.len());
        let mut triangles = Vec::with_capacity(mesh.triangles.len());
        let mut area = Vec::with_capacity(mesh.area.len());

        for (tri, flag) in mesh.triangles.iter().zip(mesh.area.iter()) {
            let (a, b, c) = (
                mesh.vertices[tri[0] as usize],
                mesh.vertices[tri[1] as usize],
                mesh.vertices[tri[2] as usize],
            );
            if *flag == AreaFlag::Terrain || *flag == AreaFlag::Object {
                let normal = (b - a).cross(c - a).normalize_or_zero();
                if normal.z.abs() < max_slope {
                    continue; // too steep to walk
                }
            }
            let base = vertices.len() as u32;
            vertices.push(a);
            vertices.push(b);
            vertices.push(c);
            triangles.push([base, base + 1, base + 2]);
            area.push(*flag);
        }

        Ok(TileMesh {
            vertices,
            triangles,
            area,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_drops_overly_steep_terrain() {
        let mut mesh = MeshInput::default();
        // A vertical wall: normal lies in the XY plane, z-slope is 90deg.
        mesh.vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        mesh.triangles = vec![[0, 1, 2]];
        mesh.area = vec![AreaFlag::Terrain];

        let cfg = NavGenConfig::default();
        let gen = PassthroughNavGen;
        let out = gen
            .build(&mesh, Bounds::empty_z((0.0, 0.0), (1.0, 1.0)), &cfg)
            .unwrap();
        assert_eq!(out.triangle_count(), 0);
    }

    #[test]
    fn passthrough_keeps_flat_terrain() {
        let mut mesh = MeshInput::default();
        mesh.vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        mesh.triangles = vec![[0, 1, 2]];
        mesh.area = vec![AreaFlag::Terrain];

        let cfg = NavGenConfig::default();
        let gen = PassthroughNavGen;
        let out = gen
            .build(&mesh, Bounds::empty_z((0.0, 0.0), (1.0, 1.0)), &cfg)
            .unwrap();
        assert_eq!(out.triangle_count(), 1);
    }
}
