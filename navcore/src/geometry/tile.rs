//! Tile (ADT) and Chunk geometry containers (§3).

use super::{Bounds, TileCoord, UniqueId};
use crate::constants::{CHUNKS_PER_TILE, INNER_VERTS_PER_SIDE, OUTER_VERTS_PER_SIDE, QUADS_PER_CHUNK_SIDE};
use glam::Vec3;
use smallvec::SmallVec;

/// Euler-angle + uniform scale placement shared by WMO and doodad instances.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    pub unique_id: UniqueId,
    pub name_id: u32,
    pub position: Vec3,
    /// Rotation in degrees, matching the on-disk MDDF/MODF layout.
    pub rotation_deg: Vec3,
    pub scale: f32,
    pub bounds: Bounds,
}

/// One 1/256th of a tile: a 17x17 interleaved height lattice, its
/// triangulation, liquid surface, normals, and the shared objects whose
/// footprint touches this chunk.
#[derive(Clone, Default)]
pub struct Chunk {
    pub terrain_vertices: Vec<Vec3>,
    pub terrain_indices: Vec<u32>,
    pub surface_normals: Vec<Vec3>,
    /// 8x8 bit mask; bit (y*8+x) set means quad (x, y) is a hole.
    pub hole_mask: u64,
    pub liquid_vertices: Vec<Vec3>,
    pub liquid_indices: Vec<u32>,
    pub wmo_refs: SmallVec<[UniqueId; 4]>,
    pub doodad_refs: SmallVec<[UniqueId; 4]>,
}

impl Chunk {
    pub fn is_hole(&self, quad_x: u32, quad_y: u32) -> bool {
        debug_assert!(quad_x < QUADS_PER_CHUNK_SIDE && quad_y < QUADS_PER_CHUNK_SIDE);
        (self.hole_mask >> (quad_y * QUADS_PER_CHUNK_SIDE + quad_x)) & 1 != 0
    }

    pub fn set_hole(&mut self, quad_x: u32, quad_y: u32, hole: bool) {
        let bit = 1u64 << (quad_y * QUADS_PER_CHUNK_SIDE + quad_x);
        if hole {
            self.hole_mask |= bit;
        } else {
            self.hole_mask &= !bit;
        }
    }

    /// Index into `terrain_vertices` of the outer-row sample at (col, row),
    /// `col`/`row` in `0..=8`. Outer+inner rows interleave as 17/17/... so
    /// each outer row starts 17 samples after the previous one.
    fn outer_index(col: u32, row: u32) -> usize {
        (row * (OUTER_VERTS_PER_SIDE + INNER_VERTS_PER_SIDE) + col) as usize
    }

    /// Index of the inner (quad-centre) sample at (col, row), `col` in
    /// `0..8`, `row` in `0..8`.
    fn inner_index(col: u32, row: u32) -> usize {
        (row * (OUTER_VERTS_PER_SIDE + INNER_VERTS_PER_SIDE) + OUTER_VERTS_PER_SIDE + col) as usize
    }

    /// Builds the terrain index buffer: four triangles per non-holed quad,
    /// fanned around the quad's interleaved centre vertex (invariant 2).
    /// This mirrors the reference `Adt::Adt` triangulation exactly:
    /// `currIndex = y*17+x`; triangles (idx, idx+9, idx+1), (idx, idx+17,
    /// idx+9), (idx+9, idx+17, idx+18), (idx+1, idx+9, idx+18).
    pub fn build_terrain_indices(&mut self) {
        self.terrain_indices.clear();
        self.terrain_indices
            .reserve(QUADS_PER_CHUNK_SIDE as usize * QUADS_PER_CHUNK_SIDE as usize * 4 * 3);

        const STRIDE: u32 = OUTER_VERTS_PER_SIDE + INNER_VERTS_PER_SIDE; // 17

        for y in 0..QUADS_PER_CHUNK_SIDE {
            for x in 0..QUADS_PER_CHUNK_SIDE {
                if self.is_hole(x, y) {
                    continue;
                }
                let curr = y * STRIDE + x;
                let mut push_tri = |a: u32, b: u32, c: u32| {
                    if !Self::is_degenerate(&self.terrain_vertices, a, b, c) {
                        self.terrain_indices.push(a);
                        self.terrain_indices.push(b);
                        self.terrain_indices.push(c);
                    }
                };
                push_tri(curr, curr + 9, curr + 1);
                push_tri(curr, curr + 17, curr + 9);
                push_tri(curr + 9, curr + 17, curr + 18);
                push_tri(curr + 1, curr + 9, curr + 18);
            }
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

    /// World-space position of height sample (col, row) in the outer (9x9)
    /// lattice, given this chunk's own world-space XY origin at its max
    /// corner (consistent with the tile's max-corner-relative axis
    /// convention, §9).
    pub fn outer_sample_xy(chunk_max: (f32, f32), unit: f32, col: u32, row: u32) -> (f32, f32) {
        (
            chunk_max.0 - col as f32 * unit,
            chunk_max.1 - row as f32 * unit,
        )
    }

    /// World-space position of the quad-centre sample (col, row) in the
    /// inner (8x8) lattice.
    pub fn inner_sample_xy(chunk_max: (f32, f32), unit: f32, col: u32, row: u32) -> (f32, f32) {
        (
            chunk_max.0 - (col as f32 + 0.5) * unit,
            chunk_max.1 - (row as f32 + 0.5) * unit,
        )
    }
}

/// One of the 64x64 square regions of a map; the unit of build and lazy load.
pub struct Tile {
    pub coord: TileCoord,
    pub chunks: Vec<Vec<Chunk>>, // [row][col], CHUNKS_PER_TILE x CHUNKS_PER_TILE
    pub bounds: Bounds,
    pub wmo_refs: Vec<UniqueId>,
    pub doodad_refs: Vec<UniqueId>,
    pub wmo_placements: Vec<Placement>,
    pub doodad_placements: Vec<Placement>,
}

impl Tile {
    pub fn new(coord: TileCoord) -> Self {
        let n = CHUNKS_PER_TILE as usize;
        Tile {
            coord,
            chunks: vec![vec![Chunk::default(); n]; n],
            bounds: coord.xy_bounds(),
            wmo_refs: Vec::new(),
            doodad_refs: Vec::new(),
            wmo_placements: Vec::new(),
            doodad_placements: Vec::new(),
        }
    }

    pub fn chunk(&self, row: usize, col: usize) -> &Chunk {
        &self.chunks[row][col]
    }

    pub fn chunk_mut(&mut self, row: usize, col: usize) -> &mut Chunk {
        &mut self.chunks[row][col]
    }

    /// Registers a shared object's `unique_id` in every chunk whose XY
    /// footprint contains at least one of `vertices` (§4.5). Also grows the
    /// tile's Z bounds to include every contained vertex (invariant 5).
    pub fn register_object_footprint(
        &mut self,
        unique_id: UniqueId,
        vertices: &[Vec3],
        is_doodad: bool,
    ) {
        let mut touched = false;
        for v in vertices {
            if let Some((row, col)) = super::chunk_index_for_point(&self.bounds, v.x, v.y) {
                touched = true;
                self.bounds.include_z(v.z);
                let chunk = &mut self.chunks[row][col];
                let refs = if is_doodad {
                    &mut chunk.doodad_refs
                } else {
                    &mut chunk.wmo_refs
                };
                if !refs.contains(&unique_id) {
                    refs.push(unique_id);
                }
            }
        }
        if touched {
            let list = if is_doodad {
                &mut self.doodad_refs
            } else {
                &mut self.wmo_refs
            };
            if !list.contains(&unique_id) {
                list.push(unique_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_chunk(hole_mask: u64) -> Chunk {
        let mut c = Chunk {
            hole_mask,
            ..Chunk::default()
        };
        // 9x9 outer + 8x8 inner grid, all at z=0, laid out on a unit grid.
        for row in 0..OUTER_VERTS_PER_SIDE {
            for col in 0..OUTER_VERTS_PER_SIDE {
                c.terrain_vertices
                    .push(Vec3::new(col as f32, row as f32, 0.0));
            }
            if row < INNER_VERTS_PER_SIDE {
                for col in 0..INNER_VERTS_PER_SIDE {
                    c.terrain_vertices
                        .push(Vec3::new(col as f32 + 0.5, row as f32 + 0.5, 0.0));
                }
            }
        }
        c
    }

    #[test]
    fn triangle_count_matches_holes_formula() {
        let mut c = flat_chunk(0);
        c.build_terrain_indices();
        assert_eq!(c.terrain_indices.len(), 3 * 4 * 64);

        let mut holed = flat_chunk(0b11); // two holes
        holed.build_terrain_indices();
        assert_eq!(holed.terrain_indices.len(), 3 * 4 * (64 - 2));
    }

    #[test]
    fn no_degenerate_triangles_emitted() {
        let mut c = flat_chunk(0);
        // Collapse one quad's vertices onto a single point.
        c.terrain_vertices[0] = c.terrain_vertices[1];
        c.terrain_vertices[9] = c.terrain_vertices[1];
        c.build_terrain_indices();
        for tri in c.terrain_indices.chunks(3) {
            let (a, b, cc) = (
                c.terrain_vertices[tri[0] as usize],
                c.terrain_vertices[tri[1] as usize],
                c.terrain_vertices[tri[2] as usize],
            );
            assert!((b - a).cross(cc - a).length_squared() > f32::EPSILON);
        }
    }
}
