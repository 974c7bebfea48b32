//! Runtime Query Engine (§4.10): lazily loads serialized navmesh tiles and
//! answers path/height/line-of-sight queries against them.
//!
//! Read-mostly (§5): tile loading takes an exclusive slot (via `DashMap`'s
//! per-shard locking); queries only ever clone an `Arc` and read through it,
//! so concurrent queries never block each other or a load of a *different*
//! tile. Tiles are refcounted against the API and never unloaded implicitly.

use crate::error::{NavCoreResult, NavError};
use crate::geometry::TileCoord;
use crate::mesh::AreaFlag;
use crate::navgen::TileMesh;
use crate::serializer;
use dashmap::DashMap;
use getset::Getters;
use glam::Vec3;
use std::collections::{BinaryHeap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// One loaded navmesh tile, as read back from its `.nav` file.
pub struct LoadedTile {
    pub bounds: crate::geometry::Bounds,
    pub mesh: TileMesh,
}

/// A named map's runtime query surface: the output directory a build wrote
/// to, and the tiles loaded from it so far.
#[derive(Getters)]
pub struct RuntimeMap {
    #[get = "pub"]
    map_name: String,
    #[get = "pub"]
    out_root: PathBuf,
    global: bool,
    tiles: DashMap<(i32, i32), Arc<LoadedTile>>,
}

impl RuntimeMap {
    /// Opens a map for querying: `out_root` is the directory a build wrote
    /// `Nav/`/`BVH/` into. Fails with [`NavError::NotFound`] if that map's
    /// `Nav/<Map>` directory doesn't exist (§8 scenario S1).
    pub fn open(out_root: impl Into<PathBuf>, map_name: impl Into<String>) -> NavCoreResult<Self> {
        let out_root = out_root.into();
        let map_name = map_name.into();
        let nav_dir = out_root.join("Nav").join(&map_name);
        if !nav_dir.is_dir() {
            return Err(NavError::NotFound(format!(
                "no Nav directory for map '{map_name}' under {}",
                out_root.display()
            )));
        }
        let global = nav_dir.join("global.nav").is_file();
        Ok(RuntimeMap {
            map_name,
            out_root,
            global,
            tiles: DashMap::new(),
        })
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Loads every `.nav` file present for this map (§4.10). Returns the
    /// number of tiles newly loaded (already-loaded tiles are idempotent
    /// no-ops and not recounted).
    pub fn load_all_tiles(&self) -> NavCoreResult<usize> {
        if self.global {
            self.load_tile_raw(serializer::GLOBAL_TILE_COORD.0, serializer::GLOBAL_TILE_COORD.1)?;
            return Ok(1);
        }
        let nav_dir = self.out_root.join("Nav").join(&self.map_name);
        let mut count = 0;
        for entry in std::fs::read_dir(&nav_dir)
            .map_err(|e| NavError::Internal(format!("reading {}: {e}", nav_dir.display())))?
        {
            let entry = entry.map_err(|e| NavError::Internal(e.to_string()))?;
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str().map(str::to_owned)) else {
                continue;
            };
            let Some((x, y)) = stem.split_once('_') else {
                continue;
            };
            let (Ok(x), Ok(y)) = (x.parse::<i32>(), y.parse::<i32>()) else {
                continue;
            };
            if self.load_tile_raw(x, y)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Loads tile `(x, y)` if not already loaded. Idempotent (§4.10).
    pub fn load_tile(&self, x: u8, y: u8) -> NavCoreResult<()> {
        if self.global {
            return Err(NavError::OutOfRange("map is global, has no tile grid".into()));
        }
        if !TileCoord::in_range(x as i32, y as i32) {
            return Err(NavError::OutOfRange(format!("tile ({x}, {y}) outside the 64x64 grid")));
        }
        self.load_tile_raw(x as i32, y as i32)?;
        Ok(())
    }

    /// Loads the tile that contains world position `(wx, wy)`.
    pub fn load_tile_at(&self, wx: f32, wy: f32) -> NavCoreResult<()> {
        let (x, y) = world_to_tile(wx, wy)?;
        self.load_tile(x, y)
    }

    fn load_tile_raw(&self, x: i32, y: i32) -> NavCoreResult<bool> {
        if self.tiles.contains_key(&(x, y)) {
            return Ok(false);
        }
        let path = serializer::tile_nav_path(&self.out_root, &self.map_name, x, y);
        let file = serializer::read_tile_nav(&path)?;
        self.tiles.insert(
            (x, y),
            Arc::new(LoadedTile {
                bounds: file.bounds,
                mesh: file.mesh,
            }),
        );
        Ok(true)
    }

    fn tile_containing(&self, x: f32, y: f32) -> NavCoreResult<Arc<LoadedTile>> {
        if self.global {
            return self
                .tiles
                .get(&serializer::GLOBAL_TILE_COORD)
                .map(|e| e.value().clone())
                .ok_or_else(|| NavError::NotLoaded("global tile not loaded".into()));
        }
        let (tx, ty) = world_to_tile(x, y)?;
        self.tiles
            .get(&(tx as i32, ty as i32))
            .map(|e| e.value().clone())
            .ok_or_else(|| NavError::NotLoaded(format!("tile ({tx}, {ty}) not loaded")))
    }

    /// Zone/area classification at a world position. The zone/area *name*
    /// tables live in the game's resource bundle, which this core treats as
    /// an opaque external collaborator (§1): this returns the owning tile's
    /// own coordinates as a stable, deterministic placeholder id pair,
    /// while still enforcing the same OutOfRange/NotLoaded contract a real
    /// area-table lookup would (see DESIGN.md).
    pub fn get_zone_and_area(&self, x: f32, y: f32, _z: f32) -> NavCoreResult<(u32, u32)> {
        self.tile_containing(x, y)?;
        if self.global {
            return Ok((0, 0));
        }
        let (tx, ty) = world_to_tile(x, y)?;
        Ok((tx as u32, ty as u32))
    }

    /// All Z surfaces at `(x, y)`, strictly top-down (§4.10, §8 property 6).
    /// Writes up to `out.len()` values and returns the true count; if the
    /// true count exceeds `out.len()`, `out` is left untouched and
    /// [`NavError::TooSmall`] is returned with that count.
    pub fn find_heights(&self, x: f32, y: f32, out: &mut [f32]) -> NavCoreResult<usize> {
        let tile = self.tile_containing(x, y)?;
        let mut heights: Vec<f32> = Vec::new();
        for (tri, _area) in tile.mesh.triangles.iter().zip(tile.mesh.area.iter()) {
            if let Some(z) = triangle_height_at(&tile.mesh.vertices, tri, x, y) {
                heights.push(z);
            }
        }
        heights.sort_by(|a, b| b.partial_cmp(a).unwrap());
        heights.dedup_by(|a, b| (*a - *b).abs() < 1e-4);

        if heights.len() > out.len() {
            return Err(NavError::TooSmall { needed: heights.len() });
        }
        out[..heights.len()].copy_from_slice(&heights);
        Ok(heights.len())
    }

    /// The Z a walker starting at `from` would reach at `to_xy`: the surface
    /// closest in height to `from.z` among all surfaces at `to_xy` (§4.10).
    pub fn find_height(&self, from: Vec3, to_xy: (f32, f32)) -> NavCoreResult<f32> {
        let mut buf = [0f32; 64];
        let count = match self.find_heights(to_xy.0, to_xy.1, &mut buf) {
            Ok(n) => n,
            Err(NavError::TooSmall { needed }) => {
                let mut big = vec![0f32; needed];
                self.find_heights(to_xy.0, to_xy.1, &mut big)?;
                return Ok(closest(&big, from.z));
            }
            Err(e) => return Err(e),
        };
        if count == 0 {
            return Err(NavError::OutOfRange(format!(
                "no walkable surface at ({}, {})",
                to_xy.0, to_xy.1
            )));
        }
        Ok(closest(&buf[..count], from.z))
    }

    /// True iff the straight segment `from -> to` is unobstructed. When
    /// `include_doodads` is false, [`AreaFlag::Doodad`] triangles are
    /// excluded from the obstruction test (§8 scenario S6).
    pub fn line_of_sight(&self, from: Vec3, to: Vec3, include_doodads: bool) -> NavCoreResult<bool> {
        let mid = (from + to) * 0.5;
        let tile = self.tile_containing(mid.x, mid.y)?;
        for (tri, area) in tile.mesh.triangles.iter().zip(tile.mesh.area.iter()) {
            if !include_doodads && *area == AreaFlag::Doodad {
                continue;
            }
            if *area == AreaFlag::Liquid || *area == AreaFlag::ObjectLiquid {
                continue;
            }
            let (a, b, c) = (
                tile.mesh.vertices[tri[0] as usize],
                tile.mesh.vertices[tri[1] as usize],
                tile.mesh.vertices[tri[2] as usize],
            );
            if segment_intersects_triangle(from, to, a, b, c) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shortest path from `from` to `to` across the loaded tile(s)'
    /// walkable triangle adjacency graph, via A* over triangle centroids.
    /// Writes up to `out.len()` waypoints and returns the true count;
    /// [`NavError::TooSmall`] leaves `out` untouched, per §8 scenario S5.
    pub fn find_path(&self, from: Vec3, to: Vec3, out: &mut [Vec3]) -> NavCoreResult<usize> {
        let tile = self.tile_containing(from.x, from.y)?;
        let graph = TriangleGraph::build(&tile.mesh);

        let start_tri = graph
            .nearest_walkable_triangle(from)
            .ok_or_else(|| NavError::OutOfRange("no walkable surface near path start".into()))?;
        let goal_tri = graph
            .nearest_walkable_triangle(to)
            .ok_or_else(|| NavError::OutOfRange("no walkable surface near path end".into()))?;

        let mut waypoints = vec![from];
        waypoints.extend(graph.astar(start_tri, goal_tri));
        waypoints.push(to);

        if waypoints.len() > out.len() {
            return Err(NavError::TooSmall { needed: waypoints.len() });
        }
        out[..waypoints.len()].copy_from_slice(&waypoints);
        Ok(waypoints.len())
    }
}

fn closest(values: &[f32], target: f32) -> f32 {
    *values
        .iter()
        .min_by(|a, b| (**a - target).abs().partial_cmp(&(**b - target).abs()).unwrap())
        .unwrap()
}

fn world_to_tile(wx: f32, wy: f32) -> NavCoreResult<(u8, u8)> {
    use crate::constants::{TILES_PER_SIDE, TILE_SIZE};
    // Inverse of `TileCoord::xy_bounds` (§3, §9): world X is driven by tile
    // Y and vice versa, both decreasing as the tile index increases.
    let half = TILES_PER_SIDE as f32;
    let ty = (half - wx / TILE_SIZE).floor();
    let tx = (half - wy / TILE_SIZE).floor();
    if !(0.0..TILES_PER_SIDE as f32).contains(&tx) || !(0.0..TILES_PER_SIDE as f32).contains(&ty) {
        return Err(NavError::OutOfRange(format!(
            "world position ({wx}, {wy}) maps to tile ({tx}, {ty}), outside the grid"
        )));
    }
    Ok((tx as u8, ty as u8))
}

fn triangle_height_at(vertices: &[Vec3], tri: &[u32; 3], x: f32, y: f32) -> Option<f32> {
    let (a, b, c) = (
        vertices[tri[0] as usize],
        vertices[tri[1] as usize],
        vertices[tri[2] as usize],
    );
    let (p0, p1, p2) = ((a.x, a.y), (b.x, b.y), (c.x, c.y));
    let denom = (p1.1 - p2.1) * (p0.0 - p2.0) + (p2.0 - p1.0) * (p0.1 - p2.1);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let w0 = ((p1.1 - p2.1) * (x - p2.0) + (p2.0 - p1.0) * (y - p2.1)) / denom;
    let w1 = ((p2.1 - p0.1) * (x - p2.0) + (p0.0 - p2.0) * (y - p2.1)) / denom;
    let w2 = 1.0 - w0 - w1;
    let eps = -1e-4;
    if w0 < eps || w1 < eps || w2 < eps {
        return None;
    }
    Some(w0 * a.z + w1 * b.z + w2 * c.z)
}

/// Moller-Trumbore-style segment/triangle intersection, used for
/// line-of-sight obstruction tests.
fn segment_intersects_triangle(from: Vec3, to: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let dir = to - from;
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < f32::EPSILON {
        return false;
    }
    let inv_det = 1.0 / det;
    let tvec = from - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    let t = edge2.dot(qvec) * inv_det;
    (0.0..=1.0).contains(&t)
}

/// Triangle-adjacency graph over a tile's walkable (non-liquid) triangles,
/// used by `find_path`'s A* search.
struct TriangleGraph {
    centroids: Vec<Vec3>,
    walkable: Vec<usize>,
    adjacency: Vec<Vec<usize>>,
}

impl TriangleGraph {
    fn build(mesh: &TileMesh) -> Self {
        let mut centroids = Vec::with_capacity(mesh.triangles.len());
        let mut walkable = Vec::new();
        for (i, (tri, area)) in mesh.triangles.iter().zip(mesh.area.iter()).enumerate() {
            let (a, b, c) = (
                mesh.vertices[tri[0] as usize],
                mesh.vertices[tri[1] as usize],
                mesh.vertices[tri[2] as usize],
            );
            centroids.push((a + b + c) / 3.0);
            if *area == AreaFlag::Terrain || *area == AreaFlag::Object {
                walkable.push(i);
            }
        }

        // Two walkable triangles are adjacent iff they share an edge
        // (two vertex indices in common).
        let mut edge_owners: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for &i in &walkable {
            for edge in triangle_edges(&mesh.triangles[i]) {
                edge_owners.entry(edge).or_default().push(i);
            }
        }
        let mut adjacency = vec![Vec::new(); mesh.triangles.len()];
        for owners in edge_owners.values() {
            for &i in owners {
                for &j in owners {
                    if i != j && !adjacency[i].contains(&j) {
                        adjacency[i].push(j);
                    }
                }
            }
        }

        TriangleGraph {
            centroids,
            walkable,
            adjacency,
        }
    }

    fn nearest_walkable_triangle(&self, p: Vec3) -> Option<usize> {
        self.walkable
            .iter()
            .copied()
            .min_by(|a, b| {
                self.centroids[*a]
                    .distance_squared(p)
                    .partial_cmp(&self.centroids[*b].distance_squared(p))
                    .unwrap()
            })
    }

    /// A* over triangle centroids; returns interior waypoints only (the
    /// caller prepends/appends the exact query endpoints).
    fn astar(&self, start: usize, goal: usize) -> Vec<Vec3> {
        if start == goal {
            return Vec::new();
        }

        #[derive(PartialEq)]
        struct Node {
            cost: f32,
            index: usize,
        }
        impl Eq for Node {}
        impl Ord for Node {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                other.cost.partial_cmp(&self.cost).unwrap()
            }
        }
        impl PartialOrd for Node {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        let heuristic = |i: usize| self.centroids[i].distance(self.centroids[goal]);
        let mut open = BinaryHeap::new();
        open.push(Node {
            cost: heuristic(start),
            index: start,
        });
        let mut g_score: HashMap<usize, f32> = HashMap::from([(start, 0.0)]);
        let mut came_from: HashMap<usize, usize> = HashMap::new();

        while let Some(Node { index: current, .. }) = open.pop() {
            if current == goal {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(&prev) = came_from.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return path.into_iter().map(|i| self.centroids[i]).collect();
            }
            for &next in &self.adjacency[current] {
                let tentative = g_score[&current] + self.centroids[current].distance(self.centroids[next]);
                if tentative < *g_score.get(&next).unwrap_or(&f32::INFINITY) {
                    came_from.insert(next, current);
                    g_score.insert(next, tentative);
                    open.push(Node {
                        cost: tentative + heuristic(next),
                        index: next,
                    });
                }
            }
        }
        Vec::new()
    }
}

fn triangle_edges(tri: &[u32; 3]) -> [(u32, u32); 3] {
    let edge = |a: u32, b: u32| if a < b { (a, b) } else { (b, a) };
    [edge(tri[0], tri[1]), edge(tri[1], tri[2]), edge(tri[2], tri[0])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::mesh::AreaFlag;
    use crate::navgen::TileMesh;

    fn write_fixture_tile(dir: &std::path::Path, map_name: &str, x: i32, y: i32) {
        // Two flat, adjacent walkable triangles forming a 2x1 quad, plus one
        // doodad triangle blocking the direct line between them.
        let mesh = TileMesh {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.4, 0.4, 5.0),
                Vec3::new(0.6, 0.4, 5.0),
                Vec3::new(0.5, 0.6, -5.0),
            ],
            triangles: vec![[0, 1, 2], [1, 3, 2], [4, 5, 6]],
            area: vec![AreaFlag::Terrain, AreaFlag::Terrain, AreaFlag::Doodad],
        };
        serializer::write_tile_nav(dir, map_name, x, y, Bounds::empty_z((-1.0, -1.0), (2.0, 2.0)), &mesh).unwrap();
    }

    #[test]
    fn loading_unknown_map_is_not_found() {
        let dir = std::env::temp_dir().join("navcore-runtime-test-missing");
        let err = RuntimeMap::open(&dir, "Nowhere").unwrap_err();
        assert!(matches!(err, NavError::NotFound(_)));
    }

    #[test]
    fn find_heights_is_strictly_decreasing() {
        let dir = std::env::temp_dir().join("navcore-runtime-test-heights");
        write_fixture_tile(&dir, "Azeroth", 32, 48);
        let rt = RuntimeMap::open(&dir, "Azeroth").unwrap();
        rt.load_tile(32, 48).unwrap();

        let mut out = [0f32; 8];
        let n = rt.find_heights(0.5, 0.45, &mut out).unwrap();
        assert!(n >= 2);
        for pair in out[..n].windows(2) {
            assert!(pair[0] > pair[1]);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn line_of_sight_respects_doodad_flag() {
        let dir = std::env::temp_dir().join("navcore-runtime-test-los");
        write_fixture_tile(&dir, "Azeroth", 32, 48);
        let rt = RuntimeMap::open(&dir, "Azeroth").unwrap();
        rt.load_tile(32, 48).unwrap();

        let from = Vec3::new(0.45, 0.45, 0.0);
        let to = Vec3::new(0.55, 0.45, 0.0);
        assert!(!rt.line_of_sight(from, to, true).unwrap());
        assert!(rt.line_of_sight(from, to, false).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn find_path_too_small_reports_needed_count_without_writing() {
        let dir = std::env::temp_dir().join("navcore-runtime-test-path");
        write_fixture_tile(&dir, "Azeroth", 32, 48);
        let rt = RuntimeMap::open(&dir, "Azeroth").unwrap();
        rt.load_tile(32, 48).unwrap();

        let mut out = [Vec3::ZERO; 1];
        let sentinel = out[0];
        let err = rt
            .find_path(Vec3::new(0.1, 0.1, 0.0), Vec3::new(0.9, 0.9, 0.0), &mut out)
            .unwrap_err();
        assert!(matches!(err, NavError::TooSmall { .. }));
        assert_eq!(out[0], sentinel);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
