//! Serializer (§4.9, §6): writes and reads both output artifact families.
//!
//! Both directions live in one module so the round-trip property (§8.3,
//! §8.5) has a single source of truth for every on-disk layout. All
//! multi-byte fields are little-endian, per §6.

use crate::error::{NavCoreResult, NavError};
use crate::geometry::{Bounds, UniqueId, WorldObject};
use crate::mesh::AreaFlag;
use crate::navgen::TileMesh;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const NAV_MAGIC: [u8; 4] = *b"NMMT";
pub const NAV_VERSION: u32 = 1;
pub const IDX_MAGIC: [u8; 4] = *b"NMIX";
pub const IDX_VERSION: u32 = 1;

/// Sentinel tile coordinate used for a global map's single navmesh (no tile
/// grid to index into; §4.4 `is_global`).
pub const GLOBAL_TILE_COORD: (i32, i32) = (-1, -1);

fn io_err(context: &str, e: io::Error) -> NavError {
    match e.kind() {
        io::ErrorKind::NotFound => NavError::NotFound(format!("{context}: {e}")),
        io::ErrorKind::UnexpectedEof => NavError::Truncated(format!("{context}: {e}")),
        _ => NavError::Corrupt(format!("{context}: {e}")),
    }
}

pub fn tile_nav_path(out_root: &Path, map_name: &str, tile_x: i32, tile_y: i32) -> PathBuf {
    let file_name = if (tile_x, tile_y) == GLOBAL_TILE_COORD {
        "global.nav".to_string()
    } else {
        format!("{tile_x}_{tile_y}.nav")
    };
    out_root.join("Nav").join(map_name).join(file_name)
}

fn area_to_u32(area: AreaFlag) -> u32 {
    match area {
        AreaFlag::Terrain => 0,
        AreaFlag::Liquid => 1,
        AreaFlag::Object => 2,
        AreaFlag::ObjectLiquid => 3,
        AreaFlag::Doodad => 4,
    }
}

fn u32_to_area(v: u32) -> NavCoreResult<AreaFlag> {
    Ok(match v {
        0 => AreaFlag::Terrain,
        1 => AreaFlag::Liquid,
        2 => AreaFlag::Object,
        3 => AreaFlag::ObjectLiquid,
        4 => AreaFlag::Doodad,
        other => return Err(NavError::Corrupt(format!("unknown area flag {other}"))),
    })
}

/// Packs a generated [`TileMesh`] into the opaque `mesh_bytes` blob embedded
/// in a `.nav` file: vertex count, vertices, triangle count, then
/// (a, b, c, area) per triangle.
fn encode_tile_mesh(mesh: &TileMesh) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + mesh.vertices.len() * 12 + mesh.triangles.len() * 16);
    buf.write_u32::<LittleEndian>(mesh.vertices.len() as u32).unwrap();
    for v in &mesh.vertices {
        buf.write_f32::<LittleEndian>(v.x).unwrap();
        buf.write_f32::<LittleEndian>(v.y).unwrap();
        buf.write_f32::<LittleEndian>(v.z).unwrap();
    }
    buf.write_u32::<LittleEndian>(mesh.triangles.len() as u32).unwrap();
    for (tri, area) in mesh.triangles.iter().zip(mesh.area.iter()) {
        buf.write_u32::<LittleEndian>(tri[0]).unwrap();
        buf.write_u32::<LittleEndian>(tri[1]).unwrap();
        buf.write_u32::<LittleEndian>(tri[2]).unwrap();
        buf.write_u32::<LittleEndian>(area_to_u32(*area)).unwrap();
    }
    buf
}

fn decode_tile_mesh(bytes: &[u8]) -> NavCoreResult<TileMesh> {
    let mut r = BufReader::new(bytes);
    let vertex_count = r
        .read_u32::<LittleEndian>()
        .map_err(|e| io_err("mesh vertex count", e))? as usize;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let x = r.read_f32::<LittleEndian>().map_err(|e| io_err("mesh vertex", e))?;
        let y = r.read_f32::<LittleEndian>().map_err(|e| io_err("mesh vertex", e))?;
        let z = r.read_f32::<LittleEndian>().map_err(|e| io_err("mesh vertex", e))?;
        vertices.push(Vec3::new(x, y, z));
    }
    let triangle_count = r
        .read_u32::<LittleEndian>()
        .map_err(|e| io_err("mesh triangle count", e))? as usize;
    let mut triangles = Vec::with_capacity(triangle_count);
    let mut area = Vec::with_capacity(triangle_count);
    for _ in 0..triangle_count {
        let a = r.read_u32::<LittleEndian>().map_err(|e| io_err("mesh triangle", e))?;
        let b = r.read_u32::<LittleEndian>().map_err(|e| io_err("mesh triangle", e))?;
        let c = r.read_u32::<LittleEndian>().map_err(|e| io_err("mesh triangle", e))?;
        let flag = r.read_u32::<LittleEndian>().map_err(|e| io_err("mesh triangle area", e))?;
        triangles.push([a, b, c]);
        area.push(u32_to_area(flag)?);
    }
    Ok(TileMesh {
        vertices,
        triangles,
        area,
    })
}

pub struct TileNavFile {
    pub tile_x: i32,
    pub tile_y: i32,
    pub bounds: Bounds,
    pub mesh: TileMesh,
}

/// Writes `<out>/Nav/<Map>/<x>_<y>.nav` (§6). `(tile_x, tile_y) ==
/// GLOBAL_TILE_COORD` writes `global.nav` instead.
pub fn write_tile_nav(
    out_root: &Path,
    map_name: &str,
    tile_x: i32,
    tile_y: i32,
    bounds: Bounds,
    mesh: &TileMesh,
) -> NavCoreResult<()> {
    let path = tile_nav_path(out_root, map_name, tile_x, tile_y);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("creating Nav directory", e))?;
    }
    let mesh_bytes = encode_tile_mesh(mesh);

    let file = File::create(&path).map_err(|e| io_err("creating .nav file", e))?;
    let mut w = BufWriter::new(file);
    w.write_all(&NAV_MAGIC).map_err(|e| io_err("writing magic", e))?;
    w.write_u32::<LittleEndian>(NAV_VERSION).map_err(|e| io_err("writing version", e))?;
    w.write_i32::<LittleEndian>(tile_x).map_err(|e| io_err("writing tile_x", e))?;
    w.write_i32::<LittleEndian>(tile_y).map_err(|e| io_err("writing tile_y", e))?;
    for f in [
        bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z,
    ] {
        w.write_f32::<LittleEndian>(f).map_err(|e| io_err("writing bounds", e))?;
    }
    w.write_u32::<LittleEndian>(mesh_bytes.len() as u32)
        .map_err(|e| io_err("writing mesh_size", e))?;
    w.write_all(&mesh_bytes).map_err(|e| io_err("writing mesh_bytes", e))?;
    Ok(())
}

/// Reads a `.nav` file written by [`write_tile_nav`]. A header version
/// mismatch is fatal for this artifact only (§4.9).
pub fn read_tile_nav(path: &Path) -> NavCoreResult<TileNavFile> {
    let file = File::open(path).map_err(|e| io_err("opening .nav file", e))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| io_err("reading magic", e))?;
    if magic != NAV_MAGIC {
        return Err(NavError::Corrupt(format!(
            "bad .nav magic {magic:?}, expected {NAV_MAGIC:?}"
        )));
    }
    let version = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading version", e))?;
    if version != NAV_VERSION {
        return Err(NavError::Corrupt(format!(
            "unsupported .nav version {version}, expected {NAV_VERSION}"
        )));
    }
    let tile_x = r.read_i32::<LittleEndian>().map_err(|e| io_err("reading tile_x", e))?;
    let tile_y = r.read_i32::<LittleEndian>().map_err(|e| io_err("reading tile_y", e))?;
    let mut f = [0f32; 6];
    for slot in f.iter_mut() {
        *slot = r.read_f32::<LittleEndian>().map_err(|e| io_err("reading bounds", e))?;
    }
    let bounds = Bounds {
        min: Vec3::new(f[0], f[1], f[2]),
        max: Vec3::new(f[3], f[4], f[5]),
    };
    let mesh_size = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading mesh_size", e))? as usize;
    let mut mesh_bytes = vec![0u8; mesh_size];
    r.read_exact(&mut mesh_bytes).map_err(|e| io_err("reading mesh_bytes", e))?;
    let mesh = decode_tile_mesh(&mesh_bytes)?;

    Ok(TileNavFile {
        tile_x,
        tile_y,
        bounds,
        mesh,
    })
}

/// A flattened binary AABB tree over one WorldObject's triangle indices
/// (§6, glossary "BVH"). Built by recursive median split on triangle
/// centroid along the longest axis; leaves hold a contiguous run of
/// `reordered_triangles`.
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    pub reordered_triangles: Vec<[u32; 3]>,
}

#[derive(Clone, Copy)]
pub struct BvhNode {
    pub bounds: Bounds,
    pub left: i32,
    pub right: i32,
    pub triangle_start: u32,
    pub triangle_count: u32,
}

const BVH_LEAF_MAX_TRIANGLES: usize = 4;

pub fn build_bvh(vertices: &[Vec3], indices: &[u32]) -> Bvh {
    let mut triangles: Vec<[u32; 3]> = indices
        .chunks(3)
        .filter(|c| c.len() == 3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    if triangles.is_empty() {
        return Bvh {
            nodes: Vec::new(),
            reordered_triangles: Vec::new(),
        };
    }

    let tri_bounds = |tri: &[u32; 3]| -> Bounds {
        let pts = [
            vertices[tri[0] as usize],
            vertices[tri[1] as usize],
            vertices[tri[2] as usize],
        ];
        Bounds::from_points(pts).expect("triangle has 3 points")
    };

    let mut nodes = Vec::new();
    build_bvh_range(&mut triangles, 0, triangles.len(), &mut nodes, &tri_bounds);

    Bvh {
        nodes,
        reordered_triangles: triangles,
    }
}

fn build_bvh_range(
    triangles: &mut [[u32; 3]],
    start: usize,
    end: usize,
    nodes: &mut Vec<BvhNode>,
    tri_bounds: &dyn Fn(&[u32; 3]) -> Bounds,
) -> usize {
    let mut bounds = tri_bounds(&triangles[start]);
    for tri in &triangles[start + 1..end] {
        bounds.union(&tri_bounds(tri));
    }

    let count = end - start;
    let node_index = nodes.len();
    nodes.push(BvhNode {
        bounds,
        left: -1,
        right: -1,
        triangle_start: start as u32,
        triangle_count: count as u32,
    });

    if count <= BVH_LEAF_MAX_TRIANGLES {
        return node_index;
    }

    let extent = bounds.max - bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    let centroid = |tri: &[u32; 3]| -> f32 {
        let b = tri_bounds(tri);
        let c = (b.min + b.max) * 0.5;
        match axis {
            0 => c.x,
            1 => c.y,
            _ => c.z,
        }
    };
    triangles[start..end].sort_by(|a, b| centroid(a).partial_cmp(&centroid(b)).unwrap());
    let mid = start + count / 2;

    let left = build_bvh_range(triangles, start, mid, nodes, tri_bounds);
    let right = build_bvh_range(triangles, mid, end, nodes, tri_bounds);
    nodes[node_index].left = left as i32;
    nodes[node_index].right = right as i32;
    nodes[node_index].triangle_count = 0; // internal node: triangles live in leaves only.
    node_index
}

pub fn bvh_path(out_root: &Path, unique_id: UniqueId) -> PathBuf {
    out_root.join("BVH").join(format!("{unique_id:08x}.bvh"))
}

/// Writes `<out>/BVH/<UniqueId>.bvh` (§6) for one shared WorldObject.
pub fn write_wmo_bvh(out_root: &Path, wmo: &WorldObject) -> NavCoreResult<()> {
    let bvh = build_bvh(&wmo.vertices, &wmo.indices);
    let path = bvh_path(out_root, wmo.unique_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("creating BVH directory", e))?;
    }
    let file = File::create(&path).map_err(|e| io_err("creating .bvh file", e))?;
    let mut w = BufWriter::new(file);

    w.write_u32::<LittleEndian>(wmo.vertices.len() as u32)
        .map_err(|e| io_err("writing bvh vertex count", e))?;
    for v in &wmo.vertices {
        w.write_f32::<LittleEndian>(v.x).map_err(|e| io_err("writing bvh vertex", e))?;
        w.write_f32::<LittleEndian>(v.y).map_err(|e| io_err("writing bvh vertex", e))?;
        w.write_f32::<LittleEndian>(v.z).map_err(|e| io_err("writing bvh vertex", e))?;
    }
    w.write_u32::<LittleEndian>(bvh.reordered_triangles.len() as u32)
        .map_err(|e| io_err("writing bvh triangle count", e))?;
    for tri in &bvh.reordered_triangles {
        for i in tri {
            w.write_u32::<LittleEndian>(*i).map_err(|e| io_err("writing bvh triangle", e))?;
        }
    }
    w.write_u32::<LittleEndian>(bvh.nodes.len() as u32)
        .map_err(|e| io_err("writing bvh node count", e))?;
    for node in &bvh.nodes {
        for f in [
            node.bounds.min.x, node.bounds.min.y, node.bounds.min.z,
            node.bounds.max.x, node.bounds.max.y, node.bounds.max.z,
        ] {
            w.write_f32::<LittleEndian>(f).map_err(|e| io_err("writing bvh node bounds", e))?;
        }
        w.write_i32::<LittleEndian>(node.left).map_err(|e| io_err("writing bvh node", e))?;
        w.write_i32::<LittleEndian>(node.right).map_err(|e| io_err("writing bvh node", e))?;
        w.write_u32::<LittleEndian>(node.triangle_start).map_err(|e| io_err("writing bvh node", e))?;
        w.write_u32::<LittleEndian>(node.triangle_count).map_err(|e| io_err("writing bvh node", e))?;
    }
    Ok(())
}

pub struct LoadedBvh {
    pub vertices: Vec<Vec3>,
    pub bvh: Bvh,
}

pub fn read_wmo_bvh(path: &Path) -> NavCoreResult<LoadedBvh> {
    let file = File::open(path).map_err(|e| io_err("opening .bvh file", e))?;
    let mut r = BufReader::new(file);

    let vertex_count = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh vertex count", e))? as usize;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let x = r.read_f32::<LittleEndian>().map_err(|e| io_err("reading bvh vertex", e))?;
        let y = r.read_f32::<LittleEndian>().map_err(|e| io_err("reading bvh vertex", e))?;
        let z = r.read_f32::<LittleEndian>().map_err(|e| io_err("reading bvh vertex", e))?;
        vertices.push(Vec3::new(x, y, z));
    }
    let triangle_count = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh triangle count", e))? as usize;
    let mut reordered_triangles = Vec::with_capacity(triangle_count);
    for _ in 0..triangle_count {
        let a = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh triangle", e))?;
        let b = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh triangle", e))?;
        let c = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh triangle", e))?;
        reordered_triangles.push([a, b, c]);
    }
    let node_count = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh node count", e))? as usize;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let mut f = [0f32; 6];
        for slot in f.iter_mut() {
            *slot = r.read_f32::<LittleEndian>().map_err(|e| io_err("reading bvh node bounds", e))?;
        }
        let left = r.read_i32::<LittleEndian>().map_err(|e| io_err("reading bvh node", e))?;
        let right = r.read_i32::<LittleEndian>().map_err(|e| io_err("reading bvh node", e))?;
        let triangle_start = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh node", e))?;
        let triangle_count = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading bvh node", e))?;
        nodes.push(BvhNode {
            bounds: Bounds {
                min: Vec3::new(f[0], f[1], f[2]),
                max: Vec3::new(f[3], f[4], f[5]),
            },
            left,
            right,
            triangle_start,
            triangle_count,
        });
    }

    Ok(LoadedBvh {
        vertices,
        bvh: Bvh {
            nodes,
            reordered_triangles,
        },
    })
}

pub fn map_index_path(out_root: &Path, map_name: &str) -> PathBuf {
    out_root.join("BVH").join(format!("{map_name}.idx"))
}

/// Writes `<out>/BVH/<Map>.idx` (§6): every shared WorldObject referenced by
/// the map, as `UniqueId -> bvh file offset` pairs. Offsets are always 0 in
/// this implementation since each WorldObject gets its own `.bvh` file
/// (see DESIGN.md); the field is kept because it is part of the stable
/// on-disk layout and a future single-blob BVH store would populate it.
pub fn write_map_index(out_root: &Path, map_name: &str, entries: &[(UniqueId, u64)]) -> NavCoreResult<()> {
    let path = map_index_path(out_root, map_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("creating BVH directory", e))?;
    }
    let file = File::create(&path).map_err(|e| io_err("creating .idx file", e))?;
    let mut w = BufWriter::new(file);
    w.write_all(&IDX_MAGIC).map_err(|e| io_err("writing magic", e))?;
    w.write_u32::<LittleEndian>(IDX_VERSION).map_err(|e| io_err("writing version", e))?;
    w.write_u32::<LittleEndian>(entries.len() as u32).map_err(|e| io_err("writing count", e))?;
    for (id, offset) in entries {
        w.write_u32::<LittleEndian>(*id).map_err(|e| io_err("writing entry id", e))?;
        w.write_u64::<LittleEndian>(*offset).map_err(|e| io_err("writing entry offset", e))?;
    }
    Ok(())
}

pub fn read_map_index(out_root: &Path, map_name: &str) -> NavCoreResult<Vec<(UniqueId, u64)>> {
    let path = map_index_path(out_root, map_name);
    let file = File::open(&path).map_err(|e| io_err("opening .idx file", e))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| io_err("reading magic", e))?;
    if magic != IDX_MAGIC {
        return Err(NavError::Corrupt(format!(
            "bad .idx magic {magic:?}, expected {IDX_MAGIC:?}"
        )));
    }
    let version = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading version", e))?;
    if version != IDX_VERSION {
        return Err(NavError::Corrupt(format!(
            "unsupported .idx version {version}, expected {IDX_VERSION}"
        )));
    }
    let count = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading count", e))? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let id = r.read_u32::<LittleEndian>().map_err(|e| io_err("reading entry id", e))?;
        let offset = r.read_u64::<LittleEndian>().map_err(|e| io_err("reading entry offset", e))?;
        entries.push((id, offset));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_nav_round_trips() {
        let dir = std::env::temp_dir().join(format!("navcore-test-{:p}", &0u8));
        let mesh = TileMesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            triangles: vec![[0, 1, 2]],
            area: vec![AreaFlag::Terrain],
        };
        let bounds = Bounds::empty_z((0.0, 0.0), (1.0, 1.0));
        write_tile_nav(&dir, "Azeroth", 32, 48, bounds, &mesh).unwrap();
        let read_back = read_tile_nav(&tile_nav_path(&dir, "Azeroth", 32, 48)).unwrap();
        assert_eq!(read_back.tile_x, 32);
        assert_eq!(read_back.tile_y, 48);
        assert_eq!(read_back.mesh.triangles, mesh.triangles);
        assert_eq!(read_back.mesh.vertices.len(), 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = std::env::temp_dir().join(format!("navcore-test-magic-{:p}", &0u8));
        fs::create_dir_all(dir.join("Nav/Azeroth")).unwrap();
        let path = tile_nav_path(&dir, "Azeroth", 1, 1);
        fs::write(&path, b"XXXX\x01\x00\x00\x00").unwrap();
        let err = read_tile_nav(&path).unwrap_err();
        assert!(matches!(err, NavError::Corrupt(_)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn map_index_round_trips() {
        let dir = std::env::temp_dir().join(format!("navcore-test-idx-{:p}", &0u8));
        let entries = vec![(0x1234u32, 0u64), (0xBEEF, 0)];
        write_map_index(&dir, "Azeroth", &entries).unwrap();
        let read_back = read_map_index(&dir, "Azeroth").unwrap();
        assert_eq!(read_back, entries);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bvh_covers_all_triangles() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
        ];
        let indices = vec![0, 1, 2, 1, 3, 2, 2, 3, 4, 3, 5, 4];
        let bvh = build_bvh(&vertices, &indices);
        assert_eq!(bvh.reordered_triangles.len(), 4);
        let leaf_triangle_total: u32 = bvh
            .nodes
            .iter()
            .filter(|n| n.left < 0 && n.right < 0)
            .map(|n| n.triangle_count)
            .sum();
        assert_eq!(leaf_triangle_total as usize, bvh.reordered_triangles.len());
    }
}
