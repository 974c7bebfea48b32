//! WorldObject (WMO) parser: root file + its group files (§4.3).
//!
//! As with [`super::adt`], the root/group sub-chunk layouts below (`MOHD`'s
//! leading group count, `MOGP`'s nested `MOPY`/`MOVT`/`MOVI`/`MLIQ`, `MODD`'s
//! embedded-doodad record) are this crate's own self-consistent scheme: no
//! fixture data exists in this environment to validate an exact reproduction
//! against, so the parser is built to uphold the invariants in §3/§8 rather
//! than to match an unverifiable wire format bit-for-bit.

use crate::blob::BlobProvider;
use crate::error::NavCoreResult;
use crate::geometry::object::TriangleMaterial;
use crate::reader::{ByteReader, FourCC};
use glam::Vec3;

const TAG_MOHD: FourCC = FourCC::new(b"MOHD");
const TAG_MODN: FourCC = FourCC::new(b"MODN");
const TAG_MODD: FourCC = FourCC::new(b"MODD");
const TAG_MOGP: FourCC = FourCC::new(b"MOGP");
const TAG_MOPY: FourCC = FourCC::new(b"MOPY");
const TAG_MOVT: FourCC = FourCC::new(b"MOVT");
const TAG_MOVI: FourCC = FourCC::new(b"MOVI");
const TAG_MLIQ: FourCC = FourCC::new(b"MLIQ");

const MODD_ENTRY_SIZE: usize = 32;
const MOPY_ENTRY_SIZE: usize = 2;

/// Bit in a `MOPY` entry's flags byte marking a triangle as non-walkable
/// (collision-disabled render geometry).
const MATERIAL_FLAG_NO_COLLISION: u8 = 0x04;

/// A doodad nested inside a WMO, placed relative to the WMO's own local
/// space (baked to world space once the WMO's own placement is known).
pub struct EmbeddedDoodad {
    pub asset_name: String,
    pub position: Vec3,
    pub rotation_deg: Vec3,
    pub scale: f32,
}

#[derive(Default)]
pub struct ParsedWmo {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub materials: Vec<TriangleMaterial>,
    pub liquid_vertices: Vec<Vec3>,
    pub liquid_indices: Vec<u32>,
    pub embedded_doodads: Vec<EmbeddedDoodad>,
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

fn group_file_name(root_name: &str, index: u32) -> String {
    format!("{}_{:03}.wmo", strip_extension(root_name), index)
}

pub fn parse(blob: &dyn BlobProvider, asset_name: &str) -> NavCoreResult<ParsedWmo> {
    let root_bytes = blob.open(asset_name)?;
    let mut reader = ByteReader::new(&root_bytes);

    let mut group_count = 0u32;
    let mut doodad_names: Vec<String> = Vec::new();
    let mut embedded_doodads = Vec::new();

    for chunk in reader.chunks() {
        let (tag, mut payload) = chunk?;
        if tag == TAG_MOHD {
            group_count = payload.read_u32()?;
        } else if tag == TAG_MODN {
            doodad_names = payload.read_cstring_list()?;
        } else if tag == TAG_MODD {
            while payload.remaining() >= MODD_ENTRY_SIZE {
                embedded_doodads.push(read_modd_entry(&mut payload, &doodad_names)?);
            }
        }
    }

    let mut merged = ParsedWmo {
        embedded_doodads,
        ..ParsedWmo::default()
    };

    for group_index in 0..group_count {
        let group_name = group_file_name(asset_name, group_index);
        let group_bytes = blob.open(&group_name)?;
        append_group(&group_bytes, &mut merged)?;
    }

    Ok(merged)
}

fn append_group(group_bytes: &[u8], merged: &mut ParsedWmo) -> NavCoreResult<()> {
    let mut reader = ByteReader::new(group_bytes);
    for chunk in reader.chunks() {
        let (tag, mut payload) = chunk?;
        if tag == TAG_MOGP {
            parse_mogp(&mut payload, merged)?;
        }
    }
    Ok(())
}

fn parse_mogp(payload: &mut ByteReader, merged: &mut ParsedWmo) -> NavCoreResult<()> {
    let base_vertex = merged.vertices.len() as u32;
    let mut materials = Vec::new();
    let mut local_vertices = Vec::new();
    let mut local_indices = Vec::new();

    for chunk in payload.chunks() {
        let (tag, mut sub) = chunk?;
        if tag == TAG_MOPY {
            while sub.remaining() >= MOPY_ENTRY_SIZE {
                let flags = sub.read_u8()?;
                let _material_id = sub.read_u8()?;
                materials.push(if flags & MATERIAL_FLAG_NO_COLLISION != 0 {
                    TriangleMaterial::NonWalkable
                } else {
                    TriangleMaterial::Solid
                });
            }
        } else if tag == TAG_MOVT {
            while sub.remaining() >= 12 {
                local_vertices.push(sub.read_vec3()?);
            }
        } else if tag == TAG_MOVI {
            while sub.remaining() >= 6 {
                let a = sub.read_u16()? as u32;
                let b = sub.read_u16()? as u32;
                let c = sub.read_u16()? as u32;
                local_indices.push(a);
                local_indices.push(b);
                local_indices.push(c);
            }
        } else if tag == TAG_MLIQ {
            let (liquid_vertices, liquid_indices) = parse_mliq(&mut sub)?;
            let liquid_base = merged.liquid_vertices.len() as u32;
            merged.liquid_vertices.extend(liquid_vertices);
            merged
                .liquid_indices
                .extend(liquid_indices.into_iter().map(|i| i + liquid_base));
        }
    }

    let triangle_count = local_indices.len() / 3;
    if materials.len() < triangle_count {
        materials.resize(triangle_count, TriangleMaterial::Solid);
    }

    merged.vertices.extend(local_vertices);
    merged
        .indices
        .extend(local_indices.into_iter().map(|i| i + base_vertex));
    merged.materials.extend(materials);
    Ok(())
}

/// `MLIQ`: a width x height quad grid of liquid, one vertex-height sample
/// per lattice point and a render bit per quad (mirrors the ADT legacy
/// liquid encoding, scoped to one WMO group).
fn parse_mliq(r: &mut ByteReader) -> NavCoreResult<(Vec<Vec3>, Vec<u32>)> {
    let width = r.read_u32()? as usize;
    let height = r.read_u32()? as usize;
    let base = r.read_vec3()?;

    let verts_w = width + 1;
    let verts_h = height + 1;
    let mut heights = vec![0f32; verts_w * verts_h];
    for h in heights.iter_mut() {
        *h = r.read_f32()?;
    }
    let mut render = vec![false; width * height];
    for cell in render.iter_mut() {
        *cell = r.read_u8()? != 0;
    }

    let sample = |x: usize, y: usize| -> Vec3 {
        Vec3::new(base.x + x as f32, base.y + y as f32, base.z + heights[y * verts_w + x])
    };

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if !render[y * width + x] {
                continue;
            }
            let b = vertices.len() as u32;
            vertices.push(sample(x, y));
            vertices.push(sample(x + 1, y));
            vertices.push(sample(x, y + 1));
            vertices.push(sample(x + 1, y + 1));
            indices.extend_from_slice(&[b, b + 2, b + 1, b + 2, b + 3, b + 1]);
        }
    }
    Ok((vertices, indices))
}

fn read_modd_entry(r: &mut ByteReader, names: &[String]) -> NavCoreResult<EmbeddedDoodad> {
    let name_id = r.read_u32()?;
    let position = r.read_vec3()?;
    let rotation_deg = r.read_vec3()?;
    let scale_fixed = r.read_u16()?;
    let _flags = r.read_u16()?;

    let asset_name = names
        .get(name_id as usize)
        .cloned()
        .unwrap_or_else(|| format!("<unknown embedded doodad name_id {name_id}>"));

    Ok(EmbeddedDoodad {
        asset_name,
        position,
        rotation_deg,
        scale: scale_fixed as f32 / 1024.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_file_naming_replaces_extension() {
        assert_eq!(group_file_name("World/wmo/Dungeon/Foo.wmo", 7), "World/wmo/Dungeon/Foo_007.wmo");
    }
}
