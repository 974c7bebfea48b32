//! Doodad (M2) parser: collision geometry for a small static mesh (§3, §4.3).
//!
//! Real M2 files separate animation/skin data from the "physics"/collision
//! mesh; this parser reads only the latter, carried here as a single
//! `MD2C` chunk (vertices + triangle indices), which is what the build
//! pipeline actually consumes (see module docs in [`super::adt`] on why
//! sub-chunk layouts here are this crate's own self-consistent scheme).

use crate::blob::BlobProvider;
use crate::error::{NavCoreResult, NavError};
use crate::reader::{ByteReader, FourCC};
use glam::Vec3;

const TAG_MD2C: FourCC = FourCC::new(b"MD2C");

pub struct ParsedDoodad {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

pub fn parse(blob: &dyn BlobProvider, asset_name: &str) -> NavCoreResult<ParsedDoodad> {
    let bytes = blob.open(asset_name)?;
    let mut reader = ByteReader::new(&bytes);

    for chunk in reader.chunks() {
        let (tag, mut payload) = chunk?;
        if tag == TAG_MD2C {
            let vertex_count = payload.read_u32()? as usize;
            let mut vertices = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                vertices.push(payload.read_vec3()?);
            }
            let index_count = payload.read_u32()? as usize;
            let mut indices = Vec::with_capacity(index_count);
            for _ in 0..index_count {
                indices.push(payload.read_u32()?);
            }
            return Ok(ParsedDoodad { vertices, indices });
        }
    }

    Err(NavError::Corrupt(format!(
        "{asset_name}: no MD2C collision chunk present"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobProvider;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;

    struct FixedBlob(Vec<u8>);
    impl BlobProvider for FixedBlob {
        fn open(&self, _logical_name: &str) -> NavCoreResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn encode_fixture() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(3).unwrap(); // vertex_count
        for v in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            payload.write_f32::<LittleEndian>(v.x).unwrap();
            payload.write_f32::<LittleEndian>(v.y).unwrap();
            payload.write_f32::<LittleEndian>(v.z).unwrap();
        }
        payload.write_u32::<LittleEndian>(3).unwrap(); // index_count
        for i in [0u32, 1, 2] {
            payload.write_u32::<LittleEndian>(i).unwrap();
        }

        let mut out = Vec::new();
        out.write_all(&TAG_MD2C.0).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_all(&payload).unwrap();
        out
    }

    #[test]
    fn parses_single_triangle_fixture() {
        let blob = FixedBlob(encode_fixture());
        let parsed = parse(&blob, "creature/Rabbit/Rabbit.m2").unwrap();
        assert_eq!(parsed.vertices.len(), 3);
        assert_eq!(parsed.indices, vec![0, 1, 2]);
    }

    #[test]
    fn missing_chunk_is_corrupt() {
        let blob = FixedBlob(Vec::new());
        let err = parse(&blob, "creature/Rabbit/Rabbit.m2").unwrap_err();
        assert!(matches!(err, NavError::Corrupt(_)));
    }
}
