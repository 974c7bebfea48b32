//! Map Assembler (§4.5): per-tile loading with shared-object deduplication.
//!
//! Parses one tile's ADT, bakes every WMO/doodad placement it references
//! through the map's dedup index (§5's "lookup-then-insert atomic, losers
//! await completion" protocol, implemented in [`crate::map::Map`]), and
//! registers each baked object's footprint into the chunks it actually
//! touches, per the half-open edge rule (invariant 4).

use crate::error::NavCoreResult;
use crate::geometry::tile::Placement;
use crate::geometry::{Tile, TileCoord, WorldObject};
use crate::map::Map;
use crate::parsers::{adt, PlacementRaw};

fn raw_to_placement(raw: &PlacementRaw) -> Placement {
    Placement {
        unique_id: raw.unique_id,
        name_id: 0,
        position: raw.position,
        rotation_deg: raw.rotation_deg,
        scale: raw.scale,
        bounds: raw.bounds,
    }
}

/// Logical name of a global map's single root WorldObject: `World/Maps/
/// <Map>/<Map>.wmo`, mirroring the per-tile ADT naming convention in
/// [`adt::logical_name`].
pub fn global_wmo_logical_name(map_name: &str) -> String {
    format!("World/Maps/{map}/{map}.wmo", map = map_name)
}

/// True iff `map` has a top-level single WorldObject instead of a tile grid
/// (§4.4/§4.5).
pub fn is_global(map: &Map) -> bool {
    map.is_global()
}

/// Loads a global map's single root WorldObject (§4.4's `assemble_global`).
pub fn assemble_global(map: &Map, map_name: &str) -> NavCoreResult<std::sync::Arc<WorldObject>> {
    map.load_root_wmo(&global_wmo_logical_name(map_name))
}

/// Parses and assembles one tile: terrain/liquid/normals from its ADT, and
/// every WMO/doodad placement it references, resolved through the map's
/// dedup index and registered into the chunks whose footprint they actually
/// touch (§4.5).
pub fn assemble_tile(map: &Map, map_name: &str, coord: TileCoord) -> NavCoreResult<Tile> {
    let parsed = adt::parse_tile(map.blob(), map_name, coord)?;

    let mut tile = Tile::new(coord);
    tile.bounds.include_z(parsed.bounds.min.z);
    tile.bounds.include_z(parsed.bounds.max.z);

    for (row, chunk_row) in parsed.terrain.iter().enumerate() {
        for (col, terrain) in chunk_row.iter().enumerate() {
            let chunk = tile.chunk_mut(row, col);
            chunk.terrain_vertices = terrain.vertices.clone();
            chunk.surface_normals = terrain.normals.clone();
            chunk.hole_mask = terrain.hole_mask;
            chunk.build_terrain_indices();

            if let Some(liquid) = &parsed.liquid[row][col] {
                chunk.liquid_vertices = liquid.vertices.clone();
                chunk.liquid_indices = liquid.indices.clone();
            }
        }
    }

    for raw in &parsed.wmo_placements {
        let placement = raw_to_placement(raw);
        let wmo = map.get_or_load_wmo(&raw.asset_name, &placement)?;
        tile.register_object_footprint(placement.unique_id, &wmo.vertices, false);
        tile.wmo_placements.push(Placement {
            bounds: wmo.bounds,
            ..placement
        });
    }

    for raw in &parsed.doodad_placements {
        let placement = raw_to_placement(raw);
        let doodad = map.get_or_load_doodad(&raw.asset_name, &placement)?;
        tile.register_object_footprint(placement.unique_id, &doodad.vertices, true);
        tile.doodad_placements.push(placement);
    }

    Ok(tile)
}

/// Assembles the 3x3 neighborhood of `coord` (clipped to the grid, `coord`
/// itself excluded), skipping any neighbor tile that doesn't exist or fails
/// to parse. Used to gather one-tile halo geometry for a single-tile build
/// without treating a missing/corrupt neighbor as fatal (§9).
pub fn assemble_halo(map: &Map, map_name: &str, coord: TileCoord) -> Vec<Tile> {
    coord
        .neighborhood_3x3()
        .into_iter()
        .filter(|c| *c != coord)
        .filter_map(|c| assemble_tile(map, map_name, c).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobProvider;
    use crate::error::NavError;
    use std::sync::Arc;

    struct EmptyBlob;
    impl BlobProvider for EmptyBlob {
        fn open(&self, _logical_name: &str) -> NavCoreResult<Vec<u8>> {
            Err(NavError::NotFound("no fixtures in this environment".into()))
        }
    }

    #[test]
    fn missing_tile_surfaces_not_found() {
        let map = Map::new("Azeroth", Arc::new(EmptyBlob) as Arc<dyn BlobProvider>, false);
        let err = assemble_tile(&map, "Azeroth", TileCoord::new(32, 48)).unwrap_err();
        assert!(matches!(err, NavError::NotFound(_)));
    }

    #[test]
    fn halo_skips_missing_neighbors_without_failing() {
        let map = Map::new("Azeroth", Arc::new(EmptyBlob) as Arc<dyn BlobProvider>, false);
        let halo = assemble_halo(&map, "Azeroth", TileCoord::new(32, 48));
        assert!(halo.is_empty());
    }

    #[test]
    fn global_map_reports_is_global() {
        let map = Map::new("Azeroth", Arc::new(EmptyBlob) as Arc<dyn BlobProvider>, true);
        assert!(is_global(&map));
        assert!(assemble_global(&map, "Azeroth").is_err());
    }
}
