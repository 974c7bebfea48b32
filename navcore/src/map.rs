//! Map: the Tile/WorldObject/Doodad owner and its shared-object dedup index (§3, §5).
//!
//! Lookup-then-insert against the dedup index must be atomic against
//! concurrent workers (§5's shared-object load protocol): the winning
//! worker parses and bakes the object, losers await completion and read
//! the same result back. `DashMap` gives atomic entry access; the actual
//! "run once, others wait" behaviour comes from storing an
//! `Arc<OnceLock<...>>` per key (see DESIGN.md's C5 entry for the
//! index-then-bake split this generalizes from).

use crate::blob::BlobProvider;
use crate::error::NavCoreResult;
use crate::geometry::tile::Placement;
use crate::geometry::{Bounds, Doodad, UniqueId, WorldObject};
use crate::parsers::{apply_placement, euler_deg_to_mat3, m2, wmo};
use dashmap::DashMap;
use glam::Vec3;
use std::sync::{Arc, OnceLock};

type Cell<T> = Arc<OnceLock<NavCoreResult<Arc<T>>>>;

/// A named collection of Tiles (or, if [`Map::is_global`], a single root
/// WorldObject) plus the dedup index shared by every tile-assembly worker.
pub struct Map {
    name: String,
    blob: Arc<dyn BlobProvider>,
    global: bool,
    wmo_index: DashMap<UniqueId, Cell<WorldObject>>,
    doodad_index: DashMap<UniqueId, Cell<Doodad>>,
}

impl Map {
    pub fn new(name: impl Into<String>, blob: Arc<dyn BlobProvider>, global: bool) -> Self {
        Map {
            name: name.into(),
            blob,
            global,
            wmo_index: DashMap::new(),
            doodad_index: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn blob(&self) -> &dyn BlobProvider {
        self.blob.as_ref()
    }

    /// Resolves `placement.unique_id` to its baked world-space WorldObject,
    /// parsing and baking it at most once regardless of how many tiles or
    /// concurrent workers reference the same id (§5, scenario S4).
    pub fn get_or_load_wmo(
        &self,
        asset_name: &str,
        placement: &Placement,
    ) -> NavCoreResult<Arc<WorldObject>> {
        let cell = self
            .wmo_index
            .entry(placement.unique_id)
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();
        cell.get_or_init(|| bake_world_object(self.blob.as_ref(), placement.unique_id, asset_name, placement))
            .clone()
    }

    pub fn get_or_load_doodad(
        &self,
        asset_name: &str,
        placement: &Placement,
    ) -> NavCoreResult<Arc<Doodad>> {
        let cell = self
            .doodad_index
            .entry(placement.unique_id)
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();
        cell.get_or_init(|| bake_doodad(self.blob.as_ref(), placement.unique_id, asset_name, placement))
            .clone()
    }

    /// Loads the single root WorldObject of a global map (§4.4's
    /// `is_global`/`assemble_global`): not instanced via a placement list,
    /// so it never touches the dedup index.
    pub fn load_root_wmo(&self, asset_name: &str) -> NavCoreResult<Arc<WorldObject>> {
        let identity = Placement {
            unique_id: 0,
            name_id: 0,
            position: Vec3::ZERO,
            rotation_deg: Vec3::ZERO,
            scale: 1.0,
            bounds: Bounds::empty_z((0.0, 0.0), (0.0, 0.0)),
        };
        bake_world_object(self.blob.as_ref(), 0, asset_name, &identity)
    }

    pub fn wmo_unique_ids(&self) -> Vec<UniqueId> {
        self.wmo_index.iter().map(|e| *e.key()).collect()
    }

    pub fn loaded_wmo(&self, unique_id: UniqueId) -> Option<Arc<WorldObject>> {
        self.wmo_index
            .get(&unique_id)
            .and_then(|cell| cell.get().cloned())
            .and_then(|r| r.ok())
    }

    pub fn doodad_unique_ids(&self) -> Vec<UniqueId> {
        self.doodad_index.iter().map(|e| *e.key()).collect()
    }

    pub fn loaded_doodad(&self, unique_id: UniqueId) -> Option<Arc<Doodad>> {
        self.doodad_index
            .get(&unique_id)
            .and_then(|cell| cell.get().cloned())
            .and_then(|r| r.ok())
    }
}

fn bake_world_object(
    blob: &dyn BlobProvider,
    unique_id: UniqueId,
    asset_name: &str,
    placement: &Placement,
) -> NavCoreResult<Arc<WorldObject>> {
    let parsed = wmo::parse(blob, asset_name)?;
    let rotation = euler_deg_to_mat3(placement.rotation_deg);

    let vertices: Vec<Vec3> = parsed
        .vertices
        .iter()
        .map(|v| apply_placement(rotation, placement.scale, placement.position, *v))
        .collect();
    let liquid_vertices: Vec<Vec3> = parsed
        .liquid_vertices
        .iter()
        .map(|v| apply_placement(rotation, placement.scale, placement.position, *v))
        .collect();

    let mut doodad_vertices = Vec::new();
    let mut doodad_indices = Vec::new();
    for embedded in &parsed.embedded_doodads {
        let local = m2::parse(blob, &embedded.asset_name)?;
        let embedded_rotation = euler_deg_to_mat3(embedded.rotation_deg);
        let base = doodad_vertices.len() as u32;
        for v in &local.vertices {
            let in_wmo_space = apply_placement(embedded_rotation, embedded.scale, embedded.position, *v);
            doodad_vertices.push(apply_placement(
                rotation,
                placement.scale,
                placement.position,
                in_wmo_space,
            ));
        }
        doodad_indices.extend(local.indices.iter().map(|i| i + base));
    }

    let bounds = Bounds::from_points(
        vertices
            .iter()
            .chain(liquid_vertices.iter())
            .chain(doodad_vertices.iter())
            .copied(),
    )
    .unwrap_or(placement.bounds);

    Ok(Arc::new(WorldObject {
        unique_id,
        vertices,
        indices: parsed.indices,
        triangle_materials: parsed.materials,
        liquid_vertices,
        liquid_indices: parsed.liquid_indices,
        doodad_vertices,
        doodad_indices,
        bounds,
    }))
}

fn bake_doodad(
    blob: &dyn BlobProvider,
    unique_id: UniqueId,
    asset_name: &str,
    placement: &Placement,
) -> NavCoreResult<Arc<Doodad>> {
    let parsed = m2::parse(blob, asset_name)?;
    let rotation = euler_deg_to_mat3(placement.rotation_deg);
    let vertices: Vec<Vec3> = parsed
        .vertices
        .iter()
        .map(|v| apply_placement(rotation, placement.scale, placement.position, *v))
        .collect();

    let (mut min_z, mut max_z) = (f32::MAX, f32::MIN);
    for v in &vertices {
        min_z = min_z.min(v.z);
        max_z = max_z.max(v.z);
    }

    Ok(Arc::new(Doodad {
        unique_id,
        vertices,
        indices: parsed.indices,
        min_z,
        max_z,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBlob {
        calls: AtomicUsize,
    }
    impl BlobProvider for CountingBlob {
        fn open(&self, _logical_name: &str) -> NavCoreResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NavError::NotFound("stub blob, always fails".into()))
        }
    }

    #[test]
    fn concurrent_dedup_loads_shared_wmo_exactly_once() {
        let counting = Arc::new(CountingBlob {
            calls: AtomicUsize::new(0),
        });
        let blob: Arc<dyn BlobProvider> = counting.clone();
        let map = Arc::new(Map::new("Azeroth", blob, false));
        let placement = Placement {
            unique_id: 0x1234,
            name_id: 1,
            position: Vec3::ZERO,
            rotation_deg: Vec3::ZERO,
            scale: 1.0,
            bounds: Bounds::empty_z((0.0, 0.0), (1.0, 1.0)),
        };

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let map = map.clone();
                let placement = placement.clone();
                std::thread::spawn(move || map.get_or_load_wmo("World/wmo/Foo.wmo", &placement))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_err());
        }

        // Every one of the 8 workers observed the same failed result without
        // each independently retrying the open: exactly one call reached the
        // blob provider for this unique_id (scenario S4).
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }
}
