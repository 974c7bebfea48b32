//! WorldObject (WMO): a large, possibly-shared static mesh instance (§3).

use super::{Bounds, UniqueId};
use glam::Vec3;

/// Per-triangle area classification carried alongside a WMO's index buffer,
/// contributed by its group files' material flags (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangleMaterial {
    Solid,
    /// Render-only / not meant to be walked on (e.g. collision-disabled).
    NonWalkable,
}

/// A large static mesh placed in the world; baked into world space at load
/// time using its one placement's rotation/translation/scale (§3, §4.5).
/// May contain liquid and nested doodads.
pub struct WorldObject {
    pub unique_id: UniqueId,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub triangle_materials: Vec<TriangleMaterial>,
    pub liquid_vertices: Vec<Vec3>,
    pub liquid_indices: Vec<u32>,
    pub doodad_vertices: Vec<Vec3>,
    pub doodad_indices: Vec<u32>,
    pub bounds: Bounds,
}

impl WorldObject {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
