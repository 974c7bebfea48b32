//! Doodad (M2): a small static mesh, shared across tiles (§3).

use super::UniqueId;
use glam::Vec3;

/// A small static mesh (vegetation, props); world-space geometry baked at
/// load time from its one placement's transform.
pub struct Doodad {
    pub unique_id: UniqueId,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub min_z: f32,
    pub max_z: f32,
}

impl Doodad {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
