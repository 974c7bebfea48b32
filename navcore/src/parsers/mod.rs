//! Input parsers: one per file class, all sharing the chunked container format (§4.3).
//!
//! Parsers are pure functions of `(&dyn BlobProvider, context) -> Result<_,
//! NavError>`; they never touch the filesystem directly, and never write
//! anything — all output serialization lives in [`crate::serializer`].

pub mod adt;
pub mod m2;
pub mod wmo;

use crate::geometry::{Bounds, UniqueId};
use glam::{Mat3, Vec3};

/// A raw (unresolved) placement record as read straight from MDDF/MODF,
/// before the referenced asset has been loaded and baked into world space.
#[derive(Clone, Debug)]
pub struct PlacementRaw {
    pub unique_id: UniqueId,
    pub asset_name: String,
    pub position: Vec3,
    pub rotation_deg: Vec3,
    pub scale: f32,
    /// Coarse bounds, used only to cull halo geometry before the referenced
    /// asset is actually loaded (§4.6). WMOs get real bounds from MODF's
    /// extents; doodads (MDDF carries none) get a conservative padded box
    /// around `position`.
    pub bounds: Bounds,
}

/// Conservative doodad placement padding used to build a coarse bounds box
/// when the file format itself carries none (see [`PlacementRaw::bounds`]).
pub const DOODAD_PLACEMENT_PADDING: f32 = 50.0;

/// Converts an Euler rotation in degrees (as stored in MDDF/MODF/MODD) to a
/// rotation matrix, applied Z * Y * X the way the reference placement math
/// composes doodad/WMO orientation.
pub fn euler_deg_to_mat3(rotation_deg: Vec3) -> Mat3 {
    let to_rad = |d: f32| d.to_radians();
    Mat3::from_rotation_z(to_rad(rotation_deg.z))
        * Mat3::from_rotation_y(to_rad(rotation_deg.y))
        * Mat3::from_rotation_x(to_rad(rotation_deg.x))
}

/// Transforms a local-space vertex into world space given a placement's
/// rotation, uniform scale, and translation.
pub fn apply_placement(rotation: Mat3, scale: f32, translation: Vec3, local: Vec3) -> Vec3 {
    translation + rotation * (local * scale)
}
