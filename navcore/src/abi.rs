//! C ABI Surface (§4.11, §6, §7): a flat `extern "C"` facade over the
//! [`crate::runtime::RuntimeMap`] query operations.
//!
//! Every function here is `#[no_mangle] pub extern "C"`, wraps its safe
//! counterpart in [`std::panic::catch_unwind`], and translates any error or
//! caught panic into [`NavResult::Internal`] — the ABI is panic-free by
//! construction. The caller owns every buffer it passes in; this library
//! owns the opaque `AbiMap*` handle until [`free_map`].

use crate::error::{NavError, NavResult};
use crate::runtime::RuntimeMap;
use derive_new::new;
use glam::Vec3;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Opaque handle returned by [`new_map`]; never constructed on the C side.
pub struct AbiMap(RuntimeMap);

/// A C-layout 3D point, matching `struct Vertex { float x, y, z; }` (§6).
/// `Pod`/`Zeroable` make it safe to hand slices of these straight across
/// the ABI boundary without per-element marshalling.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, new, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vertex {
    fn from(v: Vec3) -> Self {
        Vertex { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Vertex> for Vec3 {
    fn from(v: Vertex) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

fn catch<F: FnOnce() -> NavResult>(f: F) -> NavResult {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(NavResult::Internal)
}

/// # Safety
/// `ptr` must be either null or a valid, non-dangling C string pointer.
unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, NavError> {
    if ptr.is_null() {
        return Err(NavError::Internal("null string pointer".into()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| NavError::Internal(format!("non-UTF8 string argument: {e}")))
}

/// Opens a map for querying. Writes the outcome to `*out_result` and
/// returns the handle on success, or null on any failure (§6 scenario S1).
///
/// # Safety
/// `data_path` and `map_name` must be valid, NUL-terminated C strings.
/// `out_result`, if non-null, must point to writable `NavResult` storage.
#[no_mangle]
pub unsafe extern "C" fn new_map(
    data_path: *const c_char,
    map_name: *const c_char,
    out_result: *mut NavResult,
) -> *mut AbiMap {
    let mut result = NavResult::Ok;
    let handle = panic::catch_unwind(AssertUnwindSafe(|| -> Result<AbiMap, NavError> {
        let data_path = cstr_to_str(data_path)?;
        let map_name = cstr_to_str(map_name)?;
        RuntimeMap::open(data_path, map_name).map(AbiMap)
    }))
    .unwrap_or(Err(NavError::Internal("panic in new_map".into())));

    let out = match handle {
        Ok(map) => {
            result = NavResult::Ok;
            Box::into_raw(Box::new(map))
        }
        Err(e) => {
            result = NavResult::from(&e);
            ptr::null_mut()
        }
    };
    if !out_result.is_null() {
        *out_result = result;
    }
    out
}

/// Releases a map handle. Safe to call with a null pointer.
///
/// # Safety
/// `map` must be either null or a pointer previously returned by [`new_map`]
/// and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn free_map(map: *mut AbiMap) {
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        if !map.is_null() {
            drop(Box::from_raw(map));
        }
    }));
}

/// # Safety
/// `map` must be a live pointer returned by [`new_map`].
#[no_mangle]
pub unsafe extern "C" fn map_is_global(map: *const AbiMap) -> bool {
    if map.is_null() {
        return false;
    }
    (*map).0.is_global()
}

/// Loads every available tile (or the single global tile) up front.
///
/// # Safety
/// `map` must be a live pointer returned by [`new_map`].
#[no_mangle]
pub unsafe extern "C" fn load_all_tiles(map: *mut AbiMap) -> NavResult {
    if map.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| match map.0.load_all_tiles() {
        Ok(_) => NavResult::Ok,
        Err(e) => NavResult::from(&e),
    })
}

/// Loads tile `(x, y)` if not already loaded. Idempotent.
///
/// # Safety
/// `map` must be a live pointer returned by [`new_map`].
#[no_mangle]
pub unsafe extern "C" fn load_tile(map: *mut AbiMap, x: u8, y: u8) -> NavResult {
    if map.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| match map.0.load_tile(x, y) {
        Ok(()) => NavResult::Ok,
        Err(e) => NavResult::from(&e),
    })
}

/// # Safety
/// `map` must be a live pointer returned by [`new_map`]; `out_zone` and
/// `out_area`, if non-null, must point to writable `u32` storage.
#[no_mangle]
pub unsafe extern "C" fn get_zone_and_area(
    map: *const AbiMap,
    x: f32,
    y: f32,
    z: f32,
    out_zone: *mut u32,
    out_area: *mut u32,
) -> NavResult {
    if map.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| match map.0.get_zone_and_area(x, y, z) {
        Ok((zone, area)) => {
            if !out_zone.is_null() {
                *out_zone = zone;
            }
            if !out_area.is_null() {
                *out_area = area;
            }
            NavResult::Ok
        }
        Err(e) => NavResult::from(&e),
    })
}

/// Finds a path from `from` to `to`, writing up to `cap` waypoints into
/// `out` and the true waypoint count into `*out_count`. If the true count
/// exceeds `cap`, returns `TooSmall` with `*out_count` set and `out`
/// untouched (§6/§8 scenario S5).
///
/// # Safety
/// `map` must be a live pointer returned by [`new_map`]; `out` must be
/// valid for `cap` writes of `Vertex`; `out_count` must point to writable
/// `u32` storage.
#[no_mangle]
pub unsafe extern "C" fn find_path(
    map: *const AbiMap,
    from: Vertex,
    to: Vertex,
    out: *mut Vertex,
    cap: u32,
    out_count: *mut u32,
) -> NavResult {
    if map.is_null() || out_count.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| {
        let mut buf = vec![Vec3::ZERO; cap as usize];
        match map.0.find_path(from.into(), to.into(), &mut buf) {
            Ok(count) => {
                *out_count = count as u32;
                if !out.is_null() && count > 0 {
                    let slice = std::slice::from_raw_parts_mut(out, count);
                    for (dst, src) in slice.iter_mut().zip(buf.iter()) {
                        *dst = Vertex::from(*src);
                    }
                }
                NavResult::Ok
            }
            Err(NavError::TooSmall { needed }) => {
                *out_count = needed as u32;
                NavResult::TooSmall
            }
            Err(e) => NavResult::from(&e),
        }
    })
}

/// Writes up to `cap` Z surfaces at `(x, y)`, top-down, into `out`, and the
/// true count into `*out_count`. `TooSmall` leaves `out` untouched.
///
/// # Safety
/// `map` must be a live pointer returned by [`new_map`]; `out` must be
/// valid for `cap` writes of `f32`; `out_count` must point to writable
/// `u32` storage.
#[no_mangle]
pub unsafe extern "C" fn find_heights(
    map: *const AbiMap,
    x: f32,
    y: f32,
    out: *mut f32,
    cap: u32,
    out_count: *mut u32,
) -> NavResult {
    if map.is_null() || out_count.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| {
        let mut buf = vec![0f32; cap as usize];
        match map.0.find_heights(x, y, &mut buf) {
            Ok(count) => {
                *out_count = count as u32;
                if !out.is_null() && count > 0 {
                    let slice = std::slice::from_raw_parts_mut(out, count);
                    slice.copy_from_slice(&buf[..count]);
                }
                NavResult::Ok
            }
            Err(NavError::TooSmall { needed }) => {
                *out_count = needed as u32;
                NavResult::TooSmall
            }
            Err(e) => NavResult::from(&e),
        }
    })
}

/// # Safety
/// `map` must be a live pointer returned by [`new_map`]; `out_z` must point
/// to writable `f32` storage.
#[no_mangle]
pub unsafe extern "C" fn find_height(
    map: *const AbiMap,
    from: Vertex,
    to_x: f32,
    to_y: f32,
    out_z: *mut f32,
) -> NavResult {
    if map.is_null() || out_z.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| match map.0.find_height(from.into(), (to_x, to_y)) {
        Ok(z) => {
            *out_z = z;
            NavResult::Ok
        }
        Err(e) => NavResult::from(&e),
    })
}

/// # Safety
/// `map` must be a live pointer returned by [`new_map`]; `out_visible` must
/// point to writable `bool` storage.
#[no_mangle]
pub unsafe extern "C" fn line_of_sight(
    map: *const AbiMap,
    from: Vertex,
    to: Vertex,
    include_doodads: bool,
    out_visible: *mut bool,
) -> NavResult {
    if map.is_null() || out_visible.is_null() {
        return NavResult::Internal;
    }
    let map = &*map;
    catch(|| match map.0.line_of_sight(from.into(), to.into(), include_doodads) {
        Ok(visible) => {
            *out_visible = visible;
            NavResult::Ok
        }
        Err(e) => NavResult::from(&e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn new_map_on_missing_path_is_not_found_and_null() {
        let data_path = CString::new("/nonexistent/path/for/sure").unwrap();
        let map_name = CString::new("Azeroth").unwrap();
        let mut result = NavResult::Ok;
        let handle = unsafe { new_map(data_path.as_ptr(), map_name.as_ptr(), &mut result) };
        assert_eq!(result, NavResult::NotFound);
        assert!(handle.is_null());
        unsafe { free_map(handle) };
    }

    #[test]
    fn free_map_on_null_is_a_no_op() {
        unsafe { free_map(ptr::null_mut()) };
    }

    #[test]
    fn find_path_undersized_buffer_reports_too_small_without_writing() {
        let dir = std::env::temp_dir().join("navcore-abi-test-path");
        let mesh = crate::navgen::TileMesh {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2], [1, 3, 2]],
            area: vec![crate::mesh::AreaFlag::Terrain, crate::mesh::AreaFlag::Terrain],
        };
        crate::serializer::write_tile_nav(
            &dir,
            "Azeroth",
            32,
            48,
            crate::geometry::Bounds::empty_z((-1.0, -1.0), (2.0, 2.0)),
            &mesh,
        )
        .unwrap();

        let data_path = CString::new(dir.to_str().unwrap()).unwrap();
        let map_name = CString::new("Azeroth").unwrap();
        let mut result = NavResult::Ok;
        let handle = unsafe { new_map(data_path.as_ptr(), map_name.as_ptr(), &mut result) };
        assert_eq!(result, NavResult::Ok);
        assert!(!handle.is_null());
        assert_eq!(unsafe { load_tile(handle, 32, 48) }, NavResult::Ok);

        let from = Vertex { x: 0.1, y: 0.1, z: 0.0 };
        let to = Vertex { x: 0.9, y: 0.9, z: 0.0 };
        let mut out = [Vertex::default(); 1];
        let mut count = 0u32;
        let r = unsafe { find_path(handle, from, to, out.as_mut_ptr(), 1, &mut count) };
        assert_eq!(r, NavResult::TooSmall);
        assert!(count > 1);
        assert_eq!(out[0].x, 0.0);
        assert_eq!(out[0].y, 0.0);

        unsafe { free_map(handle) };
        let _ = std::fs::remove_dir_all(&dir);
    }
}
