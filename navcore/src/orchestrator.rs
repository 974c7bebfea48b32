//! Build Orchestrator (§4.7, §5): parallel workers consuming a shared FIFO
//! of tile jobs, coordinated only through the job queue, the map's dedup
//! index, and a final join barrier. No operation within a worker suspends:
//! a job completes or fails atomically.

use crate::assembler;
use crate::error::{NavCoreResult, NavError};
use crate::geometry::{Tile, TileCoord};
use crate::map::Map;
use crate::mesh;
use crate::navgen::{NavGenConfig, NavmeshGenerator};
use crate::serializer;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How often the main thread polls worker liveness (§5).
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct BuildConfig {
    pub map_name: String,
    pub out_dir: PathBuf,
    pub jobs: usize,
    /// `Some((x, y))`: build exactly this tile (loading its 3x3 neighborhood
    /// for halo geometry, serializing only the requested tile, per §9's
    /// Open Question resolution). `None`: build every tile in the grid.
    pub requested_tile: Option<(u8, u8)>,
    pub navgen_config: NavGenConfig,
}

pub struct BuildReport {
    pub tiles_built: Vec<TileCoord>,
    pub tiles_failed: Vec<(TileCoord, String)>,
}

/// Runs a full build against `map`: either the single global WorldObject job
/// or the tile-grid job queue, per `cfg`. Spawns `cfg.jobs.max(1)` worker
/// threads; the calling thread polls their liveness at `POLL_INTERVAL` and
/// only touches `map` again (to serialize the final map-level index) once
/// every worker has exited (§5).
pub fn run(
    map: Arc<Map>,
    cfg: BuildConfig,
    navgen: Arc<dyn NavmeshGenerator>,
) -> NavCoreResult<BuildReport> {
    if map.is_global() {
        return run_global(&map, &cfg, navgen.as_ref());
    }

    let queue: VecDeque<TileCoord> = match cfg.requested_tile {
        Some((x, y)) => {
            if !TileCoord::in_range(x as i32, y as i32) {
                return Err(NavError::OutOfRange(format!(
                    "requested tile ({x}, {y}) outside the 64x64 grid"
                )));
            }
            VecDeque::from([TileCoord::new(x, y)])
        }
        None => {
            let mut all = VecDeque::new();
            for y in 0..64u8 {
                for x in 0..64u8 {
                    all.push_back(TileCoord::new(x, y));
                }
            }
            all
        }
    };

    let queue = Arc::new(Mutex::new(queue));
    let results: Arc<Mutex<Vec<(TileCoord, Result<(), NavError>)>>> = Arc::new(Mutex::new(Vec::new()));

    let worker_count = cfg.jobs.max(1);
    let map_name: Arc<str> = Arc::from(cfg.map_name.as_str());
    let out_dir: Arc<PathBuf> = Arc::new(cfg.out_dir.clone());
    let navgen_cfg = cfg.navgen_config;

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let map = map.clone();
        let queue = queue.clone();
        let results = results.clone();
        let map_name = map_name.clone();
        let out_dir = out_dir.clone();
        let navgen = navgen.clone();
        handles.push(std::thread::spawn(move || {
            worker_loop(
                map.as_ref(),
                map_name.as_ref(),
                queue.as_ref(),
                out_dir.as_ref(),
                navgen.as_ref(),
                &navgen_cfg,
                results.as_ref(),
            );
        }));
    }

    // The main thread touches no Map state until every worker has exited.
    while handles.iter().any(|h| !h.is_finished()) {
        std::thread::sleep(POLL_INTERVAL);
    }
    for h in handles {
        // A worker only panics on a bug in this crate; propagate it rather
        // than silently dropping tiles it may have been mid-way through.
        if h.join().is_err() {
            return Err(NavError::Internal("a build worker panicked".into()));
        }
    }

    let results = Arc::try_unwrap(results).unwrap_or_else(|a| Mutex::new(a.lock().clone())).into_inner();
    let mut tiles_built = Vec::new();
    let mut tiles_failed = Vec::new();
    for (coord, outcome) in results {
        match outcome {
            Ok(()) => tiles_built.push(coord),
            Err(e) => tiles_failed.push((coord, e.to_string())),
        }
    }

    write_map_index(&map, &cfg.out_dir, &cfg.map_name)?;

    Ok(BuildReport {
        tiles_built,
        tiles_failed,
    })
}

fn run_global(
    map: &Map,
    cfg: &BuildConfig,
    navgen: &dyn NavmeshGenerator,
) -> NavCoreResult<BuildReport> {
    let wmo = assembler::assemble_global(map, &cfg.map_name)?;
    let mesh_input = mesh::build_mesh_for_global(&wmo);
    let tile_mesh = navgen.build(&mesh_input, wmo.bounds, &cfg.navgen_config)?;
    let (gx, gy) = serializer::GLOBAL_TILE_COORD;
    serializer::write_tile_nav(&cfg.out_dir, &cfg.map_name, gx, gy, wmo.bounds, &tile_mesh)?;
    write_map_index(map, &cfg.out_dir, &cfg.map_name)?;

    Ok(BuildReport {
        tiles_built: Vec::new(),
        tiles_failed: Vec::new(),
    })
}

fn worker_loop(
    map: &Map,
    map_name: &str,
    queue: &Mutex<VecDeque<TileCoord>>,
    out_dir: &Path,
    navgen: &dyn NavmeshGenerator,
    navgen_cfg: &NavGenConfig,
    results: &Mutex<Vec<(TileCoord, Result<(), NavError>)>>,
) {
    loop {
        let job = queue.lock().pop_front();
        let Some(coord) = job else { break };
        let outcome = build_one_tile(map, map_name, coord, out_dir, navgen, navgen_cfg);
        results.lock().push((coord, outcome));
    }
}

fn build_one_tile(
    map: &Map,
    map_name: &str,
    coord: TileCoord,
    out_dir: &Path,
    navgen: &dyn NavmeshGenerator,
    navgen_cfg: &NavGenConfig,
) -> NavCoreResult<()> {
    let tile = assembler::assemble_tile(map, map_name, coord)?;
    let halo = assembler::assemble_halo(map, map_name, coord);
    let halo_refs: Vec<&Tile> = halo.iter().collect();

    let mesh_input = mesh::build_mesh_for_tile(map, &tile, &halo_refs);
    let tile_mesh = navgen.build(&mesh_input, tile.bounds, navgen_cfg)?;
    serializer::write_tile_nav(
        out_dir,
        map_name,
        coord.x as i32,
        coord.y as i32,
        tile.bounds,
        &tile_mesh,
    )?;
    Ok(())
}

/// Writes the final map-level BVH index once every worker has exited: one
/// `.bvh` file plus an index entry per shared WorldObject the map's dedup
/// index accumulated during the build (§4.7, §4.9).
fn write_map_index(map: &Map, out_dir: &Path, map_name: &str) -> NavCoreResult<()> {
    let mut entries = Vec::new();
    for unique_id in map.wmo_unique_ids() {
        if let Some(wmo) = map.loaded_wmo(unique_id) {
            serializer::write_wmo_bvh(out_dir, &wmo)?;
            entries.push((unique_id, 0u64));
        }
    }
    serializer::write_map_index(out_dir, map_name, &entries)
}
