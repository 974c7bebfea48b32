//! World-scale constants shared by parsing, geometry, and coordinate math.

/// Side length of one tile, in world units.
pub const TILE_SIZE: f32 = 533.333_33;

/// Tiles per side of the map grid.
pub const TILES_PER_SIDE: u32 = 64;

/// Chunks per side of a tile.
pub const CHUNKS_PER_TILE: u32 = 16;

/// Side length of one chunk, in world units.
pub const CHUNK_SIZE: f32 = TILE_SIZE / CHUNKS_PER_TILE as f32;

/// Quads per side of a chunk's height-sample lattice.
pub const QUADS_PER_CHUNK_SIDE: u32 = 8;

/// Outer (full-resolution) samples per side of a chunk: 9x9.
pub const OUTER_VERTS_PER_SIDE: u32 = QUADS_PER_CHUNK_SIDE + 1;

/// Inner (quad-center) samples per side of a chunk: 8x8.
pub const INNER_VERTS_PER_SIDE: u32 = QUADS_PER_CHUNK_SIDE;

/// Total height samples per chunk: 9*9 + 8*8.
pub const VERTS_PER_CHUNK: usize =
    (OUTER_VERTS_PER_SIDE * OUTER_VERTS_PER_SIDE + INNER_VERTS_PER_SIDE * INNER_VERTS_PER_SIDE)
        as usize;

/// Triangles emitted per non-holed quad (four triangles fanned around centre).
pub const TRIANGLES_PER_QUAD: usize = 4;

/// Max triangles a fully-solid chunk's terrain can contain.
pub const MAX_TERRAIN_TRIANGLES_PER_CHUNK: usize =
    TRIANGLES_PER_QUAD * (QUADS_PER_CHUNK_SIDE * QUADS_PER_CHUNK_SIDE) as usize;
