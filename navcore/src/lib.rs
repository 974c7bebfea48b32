//! Map build pipeline and runtime query engine core.
//!
//! Parses the world's binary terrain/liquid/object/doodad files, assembles
//! per-tile geometry with cross-tile object identity, drives a bounded
//! parallel mesh builder feeding an external navmesh generator, serializes
//! the resulting artifacts, and answers path/height/line-of-sight queries
//! against them at runtime through a stable C ABI.

extern crate color_eyre;
extern crate derive_new;

/// Pulls in the `eyre` prelude the way every module in this crate reports
/// contextual, internal errors before they are converted to [`error::NavError`]
/// at a module boundary.
#[macro_export]
macro_rules! eyre_imports {
    () => {
        #[allow(unused_imports)]
        use color_eyre::eyre::{self, eyre, WrapErr};
    };
}

pub mod abi;
pub mod assembler;
pub mod blob;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod map;
pub mod mesh;
pub mod navgen;
pub mod orchestrator;
pub mod parsers;
pub mod reader;
pub mod runtime;
pub mod serializer;

pub use error::{NavCoreResult, NavError, NavResult};
