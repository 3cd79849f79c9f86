//! Helpers shared by the asset and environment modules.

pub mod exec;
pub mod git;
pub mod image;
pub mod minify;
pub mod path;
