//! Path safety checks for user-controlled relative paths.
//!
//! Paths coming from a site's config are joined under the working directory,
//! so anything that could climb out of it is rejected before use.

use crate::error::Error;
use anyhow::{Result, bail};
use std::path::Path;

/// Split on both separators so `a\..\b` is caught on every platform.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\'])
}

fn has_parent_segment(path: &str) -> bool {
    segments(path).any(|s| s == "..")
}

fn is_home_relative(path: &str) -> bool {
    path == "~" || path.starts_with("~/") || path.starts_with("~\\")
}

/// Return `path` unchanged if it is safe, optionally requiring it to live
/// under `root`.
///
/// # Errors
/// `Error::UnsafePath` if the path has a `..` segment, starts with `~/`, or
/// is not rooted at `root`.
pub fn validate_path<'a>(path: &'a str, root: Option<&str>) -> Result<&'a str> {
    if has_parent_segment(path) || is_home_relative(path) {
        bail!(Error::UnsafePath(path.to_owned()));
    }

    if let Some(root) = root
        && !Path::new(path).starts_with(root)
    {
        bail!(Error::UnsafePath(path.to_owned()));
    }

    Ok(path)
}

/// Stricter check used for config values: absolute paths are rejected too.
pub fn is_safe_path(path: &str) -> bool {
    let absolute = path.starts_with(['/', '\\']) || Path::new(path).is_absolute();
    !absolute && validate_path(path, None).is_ok()
}
