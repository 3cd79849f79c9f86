//! Lossless image optimisation through external tools.
//!
//! | extension     | tool        |
//! |---------------|-------------|
//! | `png`         | `pngcrush`  |
//! | `jpg`, `jpeg` | `jpegoptim` |
//!
//! A missing tool is not an error: the image is logged and kept as is.

use crate::{exec, log, utils::exec::FilterRule};
use anyhow::{Context, Result};
use std::fs;

/// pngcrush reports its progress on stderr.
const PNGCRUSH_FILTER: FilterRule =
    FilterRule::new(&["Recompressing", "Total length", "IDAT length", "CPU time", "|"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTool {
    Pngcrush,
    Jpegoptim,
}

impl ImageTool {
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Pngcrush),
            "jpg" | "jpeg" => Some(Self::Jpegoptim),
            _ => None,
        }
    }

    pub const fn command(self) -> &'static str {
        match self {
            Self::Pngcrush => "pngcrush",
            Self::Jpegoptim => "jpegoptim",
        }
    }
}

/// Optimise image bytes. Non-image extensions pass through untouched.
pub fn optimize(ext: &str, data: &[u8]) -> Result<Vec<u8>> {
    let Some(tool) = ImageTool::for_extension(ext) else {
        return Ok(data.to_vec());
    };

    if which::which(tool.command()).is_err() {
        log!("warn"; "`{}` not found, {ext} image left uncompressed", tool.command());
        return Ok(data.to_vec());
    }

    // Tools run inside the scratch directory on relative names
    let dir = tempfile::tempdir().context("Failed to create scratch directory")?;
    let input = format!("input.{ext}");
    fs::write(dir.path().join(&input), data)?;

    let result = match tool {
        ImageTool::Pngcrush => {
            let output = format!("output.{ext}");
            exec!(filter=&PNGCRUSH_FILTER; dir.path(); ["pngcrush"]; "-q", &input, &output)?;
            output
        }
        ImageTool::Jpegoptim => {
            exec!(dir.path(); ["jpegoptim"]; "-q", "--strip-none", &input)?;
            input
        }
    };

    Ok(fs::read(dir.path().join(result))?)
}
