//! Finding source files that contain asset tags.
//!
//! The tag pattern is written in grep syntax so it can be handed to an
//! external search tool; the built-in `grep` backend walks the tree itself
//! and matches line by line, skipping binary files the way grep does.
//! Files that are not valid UTF-8 are skipped as well, since sources are
//! rewritten as text.

use crate::{config::AssetOptions, error::Error, log};
use anyhow::{Result, bail};
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use walkdir::WalkDir;

/// Bytes inspected for a NUL when deciding a file is binary.
const BINARY_PROBE_LEN: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Grep,
}

impl FromStr for SearchBackend {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "grep" => Ok(Self::Grep),
            other => bail!(Error::UnsupportedBackend(other.to_owned())),
        }
    }
}

impl SearchBackend {
    /// Files under `root` with at least one line matching `pattern`.
    pub fn search(self, pattern: &Regex, root: &Path) -> Result<Vec<PathBuf>> {
        match self {
            Self::Grep => grep(pattern, root),
        }
    }
}

/// Pattern matching any tag, or only tags of `kind` when given.
///
/// ```text
/// None                → \[%(.*?)%\]
/// Some("javascript")  → \[%\s+javascript\s+(.*?)%\]
/// ```
pub fn tag_pattern(kind: Option<&str>, options: &AssetOptions) -> String {
    let open = regex::escape(&options.tag_open);
    let close = regex::escape(&options.tag_close);
    match kind {
        Some(kind) => format!(r"{open}\s+{kind}\s+(.*?){close}", kind = regex::escape(kind)),
        None => format!("{open}(.*?){close}"),
    }
}

/// Recursively search `path` for files containing tags.
///
/// Results are sorted by path. A missing `path` yields no files.
pub fn find_tags(path: &Path, kind: Option<&str>, options: &AssetOptions) -> Result<Vec<PathBuf>> {
    let backend: SearchBackend = options.search_backend.parse()?;
    let pattern = Regex::new(&tag_pattern(kind, options))?;
    backend.search(&pattern, path)
}

fn grep(pattern: &Regex, root: &Path) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let bytes = fs::read(path).map_err(|err| Error::Io(path.to_path_buf(), err))?;
        if is_binary(&bytes) {
            continue;
        }

        let Ok(text) = std::str::from_utf8(&bytes) else {
            if has_match(pattern, &String::from_utf8_lossy(&bytes)) {
                log!("warn"; "{} is not valid UTF-8, tags left as is", path.display());
            }
            continue;
        };
        if has_match(pattern, text) {
            matches.push(path.to_path_buf());
        }
    }

    Ok(matches)
}

fn has_match(pattern: &Regex, text: &str) -> bool {
    text.lines().any(|line| pattern.is_match(line))
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_PROBE_LEN).any(|&b| b == 0)
}

// ============================================================================
// Tests
// ============================================================================
