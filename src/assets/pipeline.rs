//! Asset compiler seam and the built-in filesystem pipeline.
//!
//! An [`AssetCompiler`] turns a logical name (`app`, `lib/jquery`) into a
//! compiled [`Asset`]. [`AssetGroup`](super::AssetGroup) configures it once
//! (compressors, image compression, search roots) and then only looks assets
//! up.
//!
//! # Lookup
//!
//! ```text
//! search roots: assets/javascripts, other/javascripts
//! "lib/app"  ──► assets/javascripts/lib/app      (exact file)
//!            ──► assets/javascripts/lib/app.*    (first match, sorted)
//!            ──► other/javascripts/...           (next root)
//! ```

use crate::{
    config::{CompilerOption, Compressor},
    error::Error,
    log,
    utils::{image, minify, path::is_safe_path},
};
use anyhow::Result;
use flate2::{Compression, write::GzEncoder};
use std::{
    borrow::Cow,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

/// Hex chars of the blake3 digest embedded in hashed names.
const DIGEST_LEN: usize = 32;

// ============================================================================
// Compiler Capability
// ============================================================================

pub trait AssetCompiler {
    /// Forward one allow-listed compiler option.
    fn set_compressor(&mut self, option: CompilerOption, compressor: Compressor);

    /// Turn on lossless image optimisation.
    fn enable_image_compression(&mut self);

    /// Add a search root. Roots are searched in insertion order.
    fn append_path(&mut self, path: PathBuf);

    /// Compile the asset with the given logical name, if one exists.
    fn lookup(&self, logical_name: &str) -> Result<Option<Asset>>;
}

// ============================================================================
// Asset
// ============================================================================

/// A compiled asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    logical_path: String,
    digest_path: String,
    source: Vec<u8>,
}

impl Asset {
    /// Wrap compiled bytes; the digest path is derived from their content.
    pub fn new(logical_path: impl Into<String>, source: Vec<u8>) -> Self {
        let logical_path = logical_path.into();
        Self {
            digest_path: digest_path(&logical_path, &source),
            logical_path,
            source,
        }
    }

    /// Override the digest path, for compilers with their own naming scheme.
    pub fn with_digest_path(mut self, digest_path: impl Into<String>) -> Self {
        self.digest_path = digest_path.into();
        self
    }

    /// Logical path including extension, e.g. `lib/app.js`.
    pub fn logical_path(&self) -> &str {
        &self.logical_path
    }

    /// Content-addressed path, e.g. `lib/app-<digest>.js`.
    pub fn digest_path(&self) -> &str {
        &self.digest_path
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Compiled content as text, for inlining.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }

    /// Write the compiled bytes to `path`, gzip-compressed if `compress`.
    ///
    /// Parent directories are created as needed.
    pub fn write_to(&self, path: &Path, compress: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Io(parent.to_path_buf(), err))?;
        }

        let io = |err| Error::Io(path.to_path_buf(), err);
        if compress {
            let file = File::create(path).map_err(io)?;
            let mut encoder = GzEncoder::new(file, Compression::best());
            encoder.write_all(&self.source).map_err(io)?;
            encoder.finish().map_err(io)?;
        } else {
            fs::write(path, &self.source).map_err(io)?;
        }
        Ok(())
    }
}

/// Insert a content digest before the extension of the last segment.
///
/// `lib/app.js` → `lib/app-<digest>.js`, `LICENSE` → `LICENSE-<digest>`.
pub fn digest_path(logical_path: &str, source: &[u8]) -> String {
    let digest = hex::encode(blake3::hash(source).as_bytes());
    let digest = &digest[..DIGEST_LEN];

    let (dir, file) = match logical_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, logical_path),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{digest}.{ext}"),
        _ => format!("{file}-{digest}"),
    };

    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

// ============================================================================
// Filesystem Pipeline
// ============================================================================

/// Default compiler: reads sources from search roots and applies the
/// configured compressors.
#[derive(Debug, Default)]
pub struct Pipeline {
    paths: Vec<PathBuf>,
    compressors: Vec<(CompilerOption, Compressor)>,
    image_compression: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn compressor(&self, option: CompilerOption) -> Option<Compressor> {
        self.compressors
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, c)| *c)
    }

    /// Locate a source file. Returns the file and its logical path.
    fn find(&self, name: &str) -> Result<Option<(PathBuf, String)>> {
        for root in &self.paths {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Ok(Some((candidate, name.to_owned())));
            }
            if let Some(found) = find_with_extension(&candidate)? {
                let file_name = found
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let logical = match name.rsplit_once('/') {
                    Some((dir, _)) => format!("{dir}/{file_name}"),
                    None => file_name,
                };
                return Ok(Some((found, logical)));
            }
        }
        Ok(None)
    }

    fn compile(&self, file: &Path) -> Result<Vec<u8>> {
        let mut data = fs::read(file).map_err(|err| Error::Io(file.to_path_buf(), err))?;
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        for (option, compressor) in &self.compressors {
            if option.extensions().contains(&ext.as_str()) {
                data = minify::compress(*compressor, *option, &data);
            }
        }

        if self.image_compression {
            data = image::optimize(&ext, &data)?;
        }

        Ok(data)
    }
}

impl AssetCompiler for Pipeline {
    fn set_compressor(&mut self, option: CompilerOption, compressor: Compressor) {
        self.compressors.retain(|(o, _)| *o != option);
        self.compressors.push((option, compressor));
    }

    fn enable_image_compression(&mut self) {
        self.image_compression = true;
    }

    fn append_path(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn lookup(&self, logical_name: &str) -> Result<Option<Asset>> {
        // Names come from arbitrary source files and must stay inside the roots.
        if !is_safe_path(logical_name) {
            log!("warn"; "{}", Error::UnsafePath(logical_name.to_owned()));
            return Ok(None);
        }

        let Some((file, logical_path)) = self.find(logical_name)? else {
            return Ok(None);
        };
        let source = self.compile(&file)?;
        Ok(Some(Asset::new(logical_path, source)))
    }
}

/// First file next to `candidate` named `<candidate name>.<ext>`, sorted by name.
fn find_with_extension(candidate: &Path) -> Result<Option<PathBuf>> {
    let (Some(dir), Some(stem)) = (candidate.parent(), candidate.file_name()) else {
        return Ok(None);
    };
    if !dir.is_dir() {
        return Ok(None);
    }

    let prefix = format!("{}.", stem.to_string_lossy());
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| Error::Io(dir.to_path_buf(), err))? {
        let entry = entry.map_err(|err| Error::Io(dir.to_path_buf(), err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && entry.path().is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

// ============================================================================
// Tests
// ============================================================================
