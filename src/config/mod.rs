//! Site configuration loaded from `palimpsest_config.yml`.
//!
//! Only the `assets` section is read; other top-level keys belong to other
//! deployment tools and are ignored.
//!
//! # Example
//!
//! ```yaml
//! assets:
//!   # defaults for every group; src_pre/src_post are global only
//!   options:
//!     src_pre: "[%"
//!     src_post: "%]"
//!     output: compiled
//!     cdn: https://cdn.example.com/
//!     hash: false
//!
//!   # directories scanned for files with asset tags
//!   sources:
//!     - assets/stylesheets
//!     - public
//!
//!   # every other key is an asset group, processed in this order
//!   javascripts:
//!     options:
//!       js_compressor: minify
//!     paths:
//!       - assets/javascripts
//!       - other/javascripts
//!
//!   images:
//!     options:
//!       output: images
//!     paths:
//!       - assets/images
//! ```

pub mod defaults;
pub mod options;

pub use options::{AssetOptions, CompilerOption, Compressor, HashMode, PartialOptions};

use crate::{error::Error, utils::path::is_safe_path};
use anyhow::{Result, bail};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::{fs, path::Path};

// ============================================================================
// Validated Configuration
// ============================================================================

/// Validated site configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteConfig {
    pub assets: AssetsConfig,
}

/// The `assets` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetsConfig {
    /// Global `assets.options`, applied under every group's own options.
    pub options: PartialOptions,
    /// Roots scanned for files containing tags.
    pub sources: Vec<String>,
    /// Asset groups in file order.
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupConfig {
    /// Group key, e.g. `javascripts`.
    pub kind: String,
    pub options: PartialOptions,
    /// `None` when the group has no `paths` key; such groups are skipped.
    pub paths: Option<Vec<String>>,
}

impl SiteConfig {
    /// Parse and validate configuration from a YAML string.
    pub fn from_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawConfig = serde_yaml_ng::from_str(content).map_err(Error::Yaml)?;
        validate_config(raw)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| Error::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Options used when scanning sources for tags of any group.
    ///
    /// Only the delimiters and backend are taken from the global options.
    pub fn scan_options(&self) -> AssetOptions {
        let global = &self.assets.options;
        let mut options = AssetOptions::default();
        options.merge(&PartialOptions {
            search_backend: global.search_backend.clone(),
            tag_open: global.tag_open.clone(),
            tag_close: global.tag_close.clone(),
            ..Default::default()
        });
        options
    }
}

// ============================================================================
// Raw Configuration
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    assets: Option<RawAssets>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAssets {
    #[serde(default)]
    options: Option<Mapping>,

    #[serde(default)]
    sources: Option<Vec<String>>,

    /// Everything else is a group. `Mapping` keeps file order.
    #[serde(flatten)]
    groups: Mapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    #[serde(default)]
    options: Option<Mapping>,

    #[serde(default)]
    paths: Option<Vec<String>>,
}

// ============================================================================
// Validation
// ============================================================================

/// Check the raw config and convert it.
///
/// Walks global options, then sources, then each group's options and paths.
/// Missing sections count as empty.
fn validate_config(raw: RawConfig) -> Result<SiteConfig> {
    let Some(assets) = raw.assets else {
        return Ok(SiteConfig::default());
    };

    let options = match &assets.options {
        Some(mapping) => validate_asset_options(mapping, true)?,
        None => PartialOptions::default(),
    };

    let sources = assets.sources.unwrap_or_default();
    for source in &sources {
        check_path(source)?;
    }

    let mut groups = Vec::with_capacity(assets.groups.len());
    for (key, value) in assets.groups {
        groups.push(validate_group(&key, value)?);
    }

    Ok(SiteConfig {
        assets: AssetsConfig {
            options,
            sources,
            groups,
        },
    })
}

fn validate_group(key: &Value, value: Value) -> Result<GroupConfig> {
    let Some(kind) = key.as_str() else {
        bail!(Error::InvalidConfig(format!(
            "asset group name must be a string, got {key:?}"
        )));
    };

    let raw: RawGroup = match value {
        Value::Null => RawGroup::default(),
        value => serde_yaml_ng::from_value(value).map_err(|err| {
            Error::InvalidConfig(format!("asset group `{kind}`: {err}"))
        })?,
    };

    let options = match &raw.options {
        Some(mapping) => validate_asset_options(mapping, false)?,
        None => PartialOptions::default(),
    };

    if let Some(paths) = &raw.paths {
        for path in paths {
            check_path(path)?;
        }
    }

    Ok(GroupConfig {
        kind: kind.to_owned(),
        options,
        paths: raw.paths,
    })
}

fn validate_asset_options(mapping: &Mapping, global: bool) -> Result<PartialOptions> {
    let options = PartialOptions::from_mapping(mapping)?;

    if let Some(output) = &options.output {
        check_path(output)?;
    }

    // Tags are matched with the global delimiters before group dispatch.
    if !global && options.sets_delimiters() {
        bail!(Error::InvalidConfig(
            "`src_pre` and `src_post` can only be set in global options".into()
        ));
    }

    Ok(options)
}

fn check_path(path: &str) -> Result<()> {
    if !is_safe_path(path) {
        bail!(Error::InvalidConfig(format!("bad path in config: `{path}`")));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
