//! Site working directories.
//!
//! A [`SiteEnvironment`] materialises one revision of a site into a fresh
//! directory under `tmp_dir`, reads its config, and rewrites asset tags in
//! place:
//!
//! ```text
//! Unpopulated ──populate──► Populated { directory, config }
//!      ▲                          │
//!      └──────────cleanup─────────┘
//! ```
//!
//! `site` and `revision` are frozen while populated. Populating again
//! removes the previous directory first.

use crate::{
    assets::{AssetGroup, scan},
    config::{SiteConfig, defaults},
    error::Error,
    log,
    utils::git,
};
use anyhow::{Result, bail};
use educe::Educe;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

// ============================================================================
// Site
// ============================================================================

/// A site and the places its content can be taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    /// Git repository holding the site.
    pub repository: Option<PathBuf>,
    /// Plain directory holding the site.
    pub source: Option<PathBuf>,
}

impl Site {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
            source: None,
        }
    }

    pub fn with_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository = Some(path.into());
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }
}

/// Where [`SiteEnvironment::populate`] takes content from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    /// Extract `revision` from the site's repository.
    #[default]
    Repository,
    /// Copy the site's source directory.
    Local,
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Educe)]
#[educe(Default)]
pub struct EnvironmentOptions {
    /// Parent of every working directory.
    #[educe(Default = defaults::environment::tmp_dir())]
    pub tmp_dir: PathBuf,

    /// Working directories are named `<dir_prefix><site name>_<random>`.
    #[educe(Default = defaults::environment::dir_prefix())]
    pub dir_prefix: String,

    /// Config file, relative to the working directory.
    #[educe(Default = defaults::environment::config_file())]
    pub config_file: PathBuf,
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Debug)]
enum State {
    Unpopulated,
    Populated {
        directory: PathBuf,
        /// Loaded on first use.
        config: Option<SiteConfig>,
    },
}

#[derive(Debug)]
pub struct SiteEnvironment {
    site: Option<Site>,
    revision: String,
    options: EnvironmentOptions,
    state: State,
}

impl Default for SiteEnvironment {
    fn default() -> Self {
        Self::new(EnvironmentOptions::default())
    }
}

impl SiteEnvironment {
    pub fn new(options: EnvironmentOptions) -> Self {
        Self {
            site: None,
            revision: defaults::environment::revision(),
            options,
            state: State::Unpopulated,
        }
    }

    pub const fn options(&self) -> &EnvironmentOptions {
        &self.options
    }

    pub const fn site(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    pub fn set_site(&mut self, site: Site) -> Result<()> {
        if self.is_populated() {
            bail!(Error::InvalidState("site"));
        }
        self.site = Some(site);
        Ok(())
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn set_revision(&mut self, revision: impl Into<String>) -> Result<()> {
        if self.is_populated() {
            bail!(Error::InvalidState("revision"));
        }
        self.revision = revision.into();
        Ok(())
    }

    pub const fn is_populated(&self) -> bool {
        matches!(self.state, State::Populated { .. })
    }

    /// The working directory, once populated.
    pub fn directory(&self) -> Option<&Path> {
        match &self.state {
            State::Populated { directory, .. } => Some(directory.as_path()),
            State::Unpopulated => None,
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Fill a new working directory with the site's content.
    ///
    /// # Errors
    /// `MissingSite` without a site or without a path for `source`,
    /// `MissingRevision` for a repository with an empty revision. On any
    /// failure the new directory is removed and the environment stays
    /// unpopulated.
    pub fn populate(&mut self, source: Source) -> Result<&mut Self> {
        if self.is_populated() {
            self.cleanup()?;
        }

        let site = self.site.as_ref().ok_or(Error::MissingSite)?;
        if source == Source::Repository && self.revision.is_empty() {
            bail!(Error::MissingRevision);
        }
        let origin = match source {
            Source::Repository => site.repository.clone(),
            Source::Local => site.source.clone(),
        }
        .ok_or(Error::MissingSite)?;

        let directory = self.make_directory(&site.name)?;
        let filled = match source {
            Source::Repository => git::extract_repo(&origin, &self.revision, &directory),
            Source::Local => copy_tree(&origin, &directory),
        };
        if let Err(err) = filled {
            fs::remove_dir_all(&directory).ok();
            return Err(err);
        }

        log!("populate"; "{} into {}", origin.display(), directory.display());
        self.state = State::Populated {
            directory,
            config: None,
        };
        Ok(self)
    }

    /// Remove the working directory. A no-op when unpopulated.
    pub fn cleanup(&mut self) -> Result<&mut Self> {
        if let State::Populated { directory, .. } = &self.state {
            match fs::remove_dir_all(directory) {
                Ok(()) => log!("cleanup"; "{}", directory.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => bail!(Error::Io(directory.clone(), err)),
            }
        }
        self.state = State::Unpopulated;
        Ok(self)
    }

    fn make_directory(&self, site_name: &str) -> Result<PathBuf> {
        let root = &self.options.tmp_dir;
        fs::create_dir_all(root).map_err(|err| Error::Io(root.clone(), err))?;

        let prefix = format!("{}{}_", self.options.dir_prefix, sanitize_name(site_name));
        let directory = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|err| Error::Io(root.clone(), err))?;
        Ok(directory.keep())
    }

    // ------------------------------------------------------------------------
    // Config and Assets
    // ------------------------------------------------------------------------

    /// The site config, populating from the repository first if needed.
    ///
    /// Loaded once per population.
    pub fn config(&mut self) -> Result<&SiteConfig> {
        if !self.is_populated() {
            self.populate(Source::Repository)?;
        }

        let config_file = self.options.config_file.clone();
        match &mut self.state {
            State::Populated { directory, config } => {
                let loaded = match config.take() {
                    Some(loaded) => loaded,
                    None => {
                        let path = directory.join(&config_file);
                        log!("config"; "{}", path.display());
                        SiteConfig::from_path(&path)?
                    }
                };
                Ok(config.insert(loaded))
            }
            State::Unpopulated => bail!("Environment is not populated"),
        }
    }

    /// Directory and config of a populated environment with config loaded.
    fn loaded(&mut self) -> Result<(&Path, &SiteConfig)> {
        self.config()?;
        match &self.state {
            State::Populated {
                directory,
                config: Some(config),
            } => Ok((directory.as_path(), config)),
            _ => bail!("Environment is not populated"),
        }
    }

    /// One asset group per configured group with `paths`, in config order.
    ///
    /// Global options are merged first, then the group's own.
    pub fn asset_groups(&mut self) -> Result<Vec<AssetGroup>> {
        let (directory, config) = self.loaded()?;

        let groups = config
            .assets
            .groups
            .iter()
            .filter_map(|group| {
                let paths = group.paths.clone()?;
                let mut asset_group = AssetGroup::new(&group.kind)
                    .with_directory(directory)
                    .with_paths(paths);
                asset_group.set_options(&config.assets.options);
                asset_group.set_options(&group.options);
                Some(asset_group)
            })
            .collect();

        Ok(groups)
    }

    /// Files under the configured sources containing any tag.
    pub fn files_with_tags(&mut self) -> Result<Vec<PathBuf>> {
        let (directory, config) = self.loaded()?;
        let options = config.scan_options();

        let mut files = Vec::new();
        for source in &config.assets.sources {
            files.extend(scan::find_tags(&directory.join(source), None, &options)?);
        }
        Ok(files)
    }

    /// Rewrite every tag in every tagged file, group by group.
    pub fn compile(&mut self) -> Result<&mut Self> {
        let files = self.files_with_tags()?;
        let mut groups = self.asset_groups()?;
        log!("compile"; "{} files, {} asset groups", files.len(), groups.len());

        let root = self.directory().map(Path::to_path_buf).unwrap_or_default();
        for file in &files {
            let mut content =
                fs::read_to_string(file).map_err(|err| Error::Io(file.clone(), err))?;
            for group in &mut groups {
                group.substitute_tags(&mut content)?;
            }
            fs::write(file, &content).map_err(|err| Error::Io(file.clone(), err))?;
            log!("compile"; "{}", file.strip_prefix(&root).unwrap_or(file).display());
        }

        Ok(self)
    }
}

/// Keep directory names portable: anything but `[A-Za-z0-9._-]` becomes `_`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Copy the contents of `from` into `to`, leaving out `.git`.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        bail!(Error::Io(
            from.to_path_buf(),
            std::io::Error::new(ErrorKind::NotFound, "source directory not found"),
        ));
    }

    let walker = WalkDir::new(from)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(from)?;
        let target = to.join(rel);
        let io = |err| Error::Io(entry.path().to_path_buf(), err);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io)?;
        } else if entry.path_is_symlink() {
            copy_symlink(entry.path(), &target).map_err(io)?;
        } else {
            fs::copy(entry.path(), &target).map_err(io)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

// ============================================================================
// Tests
// ============================================================================
