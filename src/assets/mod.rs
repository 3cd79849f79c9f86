//! Asset groups: resolving tags to compiled, written assets.
//!
//! A group owns one kind of asset (`javascripts`, `stylesheets`, `images`),
//! its search paths, and its merged options. Rewriting a source replaces
//! every tag of the group's kind:
//!
//! ```text
//! <script src="[% javascript app %]">      ─► <script src="https://cdn/compiled/app-<digest>.js">
//! <script>[% javascript inline ga %]</script> ─► <script>...compiled ga.js...</script>
//! ```
//!
//! Linked assets are written below `directory/output`; inlined assets are
//! never written.

pub mod pipeline;
pub mod scan;
pub mod tag;

pub use pipeline::{Asset, AssetCompiler, Pipeline};
pub use scan::{SearchBackend, find_tags, tag_pattern};

use crate::{
    config::{AssetOptions, HashMode, PartialOptions},
    error::Error,
    log,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tag::{Tag, classify, singularize, tag_regex};

// ============================================================================
// Asset Group
// ============================================================================

#[derive(Debug)]
pub struct AssetGroup<C: AssetCompiler = Pipeline> {
    kind: String,
    directory: Option<PathBuf>,
    paths: Vec<String>,
    options: AssetOptions,
    compiler: C,
    resolved: bool,
}

impl AssetGroup<Pipeline> {
    /// Group with default options and the built-in pipeline.
    pub fn new(kind: impl Into<String>) -> Self {
        Self::with_compiler(kind, Pipeline::new())
    }
}

impl<C: AssetCompiler> AssetGroup<C> {
    pub fn with_compiler(kind: impl Into<String>, compiler: C) -> Self {
        Self {
            kind: kind.into(),
            directory: None,
            paths: Vec::new(),
            options: AssetOptions::default(),
            compiler,
            resolved: false,
        }
    }

    /// Base directory for search paths and written assets.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Search paths, relative to the directory when one is set.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directory = Some(directory.into());
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn set_paths(&mut self, paths: Vec<String>) {
        self.paths = paths;
    }

    pub const fn options(&self) -> &AssetOptions {
        &self.options
    }

    /// Merge one layer of options over the current ones.
    ///
    /// Has no effect on a compiler that was already resolved.
    pub fn set_options(&mut self, options: &PartialOptions) -> &AssetOptions {
        self.options.merge(options)
    }

    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The compiler, without resolving it.
    pub const fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Configure the compiler on first use and return it.
    ///
    /// Options are forwarded and search paths appended exactly once.
    pub fn resolve_index(&mut self) -> &C {
        if !self.resolved {
            self.load_options();
            self.load_paths();
            self.resolved = true;
        }
        &self.compiler
    }

    fn load_options(&mut self) {
        for option in &self.options.proxied_compiler_options {
            if let Some(compressor) = option.value(&self.options) {
                self.compiler.set_compressor(*option, compressor);
            }
        }
        if self.options.image_compression {
            self.compiler.enable_image_compression();
        }
    }

    fn load_paths(&mut self) {
        for path in &self.paths {
            let path = match &self.directory {
                Some(directory) => directory.join(path),
                None => PathBuf::from(path),
            };
            self.compiler.append_path(path);
        }
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    /// Resolve an asset and write it using the group's `gzip` and `hash`.
    ///
    /// Returns the written name relative to the directory, or `None` if the
    /// asset does not exist.
    pub fn resolve_and_write(&mut self, name: &str) -> Result<Option<String>> {
        let (gzip, hash) = (self.options.gzip, self.options.hash);
        self.resolve_and_write_with(name, gzip, hash)
    }

    pub fn resolve_and_write_with(
        &mut self,
        name: &str,
        gzip: bool,
        hash: HashMode,
    ) -> Result<Option<String>> {
        let Some(asset) = self.resolve_index().lookup(name)? else {
            return Ok(None);
        };
        self.write_asset(&asset, gzip, hash).map(Some)
    }

    fn write_asset(&self, asset: &Asset, gzip: bool, hash: HashMode) -> Result<String> {
        if hash == HashMode::AlsoUnhashed {
            self.write_asset(asset, gzip, HashMode::Off)?;
        }

        let file_name = if hash.is_enabled() {
            asset.digest_path()
        } else {
            asset.logical_path()
        };
        let name = match &self.options.output {
            Some(output) => join_reference(output, file_name),
            None => file_name.to_owned(),
        };
        let path = match &self.directory {
            Some(directory) => directory.join(&name),
            None => PathBuf::from(&name),
        };

        if gzip {
            let mut gz = path.clone().into_os_string();
            gz.push(".gz");
            asset.write_to(Path::new(&gz), true)?;
        }
        asset.write_to(&path, false)?;

        log!("assets"; "{name}");
        Ok(name)
    }

    /// The reference written into sources for an asset written as `name`.
    ///
    /// With `serve_root` set, a leading `output` is swapped for it:
    /// `compiled/app.js` → `/assets/app.js`.
    pub fn format_reference(&self, name: &str) -> String {
        let Some(serve_root) = &self.options.serve_root else {
            return name.to_owned();
        };
        let rest = self
            .options
            .output
            .as_deref()
            .and_then(|output| strip_path_prefix(name, output))
            .unwrap_or(name);
        join_reference(serve_root, rest)
    }

    // ------------------------------------------------------------------------
    // Tag Substitution
    // ------------------------------------------------------------------------

    /// Rewrite every tag of this group's kind in `source`.
    ///
    /// Missing assets are logged and their tags left untouched.
    pub fn substitute_tags(&mut self, source: &mut String) -> Result<()> {
        if let Some(rewritten) = self.rewrite(source)? {
            *source = rewritten;
        }
        Ok(())
    }

    /// Like [`substitute_tags`](Self::substitute_tags), returning a new string.
    pub fn substitute_tags_copy(&mut self, source: &str) -> Result<String> {
        Ok(self.rewrite(source)?.unwrap_or_else(|| source.to_owned()))
    }

    /// `None` when the source has no tags of this kind.
    fn rewrite(&mut self, source: &str) -> Result<Option<String>> {
        let re = tag_regex(&self.kind, &self.options)?;
        if !re.is_match(source) {
            return Ok(None);
        }

        let mut output = String::with_capacity(source.len());
        let mut last = 0;
        for caps in re.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            output.push_str(&source[last..whole.start()]);

            let tag = classify(&caps, &self.options.inline_keyword);
            match self.replacement(tag)? {
                Some(text) => output.push_str(&text),
                None => output.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        output.push_str(&source[last..]);

        Ok(Some(output))
    }

    fn replacement(&mut self, tag: Tag<'_>) -> Result<Option<String>> {
        match tag {
            Tag::Inline(name) => match self.resolve_index().lookup(name)? {
                Some(asset) => Ok(Some(asset.to_text().into_owned())),
                None => {
                    report_missing(name);
                    Ok(None)
                }
            },
            Tag::Link(name) => match self.resolve_and_write(&name)? {
                Some(written) => Ok(Some(format!(
                    "{}{}",
                    self.options.cdn,
                    self.format_reference(&written)
                ))),
                None => {
                    report_missing(&name);
                    Ok(None)
                }
            },
        }
    }

    /// Files under `path` (default: the directory) containing this group's tags.
    pub fn find_tags(&self, path: Option<&Path>) -> Result<Vec<PathBuf>> {
        let root = path.or(self.directory.as_deref()).unwrap_or(Path::new("."));
        find_tags(root, Some(singularize(&self.kind).as_str()), &self.options)
    }
}

fn report_missing(name: &str) {
    log!("warn"; "{}", Error::AssetNotFound(name.to_owned()));
}

/// `name` with a leading `prefix` path removed, compared by segment.
fn strip_path_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(name);
    }
    name.strip_prefix(prefix)?.strip_prefix('/')
}

/// Join with exactly one `/` between `base` and `rest`.
fn join_reference(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return rest.to_owned();
    }
    format!("{}/{}", base.trim_end_matches('/'), rest.trim_start_matches('/'))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompilerOption, Compressor};
    use std::{cell::Cell, collections::HashMap, fs};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// Compiler serving fixed assets and recording how it was configured.
    #[derive(Debug, Default)]
    struct StubCompiler {
        assets: HashMap<String, Asset>,
        compressors: Vec<(CompilerOption, Compressor)>,
        image_compression_calls: usize,
        paths: Vec<PathBuf>,
        lookups: Cell<usize>,
    }

    impl StubCompiler {
        fn with_asset(mut self, name: &str, asset: Asset) -> Self {
            self.assets.insert(name.to_owned(), asset);
            self
        }
    }

    impl AssetCompiler for StubCompiler {
        fn set_compressor(&mut self, option: CompilerOption, compressor: Compressor) {
            self.compressors.push((option, compressor));
        }

        fn enable_image_compression(&mut self) {
            self.image_compression_calls += 1;
        }

        fn append_path(&mut self, path: PathBuf) {
            self.paths.push(path);
        }

        fn lookup(&self, logical_name: &str) -> Result<Option<Asset>> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.assets.get(logical_name).cloned())
        }
    }

    fn app_asset() -> Asset {
        Asset::new("app.js", b"var app;".to_vec()).with_digest_path("app-1234.js")
    }

    fn tracking_asset() -> Asset {
        Asset::new("tracking.js", b"alert('track');".to_vec())
    }

    fn stub_group(dir: &Path) -> AssetGroup<StubCompiler> {
        let compiler = StubCompiler::default()
            .with_asset("app", app_asset())
            .with_asset("tracking", tracking_asset());
        AssetGroup::with_compiler("javascripts", compiler).with_directory(dir)
    }

    fn written_files(dir: &Path) -> Vec<String> {
        let mut files: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    // ------------------------------------------------------------------------
    // Options and index
    // ------------------------------------------------------------------------

    #[test]
    fn test_new_group_uses_default_options() {
        let group = AssetGroup::new("javascripts");
        assert_eq!(group.options(), &AssetOptions::default());
        assert_eq!(group.kind(), "javascripts");
        assert!(group.paths().is_empty());
        assert!(!group.is_resolved());
    }

    #[test]
    fn test_set_options_merges_shallowly() {
        let mut group = AssetGroup::new("javascripts");
        group.set_options(&PartialOptions {
            tag_open: Some("{{".into()),
            ..Default::default()
        });
        let merged = group.set_options(&PartialOptions {
            gzip: Some(true),
            ..Default::default()
        });

        assert_eq!(merged.tag_open, "{{");
        assert!(merged.gzip);
        assert_eq!(merged.tag_close, "%]");
    }

    #[test]
    fn test_resolve_index_configures_compiler_once() {
        let mut group = AssetGroup::with_compiler("javascripts", StubCompiler::default())
            .with_directory("/site")
            .with_paths(["assets/javascripts", "other/javascripts"]);
        group.set_options(&PartialOptions {
            js_compressor: Some(Compressor::Minify),
            image_compression: Some(true),
            ..Default::default()
        });

        group.resolve_index();
        let compiler = group.resolve_index();

        assert_eq!(
            compiler.compressors,
            vec![(CompilerOption::JsCompressor, Compressor::Minify)]
        );
        assert_eq!(compiler.image_compression_calls, 1);
        assert_eq!(
            compiler.paths,
            vec![
                PathBuf::from("/site/assets/javascripts"),
                PathBuf::from("/site/other/javascripts"),
            ]
        );
        assert!(group.is_resolved());
    }

    #[test]
    fn test_resolve_index_skips_unset_and_unlisted_options() {
        let mut group = AssetGroup::with_compiler("stylesheets", StubCompiler::default());
        group.options.proxied_compiler_options = vec![CompilerOption::JsCompressor];
        group.set_options(&PartialOptions {
            css_compressor: Some(Compressor::Whitespace),
            ..Default::default()
        });

        let compiler = group.resolve_index();
        assert!(compiler.compressors.is_empty());
        assert_eq!(compiler.image_compression_calls, 0);
    }

    #[test]
    fn test_resolve_index_without_directory_keeps_paths() {
        let mut group = AssetGroup::with_compiler("javascripts", StubCompiler::default())
            .with_paths(["assets/javascripts"]);
        let compiler = group.resolve_index();
        assert_eq!(compiler.paths, vec![PathBuf::from("assets/javascripts")]);
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_and_write_missing_asset() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        assert_eq!(group.resolve_and_write("nope").unwrap(), None);
        assert!(written_files(dir.path()).is_empty());
    }

    #[test]
    fn test_resolve_and_write_hashed_by_default() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());

        let name = group.resolve_and_write("app").unwrap();
        assert_eq!(name.as_deref(), Some("app-1234.js"));
        assert_eq!(fs::read(dir.path().join("app-1234.js")).unwrap(), b"var app;");
    }

    #[test]
    fn test_resolve_and_write_under_output() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        group.set_options(&PartialOptions {
            output: Some("compiled".into()),
            hash: Some(HashMode::Off),
            ..Default::default()
        });

        let name = group.resolve_and_write("app").unwrap();
        assert_eq!(name.as_deref(), Some("compiled/app.js"));
        assert_eq!(written_files(dir.path()), vec!["compiled/app.js"]);
    }

    #[test]
    fn test_resolve_and_write_also_unhashed() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        group.set_options(&PartialOptions {
            hash: Some(HashMode::AlsoUnhashed),
            ..Default::default()
        });

        let name = group.resolve_and_write("app").unwrap();
        assert_eq!(name.as_deref(), Some("app-1234.js"));
        assert_eq!(written_files(dir.path()), vec!["app-1234.js", "app.js"]);
    }

    #[test]
    fn test_resolve_and_write_gzip_sibling() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());

        let name = group
            .resolve_and_write_with("app", true, HashMode::Off)
            .unwrap();
        assert_eq!(name.as_deref(), Some("app.js"));
        assert_eq!(written_files(dir.path()), vec!["app.js", "app.js.gz"]);

        let mut decoded = Vec::new();
        GzDecoder::new(fs::File::open(dir.path().join("app.js.gz")).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, b"var app;");
    }

    #[test]
    fn test_format_reference() {
        let mut group = AssetGroup::new("javascripts");
        assert_eq!(group.format_reference("compiled/app.js"), "compiled/app.js");

        group.set_options(&PartialOptions {
            output: Some("compiled".into()),
            serve_root: Some("/assets".into()),
            ..Default::default()
        });
        assert_eq!(group.format_reference("compiled/app.js"), "/assets/app.js");
        assert_eq!(group.format_reference("compiled/lib/a.js"), "/assets/lib/a.js");
        // Not below output
        assert_eq!(group.format_reference("compiledx/app.js"), "/assets/compiledx/app.js");
    }

    #[test]
    fn test_format_reference_without_output() {
        let mut group = AssetGroup::new("javascripts");
        group.set_options(&PartialOptions {
            serve_root: Some("/".into()),
            ..Default::default()
        });
        assert_eq!(group.format_reference("app.js"), "/app.js");
    }

    // ------------------------------------------------------------------------
    // Tag substitution
    // ------------------------------------------------------------------------

    #[test]
    fn test_substitute_tags_in_place_and_copy() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        let source = "<script src=\"[% javascript app %]\"></script>";

        let copy = group.substitute_tags_copy(source).unwrap();
        assert_eq!(copy, "<script src=\"app-1234.js\"></script>");

        let mut in_place = source.to_owned();
        group.substitute_tags(&mut in_place).unwrap();
        assert_eq!(in_place, copy);
    }

    #[test]
    fn test_substitute_tags_cdn_and_output() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        group.set_options(&PartialOptions {
            cdn: Some("https://cdn.example.com/".into()),
            output: Some("compiled".into()),
            ..Default::default()
        });

        let result = group
            .substitute_tags_copy("<script src=\"[% javascript app %]\"></script>")
            .unwrap();
        assert_eq!(
            result,
            "<script src=\"https://cdn.example.com/compiled/app-1234.js\"></script>"
        );
    }

    #[test]
    fn test_substitute_tags_inline_is_not_written() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());

        let result = group
            .substitute_tags_copy("<script>[% javascript inline tracking %]</script>")
            .unwrap();
        assert_eq!(result, "<script>alert('track');</script>");
        assert!(written_files(dir.path()).is_empty());
    }

    #[test]
    fn test_substitute_tags_missing_asset_leaves_tag() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        let source = "[% javascript missing %] [% javascript inline gone %] [% javascript app %]";

        let result = group.substitute_tags_copy(source).unwrap();
        assert_eq!(
            result,
            "[% javascript missing %] [% javascript inline gone %] app-1234.js"
        );
    }

    #[test]
    fn test_substitute_tags_without_tags() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());
        let mut source = "<p>[% stylesheet app %]</p>".to_owned();

        group.substitute_tags(&mut source).unwrap();
        assert_eq!(source, "<p>[% stylesheet app %]</p>");
        assert!(!group.is_resolved());
        assert_eq!(group.compiler().lookups.get(), 0);
    }

    #[test]
    fn test_substitute_tags_repeated_asset() {
        let dir = TempDir::new().unwrap();
        let mut group = stub_group(dir.path());

        let result = group
            .substitute_tags_copy("[% javascript app %]\n[% javascript app %]")
            .unwrap();
        assert_eq!(result, "app-1234.js\napp-1234.js");
        assert_eq!(group.compiler().lookups.get(), 2);
        assert_eq!(group.compiler().paths.len(), 0);
    }

    #[test]
    fn test_substitute_tags_with_pipeline() {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("assets/javascripts");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("app.js"), "var app;").unwrap();

        let mut group = AssetGroup::new("javascripts")
            .with_directory(dir.path())
            .with_paths(["assets/javascripts"]);

        let result = group.substitute_tags_copy("[% javascript app %]").unwrap();
        let expected = pipeline::digest_path("app.js", b"var app;");
        assert_eq!(result, expected);
        assert!(dir.path().join(&expected).is_file());
    }

    #[test]
    fn test_substitute_tags_with_pipeline_leaves_unsafe_names() {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("assets/javascripts");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("app.js"), "var app;").unwrap();
        fs::write(dir.path().join("assets/outside.js"), "outside").unwrap();

        let mut group = AssetGroup::new("javascripts")
            .with_directory(dir.path())
            .with_paths(["assets/javascripts"]);
        group.set_options(&PartialOptions {
            hash: Some(HashMode::Off),
            ..Default::default()
        });

        let source = "[% javascript /app %]\n[% javascript ../outside %]\n[% javascript app %]";
        let result = group.substitute_tags_copy(source).unwrap();
        assert_eq!(
            result,
            "[% javascript /app %]\n[% javascript ../outside %]\napp.js"
        );
        assert_eq!(
            written_files(dir.path()),
            ["app.js", "assets/javascripts/app.js", "assets/outside.js"]
        );
    }

    #[test]
    fn test_find_tags_uses_singular_kind() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.html"), "[% javascript app %]").unwrap();
        fs::write(dir.path().join("b.html"), "[% stylesheet app %]").unwrap();

        let group = AssetGroup::new("javascripts").with_directory(dir.path());
        let files = group.find_tags(None).unwrap();
        assert_eq!(files, vec![dir.path().join("a.html")]);
    }

    #[test]
    fn test_join_helpers() {
        assert_eq!(join_reference("compiled/", "app.js"), "compiled/app.js");
        assert_eq!(join_reference("", "app.js"), "app.js");
        assert_eq!(strip_path_prefix("compiled/app.js", "compiled/"), Some("app.js"));
        assert_eq!(strip_path_prefix("compiled.js", "compiled"), None);
    }
}
