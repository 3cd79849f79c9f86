//! Asset group options.
//!
//! [`AssetOptions`] is the fully merged view a group works with;
//! [`PartialOptions`] is one layer read from config (global `assets.options`
//! or a group's own `options`) and folded in with [`AssetOptions::merge`].
//!
//! | key                        | default                          |
//! |----------------------------|----------------------------------|
//! | `search_backend`           | `grep`                           |
//! | `output`                   | none                             |
//! | `serve_root`               | none                             |
//! | `cdn`                      | `""`                             |
//! | `inline`                   | `inline`                         |
//! | `image_compression`        | `false`                          |
//! | `gzip`                     | `false`                          |
//! | `hash`                     | `true` (or `also_unhashed`)      |
//! | `src_pre` / `src_post`     | `[%` / `%]`                      |
//! | `proxied_compiler_options` | `js_compressor`, `css_compressor`|

use super::defaults;
use crate::error::Error;
use anyhow::{Result, bail};
use educe::Educe;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

/// Config key of the compiler allow-list. Never settable from config.
pub const PROXIED_OPTIONS_KEY: &str = "proxied_compiler_options";

// ============================================================================
// Enums
// ============================================================================

/// Whether written asset names carry a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawHashMode")]
pub enum HashMode {
    /// Logical name only (`app.js`).
    Off,
    /// Digest name (`app-<digest>.js`).
    #[default]
    On,
    /// Digest name, plus an unhashed copy next to it.
    AlsoUnhashed,
}

impl HashMode {
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl From<bool> for HashMode {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// `hash:` accepts a bool or the `also_unhashed` keyword.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawHashMode {
    Flag(bool),
    Keyword(String),
}

impl TryFrom<RawHashMode> for HashMode {
    type Error = String;

    fn try_from(raw: RawHashMode) -> Result<Self, Self::Error> {
        match raw {
            RawHashMode::Flag(flag) => Ok(flag.into()),
            RawHashMode::Keyword(word) if word == "also_unhashed" => Ok(Self::AlsoUnhashed),
            RawHashMode::Keyword(word) => Err(format!(
                "unknown hash mode `{word}`, expected true, false or also_unhashed"
            )),
        }
    }
}

/// Compression the asset pipeline applies to compiled text assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compressor {
    /// Trim every line and drop blank ones.
    Whitespace,
    /// Full minification through `minify-html`.
    Minify,
}

/// Options forwarded verbatim to the asset compiler.
///
/// This is the whole table: a key that is not listed here can never reach
/// the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerOption {
    JsCompressor,
    CssCompressor,
}

impl CompilerOption {
    pub const ALL: [Self; 2] = [Self::JsCompressor, Self::CssCompressor];

    pub const fn key(self) -> &'static str {
        match self {
            Self::JsCompressor => "js_compressor",
            Self::CssCompressor => "css_compressor",
        }
    }

    /// File extensions the option applies to.
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::JsCompressor => &["js", "mjs"],
            Self::CssCompressor => &["css"],
        }
    }

    /// The configured value, if any.
    pub const fn value(self, options: &AssetOptions) -> Option<Compressor> {
        match self {
            Self::JsCompressor => options.js_compressor,
            Self::CssCompressor => options.css_compressor,
        }
    }
}

// ============================================================================
// Merged Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Educe)]
#[educe(Default)]
pub struct AssetOptions {
    /// Text-search backend used to find files with tags.
    #[educe(Default = defaults::assets::search_backend())]
    pub search_backend: String,

    /// Directory, relative to the group directory, that assets are written to.
    pub output: Option<String>,

    /// Replaces `output` in references written into sources. Files stay put.
    pub serve_root: Option<String>,

    /// Prepended to every linked reference, e.g. `https://cdn.example.com/`.
    pub cdn: String,

    /// Second tag token selecting inline mode.
    #[educe(Default = defaults::assets::inline_keyword())]
    pub inline_keyword: String,

    pub image_compression: bool,

    /// Also write `<asset>.gz`.
    pub gzip: bool,

    #[educe(Default = defaults::assets::hash())]
    pub hash: HashMode,

    #[educe(Default = defaults::assets::tag_open())]
    pub tag_open: String,

    #[educe(Default = defaults::assets::tag_close())]
    pub tag_close: String,

    #[educe(Default = defaults::assets::proxied_compiler_options())]
    pub proxied_compiler_options: Vec<CompilerOption>,

    pub js_compressor: Option<Compressor>,

    pub css_compressor: Option<Compressor>,
}

impl AssetOptions {
    /// Shallow merge: every key present in `partial` replaces the current one.
    pub fn merge(&mut self, partial: &PartialOptions) -> &Self {
        Self::update_option(&mut self.search_backend, partial.search_backend.as_ref());
        Self::update_some(&mut self.output, partial.output.as_ref());
        Self::update_some(&mut self.serve_root, partial.serve_root.as_ref());
        Self::update_option(&mut self.cdn, partial.cdn.as_ref());
        Self::update_option(&mut self.inline_keyword, partial.inline_keyword.as_ref());
        Self::update_option(&mut self.image_compression, partial.image_compression.as_ref());
        Self::update_option(&mut self.gzip, partial.gzip.as_ref());
        Self::update_option(&mut self.hash, partial.hash.as_ref());
        Self::update_option(&mut self.tag_open, partial.tag_open.as_ref());
        Self::update_option(&mut self.tag_close, partial.tag_close.as_ref());
        Self::update_some(&mut self.js_compressor, partial.js_compressor.as_ref());
        Self::update_some(&mut self.css_compressor, partial.css_compressor.as_ref());
        self
    }

    fn update_option<T: Clone>(option: &mut T, value: Option<&T>) {
        if let Some(value) = value {
            *option = value.clone();
        }
    }

    fn update_some<T: Clone>(option: &mut Option<T>, value: Option<&T>) {
        if let Some(value) = value {
            *option = Some(value.clone());
        }
    }
}

// ============================================================================
// Partial Options
// ============================================================================

/// One layer of options as written in config. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialOptions {
    pub search_backend: Option<String>,
    pub output: Option<String>,
    pub serve_root: Option<String>,
    pub cdn: Option<String>,
    #[serde(rename = "inline", alias = "inline_keyword")]
    pub inline_keyword: Option<String>,
    pub image_compression: Option<bool>,
    pub gzip: Option<bool>,
    pub hash: Option<HashMode>,
    #[serde(rename = "src_pre", alias = "tag_open")]
    pub tag_open: Option<String>,
    #[serde(rename = "src_post", alias = "tag_close")]
    pub tag_close: Option<String>,
    pub js_compressor: Option<Compressor>,
    pub css_compressor: Option<Compressor>,
}

impl PartialOptions {
    /// Convert a raw config mapping.
    ///
    /// # Errors
    /// `Error::InvalidConfig` for the allow-list key, unknown keys, and values
    /// of the wrong type (including unknown compressor names).
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        if mapping.contains_key(PROXIED_OPTIONS_KEY) {
            bail!(Error::InvalidConfig(format!(
                "bad option in config: `{PROXIED_OPTIONS_KEY}` cannot be set"
            )));
        }

        serde_yaml_ng::from_value(Value::Mapping(mapping.clone()))
            .map_err(|err| Error::InvalidConfig(format!("bad option in config: {err}")).into())
    }

    pub const fn sets_delimiters(&self) -> bool {
        self.tag_open.is_some() || self.tag_close.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn invalid_config(result: Result<PartialOptions>) -> String {
        match result.unwrap_err().downcast::<Error>() {
            Ok(Error::InvalidConfig(msg)) => msg,
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_match_documented_table() {
        let options = AssetOptions::default();

        assert_eq!(options.search_backend, "grep");
        assert_eq!(options.output, None);
        assert_eq!(options.serve_root, None);
        assert_eq!(options.cdn, "");
        assert_eq!(options.inline_keyword, "inline");
        assert!(!options.image_compression);
        assert!(!options.gzip);
        assert_eq!(options.hash, HashMode::On);
        assert_eq!(options.tag_open, "[%");
        assert_eq!(options.tag_close, "%]");
        assert_eq!(
            options.proxied_compiler_options,
            vec![CompilerOption::JsCompressor, CompilerOption::CssCompressor]
        );
        assert_eq!(options.js_compressor, None);
        assert_eq!(options.css_compressor, None);
    }

    #[test]
    fn test_merge_is_shallow_and_last_wins() {
        let mut options = AssetOptions::default();
        options.merge(&PartialOptions {
            tag_open: Some("{{".into()),
            cdn: Some("https://a.example.com/".into()),
            ..Default::default()
        });
        options.merge(&PartialOptions {
            tag_close: Some("}}".into()),
            cdn: Some("https://b.example.com/".into()),
            ..Default::default()
        });

        let expected = AssetOptions {
            tag_open: "{{".into(),
            tag_close: "}}".into(),
            cdn: "https://b.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(options, expected);
    }

    #[test]
    fn test_merge_empty_partial_changes_nothing() {
        let mut options = AssetOptions::default();
        options.merge(&PartialOptions::default());
        assert_eq!(options, AssetOptions::default());
    }

    #[test]
    fn test_from_mapping_reads_config_keys() {
        let partial = PartialOptions::from_mapping(&mapping(
            r#"
            src_pre: "(%"
            output: compiled
            hash: also_unhashed
            gzip: true
            js_compressor: minify
            "#,
        ))
        .unwrap();

        assert_eq!(partial.tag_open.as_deref(), Some("(%"));
        assert_eq!(partial.output.as_deref(), Some("compiled"));
        assert_eq!(partial.hash, Some(HashMode::AlsoUnhashed));
        assert_eq!(partial.gzip, Some(true));
        assert_eq!(partial.js_compressor, Some(Compressor::Minify));
        assert!(partial.sets_delimiters());
    }

    #[test]
    fn test_from_mapping_hash_flags() {
        let off = PartialOptions::from_mapping(&mapping("hash: false")).unwrap();
        assert_eq!(off.hash, Some(HashMode::Off));

        let on = PartialOptions::from_mapping(&mapping("hash: true")).unwrap();
        assert_eq!(on.hash, Some(HashMode::On));

        let msg = invalid_config(PartialOptions::from_mapping(&mapping("hash: sometimes")));
        assert!(msg.contains("bad option"));
    }

    #[test]
    fn test_from_mapping_rejects_allow_list_key() {
        let msg = invalid_config(PartialOptions::from_mapping(&mapping(
            "proxied_compiler_options: [js_compressor]",
        )));
        assert!(msg.contains(PROXIED_OPTIONS_KEY));
    }

    #[test]
    fn test_from_mapping_rejects_unknown_key() {
        invalid_config(PartialOptions::from_mapping(&mapping(
            "not_a_good_setting: some_value",
        )));
    }

    #[test]
    fn test_from_mapping_rejects_unknown_compressor() {
        invalid_config(PartialOptions::from_mapping(&mapping("js_compressor: uglifier")));
    }

    #[test]
    fn test_compiler_option_table() {
        let options = AssetOptions {
            css_compressor: Some(Compressor::Whitespace),
            ..Default::default()
        };
        assert_eq!(CompilerOption::JsCompressor.value(&options), None);
        assert_eq!(
            CompilerOption::CssCompressor.value(&options),
            Some(Compressor::Whitespace)
        );
        assert_eq!(CompilerOption::JsCompressor.key(), "js_compressor");
        assert!(CompilerOption::CssCompressor.extensions().contains(&"css"));
    }

    #[test]
    fn test_hash_mode_is_enabled() {
        assert!(HashMode::On.is_enabled());
        assert!(HashMode::AlsoUnhashed.is_enabled());
        assert!(!HashMode::Off.is_enabled());
    }
}
