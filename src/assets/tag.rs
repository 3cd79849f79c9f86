//! Asset tag grammar.
//!
//! ```text
//! [% javascript app %]                  link:   app-<digest>.js
//! [% javascript lib/jquery %]           link:   lib/jquery-<digest>.js
//! [% javascript inline tracking %]      inline: compiled source of tracking.js
//! ```
//!
//! The type token is the singular form of the group kind, and delimiters come
//! from the group's options.

use crate::config::AssetOptions;
use regex::{Captures, Regex};

/// One matched tag, split into its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    /// Resolve, write, and link to an asset.
    Link(String),
    /// Replace with an asset's compiled content.
    Inline(&'a str),
}

/// Build the matcher for tags of one group.
///
/// Captures `primary` and an optional `secondary` token.
pub fn tag_regex(kind: &str, options: &AssetOptions) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"{open}\s+{kind}\s+(?P<primary>\S+)(?:\s+(?P<secondary>\S+))?\s+{close}",
        open = regex::escape(&options.tag_open),
        kind = regex::escape(&singularize(kind)),
        close = regex::escape(&options.tag_close),
    ))
}

/// Classify a match as link or inline.
pub fn classify<'a>(caps: &Captures<'a>, inline_keyword: &str) -> Tag<'a> {
    let primary = caps.name("primary").map_or("", |m| m.as_str());
    let secondary = caps.name("secondary").map(|m| m.as_str());

    match secondary {
        Some(name) if primary == inline_keyword => Tag::Inline(name),
        Some(extra) => Tag::Link(format!("{primary} {extra}")),
        None => Tag::Link(primary.to_owned()),
    }
}

/// Reduce a group kind to the singular tag token.
///
/// Covers the plural forms group names take in practice:
/// `javascripts` → `javascript`, `libraries` → `library`, `boxes` → `box`.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies")
        && !stem.is_empty()
    {
        return format!("{stem}y");
    }

    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_owned();
        }
    }

    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_owned();
    }

    word.strip_suffix('s').unwrap_or(word).to_owned()
}
