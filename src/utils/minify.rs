//! Text compressors for compiled scripts and stylesheets.
//!
//! `minify-html` only works on documents, so a script or stylesheet is
//! wrapped in its element, minified, then unwrapped again.

use crate::config::{CompilerOption, Compressor};

/// Compress one compiled asset.
///
/// Falls back to the input bytes if the minified document cannot be
/// unwrapped.
pub fn compress(compressor: Compressor, option: CompilerOption, source: &[u8]) -> Vec<u8> {
    match compressor {
        Compressor::Whitespace => strip_whitespace(source),
        Compressor::Minify => minify_wrapped(option, source),
    }
}

/// Trim every line and drop blank ones.
fn strip_whitespace(source: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(source)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn minify_wrapped(option: CompilerOption, source: &[u8]) -> Vec<u8> {
    let (open, close) = match option {
        CompilerOption::JsCompressor => ("<script>", "</script>"),
        CompilerOption::CssCompressor => ("<style>", "</style>"),
    };

    let mut document = Vec::with_capacity(open.len() + source.len() + close.len());
    document.extend_from_slice(open.as_bytes());
    document.extend_from_slice(source);
    document.extend_from_slice(close.as_bytes());

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    let minified = minify_html::minify(&document, &cfg);

    minified
        .strip_prefix(open.as_bytes())
        .and_then(|rest| rest.strip_suffix(close.as_bytes()))
        .map_or_else(|| source.to_vec(), <[u8]>::to_vec)
}
