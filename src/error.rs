//! Error taxonomy shared by every module.
//!
//! Functions return `anyhow::Result` and raise these through `bail!`, so
//! callers recover the variant with `err.downcast_ref::<Error>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Write to a field that is frozen once the environment is populated.
    #[error("Cannot redefine `{0}` once populated")]
    InvalidState(&'static str),

    #[error("Cannot populate without a site")]
    MissingSite,

    #[error("Cannot populate without a revision")]
    MissingRevision,

    #[error("Unsafe path `{0}`")]
    UnsafePath(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Search backend `{0}` is not supported, only `grep` is available")]
    UnsupportedBackend(String),

    /// Only ever logged: a tag referencing it is left in place.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::Io(
            PathBuf::from("palimpsest_config.yml"),
            std::io::Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("palimpsest_config.yml"));

        let display = Error::InvalidState("site").to_string();
        assert_eq!(display, "Cannot redefine `site` once populated");

        let display = Error::InvalidConfig("bad path in config".into()).to_string();
        assert!(display.contains("bad path in config"));
    }

    #[test]
    fn test_error_downcast_through_anyhow() {
        let err: anyhow::Error = Error::UnsupportedBackend("ripgrep".into()).into();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnsupportedBackend(name)) if name == "ripgrep"
        ));
    }
}
