//! Default values for configuration fields.
//!
//! Used by `educe` to derive `Default` for option structs.

// ============================================================================
// Asset Group Defaults
// ============================================================================

pub mod assets {
    use crate::config::options::{CompilerOption, HashMode};

    pub fn search_backend() -> String {
        "grep".into()
    }

    pub fn inline_keyword() -> String {
        "inline".into()
    }

    pub fn hash() -> HashMode {
        HashMode::On
    }

    pub fn tag_open() -> String {
        "[%".into()
    }

    pub fn tag_close() -> String {
        "%]".into()
    }

    pub fn proxied_compiler_options() -> Vec<CompilerOption> {
        CompilerOption::ALL.to_vec()
    }
}

// ============================================================================
// Environment Defaults
// ============================================================================

pub mod environment {
    use std::path::PathBuf;

    pub fn tmp_dir() -> PathBuf {
        std::env::temp_dir()
    }

    pub fn dir_prefix() -> String {
        "palimpsest_".into()
    }

    pub fn config_file() -> PathBuf {
        "palimpsest_config.yml".into()
    }

    pub fn revision() -> String {
        "master".into()
    }
}
