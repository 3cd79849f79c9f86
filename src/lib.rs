//! Palimpsest - asset tag rewriting for static sites.
//!
//! A [`SiteEnvironment`] extracts one revision of a site into a working
//! directory, and each configured [`AssetGroup`] replaces tags such as
//! `[% javascript app %]` with references to compiled, content-hashed
//! assets.
//!
//! ```ignore
//! let mut env = SiteEnvironment::default();
//! env.set_site(Site::new("blog").with_repository("/srv/blog.git"))?;
//! env.set_revision("v2")?;
//! env.populate(Source::Repository)?.compile()?;
//! ```

pub mod assets;
pub mod config;
pub mod environment;
pub mod error;
pub mod logger;
pub mod utils;

pub use assets::AssetGroup;
pub use config::SiteConfig;
pub use environment::{EnvironmentOptions, Site, SiteEnvironment, Source};
pub use error::Error;
