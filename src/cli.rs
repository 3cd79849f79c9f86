//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rewrite asset tags in a site's working copy
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Config file name, relative to the site root
    #[arg(short = 'C', long, default_value = "palimpsest_config.yml")]
    pub config: PathBuf,

    /// Parent directory for working directories (default: system temp dir)
    #[arg(long)]
    pub tmp_dir: Option<String>,

    /// Prefix of working directory names
    #[arg(long, default_value = "palimpsest_")]
    pub prefix: String,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Which site to work on and where to take it from.
#[derive(clap::Args, Debug, Clone)]
pub struct SiteArgs {
    /// Site name, used in the working directory name
    #[arg(short, long)]
    pub name: String,

    /// Git repository to extract the site from
    #[arg(short, long, required_unless_present = "source", conflicts_with = "source")]
    pub repo: Option<PathBuf>,

    /// Revision to extract from the repository
    #[arg(short = 'R', long, default_value = "master")]
    pub revision: String,

    /// Plain directory to copy the site from
    #[arg(short, long)]
    pub source: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Populate a working directory and rewrite every asset tag in it
    Compile {
        #[command(flatten)]
        site: SiteArgs,

        /// Remove the working directory when done
        #[arg(long)]
        cleanup: bool,
    },

    /// Validate the config and list asset groups and tagged files
    Check {
        #[command(flatten)]
        site: SiteArgs,
    },
}

impl Cli {
    pub const fn site(&self) -> &SiteArgs {
        match &self.command {
            Commands::Compile { site, .. } | Commands::Check { site } => site,
        }
    }
}
