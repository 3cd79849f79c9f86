//! Palimpsest - asset tag rewriting for static sites.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, SiteArgs};
use palimpsest::{EnvironmentOptions, Site, SiteEnvironment, Source, log};
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut env, source) = environment(&cli)?;

    match &cli.command {
        Commands::Compile { cleanup, .. } => compile(&mut env, source, *cleanup),
        Commands::Check { .. } => check(&mut env, source),
    }
}

/// Build the environment described by the command line.
fn environment(cli: &Cli) -> Result<(SiteEnvironment, Source)> {
    let mut options = EnvironmentOptions {
        dir_prefix: cli.prefix.clone(),
        config_file: cli.config.clone(),
        ..Default::default()
    };
    if let Some(tmp_dir) = &cli.tmp_dir {
        options.tmp_dir = PathBuf::from(shellexpand::tilde(tmp_dir).into_owned());
    }

    let args: &SiteArgs = cli.site();
    let mut site = Site::new(&args.name);
    let source = match (&args.repo, &args.source) {
        (Some(repo), _) => {
            site = site.with_repository(repo);
            Source::Repository
        }
        (None, Some(dir)) => {
            site = site.with_source(dir);
            Source::Local
        }
        (None, None) => Source::Repository,
    };

    let mut env = SiteEnvironment::new(options);
    env.set_site(site)?;
    env.set_revision(&args.revision)?;
    Ok((env, source))
}

fn compile(env: &mut SiteEnvironment, source: Source, cleanup: bool) -> Result<()> {
    let result = env.populate(source).and_then(|env| env.compile()).map(|_| ());

    if let Err(err) = result {
        env.cleanup().ok();
        return Err(err);
    }

    if let Some(directory) = env.directory() {
        log!("compile"; "done: {}", directory.display());
    }
    if cleanup {
        env.cleanup()?;
    }
    Ok(())
}

fn check(env: &mut SiteEnvironment, source: Source) -> Result<()> {
    let result = list_site(env, source);
    env.cleanup()?;
    result
}

fn list_site(env: &mut SiteEnvironment, source: Source) -> Result<()> {
    env.populate(source)?;

    for group in env.asset_groups()? {
        log!("group"; "{} ({})", group.kind(), group.paths().join(", "));
    }

    let files = env.files_with_tags()?;
    let root = env.directory().map(PathBuf::from).unwrap_or_default();
    for file in &files {
        let shown = file.strip_prefix(&root).unwrap_or(file);
        log!("tags"; "{}", shown.display());
    }
    log!("check"; "{} files with tags", files.len());
    Ok(())
}
