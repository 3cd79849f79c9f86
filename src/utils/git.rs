//! Extracting a revision of a git repository into a plain directory.
//!
//! Equivalent to `git archive <revision> | tar -x -C <dest>`: only the
//! committed tree is written, with no `.git` directory and no index.

use crate::log;
use anyhow::{Context, Result, anyhow, bail};
use gix::{Repository, bstr::ByteSlice};
use std::{fs, path::Path};

/// Write the tree of `revision` in `repository` into `destination`.
///
/// `revision` is anything `git rev-parse` accepts: a branch, tag, or
/// commit id. `destination` must already exist.
pub fn extract_repo(repository: &Path, revision: &str, destination: &Path) -> Result<()> {
    let repo = gix::open(repository)
        .with_context(|| format!("Failed to open repository `{}`", repository.display()))?;

    let tree = repo
        .rev_parse_single(revision)
        .with_context(|| format!("Unknown revision `{revision}`"))?
        .object()?
        .peel_to_tree()?;

    log!("git"; "extracting {revision} ({}) into {}", tree.id, destination.display());
    write_tree(&repo, &tree, destination)
}

fn write_tree(repo: &Repository, tree: &gix::Tree<'_>, dir: &Path) -> Result<()> {
    for entry in tree.iter() {
        let entry = entry?;
        let name = entry
            .filename()
            .to_str()
            .map_err(|_| anyhow!("Invalid UTF-8 in filename"))?;
        if matches!(name, "" | "." | ".." | ".git") || name.contains(['/', '\\']) {
            bail!("Refusing to extract tree entry `{name}`");
        }

        let path = dir.join(name);
        let mode = entry.mode();

        if mode.is_tree() {
            fs::create_dir_all(&path)?;
            let subtree = repo.find_object(entry.oid())?.peel_to_tree()?;
            write_tree(repo, &subtree, &path)?;
        } else if mode.is_commit() {
            // Submodule contents live in another repository
            continue;
        } else if mode.is_link() {
            let object = repo.find_object(entry.oid())?;
            write_symlink(&object.data, &path)?;
        } else {
            let object = repo.find_object(entry.oid())?;
            fs::write(&path, &object.data)?;
            if mode.is_executable() {
                set_executable(&path)?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &[u8], path: &Path) -> Result<()> {
    let target = String::from_utf8_lossy(target);
    std::os::unix::fs::symlink(target.as_ref(), path)?;
    Ok(())
}

/// Without symlink support git checks the link out as a file holding its target.
#[cfg(not(unix))]
fn write_symlink(target: &[u8], path: &Path) -> Result<()> {
    fs::write(path, target)?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

// ============================================================================
// Test Fixtures
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
