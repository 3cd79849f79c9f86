//! Running external optimisers.
//!
//! Image compression shells out to `pngcrush` and `jpegoptim`. Their stderr
//! is chatty, so successful runs are logged through a [`FilterRule`].

use crate::log;
use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command with arguments.
///
/// ```ignore
/// exec!(["jpegoptim"]; "-q", path)?;
/// exec!(dir; ["pngcrush"]; "-q", "input.png", "output.png")?;
/// exec!(filter=&QUIET; ["pngcrush"]; "-q", input, output)?;
/// ```
#[macro_export]
macro_rules! exec {
    (filter=$filter:expr; $($rest:tt)*) => {
        $crate::exec!(@run $filter; $($rest)*)
    };
    (@run $filter:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some($root),
            &$crate::utils::exec::to_cmd_vec($cmd),
            &$crate::utils::exec::filter_args(&[$($crate::utils::exec::to_os($arg)),*]),
            $filter,
        )
    };
    (@run $filter:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            None,
            &$crate::utils::exec::to_cmd_vec($cmd),
            &$crate::utils::exec::filter_args(&[$($crate::utils::exec::to_os($arg)),*]),
            $filter,
        )
    };
    ($($rest:tt)*) => {
        $crate::exec!(@run &$crate::utils::exec::EMPTY_FILTER; $($rest)*)
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[doc(hidden)]
pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
    s.into()
}

#[doc(hidden)]
pub fn to_cmd_vec<const N: usize>(cmd: [&str; N]) -> Vec<OsString> {
    cmd.into_iter().map(OsString::from).collect()
}

/// Drop empty arguments, so optional flags can be passed as `""`.
#[doc(hidden)]
pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
    args.iter().filter(|a| !a.is_empty()).cloned().collect()
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output.
///
/// # Errors
/// Returns error if the command cannot be spawned or exits non-zero.
pub fn exec(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
    filter: &'static FilterRule,
) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if !output.status.success() {
        bail!(format_error(&name, &output));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    filter.log(&name, stderr.trim());
    Ok(output)
}

fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let (program, rest) = cmd.split_first().context("Empty command")?;
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(rest).args(args);
    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = format!("Command `{name}` failed with {}", output.status);
    if !stderr.trim().is_empty() {
        msg.push('\n');
        msg.push_str(stderr.trim());
    }
    msg
}

// ============================================================================
// Output Filtering
// ============================================================================

/// Lines starting with any of these prefixes are not logged.
pub struct FilterRule {
    pub skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p))
    }

    fn log(&self, name: &str, output: &str) {
        let lines: Vec<_> = output
            .lines()
            .map(str::trim)
            .filter(|line| !self.should_skip(line))
            .collect();

        if !lines.is_empty() {
            log!(name; "{}", lines.join("\n"));
        }
    }
}

pub const EMPTY_FILTER: FilterRule = FilterRule::new(&[]);

// ============================================================================
// Tests
// ============================================================================
