//! Bringing a source tree into the local mirror.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

use crate::error::{ImportError, ImportResult};
use crate::preflight::{check_required_tools, MIRROR_TOOLS};
use crate::process::{Cmd, CommandRunner};

/// Source prefixes that cannot be mirrored with a local copy.
pub const REMOTE_PREFIXES: &[&str] = &["http://", "ftp://", "nfs://"];

pub trait TreeFetcher {
    /// Make `dest` hold a copy of `source`. `extra_flags` is a
    /// whitespace-separated list for fetchers that spawn a tool.
    fn fetch(&self, source: &Path, dest: &Path, extra_flags: Option<&str>) -> ImportResult<()>;
}

/// Mirrors with `rsync`, updating an existing destination in place.
pub struct RsyncFetcher<'a> {
    runner: &'a dyn CommandRunner,
    flags: Vec<String>,
    check_host: bool,
}

impl<'a> RsyncFetcher<'a> {
    pub fn new(runner: &'a dyn CommandRunner, default_flags: &str) -> Self {
        let flags = default_flags.split_whitespace().map(str::to_string).collect();
        Self {
            runner,
            flags,
            check_host: true,
        }
    }

    /// Skip the host `rsync` lookup, for runners that never spawn.
    pub fn without_host_check(mut self) -> Self {
        self.check_host = false;
        self
    }

    pub fn command(&self, source: &Path, dest: &Path, extra_flags: Option<&str>) -> Cmd {
        // Trailing slash copies the contents, not the directory itself.
        let src = format!("{}/", source.display().to_string().trim_end_matches('/'));
        Cmd::new("rsync")
            .args(&self.flags)
            .args(extra_flags.unwrap_or_default().split_whitespace())
            .arg(src)
            .arg_path(dest)
            .error_msg("rsync failed")
    }
}

impl TreeFetcher for RsyncFetcher<'_> {
    fn fetch(&self, source: &Path, dest: &Path, extra_flags: Option<&str>) -> ImportResult<()> {
        if self.check_host {
            check_required_tools(MIRROR_TOOLS)?;
        }
        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

        let cmd = self.command(source, dest, extra_flags);
        info!(command = %cmd.display(), "mirroring tree");
        cmd.run_with(self.runner)
            .map_err(|e| ImportError::FetchFailed {
                source_path: source.to_path_buf(),
                dest: dest.to_path_buf(),
                reason: format!("{e:#}"),
            })?;
        Ok(())
    }
}

/// Plain recursive copy preserving symlinks. No host tools needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyFetcher;

impl TreeFetcher for CopyFetcher {
    fn fetch(&self, source: &Path, dest: &Path, _extra_flags: Option<&str>) -> ImportResult<()> {
        info!(source = %source.display(), dest = %dest.display(), "copying tree");
        copy_dir_recursive(source, dest).map_err(|e| ImportError::FetchFailed {
            source_path: source.to_path_buf(),
            dest: dest.to_path_buf(),
            reason: format!("{e:#}"),
        })
    }
}

/// Mirror `src` into `dst`, overwriting files already there. Symlinks are
/// recreated as links, never followed.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        let kind = entry.file_type();

        if kind.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else if kind.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)
                    .with_context(|| format!("Failed to replace {}", target.display()))?;
            }
            std::os::unix::fs::symlink(&link, &target)
                .with_context(|| format!("Failed to create symlink: {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy file: {}", entry.path().display()))?;
        }
    }
    Ok(())
}

pub fn is_remote_source(source: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| source.starts_with(p))
}
