//! Answer-file and OS-version assignment for newly created profiles.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::breed::{BreedStrategy, ReleaseInfo, TreeContext};
use crate::error::{ImportError, ImportResult};
use crate::store::EntityStore;

/// Interpret the tree's release markers. The last one that parses wins.
pub fn scan_tree_release(strategy: &dyn BreedStrategy, ctx: &TreeContext<'_>) -> Option<ReleaseInfo> {
    let mut found = None;
    for marker in strategy.release_markers(ctx) {
        match strategy.scan_release(ctx, &marker) {
            Some(info) => {
                debug!(marker = %marker.display(), os_version = %info.os_version, "release marker");
                found = Some(info);
            }
            None => warn!(marker = %marker.display(), "cannot interpret release marker"),
        }
    }
    found
}

/// Fail if a requested OS version disagrees with what the tree says.
pub fn check_os_version(requested: Option<&str>, scanned: Option<&ReleaseInfo>) -> ImportResult<()> {
    match (requested, scanned) {
        (Some(req), Some(info)) if req != info.os_version => Err(ImportError::OsVersionMismatch {
            requested: req.to_string(),
            scanned: info.os_version.clone(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct KickstartOutcome {
    /// Profiles that received an answer file.
    pub assigned: Vec<(String, PathBuf)>,
    pub skipped: usize,
}

/// Apply release metadata to `distros` and assign answer files to `profiles`.
///
/// Only profiles created by this import are passed in, and one that already
/// carries an answer file keeps it. `explicit` replaces the per-breed search.
pub fn resolve_answer_files(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    distros: &[String],
    profiles: &[String],
    release: Option<&ReleaseInfo>,
    explicit: Option<&Path>,
    store: &mut dyn EntityStore,
) -> ImportResult<KickstartOutcome> {
    let mut out = KickstartOutcome::default();

    if let Some(info) = release {
        for name in distros {
            let Some(mut distro) = store.find_distro(name) else {
                continue;
            };
            if distro.os_version.is_none() {
                distro.os_version = Some(info.os_version.clone());
            }
            distro.comment = strategy.comment(ctx, info, distro.arch);
            if info.build_time.is_some() {
                distro.tree_build_time = info.build_time.clone();
            }
            strategy.apply_release_extras(ctx, info, &mut distro);
            store.add_distro(distro, true)?;
        }
    }

    for name in profiles {
        let Some(mut profile) = store.find_profile(name) else {
            continue;
        };
        if let Some(existing) = &profile.kickstart {
            debug!(profile = %name, answer_file = %existing.display(), "answer file already set");
            continue;
        }
        let Some(distro) = store.find_distro(&profile.distro) else {
            debug!(profile = %name, distro = %profile.distro, "profile parent not found");
            continue;
        };

        let answer_file = match (explicit, release) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(info)) => strategy.answer_file(ctx, info, distro.arch),
            (None, None) => {
                warn!(profile = %name, "no interpretable release marker, answer file left unset");
                out.skipped += 1;
                continue;
            }
        };

        info!(profile = %name, answer_file = %answer_file.display(), "assigned answer file");
        profile.kickstart = Some(answer_file.clone());
        store.add_profile(profile, true)?;
        out.assigned.push((name.clone(), answer_file));
    }

    Ok(out)
}
