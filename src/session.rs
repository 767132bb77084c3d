//! One import, end to end.
//!
//! ```text
//! validate ─► select breed ─► mirror (local) ─► hints ─► crawl ─► plan
//!                                                                  │
//!   report ◄─ repos (local) ◄─ tree location ◄─ answer files ◄─ register
//! ```
//!
//! Everything up to and including `plan` (plus the release pre-scan) only
//! reads, so session-fatal errors leave the entity store untouched.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::arch;
use crate::breed::{self, debian, BreedStrategy, Family, RepoLayout, TreeContext};
use crate::config::Settings;
use crate::crawl;
use crate::error::{ImportError, ImportResult};
use crate::fetch::{is_remote_source, TreeFetcher};
use crate::kickstart;
use crate::model::Arch;
use crate::preflight::{warn_missing_tools, REPO_INDEX_TOOLS};
use crate::process::CommandRunner;
use crate::register;
use crate::repos;
use crate::store::EntityStore;
use crate::tree;

/// Parameters of one import. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    /// Tree is already served at this URL; nothing is copied.
    pub network_root: Option<String>,
    pub arch: Option<String>,
    pub breed: Option<String>,
    pub os_version: Option<String>,
    pub kickstart: Option<PathBuf>,
    /// Passed to the fetcher on top of its defaults.
    pub rsync_flags: Option<String>,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub breed: String,
    pub os_version: Option<String>,
    /// Directory that was crawled.
    pub root: PathBuf,
    pub distros: Vec<String>,
    pub profiles: Vec<String>,
    pub repos: Vec<String>,
    /// Candidates and entities dropped with a warning.
    pub skipped: usize,
    /// Best-effort actions that failed.
    pub failures: usize,
    pub unreadable_dirs: usize,
}

/// Validated parameters.
#[derive(Debug)]
struct Request {
    source: PathBuf,
    name: String,
    network_root: Option<String>,
    arch: Option<Arch>,
    breed: Option<String>,
    os_version: Option<String>,
    kickstart: Option<PathBuf>,
    rsync_flags: Option<String>,
}

pub struct ImportSession<'a> {
    settings: &'a Settings,
    store: &'a mut dyn EntityStore,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn TreeFetcher,
}

impl<'a> ImportSession<'a> {
    pub fn new(
        settings: &'a Settings,
        store: &'a mut dyn EntityStore,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn TreeFetcher,
    ) -> Self {
        Self {
            settings,
            store,
            runner,
            fetcher,
        }
    }

    pub fn run(&mut self, options: ImportOptions) -> ImportResult<ImportReport> {
        let req = validate(options)?;

        // Breed selection, from the override or the source tree's signature.
        let family = match &req.breed {
            Some(b) => Family::for_breed(b)?,
            None => {
                let (family, _) = breed::detect(&req.source).ok_or_else(|| {
                    ImportError::NoSignature {
                        path: req.source.clone(),
                    }
                })?;
                family
            }
        };
        let strategy = family.strategy();
        let breed_name = match (&req.breed, family) {
            (Some(b), _) => b.clone(),
            (None, Family::Debian) => debian::infer_breed(&req.source).to_string(),
            (None, f) => f.to_string(),
        };
        info!(breed = %breed_name, source = %req.source.display(), "selected breed");

        if let Some(a) = req.arch {
            if !strategy.valid_arches().contains(&a) {
                return Err(ImportError::ArchNotValidForBreed {
                    arch: a,
                    breed: breed_name,
                });
            }
        }
        if let Some(v) = &req.os_version {
            if !strategy.valid_os_versions(&breed_name).contains(&v.as_str()) {
                return Err(ImportError::InvalidOsVersion {
                    os_version: v.clone(),
                    breed: breed_name,
                });
            }
        }

        // Where the crawl happens.
        let (root, mirror_name) = match &req.network_root {
            Some(_) => (req.source.clone(), req.name.clone()),
            None => {
                let (dest, mirror_name) = self.destination(strategy, &req)?;
                self.fetcher
                    .fetch(&req.source, &dest, req.rsync_flags.as_deref())?;
                (dest, mirror_name)
            }
        };

        let pkgdir = match breed::find_signature(strategy, &root) {
            Some(p) => p,
            None => {
                if req.breed.is_some() {
                    warn!(root = %root.display(), breed = %breed_name, "no signature for the given breed, continuing");
                }
                root.clone()
            }
        };

        let ctx = TreeContext {
            root: &root,
            pkgdir: &pkgdir,
            breed: &breed_name,
            mirror_name: &mirror_name,
            network_root: req.network_root.as_deref(),
            settings: self.settings,
        };

        let hints = arch::tree_hints(strategy, &ctx);
        let crawled = crawl::crawl(strategy, &root);
        if crawled.candidates.is_empty() {
            warn!(root = %root.display(), "no kernel/initrd pairs found");
        }
        let plan = register::plan(strategy, &ctx, crawled.candidates, req.arch, &hints)?;
        let release = kickstart::scan_tree_release(strategy, &ctx);
        kickstart::check_os_version(req.os_version.as_deref(), release.as_ref())?;

        // From here on the store is written.
        let registered = register::register(
            strategy,
            &ctx,
            &plan.planned,
            req.os_version.as_deref(),
            self.store,
        )?;
        let answers = kickstart::resolve_answer_files(
            strategy,
            &ctx,
            &registered.distros,
            &registered.profiles,
            release.as_ref(),
            req.kickstart.as_deref(),
            self.store,
        )?;
        let trees = tree::configure_tree_locations(strategy, &ctx, &registered.distros, self.store)?;

        let found_repos = if req.network_root.is_none() {
            if strategy.repo_layout() == RepoLayout::YumComps {
                warn_missing_tools(REPO_INDEX_TOOLS);
            }
            repos::discover(strategy, &ctx, &registered.distros, self.store, self.runner)?
        } else {
            info!("tree is not mirrored locally, skipping repository discovery");
            repos::RepoOutcome::default()
        };

        let report = ImportReport {
            breed: breed_name.clone(),
            os_version: req
                .os_version
                .clone()
                .or_else(|| release.as_ref().map(|r| r.os_version.clone())),
            root: root.clone(),
            distros: registered.distros,
            profiles: registered.profiles,
            repos: found_repos.repos,
            skipped: plan.skipped + registered.skipped + answers.skipped + found_repos.skipped,
            failures: trees.failures + found_repos.failures,
            unreadable_dirs: crawled.unreadable.len(),
        };
        info!(
            distros = report.distros.len(),
            repos = report.repos.len(),
            skipped = report.skipped,
            failures = report.failures,
            "import finished"
        );
        Ok(report)
    }

    /// Local mirror destination and the mirror name, with the arch appended
    /// when one was given and the name does not carry it yet.
    fn destination(&self, strategy: &dyn BreedStrategy, req: &Request) -> ImportResult<(PathBuf, String)> {
        let mirror_root = self.settings.mirror_root();
        let dest = mirror_root.join(&req.name);

        let Some(given) = req.arch else {
            if dest.exists() {
                return Err(ImportError::DestinationExists { path: dest });
            }
            return Ok((dest, req.name.clone()));
        };

        match arch::path_arch(strategy, &req.name) {
            Some(found) if found != given => Err(ImportError::ArchConflict {
                path: dest,
                path_arch: found,
                override_arch: given,
            }),
            Some(_) => Ok((dest, req.name.clone())),
            None => {
                let name = format!("{}-{}", req.name, given);
                Ok((mirror_root.join(&name), name))
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(options: ImportOptions) -> ImportResult<Request> {
    let source = options
        .path
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ImportError::MissingParameter("path"))?;
    let name = non_empty(options.name).ok_or(ImportError::MissingParameter("name"))?;

    let arch = non_empty(options.arch)
        .map(|a| Arch::from_override(&a))
        .transpose()?;
    let breed = non_empty(options.breed).map(|b| b.to_ascii_lowercase());
    if let Some(b) = &breed {
        Family::for_breed(b)?;
    }

    let kickstart = options.kickstart.filter(|p| !p.as_os_str().is_empty());
    if let Some(ks) = &kickstart {
        if !ks.is_file() {
            return Err(ImportError::KickstartMissing { path: ks.clone() });
        }
    }

    let network_root = non_empty(options.network_root)
        .map(|nr| normalize_network_root(&nr))
        .transpose()?;

    let source_str = source.to_string_lossy();
    if network_root.is_none() && is_remote_source(&source_str) {
        return Err(ImportError::UnsupportedProtocol(source_str.into_owned()));
    }
    if !source.exists() {
        return Err(ImportError::SourceMissing { path: source });
    }

    Ok(Request {
        source,
        name,
        network_root,
        arch,
        breed,
        os_version: non_empty(options.os_version),
        kickstart,
        rsync_flags: non_empty(options.rsync_flags),
    })
}

/// Check the scheme and ensure a trailing `/`.
pub fn normalize_network_root(raw: &str) -> ImportResult<String> {
    if !["nfs://", "ftp://", "http://"].iter().any(|p| raw.starts_with(p)) {
        return Err(ImportError::InvalidNetworkRoot(raw.to_string()));
    }
    if let Some(rest) = raw.strip_prefix("nfs://") {
        if !rest.contains(':') {
            return Err(ImportError::NfsRootMissingColon(raw.to_string()));
        }
    }
    let mut root = raw.to_string();
    if !root.ends_with('/') {
        root.push('/');
    }
    Ok(root)
}

/// Convenience for callers holding a path-like source.
pub fn options_for(path: &Path, name: &str) -> ImportOptions {
    ImportOptions {
        path: Some(path.to_path_buf()),
        name: Some(name.to_string()),
        ..ImportOptions::default()
    }
}
