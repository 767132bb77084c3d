//! Package repositories shipped inside a mirrored tree.
//!
//! Yum style trees carry `repodata/` (or `base/` on old media) next to a
//! `*comps*.xml` group file. Each such directory gets its metadata rebuilt
//! with `createrepo`, a `.repo` definition under the mirror's config dir, and
//! a repo entity. Debian pools without `dists/` get a pair of disabled apt
//! repos pointing at the public mirrors.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::breed::{matching_entries, BreedStrategy, RepoLayout, TreeContext};
use crate::error::ImportResult;
use crate::model::{Distro, Repo, RepoBreed, DEFAULT_REPO_PRIORITY};
use crate::naming::path_tail;
use crate::process::{Cmd, CommandRunner};
use crate::store::EntityStore;

const METADATA_DIRS: &[&str] = &["repodata", "base"];

#[derive(Debug, Default)]
pub struct RepoOutcome {
    pub repos: Vec<String>,
    pub skipped: usize,
    pub failures: usize,
}

/// Discover repositories for every distro in `distros`.
pub fn discover(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    distros: &[String],
    store: &mut dyn EntityStore,
    runner: &dyn CommandRunner,
) -> ImportResult<RepoOutcome> {
    let mut out = RepoOutcome::default();

    match strategy.repo_layout() {
        RepoLayout::YumComps => {
            let comps_dirs = find_comps_dirs(ctx.root);
            if comps_dirs.is_empty() {
                info!(root = %ctx.root.display(), "no comps metadata found in tree");
            }
            let mut rebuilt = HashSet::new();
            for name in distros {
                let Some(mut distro) = store.find_distro(name) else {
                    continue;
                };
                for dir in &comps_dirs {
                    process_comps_dir(ctx, dir, &mut distro, &mut rebuilt, store, runner, &mut out)?;
                }
                store.add_distro(distro, true)?;
            }
        }
        RepoLayout::AptPool => {
            if !ctx.root.join("pool").is_dir() || ctx.root.join("dists").exists() {
                info!(root = %ctx.root.display(), "tree is a full mirror, no apt repos added");
                return Ok(out);
            }
            for name in distros {
                let Some(distro) = store.find_distro(name) else {
                    continue;
                };
                for repo in apt_repos(ctx, &distro) {
                    add_repo(store, repo, &mut out)?;
                }
            }
        }
        RepoLayout::Absent => {
            info!(breed = %ctx.breed, "no in-tree repositories for this breed");
        }
        RepoLayout::Unsupported => {
            warn!(breed = %ctx.breed, "repository discovery is not possible for this breed");
        }
    }

    Ok(out)
}

/// Directories holding `repodata/` or `base/` with a comps group file.
pub fn find_comps_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|dir| {
            METADATA_DIRS
                .iter()
                .any(|m| !comps_files(&dir.join(m)).is_empty())
        })
        .collect()
}

fn comps_files(dir: &Path) -> Vec<PathBuf> {
    matching_entries(dir, |name| name.contains("comps") && name.ends_with(".xml"))
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

fn process_comps_dir(
    ctx: &TreeContext<'_>,
    dir: &Path,
    distro: &mut Distro,
    rebuilt: &mut HashSet<PathBuf>,
    store: &mut dyn EntityStore,
    runner: &dyn CommandRunner,
    out: &mut RepoOutcome,
) -> ImportResult<()> {
    let master = if dir.join("repodata").exists() {
        "repodata"
    } else {
        "base"
    };
    let Some(comps) = comps_files(&dir.join(master)).into_iter().next() else {
        info!(dir = %dir.join(master).display(), "no comps file here");
        return Ok(());
    };
    let Some(urlseg) = path_tail(&ctx.settings.mirror_root(), dir) else {
        warn!(dir = %dir.display(), "repo dir is outside the mirror root, skipping");
        out.skipped += 1;
        return Ok(());
    };

    let counter = distro.source_repos.len();
    let repo_file = ctx
        .settings
        .repo_config_dir()
        .join(format!("{}-{}.repo", distro.name, counter));
    let tree_url = ctx.settings.http_url(&format!("ks_mirror/{urlseg}"));
    if let Err(e) = write_repo_file(&repo_file, counter, &tree_url, &ctx.settings.repo_priority_token) {
        error!(file = %repo_file.display(), error = %format!("{e:#}"), "cannot write repo definition");
        out.failures += 1;
        return Ok(());
    }
    distro.source_repos.push([
        ctx.settings
            .http_url(&format!("ks_mirror/config/{}-{}.repo", distro.name, counter)),
        tree_url,
    ]);

    if rebuilt.insert(dir.to_path_buf()) {
        if let Err(e) = rebuild_index(ctx, dir, &comps, runner) {
            error!(dir = %dir.display(), error = %format!("{e:#}"), "createrepo failed, ignoring");
            out.failures += 1;
        }
    }

    let repo = Repo {
        name: format!("{}-core-{}", distro.name, counter),
        breed: RepoBreed::Yum,
        arch: distro.arch,
        mirror: dir.display().to_string(),
        os_version: distro.os_version.clone(),
        mirror_locally: false,
        keep_updated: false,
        priority: DEFAULT_REPO_PRIORITY,
        yumopts: BTreeMap::new(),
    };
    add_repo(store, repo, out)
}

fn write_repo_file(path: &Path, counter: usize, baseurl: &str, priority: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let body = format!(
        "[core-{counter}]\nname=core-{counter}\nbaseurl={baseurl}\nenabled=1\ngpgcheck=0\npriority={priority}\n"
    );
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

fn rebuild_index(ctx: &TreeContext<'_>, dir: &Path, comps: &Path, runner: &dyn CommandRunner) -> Result<()> {
    let olddata = dir.join("repodata").join(".olddata");
    if olddata.exists() {
        fs::remove_dir_all(&olddata)
            .with_context(|| format!("Failed to remove {}", olddata.display()))?;
    }

    Cmd::new("createrepo")
        .args(ctx.settings.createrepo_args())
        .arg("--groupfile")
        .arg_path(comps)
        .arg_path(dir)
        .error_msg("createrepo failed")
        .run_with(runner)?;

    // Old media read comps from base/; keep it in step with the rebuilt copy.
    let fresh = dir.join("repodata").join("comps.xml");
    let legacy = dir.join("base").join("comps.xml");
    if fresh.exists() && legacy.exists() {
        fs::copy(&fresh, &legacy)
            .with_context(|| format!("Failed to copy {} to {}", fresh.display(), legacy.display()))?;
    }
    Ok(())
}

fn apt_repos(ctx: &TreeContext<'_>, distro: &Distro) -> [Repo; 2] {
    let yumopts: BTreeMap<String, String> = ["--ignore-release-gpg", "--verbose"]
        .iter()
        .map(|k| (k.to_string(), String::new()))
        .collect();
    let base = Repo {
        name: distro.name.clone(),
        breed: RepoBreed::Apt,
        arch: distro.arch,
        mirror: format!(
            "http://ftp.{}.debian.org/debian/dists/@@suite@@",
            ctx.settings.apt_mirror_country
        ),
        os_version: distro.os_version.clone(),
        mirror_locally: false,
        keep_updated: false,
        priority: DEFAULT_REPO_PRIORITY,
        yumopts,
    };
    let security = Repo {
        name: format!("{}-security", distro.name),
        mirror: "http://security.debian.org/debian-security/dists/@@suite@@/updates".to_string(),
        ..base.clone()
    };
    [base, security]
}

fn add_repo(store: &mut dyn EntityStore, repo: Repo, out: &mut RepoOutcome) -> ImportResult<()> {
    if store.find_repo(&repo.name).is_some() {
        warn!(name = %repo.name, "repo already exists, skipping");
        out.skipped += 1;
        return Ok(());
    }
    info!(name = %repo.name, mirror = %repo.mirror, "created repo");
    out.repos.push(repo.name.clone());
    store.add_repo(repo, true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Family;
    use crate::config::Settings;
    use crate::model::Arch;
    use crate::process::RecordingRunner;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn settings(webdir: &Path) -> Settings {
        Settings {
            webdir: webdir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn seeded(name: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .add_distro(
                Distro::new(name, "/k".into(), "/i".into(), Arch::X86_64, "redhat"),
                true,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_yum_repo_discovery() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let root = s.mirror_root().join("rhel5-x86_64");
        let server = root.join("Server");
        fs::create_dir_all(server.join("repodata/.olddata")).unwrap();
        fs::write(server.join("repodata/comps-rhel5-server-core.xml"), "<comps/>").unwrap();
        fs::create_dir_all(root.join("images")).unwrap();

        let ctx = TreeContext {
            root: &root,
            pkgdir: &server,
            breed: "redhat",
            mirror_name: "rhel5-x86_64",
            network_root: None,
            settings: &s,
        };
        let mut store = seeded("rhel5-x86_64");
        let runner = RecordingRunner::new();

        let out = discover(
            Family::Redhat.strategy(),
            &ctx,
            &["rhel5-x86_64".to_string()],
            &mut store,
            &runner,
        )
        .unwrap();

        assert_eq!(out.repos, vec!["rhel5-x86_64-core-0"]);
        assert_eq!(out.failures, 0);
        assert!(!server.join("repodata/.olddata").exists());

        let body = fs::read_to_string(s.repo_config_dir().join("rhel5-x86_64-0.repo")).unwrap();
        assert!(body.starts_with("[core-0]\nname=core-0\n"));
        assert!(body.contains("baseurl=http://@@http_server@@/cblr/ks_mirror/rhel5-x86_64/Server\n"));
        assert!(body.contains("priority=$yum_distro_priority"));

        let distro = store.find_distro("rhel5-x86_64").unwrap();
        assert_eq!(distro.source_repos.len(), 1);
        assert!(distro.source_repos[0][0].ends_with("ks_mirror/config/rhel5-x86_64-0.repo"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "createrepo");
        assert_eq!(calls[0].last().unwrap(), &server.display().to_string());
        assert!(calls[0].contains(&"--groupfile".to_string()));
    }

    #[test]
    fn test_createrepo_runs_once_per_dir_and_failures_are_soft() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let root = s.mirror_root().join("c5");
        fs::create_dir_all(root.join("repodata")).unwrap();
        fs::write(root.join("repodata/comps.xml"), "<comps/>").unwrap();
        fs::create_dir_all(root.join("base")).unwrap();
        fs::write(root.join("base/comps.xml"), "old").unwrap();

        let ctx = TreeContext {
            root: &root,
            pkgdir: &root,
            breed: "redhat",
            mirror_name: "c5",
            network_root: None,
            settings: &s,
        };
        let mut store = seeded("c5-i386");
        store
            .add_distro(
                Distro::new("c5-x86_64", "/k".into(), "/i".into(), Arch::X86_64, "redhat"),
                true,
            )
            .unwrap();
        let runner = RecordingRunner::new().fail_program("createrepo");

        let out = discover(
            Family::Redhat.strategy(),
            &ctx,
            &["c5-i386".to_string(), "c5-x86_64".to_string()],
            &mut store,
            &runner,
        )
        .unwrap();

        assert_eq!(runner.calls().len(), 1);
        assert_eq!(out.failures, 1);
        assert_eq!(out.repos.len(), 2);
        // The rebuild failed, so base/comps.xml was left alone.
        assert_eq!(fs::read_to_string(root.join("base/comps.xml")).unwrap(), "old");
    }

    #[test]
    fn test_comps_copied_to_base_after_rebuild() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let root = s.mirror_root().join("c4");
        fs::create_dir_all(root.join("repodata")).unwrap();
        fs::write(root.join("repodata/comps.xml"), "new").unwrap();
        fs::create_dir_all(root.join("base")).unwrap();
        fs::write(root.join("base/comps.xml"), "old").unwrap();

        let ctx = TreeContext {
            root: &root,
            pkgdir: &root,
            breed: "redhat",
            mirror_name: "c4",
            network_root: None,
            settings: &s,
        };
        let mut store = seeded("c4-i386");
        discover(
            Family::Redhat.strategy(),
            &ctx,
            &["c4-i386".to_string()],
            &mut store,
            &RecordingRunner::new(),
        )
        .unwrap();
        assert_eq!(fs::read_to_string(root.join("base/comps.xml")).unwrap(), "new");
    }

    #[test]
    fn test_apt_repos_for_pool_without_dists() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let root = s.mirror_root().join("lenny");
        fs::create_dir_all(root.join("pool")).unwrap();
        let ctx = TreeContext {
            root: &root,
            pkgdir: &root.join("pool"),
            breed: "debian",
            mirror_name: "lenny",
            network_root: None,
            settings: &s,
        };
        let mut store = seeded("lenny-x86_64");
        let out = discover(
            Family::Debian.strategy(),
            &ctx,
            &["lenny-x86_64".to_string()],
            &mut store,
            &RecordingRunner::new(),
        )
        .unwrap();

        assert_eq!(out.repos, vec!["lenny-x86_64", "lenny-x86_64-security"]);
        let base = store.find_repo("lenny-x86_64").unwrap();
        assert_eq!(base.breed, RepoBreed::Apt);
        assert_eq!(base.mirror, "http://ftp.us.debian.org/debian/dists/@@suite@@");
        assert!(!base.keep_updated);
        assert!(base.yumopts.contains_key("--ignore-release-gpg"));
        let sec = store.find_repo("lenny-x86_64-security").unwrap();
        assert!(sec.mirror.ends_with("/dists/@@suite@@/updates"));
    }

    #[test]
    fn test_full_debian_mirror_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let s = settings(dir.path());
        let root = s.mirror_root().join("lenny");
        fs::create_dir_all(root.join("pool")).unwrap();
        fs::create_dir_all(root.join("dists/lenny")).unwrap();
        let ctx = TreeContext {
            root: &root,
            pkgdir: &root.join("pool"),
            breed: "debian",
            mirror_name: "lenny",
            network_root: None,
            settings: &s,
        };
        let mut store = seeded("lenny-i386");
        let out = discover(
            Family::Debian.strategy(),
            &ctx,
            &["lenny-i386".to_string()],
            &mut store,
            &RecordingRunner::new(),
        )
        .unwrap();
        assert!(out.repos.is_empty());
    }
}
