//! Debian and Ubuntu mirrors and netboot trees.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    matching_entries, starts_with_any, BreedStrategy, Family, ReleaseInfo, RepoLayout,
    TreeContext, BASE_NOISE,
};
use crate::model::Arch;

pub const DEBIAN_CODENAMES: &[&str] = &["etch", "lenny", "squeeze"];
pub const UBUNTU_CODENAMES: &[&str] = &[
    "dapper", "hardy", "intrepid", "jaunty", "karmic", "lucid", "maverick", "natty",
];

const DEBIAN_OS_VERSIONS: &[&str] = &[
    "etch",
    "lenny",
    "squeeze",
    "sid",
    "stable",
    "testing",
    "unstable",
    "experimental",
];

const KERNEL_PREFIXES: &[&str] = &["vmlinu", "kernel.img", "linux", "mboot.c32"];
const INITRD_PREFIXES: &[&str] = &["initrd", "ramdisk.image.gz", "vmkboot.gz"];

#[derive(Debug, Clone, Copy, Default)]
pub struct DebianStrategy;

/// Decide between `debian` and `ubuntu` for a tree with no explicit breed.
///
/// A `debian`/`ubuntu` entry symlinked back to the tree itself (the layout
/// of official mirrors) or a tree directory named after the breed wins;
/// otherwise the codenames under `dists/` decide; otherwise `debian`.
pub fn infer_breed(root: &Path) -> &'static str {
    let canonical_root = fs::canonicalize(root).ok();
    for breed in ["debian", "ubuntu"] {
        let entry = root.join(breed);
        if entry.is_symlink() && fs::canonicalize(&entry).ok() == canonical_root {
            return breed;
        }
        if root.file_name().is_some_and(|n| n == breed) {
            return breed;
        }
    }

    let dists = matching_entries(&root.join("dists"), |name| UBUNTU_CODENAMES.contains(&name));
    if dists.is_empty() {
        "debian"
    } else {
        "ubuntu"
    }
}

fn codenames_for(breed: &str) -> &'static [&'static str] {
    if breed == "ubuntu" {
        UBUNTU_CODENAMES
    } else {
        DEBIAN_CODENAMES
    }
}

/// `(major, minor, release)` from the `Version:` line of a `Release` file,
/// padding missing fields with `0`.
pub fn parse_release_version(contents: &str) -> Option<(String, String, String)> {
    let version = contents.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case("version").then(|| value.trim())
    })?;
    if version.is_empty() {
        return None;
    }
    let mut parts = version.split('.').map(str::to_string);
    let major = parts.next()?;
    let minor = parts.next().unwrap_or_else(|| "0".to_string());
    let release = parts.next().unwrap_or_else(|| "0".to_string());
    Some((major, minor, release))
}

impl BreedStrategy for DebianStrategy {
    fn family(&self) -> Family {
        Family::Debian
    }

    fn signatures(&self) -> &'static [&'static str] {
        &["pool"]
    }

    fn valid_arches(&self) -> &'static [Arch] {
        &[Arch::I386, Arch::Ppc, Arch::X86_64]
    }

    fn valid_breeds(&self) -> &'static [&'static str] {
        &["debian", "ubuntu"]
    }

    fn valid_os_versions(&self, breed: &str) -> &'static [&'static str] {
        if breed == "ubuntu" {
            UBUNTU_CODENAMES
        } else {
            DEBIAN_OS_VERSIONS
        }
    }

    fn is_kernel(&self, filename: &str) -> bool {
        starts_with_any(filename, KERNEL_PREFIXES)
    }

    fn is_initrd(&self, filename: &str) -> bool {
        starts_with_any(filename, INITRD_PREFIXES)
    }

    fn noise_tokens(&self) -> &'static [(&'static str, &'static str)] {
        BASE_NOISE
    }

    fn is_arch_hint_file(&self, filename: &str) -> bool {
        filename.ends_with("deb") && filename.starts_with("linux-headers-")
    }

    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf> {
        let known = codenames_for(ctx.breed);
        matching_entries(&ctx.root.join("dists"), |name| known.contains(&name))
            .into_iter()
            .map(|(_, path)| path)
            .filter(|p| p.is_dir())
            .collect()
    }

    fn scan_release(&self, _ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo> {
        let codename = marker.file_name()?.to_string_lossy().into_owned();
        let contents = fs::read_to_string(marker.join("Release")).ok()?;
        let (major, minor, release) = parse_release_version(&contents)?;
        Some(ReleaseInfo {
            major: major.parse().ok()?,
            minor,
            release: Some(release),
            update: None,
            os_version: codename.clone(),
            flavor: codename,
            build_time: None,
        })
    }

    fn answer_file(&self, ctx: &TreeContext<'_>, _info: &ReleaseInfo, _arch: Arch) -> PathBuf {
        ctx.settings.answer_file_dir.join("sample.seed")
    }

    fn comment(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, arch: Arch) -> String {
        format!(
            "{} {} ({}.{}.{}) {}",
            ctx.breed,
            info.flavor,
            info.major,
            info.minor,
            info.release.as_deref().unwrap_or("0"),
            arch
        )
    }

    fn local_install_tree(&self, ctx: &TreeContext<'_>, distro_name: &str) -> Option<String> {
        if ctx.root.join("dists").is_dir() {
            Some(ctx.settings.http_url(&format!("ks_mirror/{}", ctx.mirror_name)))
        } else {
            Some(ctx.settings.http_url(&format!("repo_mirror/{distro_name}")))
        }
    }

    fn repo_layout(&self) -> RepoLayout {
        RepoLayout::AptPool
    }
}
