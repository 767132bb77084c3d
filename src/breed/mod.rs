//! Per-OS-family strategies.
//!
//! Each family (Red Hat, Debian/Ubuntu, SUSE, FreeBSD, VMware) implements
//! [`BreedStrategy`]: the predicates and tables the generic crawl, naming,
//! arch and answer-file passes consume. Strategies are stateless unit structs;
//! everything tree-specific arrives through a [`TreeContext`].
//!
//! # Example
//!
//! ```rust
//! use distro_import::breed::Family;
//!
//! let redhat = Family::for_breed("redhat").unwrap().strategy();
//! assert!(redhat.is_kernel("vmlinuz"));
//! assert!(redhat.is_initrd("initrd.img"));
//! assert!(!redhat.allows_multi_arch());
//! ```

pub mod debian;
pub mod freebsd;
pub mod redhat;
pub mod suse;
pub mod vmware;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::ImportError;
use crate::model::{Arch, Distro, KernelVariant};

/// Every architecture the Linux families know about.
pub(crate) const ALL_ARCHES: &[Arch] = &[
    Arch::I386,
    Arch::Ia64,
    Arch::Ppc,
    Arch::Ppc64,
    Arch::S390,
    Arch::S390x,
    Arch::X86_64,
];

/// Filename fragments of kernel packages whose name carries the tree's arch.
pub(crate) const KERNEL_PACKAGE_MARKERS: &[&str] = &[
    "kernel-header",
    "kernel-source",
    "kernel-smp",
    "kernel-largesmp",
    "kernel-hugemem",
    "linux-headers-",
    "kernel-devel",
    "kernel-",
];

/// Noise stripped from Red Hat, Debian and VMware directory names.
pub(crate) const BASE_NOISE: &[(&str, &str)] = &[
    ("-netboot", ""),
    ("-ubuntu-installer", ""),
    ("-amd64", ""),
    ("-i386", ""),
    ("-images", ""),
    ("-pxeboot", ""),
    ("-install", ""),
    ("-isolinux", ""),
    ("-os", ""),
    ("-tree", ""),
    ("var-www-cobbler-", ""),
    ("ks_mirror-", ""),
    ("chrp", "ppc64"),
];

/// OS family. Declaration order is signature detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Debian,
    Freebsd,
    Redhat,
    Suse,
    Vmware,
}

impl Family {
    pub const ALL: [Family; 5] = [
        Family::Debian,
        Family::Freebsd,
        Family::Redhat,
        Family::Suse,
        Family::Vmware,
    ];

    /// Map a breed name (as given with `--breed`) to its family.
    pub fn for_breed(breed: &str) -> Result<Family, ImportError> {
        match breed.trim().to_ascii_lowercase().as_str() {
            "redhat" => Ok(Family::Redhat),
            "debian" | "ubuntu" => Ok(Family::Debian),
            "suse" => Ok(Family::Suse),
            "freebsd" => Ok(Family::Freebsd),
            "vmware" => Ok(Family::Vmware),
            other => Err(ImportError::UnknownBreed(other.to_string())),
        }
    }

    pub fn strategy(self) -> &'static dyn BreedStrategy {
        match self {
            Family::Debian => &debian::DebianStrategy,
            Family::Freebsd => &freebsd::FreebsdStrategy,
            Family::Redhat => &redhat::RedhatStrategy,
            Family::Suse => &suse::SuseStrategy,
            Family::Vmware => &vmware::VmwareStrategy,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Family::Debian => "debian",
            Family::Freebsd => "freebsd",
            Family::Redhat => "redhat",
            Family::Suse => "suse",
            Family::Vmware => "vmware",
        };
        f.write_str(s)
    }
}

/// Tree-level facts shared by every strategy call in one session.
#[derive(Debug, Clone, Copy)]
pub struct TreeContext<'a> {
    /// Root of the tree being crawled (the mirror destination, or the source
    /// itself for network-root imports).
    pub root: &'a Path,
    /// Matched signature path; equals `root` when none matched.
    pub pkgdir: &'a Path,
    /// Concrete breed name, e.g. `ubuntu` within the Debian family.
    pub breed: &'a str,
    pub mirror_name: &'a str,
    pub network_root: Option<&'a str>,
    pub settings: &'a Settings,
}

/// Version facts read from a release marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// `fedora`, `redhat`, `centos`, a Debian codename, `suse`, `freebsd`, `esx`, `esxi`.
    pub flavor: String,
    pub major: u32,
    pub minor: String,
    pub release: Option<String>,
    pub update: Option<String>,
    /// Canonical label recorded as the distro's OS version.
    pub os_version: String,
    pub build_time: Option<String>,
}

/// Where a family keeps package repositories inside its trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoLayout {
    /// `repodata/` or `base/` next to a `*comps*.xml` group file.
    YumComps,
    /// A top-level `pool/` served by apt mirrors.
    AptPool,
    /// The family ships no usable in-tree repositories.
    Absent,
    /// Repositories may exist but cannot be discovered.
    Unsupported,
}

pub trait BreedStrategy: Sync {
    fn family(&self) -> Family;

    /// Relative paths whose presence identifies a tree of this family.
    fn signatures(&self) -> &'static [&'static str];

    fn valid_arches(&self) -> &'static [Arch];

    fn valid_breeds(&self) -> &'static [&'static str];

    fn valid_os_versions(&self, breed: &str) -> &'static [&'static str];

    fn is_kernel(&self, filename: &str) -> bool;

    fn is_initrd(&self, filename: &str) -> bool;

    /// Which crawler slot pair a kernel or initrd file belongs to.
    fn kernel_variant(&self, _filename: &str) -> KernelVariant {
        KernelVariant::Default
    }

    /// Directory basenames that never yield a kernel/initrd pair.
    fn excluded_dirs(&self) -> &'static [&'static str] {
        &[]
    }

    fn allows_multi_arch(&self) -> bool {
        true
    }

    /// Ordered `(from, to)` substring replacements applied to proposed names.
    fn noise_tokens(&self) -> &'static [(&'static str, &'static str)];

    /// Kernel filename markers and the name suffix each one adds.
    fn kernel_suffixes(&self) -> &'static [(&'static str, &'static str)] {
        &[("PAE", "-PAE")]
    }

    /// Package filenames whose embedded arch hints at the tree's arch.
    fn is_arch_hint_file(&self, filename: &str) -> bool {
        (filename.ends_with("rpm") || filename.ends_with("deb"))
            && KERNEL_PACKAGE_MARKERS.iter().any(|m| filename.contains(m))
    }

    /// Directory walked for arch hint files.
    fn hint_root<'a>(&self, ctx: &TreeContext<'a>) -> &'a Path {
        ctx.pkgdir
    }

    /// Arch to assume when neither the path nor the tree reveal one.
    fn fallback_arch(&self) -> Option<Arch> {
        None
    }

    fn kernel_options(&self, _ctx: &TreeContext<'_>, _distro_name: &str) -> String {
        String::new()
    }

    /// Files whose names or contents carry the tree's release version.
    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf>;

    fn scan_release(&self, ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo>;

    /// Answer file for a distro of this release and arch.
    fn answer_file(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, arch: Arch) -> PathBuf;

    fn comment(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, arch: Arch) -> String;

    /// Family-specific distro fields derived from the release.
    fn apply_release_extras(&self, _ctx: &TreeContext<'_>, _info: &ReleaseInfo, _distro: &mut Distro) {}

    /// Install tree URL for a locally mirrored tree. `None` selects the
    /// generic per-distro link under the web root.
    fn local_install_tree(&self, _ctx: &TreeContext<'_>, _distro_name: &str) -> Option<String> {
        None
    }

    fn repo_layout(&self) -> RepoLayout;
}

/// First signature of `strategy` present under `root`.
pub fn find_signature(strategy: &dyn BreedStrategy, root: &Path) -> Option<PathBuf> {
    strategy
        .signatures()
        .iter()
        .map(|sig| root.join(sig))
        .find(|p| p.exists())
}

/// Detect the family of the tree at `root`, returning it with the matched
/// signature path.
pub fn detect(root: &Path) -> Option<(Family, PathBuf)> {
    Family::ALL.iter().find_map(|family| {
        find_signature(family.strategy(), root).map(|pkgdir| (*family, pkgdir))
    })
}

/// Sorted `(name, path)` pairs of the entries of `dir` accepted by `keep`.
pub(crate) fn matching_entries(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            keep(&name).then(|| (name, e.path()))
        })
        .collect();
    out.sort();
    out
}

/// First line of the tree's `.discinfo`, the build timestamp on Red Hat style media.
pub(crate) fn read_discinfo_timestamp(root: &Path) -> Option<String> {
    let raw = fs::read_to_string(root.join(".discinfo")).ok()?;
    let first = raw.lines().next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// All-digit `-` or `.` separated fields of a package filename, in order.
pub(crate) fn numeric_fields(filename: &str) -> Vec<&str> {
    filename
        .split('.')
        .flat_map(|t| t.split('-'))
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

pub(crate) fn starts_with_any(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| name.starts_with(p))
}

/// First of `candidates` that exists, else `fallback`.
pub(crate) fn first_existing(candidates: Vec<PathBuf>, fallback: PathBuf) -> PathBuf {
    candidates
        .into_iter()
        .find(|p| p.exists())
        .unwrap_or(fallback)
}
