//! Red Hat family: RHEL, CentOS, Fedora, Scientific Linux.

use std::path::{Path, PathBuf};

use super::{
    first_existing, matching_entries, numeric_fields, read_discinfo_timestamp, starts_with_any,
    BreedStrategy, Family, ReleaseInfo, RepoLayout, TreeContext, ALL_ARCHES, BASE_NOISE,
};
use crate::model::{Arch, KernelVariant};

pub const SIGNATURES: &[&str] = &[
    "RedHat/RPMS",
    "RedHat/rpms",
    "RedHat/Base",
    "Fedora/RPMS",
    "Fedora/rpms",
    "CentOS/RPMS",
    "CentOS/rpms",
    "CentOS",
    "Packages",
    "Fedora",
    "Server",
    "Client",
    "SL",
];

pub const OS_VERSIONS: &[&str] = &[
    "rhel2.1", "rhel3", "rhel4", "rhel5", "rhel6", "fedora5", "fedora6", "fedora7", "fedora8",
    "fedora9", "fedora10", "fedora11", "fedora12", "fedora13", "fedora14", "fedora15",
    "generic24", "generic26", "virtio26", "other",
];

pub(crate) const KERNEL_PREFIXES: &[&str] = &["vmlinu", "kernel.img", "linux"];
pub(crate) const INITRD_PREFIXES: &[&str] = &["initrd", "ramdisk.image.gz"];

/// RHEL 2-4 package suffixes that pin the major version on their own.
const RHEL_EDITIONS: &[(&[&str], u32)] = &[
    (&["4AS", "4ES", "4WS", "4common", "4Desktop"], 4),
    (&["3AS", "3ES", "3WS", "3Desktop"], 3),
    (&["2AS", "2ES", "2WS", "2Desktop"], 2),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RedhatStrategy;

impl RedhatStrategy {
    /// `(flavor, major, minor)` from a `*-release-*` package filename.
    pub fn scan_package_name(filename: &str) -> Option<(String, u32, u32)> {
        for (editions, major) in RHEL_EDITIONS {
            if editions.iter().any(|e| filename.contains(e)) {
                return Some(("redhat".to_string(), *major, 0));
            }
        }

        let lower = filename.to_ascii_lowercase();
        let flavor = if lower.contains("centos") {
            "centos"
        } else if lower.contains("fedora") {
            "fedora"
        } else {
            "redhat"
        };

        let fields = numeric_fields(filename);
        let [major, minor, ..] = fields.as_slice() else {
            return None;
        };
        Some((flavor.to_string(), major.parse().ok()?, minor.parse().ok()?))
    }

    pub fn os_version_for(flavor: &str, major: u32) -> String {
        match flavor {
            "fedora" => format!("fedora{major}"),
            _ if major <= 2 => "rhel2.1".to_string(),
            _ => format!("rhel{major}"),
        }
    }
}

impl BreedStrategy for RedhatStrategy {
    fn family(&self) -> Family {
        Family::Redhat
    }

    fn signatures(&self) -> &'static [&'static str] {
        SIGNATURES
    }

    fn valid_arches(&self) -> &'static [Arch] {
        ALL_ARCHES
    }

    fn valid_breeds(&self) -> &'static [&'static str] {
        &["redhat"]
    }

    fn valid_os_versions(&self, _breed: &str) -> &'static [&'static str] {
        OS_VERSIONS
    }

    fn is_kernel(&self, filename: &str) -> bool {
        starts_with_any(filename, KERNEL_PREFIXES)
    }

    fn is_initrd(&self, filename: &str) -> bool {
        starts_with_any(filename, INITRD_PREFIXES)
    }

    fn kernel_variant(&self, filename: &str) -> KernelVariant {
        if filename.contains("PAE") {
            KernelVariant::Pae
        } else {
            KernelVariant::Default
        }
    }

    fn excluded_dirs(&self) -> &'static [&'static str] {
        &["isolinux"]
    }

    fn allows_multi_arch(&self) -> bool {
        false
    }

    fn noise_tokens(&self) -> &'static [(&'static str, &'static str)] {
        BASE_NOISE
    }

    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf> {
        matching_entries(ctx.pkgdir, |name| {
            name.contains("release-")
                && !name.contains("notes")
                && ["fedora", "redhat", "centos"].iter().any(|f| name.contains(f))
        })
        .into_iter()
        .map(|(_, path)| path)
        .collect()
    }

    fn scan_release(&self, ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo> {
        let filename = marker.file_name()?.to_string_lossy();
        let (flavor, major, minor) = Self::scan_package_name(&filename)?;
        Some(ReleaseInfo {
            os_version: Self::os_version_for(&flavor, major),
            flavor,
            major,
            minor: minor.to_string(),
            release: None,
            update: None,
            build_time: read_discinfo_timestamp(ctx.root),
        })
    }

    fn answer_file(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, arch: Arch) -> PathBuf {
        let kb = &ctx.settings.answer_file_dir;
        let osv = &info.os_version;
        let minor = &info.minor;
        let candidates = vec![
            kb.join(arch.as_str()).join(format!("{osv}.{minor}.ks")),
            kb.join(arch.as_str()).join(format!("{osv}.ks")),
            kb.join(format!("{osv}.{minor}.ks")),
            kb.join(format!("{osv}.ks")),
            kb.join(arch.as_str()).join("default.ks"),
            kb.join(format!("{}.ks", info.flavor)),
        ];

        let fallback = match info.flavor.as_str() {
            "fedora" if info.major >= 8 => "sample_end.ks",
            "fedora" if info.major >= 6 => "sample.ks",
            "redhat" | "centos" if info.major >= 5 => "sample.ks",
            _ => "legacy.ks",
        };
        first_existing(candidates, kb.join(fallback))
    }

    fn comment(&self, _ctx: &TreeContext<'_>, info: &ReleaseInfo, _arch: Arch) -> String {
        match &info.build_time {
            Some(ts) => format!("{}.{} (tree built {})", info.os_version, info.minor, ts),
            None => format!("{}.{}", info.os_version, info.minor),
        }
    }

    fn repo_layout(&self) -> RepoLayout {
        RepoLayout::YumComps
    }
}
