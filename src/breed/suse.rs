//! SUSE / openSUSE trees.

use std::path::{Path, PathBuf};

use super::redhat::{INITRD_PREFIXES, KERNEL_PREFIXES};
use super::{
    matching_entries, numeric_fields, read_discinfo_timestamp, starts_with_any, BreedStrategy,
    Family, ReleaseInfo, RepoLayout, TreeContext, ALL_ARCHES,
};
use crate::model::{Arch, KernelVariant};

const NOISE: &[(&str, &str)] = &[
    ("-loader", ""),
    ("-boot", ""),
    ("-os", ""),
    ("-tree", ""),
    ("srv-www-cobbler-", ""),
    ("var-www-cobbler-", ""),
    ("ks_mirror-", ""),
];

const KERNEL_PACKAGE_MARKERS: &[&str] = &[
    "kernel-header",
    "kernel-source",
    "kernel-smp",
    "kernel-default",
    "kernel-desktop",
    "linux-headers-",
    "kernel-devel",
    "kernel-",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SuseStrategy;

impl BreedStrategy for SuseStrategy {
    fn family(&self) -> Family {
        Family::Suse
    }

    fn signatures(&self) -> &'static [&'static str] {
        &["suse"]
    }

    fn valid_arches(&self) -> &'static [Arch] {
        ALL_ARCHES
    }

    fn valid_breeds(&self) -> &'static [&'static str] {
        &["suse"]
    }

    fn valid_os_versions(&self, _breed: &str) -> &'static [&'static str] {
        &["suse", "other"]
    }

    fn is_kernel(&self, filename: &str) -> bool {
        starts_with_any(filename, KERNEL_PREFIXES) && !filename.contains("initrd")
    }

    fn is_initrd(&self, filename: &str) -> bool {
        starts_with_any(filename, INITRD_PREFIXES) && filename != "initrd.size"
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
        NOISE
    }

    fn kernel_suffixes(&self) -> &'static [(&'static str, &'static str)] {
        &[("PAE", "-PAE"), ("xen", "-xen")]
    }

    fn is_arch_hint_file(&self, filename: &str) -> bool {
        (filename.ends_with("rpm") || filename.ends_with("deb"))
            && KERNEL_PACKAGE_MARKERS.iter().any(|m| filename.contains(m))
    }

    fn kernel_options(&self, ctx: &TreeContext<'_>, distro_name: &str) -> String {
        format!(
            "install={}",
            ctx.settings.http_url(&format!("links/{distro_name}"))
        )
    }

    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf> {
        matching_entries(ctx.pkgdir, |name| {
            name.contains("release-") && name.to_ascii_lowercase().contains("suse")
        })
        .into_iter()
        .map(|(_, path)| path)
        .collect()
    }

    fn scan_release(&self, ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo> {
        let filename = marker.file_name()?.to_string_lossy();
        let fields = numeric_fields(&filename);
        let major: u32 = fields.first()?.parse().ok()?;
        let minor = fields.get(1).copied().unwrap_or("0").to_string();
        Some(ReleaseInfo {
            flavor: "suse".to_string(),
            major,
            minor,
            release: None,
            update: None,
            os_version: "suse".to_string(),
            build_time: read_discinfo_timestamp(ctx.root),
        })
    }

    fn answer_file(&self, ctx: &TreeContext<'_>, _info: &ReleaseInfo, _arch: Arch) -> PathBuf {
        ctx.settings.answer_file_dir.join("autoyast_sample.xml")
    }

    fn comment(&self, _ctx: &TreeContext<'_>, info: &ReleaseInfo, arch: Arch) -> String {
        format!("suse {}.{} {}", info.major, info.minor, arch)
    }

    fn repo_layout(&self) -> RepoLayout {
        RepoLayout::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_predicates_exclude_size_and_initrd_kernels() {
        let s = SuseStrategy;
        assert!(s.is_initrd("initrd"));
        assert!(!s.is_initrd("initrd.size"));
        assert!(s.is_kernel("linux"));
        assert!(!s.is_kernel("linux-initrd"));
    }

    #[test]
    fn test_kernel_options_point_at_links() {
        let settings = Settings::default();
        let root = Path::new("/var/www/cobbler/ks_mirror/sles11");
        let ctx = TreeContext {
            root,
            pkgdir: root,
            breed: "suse",
            mirror_name: "sles11",
            network_root: None,
            settings: &settings,
        };
        assert_eq!(
            SuseStrategy.kernel_options(&ctx, "sles11-x86_64"),
            "install=http://@@http_server@@/cblr/links/sles11-x86_64"
        );
    }

    #[test]
    fn test_scan_release_reads_numbers() {
        let settings = Settings::default();
        let root = Path::new("/nonexistent/sles11");
        let ctx = TreeContext {
            root,
            pkgdir: root,
            breed: "suse",
            mirror_name: "sles11",
            network_root: None,
            settings: &settings,
        };
        let info = SuseStrategy
            .scan_release(&ctx, Path::new("/x/openSUSE-release-11.4-1.8.x86_64.rpm"))
            .unwrap();
        assert_eq!((info.major, info.minor.as_str()), (11, "4"));
        assert_eq!(info.os_version, "suse");
        assert!(info.build_time.is_none());
    }
}
