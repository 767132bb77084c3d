//! FreeBSD release trees booted through `pxeboot` and an mfsroot.

use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    matching_entries, BreedStrategy, Family, ReleaseInfo, RepoLayout, TreeContext, ALL_ARCHES,
};
use crate::model::{Arch, Distro};

const OS_VERSIONS: &[&str] = &[
    "freebsd7.0",
    "freebsd7.1",
    "freebsd7.2",
    "freebsd7.3",
    "freebsd7.4",
    "freebsd8.0",
    "freebsd8.1",
    "freebsd8.2",
    "freebsd8.3",
    "freebsd9.0",
    "freebsd9.1",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FreebsdStrategy;

impl BreedStrategy for FreebsdStrategy {
    fn family(&self) -> Family {
        Family::Freebsd
    }

    fn signatures(&self) -> &'static [&'static str] {
        &["etc/freebsd-update.conf", "boot/frames.4th", "8.2-RELEASE"]
    }

    fn valid_arches(&self) -> &'static [Arch] {
        ALL_ARCHES
    }

    fn valid_breeds(&self) -> &'static [&'static str] {
        &["freebsd"]
    }

    fn valid_os_versions(&self, _breed: &str) -> &'static [&'static str] {
        OS_VERSIONS
    }

    fn is_kernel(&self, filename: &str) -> bool {
        filename == "pxeboot" || filename == "pxeboot.bs"
    }

    fn is_initrd(&self, filename: &str) -> bool {
        filename == "mfsroot.gz"
    }

    fn noise_tokens(&self) -> &'static [(&'static str, &'static str)] {
        &[("-boot", "")]
    }

    fn hint_root<'a>(&self, ctx: &TreeContext<'a>) -> &'a Path {
        ctx.root
    }

    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf> {
        matching_entries(ctx.root, |name| name.ends_with("RELEASE"))
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    fn scan_release(&self, _ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo> {
        let filename = marker.file_name()?.to_string_lossy();
        let re = Regex::new(r"(\d+)\.(\d+)-RELEASE").ok()?;
        let caps = re.captures(&filename)?;
        let major: u32 = caps[1].parse().ok()?;
        let minor = caps[2].to_string();
        Some(ReleaseInfo {
            flavor: "freebsd".to_string(),
            os_version: format!("freebsd{major}.{minor}"),
            major,
            minor,
            release: None,
            update: None,
            build_time: None,
        })
    }

    fn answer_file(&self, ctx: &TreeContext<'_>, _info: &ReleaseInfo, _arch: Arch) -> PathBuf {
        ctx.settings.answer_file_dir.join("default.ks")
    }

    fn comment(&self, _ctx: &TreeContext<'_>, info: &ReleaseInfo, _arch: Arch) -> String {
        format!("{}.{}", info.major, info.minor)
    }

    fn apply_release_extras(&self, _ctx: &TreeContext<'_>, _info: &ReleaseInfo, distro: &mut Distro) {
        distro.fetchable_files =
            "boot/mfsroot.gz=$initrd boot/*=$webdir/ks_mirror/$distro/boot/".to_string();
    }

    fn repo_layout(&self) -> RepoLayout {
        RepoLayout::YumComps
    }
}
