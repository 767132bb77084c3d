//! VMware ESX (service console RPMs) and ESXi (`vmkernel.gz`) media.

use flate2::read::GzDecoder;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    matching_entries, starts_with_any, BreedStrategy, Family, ReleaseInfo, RepoLayout,
    TreeContext, BASE_NOISE,
};
use crate::model::{Arch, Distro};

const KERNEL_PREFIXES: &[&str] = &["vmlinu", "kernel.img", "linux", "mboot.c32"];
const INITRD_PREFIXES: &[&str] = &["initrd", "ramdisk.image.gz", "vmkboot.gz"];

/// Images an ESXi installer pulls over TFTP alongside the kernel.
const ESXI_BOOT_IMAGES: &[&str] = &[
    "vmkernel.gz",
    "sys.vgz",
    "cim.vgz",
    "ienviron.vgz",
    "install.vgz",
];

/// Shortest printable run kept when searching the ESXi kernel for its banner.
const MIN_STRING_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct VmwareStrategy;

impl VmwareStrategy {
    /// `(major, minor, release, update)` from an ESX release RPM name.
    pub fn scan_esx_package(filename: &str) -> Option<(u32, String, String, String)> {
        let re = Regex::new(r"release-(\d+)-(\d+)\.(\d+)\.(\d+)-(\d+)\.").ok()?;
        let caps = re.captures(filename)?;
        Some((
            caps[2].parse().ok()?,
            caps[3].to_string(),
            caps[4].to_string(),
            caps[5].to_string(),
        ))
    }

    /// `(major, minor, release, build)` from the banner inside an ESXi kernel.
    pub fn scan_esxi_banner(text: &str) -> Option<(u32, String, String, String)> {
        let re = Regex::new(r"ESXi (\d+)\.(\d+)\.(\d+) \[Releasebuild-(\d+)\]").ok()?;
        text.lines()
            .filter(|l| l.trim_start().to_ascii_lowercase().starts_with("vmware esxi"))
            .find_map(|line| {
                let caps = re.captures(line)?;
                Some((
                    caps[1].parse().ok()?,
                    caps[2].to_string(),
                    caps[3].to_string(),
                    caps[4].to_string(),
                ))
            })
    }

    fn read_esxi_kernel(path: &Path) -> Option<String> {
        let file = File::open(path).ok()?;
        let mut bytes = Vec::new();
        if let Err(e) = GzDecoder::new(file).read_to_end(&mut bytes) {
            debug!(path = %path.display(), error = %e, "cannot decompress ESXi kernel");
            return None;
        }
        Some(printable_strings(&bytes, MIN_STRING_LEN).join("\n"))
    }
}

/// Runs of printable ASCII at least `min` bytes long.
fn printable_strings(bytes: &[u8], min: usize) -> Vec<String> {
    bytes
        .split(|b| !(b.is_ascii_graphic() || *b == b' '))
        .filter(|run| run.len() >= min)
        .map(|run| String::from_utf8_lossy(run).into_owned())
        .collect()
}

impl BreedStrategy for VmwareStrategy {
    fn family(&self) -> Family {
        Family::Vmware
    }

    fn signatures(&self) -> &'static [&'static str] {
        &["VMware/RPMS", "imagedd.bz2"]
    }

    fn valid_arches(&self) -> &'static [Arch] {
        &[Arch::I386, Arch::X86_64]
    }

    fn valid_breeds(&self) -> &'static [&'static str] {
        &["vmware"]
    }

    fn valid_os_versions(&self, _breed: &str) -> &'static [&'static str] {
        &["esx4", "esxi4", "esxi5"]
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

    fn fallback_arch(&self) -> Option<Arch> {
        Some(Arch::X86_64)
    }

    fn release_markers(&self, ctx: &TreeContext<'_>) -> Vec<PathBuf> {
        let rpms: Vec<PathBuf> = matching_entries(ctx.pkgdir, |name| {
            name.starts_with("vmware-esx-vmware-release-")
        })
        .into_iter()
        .map(|(_, path)| path)
        .collect();
        if !rpms.is_empty() {
            return rpms;
        }
        let vmkernel = ctx.root.join("vmkernel.gz");
        if vmkernel.is_file() {
            vec![vmkernel]
        } else {
            Vec::new()
        }
    }

    fn scan_release(&self, _ctx: &TreeContext<'_>, marker: &Path) -> Option<ReleaseInfo> {
        let filename = marker.file_name()?.to_string_lossy();
        let (flavor, (major, minor, release, update)) = if filename == "vmkernel.gz" {
            let text = Self::read_esxi_kernel(marker)?;
            ("esxi", Self::scan_esxi_banner(&text)?)
        } else {
            ("esx", Self::scan_esx_package(&filename)?)
        };
        Some(ReleaseInfo {
            flavor: flavor.to_string(),
            os_version: format!("{flavor}{major}"),
            major,
            minor,
            release: Some(release),
            update: Some(update),
            build_time: None,
        })
    }

    fn answer_file(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, _arch: Arch) -> PathBuf {
        let name = match info.os_version.as_str() {
            "esx4" => "esx.ks",
            "esxi4" => "esxi.ks",
            _ => "default.ks",
        };
        ctx.settings.answer_file_dir.join(name)
    }

    fn comment(&self, _ctx: &TreeContext<'_>, info: &ReleaseInfo, _arch: Arch) -> String {
        format!(
            "{}.{}.{} update {}",
            info.major,
            info.minor,
            info.release.as_deref().unwrap_or("0"),
            info.update.as_deref().unwrap_or("0")
        )
    }

    fn apply_release_extras(&self, ctx: &TreeContext<'_>, info: &ReleaseInfo, distro: &mut Distro) {
        if info.flavor != "esxi" {
            return;
        }
        distro.boot_files = ESXI_BOOT_IMAGES
            .iter()
            .map(|f| format!("$img_path/{f}={}/{f}", ctx.root.display()))
            .collect::<Vec<_>>()
            .join(" ");
    }

    fn repo_layout(&self) -> RepoLayout {
        RepoLayout::Unsupported
    }
}
