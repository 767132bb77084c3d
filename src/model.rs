//! Entities produced by an import and the transient crawl candidate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ImportError;

/// Hardware architecture a distro boots on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    I386,
    Ia64,
    Ppc,
    Ppc64,
    S390,
    S390x,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    pub const ALL: [Arch; 7] = [
        Arch::I386,
        Arch::Ia64,
        Arch::Ppc,
        Arch::Ppc64,
        Arch::S390,
        Arch::S390x,
        Arch::X86_64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::I386 => "i386",
            Arch::Ia64 => "ia64",
            Arch::Ppc => "ppc",
            Arch::Ppc64 => "ppc64",
            Arch::S390 => "s390",
            Arch::S390x => "s390x",
            Arch::X86_64 => "x86_64",
        }
    }

    /// Parse a user supplied `--arch`, folding the 32-bit x86 spellings.
    pub fn from_override(raw: &str) -> Result<Arch, ImportError> {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "x86" | "i486" | "i586" | "i686" => Ok(Arch::I386),
            other => other.parse(),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ImportError::InvalidArch(s.to_string()))
    }
}

/// Virtualization hint recorded on a default profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtType {
    Vmware,
    Xenpv,
    Qemu,
}

impl fmt::Display for VirtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VirtType::Vmware => "vmware",
            VirtType::Xenpv => "xenpv",
            VirtType::Qemu => "qemu",
        };
        f.write_str(s)
    }
}

/// A registered bootable OS variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distro {
    pub name: String,
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub arch: Arch,
    pub breed: String,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub kernel_options: String,
    /// Template metadata; `tree` holds the install tree location.
    #[serde(default)]
    pub ks_meta: BTreeMap<String, String>,
    /// `[repo definition url, tree url]` pairs found inside the tree.
    #[serde(default)]
    pub source_repos: Vec<[String; 2]>,
    #[serde(default)]
    pub tree_build_time: Option<String>,
    #[serde(default)]
    pub boot_files: String,
    #[serde(default)]
    pub fetchable_files: String,
}

impl Distro {
    pub fn new(name: &str, kernel: PathBuf, initrd: PathBuf, arch: Arch, breed: &str) -> Self {
        Self {
            name: name.to_string(),
            kernel,
            initrd,
            arch,
            breed: breed.to_string(),
            os_version: None,
            comment: String::new(),
            kernel_options: String::new(),
            ks_meta: BTreeMap::new(),
            source_repos: Vec::new(),
            tree_build_time: None,
            boot_files: String::new(),
            fetchable_files: String::new(),
        }
    }

    pub fn tree(&self) -> Option<&str> {
        self.ks_meta.get("tree").map(String::as_str)
    }
}

/// A provisioning configuration bound to one distro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub distro: String,
    #[serde(default)]
    pub kickstart: Option<PathBuf>,
    pub virt_type: VirtType,
}

/// Package repository kind as understood by the mirror sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoBreed {
    Yum,
    Apt,
}

/// A package repository discovered inside an imported tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub breed: RepoBreed,
    pub arch: Arch,
    pub mirror: String,
    #[serde(default)]
    pub os_version: Option<String>,
    pub mirror_locally: bool,
    pub keep_updated: bool,
    pub priority: u32,
    #[serde(default)]
    pub yumopts: BTreeMap<String, String>,
}

pub const DEFAULT_REPO_PRIORITY: u32 = 99;

/// Kernel flavor a crawler slot pair was filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    Default,
    Pae,
}

/// A kernel/initrd pair found in one directory, not yet named or registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroCandidate {
    pub dir: PathBuf,
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub variant: KernelVariant,
}
