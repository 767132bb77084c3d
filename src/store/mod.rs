//! Entity store boundary.
//!
//! The import engine only ever finds entities by name and adds them. Adding an
//! entity whose name already exists replaces the stored copy; that path is used
//! to re-save entities this session created, never to overwrite foreign ones
//! (callers check [`EntityStore::find_distro`] and friends first).

mod json;

pub use json::JsonStore;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Distro, Profile, Repo};

pub trait EntityStore {
    fn find_distro(&self, name: &str) -> Option<Distro>;
    fn find_profile(&self, name: &str) -> Option<Profile>;
    fn find_repo(&self, name: &str) -> Option<Repo>;

    fn add_distro(&mut self, distro: Distro, persist: bool) -> Result<()>;
    /// Fails if the profile's parent distro is unknown.
    fn add_profile(&mut self, profile: Profile, persist: bool) -> Result<()>;
    fn add_repo(&mut self, repo: Repo, persist: bool) -> Result<()>;
}

/// The three entity collections, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Collections {
    pub(crate) distros: BTreeMap<String, Distro>,
    pub(crate) profiles: BTreeMap<String, Profile>,
    pub(crate) repos: BTreeMap<String, Repo>,
}

impl Collections {
    pub(crate) fn insert_profile(&mut self, profile: Profile) -> Result<()> {
        if !self.distros.contains_key(&profile.distro) {
            bail!(
                "profile '{}' references unknown distro '{}'",
                profile.name,
                profile.distro
            );
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Collections,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distros(&self) -> impl Iterator<Item = &Distro> {
        self.data.distros.values()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.data.profiles.values()
    }

    pub fn repos(&self) -> impl Iterator<Item = &Repo> {
        self.data.repos.values()
    }
}

impl EntityStore for MemoryStore {
    fn find_distro(&self, name: &str) -> Option<Distro> {
        self.data.distros.get(name).cloned()
    }

    fn find_profile(&self, name: &str) -> Option<Profile> {
        self.data.profiles.get(name).cloned()
    }

    fn find_repo(&self, name: &str) -> Option<Repo> {
        self.data.repos.get(name).cloned()
    }

    fn add_distro(&mut self, distro: Distro, _persist: bool) -> Result<()> {
        self.data.distros.insert(distro.name.clone(), distro);
        Ok(())
    }

    fn add_profile(&mut self, profile: Profile, _persist: bool) -> Result<()> {
        self.data.insert_profile(profile)
    }

    fn add_repo(&mut self, repo: Repo, _persist: bool) -> Result<()> {
        self.data.repos.insert(repo.name.clone(), repo);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Arch, VirtType};
    use std::path::PathBuf;

    fn distro(name: &str) -> Distro {
        Distro::new(
            name,
            PathBuf::from("/t/vmlinuz"),
            PathBuf::from("/t/initrd.img"),
            Arch::X86_64,
            "redhat",
        )
    }

    #[test]
    fn test_profile_requires_parent() {
        let mut store = MemoryStore::new();
        let profile = Profile {
            name: "f15-x86_64".into(),
            distro: "f15-x86_64".into(),
            kickstart: None,
            virt_type: VirtType::Qemu,
        };
        assert!(store.add_profile(profile.clone(), true).is_err());

        store.add_distro(distro("f15-x86_64"), true).unwrap();
        store.add_profile(profile, true).unwrap();
        assert!(store.find_profile("f15-x86_64").is_some());
    }

    #[test]
    fn test_add_replaces_by_name() {
        let mut store = MemoryStore::new();
        store.add_distro(distro("a"), true).unwrap();
        let mut amended = distro("a");
        amended.comment = "6.0".into();
        store.add_distro(amended, true).unwrap();

        assert_eq!(store.distros().count(), 1);
        assert_eq!(store.find_distro("a").unwrap().comment, "6.0");
    }
}
