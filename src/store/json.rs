//! Directory-backed store: `distros.json`, `profiles.json`, `repos.json`.
//!
//! The whole store is held under an exclusive lock file for as long as the
//! `JsonStore` is alive. Collections are rewritten with a temp file + rename.

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{Collections, EntityStore};
use crate::model::{Distro, Profile, Repo};

const DISTROS_FILE: &str = "distros.json";
const PROFILES_FILE: &str = "profiles.json";
const REPOS_FILE: &str = "repos.json";
const LOCK_FILE: &str = ".lock";

#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    data: Collections,
    _lock: StoreLock,
}

impl JsonStore {
    /// Open (and create if needed) the store at `root`, taking its lock.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create store dir {}", root.display()))?;
        let lock = StoreLock::acquire(&root.join(LOCK_FILE))?;

        let data = Collections {
            distros: read_collection(&root.join(DISTROS_FILE))?,
            profiles: read_collection(&root.join(PROFILES_FILE))?,
            repos: read_collection(&root.join(REPOS_FILE))?,
        };

        Ok(Self {
            root: root.to_path_buf(),
            data,
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write<T: Serialize>(&self, file: &str, map: &BTreeMap<String, T>) -> Result<()> {
        let dst = self.root.join(file);
        let tmp = self.root.join(tmp_name(file));
        let bytes = serde_json::to_vec_pretty(map)?;
        fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        atomic_rename(&tmp, &dst)
    }
}

impl EntityStore for JsonStore {
    fn find_distro(&self, name: &str) -> Option<Distro> {
        self.data.distros.get(name).cloned()
    }

    fn find_profile(&self, name: &str) -> Option<Profile> {
        self.data.profiles.get(name).cloned()
    }

    fn find_repo(&self, name: &str) -> Option<Repo> {
        self.data.repos.get(name).cloned()
    }

    fn add_distro(&mut self, distro: Distro, persist: bool) -> Result<()> {
        self.data.distros.insert(distro.name.clone(), distro);
        if persist {
            self.write(DISTROS_FILE, &self.data.distros)?;
        }
        Ok(())
    }

    fn add_profile(&mut self, profile: Profile, persist: bool) -> Result<()> {
        self.data.insert_profile(profile)?;
        if persist {
            self.write(PROFILES_FILE, &self.data.profiles)?;
        }
        Ok(())
    }

    fn add_repo(&mut self, repo: Repo, persist: bool) -> Result<()> {
        self.data.repos.insert(repo.name.clone(), repo);
        if persist {
            self.write(REPOS_FILE, &self.data.repos)?;
        }
        Ok(())
    }
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

#[derive(Debug)]
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self> {
        // Never unlink a lock someone else may still hold.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to create lock file: {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            drop(file);
            return Err(anyhow::anyhow!(
                "Entity store is locked by another import: {}",
                path.display()
            ));
        }

        Ok(Self { _file: file })
    }
}

fn tmp_name(prefix: &str) -> String {
    let n = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!(".{prefix}-{n}.tmp")
}

fn atomic_rename(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_e) => {
            // Fall back to copy+remove (e.g. EXDEV).
            fs::copy(src, dst).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), dst.display())
            })?;
            fs::remove_file(src)
                .with_context(|| format!("Failed to remove tmp {}", src.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Arch, RepoBreed, VirtType, DEFAULT_REPO_PRIORITY};
    use tempfile::TempDir;

    fn distro(name: &str) -> Distro {
        Distro::new(
            name,
            PathBuf::from("/srv/t/images/pxeboot/vmlinuz"),
            PathBuf::from("/srv/t/images/pxeboot/initrd.img"),
            Arch::I386,
            "redhat",
        )
    }

    #[test]
    fn test_persisted_entities_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = JsonStore::open(dir.path()).unwrap();
            store.add_distro(distro("rhel5-i386"), true).unwrap();
            store
                .add_profile(
                    Profile {
                        name: "rhel5-i386".into(),
                        distro: "rhel5-i386".into(),
                        kickstart: Some(PathBuf::from("/ks/sample.ks")),
                        virt_type: VirtType::Qemu,
                    },
                    true,
                )
                .unwrap();
            store
                .add_repo(
                    Repo {
                        name: "rhel5-i386-core-0".into(),
                        breed: RepoBreed::Yum,
                        arch: Arch::I386,
                        mirror: "/srv/t".into(),
                        os_version: None,
                        mirror_locally: false,
                        keep_updated: false,
                        priority: DEFAULT_REPO_PRIORITY,
                        yumopts: BTreeMap::new(),
                    },
                    true,
                )
                .unwrap();
        }

        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.find_distro("rhel5-i386").unwrap().arch, Arch::I386);
        assert_eq!(
            store.find_profile("rhel5-i386").unwrap().kickstart,
            Some(PathBuf::from("/ks/sample.ks"))
        );
        assert!(store.find_repo("rhel5-i386-core-0").is_some());
        assert_eq!(store.root(), dir.path());
    }

    #[test]
    fn test_unpersisted_add_is_not_written() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = JsonStore::open(dir.path()).unwrap();
            store.add_distro(distro("scratch"), false).unwrap();
            assert!(store.find_distro("scratch").is_some());
        }
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(store.find_distro("scratch").is_none());
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let _first = JsonStore::open(dir.path()).unwrap();
        let err = JsonStore::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(JsonStore::open(dir.path()).unwrap());
        // The lock file is left in place; only the flock is released.
        assert!(dir.path().join(LOCK_FILE).exists());
        let _second = JsonStore::open(dir.path()).unwrap();
        assert!(JsonStore::open(dir.path()).is_err());
    }

    #[test]
    fn test_corrupt_collection_reports_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DISTROS_FILE), "{not json").unwrap();
        let err = JsonStore::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains(DISTROS_FILE));
    }
}
