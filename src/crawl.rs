//! Tree traversal locating kernel/initrd pairs.
//!
//! The walk uses an explicit worklist and visits entries in name order, so
//! two runs over the same tree yield the same candidates in the same order.
//! Symlinked directories are followed unless their target is the import root
//! or one of its ancestors, or was already visited.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::breed::BreedStrategy;
use crate::model::{DistroCandidate, KernelVariant};

#[derive(Debug, Default)]
struct SlotPair {
    kernel: Option<PathBuf>,
    initrd: Option<PathBuf>,
}

impl SlotPair {
    fn take_if_full(&mut self) -> Option<(PathBuf, PathBuf)> {
        if self.kernel.is_some() && self.initrd.is_some() {
            let kernel = self.kernel.take()?;
            let initrd = self.initrd.take()?;
            return Some((kernel, initrd));
        }
        None
    }
}

/// Everything found by one crawl.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub candidates: Vec<DistroCandidate>,
    /// Directories that could not be listed.
    pub unreadable: Vec<PathBuf>,
}

/// Walk `root` and return every kernel/initrd pair the strategy recognizes.
pub fn crawl(strategy: &dyn BreedStrategy, root: &Path) -> CrawlOutcome {
    let mut outcome = CrawlOutcome::default();
    let root_canon = match fs::canonicalize(root) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "cannot resolve import root");
            outcome.unreadable.push(root.to_path_buf());
            return outcome;
        }
    };

    let mut visited: HashSet<PathBuf> = HashSet::from([root_canon.clone()]);
    let mut worklist: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = worklist.pop() {
        let mut entries: Vec<(String, PathBuf)> = match fs::read_dir(&dir) {
            Ok(rd) => rd
                .flatten()
                .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
                .collect(),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                outcome.unreadable.push(dir);
                continue;
            }
        };
        entries.sort();

        let excluded = dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| strategy.excluded_dirs().iter().any(|x| *x == n));

        let mut default = SlotPair::default();
        let mut pae = SlotPair::default();
        let mut subdirs = Vec::new();

        for (name, path) in entries {
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };

            if meta.file_type().is_symlink() {
                // Follow the link to learn what it points at; dangling links are ignored.
                let Ok(target_meta) = fs::metadata(&path) else {
                    debug!(path = %path.display(), "dangling symlink");
                    continue;
                };
                if target_meta.is_dir() {
                    if let Some(dir) = admit_symlinked_dir(&path, &root_canon, &mut visited) {
                        subdirs.push(dir);
                    }
                    continue;
                }
            } else if meta.is_dir() {
                if let Ok(canon) = fs::canonicalize(&path) {
                    if visited.insert(canon) {
                        subdirs.push(path);
                    }
                }
                continue;
            }

            let is_initrd = strategy.is_initrd(&name);
            let is_kernel = !is_initrd && strategy.is_kernel(&name);
            if !is_initrd && !is_kernel {
                continue;
            }

            let (slot, variant) = match strategy.kernel_variant(&name) {
                KernelVariant::Pae => (&mut pae, KernelVariant::Pae),
                KernelVariant::Default => (&mut default, KernelVariant::Default),
            };
            // A later file replaces an earlier unpaired one in the same slot.
            if is_initrd {
                slot.initrd = Some(path);
            } else {
                slot.kernel = Some(path);
            }

            if let Some((kernel, initrd)) = slot.take_if_full() {
                if excluded {
                    debug!(dir = %dir.display(), "pair in boot loader staging dir ignored");
                    continue;
                }
                debug!(kernel = %kernel.display(), initrd = %initrd.display(), "found kernel/initrd pair");
                outcome.candidates.push(DistroCandidate {
                    dir: dir.clone(),
                    kernel,
                    initrd,
                    variant,
                });
            }
        }

        // Reverse so the lowest-sorted subdirectory is popped first.
        worklist.extend(subdirs.into_iter().rev());
    }

    outcome
}

fn admit_symlinked_dir(
    link: &Path,
    root_canon: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Option<PathBuf> {
    let target = fs::canonicalize(link).ok()?;
    if root_canon.starts_with(&target) {
        warn!(
            link = %link.display(),
            target = %target.display(),
            "avoiding symlink loop"
        );
        return None;
    }
    if !visited.insert(target) {
        debug!(link = %link.display(), "symlink target already visited");
        return None;
    }
    Some(link.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Family;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn redhat() -> &'static dyn BreedStrategy {
        Family::Redhat.strategy()
    }

    #[test]
    fn test_finds_pxeboot_pair() {
        let dir = TempDir::new().unwrap();
        let pxe = dir.path().join("images/pxeboot");
        touch(&pxe.join("vmlinuz"));
        touch(&pxe.join("initrd.img"));
        touch(&pxe.join("TRANS.TBL"));

        let out = crawl(redhat(), dir.path());
        assert_eq!(
            out.candidates,
            vec![DistroCandidate {
                dir: pxe.clone(),
                kernel: pxe.join("vmlinuz"),
                initrd: pxe.join("initrd.img"),
                variant: KernelVariant::Default,
            }]
        );
    }

    #[test]
    fn test_isolinux_never_pairs() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("isolinux/vmlinuz"));
        touch(&dir.path().join("isolinux/initrd.img"));
        assert!(crawl(redhat(), dir.path()).candidates.is_empty());
    }

    #[test]
    fn test_files_from_different_dirs_never_pair() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/vmlinuz"));
        touch(&dir.path().join("b/initrd.img"));
        assert!(crawl(redhat(), dir.path()).candidates.is_empty());
    }

    #[test]
    fn test_pae_slot_pairs_separately() {
        let dir = TempDir::new().unwrap();
        let xen = dir.path().join("images/xen");
        for f in ["initrd.img", "initrdPAE.img", "vmlinuz", "vmlinuzPAE"] {
            touch(&xen.join(f));
        }
        let out = crawl(redhat(), dir.path());
        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.candidates[0].kernel, xen.join("vmlinuz"));
        assert_eq!(out.candidates[1].kernel, xen.join("vmlinuzPAE"));
        assert_eq!(out.candidates[1].initrd, xen.join("initrdPAE.img"));
        assert_eq!(out.candidates[1].variant, KernelVariant::Pae);
    }

    #[test]
    fn test_unpaired_kernel_is_overwritten_by_later_kernel() {
        // kernel.img and linux both precede ramdisk.image.gz in name order;
        // the second kernel replaces the first before the initrd arrives.
        let dir = TempDir::new().unwrap();
        let boot = dir.path().join("boot");
        for f in ["kernel.img", "linux", "ramdisk.image.gz"] {
            touch(&boot.join(f));
        }
        let out = crawl(redhat(), dir.path());
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].kernel, boot.join("linux"));
        assert_eq!(out.candidates[0].initrd, boot.join("ramdisk.image.gz"));
    }

    #[test]
    fn test_symlink_to_root_is_not_followed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mirror");
        touch(&root.join("images/pxeboot/vmlinuz"));
        touch(&root.join("images/pxeboot/initrd.img"));
        symlink(&root, root.join("debian")).unwrap();
        symlink(dir.path(), root.join("images/up")).unwrap();

        let out = crawl(redhat(), &root);
        assert_eq!(out.candidates.len(), 1);
    }

    #[test]
    fn test_symlinked_subtree_is_followed_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tree");
        let real = root.join("images/pxeboot");
        touch(&real.join("vmlinuz"));
        touch(&real.join("initrd.img"));

        let outside = dir.path().join("extra/boot");
        touch(&outside.join("vmlinuz"));
        touch(&outside.join("initrd.img"));
        symlink(&outside, root.join("linked")).unwrap();
        symlink(&real, root.join("alias")).unwrap();

        let out = crawl(redhat(), &root);
        let dirs: Vec<_> = out.candidates.iter().map(|c| c.dir.clone()).collect();
        assert_eq!(dirs.len(), 2, "{dirs:?}");
        assert!(dirs.contains(&root.join("linked")));
    }

    #[test]
    fn test_missing_root_is_reported() {
        let dir = TempDir::new().unwrap();
        let out = crawl(redhat(), &dir.path().join("nope"));
        assert!(out.candidates.is_empty());
        assert_eq!(out.unreadable.len(), 1);
    }
}
