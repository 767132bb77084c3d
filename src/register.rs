//! Turning crawl candidates into distro and profile entities.
//!
//! [`plan`] names every candidate and resolves its arches without touching
//! the store, so arch conflicts abort the import before anything is written.
//! [`register`] then creates one distro and one default profile per
//! candidate arch, skipping names that already exist.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::arch;
use crate::breed::{BreedStrategy, TreeContext};
use crate::error::ImportResult;
use crate::model::{Arch, Distro, DistroCandidate, Profile, VirtType};
use crate::naming::{self, AUTOBOOT_MARKER};
use crate::store::EntityStore;

/// A named candidate with its resolved arches.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCandidate {
    pub candidate: DistroCandidate,
    /// Proposed name without the arch suffix.
    pub name: String,
    pub arches: BTreeSet<Arch>,
}

#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub planned: Vec<PlannedCandidate>,
    pub skipped: usize,
}

pub fn plan(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    candidates: Vec<DistroCandidate>,
    override_arch: Option<Arch>,
    hints: &BTreeSet<Arch>,
) -> ImportResult<PlanOutcome> {
    let mut out = PlanOutcome::default();

    for candidate in candidates {
        let name = naming::normalize(strategy, ctx, &candidate.dir, &candidate.kernel);
        if name.contains(AUTOBOOT_MARKER) {
            debug!(name = %name, dir = %candidate.dir.display(), "skipping autoboot tree");
            out.skipped += 1;
            continue;
        }

        let tail = naming::arch_tail(ctx.root, &candidate.dir);
        let mut arches = arch::resolve(strategy, &candidate.dir, &tail, override_arch, hints)?;
        if arches.is_empty() {
            match strategy.fallback_arch() {
                Some(a) => {
                    debug!(name = %name, arch = %a, "no arch signal, using breed default");
                    arches.insert(a);
                }
                None => {
                    warn!(
                        name = %name,
                        dir = %candidate.dir.display(),
                        "no arch could be determined, skipping; import with --arch to set one"
                    );
                    out.skipped += 1;
                    continue;
                }
            }
        }

        if arches.len() > 1 && !strategy.allows_multi_arch() {
            warn!(
                name = %name,
                dir = %candidate.dir.display(),
                arches = ?arches,
                "directory holds more than one arch, skipping; import with --arch to pick one"
            );
            out.skipped += 1;
            continue;
        }

        out.planned.push(PlannedCandidate {
            candidate,
            name,
            arches,
        });
    }

    Ok(out)
}

/// Virtualization hint for a new default profile.
pub fn virt_type_for(name: &str, breed: &str) -> VirtType {
    if name.contains("vmware") || breed == "vmware" || breed == "freebsd" {
        VirtType::Vmware
    } else if name.contains("-xen") {
        VirtType::Xenpv
    } else {
        VirtType::Qemu
    }
}

#[derive(Debug, Default)]
pub struct Registered {
    pub distros: Vec<String>,
    pub profiles: Vec<String>,
    pub skipped: usize,
}

pub fn register(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    planned: &[PlannedCandidate],
    os_version: Option<&str>,
    store: &mut dyn EntityStore,
) -> ImportResult<Registered> {
    let mut out = Registered::default();

    for p in planned {
        for arch in &p.arches {
            let name = format!("{}-{}", p.name, arch);

            if store.find_distro(&name).is_some() {
                warn!(name = %name, dir = %p.candidate.dir.display(), "distro already exists, skipping");
                out.skipped += 1;
                continue;
            }

            let mut distro = Distro::new(
                &name,
                p.candidate.kernel.clone(),
                p.candidate.initrd.clone(),
                *arch,
                ctx.breed,
            );
            distro.os_version = os_version.map(str::to_string);
            distro.kernel_options = strategy.kernel_options(ctx, &name);
            store.add_distro(distro, true)?;
            info!(name = %name, kernel = %p.candidate.kernel.display(), "created distro");
            out.distros.push(name.clone());

            if store.find_profile(&name).is_some() {
                warn!(name = %name, "profile already exists, skipping");
                out.skipped += 1;
                continue;
            }
            let profile = Profile {
                virt_type: virt_type_for(&name, ctx.breed),
                name: name.clone(),
                distro: name.clone(),
                kickstart: None,
            };
            store.add_profile(profile, true)?;
            info!(name = %name, "created profile");
            out.profiles.push(name);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Family;
    use crate::config::Settings;
    use crate::model::KernelVariant;
    use crate::store::MemoryStore;
    use std::path::{Path, PathBuf};

    fn candidate(dir: &Path) -> DistroCandidate {
        DistroCandidate {
            dir: dir.to_path_buf(),
            kernel: dir.join("vmlinuz"),
            initrd: dir.join("initrd.img"),
            variant: KernelVariant::Default,
        }
    }

    fn settings() -> Settings {
        Settings {
            webdir: PathBuf::from("/var/www/cobbler"),
            ..Settings::default()
        }
    }

    fn ctx<'a>(root: &'a Path, settings: &'a Settings, breed: &'a str) -> TreeContext<'a> {
        TreeContext {
            root,
            pkgdir: root,
            breed,
            mirror_name: "unused",
            network_root: None,
            settings,
        }
    }

    #[test]
    fn test_multi_arch_redhat_dir_is_skipped() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/rhel5");
        let c = ctx(root, &s, "redhat");
        let hints = BTreeSet::from([Arch::I386, Arch::X86_64]);
        let out = plan(
            Family::Redhat.strategy(),
            &c,
            vec![candidate(&root.join("images/pxeboot"))],
            None,
            &hints,
        )
        .unwrap();
        assert!(out.planned.is_empty());
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_multi_arch_allowed_for_debian() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/lenny");
        let c = ctx(root, &s, "debian");
        let hints = BTreeSet::from([Arch::I386, Arch::X86_64]);
        let out = plan(
            Family::Debian.strategy(),
            &c,
            vec![candidate(&root.join("netboot"))],
            None,
            &hints,
        )
        .unwrap();
        assert_eq!(out.planned[0].arches, hints);
    }

    #[test]
    fn test_no_arch_skips_only_that_candidate() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/mixed");
        let none = BTreeSet::new();

        let out = plan(
            Family::Redhat.strategy(),
            &ctx(root, &s, "redhat"),
            vec![
                candidate(&root.join("images/pxeboot")),
                candidate(&root.join("x86_64/images/pxeboot")),
            ],
            None,
            &none,
        )
        .unwrap();
        assert_eq!(out.skipped, 1);
        assert_eq!(out.planned.len(), 1);
        assert_eq!(out.planned[0].arches, BTreeSet::from([Arch::X86_64]));
    }

    #[test]
    fn test_vmware_falls_back_to_x86_64() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/esx");
        let out = plan(
            Family::Vmware.strategy(),
            &ctx(root, &s, "vmware"),
            vec![candidate(&root.join("isolinux"))],
            None,
            &BTreeSet::new(),
        )
        .unwrap();
        assert_eq!(out.skipped, 0);
        assert_eq!(out.planned[0].arches, BTreeSet::from([Arch::X86_64]));
    }

    #[test]
    fn test_autoboot_names_are_dropped() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/rhel3-i386");
        let out = plan(
            Family::Redhat.strategy(),
            &ctx(root, &s, "redhat"),
            vec![candidate(&root.join("images/pxeboot-autoboot"))],
            None,
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(out.planned.is_empty());
    }

    #[test]
    fn test_register_skips_existing_names() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/rhel6-x86_64");
        let c = ctx(root, &s, "redhat");
        let strategy = Family::Redhat.strategy();
        let out = plan(
            strategy,
            &c,
            vec![candidate(&root.join("images/pxeboot"))],
            None,
            &BTreeSet::new(),
        )
        .unwrap();

        let mut store = MemoryStore::new();
        let first = register(strategy, &c, &out.planned, Some("rhel6"), &mut store).unwrap();
        assert_eq!(first.distros, vec!["rhel6-x86_64"]);
        assert_eq!(first.profiles, vec!["rhel6-x86_64"]);
        let d = store.find_distro("rhel6-x86_64").unwrap();
        assert_eq!(d.os_version.as_deref(), Some("rhel6"));
        assert_eq!(d.arch, Arch::X86_64);

        let second = register(strategy, &c, &out.planned, None, &mut store).unwrap();
        assert!(second.distros.is_empty());
        assert_eq!(second.skipped, 1);
        assert_eq!(store.distros().count(), 1);
    }

    #[test]
    fn test_virt_type_rules() {
        assert_eq!(virt_type_for("esx4-x86_64", "vmware"), VirtType::Vmware);
        assert_eq!(virt_type_for("freebsd8-i386", "freebsd"), VirtType::Vmware);
        assert_eq!(virt_type_for("centos5-xen-i386", "redhat"), VirtType::Xenpv);
        assert_eq!(virt_type_for("f15-x86_64", "redhat"), VirtType::Qemu);
    }
}
