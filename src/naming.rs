//! Canonical distro names from directory paths.
//!
//! The name is built from the path below the mirror root, cleaned of the
//! breed's noise segments and of any arch token (the resolved arch is
//! appended later), with a suffix for PAE/Xen kernels.

use std::path::{Component, Path};

use crate::breed::{BreedStrategy, TreeContext};

/// Arch spellings stripped from names when preceded by a separator.
const NAME_ARCH_TOKENS: &[&str] = &[
    "i386", "x86_64", "ia64", "ppc64", "ppc32", "ppc", "x86", "s390x", "s390", "386", "amd",
];

const SEPARATORS: &[char] = &['-', '_', '.'];

/// Names carrying this marker are never registered.
pub const AUTOBOOT_MARKER: &str = "-autoboot";

/// `path` below `base`, `/`-joined. `None` if `path` is not under `base`.
pub fn path_tail(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Tail of `dir` as seen from the import root's parent, so it starts with the
/// root's own directory name. Used for arch token detection.
pub fn arch_tail(root: &Path, dir: &Path) -> String {
    let base = root.parent().unwrap_or(root);
    path_tail(base, dir).unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

/// Proposed name for the kernel/initrd pair in `dir`, without arch suffix.
pub fn normalize(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    dir: &Path,
    kernel: &Path,
) -> String {
    let raw = raw_name(ctx, dir);
    let mut name = clean(strategy, &raw);

    let kernel_name = kernel
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for (marker, suffix) in strategy.kernel_suffixes() {
        if kernel_name.contains(marker) {
            name.push_str(suffix);
        }
    }
    name
}

fn raw_name(ctx: &TreeContext<'_>, dir: &Path) -> String {
    if ctx.network_root.is_none() {
        if let Some(tail) = path_tail(&ctx.settings.mirror_root(), dir) {
            if !tail.is_empty() {
                return tail.replace('/', "-");
            }
        }
    }
    match path_tail(ctx.root, dir) {
        Some(tail) if !tail.is_empty() => format!("{}-{}", ctx.mirror_name, tail.replace('/', "-")),
        _ => ctx.mirror_name.to_string(),
    }
}

/// Apply the breed's noise table, drop arch tokens, collapse separators.
pub fn clean(strategy: &dyn BreedStrategy, raw: &str) -> String {
    let mut name = raw.to_string();
    for (from, to) in strategy.noise_tokens() {
        name = if from.starts_with('-') {
            replace_segment(&name, from, to)
        } else {
            name.replace(from, to)
        };
    }
    for sep in SEPARATORS {
        for arch in NAME_ARCH_TOKENS {
            name = replace_segment(&name, &format!("{sep}{arch}"), "");
        }
    }
    collapse_dashes(&name)
}

/// Replace `token` only where it ends a `-`, `_` or `.` delimited segment.
fn replace_segment(name: &str, token: &str, with: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find(token) {
        let after = &rest[pos + token.len()..];
        let at_boundary = after.is_empty() || after.starts_with(SEPARATORS);
        out.push_str(&rest[..pos]);
        if at_boundary {
            out.push_str(with);
        } else {
            out.push_str(token);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn collapse_dashes(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::Family;
    use crate::config::Settings;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings {
            webdir: PathBuf::from("/var/www/cobbler"),
            ..Settings::default()
        }
    }

    fn local_ctx<'a>(root: &'a Path, settings: &'a Settings, breed: &'a str) -> TreeContext<'a> {
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
    fn test_local_redhat_name() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/rhel6-x86_64");
        let dir = root.join("images/pxeboot");
        let name = normalize(
            Family::Redhat.strategy(),
            &local_ctx(root, &s, "redhat"),
            &dir,
            &dir.join("vmlinuz"),
        );
        assert_eq!(name, "rhel6");
    }

    #[test]
    fn test_pae_suffix() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/centos5");
        let dir = root.join("images/xen");
        let name = normalize(
            Family::Redhat.strategy(),
            &local_ctx(root, &s, "redhat"),
            &dir,
            &dir.join("vmlinuzPAE"),
        );
        assert_eq!(name, "centos5-xen-PAE");
    }

    #[test]
    fn test_suse_xen_suffix() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/sles11");
        let dir = root.join("boot/x86_64/loader");
        let name = normalize(
            Family::Suse.strategy(),
            &local_ctx(root, &s, "suse"),
            &dir,
            &dir.join("linux-xen"),
        );
        assert_eq!(name, "sles11-xen");
    }

    #[test]
    fn test_network_root_name_uses_mirror_name() {
        let s = settings();
        let root = Path::new("/mnt/f15");
        let ctx = TreeContext {
            root,
            pkgdir: root,
            breed: "redhat",
            mirror_name: "f15",
            network_root: Some("nfs://server:/exports/f15/"),
            settings: &s,
        };
        let dir = root.join("images/pxeboot");
        assert_eq!(
            normalize(Family::Redhat.strategy(), &ctx, &dir, &dir.join("vmlinuz")),
            "f15"
        );
    }

    #[test]
    fn test_noise_only_strips_whole_segments() {
        let redhat = Family::Redhat.strategy();
        assert_eq!(
            clean(redhat, "lenny-main-installer-i386-current-images-netboot"),
            "lenny-main-installer-current"
        );
        assert_eq!(clean(redhat, "fedora-os-osx"), "fedora-osx");
        assert_eq!(clean(redhat, "rhel5--ppc-chrp"), "rhel5");
    }

    #[test]
    fn test_normalize_is_deterministic_for_all_breeds() {
        let s = settings();
        let root = Path::new("/var/www/cobbler/ks_mirror/tree-x86_64");
        let dir = root.join("dists/lenny/main/installer-amd64/current/images/netboot");
        for family in Family::ALL {
            let strategy = family.strategy();
            let ctx = local_ctx(root, &s, "x");
            let a = normalize(strategy, &ctx, &dir, &dir.join("linux"));
            let b = normalize(strategy, &ctx, &dir, &dir.join("linux"));
            assert_eq!(a, b, "{family}");
            assert!(!a.contains("--"), "{family}: {a}");
        }
    }

    #[test]
    fn test_arch_tail_includes_root_name() {
        let root = Path::new("/srv/mirror/rhel5-i386");
        assert_eq!(
            arch_tail(root, &root.join("images/pxeboot")),
            "rhel5-i386/images/pxeboot"
        );
    }
}
