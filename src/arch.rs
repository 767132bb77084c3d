//! Architecture reconciliation.
//!
//! Three signals exist for the arch of a kernel/initrd pair: an explicit
//! `--arch`, an arch token in the directory path, and arches embedded in
//! kernel package filenames anywhere in the tree. A path token is
//! authoritative for its directory and must agree with `--arch`; tree hints
//! only apply when the path says nothing.

use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::breed::{BreedStrategy, TreeContext};
use crate::error::{ImportError, ImportResult};
use crate::model::Arch;

/// Path substrings in priority order. Longer tokens precede their substrings.
const PATH_TOKENS: &[(&str, Arch)] = &[
    ("x86_64", Arch::X86_64),
    ("amd", Arch::X86_64),
    ("ia64", Arch::Ia64),
    ("i386", Arch::I386),
    ("386", Arch::I386),
    ("x86", Arch::I386),
    ("s390x", Arch::S390x),
    ("s390", Arch::S390),
    ("ppc64", Arch::Ppc64),
    ("chrp", Arch::Ppc64),
    ("ppc32", Arch::Ppc),
    ("ppc", Arch::Ppc),
];

/// Package-name spellings that stand for an arch.
const HINT_SYNONYMS: &[(&str, Arch)] = &[("amd64", Arch::X86_64), ("i686", Arch::I386)];

/// Arch named by `tail`, if the breed supports it.
pub fn path_arch(strategy: &dyn BreedStrategy, tail: &str) -> Option<Arch> {
    let (_, arch) = PATH_TOKENS.iter().find(|(token, _)| tail.contains(token))?;
    strategy.valid_arches().contains(arch).then_some(*arch)
}

/// Arches embedded in one kernel package filename.
///
/// Tokens are consumed longest first so `x86_64` is not also read as a
/// shorter arch, nor `ppc64` as `ppc`, nor `s390x` as `s390`.
pub fn hint_arches(strategy: &dyn BreedStrategy, filename: &str) -> BTreeSet<Arch> {
    let valid = strategy.valid_arches();
    let mut tokens: Vec<(&str, Arch)> = valid
        .iter()
        .map(|a| (a.as_str(), *a))
        .chain(HINT_SYNONYMS.iter().copied())
        .filter(|(_, a)| valid.contains(a))
        .collect();
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

    let mut rest = filename.to_string();
    let mut found = BTreeSet::new();
    for (token, arch) in tokens {
        if rest.contains(token) {
            found.insert(arch);
            rest = rest.replace(token, "\0");
        }
    }
    found
}

/// Arches hinted by kernel package filenames under the breed's hint root.
pub fn tree_hints(strategy: &dyn BreedStrategy, ctx: &TreeContext<'_>) -> BTreeSet<Arch> {
    let root = strategy.hint_root(ctx);
    let mut found = BTreeSet::new();
    if !root.is_dir() {
        return found;
    }
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if strategy.is_arch_hint_file(&name) {
            let arches = hint_arches(strategy, &name);
            if !arches.is_empty() {
                debug!(file = %name, ?arches, "arch hint");
            }
            found.extend(arches);
        }
    }
    found
}

/// Resolve the arch set for the kernel/initrd pair found in `dir`.
///
/// `tail` is the part of `dir` below the import's parent directory, the only
/// part searched for arch tokens. An empty set means no signal at all.
pub fn resolve(
    strategy: &dyn BreedStrategy,
    dir: &Path,
    tail: &str,
    override_arch: Option<Arch>,
    hints: &BTreeSet<Arch>,
) -> ImportResult<BTreeSet<Arch>> {
    if let Some(found) = path_arch(strategy, tail) {
        if let Some(given) = override_arch {
            if given != found {
                return Err(ImportError::ArchConflict {
                    path: dir.to_path_buf(),
                    path_arch: found,
                    override_arch: given,
                });
            }
        }
        if !hints.is_empty() && !hints.contains(&found) {
            warn!(
                path = %dir.display(),
                arch = %found,
                hints = ?hints,
                "arch from path not among arches hinted by the tree's packages"
            );
        }
        return Ok(BTreeSet::from([found]));
    }

    if !hints.is_empty() {
        return match override_arch {
            Some(given) if !hints.contains(&given) => Err(ImportError::OverrideNotInTree {
                path: dir.to_path_buf(),
                override_arch: given,
                found: hints
                    .iter()
                    .map(Arch::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            Some(given) => Ok(BTreeSet::from([given])),
            None => Ok(hints.clone()),
        };
    }

    Ok(override_arch.into_iter().collect())
}
