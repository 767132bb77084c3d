//! Host tool checks run before an import touches anything.
//!
//! ```rust
//! use distro_import::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("createrepo") {
//!     println!("repository indexes will not be rebuilt");
//! }
//!
//! let tools = &[("rsync", "rsync")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};
use tracing::warn;

/// Needed to mirror a tree locally. Each tuple is (command, package).
pub const MIRROR_TOOLS: &[(&str, &str)] = &[("rsync", "rsync")];

/// Needed to rebuild in-tree yum metadata. Missing tools only degrade the import.
pub const REPO_INDEX_TOOLS: &[(&str, &str)] = &[("createrepo", "createrepo")];

pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Fail with every missing tool and the package that provides it.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing = missing_tools(tools);
    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }
    Ok(())
}

/// Log a warning per missing tool instead of failing.
pub fn warn_missing_tools(tools: &[(&str, &str)]) -> bool {
    let missing = missing_tools(tools);
    for (tool, package) in &missing {
        warn!(tool, package, "optional host tool not found");
    }
    missing.is_empty()
}

fn missing_tools<'a>(tools: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists_sh() {
        assert!(command_exists("sh"));
    }

    #[test]
    fn test_command_not_exists() {
        assert!(!command_exists("this-command-definitely-does-not-exist-12345"));
    }

    #[test]
    fn test_check_required_tools_lists_packages() {
        let err = check_required_tools(&[
            ("sh", "coreutils"),
            ("fake-tool-xyz-12345", "fake-package"),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fake-tool-xyz-12345 (install: fake-package)"));
        assert!(!msg.contains("coreutils"));
    }

    #[test]
    fn test_warn_missing_tools_reports_state() {
        assert!(warn_missing_tools(&[("sh", "coreutils")]));
        assert!(!warn_missing_tools(&[("fake-tool-xyz-12345", "fake")]));
    }
}
