//! Session-fatal error taxonomy.
//!
//! Anything in here aborts an import before the entity store is touched.
//! Candidate-level problems (name collisions, multi-arch directories,
//! unparseable release files) and best-effort side actions (index rebuilds,
//! install-tree symlinks) are logged instead and never become an `ImportError`.

use std::path::PathBuf;

use crate::model::Arch;

/// Result alias used by session-level operations.
pub type ImportResult<T> = std::result::Result<T, ImportError>;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("arch '{0}' is not a known architecture")]
    InvalidArch(String),

    #[error("breed '{0}' is not supported")]
    UnknownBreed(String),

    #[error("arch '{arch}' is not valid for breed '{breed}'")]
    ArchNotValidForBreed { arch: Arch, breed: String },

    #[error("no OS signature found in {}, unable to import", .path.display())]
    NoSignature { path: PathBuf },

    #[error(
        "architecture found on pathname ({path_arch}) does not fit the one given on the command line ({override_arch}): {}",
        .path.display()
    )]
    ArchConflict {
        path: PathBuf,
        path_arch: Arch,
        override_arch: Arch,
    },

    #[error(
        "given arch ({override_arch}) not found on imported tree {} (found: {found})",
        .path.display()
    )]
    OverrideNotInTree {
        path: PathBuf,
        override_arch: Arch,
        found: String,
    },

    #[error("OS version '{requested}' does not match the scanned release '{scanned}'")]
    OsVersionMismatch { requested: String, scanned: String },

    #[error("OS version '{os_version}' is not valid for breed '{breed}'")]
    InvalidOsVersion { os_version: String, breed: String },

    #[error("destination {} already exists, use --arch to import a second tree under it", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("unsupported import source '{0}', mirror it locally or use --available-as")]
    UnsupportedProtocol(String),

    #[error("network root '{0}' must start with nfs://, ftp:// or http://")]
    InvalidNetworkRoot(String),

    #[error("nfs network root '{0}' must be of the form nfs://host:/path")]
    NfsRootMissingColon(String),

    #[error("source path {} does not exist", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("answer file {} does not exist", .path.display())]
    KickstartMissing { path: PathBuf },

    #[error("fetching {} into {} failed: {reason}", .source_path.display(), .dest.display())]
    FetchFailed {
        source_path: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// Short machine-friendly label, used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::MissingParameter(_) => "missing-parameter",
            ImportError::InvalidArch(_) => "invalid-arch",
            ImportError::UnknownBreed(_) => "unknown-breed",
            ImportError::ArchNotValidForBreed { .. } => "arch-not-valid-for-breed",
            ImportError::NoSignature { .. } => "no-signature",
            ImportError::ArchConflict { .. } => "arch-conflict",
            ImportError::OverrideNotInTree { .. } => "override-not-in-tree",
            ImportError::OsVersionMismatch { .. } => "os-version-mismatch",
            ImportError::InvalidOsVersion { .. } => "invalid-os-version",
            ImportError::DestinationExists { .. } => "destination-exists",
            ImportError::UnsupportedProtocol(_) => "unsupported-protocol",
            ImportError::InvalidNetworkRoot(_) => "invalid-network-root",
            ImportError::NfsRootMissingColon(_) => "nfs-root-missing-colon",
            ImportError::SourceMissing { .. } => "source-missing",
            ImportError::KickstartMissing { .. } => "kickstart-missing",
            ImportError::FetchFailed { .. } => "fetch-failed",
            ImportError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_conflict_message_names_both_arches() {
        let err = ImportError::ArchConflict {
            path: PathBuf::from("/mnt/tree/x86_64"),
            path_arch: Arch::X86_64,
            override_arch: Arch::I386,
        };
        let msg = err.to_string();
        assert!(msg.contains("x86_64"));
        assert!(msg.contains("i386"));
        assert_eq!(err.kind(), "arch-conflict");
    }

    #[test]
    fn test_anyhow_converts_to_other() {
        let err: ImportError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.kind(), "other");
        assert_eq!(err.to_string(), "disk full");
    }
}
