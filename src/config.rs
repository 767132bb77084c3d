//! Import settings.
//!
//! Read from a small TOML file. Every key is optional; unknown keys are
//! rejected so typos surface instead of silently falling back to defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WEBDIR: &str = "/var/www/cobbler";
pub const DEFAULT_ANSWER_FILE_DIR: &str = "/var/lib/cobbler/kickstarts";
pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Web-served root; mirrored trees live under `<webdir>/ks_mirror`.
    pub webdir: PathBuf,
    /// Directory holding kickstart/preseed/autoyast answer files.
    pub answer_file_dir: PathBuf,
    pub createrepo_flags: String,
    pub default_rsync_flags: String,
    /// Token substituted with the real server address at render time.
    pub http_server_token: String,
    pub apt_mirror_country: String,
    pub repo_priority_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webdir: PathBuf::from(DEFAULT_WEBDIR),
            answer_file_dir: PathBuf::from(DEFAULT_ANSWER_FILE_DIR),
            createrepo_flags: "-c cache -s sha".to_string(),
            default_rsync_flags: "-a".to_string(),
            http_server_token: "@@http_server@@".to_string(),
            apt_mirror_country: "us".to_string(),
            repo_priority_token: "$yum_distro_priority".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings '{}'", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("parsing settings '{}'", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from an explicit path, else the per-user default location, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_settings_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.webdir.as_os_str().is_empty() {
            bail!("settings: webdir must not be empty");
        }
        if !self.webdir.is_absolute() {
            bail!(
                "settings: webdir must be an absolute path, got '{}'",
                self.webdir.display()
            );
        }
        if self.http_server_token.trim().is_empty() {
            bail!("settings: http_server_token must not be empty");
        }
        if self.apt_mirror_country.trim().is_empty() {
            bail!("settings: apt_mirror_country must not be empty");
        }
        Ok(())
    }

    /// Root of all locally mirrored trees.
    pub fn mirror_root(&self) -> PathBuf {
        self.webdir.join("ks_mirror")
    }

    /// Where repository definition files for imported distros are written.
    pub fn repo_config_dir(&self) -> PathBuf {
        self.mirror_root().join("config")
    }

    pub fn links_dir(&self) -> PathBuf {
        self.webdir.join("links")
    }

    /// `http://<token>/cblr/<tail>`.
    pub fn http_url(&self, tail: &str) -> String {
        format!(
            "http://{}/cblr/{}",
            self.http_server_token,
            tail.trim_start_matches('/')
        )
    }

    pub fn createrepo_args(&self) -> Vec<String> {
        self.createrepo_flags
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("distro-import").join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "webdir = \"/srv/www/cobbler\"\n").unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.webdir, PathBuf::from("/srv/www/cobbler"));
        assert_eq!(s.mirror_root(), PathBuf::from("/srv/www/cobbler/ks_mirror"));
        assert_eq!(s.answer_file_dir, PathBuf::from(DEFAULT_ANSWER_FILE_DIR));
        assert_eq!(s.apt_mirror_country, "us");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "web_dir = \"/srv\"\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn test_relative_webdir_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "webdir = \"www\"\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_http_url_and_createrepo_args() {
        let s = Settings::default();
        assert_eq!(
            s.http_url("/links/f15-x86_64"),
            "http://@@http_server@@/cblr/links/f15-x86_64"
        );
        assert_eq!(s.createrepo_args(), vec!["-c", "cache", "-s", "sha"]);
    }
}
