//! Import engine for operating-system install trees.
//!
//! Given the root of an install medium (a mounted DVD, an rsync-able mirror
//! or a directory already served over the network), this crate finds every
//! bootable kernel/initrd pair, names and classifies it, and registers the
//! resulting distros, default profiles and package repositories in an
//! entity store.
//!
//! # Architecture
//!
//! ```text
//! ImportSession (session)
//!     │
//!     ├── breed      BreedStrategy per family: redhat, debian/ubuntu, suse,
//!     │              freebsd, vmware
//!     ├── fetch      rsync or plain copy into <webdir>/ks_mirror/<name>
//!     ├── crawl      kernel/initrd discovery
//!     ├── arch       arch resolution from path, hints and override
//!     ├── naming     distro name normalization
//!     ├── register   distro + default profile creation
//!     ├── kickstart  release scan and answer-file selection
//!     ├── tree       install tree location
//!     └── repos      yum / apt repository discovery
//!
//! store      EntityStore: MemoryStore, JsonStore
//! process    Cmd builder over a CommandRunner
//! config     Settings (TOML)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use distro_import::{CopyFetcher, ImportOptions, ImportSession, MemoryStore, Settings, SystemRunner};
//!
//! let settings = Settings::default();
//! let mut store = MemoryStore::new();
//! let mut session = ImportSession::new(&settings, &mut store, &SystemRunner, &CopyFetcher);
//! let report = session.run(ImportOptions {
//!     path: Some("/mnt/dvd".into()),
//!     name: Some("rhel6".into()),
//!     ..ImportOptions::default()
//! })?;
//! println!("imported {:?}", report.distros);
//! ```

pub mod arch;
pub mod breed;
pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod kickstart;
pub mod model;
pub mod naming;
pub mod preflight;
pub mod process;
pub mod register;
pub mod repos;
pub mod session;
pub mod store;
pub mod tree;

pub use breed::{BreedStrategy, Family};
pub use config::Settings;
pub use error::{ImportError, ImportResult};
pub use fetch::{CopyFetcher, RsyncFetcher, TreeFetcher};
pub use model::{Arch, Distro, Profile, Repo};
pub use process::{Cmd, CommandRunner, SystemRunner};
pub use session::{ImportOptions, ImportReport, ImportSession};
pub use store::{EntityStore, JsonStore, MemoryStore};
