use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use distro_import::{
    CopyFetcher, ImportOptions, ImportSession, JsonStore, RsyncFetcher, Settings, SystemRunner,
    TreeFetcher,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FetchMode {
    /// rsync the source into the mirror (updates in place)
    Rsync,
    /// recursive copy, no host tools needed
    Copy,
}

/// Import an OS install tree as distros, profiles and repositories.
#[derive(Parser, Debug)]
#[command(name = "distro-import", version, about, long_about = None)]
struct Cli {
    /// Root of the install tree (mounted media or local directory)
    #[arg(long)]
    path: PathBuf,

    /// Base name for the imported distros
    #[arg(long)]
    name: String,

    /// Network URL the tree is already served at (nfs://, ftp://, http://); nothing is copied
    #[arg(long)]
    available_as: Option<String>,

    /// Force an architecture
    #[arg(long)]
    arch: Option<String>,

    /// Force a breed instead of detecting it
    #[arg(long)]
    breed: Option<String>,

    /// Expected OS version, checked against the tree
    #[arg(long)]
    os_version: Option<String>,

    /// Answer file for every new profile
    #[arg(long)]
    kickstart: Option<PathBuf>,

    /// Extra rsync flags
    #[arg(long, allow_hyphen_values = true)]
    rsync_flags: Option<String>,

    /// How the tree is brought into the mirror
    #[arg(long, value_enum, default_value = "rsync")]
    fetcher: FetchMode,

    /// Directory holding the entity store
    #[arg(long, env = "DISTRO_IMPORT_STORE")]
    store: Option<PathBuf>,

    /// Settings file
    #[arg(long, env = "DISTRO_IMPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DISTRO_IMPORT_LOG_LEVEL")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    // RUST_LOG takes over completely when set.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("distro_import={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::discover(cli.config.as_deref())?;
    let store_dir = match cli.store {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("no data directory for this user, pass --store")?
            .join("distro-import"),
    };
    let mut store = JsonStore::open(&store_dir)?;

    let runner = SystemRunner;
    let rsync;
    let fetcher: &dyn TreeFetcher = match cli.fetcher {
        FetchMode::Rsync => {
            rsync = RsyncFetcher::new(&runner, &settings.default_rsync_flags);
            &rsync
        }
        FetchMode::Copy => &CopyFetcher,
    };

    let options = ImportOptions {
        path: Some(cli.path),
        name: Some(cli.name),
        network_root: cli.available_as,
        arch: cli.arch,
        breed: cli.breed,
        os_version: cli.os_version,
        kickstart: cli.kickstart,
        rsync_flags: cli.rsync_flags,
    };

    let report = ImportSession::new(&settings, &mut store, &runner, fetcher).run(options)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
