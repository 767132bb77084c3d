//! Install tree location recorded in each distro's `tree` metadata.
//!
//! Network-root imports point at the network root. Local mirrors are exposed
//! through a `<webdir>/links/<distro>` symlink unless the breed serves its
//! trees from elsewhere. Symlink failures are logged, not returned.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::breed::{BreedStrategy, TreeContext};
use crate::error::ImportResult;
use crate::store::EntityStore;

#[derive(Debug, Default)]
pub struct TreeOutcome {
    pub configured: usize,
    pub failures: usize,
}

pub fn configure_tree_locations(
    strategy: &dyn BreedStrategy,
    ctx: &TreeContext<'_>,
    distros: &[String],
    store: &mut dyn EntityStore,
) -> ImportResult<TreeOutcome> {
    let mut out = TreeOutcome::default();

    for name in distros {
        let Some(mut distro) = store.find_distro(name) else {
            continue;
        };

        let tree = match ctx.network_root {
            Some(root) => root.trim_end_matches('/').to_string(),
            None => match strategy.local_install_tree(ctx, name) {
                Some(url) => url,
                None => {
                    let link = ctx.settings.links_dir().join(name);
                    if let Err(e) = ensure_link(ctx.root, &link) {
                        error!(
                            link = %link.display(),
                            target = %ctx.root.display(),
                            error = %format!("{e:#}"),
                            "install tree symlink creation failed"
                        );
                        out.failures += 1;
                    }
                    ctx.settings.http_url(&format!("links/{name}"))
                }
            },
        };

        info!(distro = %name, tree = %tree, "install tree");
        distro.ks_meta.insert("tree".to_string(), tree);
        store.add_distro(distro, true)?;
        out.configured += 1;
    }

    Ok(out)
}

fn ensure_link(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        return Ok(());
    }
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("Failed to create symlink: {}", link.display()))
}
