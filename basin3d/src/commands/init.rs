use std::sync::Arc;

use anyhow::Context;
use basin3d_catalog::{Catalog, CatalogBootstrap, CatalogSnapshot, discover_plugins};
use basin3d_clap_blocks::catalog::CatalogConfig;
use basin3d_plugin::PluginHandle;
use observability_deps::tracing::info;
use trogging::cli::LoggingConfig;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    catalog_config: CatalogConfig,

    /// Discard the contents of an existing catalog file instead of merging into it
    #[clap(long = "reset", action)]
    reset: bool,

    /// logging options
    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,
}

pub(crate) fn command(config: Config) -> anyhow::Result<()> {
    let catalog_config = config.catalog_config;
    let args = catalog_config.catalog_args();

    // an existing catalog file is the previous deployment's catalog; initialize merges into it
    let catalog = match catalog_config.catalog_file() {
        Some(path) if path.exists() => {
            let snapshot = CatalogSnapshot::from_file(path)
                .with_context(|| format!("loading catalog file {}", path.display()))?;
            info!(path = %path.display(), "loaded existing catalog");
            Catalog::from_snapshot(snapshot, args)
                .with_context(|| format!("rebuilding catalog from {}", path.display()))?
        }
        _ => Catalog::new_in_memory(args),
    };
    if config.reset {
        catalog.reset();
    }

    let builtin: Vec<Arc<dyn PluginHandle>> = vec![];
    let registry = discover_plugins(builtin, catalog_config.plugin_manifest())
        .context("discovering plugins")?;

    let mut bootstrap = CatalogBootstrap::new(Arc::new(catalog), registry);
    if let Some(path) = catalog_config.catalog_file() {
        bootstrap = bootstrap.with_snapshot_file(path);
    }
    let report = bootstrap.run().context("initializing catalog")?;

    println!(
        "plugins loaded: {}, plugins failed: {}, rows applied: {}, rows skipped: {}",
        report.plugins_loaded, report.plugins_failed, report.rows_applied, report.rows_skipped
    );
    Ok(())
}
