//! Deployment-time catalog initialization.
//!
//! Run once per deployment, after the store is available. Rerunning against an initialized
//! catalog only merges in new plugins and mapping edits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basin3d_plugin::{PluginHandle, PluginRegistry};
use observability_deps::tracing::{info, warn};

use crate::catalog::{Catalog, InitializeReport};
use crate::interface::Result;

/// Build the registry for a deployment from its compiled-in plugins plus, if given, the CSV
/// plugins declared in a manifest. Compiled-in plugins win over manifest entries with the same
/// id.
pub fn discover_plugins(
    builtin: impl IntoIterator<Item = Arc<dyn PluginHandle>>,
    manifest: Option<&Path>,
) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    for plugin in builtin {
        registry.register(plugin);
    }
    if let Some(path) = manifest {
        registry.load_manifest(path)?;
    }
    Ok(registry)
}

/// Drives [`Catalog::initialize`] with every registered plugin
#[derive(Debug)]
pub struct CatalogBootstrap {
    catalog: Arc<Catalog>,
    registry: PluginRegistry,
    snapshot_file: Option<PathBuf>,
}

impl CatalogBootstrap {
    pub fn new(catalog: Arc<Catalog>, registry: PluginRegistry) -> Self {
        Self {
            catalog,
            registry,
            snapshot_file: None,
        }
    }

    /// Write the catalog to `path` after each successful run
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(path.into());
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn run(&self) -> Result<InitializeReport> {
        if self.registry.is_empty() {
            warn!("no plugins registered, catalog will remain uninitialized");
        }
        info!(
            plugins = self.registry.len(),
            already_initialized = self.catalog.is_initialized(),
            "initializing catalog"
        );

        let report = self.catalog.initialize(self.registry.plugins())?;
        if !self.catalog.is_initialized() {
            warn!("no datasource could be registered");
        }

        if let Some(path) = &self.snapshot_file {
            self.catalog.snapshot().to_file(path)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogArgs;
    use crate::snapshot::CatalogSnapshot;
    use basin3d_id::IdPrefix;
    use basin3d_plugin::{CsvPlugin, PluginMetadata, TableSource};
    use pretty_assertions::assert_eq;

    fn builtin() -> Arc<dyn PluginHandle> {
        let metadata =
            PluginMetadata::new("Alpha", IdPrefix::new("A").unwrap(), "https://alpha.example");
        Arc::new(CsvPlugin::new(metadata).with_mapping(TableSource::inline(
            "alpha",
            "basin3d_id,datasource_name,description,sampling_medium,categories\n\
             ACT,Acetate,Acetate (CH3COO),WATER,Anions\n",
        )))
    }

    #[test_log::test]
    fn runs_are_repeatable_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("plugins.json");
        std::fs::write(
            &manifest,
            r#"{"plugins": [
                {"id": "USGS", "id_prefix": "USGS", "location": "https://usgs.example", "mapping": "usgs.csv"},
                {"id": "Missing", "id_prefix": "M", "location": "https://missing.example", "mapping": "missing.csv"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("usgs.csv"),
            "basin3d_id,datasource_name,description,sampling_medium,categories\n\
             Hg,50287,Mercury,WATER,Metals\n",
        )
        .unwrap();

        let registry = discover_plugins([builtin()], Some(manifest.as_path())).unwrap();
        assert_eq!(3, registry.len());

        let snapshot_file = dir.path().join("catalog.json");
        let catalog = Arc::new(Catalog::new_in_memory(CatalogArgs::default()));
        let bootstrap = CatalogBootstrap::new(Arc::clone(&catalog), registry)
            .with_snapshot_file(&snapshot_file);

        let first = bootstrap.run().unwrap();
        assert_eq!(2, first.plugins_loaded);
        assert_eq!(1, first.plugins_failed);
        let second = bootstrap.run().unwrap();
        assert_eq!(first, second);

        let reloaded = Catalog::from_snapshot(
            CatalogSnapshot::from_file(&snapshot_file).unwrap(),
            CatalogArgs::default(),
        )
        .unwrap();
        assert_eq!(catalog.snapshot(), reloaded.snapshot());
        assert!(reloaded
            .find_observed_property("USGS", "Hg", "50287")
            .unwrap()
            .is_some());
    }

    #[test]
    fn empty_registry_leaves_catalog_uninitialized() {
        let catalog = Arc::new(Catalog::new_in_memory(CatalogArgs::default()));
        let report = CatalogBootstrap::new(Arc::clone(&catalog), PluginRegistry::new())
            .run()
            .unwrap();
        assert_eq!(InitializeReport::default(), report);
        assert!(!catalog.is_initialized());
    }
}
