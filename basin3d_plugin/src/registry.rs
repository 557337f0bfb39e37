//! The set of plugins registered for a deployment.
//!
//! Plugins are registered explicitly at startup. In addition to compiled-in plugins, CSV-backed
//! plugins may be declared in a JSON manifest:
//!
//! ```json
//! {
//!   "plugins": [
//!     {
//!       "id": "Alpha",
//!       "name": "Alpha Lab",
//!       "id_prefix": "A",
//!       "location": "https://alpha.example/api",
//!       "mapping": "alpha_mapping.csv"
//!     }
//!   ]
//! }
//! ```
//!
//! Relative mapping paths are resolved against the manifest's directory. An entry with invalid
//! metadata is logged and skipped without affecting the other entries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basin3d_id::IdPrefix;
use observability_deps::tracing::{info, warn};
use serde::Deserialize;

use crate::{CsvPlugin, Error, PluginHandle, PluginMetadata, Result, TableSource};

#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn PluginHandle>>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    plugins: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    id_prefix: String,
    location: String,
    #[serde(default)]
    connection_class: Option<String>,
    #[serde(default)]
    mapping: Option<PathBuf>,
}

impl ManifestEntry {
    fn into_plugin(self, base_dir: &Path) -> Result<CsvPlugin> {
        let id_prefix = IdPrefix::new(self.id_prefix).map_err(|source| Error::InvalidMetadata {
            plugin: self.id.clone(),
            source,
        })?;
        let metadata = PluginMetadata {
            id: self.id,
            name: self.name,
            id_prefix,
            location: self.location,
            connection_class: self.connection_class,
        };
        let plugin = CsvPlugin::new(metadata);
        Ok(match self.mapping {
            Some(path) => plugin.with_mapping(TableSource::File(base_dir.join(path))),
            None => plugin,
        })
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin`. Returns `false`, leaving the registry unchanged, if a plugin with the
    /// same datasource id is already registered.
    pub fn register(&mut self, plugin: Arc<dyn PluginHandle>) -> bool {
        let id = &plugin.metadata().id;
        if self.get(id).is_some() {
            warn!(plugin = %id, "plugin already registered, ignoring duplicate");
            return false;
        }
        self.plugins.push(plugin);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn PluginHandle>> {
        self.plugins.iter().find(|p| p.metadata().id == id)
    }

    pub fn plugins(&self) -> &[Arc<dyn PluginHandle>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Register every valid entry of the manifest at `path`, returning how many were added.
    ///
    /// Only an unreadable or unparseable manifest is an error; bad entries are skipped.
    pub fn load_manifest(&mut self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&contents).map_err(|source| Error::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut added = 0;
        for entry in manifest.plugins {
            match entry.into_plugin(base_dir) {
                Ok(plugin) => {
                    if self.register(Arc::new(plugin)) {
                        added += 1;
                    }
                }
                Err(error) => warn!(%error, "skipping plugin manifest entry"),
            }
        }
        info!(manifest = %path.display(), added, "loaded plugin manifest");
        Ok(added)
    }

    pub fn from_manifest(path: &Path) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_manifest(path)?;
        Ok(registry)
    }
}
