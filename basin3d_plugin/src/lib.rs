//! The plugin side of the BASIN-3D catalog.
//!
//! A plugin fronts one upstream datasource. For catalog purposes it contributes two things: its
//! [`PluginMetadata`] and a table mapping the datasource's own variable names onto canonical
//! BASIN-3D variables. Plugins are compiled in and registered explicitly in a
//! [`PluginRegistry`]; CSV-backed plugins can also be declared in a JSON manifest.

use basin3d_id::IdPrefix;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod csv_plugin;
pub mod mapping;
pub mod registry;
pub mod table;
pub mod vocabulary;

pub use csv_plugin::CsvPlugin;
pub use mapping::{MappingRow, MappingRows};
pub use registry::PluginRegistry;
pub use table::{LoadReport, TableSource};
pub use vocabulary::{VocabularyEntries, VocabularyEntry};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no variable mapping found for plugin {plugin}: {reason}")]
    MappingNotFound { plugin: String, reason: String },

    #[error("malformed row in {source_name} at line {line}: {reason}")]
    MappingFormatError {
        source_name: String,
        line: u64,
        reason: String,
    },

    #[error("no valid mapping rows for plugin {plugin} ({skipped} rows skipped)")]
    NoValidRows { plugin: String, skipped: usize },

    #[error("unable to read table {source_name}: {source}")]
    TableRead {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid metadata for plugin {plugin}: {source}")]
    InvalidMetadata {
        plugin: String,
        #[source]
        source: basin3d_id::Error,
    },

    #[error("unable to read plugin manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse plugin manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Descriptive information about the datasource a plugin fronts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Canonical datasource code, e.g. `"USGS"`
    pub id: String,
    /// Human readable name, defaults to `id`
    #[serde(default)]
    pub name: Option<String>,
    /// Prefix applied to every entity id this datasource produces
    pub id_prefix: IdPrefix,
    /// Base URL or other connection information
    pub location: String,
    /// Name of the credential format the datasource expects, if any
    #[serde(default)]
    pub connection_class: Option<String>,
}

impl PluginMetadata {
    pub fn new(id: impl Into<String>, id_prefix: IdPrefix, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            id_prefix,
            location: location.into(),
            connection_class: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// The capability every datasource plugin exposes to the catalog.
pub trait PluginHandle: std::fmt::Debug + Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Where this plugin's variable mapping table lives, or `None` if it declares none.
    fn mapping_source(&self) -> Option<TableSource>;

    /// Open a fresh pass over this plugin's mapping rows.
    ///
    /// Each call re-reads the source from the start, so a second call after a mapping file was
    /// edited observes the edit.
    fn mapping_rows(&self) -> Result<MappingRows> {
        let metadata = self.metadata();
        let source = self
            .mapping_source()
            .ok_or_else(|| Error::MappingNotFound {
                plugin: metadata.id.clone(),
                reason: "plugin declares no mapping source".to_string(),
            })?;
        mapping::open(&metadata.id, &source)
    }
}
