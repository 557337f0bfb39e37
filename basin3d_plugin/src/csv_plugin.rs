use crate::{PluginHandle, PluginMetadata, TableSource};

/// A plugin whose catalog contribution is fully described by its metadata and a mapping table.
///
/// Used for plugins declared in a manifest and for compiled-in plugins that embed their mapping
/// with `include_str!`.
#[derive(Debug, Clone)]
pub struct CsvPlugin {
    metadata: PluginMetadata,
    mapping: Option<TableSource>,
}

impl CsvPlugin {
    pub fn new(metadata: PluginMetadata) -> Self {
        Self {
            metadata,
            mapping: None,
        }
    }

    pub fn with_mapping(mut self, mapping: TableSource) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

impl PluginHandle for CsvPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn mapping_source(&self) -> Option<TableSource> {
        self.mapping.clone()
    }
}
