//! Catalog-related configs.
use std::path::{Path, PathBuf};

use basin3d_catalog::CatalogArgs;
use basin3d_plugin::TableSource;

/// CLI config for the variable catalog.
#[derive(Debug, Clone, Default, clap::Parser)]
pub struct CatalogConfig {
    /// JSON manifest declaring CSV-backed plugins.
    ///
    /// Mapping paths inside the manifest are relative to the manifest file.
    #[clap(long = "plugin-manifest", env = "BASIN3D_PLUGIN_MANIFEST", action)]
    pub plugin_manifest: Option<PathBuf>,

    /// CSV of canonical variables (`basin3d_id,full_name,categories,units`) seeded before any
    /// plugin mapping.
    #[clap(long = "vocabulary", env = "BASIN3D_VOCABULARY", action)]
    pub vocabulary: Option<PathBuf>,

    /// JSON snapshot of the catalog, written by `init` and read by `show`.
    #[clap(long = "catalog-file", env = "BASIN3D_CATALOG_FILE", action)]
    pub catalog_file: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn plugin_manifest(&self) -> Option<&Path> {
        self.plugin_manifest.as_deref()
    }

    pub fn catalog_file(&self) -> Option<&Path> {
        self.catalog_file.as_deref()
    }

    /// Arguments for constructing a catalog from this config
    pub fn catalog_args(&self) -> CatalogArgs {
        CatalogArgs {
            vocabulary: self.vocabulary.clone().map(TableSource::File),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn everything_is_optional() {
        let config = CatalogConfig::try_parse_from(["my_binary"]).unwrap();
        assert_eq!(None, config.plugin_manifest());
        assert_eq!(None, config.catalog_file());
        assert!(config.catalog_args().vocabulary.is_none());
    }

    #[test]
    fn paths_from_flags() {
        let config = CatalogConfig::try_parse_from([
            "my_binary",
            "--plugin-manifest",
            "/etc/basin3d/plugins.json",
            "--vocabulary",
            "/etc/basin3d/vocabulary.csv",
            "--catalog-file",
            "/var/lib/basin3d/catalog.json",
        ])
        .unwrap();
        assert_eq!(
            Some(Path::new("/etc/basin3d/plugins.json")),
            config.plugin_manifest()
        );
        assert_eq!(
            Some(Path::new("/var/lib/basin3d/catalog.json")),
            config.catalog_file()
        );
        assert_eq!(
            Some(TableSource::File("/etc/basin3d/vocabulary.csv".into())),
            config.catalog_args().vocabulary
        );
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let error = CatalogConfig::try_parse_from(["my_binary", "--catalog-dsn", "memory"])
            .unwrap_err()
            .to_string();
        assert!(error.contains("unexpected argument '--catalog-dsn'"), "{error}");
    }
}
