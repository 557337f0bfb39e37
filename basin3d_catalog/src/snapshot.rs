//! Serializable image of a catalog, used to persist a synthesized catalog and reload it without
//! re-running plugin synthesis.
//!
//! Credentials are never written to a snapshot.

use std::path::Path;

use basin3d_id::{DataSourceKey, IdPrefix, ObservedPropertyKey, SamplingMediumKey, VariableKey};
use bimap::BiHashMap;
use hashbrown::HashSet;
use observability_deps::tracing::info;
use serde::{Deserialize, Serialize};

use crate::interface::{
    DataSource, DataSourceObservedPropertyVariable, Error, ObservedPropertyVariable, Result,
    SamplingMediumRecord,
};
use crate::mem::{MemCatalog, MemCollections};
use crate::sampling_medium::SamplingMedium;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub datasources: Vec<DataSourceSnapshot>,
    pub variables: Vec<VariableSnapshot>,
    pub observed_properties: Vec<ObservedPropertySnapshot>,
    pub sampling_media: Vec<SamplingMediumSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSnapshot {
    pub key: DataSourceKey,
    pub id: String,
    pub name: String,
    pub id_prefix: IdPrefix,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub key: VariableKey,
    pub basin3d_id: String,
    pub full_name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedPropertySnapshot {
    pub key: ObservedPropertyKey,
    pub datasource: DataSourceKey,
    pub variable: VariableKey,
    pub datasource_variable_name: String,
    pub sampling_medium: SamplingMediumKey,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingMediumSnapshot {
    pub key: SamplingMediumKey,
    pub medium: SamplingMedium,
}

impl CatalogSnapshot {
    pub(crate) fn from_collections(c: &MemCollections) -> Self {
        Self {
            datasources: c
                .datasources
                .iter()
                .map(|d| DataSourceSnapshot {
                    key: d.key,
                    id: d.id.clone(),
                    name: d.name.clone(),
                    id_prefix: d.id_prefix.clone(),
                    location: d.location.clone(),
                    connection_class: d.connection_class.clone(),
                })
                .collect(),
            variables: c
                .variables()
                .iter()
                .map(|v| VariableSnapshot {
                    key: v.key,
                    basin3d_id: v.basin3d_id.clone(),
                    full_name: v.full_name.clone(),
                    categories: v.categories.clone(),
                    units: v.units.clone(),
                })
                .collect(),
            observed_properties: c
                .observed_properties
                .iter()
                .map(|p| ObservedPropertySnapshot {
                    key: p.key,
                    datasource: p.datasource,
                    variable: p.variable,
                    datasource_variable_name: p.datasource_variable_name.clone(),
                    sampling_medium: p.sampling_medium,
                    description: p.description.clone(),
                })
                .collect(),
            sampling_media: c
                .sampling_media
                .iter()
                .map(|m| SamplingMediumSnapshot {
                    key: m.key,
                    medium: m.medium,
                })
                .collect(),
        }
    }

    /// Read a snapshot previously written with [`CatalogSnapshot::to_file`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| Error::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            datasources = self.datasources.len(),
            variables = self.variables.len(),
            observed_properties = self.observed_properties.len(),
            "catalog snapshot written"
        );
        Ok(())
    }
}

/// Insert `value` into `seen`, failing with a description of `what` if it was already there
fn unique<T: std::hash::Hash + Eq + std::fmt::Display>(
    seen: &mut HashSet<T>,
    value: T,
    what: &str,
) -> Result<()> {
    if seen.contains(&value) {
        return Err(Error::InvalidSnapshot(format!("duplicate {what} {value}")));
    }
    seen.insert(value);
    Ok(())
}

impl TryFrom<CatalogSnapshot> for MemCatalog {
    type Error = Error;

    /// Rebuild a store from `snapshot`, rejecting snapshots that violate the catalog's
    /// uniqueness constraints or reference missing records.
    fn try_from(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut c = MemCollections::default();

        let mut medium_keys = HashSet::new();
        let mut media = HashSet::new();
        for m in snapshot.sampling_media {
            unique(&mut medium_keys, m.key, "sampling medium key")?;
            unique(&mut media, m.medium, "sampling medium")?;
            c.sampling_media.push(SamplingMediumRecord {
                key: m.key,
                medium: m.medium,
            });
        }

        let mut datasource_keys = HashSet::new();
        let mut datasource_ids = HashSet::new();
        let mut prefixes = BiHashMap::new();
        for d in snapshot.datasources {
            unique(&mut datasource_keys, d.key, "datasource key")?;
            unique(&mut datasource_ids, d.id.clone(), "datasource id")?;
            if prefixes.insert_no_overwrite(d.key, d.id_prefix.clone()).is_err() {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate datasource id prefix {}",
                    d.id_prefix
                )));
            }
            c.datasources.push(DataSource {
                key: d.key,
                id: d.id,
                name: d.name,
                id_prefix: d.id_prefix,
                location: d.location,
                credentials: None,
                connection_class: d.connection_class,
            });
        }
        c.prefixes = prefixes;

        let mut variable_keys = HashSet::new();
        let mut basin3d_ids = HashSet::new();
        for v in snapshot.variables {
            unique(&mut variable_keys, v.key, "variable key")?;
            unique(&mut basin3d_ids, v.basin3d_id.clone(), "basin3d_id")?;
            c.push_variable(ObservedPropertyVariable {
                key: v.key,
                basin3d_id: v.basin3d_id,
                full_name: v.full_name,
                categories: v.categories,
                units: v.units,
            });
        }

        let mut property_keys = HashSet::new();
        let mut pairs = HashSet::new();
        let mut local_names = HashSet::new();
        for p in snapshot.observed_properties {
            unique(&mut property_keys, p.key, "observed property key")?;
            if !datasource_keys.contains(&p.datasource) {
                return Err(Error::InvalidSnapshot(format!(
                    "observed property {} references missing datasource {}",
                    p.key, p.datasource
                )));
            }
            if !variable_keys.contains(&p.variable) {
                return Err(Error::InvalidSnapshot(format!(
                    "observed property {} references missing variable {}",
                    p.key, p.variable
                )));
            }
            if !medium_keys.contains(&p.sampling_medium) {
                return Err(Error::InvalidSnapshot(format!(
                    "observed property {} references missing sampling medium {}",
                    p.key, p.sampling_medium
                )));
            }
            if !pairs.insert((p.datasource, p.variable)) {
                return Err(Error::InvalidSnapshot(format!(
                    "datasource {} maps variable {} more than once",
                    p.datasource, p.variable
                )));
            }
            if !local_names.insert((p.datasource, p.datasource_variable_name.clone())) {
                return Err(Error::InvalidSnapshot(format!(
                    "datasource {} uses local name {} more than once",
                    p.datasource, p.datasource_variable_name
                )));
            }
            c.observed_properties.push(DataSourceObservedPropertyVariable {
                key: p.key,
                datasource: p.datasource,
                variable: p.variable,
                datasource_variable_name: p.datasource_variable_name,
                sampling_medium: p.sampling_medium,
                description: p.description,
            });
        }

        Ok(Self::from_collections(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::CatalogStore;
    use pretty_assertions::assert_eq;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            datasources: vec![DataSourceSnapshot {
                key: DataSourceKey::new(1),
                id: "Alpha".into(),
                name: "Alpha".into(),
                id_prefix: IdPrefix::new("A").unwrap(),
                location: "https://alpha.example".into(),
                connection_class: None,
            }],
            variables: vec![VariableSnapshot {
                key: VariableKey::new(1),
                basin3d_id: "ACT".into(),
                full_name: "Acetate (CH3COO)".into(),
                categories: vec!["Biogeochemistry".into(), "Anions".into()],
                units: Some("mM".into()),
            }],
            observed_properties: vec![ObservedPropertySnapshot {
                key: ObservedPropertyKey::new(1),
                datasource: DataSourceKey::new(1),
                variable: VariableKey::new(1),
                datasource_variable_name: "Acetate".into(),
                sampling_medium: SamplingMediumKey::new(2),
                description: "Acetate (CH3COO)".into(),
            }],
            sampling_media: vec![
                SamplingMediumSnapshot {
                    key: SamplingMediumKey::new(1),
                    medium: SamplingMedium::SolidPhase,
                },
                SamplingMediumSnapshot {
                    key: SamplingMediumKey::new(2),
                    medium: SamplingMedium::Water,
                },
            ],
        }
    }

    #[test]
    fn rebuilds_store_from_snapshot() {
        let store = MemCatalog::try_from(snapshot()).unwrap();
        assert_eq!(1, store.datasource_count());
        assert_eq!(
            Some("Alpha".to_string()),
            store.datasource_by_prefix("A").map(|d| d.id)
        );
        assert_eq!(
            store.variable_by_basin3d_id("ACT"),
            store.variable_by_key(VariableKey::new(1))
        );
        assert_eq!(Some("mM".to_string()), store.variable_by_key(VariableKey::new(1)).unwrap().units);

        let (_, row) = store
            .next_observed_property(0, &Default::default())
            .unwrap();
        let property = store.resolve_observed_property(&row).unwrap();
        assert_eq!(SamplingMedium::Water, property.sampling_medium);
        assert_eq!("ACT", property.observed_property_variable.basin3d_id);

        assert_eq!(snapshot(), store.snapshot());
    }

    #[test]
    fn file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        snapshot().to_file(&path).unwrap();
        assert_eq!(snapshot(), CatalogSnapshot::from_file(&path).unwrap());

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            CatalogSnapshot::from_file(&path).unwrap_err(),
            Error::SnapshotEncoding(_)
        ));
        assert!(matches!(
            CatalogSnapshot::from_file(&dir.path().join("missing.json")).unwrap_err(),
            Error::SnapshotIo { .. }
        ));
    }

    #[test]
    fn rejects_duplicate_prefixes() {
        let mut s = snapshot();
        let mut beta = s.datasources[0].clone();
        beta.key = DataSourceKey::new(2);
        beta.id = "Beta".into();
        s.datasources.push(beta);
        let err = MemCatalog::try_from(s).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(msg) if msg.contains("prefix")));
    }

    #[test]
    fn rejects_dangling_references() {
        let mut s = snapshot();
        s.observed_properties[0].variable = VariableKey::new(9);
        let err = MemCatalog::try_from(s).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(msg) if msg.contains("missing variable")));

        let mut s = snapshot();
        s.observed_properties[0].sampling_medium = SamplingMediumKey::new(5);
        let err = MemCatalog::try_from(s).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(msg) if msg.contains("sampling medium")));
    }

    #[test]
    fn rejects_duplicate_canonical_ids() {
        let mut s = snapshot();
        let mut dup = s.variables[0].clone();
        dup.key = VariableKey::new(2);
        s.variables.push(dup);
        let err = MemCatalog::try_from(s).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(msg) if msg.contains("basin3d_id ACT")));
    }
}
