//! This module implements an in-memory implementation of the catalog store. It can be used for
//! testing or for a deployment whose catalog is rebuilt (or reloaded from a snapshot) at startup.

use std::fmt;

use basin3d_id::{
    DataSourceKey, IdPrefix, ObservedPropertyKey, SamplingMediumKey, VariableKey,
};
use bimap::BiHashMap;
use hashbrown::HashMap;
use observability_deps::tracing::warn;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::interface::{
    CatalogStore, DataSource, DataSourceInfo, DataSourceObservedPropertyVariable,
    DataSourceParams, DataSourceRepo, Error, ObservedProperty, ObservedPropertyFilter,
    ObservedPropertyParams, ObservedPropertyRepo, ObservedPropertyVariable, RepoCollection, Result,
    SamplingMediumRecord, SamplingMediumRepo, Transaction, VariableFilter, VariableParams,
    VariableRepo,
};
use crate::sampling_medium::SamplingMedium;
use crate::snapshot::CatalogSnapshot;

/// In-memory catalog store
#[derive(Default)]
pub struct MemCatalog {
    collections: RwLock<MemCollections>,
}

impl MemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_collections(collections: MemCollections) -> Self {
        Self {
            collections: RwLock::new(collections),
        }
    }
}

impl fmt::Debug for MemCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.collections.read();
        f.debug_struct("MemCatalog")
            .field("datasources", &c.datasources.len())
            .field("variables", &c.variables.len())
            .field("observed_properties", &c.observed_properties.len())
            .field("sampling_media", &c.sampling_media.len())
            .finish()
    }
}

#[derive(Default, Debug, Clone)]
pub(crate) struct MemCollections {
    pub(crate) datasources: Vec<DataSource>,
    pub(crate) prefixes: BiHashMap<DataSourceKey, IdPrefix>,
    variables: Vec<ObservedPropertyVariable>,
    /// Positions in `variables`. Variables are only ever appended.
    variables_by_key: HashMap<VariableKey, usize>,
    variables_by_basin3d_id: HashMap<String, usize>,
    pub(crate) observed_properties: Vec<DataSourceObservedPropertyVariable>,
    pub(crate) sampling_media: Vec<SamplingMediumRecord>,
}

impl MemCollections {
    fn datasource(&self, key: DataSourceKey) -> Option<&DataSource> {
        self.datasources.iter().find(|d| d.key == key)
    }

    pub(crate) fn variables(&self) -> &[ObservedPropertyVariable] {
        &self.variables
    }

    fn variable(&self, key: VariableKey) -> Option<&ObservedPropertyVariable> {
        self.variables_by_key
            .get(&key)
            .and_then(|idx| self.variables.get(*idx))
    }

    fn variable_by_basin3d_id(&self, basin3d_id: &str) -> Option<&ObservedPropertyVariable> {
        self.variables_by_basin3d_id
            .get(basin3d_id)
            .and_then(|idx| self.variables.get(*idx))
    }

    pub(crate) fn push_variable(&mut self, variable: ObservedPropertyVariable) {
        let idx = self.variables.len();
        self.variables_by_key.insert(variable.key, idx);
        self.variables_by_basin3d_id
            .insert(variable.basin3d_id.clone(), idx);
        self.variables.push(variable);
    }

    fn sampling_medium(&self, key: SamplingMediumKey) -> Option<SamplingMediumRecord> {
        self.sampling_media.iter().find(|m| m.key == key).copied()
    }
}

/// Next free key value for a collection whose records carry keys `existing`
fn next_key(existing: impl Iterator<Item = i64>) -> i64 {
    existing.max().unwrap_or(0) + 1
}

/// A transaction holding the store's write lock. Changes are made to a staged copy of the
/// collections, which replaces the live copy on commit.
pub struct MemTxn<'a> {
    guard: RwLockWriteGuard<'a, MemCollections>,
    stage: MemCollections,
    finalized: bool,
}

impl fmt::Debug for MemTxn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTxn")
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

impl Drop for MemTxn<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("Dropping MemTxn w/o finalizing (commit or abort)");
        }
    }
}

impl Transaction for MemTxn<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = std::mem::take(&mut self.stage);
        self.finalized = true;
        Ok(())
    }

    fn abort(mut self: Box<Self>) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

impl RepoCollection for MemTxn<'_> {
    fn datasources(&mut self) -> &mut dyn DataSourceRepo {
        self
    }

    fn variables(&mut self) -> &mut dyn VariableRepo {
        self
    }

    fn observed_properties(&mut self) -> &mut dyn ObservedPropertyRepo {
        self
    }

    fn sampling_media(&mut self) -> &mut dyn SamplingMediumRepo {
        self
    }
}

impl DataSourceRepo for MemTxn<'_> {
    fn create_or_update(&mut self, params: DataSourceParams) -> Result<DataSource> {
        let stage = &mut self.stage;

        if let Some(owner) = stage
            .prefixes
            .get_by_right(&params.id_prefix)
            .and_then(|key| stage.datasource(*key))
        {
            if owner.id != params.id {
                return Err(Error::DataSourcePrefixConflict {
                    prefix: params.id_prefix,
                    existing: owner.id.clone(),
                    attempted: params.id,
                });
            }
        }

        let key = match stage.datasources.iter_mut().find(|d| d.id == params.id) {
            Some(existing) => {
                existing.name = params.name;
                existing.id_prefix = params.id_prefix.clone();
                existing.location = params.location;
                existing.connection_class = params.connection_class;
                existing.key
            }
            None => {
                let key = DataSourceKey::new(next_key(
                    stage.datasources.iter().map(|d| d.key.get()),
                ));
                stage.datasources.push(DataSource {
                    key,
                    id: params.id,
                    name: params.name,
                    id_prefix: params.id_prefix.clone(),
                    location: params.location,
                    credentials: None,
                    connection_class: params.connection_class,
                });
                key
            }
        };
        stage.prefixes.insert(key, params.id_prefix);

        stage
            .datasource(key)
            .cloned()
            .ok_or(Error::DataSourceNotFound { key })
    }

    fn set_credentials(&mut self, id: &str, credentials: Option<String>) -> Result<DataSource> {
        let datasource = self
            .stage
            .datasources
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::DataSourceIdNotFound { id: id.to_string() })?;
        datasource.credentials = credentials;
        Ok(datasource.clone())
    }
}

impl VariableRepo for MemTxn<'_> {
    fn create_or_get(&mut self, params: VariableParams) -> Result<ObservedPropertyVariable> {
        let stage = &mut self.stage;
        if let Some(existing) = stage.variable_by_basin3d_id(&params.basin3d_id) {
            return Ok(existing.clone());
        }

        let variable = ObservedPropertyVariable {
            key: VariableKey::new(next_key(stage.variables_by_key.keys().map(|k| k.get()))),
            basin3d_id: params.basin3d_id,
            full_name: params.full_name,
            categories: params.categories,
            units: params.units,
        };
        stage.push_variable(variable.clone());
        Ok(variable)
    }
}

impl ObservedPropertyRepo for MemTxn<'_> {
    fn create_or_update(
        &mut self,
        params: ObservedPropertyParams,
    ) -> Result<DataSourceObservedPropertyVariable> {
        let stage = &mut self.stage;

        if stage.datasource(params.datasource).is_none() {
            return Err(Error::DataSourceNotFound {
                key: params.datasource,
            });
        }
        if stage.variable(params.variable).is_none() {
            return Err(Error::VariableNotFound {
                key: params.variable,
            });
        }
        if stage.sampling_medium(params.sampling_medium).is_none() {
            return Err(Error::SamplingMediumNotFound {
                key: params.sampling_medium,
            });
        }

        if let Some(existing) = stage
            .observed_properties
            .iter_mut()
            .find(|p| p.datasource == params.datasource && p.variable == params.variable)
        {
            existing.datasource_variable_name = params.datasource_variable_name;
            existing.sampling_medium = params.sampling_medium;
            existing.description = params.description;
            return Ok(existing.clone());
        }

        let row = DataSourceObservedPropertyVariable {
            key: ObservedPropertyKey::new(next_key(
                stage.observed_properties.iter().map(|p| p.key.get()),
            )),
            datasource: params.datasource,
            variable: params.variable,
            datasource_variable_name: params.datasource_variable_name,
            sampling_medium: params.sampling_medium,
            description: params.description,
        };
        stage.observed_properties.push(row.clone());
        Ok(row)
    }

    fn get_by_variable(
        &mut self,
        datasource: DataSourceKey,
        variable: VariableKey,
    ) -> Result<Option<DataSourceObservedPropertyVariable>> {
        Ok(self
            .stage
            .observed_properties
            .iter()
            .find(|p| p.datasource == datasource && p.variable == variable)
            .cloned())
    }

    fn list_by_datasource(
        &mut self,
        datasource: DataSourceKey,
    ) -> Result<Vec<DataSourceObservedPropertyVariable>> {
        Ok(self
            .stage
            .observed_properties
            .iter()
            .filter(|p| p.datasource == datasource)
            .cloned()
            .collect())
    }

    fn delete(&mut self, key: ObservedPropertyKey) -> Result<()> {
        let rows = &mut self.stage.observed_properties;
        let idx = rows
            .iter()
            .position(|p| p.key == key)
            .ok_or(Error::ObservedPropertyNotFound { key })?;
        rows.remove(idx);
        Ok(())
    }
}

impl SamplingMediumRepo for MemTxn<'_> {
    fn create_or_get(&mut self, medium: SamplingMedium) -> Result<SamplingMediumRecord> {
        let stage = &mut self.stage;
        if let Some(existing) = stage.sampling_media.iter().find(|m| m.medium == medium) {
            return Ok(*existing);
        }
        let record = SamplingMediumRecord {
            key: SamplingMediumKey::new(next_key(
                stage.sampling_media.iter().map(|m| m.key.get()),
            )),
            medium,
        };
        stage.sampling_media.push(record);
        Ok(record)
    }

    fn get(&mut self, medium: SamplingMedium) -> Result<Option<SamplingMediumRecord>> {
        Ok(self
            .stage
            .sampling_media
            .iter()
            .find(|m| m.medium == medium)
            .copied())
    }
}

impl CatalogStore for MemCatalog {
    fn start_transaction(&self) -> Box<dyn Transaction + '_> {
        let guard = self.collections.write();
        let stage = guard.clone();
        Box::new(MemTxn {
            guard,
            stage,
            finalized: false,
        })
    }

    fn reset(&self) {
        *self.collections.write() = MemCollections::default();
    }

    fn datasource_count(&self) -> usize {
        self.collections.read().datasources.len()
    }

    fn datasources(&self) -> Vec<DataSource> {
        self.collections.read().datasources.clone()
    }

    fn datasource_by_id(&self, id: &str) -> Option<DataSource> {
        self.collections
            .read()
            .datasources
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    fn datasource_by_prefix(&self, prefix: &str) -> Option<DataSource> {
        let prefix = IdPrefix::new(prefix).ok()?;
        let c = self.collections.read();
        c.prefixes
            .get_by_right(&prefix)
            .and_then(|key| c.datasource(*key))
            .cloned()
    }

    fn variable_by_key(&self, key: VariableKey) -> Option<ObservedPropertyVariable> {
        self.collections.read().variable(key).cloned()
    }

    fn variable_by_basin3d_id(&self, basin3d_id: &str) -> Option<ObservedPropertyVariable> {
        self.collections
            .read()
            .variable_by_basin3d_id(basin3d_id)
            .cloned()
    }

    fn sampling_media(&self) -> Vec<SamplingMediumRecord> {
        self.collections.read().sampling_media.clone()
    }

    fn resolve_observed_property(
        &self,
        row: &DataSourceObservedPropertyVariable,
    ) -> Option<ObservedProperty> {
        let c = self.collections.read();
        let datasource = c.datasource(row.datasource)?;
        let variable = c.variable(row.variable)?;
        let medium = c.sampling_medium(row.sampling_medium)?;
        Some(ObservedProperty {
            sampling_medium: medium.medium,
            datasource_variable: row.datasource_variable_name.clone(),
            datasource_description: row.description.clone(),
            observed_property_variable: variable.clone(),
            datasource: DataSourceInfo::from(datasource),
        })
    }

    fn next_variable(
        &self,
        position: usize,
        filter: &VariableFilter,
    ) -> Option<(usize, ObservedPropertyVariable)> {
        let c = self.collections.read();
        c.variables
            .iter()
            .enumerate()
            .skip(position)
            .find(|(_, v)| filter.matches(v))
            .map(|(idx, v)| (idx + 1, v.clone()))
    }

    fn next_observed_property(
        &self,
        position: usize,
        filter: &ObservedPropertyFilter,
    ) -> Option<(usize, DataSourceObservedPropertyVariable)> {
        let c = self.collections.read();
        c.observed_properties
            .iter()
            .enumerate()
            .skip(position)
            .find(|(_, p)| filter.matches(p))
            .map(|(idx, p)| (idx + 1, p.clone()))
    }

    fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot::from_collections(&self.collections.read())
    }
}
