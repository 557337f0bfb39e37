//! This module contains the traits and data objects for the catalog store.
//!
//! Writes happen inside a [`Transaction`] obtained from a [`CatalogStore`]; each repo method
//! enforces the store's uniqueness constraints and reports a violation as an [`Error`] rather
//! than corrupting state. Reads go straight to the store and never take part in a transaction.

use std::path::PathBuf;

use basin3d_id::{DataSourceKey, IdPrefix, ObservedPropertyKey, SamplingMediumKey, VariableKey};
use basin3d_plugin::PluginMetadata;
use hashbrown::HashSet;
use serde::Serialize;
use thiserror::Error;

use crate::sampling_medium::SamplingMedium;
use crate::snapshot::CatalogSnapshot;

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog has not been initialized")]
    CatalogNotInitialized,

    #[error(transparent)]
    Plugin(#[from] basin3d_plugin::Error),

    #[error("unknown sampling medium {name:?}")]
    UnknownSamplingMedium { name: String },

    #[error("sampling medium {medium} has not been seeded")]
    SamplingMediumNotSeeded { medium: SamplingMedium },

    #[error("sampling medium record {key} not found")]
    SamplingMediumNotFound { key: SamplingMediumKey },

    #[error("datasource record {key} not found")]
    DataSourceNotFound { key: DataSourceKey },

    #[error("datasource {id} not found")]
    DataSourceIdNotFound { id: String },

    #[error("observed property variable record {key} not found")]
    VariableNotFound { key: VariableKey },

    #[error("observed property record {key} not found")]
    ObservedPropertyNotFound { key: ObservedPropertyKey },

    #[error("id prefix {prefix} of datasource {attempted} is already used by datasource {existing}")]
    DataSourcePrefixConflict {
        prefix: IdPrefix,
        existing: String,
        attempted: String,
    },

    #[error(
        "datasource {datasource} already maps {local_name} to {existing}, cannot also map it to {attempted}"
    )]
    LocalNameConflict {
        datasource: String,
        local_name: String,
        existing: String,
        attempted: String,
    },

    #[error("invalid catalog snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unable to access catalog snapshot {}: {source}", path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to encode catalog snapshot: {0}")]
    SnapshotEncoding(#[from] serde_json::Error),
}

/// A specialized `Error` for catalog errors
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Data object for a registered datasource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub key: DataSourceKey,
    /// Canonical datasource code, unique across the catalog
    pub id: String,
    pub name: String,
    /// Unique across the catalog
    pub id_prefix: IdPrefix,
    pub location: String,
    /// Opaque credentials, owned by whoever configures the datasource
    pub credentials: Option<String>,
    pub connection_class: Option<String>,
}

/// The datasource fields exposed on API records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceInfo {
    pub id: String,
    pub name: String,
    pub id_prefix: IdPrefix,
    pub location: String,
}

impl From<&DataSource> for DataSourceInfo {
    fn from(ds: &DataSource) -> Self {
        Self {
            id: ds.id.clone(),
            name: ds.name.clone(),
            id_prefix: ds.id_prefix.clone(),
            location: ds.location.clone(),
        }
    }
}

/// A canonical, datasource independent variable such as pH
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedPropertyVariable {
    #[serde(skip)]
    pub key: VariableKey,
    pub basin3d_id: String,
    pub full_name: String,
    /// Ordered from general to specific
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingMediumRecord {
    pub key: SamplingMediumKey,
    pub medium: SamplingMedium,
}

/// The stored row relating a datasource's own variable name to a canonical variable.
/// Unique by `(datasource, variable)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceObservedPropertyVariable {
    pub key: ObservedPropertyKey,
    pub datasource: DataSourceKey,
    pub variable: VariableKey,
    pub datasource_variable_name: String,
    pub sampling_medium: SamplingMediumKey,
    pub description: String,
}

/// A canonical variable as realized at one datasource, fully resolved for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedProperty {
    pub sampling_medium: SamplingMedium,
    pub datasource_variable: String,
    pub datasource_description: String,
    pub observed_property_variable: ObservedPropertyVariable,
    pub datasource: DataSourceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceParams {
    pub id: String,
    pub name: String,
    pub id_prefix: IdPrefix,
    pub location: String,
    pub connection_class: Option<String>,
}

impl From<&PluginMetadata> for DataSourceParams {
    fn from(metadata: &PluginMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            name: metadata.display_name().to_string(),
            id_prefix: metadata.id_prefix.clone(),
            location: metadata.location.clone(),
            connection_class: metadata.connection_class.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableParams {
    pub basin3d_id: String,
    pub full_name: String,
    pub categories: Vec<String>,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPropertyParams {
    pub datasource: DataSourceKey,
    pub variable: VariableKey,
    pub datasource_variable_name: String,
    pub sampling_medium: SamplingMediumKey,
    pub description: String,
}

/// What an observed property row is matched on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySelector {
    Variable(VariableKey),
    LocalName(String),
}

/// A selector, optionally scoped to a single datasource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTarget {
    pub datasource: Option<DataSourceKey>,
    pub selector: PropertySelector,
}

impl PropertyTarget {
    pub fn matches(&self, row: &DataSourceObservedPropertyVariable) -> bool {
        if self.datasource.is_some_and(|ds| ds != row.datasource) {
            return false;
        }
        match &self.selector {
            PropertySelector::Variable(key) => row.variable == *key,
            PropertySelector::LocalName(name) => row.datasource_variable_name == *name,
        }
    }
}

/// Filter over observed property rows. `None` means no restriction; `Some` of an empty list of
/// targets matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedPropertyFilter {
    pub datasource: Option<DataSourceKey>,
    pub targets: Option<Vec<PropertyTarget>>,
}

impl ObservedPropertyFilter {
    pub fn matches(&self, row: &DataSourceObservedPropertyVariable) -> bool {
        if self.datasource.is_some_and(|ds| ds != row.datasource) {
            return false;
        }
        self.targets
            .as_ref()
            .is_none_or(|targets| targets.iter().any(|t| t.matches(row)))
    }
}

/// Filter over canonical variables, by `basin3d_id`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableFilter {
    pub basin3d_ids: Option<HashSet<String>>,
}

impl VariableFilter {
    pub fn matches(&self, variable: &ObservedPropertyVariable) -> bool {
        self.basin3d_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&variable.basin3d_id))
    }
}

/// A store holding the catalog's records.
///
/// Read methods take a short lock per call and never span calls; the `next_*` methods let
/// callers stream a scan one record at a time, resuming from the returned position.
pub trait CatalogStore: std::fmt::Debug + Send + Sync {
    /// Start a transaction. Writes are only visible to readers once committed.
    fn start_transaction(&self) -> Box<dyn Transaction + '_>;

    /// Remove every record.
    fn reset(&self);

    fn datasource_count(&self) -> usize;

    fn datasources(&self) -> Vec<DataSource>;

    fn datasource_by_id(&self, id: &str) -> Option<DataSource>;

    fn datasource_by_prefix(&self, prefix: &str) -> Option<DataSource>;

    fn variable_by_key(&self, key: VariableKey) -> Option<ObservedPropertyVariable>;

    fn variable_by_basin3d_id(&self, basin3d_id: &str) -> Option<ObservedPropertyVariable>;

    fn sampling_media(&self) -> Vec<SamplingMediumRecord>;

    /// Join `row` with its datasource, variable and sampling medium in a single read. `None` if
    /// any of them is missing.
    fn resolve_observed_property(
        &self,
        row: &DataSourceObservedPropertyVariable,
    ) -> Option<ObservedProperty>;

    /// Return the first variable at or after `position` matching `filter`, along with the
    /// position to resume from.
    fn next_variable(
        &self,
        position: usize,
        filter: &VariableFilter,
    ) -> Option<(usize, ObservedPropertyVariable)>;

    /// Return the first observed property row at or after `position` matching `filter`, along
    /// with the position to resume from.
    fn next_observed_property(
        &self,
        position: usize,
        filter: &ObservedPropertyFilter,
    ) -> Option<(usize, DataSourceObservedPropertyVariable)>;

    fn snapshot(&self) -> CatalogSnapshot;
}

/// A unit of work against a [`CatalogStore`]. Must be finished with either `commit` or `abort`.
pub trait Transaction: RepoCollection + std::fmt::Debug {
    fn commit(self: Box<Self>) -> Result<()>;

    fn abort(self: Box<Self>) -> Result<()>;
}

/// Run `f` in a fresh transaction, committing if it succeeds and aborting if it fails.
pub fn with_transaction<'a, T>(
    store: &'a dyn CatalogStore,
    f: impl FnOnce(&mut (dyn Transaction + 'a)) -> Result<T>,
) -> Result<T> {
    let mut txn = store.start_transaction();
    match f(txn.as_mut()) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            txn.abort()?;
            Err(e)
        }
    }
}

/// Container that can return repos for each of the catalog data types.
pub trait RepoCollection {
    fn datasources(&mut self) -> &mut dyn DataSourceRepo;

    fn variables(&mut self) -> &mut dyn VariableRepo;

    fn observed_properties(&mut self) -> &mut dyn ObservedPropertyRepo;

    fn sampling_media(&mut self) -> &mut dyn SamplingMediumRepo;
}

/// Functions for working with datasources in the catalog
pub trait DataSourceRepo {
    /// Create the datasource, or update the name, prefix, location and connection class of the
    /// existing record with the same id. Stored credentials are never touched. Returns
    /// [`Error::DataSourcePrefixConflict`] if another datasource already uses the prefix.
    fn create_or_update(&mut self, params: DataSourceParams) -> Result<DataSource>;

    /// Replace the stored credentials of an existing datasource.
    fn set_credentials(&mut self, id: &str, credentials: Option<String>) -> Result<DataSource>;
}

/// Functions for working with canonical variables in the catalog
pub trait VariableRepo {
    /// Creates the variable or gets the existing record by `basin3d_id`. An existing record is
    /// returned unchanged.
    fn create_or_get(&mut self, params: VariableParams) -> Result<ObservedPropertyVariable>;
}

/// Functions for working with datasource observed properties in the catalog
///
/// Only `(datasource, variable)` is unique at this level. Local names are kept unique per
/// datasource by the initialize pass, which sees a plugin's whole mapping table at once.
pub trait ObservedPropertyRepo {
    /// Creates the mapping row, or overwrites the local name, sampling medium and description of
    /// the existing row for the same `(datasource, variable)` pair.
    fn create_or_update(
        &mut self,
        params: ObservedPropertyParams,
    ) -> Result<DataSourceObservedPropertyVariable>;

    fn get_by_variable(
        &mut self,
        datasource: DataSourceKey,
        variable: VariableKey,
    ) -> Result<Option<DataSourceObservedPropertyVariable>>;

    /// All rows of `datasource`, in insertion order
    fn list_by_datasource(
        &mut self,
        datasource: DataSourceKey,
    ) -> Result<Vec<DataSourceObservedPropertyVariable>>;

    fn delete(&mut self, key: ObservedPropertyKey) -> Result<()>;
}

/// Functions for working with sampling media in the catalog
pub trait SamplingMediumRepo {
    /// Creates the sampling medium or gets the existing record.
    fn create_or_get(&mut self, medium: SamplingMedium) -> Result<SamplingMediumRecord>;

    fn get(&mut self, medium: SamplingMedium) -> Result<Option<SamplingMediumRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(datasource: i64, variable: i64, name: &str) -> DataSourceObservedPropertyVariable {
        DataSourceObservedPropertyVariable {
            key: ObservedPropertyKey::new(1),
            datasource: DataSourceKey::new(datasource),
            variable: VariableKey::new(variable),
            datasource_variable_name: name.to_string(),
            sampling_medium: SamplingMediumKey::new(1),
            description: String::new(),
        }
    }

    #[test]
    fn unrestricted_filter_matches_everything() {
        assert!(ObservedPropertyFilter::default().matches(&row(1, 1, "Acetate")));
    }

    #[test]
    fn empty_targets_match_nothing() {
        let filter = ObservedPropertyFilter {
            datasource: None,
            targets: Some(vec![]),
        };
        assert!(!filter.matches(&row(1, 1, "Acetate")));
    }

    #[test]
    fn targets_respect_their_datasource() {
        let filter = ObservedPropertyFilter {
            datasource: None,
            targets: Some(vec![PropertyTarget {
                datasource: Some(DataSourceKey::new(2)),
                selector: PropertySelector::LocalName("Acetate".into()),
            }]),
        };
        assert!(!filter.matches(&row(1, 1, "Acetate")));
        assert!(filter.matches(&row(2, 1, "Acetate")));
        assert!(!filter.matches(&row(2, 1, "Aluminum")));
    }

    #[test]
    fn datasource_restriction() {
        let filter = ObservedPropertyFilter {
            datasource: Some(DataSourceKey::new(1)),
            targets: Some(vec![PropertyTarget {
                datasource: None,
                selector: PropertySelector::Variable(VariableKey::new(7)),
            }]),
        };
        assert!(filter.matches(&row(1, 7, "x")));
        assert!(!filter.matches(&row(2, 7, "x")));
        assert!(!filter.matches(&row(1, 8, "x")));
    }
}
