//! The variable/property synthesis catalog.
//!
//! [`Catalog::initialize`] merges every plugin's mapping rows into the store; the `find_*`
//! operations translate between datasource local variable names and canonical BASIN-3D ids.
//! Names passed to the read operations may carry the datasource prefix (`"A-ACT"`) or not
//! (`"ACT"`).

use std::sync::Arc;

use basin3d_id::{PrefixedId, VariableKey};
use basin3d_plugin::table::TableSource;
use basin3d_plugin::{MappingRow, PluginHandle, vocabulary};
use hashbrown::{HashMap, HashSet};
use observability_deps::tracing::{debug, info, warn};

use crate::interface::{
    CatalogStore, DataSource, DataSourceParams, Error, ObservedProperty, ObservedPropertyFilter,
    ObservedPropertyParams, ObservedPropertyVariable, PropertySelector, PropertyTarget,
    RepoCollection, Result, Transaction, VariableFilter, VariableParams, with_transaction,
};
use crate::mem::MemCatalog;
use crate::sampling_medium::{SamplingMedium, SamplingMediumRegistry};
use crate::snapshot::CatalogSnapshot;

/// Settings for a [`Catalog`]
#[derive(Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Canonical vocabulary seeded ahead of plugin mapping rows
    pub vocabulary: Option<TableSource>,
}

/// Outcome of one [`Catalog::initialize`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeReport {
    pub plugins_loaded: usize,
    pub plugins_failed: usize,
    pub rows_applied: usize,
    pub rows_skipped: usize,
    /// Rows of earlier passes dropped because an edited mapping table gave their local name to
    /// another canonical variable
    pub rows_superseded: usize,
    pub vocabulary_entries: usize,
}

/// Row counts for one plugin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PluginLoad {
    applied: usize,
    skipped: usize,
    superseded: usize,
}

#[derive(Debug)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    args: CatalogArgs,
}

/// Which datasource a read is restricted to
enum Scope {
    All,
    DataSource(DataSource),
    Unknown,
}

impl Catalog {
    pub fn new(store: Arc<dyn CatalogStore>, args: CatalogArgs) -> Self {
        Self { store, args }
    }

    pub fn new_in_memory(args: CatalogArgs) -> Self {
        Self::new(Arc::new(MemCatalog::new()), args)
    }

    /// Rebuild a catalog from a previously written snapshot
    pub fn from_snapshot(snapshot: CatalogSnapshot, args: CatalogArgs) -> Result<Self> {
        Ok(Self::new(Arc::new(MemCatalog::try_from(snapshot)?), args))
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.store.snapshot()
    }

    /// True once at least one datasource has been registered
    pub fn is_initialized(&self) -> bool {
        self.store.datasource_count() > 0
    }

    /// Remove all catalog content.
    pub fn reset(&self) {
        self.store.reset();
        info!("catalog reset");
    }

    /// Merge the datasources and mapping rows of `plugins` into the catalog.
    ///
    /// Safe to call repeatedly: existing canonical variables are reused, mapping rows are
    /// updated in place. A plugin that cannot be loaded, and any row that cannot be applied, is
    /// logged and skipped.
    pub fn initialize(&self, plugins: &[Arc<dyn PluginHandle>]) -> Result<InitializeReport> {
        SamplingMediumRegistry::new(self.store.as_ref()).ensure_seeded()?;

        let mut report = InitializeReport::default();
        if let Some(source) = &self.args.vocabulary {
            report.vocabulary_entries = self.seed_vocabulary(source);
        }

        for plugin in plugins {
            let plugin_id = &plugin.metadata().id;
            match self.load_plugin(plugin.as_ref()) {
                Ok(load) => {
                    info!(
                        plugin = %plugin_id,
                        applied = load.applied,
                        skipped = load.skipped,
                        superseded = load.superseded,
                        "plugin loaded"
                    );
                    report.plugins_loaded += 1;
                    report.rows_applied += load.applied;
                    report.rows_skipped += load.skipped;
                    report.rows_superseded += load.superseded;
                }
                Err(error) => {
                    warn!(plugin = %plugin_id, %error, "plugin failed to load, skipping");
                    report.plugins_failed += 1;
                }
            }
        }

        info!(
            plugins_loaded = report.plugins_loaded,
            plugins_failed = report.plugins_failed,
            rows_applied = report.rows_applied,
            rows_skipped = report.rows_skipped,
            rows_superseded = report.rows_superseded,
            "catalog initialized"
        );
        Ok(report)
    }

    fn seed_vocabulary(&self, source: &TableSource) -> usize {
        let entries = match vocabulary::open(source) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, "unable to read vocabulary, continuing without it");
                return 0;
            }
        };

        let entries: Vec<_> = entries.collect();
        let seeded = with_transaction(self.store.as_ref(), |txn| {
            let mut seeded = 0;
            for entry in entries {
                let basin3d_id = entry.basin3d_id.clone();
                let params = VariableParams {
                    basin3d_id: entry.basin3d_id,
                    full_name: entry.full_name,
                    categories: entry.categories,
                    units: entry.units,
                };
                match txn.variables().create_or_get(params) {
                    Ok(_) => seeded += 1,
                    Err(error) => warn!(%basin3d_id, %error, "vocabulary entry rejected"),
                }
            }
            Ok(seeded)
        });
        match seeded {
            Ok(seeded) => {
                debug!(seeded, "vocabulary seeded");
                seeded
            }
            Err(error) => {
                warn!(%error, "unable to seed vocabulary, continuing without it");
                0
            }
        }
    }

    /// Apply one plugin's datasource and mapping rows.
    ///
    /// All rows of the table are applied in one transaction, so a local name may move between
    /// canonical variables within a single pass. The datasource is registered first, in its own
    /// transaction, and stays registered even if none of the rows apply.
    fn load_plugin(&self, plugin: &dyn PluginHandle) -> Result<PluginLoad> {
        let metadata = plugin.metadata();
        let mut rows = plugin.mapping_rows()?;

        let store = self.store.as_ref();
        let datasource = with_transaction(store, |txn| {
            txn.datasources()
                .create_or_update(DataSourceParams::from(metadata))
        })?;

        let table: Vec<MappingRow> = rows.by_ref().collect();
        let malformed = rows.report().skipped;

        with_transaction(store, |txn| {
            let mut names = LocalNames::default();
            let mut written = HashSet::new();
            let mut applied = 0;
            let mut rejected = 0;
            for row in &table {
                match names
                    .check(&datasource, row)
                    .and_then(|()| apply_mapping_row(txn, &datasource, row))
                {
                    Ok(variable) => {
                        names.claim(row);
                        written.insert(variable);
                        applied += 1;
                    }
                    Err(error) => {
                        warn!(
                            plugin = %metadata.id,
                            basin3d_id = %row.basin3d_id,
                            datasource_name = %row.datasource_name,
                            %error,
                            "mapping row rejected"
                        );
                        rejected += 1;
                    }
                }
            }

            let skipped = malformed + rejected;
            if applied == 0 {
                return Err(basin3d_plugin::Error::NoValidRows {
                    plugin: metadata.id.clone(),
                    skipped,
                }
                .into());
            }

            let superseded = remove_superseded(txn, &datasource, &written)?;
            Ok(PluginLoad {
                applied,
                skipped,
                superseded,
            })
        })
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::CatalogNotInitialized)
        }
    }

    fn scope(&self, datasource_id: Option<&str>) -> Scope {
        match datasource_id {
            None => Scope::All,
            Some(id) => self
                .store
                .datasource_by_id(id)
                .map_or(Scope::Unknown, Scope::DataSource),
        }
    }

    /// Seeded sampling media, in enumeration order
    pub fn sampling_media(&self) -> Vec<SamplingMedium> {
        SamplingMediumRegistry::new(self.store.as_ref()).list()
    }

    pub fn datasources(&self) -> Result<Vec<DataSource>> {
        self.ensure_initialized()?;
        Ok(self.store.datasources())
    }

    pub fn find_datasource(&self, datasource_id: &str) -> Result<Option<DataSource>> {
        self.ensure_initialized()?;
        Ok(self.store.datasource_by_id(datasource_id))
    }

    /// Look up the canonical variable a datasource maps `variable_name` to. With
    /// `from_canonical`, `variable_name` is a canonical id, otherwise the datasource's own name.
    pub fn find_observed_property_variable(
        &self,
        datasource_id: &str,
        variable_name: &str,
        from_canonical: bool,
    ) -> Result<Option<ObservedPropertyVariable>> {
        self.ensure_initialized()?;
        let Some(datasource) = self.store.datasource_by_id(datasource_id) else {
            return Ok(None);
        };

        let name = datasource.id_prefix.strip(variable_name);
        let Some(target) = self.target(None, name, from_canonical) else {
            return Ok(None);
        };
        let filter = ObservedPropertyFilter {
            datasource: Some(datasource.key),
            targets: Some(vec![target]),
        };
        Ok(self
            .store
            .next_observed_property(0, &filter)
            .and_then(|(_, row)| self.store.variable_by_key(row.variable)))
    }

    /// Stream canonical variables. Omitted filters mean no restriction.
    ///
    /// Without a datasource and with `from_canonical`, this is a scan of the canonical
    /// variables themselves, including ones no datasource maps. Otherwise it yields the
    /// variables reached through matching observed properties, each once.
    pub fn find_observed_property_variables(
        &self,
        datasource_id: Option<&str>,
        variable_names: Option<&[&str]>,
        from_canonical: bool,
    ) -> Result<ObservedPropertyVariables> {
        self.ensure_initialized()?;
        let source = match self.scope(datasource_id) {
            Scope::Unknown => VariableSource::Empty,
            Scope::All if from_canonical => VariableSource::Canonical(VariableFilter {
                basin3d_ids: variable_names.map(|names| self.canonical_ids(names)),
            }),
            Scope::All => VariableSource::Mapped {
                filter: ObservedPropertyFilter {
                    datasource: None,
                    targets: variable_names.map(|names| self.targets(None, names, false)),
                },
                seen: HashSet::new(),
            },
            Scope::DataSource(datasource) => VariableSource::Mapped {
                filter: ObservedPropertyFilter {
                    datasource: Some(datasource.key),
                    targets: variable_names
                        .map(|names| self.targets(Some(&datasource), names, from_canonical)),
                },
                seen: HashSet::new(),
            },
        };
        Ok(ObservedPropertyVariables {
            store: Arc::clone(&self.store),
            position: 0,
            source,
        })
    }

    /// Resolve the observed property matching all of datasource, canonical id and local name.
    pub fn find_observed_property(
        &self,
        datasource_id: &str,
        canonical_id: &str,
        local_name: &str,
    ) -> Result<Option<ObservedProperty>> {
        self.ensure_initialized()?;
        let Some(datasource) = self.store.datasource_by_id(datasource_id) else {
            return Ok(None);
        };
        let Some(variable) = self
            .store
            .variable_by_basin3d_id(datasource.id_prefix.strip(canonical_id))
        else {
            return Ok(None);
        };

        let filter = ObservedPropertyFilter {
            datasource: Some(datasource.key),
            targets: Some(vec![PropertyTarget {
                datasource: None,
                selector: PropertySelector::Variable(variable.key),
            }]),
        };
        let local_name = datasource.id_prefix.strip(local_name);
        Ok(self
            .store
            .next_observed_property(0, &filter)
            .filter(|(_, row)| row.datasource_variable_name == local_name)
            .and_then(|(_, row)| self.store.resolve_observed_property(&row)))
    }

    /// Stream resolved observed properties. `variable_names` are canonical ids.
    pub fn find_observed_properties(
        &self,
        datasource_id: Option<&str>,
        variable_names: Option<&[&str]>,
    ) -> Result<ObservedProperties> {
        self.ensure_initialized()?;
        let filter = match self.scope(datasource_id) {
            Scope::Unknown => None,
            Scope::All => Some(ObservedPropertyFilter {
                datasource: None,
                targets: variable_names.map(|names| self.targets(None, names, true)),
            }),
            Scope::DataSource(datasource) => Some(ObservedPropertyFilter {
                datasource: Some(datasource.key),
                targets: variable_names.map(|names| self.targets(Some(&datasource), names, true)),
            }),
        };
        Ok(ObservedProperties {
            store: Arc::clone(&self.store),
            position: 0,
            filter,
        })
    }

    /// Turn requested names into row targets. A name prefixed with a registered datasource's
    /// prefix also matches the bare local name at that datasource.
    fn targets(
        &self,
        datasource: Option<&DataSource>,
        names: &[&str],
        from_canonical: bool,
    ) -> Vec<PropertyTarget> {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            match datasource {
                Some(ds) => targets.extend(self.target(None, ds.id_prefix.strip(name), from_canonical)),
                None => {
                    targets.extend(self.target(None, name, from_canonical));
                    if let Some((ds, local)) = self.split_prefixed(name) {
                        targets.extend(self.target(Some(&ds), &local, from_canonical));
                    }
                }
            }
        }
        targets
    }

    fn target(
        &self,
        datasource: Option<&DataSource>,
        name: &str,
        from_canonical: bool,
    ) -> Option<PropertyTarget> {
        let selector = if from_canonical {
            PropertySelector::Variable(self.store.variable_by_basin3d_id(name)?.key)
        } else {
            PropertySelector::LocalName(name.to_string())
        };
        Some(PropertyTarget {
            datasource: datasource.map(|ds| ds.key),
            selector,
        })
    }

    fn canonical_ids(&self, names: &[&str]) -> HashSet<String> {
        let mut ids = HashSet::with_capacity(names.len());
        for name in names {
            ids.insert(name.to_string());
            if let Some((_, local)) = self.split_prefixed(name) {
                ids.insert(local);
            }
        }
        ids
    }

    /// Split `name` into a registered datasource and its local part, if it carries the prefix
    /// of one.
    fn split_prefixed(&self, name: &str) -> Option<(DataSource, String)> {
        let id: PrefixedId = name.parse().ok()?;
        let datasource = self.store.datasource_by_prefix(id.prefix.as_str())?;
        Some((datasource, id.local_id))
    }
}

/// Local names given out by the rows applied so far in one pass over a mapping table
#[derive(Debug, Default)]
struct LocalNames {
    owners: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl LocalNames {
    /// Fail if an earlier row of the table gave `row`'s local name to another canonical variable
    fn check(&self, datasource: &DataSource, row: &MappingRow) -> Result<()> {
        match self.owners.get(&row.datasource_name) {
            Some(owner) if *owner != row.basin3d_id => Err(Error::LocalNameConflict {
                datasource: datasource.id.clone(),
                local_name: row.datasource_name.clone(),
                existing: owner.clone(),
                attempted: row.basin3d_id.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn claim(&mut self, row: &MappingRow) {
        if let Some(previous) = self
            .names
            .insert(row.basin3d_id.clone(), row.datasource_name.clone())
        {
            // a later row for the same variable renames it
            self.owners.remove(&previous);
        }
        self.owners
            .insert(row.datasource_name.clone(), row.basin3d_id.clone());
    }
}

/// Delete rows of `datasource` not written by this pass whose local name a written row now
/// holds. Returns the number deleted.
fn remove_superseded(
    txn: &mut (dyn Transaction + '_),
    datasource: &DataSource,
    written: &HashSet<VariableKey>,
) -> Result<usize> {
    let rows = txn.observed_properties().list_by_datasource(datasource.key)?;
    let claimed: HashSet<&str> = rows
        .iter()
        .filter(|r| written.contains(&r.variable))
        .map(|r| r.datasource_variable_name.as_str())
        .collect();

    let mut removed = 0;
    for row in rows.iter().filter(|r| {
        !written.contains(&r.variable) && claimed.contains(r.datasource_variable_name.as_str())
    }) {
        info!(
            datasource = %datasource.id,
            local_name = %row.datasource_variable_name,
            key = %row.key,
            "removing mapping row superseded by an edited mapping table"
        );
        txn.observed_properties().delete(row.key)?;
        removed += 1;
    }
    Ok(removed)
}

/// Apply one mapping row, returning the key of the canonical variable it maps to.
///
/// Every check that can reject the row runs before anything is written.
fn apply_mapping_row(
    txn: &mut (dyn Transaction + '_),
    datasource: &DataSource,
    row: &MappingRow,
) -> Result<VariableKey> {
    let medium: SamplingMedium = row.sampling_medium.parse()?;
    let medium = txn
        .sampling_media()
        .get(medium)?
        .ok_or(Error::SamplingMediumNotSeeded { medium })?;

    let variable = txn.variables().create_or_get(VariableParams {
        basin3d_id: row.basin3d_id.clone(),
        full_name: row
            .full_name
            .clone()
            .unwrap_or_else(|| row.description.clone()),
        categories: row.categories.clone(),
        units: None,
    })?;

    let properties = txn.observed_properties();
    if let Some(existing) = properties.get_by_variable(datasource.key, variable.key)?
        && existing.datasource_variable_name != row.datasource_name
    {
        debug!(
            datasource = %datasource.id,
            basin3d_id = %row.basin3d_id,
            from = %existing.datasource_variable_name,
            to = %row.datasource_name,
            "local name changed"
        );
    }
    properties.create_or_update(ObservedPropertyParams {
        datasource: datasource.key,
        variable: variable.key,
        datasource_variable_name: row.datasource_name.clone(),
        sampling_medium: medium.key,
        description: row.description.clone(),
    })?;
    Ok(variable.key)
}

#[derive(Debug, Clone)]
enum VariableSource {
    Empty,
    Canonical(VariableFilter),
    Mapped {
        filter: ObservedPropertyFilter,
        seen: HashSet<VariableKey>,
    },
}

/// Lazy sequence of canonical variables returned by
/// [`Catalog::find_observed_property_variables`].
///
/// Each step takes a short read lock on the store. A clone continues independently from the
/// point it was cloned at.
#[derive(Debug, Clone)]
pub struct ObservedPropertyVariables {
    store: Arc<dyn CatalogStore>,
    position: usize,
    source: VariableSource,
}

impl Iterator for ObservedPropertyVariables {
    type Item = ObservedPropertyVariable;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            VariableSource::Empty => None,
            VariableSource::Canonical(filter) => {
                let (next, variable) = self.store.next_variable(self.position, filter)?;
                self.position = next;
                Some(variable)
            }
            VariableSource::Mapped { filter, seen } => loop {
                let (next, row) = self.store.next_observed_property(self.position, filter)?;
                self.position = next;
                if !seen.insert(row.variable) {
                    continue;
                }
                if let Some(variable) = self.store.variable_by_key(row.variable) {
                    return Some(variable);
                }
            },
        }
    }
}

/// Lazy sequence of resolved observed properties returned by
/// [`Catalog::find_observed_properties`].
#[derive(Debug, Clone)]
pub struct ObservedProperties {
    store: Arc<dyn CatalogStore>,
    position: usize,
    filter: Option<ObservedPropertyFilter>,
}

impl Iterator for ObservedProperties {
    type Item = ObservedProperty;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter.as_ref()?;
        loop {
            let (next, row) = self.store.next_observed_property(self.position, filter)?;
            self.position = next;
            match self.store.resolve_observed_property(&row) {
                Some(property) => return Some(property),
                None => warn!(key = %row.key, "observed property references missing records"),
            }
        }
    }
}
