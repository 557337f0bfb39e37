//! The BASIN-3D variable/property catalog: canonical observed property variables, their
//! realization at each datasource, and the translation between the two.

pub mod bootstrap;
pub mod catalog;
pub mod interface;
pub mod mem;
pub mod sampling_medium;
pub mod snapshot;

pub use bootstrap::{CatalogBootstrap, discover_plugins};
pub use catalog::{
    Catalog, CatalogArgs, InitializeReport, ObservedProperties, ObservedPropertyVariables,
};
pub use interface::{
    CatalogStore, DataSource, DataSourceInfo, Error, ObservedProperty, ObservedPropertyVariable,
    Result,
};
pub use mem::MemCatalog;
pub use sampling_medium::SamplingMedium;
pub use snapshot::CatalogSnapshot;
