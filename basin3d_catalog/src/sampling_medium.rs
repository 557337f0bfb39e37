//! The fixed vocabulary of sampling media.

use std::fmt;
use std::str::FromStr;

use observability_deps::tracing::debug;
use serde::{Deserialize, Serialize};

use crate::interface::{CatalogStore, Error, RepoCollection, Result, with_transaction};

/// The physical medium a measurement is taken in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingMedium {
    SolidPhase,
    Water,
    Gas,
    Other,
    NotApplicable,
}

impl SamplingMedium {
    pub const ALL: [Self; 5] = [
        Self::SolidPhase,
        Self::Water,
        Self::Gas,
        Self::Other,
        Self::NotApplicable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SolidPhase => "SOLID_PHASE",
            Self::Water => "WATER",
            Self::Gas => "GAS",
            Self::Other => "OTHER",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl fmt::Display for SamplingMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case insensitive; spaces and hyphens are read as underscores, so `"solid phase"` parses.
impl FromStr for SamplingMedium {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| Error::UnknownSamplingMedium { name: s.to_string() })
    }
}

/// Seeds and lists the sampling media held by a store
#[derive(Debug, Clone, Copy)]
pub struct SamplingMediumRegistry<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> SamplingMediumRegistry<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Create a record for every medium not already present. Idempotent.
    pub fn ensure_seeded(&self) -> Result<()> {
        with_transaction(self.store, |txn| {
            for medium in SamplingMedium::ALL {
                let record = txn.sampling_media().create_or_get(medium)?;
                debug!(%medium, key = %record.key, "sampling medium seeded");
            }
            Ok(())
        })
    }

    pub fn list(&self) -> Vec<SamplingMedium> {
        let mut media: Vec<_> = self
            .store
            .sampling_media()
            .into_iter()
            .map(|r| r.medium)
            .collect();
        media.sort();
        media
    }
}
