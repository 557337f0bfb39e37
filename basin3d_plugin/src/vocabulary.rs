//! The canonical BASIN-3D observed property vocabulary.
//!
//! Seeding the catalog from this table gives canonical variables their proper full names and
//! units before any plugin mapping references them.

use serde::Deserialize;

use crate::table::{self, TableRecord, TableRows, TableSource, required, split_categories};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub basin3d_id: String,
    pub full_name: String,
    pub categories: Vec<String>,
    pub units: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawVocabularyEntry {
    #[serde(alias = "basin3d_vocab")]
    basin3d_id: Option<String>,
    full_name: Option<String>,
    categories: Option<String>,
    units: Option<String>,
}

impl TableRecord for VocabularyEntry {
    type Raw = RawVocabularyEntry;

    fn from_raw(raw: Self::Raw) -> Result<Self, String> {
        Ok(Self {
            basin3d_id: required(raw.basin3d_id, "basin3d_id")?,
            full_name: required(raw.full_name, "full_name")?,
            categories: split_categories(raw.categories.as_deref()),
            units: raw.units.filter(|s| !s.is_empty()),
        })
    }
}

pub type VocabularyEntries = TableRows<VocabularyEntry>;

pub fn open(source: &TableSource) -> Result<VocabularyEntries> {
    table::open("vocabulary", source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_entries() {
        let source = TableSource::inline(
            "vocabulary",
            "basin3d_vocab,full_name,categories,units\n\
             ACT,Acetate (CH3COO),\"Biogeochemistry,Anions\",mM\n\
             pH,pH,\"Biogeochemistry\",\n\
             Hg,,Metals,ng/l\n",
        );
        let mut entries = open(&source).unwrap();
        let all: Vec<_> = entries.by_ref().collect();
        assert_eq!(
            vec![
                VocabularyEntry {
                    basin3d_id: "ACT".into(),
                    full_name: "Acetate (CH3COO)".into(),
                    categories: vec!["Biogeochemistry".into(), "Anions".into()],
                    units: Some("mM".into()),
                },
                VocabularyEntry {
                    basin3d_id: "pH".into(),
                    full_name: "pH".into(),
                    categories: vec!["Biogeochemistry".into()],
                    units: None,
                },
            ],
            all
        );
        assert_eq!(1, entries.report().skipped);
    }
}
