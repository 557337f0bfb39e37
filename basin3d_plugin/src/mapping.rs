//! A plugin's variable mapping table.
//!
//! Each row relates one of the datasource's own variable names to a canonical BASIN-3D variable:
//!
//! ```text
//! basin3d_id,datasource_name,description,sampling_medium,categories
//! ACT,Acetate,"Acetate (CH3COO)",WATER,"Biogeochemistry,Anions"
//! ```
//!
//! `broker_id` and `basin3d_vocab` are accepted as aliases of `basin3d_id`, and
//! `datasource_vocab` as an alias of `datasource_name`. An optional `full_name` column names the
//! canonical variable when it is first created. The `categories` column must be present, but a
//! row may leave it blank.

use csv::StringRecord;
use serde::Deserialize;

use crate::table::{self, TableRecord, TableRows, TableSource, required, split_categories};
use crate::Result;

/// One normalized row of a mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub basin3d_id: String,
    pub datasource_name: String,
    pub full_name: Option<String>,
    pub description: String,
    pub sampling_medium: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawMappingRow {
    #[serde(alias = "broker_id", alias = "basin3d_vocab")]
    basin3d_id: Option<String>,
    #[serde(alias = "datasource_vocab")]
    datasource_name: Option<String>,
    full_name: Option<String>,
    description: Option<String>,
    sampling_medium: Option<String>,
    categories: Option<String>,
}

impl TableRecord for MappingRow {
    type Raw = RawMappingRow;

    fn from_raw(raw: Self::Raw) -> Result<Self, String> {
        Ok(Self {
            basin3d_id: required(raw.basin3d_id, "basin3d_id")?,
            datasource_name: required(raw.datasource_name, "datasource_name")?,
            full_name: raw.full_name.filter(|s| !s.is_empty()),
            description: required(raw.description, "description")?,
            sampling_medium: required(raw.sampling_medium, "sampling_medium")?,
            categories: split_categories(raw.categories.as_deref()),
        })
    }

    fn check_headers(headers: &StringRecord) -> Result<(), String> {
        if headers.iter().any(|h| h == "categories") {
            Ok(())
        } else {
            Err("missing required column categories".to_string())
        }
    }
}

/// Lazy pass over a plugin's mapping rows, see [`TableRows`].
pub type MappingRows = TableRows<MappingRow>;

/// Open a pass over the mapping table `source` belonging to `plugin`.
pub fn open(plugin: &str, source: &TableSource) -> Result<MappingRows> {
    table::open(plugin, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const ALPHA: &str = "\
basin3d_id,datasource_name,description,sampling_medium,categories
# comment lines are ignored
ACT,Acetate,Acetate (CH3COO),WATER,\"Biogeochemistry,Anions\"
Al,Aluminum,Aluminum (Al),WATER,\"Biogeochemistry, Trace elements\"
";

    #[test]
    fn rows_in_file_order() {
        let source = TableSource::inline("alpha", ALPHA);
        let rows: Vec<_> = open("Alpha", &source).unwrap().collect();
        assert_eq!(
            vec![
                MappingRow {
                    basin3d_id: "ACT".into(),
                    datasource_name: "Acetate".into(),
                    full_name: None,
                    description: "Acetate (CH3COO)".into(),
                    sampling_medium: "WATER".into(),
                    categories: vec!["Biogeochemistry".into(), "Anions".into()],
                },
                MappingRow {
                    basin3d_id: "Al".into(),
                    datasource_name: "Aluminum".into(),
                    full_name: None,
                    description: "Aluminum (Al)".into(),
                    sampling_medium: "WATER".into(),
                    categories: vec!["Biogeochemistry".into(), "Trace elements".into()],
                },
            ],
            rows
        );
    }

    #[test]
    fn aliases_and_extra_columns() {
        let source = TableSource::inline(
            "usgs",
            "broker_id,datasource_vocab,full_name,description,sampling_medium,categories,units\n\
             Hg,50287,Mercury,Mercury water filtered,water,Metals,ng/l\n",
        );
        let rows: Vec<_> = open("USGS", &source).unwrap().collect();
        assert_eq!(1, rows.len());
        assert_eq!("Hg", rows[0].basin3d_id);
        assert_eq!("50287", rows[0].datasource_name);
        assert_eq!(Some("Mercury".to_string()), rows[0].full_name);
    }

    #[test_log::test]
    fn malformed_rows_are_skipped_and_counted() {
        let source = TableSource::inline(
            "alpha",
            "basin3d_id,datasource_name,description,sampling_medium,categories\n\
             ACT,Acetate,Acetate,WATER,Anions\n\
             ,Missing,No canonical id,WATER,\n\
             Al,Aluminum,,WATER,\n\
             pH,pH,Hydrogen ion activity,WATER,\n",
        );
        let mut rows = open("Alpha", &source).unwrap();
        let ids: Vec<_> = rows.by_ref().map(|r| r.basin3d_id).collect();
        assert_eq!(vec!["ACT", "pH"], ids);
        assert_eq!(2, rows.report().valid);
        assert_eq!(2, rows.report().skipped);
    }

    #[test]
    fn empty_categories_are_allowed() {
        let source = TableSource::inline(
            "alpha",
            "basin3d_id,datasource_name,description,sampling_medium,categories\n\
             pH,pH,Hydrogen ion activity,WATER,\n",
        );
        let rows: Vec<_> = open("Alpha", &source).unwrap().collect();
        assert_eq!(1, rows.len());
        assert!(rows[0].categories.is_empty());
    }

    #[test]
    fn categories_column_is_required() {
        let source = TableSource::inline(
            "alpha",
            "basin3d_id,datasource_name,description,sampling_medium\n\
             pH,pH,Hydrogen ion activity,WATER\n",
        );
        let err = open("Alpha", &source).unwrap_err();
        assert!(matches!(
            err,
            Error::MappingFormatError { source_name, line: 1, reason }
                if source_name == "alpha" && reason.contains("categories")
        ));
    }

    #[test]
    fn each_open_restarts_from_the_first_row() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ALPHA.as_bytes()).unwrap();
        let source = TableSource::file(file.path());

        let first: Vec<_> = open("Alpha", &source).unwrap().take(1).collect();
        let second: Vec<_> = open("Alpha", &source).unwrap().collect();
        assert_eq!(1, first.len());
        assert_eq!(2, second.len());
        assert_eq!(first[0], second[0]);
    }

    #[test]
    fn missing_mapping_file() {
        let err = open("Alpha", &TableSource::file("/no/such/mapping.csv")).unwrap_err();
        assert!(matches!(err, Error::MappingNotFound { .. }));
    }
}
