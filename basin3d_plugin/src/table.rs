//! Streaming reader for the CSV tables plugins and the canonical vocabulary are declared in.
//!
//! Tables have a header row, may quote fields, and may contain `#` comment lines. Rows that
//! cannot be turned into a record are logged, counted, and skipped; they never end the pass.

use std::fmt::Display;
use std::io::{Cursor, Read};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use csv::{StringRecord, StringRecordsIntoIter, Trim};
use observability_deps::tracing::{debug, warn};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Where a table is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    File(PathBuf),
    /// Table contents compiled into the binary, e.g. with `include_str!`
    Inline { name: Arc<str>, contents: Arc<str> },
}

impl TableSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn inline(name: impl Into<Arc<str>>, contents: impl Into<Arc<str>>) -> Self {
        Self::Inline {
            name: name.into(),
            contents: contents.into(),
        }
    }

    fn open_reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            Self::File(path) => Ok(Box::new(std::fs::File::open(path)?)),
            Self::Inline { contents, .. } => {
                Ok(Box::new(Cursor::new(contents.as_bytes().to_vec())))
            }
        }
    }
}

impl Display for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline { name, .. } => write!(f, "{name}"),
        }
    }
}

/// Row counts from a pass over a table
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub valid: usize,
    pub skipped: usize,
}

/// A record type that can be built from one row of a table.
pub trait TableRecord: Sized {
    /// Loosely typed form of the row; every column is optional so missing fields can be
    /// reported individually.
    type Raw: DeserializeOwned;

    fn from_raw(raw: Self::Raw) -> Result<Self, String>;

    /// Reject a table whose header row lacks a column every row needs, even if the values
    /// themselves may be blank.
    fn check_headers(_headers: &StringRecord) -> Result<(), String> {
        Ok(())
    }
}

/// Lazy pass over the records of a table, in file order.
pub struct TableRows<T> {
    source_name: String,
    headers: StringRecord,
    records: StringRecordsIntoIter<Box<dyn Read + Send>>,
    report: LoadReport,
    _record: PhantomData<T>,
}

impl<T> std::fmt::Debug for TableRows<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRows")
            .field("source_name", &self.source_name)
            .field("headers", &self.headers)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl<T> TableRows<T> {
    /// Counts of rows produced and skipped so far.
    pub fn report(&self) -> LoadReport {
        self.report
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

/// Open `source` and read its header row. A missing file is reported as
/// [`Error::MappingNotFound`] against `owner`.
pub(crate) fn open<T: TableRecord>(owner: &str, source: &TableSource) -> Result<TableRows<T>> {
    let reader = source.open_reader().map_err(|e| Error::MappingNotFound {
        plugin: owner.to_string(),
        reason: format!("cannot open {source}: {e}"),
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|source_err| Error::TableRead {
            source_name: source.to_string(),
            source: source_err,
        })?
        .clone();
    T::check_headers(&headers).map_err(|reason| Error::MappingFormatError {
        source_name: source.to_string(),
        line: 1,
        reason,
    })?;
    debug!(source = %source, ?headers, "opened table");

    Ok(TableRows {
        source_name: source.to_string(),
        headers,
        records: reader.into_records(),
        report: LoadReport::default(),
        _record: PhantomData,
    })
}

impl<T: TableRecord> Iterator for TableRows<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            let parsed = record
                .map_err(|e| (line_of_error(&e), e.to_string()))
                .and_then(|record| {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    record
                        .deserialize::<T::Raw>(Some(&self.headers))
                        .map_err(|e| e.to_string())
                        .and_then(T::from_raw)
                        .map_err(|reason| (line, reason))
                });

            match parsed {
                Ok(row) => {
                    self.report.valid += 1;
                    return Some(row);
                }
                Err((line, reason)) => {
                    self.report.skipped += 1;
                    let error = Error::MappingFormatError {
                        source_name: self.source_name.clone(),
                        line,
                        reason,
                    };
                    warn!(%error, "skipping malformed table row");
                }
            }
        }
    }
}

fn line_of_error(error: &csv::Error) -> u64 {
    error.position().map(|p| p.line()).unwrap_or_default()
}

/// Split a comma delimited list, preserving order and dropping empty entries.
pub fn split_categories(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Treat a missing or blank value as absent.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("missing required field {field}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn categories_keep_order_and_drop_blanks() {
        assert_eq!(
            vec!["Biogeochemistry", "Anions"],
            split_categories(Some("Biogeochemistry, Anions,, "))
        );
        assert!(split_categories(None).is_empty());
        assert!(split_categories(Some("")).is_empty());
    }

    #[test]
    fn missing_file_is_mapping_not_found() {
        let source = TableSource::file("/definitely/not/here.csv");
        let err = open::<crate::MappingRow>("Alpha", &source).unwrap_err();
        assert!(matches!(err, Error::MappingNotFound { plugin, .. } if plugin == "Alpha"));
    }

    #[test]
    fn source_display() {
        assert_eq!(
            "alpha_mapping",
            TableSource::inline("alpha_mapping", "a,b\n").to_string()
        );
        assert_eq!("/tmp/x.csv", TableSource::file("/tmp/x.csv").to_string());
    }
}
