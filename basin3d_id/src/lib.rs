//! Identifiers shared across the BASIN-3D catalog.
//!
//! Every entity id a datasource hands to the broker is made globally unique by prepending the
//! datasource's short prefix, e.g. a monitoring feature `"R-12"` or a variable `"A-ACT"`. This
//! crate owns that encoding along with the surrogate keys the catalog store assigns to its
//! records.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

mod key;
pub use key::{DataSourceKey, ObservedPropertyKey, SamplingMediumKey, VariableKey};

/// Separates the datasource prefix from the local part of an identifier.
pub const PREFIX_SEPARATOR: char = '-';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed identifier {id:?}: {reason}")]
    MalformedIdentifier { id: String, reason: &'static str },

    #[error("invalid id prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Prepend `prefix` to `local_id`, producing `"{prefix}-{local_id}"`.
///
/// The prefix must be non-empty and must not itself contain the separator, otherwise the
/// result could not be split back apart unambiguously.
pub fn apply_prefix(prefix: &str, local_id: &str) -> Result<String> {
    validate_prefix(prefix)?;
    Ok(format!("{prefix}{PREFIX_SEPARATOR}{local_id}"))
}

/// Split an identifier on its first separator into `(prefix, local_id)`.
///
/// Only the first separator is significant, so local ids are free to contain dashes of their
/// own: `"USGS-0910-01"` yields `("USGS", "0910-01")`.
pub fn strip_prefix(id: &str) -> Result<(&str, &str)> {
    let (prefix, local_id) = id
        .split_once(PREFIX_SEPARATOR)
        .ok_or_else(|| Error::MalformedIdentifier {
            id: id.to_string(),
            reason: "missing datasource prefix separator",
        })?;
    if prefix.is_empty() {
        return Err(Error::MalformedIdentifier {
            id: id.to_string(),
            reason: "empty datasource prefix",
        });
    }
    Ok((prefix, local_id))
}

/// Return the local part of `id` if it carries exactly `prefix`, or `id` unchanged if it does
/// not. Lookups use this so callers may pass ids with or without the datasource prefix.
pub fn strip_expected_prefix<'a>(id: &'a str, prefix: &str) -> &'a str {
    match strip_prefix(id) {
        Ok((found, local_id)) if found == prefix => local_id,
        _ => id,
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: "prefix is empty",
        });
    }
    if prefix.contains(PREFIX_SEPARATOR) {
        return Err(Error::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: "prefix contains the separator",
        });
    }
    Ok(())
}

/// A validated datasource id prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdPrefix(Arc<str>);

impl IdPrefix {
    pub fn new(prefix: impl Into<Arc<str>>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix a local id. Infallible since the prefix was validated on construction.
    pub fn apply(&self, local_id: &str) -> String {
        format!("{}{PREFIX_SEPARATOR}{local_id}", self.0)
    }

    /// Strip this prefix from `id` when present, see [`strip_expected_prefix`].
    pub fn strip<'a>(&self, id: &'a str) -> &'a str {
        strip_expected_prefix(id, &self.0)
    }
}

impl FromStr for IdPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IdPrefix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<IdPrefix> for String {
    fn from(value: IdPrefix) -> Self {
        value.0.to_string()
    }
}

impl Display for IdPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An owned identifier split into its datasource prefix and local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixedId {
    pub prefix: IdPrefix,
    pub local_id: String,
}

impl PrefixedId {
    pub fn new(prefix: IdPrefix, local_id: impl Into<String>) -> Self {
        Self {
            prefix,
            local_id: local_id.into(),
        }
    }
}

impl FromStr for PrefixedId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, local_id) = strip_prefix(s)?;
        Ok(Self {
            prefix: IdPrefix::new(prefix)?,
            local_id: local_id.to_string(),
        })
    }
}

impl Display for PrefixedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{PREFIX_SEPARATOR}{}", self.prefix, self.local_id)
    }
}
