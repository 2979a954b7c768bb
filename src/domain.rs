use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

catalog_id!(BiobankId);
catalog_id!(CollectionId);
catalog_id!(ContactId);
catalog_id!(NetworkId);
catalog_id!(
    /// Country code or other national-node scope such as `EU`.
    CountryCode
);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Biobanks,
    Collections,
    Contacts,
    Networks,
    Facts,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Biobanks,
        EntityKind::Collections,
        EntityKind::Contacts,
        EntityKind::Networks,
        EntityKind::Facts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Biobanks => "biobanks",
            EntityKind::Collections => "collections",
            EntityKind::Contacts => "contacts",
            EntityKind::Networks => "networks",
            EntityKind::Facts => "facts",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DirectoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim().to_lowercase())
            .ok_or_else(|| DirectoryError::InvalidEntityKind(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Entity,
    Hierarchy,
    Contact,
    Network,
}

impl GraphKind {
    pub const ALL: [GraphKind; 4] = [
        GraphKind::Entity,
        GraphKind::Hierarchy,
        GraphKind::Contact,
        GraphKind::Network,
    ];

    /// Graphs whose edges must exist in both directions.
    pub fn is_bidirectional(&self) -> bool {
        !matches!(self, GraphKind::Hierarchy)
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphKind::Entity => write!(f, "entity"),
            GraphKind::Hierarchy => write!(f, "hierarchy"),
            GraphKind::Contact => write!(f, "contact"),
            GraphKind::Network => write!(f, "network"),
        }
    }
}

/// Exact counts that must not be summed twice across the collection hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Size,
    NumberOfDonors,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Size => write!(f, "size"),
            Metric::NumberOfDonors => write!(f, "number_of_donors"),
        }
    }
}

impl FromStr for Metric {
    type Err = DirectoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "size" => Ok(Metric::Size),
            "number_of_donors" => Ok(Metric::NumberOfDonors),
            _ => Err(DirectoryError::UnsupportedMetric(value.to_string())),
        }
    }
}

/// Policy for by-id lookups that miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    /// Log a warning and return `None`.
    #[default]
    Lenient,
    /// Fail with [`DirectoryError::NotFound`].
    Strict,
}

pub const EU_NATIONAL_NODE: &str = "EU";

static STAGING_AREA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:]+:[A-Za-z]*ID:([A-Z]{2}|EXT|EU)_").unwrap());

/// Extracts the staging area embedded in a catalog id.
///
/// `bbmri-eric:ID:CZ_MMCI:collection:LTS` belongs to `CZ`,
/// `bbmri-eric:contactID:EXT_123` to `EXT`.
pub fn staging_area(id: &str) -> Option<CountryCode> {
    STAGING_AREA
        .captures(id)
        .and_then(|caps| caps.get(1))
        .map(|area| CountryCode::new(area.as_str()))
}
