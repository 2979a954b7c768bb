use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::EntityKind;
use crate::error::DirectoryError;
use crate::records::{Biobank, Collection, Contact, Fact, Network};
use crate::store::SnapshotCache;

/// The five record lists one catalog snapshot consists of.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub biobanks: Vec<Biobank>,
    pub collections: Vec<Collection>,
    pub contacts: Vec<Contact>,
    pub networks: Vec<Network>,
    pub facts: Vec<Fact>,
}

impl Snapshot {
    /// Parses raw catalog records. `raw` yields the record list of each kind.
    pub fn from_raw<F>(mut raw: F) -> Result<Self, DirectoryError>
    where
        F: FnMut(EntityKind) -> Vec<Value>,
    {
        Ok(Self {
            biobanks: parse_records(EntityKind::Biobanks, raw(EntityKind::Biobanks))?,
            collections: parse_records(EntityKind::Collections, raw(EntityKind::Collections))?,
            contacts: parse_records(EntityKind::Contacts, raw(EntityKind::Contacts))?,
            networks: parse_records(EntityKind::Networks, raw(EntityKind::Networks))?,
            facts: parse_records(EntityKind::Facts, raw(EntityKind::Facts))?,
        })
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Biobanks => self.biobanks.len(),
            EntityKind::Collections => self.collections.len(),
            EntityKind::Contacts => self.contacts.len(),
            EntityKind::Networks => self.networks.len(),
            EntityKind::Facts => self.facts.len(),
        }
    }
}

pub fn parse_records<T: DeserializeOwned>(
    kind: EntityKind,
    items: Vec<Value>,
) -> Result<Vec<T>, DirectoryError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|err| DirectoryError::RecordParse {
                kind,
                message: err.to_string(),
            })
        })
        .collect()
}

/// Where raw record lists come from: a remote catalog, an export, a fixture.
pub trait CatalogSource {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>, DirectoryError>;
}

/// Catalog exports on disk, one `<kind>.json` file per entity kind holding
/// either a JSON array or an object with an `items` array.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: Utf8PathBuf,
}

impl FileCatalog {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn export_path(&self, kind: EntityKind) -> Utf8PathBuf {
        self.root.join(format!("{kind}.json"))
    }
}

impl CatalogSource for FileCatalog {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>, DirectoryError> {
        let path = self.export_path(kind);
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| DirectoryError::Catalog(format!("read {path}: {err}")))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|err| DirectoryError::Catalog(format!("parse {path}: {err}")))?;
        match value {
            Value::Array(items) => Ok(items),
            Value::Object(mut obj) => match obj.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(DirectoryError::Catalog(format!(
                    "{path}: expected an `items` array"
                ))),
            },
            _ => Err(DirectoryError::Catalog(format!(
                "{path}: expected a JSON array"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItem {
    pub kind: EntityKind,
    pub action: String,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    pub snapshot: Snapshot,
    pub items: Vec<FetchItem>,
}

/// Read-through fetcher: cached blobs are used unless purged, everything else
/// comes from the source and is written back to the cache.
pub struct SnapshotFetcher<S: CatalogSource> {
    source: S,
    cache: Option<SnapshotCache>,
}

impl<S: CatalogSource> SnapshotFetcher<S> {
    pub fn new(source: S, cache: Option<SnapshotCache>) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> Option<&SnapshotCache> {
        self.cache.as_ref()
    }

    pub fn fetch(&self, purge: &BTreeSet<EntityKind>) -> Result<FetchedSnapshot, DirectoryError> {
        if let Some(cache) = &self.cache {
            let removed = cache.purge(purge)?;
            if removed > 0 {
                info!(removed, "purged cached catalog records");
            }
        }

        let mut actions = Vec::with_capacity(EntityKind::ALL.len());
        let mut raw = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let (records, action) = self.fetch_kind(kind)?;
            actions.push((kind, action));
            raw.push((kind, records));
        }

        let snapshot = Snapshot::from_raw(|kind| {
            raw.iter_mut()
                .find(|(k, _)| *k == kind)
                .map(|(_, records)| std::mem::take(records))
                .unwrap_or_default()
        })?;
        let items = actions
            .into_iter()
            .map(|(kind, action)| FetchItem {
                kind,
                action: action.to_string(),
                records: snapshot.count(kind),
            })
            .collect();
        Ok(FetchedSnapshot { snapshot, items })
    }

    fn fetch_kind(&self, kind: EntityKind) -> Result<(Vec<Value>, &'static str), DirectoryError> {
        if let Some(cache) = &self.cache {
            if let Some(blob) = cache.load(kind)? {
                debug!(kind = %kind, fetched_at = %blob.fetched_at, "using cached records");
                return Ok((blob.items, "cache"));
            }
        }
        let records = self.source.fetch(kind)?;
        debug!(kind = %kind, records = records.len(), "fetched records from catalog");
        if let Some(cache) = &self.cache {
            cache.save(kind, &records)?;
        }
        Ok((records, "fetch"))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_failure_names_kind() {
        let err = parse_records::<Biobank>(EntityKind::Biobanks, vec![json!({"id": "b"})])
            .unwrap_err();
        assert_matches!(
            err,
            DirectoryError::RecordParse {
                kind: EntityKind::Biobanks,
                ..
            }
        );
    }

    #[test]
    fn file_catalog_reads_both_layouts() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(
            root.join("networks.json").as_std_path(),
            r#"[{"id": "n1"}]"#,
        )
        .unwrap();
        fs::write(
            root.join("contacts.json").as_std_path(),
            r#"{"items": [{"id": "p1"}, {"id": "p2"}]}"#,
        )
        .unwrap();

        let catalog = FileCatalog::new(root);
        assert_eq!(catalog.fetch(EntityKind::Networks).unwrap().len(), 1);
        assert_eq!(catalog.fetch(EntityKind::Contacts).unwrap().len(), 2);
        assert_matches!(
            catalog.fetch(EntityKind::Facts),
            Err(DirectoryError::Catalog(_))
        );
    }
}
