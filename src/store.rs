use std::collections::BTreeSet;
use std::fs;
use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::Builder;
use tracing::debug;

use crate::domain::EntityKind;
use crate::error::DirectoryError;

/// On-disk blob cache of raw catalog record lists, one blob per entity kind.
///
/// The cache is an explicit service: it is opened on a root directory, can be
/// purged per kind, and refuses all access once closed.
#[derive(Debug)]
pub struct SnapshotCache {
    root: Utf8PathBuf,
    open: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheBlob {
    pub kind: EntityKind,
    pub fetched_at: String,
    pub tool: String,
    pub items: Vec<Value>,
}

#[derive(Serialize)]
struct CacheBlobRef<'a> {
    kind: EntityKind,
    fetched_at: String,
    tool: String,
    items: &'a [Value],
}

impl SnapshotCache {
    pub fn open(root: Utf8PathBuf) -> Result<Self, DirectoryError> {
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
        debug!(root = %root, "snapshot cache opened");
        Ok(Self { root, open: true })
    }

    pub fn open_default() -> Result<Self, DirectoryError> {
        Self::open(default_cache_root()?)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn blob_path(&self, kind: EntityKind) -> Utf8PathBuf {
        self.root.join(format!("{kind}.json.gz"))
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.open && self.blob_path(kind).as_std_path().exists()
    }

    pub fn load(&self, kind: EntityKind) -> Result<Option<CacheBlob>, DirectoryError> {
        self.ensure_open()?;
        let path = self.blob_path(kind);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| DirectoryError::Filesystem(format!("open {path}: {err}")))?;
        let blob: CacheBlob = serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
            .map_err(|err| DirectoryError::Filesystem(format!("decode {path}: {err}")))?;
        if blob.kind != kind {
            return Err(DirectoryError::Filesystem(format!(
                "cache blob {path} holds {} records",
                blob.kind
            )));
        }
        Ok(Some(blob))
    }

    pub fn save(&self, kind: EntityKind, items: &[Value]) -> Result<(), DirectoryError> {
        self.ensure_open()?;
        let blob = CacheBlobRef {
            kind,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("kira-bd/{}", env!("CARGO_PKG_VERSION")),
            items,
        };
        let mut temp = Builder::new()
            .prefix("kira-bd-cache")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
        let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
        serde_json::to_writer(&mut encoder, &blob)
            .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
        encoder
            .finish()
            .and_then(|file| file.flush())
            .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
        let path = self.blob_path(kind);
        temp.persist(path.as_std_path())
            .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
        debug!(kind = %kind, records = items.len(), "cached catalog records");
        Ok(())
    }

    /// Drops the blobs of the given kinds. Returns how many blobs existed.
    pub fn purge(&self, kinds: &BTreeSet<EntityKind>) -> Result<usize, DirectoryError> {
        self.ensure_open()?;
        let mut removed = 0;
        for kind in kinds {
            let path = self.blob_path(*kind);
            if path.as_std_path().exists() {
                fs::remove_file(path.as_std_path())
                    .map_err(|err| DirectoryError::Filesystem(err.to_string()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn purge_all(&self) -> Result<usize, DirectoryError> {
        self.purge(&EntityKind::ALL.into_iter().collect())
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    fn ensure_open(&self) -> Result<(), DirectoryError> {
        if !self.open {
            return Err(DirectoryError::Filesystem(format!(
                "snapshot cache at {} is closed",
                self.root
            )));
        }
        Ok(())
    }
}

pub fn default_cache_root() -> Result<Utf8PathBuf, DirectoryError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-biobank-directory"))
                .ok()
        })
        .ok_or_else(|| DirectoryError::Filesystem("unable to resolve cache directory".to_string()))
}
