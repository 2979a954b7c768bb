use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::EntityKind;
use crate::error::DirectoryError;

pub const CONFIG_FILE: &str = "kira-bd.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub catalog_dir: Option<String>,
    #[serde(default)]
    pub cache: Option<CacheEntry>,
    #[serde(default)]
    pub purge: Option<PurgeEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CacheEntry {
    Enabled(bool),
    Detailed(CacheEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CacheEntryObject {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// `"all"` or a list of entity kinds whose cached records are dropped.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PurgeEntry {
    Shorthand(String),
    Kinds(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub catalog_dir: Utf8PathBuf,
    pub use_cache: bool,
    pub cache_dir: Option<Utf8PathBuf>,
    pub purge: BTreeSet<EntityKind>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            catalog_dir: Utf8PathBuf::from("."),
            use_cache: true,
            cache_dir: None,
            purge: BTreeSet::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DirectoryError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(DirectoryError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DirectoryError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DirectoryError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DirectoryError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let catalog_dir = config
            .catalog_dir
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| Utf8PathBuf::from("."));

        let (use_cache, cache_dir) = match config.cache {
            None => (true, None),
            Some(CacheEntry::Enabled(enabled)) => (enabled, None),
            Some(CacheEntry::Detailed(obj)) => {
                (obj.enabled.unwrap_or(true), obj.dir.map(Utf8PathBuf::from))
            }
        };

        let purge = match config.purge {
            None => BTreeSet::new(),
            Some(PurgeEntry::Shorthand(value)) if value == "all" => {
                EntityKind::ALL.into_iter().collect()
            }
            Some(PurgeEntry::Shorthand(value)) => BTreeSet::from([value.parse()?]),
            Some(PurgeEntry::Kinds(values)) => values
                .iter()
                .map(|value| value.parse())
                .collect::<Result<BTreeSet<_>, DirectoryError>>()?,
        };

        Ok(ResolvedConfig {
            schema_version,
            catalog_dir,
            use_cache,
            cache_dir,
            purge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            schema_version: None,
            catalog_dir: Some("exports".to_string()),
            cache: Some(CacheEntry::Enabled(false)),
            purge: Some(PurgeEntry::Shorthand("all".to_string())),
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.catalog_dir, Utf8PathBuf::from("exports"));
        assert!(!resolved.use_cache);
        assert_eq!(resolved.purge.len(), EntityKind::ALL.len());
    }
}
