use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::spec::{ConfigDocument, ConfigParseError};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config `{name}`: {source}")]
    Parse {
        name: String,
        #[source]
        source: ConfigParseError,
    },
}

/// Store of bundled layout files, addressed by file name.
pub trait ConfigSource: Send + Sync {
    fn load_config(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Layout files under a directory on disk.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ConfigSource for AssetDir {
    fn load_config(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(name))
    }
}

/// Layout files held in memory.
#[derive(Debug, Clone, Default)]
pub struct InlineAssets {
    files: HashMap<String, Vec<u8>>,
}

impl InlineAssets {
    pub fn with(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }
}

impl ConfigSource for InlineAssets {
    fn load_config(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no asset `{name}`")))
    }
}

/// Parses each layout once and hands out shared copies afterwards.
///
/// Failed loads are not cached, so a fixed file is picked up on the next call.
pub struct CachedConfigLoader {
    source: Box<dyn ConfigSource>,
    cache: Mutex<HashMap<String, Arc<ConfigDocument>>>,
}

impl CachedConfigLoader {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(&self, name: &str) -> Result<Arc<ConfigDocument>, ConfigLoadError> {
        if let Some(document) = self.lock().get(name) {
            return Ok(Arc::clone(document));
        }

        let raw = self
            .source
            .load_config(name)
            .map_err(|source| ConfigLoadError::Io {
                name: name.to_string(),
                source,
            })?;
        let document = Arc::new(ConfigDocument::parse(&raw).map_err(|source| {
            ConfigLoadError::Parse {
                name: name.to_string(),
                source,
            }
        })?);

        tracing::debug!(name, entries = document.entries.len(), "loaded layout config");
        self.lock()
            .insert(name.to_string(), Arc::clone(&document));
        Ok(document)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ConfigDocument>>> {
        // A poisoned cache only ever holds fully parsed documents.
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_from_directory_and_caches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("visit_row.yml");
        fs::write(&path, "group: visit_date\n").expect("write");

        let loader = CachedConfigLoader::new(AssetDir::new(dir.path()));
        let first = loader.load("visit_row.yml").expect("load");
        fs::remove_file(&path).expect("remove");
        let second = loader.load("visit_row.yml").expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_file_is_io_error() {
        let loader = CachedConfigLoader::new(InlineAssets::default());
        assert!(matches!(
            loader.load("absent.yml"),
            Err(ConfigLoadError::Io { .. })
        ));
    }

    #[test]
    fn parse_failure_is_not_cached() {
        let loader = CachedConfigLoader::new(InlineAssets::default().with("bad.yml", "42\n"));
        assert!(matches!(
            loader.load("bad.yml"),
            Err(ConfigLoadError::Parse { .. })
        ));
        assert!(loader.lock().is_empty());
    }
}
