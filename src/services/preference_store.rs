// Preference Storage
// Durable client-local key/value storage for the single theme preference

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

const PREFERENCES_FILE: &str = "preferences.json";
const APP_DIR_NAME: &str = "datalab";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preferences file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Key/value storage surviving process restarts, the local-storage analog.
pub trait PreferenceStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Preferences kept in a flat JSON object on disk
pub struct FilePreferenceStorage {
    path: PathBuf,
    cache: RwLock<Option<BTreeMap<String, String>>>,
}

impl FilePreferenceStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(PREFERENCES_FILE),
            cache: RwLock::new(None),
        }
    }

    /// Storage under the platform config directory, if one exists
    pub fn in_config_dir() -> Option<Self> {
        dirs_next::config_dir().map(|dir| Self::new(dir.join(APP_DIR_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(ref values) = *cache {
                return Ok(values.clone());
            }
        }

        let values = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };

        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(values.clone());
        }
        Ok(values)
    }
}

impl PreferenceStorage for FilePreferenceStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // A corrupt file is replaced rather than blocking every later write
        let mut values = match self.load() {
            Ok(values) => values,
            Err(StorageError::Parse(e)) => {
                log::warn!("Discarding unreadable preferences {:?}: {e}", self.path);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&values)?;
        std::fs::write(&self.path, content)?;

        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(values);
        }
        Ok(())
    }
}

/// Storage that lives only as long as the process
#[derive(Default)]
pub struct MemoryPreferenceStorage {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryPreferenceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStorage for MemoryPreferenceStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.values
            .read()
            .map(|values| values.get(key).cloned())
            .map_err(|_| StorageError::Unavailable("preference lock poisoned".to_string()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .map(|mut values| {
                values.insert(key.to_string(), value.to_string());
            })
            .map_err(|_| StorageError::Unavailable("preference lock poisoned".to_string()))
    }
}
