// Dataset Cache
// Holds the service dataset in memory after the first successful load

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::dataset_source::{DatasetLoader, LoadedDataset, SourceError};

pub struct DatasetCache {
    loader: DatasetLoader,
    cell: OnceCell<Arc<LoadedDataset>>,
}

impl DatasetCache {
    pub fn new(loader: DatasetLoader) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    /// Loaded dataset, loading it on first use. Concurrent callers share one
    /// load; a failed load is not cached and the next call tries again.
    pub async fn get(&self) -> Result<Arc<LoadedDataset>, SourceError> {
        let dataset = self
            .cell
            .get_or_try_init(|| async {
                let dataset = self.loader.load().await?;
                Ok::<_, SourceError>(Arc::new(dataset))
            })
            .await?;
        Ok(dataset.clone())
    }

    /// Load at startup. Failures are logged; requests retry later.
    pub async fn preload(&self) {
        match self.get().await {
            Ok(dataset) => log::info!("Dataset preloaded ({} rows)", dataset.records.len()),
            Err(e) => log::warn!("Dataset preload failed, will retry on request: {e}"),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatasetSourceConfig;
    use std::time::Duration;

    fn file_cache(path: std::path::PathBuf) -> DatasetCache {
        DatasetCache::new(DatasetLoader::new(
            DatasetSourceConfig::File { path },
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("grammy.csv");
        let cache = file_cache(path.clone());

        assert!(matches!(cache.get().await, Err(SourceError::Io(_))));
        assert!(!cache.is_loaded());

        std::fs::write(&path, "year,category,winner\n2001,Best Rap Album,true\n").unwrap();
        let dataset = cache.get().await.unwrap();
        assert_eq!(dataset.records.len(), 1);
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_successful_load_is_kept_in_memory() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("grammy.csv");
        std::fs::write(&path, "year,category,winner\n2001,Best Rap Album,true\n").unwrap();
        let cache = file_cache(path.clone());

        cache.preload().await;
        std::fs::remove_file(&path).unwrap();

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_preload_failure_is_swallowed() {
        let cache = DatasetCache::new(DatasetLoader::new(
            DatasetSourceConfig::Unconfigured,
            Duration::from_secs(1),
        ));
        cache.preload().await;
        assert!(!cache.is_loaded());
    }
}
