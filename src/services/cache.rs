use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::LoadError;
use crate::models::{DataFormat, Dataset};
use crate::services::loader::{detect_format, DatasetLoader};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    format: DataFormat,
    delimiter: Option<char>,
}

/// Session-scoped dataset cache. Concurrent requests for the same key share
/// a single load; failed loads are not cached.
pub struct DatasetCache {
    loader: DatasetLoader,
    datasets: Option<Cache<CacheKey, Arc<Dataset>>>,
}

impl DatasetCache {
    pub fn new(config: AnalysisConfig) -> Self {
        let datasets = (config.cache_capacity > 0).then(|| Cache::new(config.cache_capacity));
        Self {
            loader: DatasetLoader::new(config),
            datasets,
        }
    }

    pub fn get_or_load(
        &self,
        path: &Path,
        delimiter: Option<char>,
    ) -> Result<Arc<Dataset>, LoadError> {
        let datasets = match &self.datasets {
            Some(datasets) => datasets,
            None => return self.loader.load(path, delimiter).map(Arc::new),
        };

        let key = CacheKey {
            path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
            format: detect_format(path).unwrap_or(DataFormat::Csv),
            delimiter,
        };

        if let Some(dataset) = datasets.get(&key) {
            debug!("Dataset cache hit for {}", path.display());
            return Ok(dataset);
        }

        datasets
            .try_get_with(key, || {
                info!("Dataset cache miss for {}", path.display());
                self.loader.load(path, delimiter).map(Arc::new)
            })
            .map_err(|e| {
                warn!("Dataset load failed for {}: {}", e.path().display(), e);
                e.as_ref().clone()
            })
    }

    pub fn clear(&self) {
        if let Some(datasets) = &self.datasets {
            datasets.invalidate_all();
        }
    }

    pub fn len(&self) -> u64 {
        match &self.datasets {
            Some(datasets) => {
                datasets.run_pending_tasks();
                datasets.entry_count()
            }
            None => 0,
        }
    }
}
