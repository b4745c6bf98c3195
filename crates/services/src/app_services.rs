use std::sync::Arc;

use storage::Storage;

use crate::Clock;
use crate::config::QuizConfig;
use crate::error::AppServicesError;
use crate::loader::{DataLoader, FileFetcher, HttpFetcher, PayloadFetcher};
use crate::progress::ProgressStore;

/// Assembles the loader and progress store every quiz widget shares.
#[derive(Clone)]
pub struct AppServices {
    loader: DataLoader,
    progress: ProgressStore,
    clock: Clock,
    auto_advance_ms: u64,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, fetching over HTTP or from
    /// disk depending on the configured data location.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &QuizConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        let fetcher: Arc<dyn PayloadFetcher> = if config.data_is_remote() {
            Arc::new(HttpFetcher::default())
        } else {
            Arc::new(FileFetcher)
        };
        Ok(Self::from_parts(&storage, fetcher, config, clock))
    }

    /// Build services from already constructed storage and fetcher.
    #[must_use]
    pub fn from_parts(
        storage: &Storage,
        fetcher: Arc<dyn PayloadFetcher>,
        config: &QuizConfig,
        clock: Clock,
    ) -> Self {
        let progress = ProgressStore::new(Arc::clone(&storage.kv)).with_clock(clock);
        let loader = DataLoader::new(fetcher, progress.clone(), config.data_base_url.clone());
        Self {
            loader,
            progress,
            clock,
            auto_advance_ms: config.auto_advance_ms,
        }
    }

    /// Replace the loader, e.g. with a seeded one.
    #[must_use]
    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn auto_advance_ms(&self) -> u64 {
        self.auto_advance_ms
    }
}
