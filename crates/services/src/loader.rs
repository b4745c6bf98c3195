//! Fetches question payloads, validates them and selects a stage's questions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use quiz_core::model::{Question, QuestionSet, QuizKind};
use quiz_core::selection::select_questions;

use crate::error::LoadError;
use crate::progress::ProgressStore;

//
// ─── FETCHERS ──────────────────────────────────────────────────────────────────
//

/// Source of raw question payloads.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    /// Return the payload text stored at `location`.
    async fn fetch(&self, location: &str) -> Result<String, LoadError>;
}

/// Fetches payloads over HTTP; any non-success status is an error.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PayloadFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<String, LoadError> {
        let response = self.client.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::HttpStatus(status));
        }
        Ok(response.text().await?)
    }
}

/// Reads payloads from the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher;

#[async_trait]
impl PayloadFetcher for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<String, LoadError> {
        let path = PathBuf::from(location);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LoadError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Clone, Debug)]
enum StaticResponse {
    Body(String),
    Status(StatusCode),
}

/// In-memory payloads keyed by location. Unknown locations answer 404.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    responses: Arc<Mutex<HashMap<String, StaticResponse>>>,
    fetches: Arc<AtomicUsize>,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `location`, replacing any earlier response.
    pub fn respond(&self, location: impl Into<String>, body: impl Into<String>) {
        self.insert(location.into(), StaticResponse::Body(body.into()));
    }

    /// Answer `location` with an error status.
    pub fn fail(&self, location: impl Into<String>, status: StatusCode) {
        self.insert(location.into(), StaticResponse::Status(status));
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn insert(&self, location: String, response: StaticResponse) {
        match self.responses.lock() {
            Ok(mut guard) => {
                guard.insert(location, response);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(location, response);
            }
        }
    }
}

#[async_trait]
impl PayloadFetcher for StaticFetcher {
    async fn fetch(&self, location: &str) -> Result<String, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let response = match self.responses.lock() {
            Ok(guard) => guard.get(location).cloned(),
            Err(poisoned) => poisoned.into_inner().get(location).cloned(),
        };
        match response {
            Some(StaticResponse::Body(body)) => Ok(body),
            Some(StaticResponse::Status(status)) => Err(LoadError::HttpStatus(status)),
            None => Err(LoadError::HttpStatus(StatusCode::NOT_FOUND)),
        }
    }
}

//
// ─── LOADER ────────────────────────────────────────────────────────────────────
//

/// A validated set together with the questions picked for one stage.
#[derive(Debug, Clone)]
pub struct LoadedStage {
    pub set: QuestionSet,
    pub questions: Vec<Question>,
}

/// Loads question sets and picks stage questions, tracking what was served.
#[derive(Clone)]
pub struct DataLoader {
    fetcher: Arc<dyn PayloadFetcher>,
    progress: ProgressStore,
    base: String,
    rng: Arc<Mutex<StdRng>>,
}

impl DataLoader {
    /// `base` is joined with `<slug>.json` to locate each kind's payload.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PayloadFetcher>, progress: ProgressStore, base: impl Into<String>) -> Self {
        Self {
            fetcher,
            progress,
            base: base.into(),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Make shuffling deterministic.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Payload location for `kind`.
    #[must_use]
    pub fn url_for(&self, kind: QuizKind) -> String {
        format!("{}/{}.json", self.base.trim_end_matches('/'), kind.slug())
    }

    /// Fetch and validate the question set at `location`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` when the fetch fails or the payload is missing,
    /// empty or malformed.
    pub async fn load(&self, location: &str, kind: QuizKind) -> Result<QuestionSet, LoadError> {
        debug!(location, kind = %kind, "fetching question data");
        let payload = self.fetcher.fetch(location).await.map_err(|err| {
            warn!(location, error = %err, "question data fetch failed");
            err
        })?;
        let set = QuestionSet::from_json(kind.profile().shape, &payload).map_err(|err| {
            warn!(location, error = %err, "question data rejected");
            err
        })?;
        info!(kind = %kind, questions = set.len(), "question set loaded");
        Ok(set)
    }

    /// Load the set for `kind` and select its first stage.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` on fetch, validation or selection failure.
    pub async fn load_stage(&self, kind: QuizKind) -> Result<LoadedStage, LoadError> {
        let set = self.load(&self.url_for(kind), kind).await?;
        let questions = self.reselect(kind, &set).await?;
        Ok(LoadedStage { set, questions })
    }

    /// Pick a fresh stage from an already loaded set, preferring questions not
    /// served before. The updated pool is persisted; a failed save is logged.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Selection` if the set has nothing to select.
    pub async fn reselect(&self, kind: QuizKind, set: &QuestionSet) -> Result<Vec<Question>, LoadError> {
        let pool = self.progress.used_pool(kind).await;
        let count = kind.profile().questions_per_stage;
        let selection = {
            let mut rng = self.lock_rng();
            let mut selection = select_questions(set.questions(), &pool, count, &mut *rng)?;
            if set.config().shuffle_questions {
                selection.questions.shuffle(&mut *rng);
            }
            selection
        };
        if selection.pool_reset {
            info!(kind = %kind, "every question served; used pool reset");
        }
        if let Err(err) = self.progress.save_used_pool(kind, &selection.pool).await {
            warn!(kind = %kind, error = %err, "failed to persist used question pool");
        }
        Ok(selection.questions)
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
