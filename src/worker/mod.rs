//! # Offline Cache Worker
//!
//! Precaches the assets the page needs and serves them cache-first.
//!
//! ## Lifecycle
//!
//! ```text
//! Parsed ──install──▶ Installing ──▶ Installed ──activate──▶ Activated
//!                          └──(any asset fails)──▶ Redundant
//! ```
//!
//! Install fetches every manifest entry concurrently and commits them to the
//! version-tagged cache in one batch: a single failed or non-2xx entry leaves
//! the cache untouched and the worker redundant. Activation deletes every
//! other cache. Once activated, [`OfflineCacheWorker::handle_fetch`] answers
//! from the cache on an exact hit and otherwise performs exactly one network
//! fetch, storing nothing.

pub mod fetch;
pub mod manifest;
pub mod storage;

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::{ClientError, ClientResult};

pub use fetch::{AssetRequest, CachedResponse, Fetcher, ReqwestFetcher};
pub use manifest::{CacheManifest, CacheName, DEFAULT_ASSETS};
pub use storage::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Cache(CachedResponse),
    Network(CachedResponse),
}

impl FetchOutcome {
    pub fn from_cache(&self) -> bool {
        matches!(self, FetchOutcome::Cache(_))
    }

    pub fn response(&self) -> &CachedResponse {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) => r,
        }
    }

    pub fn into_response(self) -> CachedResponse {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) => r,
        }
    }
}

pub struct OfflineCacheWorker {
    name: CacheName,
    manifest: CacheManifest,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
}

impl OfflineCacheWorker {
    pub fn new(
        config: &WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let manifest = CacheManifest::resolve(&config.origin, &config.manifest)?;
        Ok(Self {
            name: CacheName::new(&config.cache_prefix, &config.cache_version),
            manifest,
            storage,
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
        })
    }

    pub fn cache_name(&self) -> &CacheName {
        &self.name
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    fn expect_state(&self, expected: WorkerState, operation: &str) -> ClientResult<()> {
        let state = *self.state.lock();
        if state != expected {
            return Err(ClientError::state(
                state.to_string(),
                operation,
                format!("worker must be {}", expected),
            ));
        }
        Ok(())
    }

    fn transition(
        &self,
        expected: WorkerState,
        next: WorkerState,
        operation: &str,
    ) -> ClientResult<()> {
        let mut state = self.state.lock();
        if *state != expected {
            return Err(ClientError::state(
                state.to_string(),
                operation,
                format!("worker must be {}", expected),
            ));
        }
        let from = *state;
        debug!(%from, to = %next, "worker state change");
        *state = next;
        Ok(())
    }

    /// Fetch every manifest entry and commit them together. Returns the
    /// number of cached entries.
    pub async fn install(&self) -> ClientResult<usize> {
        self.transition(WorkerState::Parsed, WorkerState::Installing, "install")?;
        let cache = self.name.to_string();
        info!(cache = %cache, assets = self.manifest.len(), "installing");

        match self.populate(&cache).await {
            Ok(count) => {
                *self.state.lock() = WorkerState::Installed;
                info!(cache = %cache, count, "install complete");
                Ok(count)
            }
            Err(err) => {
                *self.state.lock() = WorkerState::Redundant;
                warn!(cache = %cache, error = %err, "install failed, worker redundant");
                Err(err.with_operation("install"))
            }
        }
    }

    async fn populate(&self, cache: &str) -> ClientResult<usize> {
        let requests: Vec<AssetRequest> = self
            .manifest
            .urls()
            .iter()
            .map(|url| AssetRequest::get(url.as_str()))
            .collect();

        let responses = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, response) in requests.into_iter().zip(responses) {
            let response = response.map_err(|e| {
                ClientError::cache_install(cache, &request.url, e.to_string())
            })?;
            if !response.is_success() {
                return Err(ClientError::cache_install(
                    cache,
                    &request.url,
                    format!("HTTP {}", response.status),
                ));
            }
            entries.push((request, response));
        }

        let count = entries.len();
        self.storage
            .put_all(cache, entries)
            .await
            .map_err(|e| ClientError::cache_install(cache, "", e.to_string()))?;
        Ok(count)
    }

    /// Take control and delete every cache other than the current one.
    /// Returns the deleted names.
    ///
    /// A cache that cannot be deleted is logged and left in place; the
    /// worker still activates.
    pub async fn activate(&self) -> ClientResult<Vec<String>> {
        self.expect_state(WorkerState::Installed, "activate")?;
        let current = self.name.to_string();
        let mut deleted = Vec::new();
        match self.storage.cache_names().await {
            Ok(names) => {
                for name in names.into_iter().filter(|name| *name != current) {
                    match self.storage.delete(&name).await {
                        Ok(true) => {
                            info!(cache = %name, "obsolete cache deleted");
                            deleted.push(name);
                        }
                        Ok(false) => {}
                        Err(e) => warn!(cache = %name, error = %e, "obsolete cache left behind"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "cache listing failed, obsolete caches kept"),
        }
        self.transition(WorkerState::Installed, WorkerState::Activated, "activate")?;
        info!(cache = %current, "worker activated");
        Ok(deleted)
    }

    /// Pick up a cache installed by an earlier run: if the current cache
    /// exists, go straight to `Activated`. Returns whether it did.
    pub async fn resume(&self) -> ClientResult<bool> {
        if self.state() != WorkerState::Parsed {
            return Ok(self.state() == WorkerState::Activated);
        }
        if self.storage.has_cache(&self.name.to_string()).await? {
            *self.state.lock() = WorkerState::Activated;
            info!(cache = %self.name, "resumed existing cache");
            return Ok(true);
        }
        Ok(false)
    }

    /// Cache-first interception.
    pub async fn handle_fetch(&self, request: &AssetRequest) -> ClientResult<FetchOutcome> {
        let state = self.state();
        if state != WorkerState::Activated {
            return Err(ClientError::state(
                state.to_string(),
                "handle_fetch",
                "worker is not active",
            ));
        }

        let cache = self.name.to_string();
        if let Some(hit) = self.storage.lookup(&cache, request).await? {
            debug!(method = %request.method, url = %request.url, "cache hit");
            return Ok(FetchOutcome::Cache(hit));
        }

        debug!(method = %request.method, url = %request.url, "cache miss, going to network");
        let response = self.fetcher.fetch(request).await?;
        Ok(FetchOutcome::Network(response))
    }
}
