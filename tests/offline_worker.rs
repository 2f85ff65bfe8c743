//! Offline cache worker: precache install, activation, cache-first fetch.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::AssetOrigin;
use plantia_client::config::WorkerConfig;
use plantia_client::error::{ClientError, ClientResult};
use plantia_client::worker::{
    AssetRequest, CacheStorage, CachedResponse, DiskCacheStorage, Fetcher, MemoryCacheStorage,
    OfflineCacheWorker, ReqwestFetcher, WorkerState,
};

const STYLE: &[u8] = b"body { font-family: Outfit; }";
const SCRIPT: &[u8] = b"console.log('plantia');";
const INDEX: &[u8] = b"<!doctype html><title>Plantia</title>";

fn site() -> AssetOrigin {
    AssetOrigin::new(&[
        ("/", "text/html", INDEX),
        ("/static/css/style.css", "text/css", STYLE),
        ("/static/js/script.js", "application/javascript", SCRIPT),
    ])
}

fn worker_config(origin: &str, version: &str, manifest: &[&str]) -> WorkerConfig {
    WorkerConfig {
        origin: origin.to_string(),
        cache_version: version.to_string(),
        manifest: manifest.iter().map(|m| m.to_string()).collect(),
        ..WorkerConfig::default()
    }
}

fn fetcher() -> Arc<ReqwestFetcher> {
    Arc::new(ReqwestFetcher::new(Duration::from_secs(5)).unwrap())
}

/// A network that is down; counts attempts.
#[derive(Default)]
struct OfflineNetwork {
    attempts: AtomicUsize,
}

#[async_trait]
impl Fetcher for OfflineNetwork {
    async fn fetch(&self, request: &AssetRequest) -> ClientResult<CachedResponse> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::transport("fetch_asset", format!("offline: {}", request.url)))
    }
}

/// Memory storage whose deletes always fail.
#[derive(Default)]
struct StuckStorage {
    inner: MemoryCacheStorage,
}

#[async_trait]
impl CacheStorage for StuckStorage {
    async fn cache_names(&self) -> ClientResult<Vec<String>> {
        self.inner.cache_names().await
    }

    async fn put_all(
        &self,
        cache: &str,
        entries: Vec<(AssetRequest, CachedResponse)>,
    ) -> ClientResult<()> {
        self.inner.put_all(cache, entries).await
    }

    async fn lookup(
        &self,
        cache: &str,
        request: &AssetRequest,
    ) -> ClientResult<Option<CachedResponse>> {
        self.inner.lookup(cache, request).await
    }

    async fn keys(&self, cache: &str) -> ClientResult<Vec<AssetRequest>> {
        self.inner.keys(cache).await
    }

    async fn delete(&self, cache: &str) -> ClientResult<bool> {
        Err(ClientError::io(
            "delete_cache",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, cache.to_string()),
        ))
    }
}

const PAGE: [&str; 3] = ["/", "/static/css/style.css", "/static/js/script.js"];

#[tokio::test]
async fn install_then_serve_cache_first() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let storage = Arc::new(MemoryCacheStorage::new());
    let worker = OfflineCacheWorker::new(
        &worker_config(&origin, "v1", &PAGE),
        storage.clone(),
        fetcher(),
    )
    .unwrap();

    assert_eq!(worker.install().await.unwrap(), 3);
    assert_eq!(worker.state(), WorkerState::Installed);
    worker.activate().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Activated);
    assert_eq!(storage.keys("plantia-v1").await.unwrap().len(), 3);

    let hit = worker
        .handle_fetch(&AssetRequest::get(format!("{}/static/js/script.js", origin)))
        .await
        .unwrap();
    assert!(hit.from_cache());
    assert_eq!(hit.response().body.as_ref(), SCRIPT);
    assert_eq!(
        hit.response().content_type.as_deref(),
        Some("application/javascript")
    );
    assert_eq!(site.hits("/static/js/script.js"), 1);

    let total = site.total_hits();
    let miss_url = format!("{}/predict-history", origin);
    for round in 1..=2 {
        let miss = worker.handle_fetch(&AssetRequest::get(&miss_url)).await.unwrap();
        assert!(!miss.from_cache());
        assert_eq!(miss.response().status, 404);
        assert_eq!(site.hits("/predict-history"), round);
    }
    assert_eq!(site.total_hits(), total + 2);
    assert_eq!(storage.keys("plantia-v1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn one_missing_asset_fails_the_whole_install() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let storage = Arc::new(MemoryCacheStorage::new());
    let worker = OfflineCacheWorker::new(
        &worker_config(&origin, "v1", &["/", "/static/images/logo.png", "/static/js/script.js"]),
        storage.clone(),
        fetcher(),
    )
    .unwrap();

    let err = worker.install().await.unwrap_err();
    assert_eq!(err.category(), "cache_install");
    assert!(err.to_string().contains("logo.png"));
    assert_eq!(worker.state(), WorkerState::Redundant);
    assert!(storage.cache_names().await.unwrap().is_empty());

    let err = worker
        .handle_fetch(&AssetRequest::get(format!("{}/", origin)))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "state");
}

#[tokio::test]
async fn unreachable_origin_fails_install() {
    let network = Arc::new(OfflineNetwork::default());
    let storage = Arc::new(MemoryCacheStorage::new());
    let worker = OfflineCacheWorker::new(
        &worker_config("http://127.0.0.1:9", "v1", &PAGE),
        storage.clone(),
        network.clone(),
    )
    .unwrap();

    assert!(worker.install().await.is_err());
    assert_eq!(network.attempts.load(Ordering::SeqCst), 3);
    assert!(!storage.has_cache("plantia-v1").await.unwrap());
}

#[tokio::test]
async fn activation_drops_other_caches() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let storage = Arc::new(MemoryCacheStorage::new());
    let stale = vec![(
        AssetRequest::get(format!("{}/", origin)),
        CachedResponse::new(200, "old page"),
    )];
    storage.put_all("plantia-v0", stale.clone()).await.unwrap();
    storage.put_all("unrelated", stale).await.unwrap();

    let worker =
        OfflineCacheWorker::new(&worker_config(&origin, "v1", &PAGE), storage.clone(), fetcher())
            .unwrap();
    worker.install().await.unwrap();
    assert_eq!(storage.cache_names().await.unwrap().len(), 3);

    let mut deleted = worker.activate().await.unwrap();
    deleted.sort();
    assert_eq!(deleted, ["plantia-v0", "unrelated"]);
    assert_eq!(storage.cache_names().await.unwrap(), ["plantia-v1"]);

    let page = worker
        .handle_fetch(&AssetRequest::get(format!("{}/", origin)))
        .await
        .unwrap();
    assert_eq!(page.response().body.as_ref(), INDEX);
}

#[tokio::test]
async fn failed_cleanup_still_activates() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let storage = Arc::new(StuckStorage::default());
    storage
        .put_all(
            "plantia-v0",
            vec![(AssetRequest::get(format!("{}/", origin)), CachedResponse::new(200, "old page"))],
        )
        .await
        .unwrap();

    let worker =
        OfflineCacheWorker::new(&worker_config(&origin, "v1", &PAGE), storage.clone(), fetcher())
            .unwrap();
    worker.install().await.unwrap();

    let deleted = worker.activate().await.unwrap();
    assert!(deleted.is_empty());
    assert_eq!(worker.state(), WorkerState::Activated);
    assert_eq!(storage.cache_names().await.unwrap(), ["plantia-v0", "plantia-v1"]);

    let page = worker
        .handle_fetch(&AssetRequest::get(format!("{}/", origin)))
        .await
        .unwrap();
    assert!(page.from_cache());
    assert_eq!(page.response().body.as_ref(), INDEX);
    assert_eq!(worker.activate().await.unwrap_err().category(), "state");
}

#[tokio::test]
async fn other_methods_are_never_served_from_cache() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let worker = OfflineCacheWorker::new(
        &worker_config(&origin, "v1", &PAGE),
        Arc::new(MemoryCacheStorage::new()),
        fetcher(),
    )
    .unwrap();
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    let outcome = worker
        .handle_fetch(&AssetRequest::new("POST", format!("{}/", origin)))
        .await
        .unwrap();
    assert!(!outcome.from_cache());
    assert_eq!(site.hits("/"), 2);
}

#[tokio::test]
async fn disk_cache_serves_a_later_run_without_network() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let dir = tempfile::tempdir().unwrap();
    let config = worker_config(&origin, "v1", &PAGE);

    {
        let storage = Arc::new(DiskCacheStorage::open(dir.path()).await.unwrap());
        let worker = OfflineCacheWorker::new(&config, storage, fetcher()).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
    }

    let network = Arc::new(OfflineNetwork::default());
    let storage = Arc::new(DiskCacheStorage::open(dir.path()).await.unwrap());
    let worker = OfflineCacheWorker::new(&config, storage, network.clone()).unwrap();
    assert!(worker.resume().await.unwrap());
    assert_eq!(worker.state(), WorkerState::Activated);

    let css = worker
        .handle_fetch(&AssetRequest::get(format!("{}/static/css/style.css", origin)))
        .await
        .unwrap();
    assert!(css.from_cache());
    assert_eq!(css.response().body.as_ref(), STYLE);
    assert_eq!(network.attempts.load(Ordering::SeqCst), 0);

    let err = worker
        .handle_fetch(&AssetRequest::get(format!("{}/static/other.css", origin)))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "transport");
    assert_eq!(network.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lifecycle_steps_cannot_repeat() {
    let site = site();
    let origin = format!("http://{}", site.start().await);
    let worker = OfflineCacheWorker::new(
        &worker_config(&origin, "v1", &PAGE),
        Arc::new(MemoryCacheStorage::new()),
        fetcher(),
    )
    .unwrap();

    assert_eq!(worker.activate().await.unwrap_err().category(), "state");
    worker.install().await.unwrap();
    assert_eq!(worker.install().await.unwrap_err().category(), "state");
}

#[test]
fn default_worker_uses_built_in_manifest() {
    let worker = OfflineCacheWorker::new(
        &WorkerConfig::default(),
        Arc::new(MemoryCacheStorage::new()),
        Arc::new(OfflineNetwork::default()),
    )
    .unwrap();
    assert_eq!(worker.cache_name().to_string(), "plantia-v1");
    assert_eq!(worker.manifest().len(), 7);
    assert_eq!(worker.state(), WorkerState::Parsed);
}
