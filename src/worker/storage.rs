//! Named response caches.
//!
//! A [`CacheStorage`] holds any number of named caches, each mapping an
//! [`AssetRequest`] to a [`CachedResponse`]. `put_all` is the only write
//! path and commits a whole batch or nothing.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use super::fetch::{AssetRequest, CachedResponse};
use crate::error::{ClientError, ClientResult};

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every cache present, sorted.
    async fn cache_names(&self) -> ClientResult<Vec<String>>;

    async fn has_cache(&self, cache: &str) -> ClientResult<bool> {
        Ok(self.cache_names().await?.iter().any(|n| n == cache))
    }

    /// Store every entry, creating `cache` if needed. Either all entries
    /// become visible or none do.
    async fn put_all(
        &self,
        cache: &str,
        entries: Vec<(AssetRequest, CachedResponse)>,
    ) -> ClientResult<()>;

    /// Exact match on request identity.
    async fn lookup(
        &self,
        cache: &str,
        request: &AssetRequest,
    ) -> ClientResult<Option<CachedResponse>>;

    async fn keys(&self, cache: &str) -> ClientResult<Vec<AssetRequest>>;

    /// Remove a cache. Returns whether it existed.
    async fn delete(&self, cache: &str) -> ClientResult<bool>;
}

/// Process-local storage.
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: Mutex<BTreeMap<String, BTreeMap<AssetRequest, CachedResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn cache_names(&self) -> ClientResult<Vec<String>> {
        Ok(self.caches.lock().keys().cloned().collect())
    }

    async fn put_all(
        &self,
        cache: &str,
        entries: Vec<(AssetRequest, CachedResponse)>,
    ) -> ClientResult<()> {
        let mut caches = self.caches.lock();
        caches.entry(cache.to_string()).or_default().extend(entries);
        Ok(())
    }

    async fn lookup(
        &self,
        cache: &str,
        request: &AssetRequest,
    ) -> ClientResult<Option<CachedResponse>> {
        Ok(self
            .caches
            .lock()
            .get(cache)
            .and_then(|c| c.get(request))
            .cloned())
    }

    async fn keys(&self, cache: &str) -> ClientResult<Vec<AssetRequest>> {
        Ok(self
            .caches
            .lock()
            .get(cache)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, cache: &str) -> ClientResult<bool> {
        Ok(self.caches.lock().remove(cache).is_some())
    }
}

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    next_body: u64,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    request: AssetRequest,
    status: u16,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    headers: Vec<(String, String)>,
    body_file: String,
}

/// One directory per cache under `root`: an `index.json` plus one body file
/// per entry. The index is replaced by rename, which is the commit point of
/// `put_all`.
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub async fn open(root: impl Into<PathBuf>) -> ClientResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| ClientError::io_at("open_cache_storage", &root, e))?;
        debug!(root = %root.display(), "disk cache storage opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, cache: &str) -> ClientResult<PathBuf> {
        let valid = !cache.is_empty()
            && !cache.starts_with('.')
            && cache
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(ClientError::config(
                "cache_name",
                cache,
                "only ASCII letters, digits, '-', '_' and '.' are allowed",
            ));
        }
        Ok(self.root.join(cache))
    }

    async fn read_index(&self, dir: &Path) -> ClientResult<Option<CacheIndex>> {
        let path = dir.join(INDEX_FILE);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::io_at("read_cache_index", &path, e)),
        }
    }

    async fn write_index(&self, dir: &Path, index: &CacheIndex) -> ClientResult<()> {
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        let raw = serde_json::to_vec_pretty(index)?;
        fs::write(&tmp, raw)
            .await
            .map_err(|e| ClientError::io_at("write_cache_index", &tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| ClientError::io_at("commit_cache_index", &path, e))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn cache_names(&self) -> ClientResult<Vec<String>> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| ClientError::io_at("list_caches", &self.root, e))?;
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ClientError::io_at("list_caches", &self.root, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if fs::try_exists(entry.path().join(INDEX_FILE))
                .await
                .unwrap_or(false)
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn put_all(
        &self,
        cache: &str,
        entries: Vec<(AssetRequest, CachedResponse)>,
    ) -> ClientResult<()> {
        let dir = self.cache_dir(cache)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ClientError::io_at("create_cache", &dir, e))?;
        let mut index = self.read_index(&dir).await?.unwrap_or_default();

        let mut replaced = Vec::new();
        let mut written = Vec::new();
        let count = entries.len();
        for (request, response) in entries {
            let body_file = format!("{:08}.body", index.next_body);
            index.next_body += 1;
            let body_path = dir.join(&body_file);
            if let Err(e) = fs::write(&body_path, &response.body).await {
                discard_bodies(cache, &written).await;
                return Err(ClientError::io_at("write_cache_body", &body_path, e));
            }
            written.push(body_path);

            let entry = IndexEntry {
                request,
                status: response.status,
                content_type: response.content_type,
                headers: response.headers,
                body_file,
            };
            match index.entries.iter_mut().find(|e| e.request == entry.request) {
                Some(slot) => replaced.push(std::mem::replace(slot, entry).body_file),
                None => index.entries.push(entry),
            }
        }

        if let Err(e) = self.write_index(&dir, &index).await {
            discard_bodies(cache, &written).await;
            return Err(e);
        }
        info!(cache, count, dir = %dir.display(), "cache entries committed");

        for body_file in replaced {
            if let Err(e) = fs::remove_file(dir.join(&body_file)).await {
                warn!(cache, body_file = %body_file, error = %e, "stale body file left behind");
            }
        }
        Ok(())
    }

    async fn lookup(
        &self,
        cache: &str,
        request: &AssetRequest,
    ) -> ClientResult<Option<CachedResponse>> {
        let dir = self.cache_dir(cache)?;
        let Some(index) = self.read_index(&dir).await? else {
            return Ok(None);
        };
        let Some(entry) = index.entries.into_iter().find(|e| &e.request == request) else {
            return Ok(None);
        };
        let body_path = dir.join(&entry.body_file);
        let body = fs::read(&body_path)
            .await
            .map_err(|e| ClientError::io_at("read_cache_body", &body_path, e))?;
        Ok(Some(CachedResponse {
            status: entry.status,
            content_type: entry.content_type,
            headers: entry.headers,
            body: Bytes::from(body),
        }))
    }

    async fn keys(&self, cache: &str) -> ClientResult<Vec<AssetRequest>> {
        let dir = self.cache_dir(cache)?;
        Ok(self
            .read_index(&dir)
            .await?
            .map(|index| index.entries.into_iter().map(|e| e.request).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, cache: &str) -> ClientResult<bool> {
        let dir = self.cache_dir(cache)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ClientError::io_at("delete_cache", &dir, e)),
        }
    }
}

/// Best-effort removal of body files from an uncommitted write.
async fn discard_bodies(cache: &str, written: &[PathBuf]) {
    for path in written {
        if let Err(e) = fs::remove_file(path).await {
            warn!(cache, body = %path.display(), error = %e, "uncommitted body file left behind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, body: &'static str) -> (AssetRequest, CachedResponse) {
        (
            AssetRequest::get(format!("http://a.test{}", path)),
            CachedResponse::new(200, body).with_content_type("text/plain"),
        )
    }

    #[tokio::test]
    async fn memory_lookup_is_exact() {
        let storage = MemoryCacheStorage::new();
        storage
            .put_all("plantia-v1", vec![entry("/", "home")])
            .await
            .unwrap();
        let hit = storage
            .lookup("plantia-v1", &AssetRequest::get("http://a.test/"))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().body, Bytes::from_static(b"home"));
        let post = AssetRequest::new("post", "http://a.test/");
        assert!(storage.lookup("plantia-v1", &post).await.unwrap().is_none());
        assert!(storage.lookup("other", &post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disk_replaces_entries_and_deletes() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open(tmp.path()).await.unwrap();
        storage
            .put_all("plantia-v1", vec![entry("/a", "one"), entry("/b", "two")])
            .await
            .unwrap();
        storage
            .put_all("plantia-v1", vec![entry("/a", "uno")])
            .await
            .unwrap();

        let keys = storage.keys("plantia-v1").await.unwrap();
        assert_eq!(keys.len(), 2);
        let a = storage
            .lookup("plantia-v1", &AssetRequest::get("http://a.test/a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.body, Bytes::from_static(b"uno"));
        assert_eq!(a.content_type.as_deref(), Some("text/plain"));

        assert_eq!(storage.cache_names().await.unwrap(), ["plantia-v1"]);
        assert!(storage.delete("plantia-v1").await.unwrap());
        assert!(!storage.delete("plantia-v1").await.unwrap());
        assert!(storage.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disk_failed_write_leaves_no_bodies() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open(tmp.path()).await.unwrap();
        let dir = tmp.path().join("plantia-v1");
        std::fs::create_dir_all(dir.join("00000001.body")).unwrap();

        let err = storage
            .put_all("plantia-v1", vec![entry("/a", "one"), entry("/b", "two")])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "io");
        assert!(!dir.join("00000000.body").exists());
        assert!(!dir.join(INDEX_FILE).exists());
        assert!(storage.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disk_rejects_path_like_names() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open(tmp.path()).await.unwrap();
        let err = storage.put_all("../escape", Vec::new()).await.unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
