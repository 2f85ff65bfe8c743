//! Precache manifest and the version-tagged cache name.

use std::fmt;

use reqwest::Url;

use crate::error::{ClientError, ClientResult};

/// Assets the page needs to render offline.
pub const DEFAULT_ASSETS: [&str; 7] = [
    "/",
    "/static/css/style.css",
    "/static/js/script.js",
    "/static/images/logo.png",
    "/static/manifest.json",
    "https://fonts.googleapis.com/css2?family=Outfit:wght@300;400;600;700&display=swap",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
];

/// `prefix-version`, e.g. `plantia-v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheName {
    prefix: String,
    version: String,
}

impl CacheName {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.version)
    }
}

/// Ordered, de-duplicated list of absolute asset URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    urls: Vec<Url>,
}

impl CacheManifest {
    /// Resolve `entries` against `origin`. Absolute entries are kept as is.
    pub fn resolve<I, S>(origin: &str, entries: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = Url::parse(origin)
            .map_err(|e| ClientError::config("origin", origin, e.to_string()))?;
        let mut urls: Vec<Url> = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            let url = base
                .join(entry)
                .map_err(|e| ClientError::config("manifest", entry, e.to_string()))?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(Self { urls })
    }

    /// The built-in asset list, resolved against `origin`.
    pub fn default_for(origin: &str) -> ClientResult<Self> {
        Self::resolve(origin, DEFAULT_ASSETS)
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_resolves_relative_entries() {
        let manifest = CacheManifest::default_for("http://leaf.local:5000").unwrap();
        assert_eq!(manifest.len(), 7);
        assert_eq!(manifest.urls()[0].as_str(), "http://leaf.local:5000/");
        assert_eq!(
            manifest.urls()[1].as_str(),
            "http://leaf.local:5000/static/css/style.css"
        );
        assert_eq!(manifest.urls()[6].host_str(), Some("cdnjs.cloudflare.com"));
    }

    #[test]
    fn duplicates_keep_first_position() {
        let manifest =
            CacheManifest::resolve("http://a.test", ["/x", "/y", "http://a.test/x"]).unwrap();
        let paths: Vec<_> = manifest.urls().iter().map(|u| u.path()).collect();
        assert_eq!(paths, ["/x", "/y"]);
    }

    #[test]
    fn bad_origin_is_a_config_error() {
        let err = CacheManifest::resolve("not a url", ["/"]).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn cache_name_embeds_version() {
        let name = CacheName::new("plantia", "v1");
        assert_eq!(name.to_string(), "plantia-v1");
        assert_ne!(name, CacheName::new("plantia", "v0"));
    }
}
