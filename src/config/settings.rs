//! # Client Settings
//!
//! All tunable constants of the client live here instead of being spread
//! through the acquisition and transport code as literals.
//!
//! ## Normalization Policy
//!
//! | Field | Default | Applies to |
//! |-------|---------|------------|
//! | `capture_max_width` | 640 | frames grabbed from the live camera |
//! | `upload_max_width` | 500 | bitmaps decoded from a picked file |
//! | `capture_jpeg_quality` | encoder default (75) | live capture export |
//! | `upload_jpeg_quality` | 70 | file upload export |
//!
//! File uploads get the stricter bound and the lower quality: they are
//! usually full-resolution phone photos.
//!
//! ## Examples
//!
//! ```rust
//! use plantia_client::config::{ClientConfig, NormalizationPolicy};
//! use plantia_client::processing::ImageOrigin;
//!
//! let policy = NormalizationPolicy::default();
//! assert_eq!(policy.max_width(ImageOrigin::LiveCapture), 640);
//! assert_eq!(policy.jpeg_quality(ImageOrigin::FileUpload), Some(70));
//!
//! let config = ClientConfig::with_endpoint("http://192.168.1.20:5000");
//! assert!(config.validate().is_ok());
//! assert_eq!(config.predict_url().unwrap().path(), "/predict");
//! ```

use std::time::Duration;

use plantia_scale::presets::{CAPTURE_MAX_WIDTH, UPLOAD_MAX_WIDTH};
use reqwest::Url;

use crate::error::{ClientError, ClientResult};
use crate::processing::ImageOrigin;
use crate::worker::DEFAULT_ASSETS;

/// Resolution bounds and encoder quality for both image sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationPolicy {
    /// Maximum width of a frame drawn from the live camera.
    pub capture_max_width: u32,
    /// Maximum width of a bitmap drawn from a picked file.
    pub upload_max_width: u32,
    /// JPEG quality (1-100) for live captures; `None` keeps the encoder default.
    pub capture_jpeg_quality: Option<u8>,
    /// JPEG quality (1-100) for file uploads.
    pub upload_jpeg_quality: u8,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            capture_max_width: CAPTURE_MAX_WIDTH,
            upload_max_width: UPLOAD_MAX_WIDTH,
            capture_jpeg_quality: None,
            upload_jpeg_quality: 70,
        }
    }
}

impl NormalizationPolicy {
    /// Width bound for the given image source.
    pub fn max_width(&self, origin: ImageOrigin) -> u32 {
        match origin {
            ImageOrigin::LiveCapture => self.capture_max_width,
            ImageOrigin::FileUpload => self.upload_max_width,
        }
    }

    /// JPEG quality for the given image source.
    pub fn jpeg_quality(&self, origin: ImageOrigin) -> Option<u8> {
        match origin {
            ImageOrigin::LiveCapture => self.capture_jpeg_quality,
            ImageOrigin::FileUpload => Some(self.upload_jpeg_quality),
        }
    }

    /// Validates widths and qualities.
    pub fn validate(&self) -> ClientResult<()> {
        if self.capture_max_width == 0 {
            return Err(ClientError::config(
                "capture_max_width",
                "0",
                "must be greater than 0",
            ));
        }
        if self.upload_max_width == 0 {
            return Err(ClientError::config(
                "upload_max_width",
                "0",
                "must be greater than 0",
            ));
        }
        if let Some(q) = self.capture_jpeg_quality {
            check_quality("capture_jpeg_quality", q)?;
        }
        check_quality("upload_jpeg_quality", self.upload_jpeg_quality)
    }
}

fn check_quality(field: &str, quality: u8) -> ClientResult<()> {
    if !(1..=100).contains(&quality) {
        return Err(ClientError::config(
            field,
            quality.to_string(),
            "must be between 1 and 100",
        ));
    }
    Ok(())
}

/// Connection settings of the prediction transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the prediction service (scheme, host, port).
    pub endpoint: String,
    /// Path of the prediction route, joined onto `endpoint`.
    pub predict_path: String,
    /// Upper bound for the single request attempt.
    pub timeout: Duration,
    /// Resolution and quality policy.
    pub policy: NormalizationPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000".to_string(),
            predict_path: "/predict".to_string(),
            timeout: Duration::from_secs(30),
            policy: NormalizationPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at another service.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Absolute URL of the prediction route.
    pub fn predict_url(&self) -> ClientResult<Url> {
        let base = Url::parse(&self.endpoint)
            .map_err(|e| ClientError::config("endpoint", &self.endpoint, e.to_string()))?;
        base.join(&self.predict_path)
            .map_err(|e| ClientError::config("predict_path", &self.predict_path, e.to_string()))
    }

    /// Validates the endpoint, timeout and policy.
    pub fn validate(&self) -> ClientResult<()> {
        let url = self.predict_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::config(
                "endpoint",
                &self.endpoint,
                "scheme must be http or https",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::config(
                "timeout",
                "0s",
                "must be greater than 0",
            ));
        }
        self.policy.validate()
    }
}

/// Settings of the offline cache worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Application part of the cache name.
    pub cache_prefix: String,
    /// Version token; a new token means a logically distinct cache.
    pub cache_version: String,
    /// Origin that relative manifest entries resolve against.
    pub origin: String,
    /// Assets to precache, relative to `origin` or absolute.
    pub manifest: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "plantia".to_string(),
            cache_version: "v1".to_string(),
            origin: "http://127.0.0.1:5000".to_string(),
            manifest: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl WorkerConfig {
    /// Validates prefix, version and origin.
    pub fn validate(&self) -> ClientResult<()> {
        if self.cache_prefix.trim().is_empty() {
            return Err(ClientError::config("cache_prefix", "", "must not be empty"));
        }
        if self.cache_version.trim().is_empty() {
            return Err(ClientError::config("cache_version", "", "must not be empty"));
        }
        Url::parse(&self.origin)
            .map_err(|e| ClientError::config("origin", &self.origin, e.to_string()))?;
        if self.manifest.is_empty() {
            return Err(ClientError::config("manifest", "[]", "must list at least one asset"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = NormalizationPolicy::default();
        assert_eq!(policy.capture_max_width, 640);
        assert_eq!(policy.upload_max_width, 500);
        assert_eq!(policy.jpeg_quality(ImageOrigin::LiveCapture), None);
        assert_eq!(policy.jpeg_quality(ImageOrigin::FileUpload), Some(70));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_validation() {
        let mut policy = NormalizationPolicy::default();

        policy.upload_max_width = 0;
        assert!(policy.validate().is_err());
        policy.upload_max_width = 500;

        policy.capture_jpeg_quality = Some(0);
        assert!(policy.validate().is_err());
        policy.capture_jpeg_quality = Some(92);
        assert!(policy.validate().is_ok());

        policy.upload_jpeg_quality = 101;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_predict_url_join() {
        let config = ClientConfig::with_endpoint("https://leaf.example.org");
        assert_eq!(
            config.predict_url().unwrap().as_str(),
            "https://leaf.example.org/predict"
        );
    }

    #[test]
    fn test_client_validation() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.endpoint = "ftp://host".to_string();
        assert!(config.validate().is_err());

        config.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_validation() {
        let mut config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        config.cache_version = " ".to_string();
        assert!(config.validate().is_err());
    }
}
