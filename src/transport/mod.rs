//! # Submission Transport
//!
//! One-shot delivery of a normalized image to the prediction endpoint.
//!
//! [`SubmissionTransport`] applies the export half of the normalization
//! policy (JPEG quality per image origin) and hands the blob to a
//! [`PredictionEndpoint`], which performs exactly one network exchange.
//! The call resolves once, to either a [`PredictionResult`] or a
//! [`ClientError::Transport`]; nothing is retried.

pub mod http;
pub mod result;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::NormalizationPolicy;
use crate::error::ClientResult;
use crate::processing::{JpegPayload, NormalizedImage, encode_jpeg};

pub use http::HttpEndpoint;
pub use result::{PredictionResult, ResultView, Verdict, parse_leading_number};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// File name reported for the image part.
pub const IMAGE_FILE_NAME: &str = "capture.jpg";

/// A single network exchange with the prediction service.
#[async_trait]
pub trait PredictionEndpoint: Send + Sync {
    async fn predict(&self, payload: JpegPayload) -> ClientResult<PredictionResult>;
}

/// Encodes normalized images and submits them.
#[derive(Clone)]
pub struct SubmissionTransport {
    endpoint: Arc<dyn PredictionEndpoint>,
    policy: NormalizationPolicy,
}

impl SubmissionTransport {
    pub fn new(endpoint: Arc<dyn PredictionEndpoint>, policy: NormalizationPolicy) -> Self {
        Self { endpoint, policy }
    }

    pub fn policy(&self) -> &NormalizationPolicy {
        &self.policy
    }

    /// Export `image` as JPEG. Split out so callers can report an export
    /// failure separately from a network failure.
    pub fn encode(&self, image: NormalizedImage) -> ClientResult<JpegPayload> {
        let quality = self.policy.jpeg_quality(image.origin());
        encode_jpeg(image, quality)
    }

    /// Send an already exported payload.
    pub async fn send(&self, payload: JpegPayload) -> ClientResult<PredictionResult> {
        let origin = payload.origin;
        let len = payload.bytes.len();
        match self.endpoint.predict(payload).await {
            Ok(result) => {
                info!(%origin, len, label = %result.label, confidence = %result.confidence, "prediction received");
                Ok(result)
            }
            Err(err) => {
                warn!(%origin, len, error = %err, "prediction failed");
                Err(err)
            }
        }
    }

    /// Encode and send.
    pub async fn submit(&self, image: NormalizedImage) -> ClientResult<PredictionResult> {
        let payload = self.encode(image)?;
        self.send(payload).await
    }
}
