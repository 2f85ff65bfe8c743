//! # Plantia Client
//!
//! Client side of a plant-leaf classification service: acquires a leaf
//! image from a live camera or a picked file, normalizes it, submits it to
//! the `/predict` endpoint, and presents the verdict. An offline cache worker
//! precaches the page assets and serves them cache-first.
//!
//! ## Architecture
//!
//! - `capture`: camera capability contracts, the owned capture session, the
//!   device policy, and a virtual camera
//! - `processing`: bitmap decode, width-bounded drawing, JPEG export
//! - `transport`: the prediction exchange and result interpretation
//! - `controller`: the acquisition state machine with its generation guard
//! - `worker`: precache install, activation cleanup, cache-first fetch
//! - `config`: normalization policy, client and worker settings
//! - `error`: the error type shared by all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use plantia_client::{ClientConfig, predict_file};
//!
//! # async fn example() -> plantia_client::ClientResult<()> {
//! let config = ClientConfig::with_endpoint("http://127.0.0.1:5000");
//! let result = predict_file(&config, "leaf.jpg").await?;
//! println!("{} ({})", result.display_label(), result.confidence);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod processing;
pub mod transport;
pub mod worker;

pub use capture::{CameraDevice, DeviceProfile, VirtualCamera};
pub use config::{ClientConfig, NormalizationPolicy, WorkerConfig};
pub use controller::{AcquisitionController, Completion, Notice, Notifier, PickedFile};
pub use error::{ClientError, ClientResult, HasRecoverySuggestion, HasSeverity};
pub use transport::{HttpEndpoint, PredictionResult, Verdict};
pub use worker::{OfflineCacheWorker, WorkerState};

/// Run the file-upload path once against the configured endpoint.
///
/// The device has no camera here, so the controller only ever takes the
/// picked-file branch.
pub async fn predict_file(
    config: &ClientConfig,
    path: impl AsRef<Path>,
) -> ClientResult<PredictionResult> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ClientError::io_at("read_image", path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let controller = AcquisitionController::builder()
        .with_camera(VirtualCamera::new(image::RgbaImage::new(1, 1)).without_api())
        .with_profile(DeviceProfile {
            has_camera_api: false,
            ..DeviceProfile::desktop()
        })
        .with_shared_endpoint(Arc::new(HttpEndpoint::new(config)?))
        .with_policy(config.policy)
        .build()?;

    controller
        .select_file(PickedFile::new(name, bytes))
        .await
        .map(Completion::into_inner)
}
