//! # Acquisition Controller
//!
//! Mediates between the two mutually exclusive image sources, the live
//! camera and the file picker, and produces exactly one normalized image
//! per user action, which it hands to the [`SubmissionTransport`].
//!
//! ## States
//!
//! ```text
//! Idle ──start_camera──▶ CameraActive ──capture──▶ Captured ──reset──▶ Idle
//!   └───────────────select_file──────────────────────▶ Captured
//! ```
//!
//! ## Stale Completions
//!
//! Every user action advances a generation counter. Asynchronous work
//! (stream acquisition, decode, the network exchange) remembers the
//! generation it started under and only applies its UI effects if that
//! generation is still current. Superseded work still runs to completion;
//! it resolves to [`Completion::Stale`], and a stream acquired by a stale
//! `start_camera` is released on arrival.
//!
//! ## Locking
//!
//! Controller state sits behind a `parking_lot::Mutex` that is never held
//! across an `.await`. Several futures on one task (user actions
//! interleaving on an event loop) can therefore drive the same controller.

pub mod view;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::capture::{CameraDevice, CaptureSession, ControlLayout, DeviceProfile, VideoConstraints};
use crate::config::NormalizationPolicy;
use crate::error::{ClientError, ClientResult};
use crate::processing::{ImageOrigin, NormalizedImage, Surface, decode_bitmap};
use crate::transport::{PredictionEndpoint, PredictionResult, SubmissionTransport};

pub use view::{AcquisitionState, LogNotifier, Notice, Notifier, ViewState};

/// Outcome of an action that may have been superseded while it was pending.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    /// The action was still current; its effects are visible.
    Applied(T),
    /// A newer action ran meanwhile; the value was not shown.
    Stale(T),
}

impl<T> Completion<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Completion::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Completion::Applied(v) | Completion::Stale(v) => v,
        }
    }
}

/// A file chosen through the picker.
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

struct Inner {
    generation: u64,
    next_session_id: u64,
    session: Option<CaptureSession>,
    /// Generation of the submission that currently owns the loading indicator.
    loading_owner: Option<u64>,
    surface: Surface,
    view: ViewState,
}

impl Inner {
    fn advance(&mut self, action: &str) -> u64 {
        self.generation += 1;
        debug!(generation = self.generation, action, "generation advanced");
        self.generation
    }

    fn release_session(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.release();
                true
            }
            None => false,
        }
    }
}

pub struct AcquisitionController {
    camera: Arc<dyn CameraDevice>,
    transport: SubmissionTransport,
    notifier: Arc<dyn Notifier>,
    profile: DeviceProfile,
    policy: NormalizationPolicy,
    inner: Mutex<Inner>,
}

impl AcquisitionController {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Controls exposed under the device policy.
    pub fn layout(&self) -> ControlLayout {
        self.profile.layout()
    }

    pub fn state(&self) -> AcquisitionState {
        self.inner.lock().view.state
    }

    pub fn view(&self) -> ViewState {
        self.inner.lock().view.clone()
    }

    pub fn has_session(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Acquire a camera stream: rear camera first, then any camera.
    ///
    /// When the [`DeviceProfile`] reports no camera API the controller
    /// switches to the file chooser instead and returns
    /// [`ClientError::CameraUnavailable`].
    pub async fn start_camera(&self) -> ClientResult<Completion<()>> {
        if !self.profile.has_camera_api {
            info!("camera stream API unavailable, opening the system camera chooser");
            let err = ClientError::camera_unavailable();
            self.report(&err);
            self.notifier.request_file_chooser(true);
            return Err(err);
        }

        let ticket = self.inner.lock().advance("start_camera");
        info!(generation = ticket, "requesting rear camera");

        let rear = VideoConstraints::rear();
        let (granted, stream) = match self.camera.open(&rear).await {
            Ok(stream) => (rear, stream),
            Err(first) => {
                warn!(error = %first, "rear camera rejected, trying default camera");
                let any = VideoConstraints::any();
                match self.camera.open(&any).await {
                    Ok(stream) => (any, stream),
                    Err(second) => {
                        warn!(error = %second, "default camera rejected");
                        let err = ClientError::camera(second.kind, second.to_string())
                            .with_operation("start_camera")
                            .with_metadata("first_attempt", first.to_string());
                        if self.is_current(ticket) {
                            self.report(&err);
                        }
                        return Err(err);
                    }
                }
            }
        };

        let mut inner = self.inner.lock();
        if inner.generation != ticket {
            let mut stream = stream;
            stream.stop_tracks();
            info!(generation = ticket, "camera arrived after a newer action, released");
            return Ok(Completion::Stale(()));
        }
        inner.release_session();
        inner.next_session_id += 1;
        let id = inner.next_session_id;
        inner.session = Some(CaptureSession::new(id, granted, stream));
        inner.view.camera_started();
        Ok(Completion::Applied(()))
    }

    /// Stop the camera. Safe to call without a running camera.
    pub fn stop_camera(&self) {
        let mut inner = self.inner.lock();
        inner.advance("stop_camera");
        let released = inner.release_session();
        inner.view.camera_stopped();
        info!(released, "camera stopped");
    }

    /// Draw the current frame, release the camera, and submit the image.
    pub async fn capture(&self) -> ClientResult<Completion<PredictionResult>> {
        let (ticket, drawn) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let Some(mut session) = inner.session.take() else {
                return Err(ClientError::state(
                    inner.view.state.to_string(),
                    "capture",
                    "camera is not running",
                ));
            };
            let frame = session.grab_frame();
            session.release();

            let ticket = inner.advance("capture");
            inner.view.camera_controls_off();
            let max_width = self.policy.max_width(ImageOrigin::LiveCapture);
            let drawn = frame.and_then(|frame| {
                inner
                    .surface
                    .draw_bounded(&frame, max_width, ImageOrigin::LiveCapture)
            });
            match &drawn {
                Ok(image) => {
                    inner.view.image_drawn();
                    info!(width = image.width(), height = image.height(), "frame captured");
                }
                Err(_) => inner.view.camera_stopped(),
            }
            (ticket, drawn)
        };

        match drawn {
            Ok(image) => self.submit(ticket, image).await,
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Decode a picked file, draw it at the upload bound, release any
    /// running camera, and submit the image.
    pub async fn select_file(&self, file: PickedFile) -> ClientResult<Completion<PredictionResult>> {
        let ticket = self.inner.lock().advance("select_file");
        info!(file = %file.name, len = file.bytes.len(), "file selected");

        let bitmap = match decode_bitmap(file.bytes).await {
            Ok(bitmap) => bitmap,
            Err(err) => {
                warn!(error = %err, "decode failed");
                if self.is_current(ticket) {
                    self.report(&err);
                }
                return Err(err.with_operation("select_file"));
            }
        };

        let drawn = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.generation != ticket {
                bitmap.close();
                debug!(generation = ticket, "decoded file superseded, dropped");
                return Err(ClientError::state(
                    inner.view.state.to_string(),
                    "select_file",
                    "superseded by a newer action before the image was drawn",
                ));
            }
            let drawn = inner.surface.draw_bounded(
                bitmap.raster(),
                self.policy.max_width(ImageOrigin::FileUpload),
                ImageOrigin::FileUpload,
            );
            bitmap.close();
            if drawn.is_ok() {
                if inner.release_session() {
                    info!("camera released by file selection");
                }
                inner.view.image_drawn();
            }
            drawn
        };

        match drawn {
            Ok(image) => self.submit(ticket, image).await,
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Clear the result. A running camera keeps running.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.advance("reset");
        inner.view.result = None;
        if inner.session.is_some() {
            inner.view.state = AcquisitionState::CameraActive;
            inner.view.video_visible = true;
            inner.view.canvas_visible = false;
            inner.view.capture_enabled = true;
        } else {
            inner.view.idle();
        }
        info!(state = %inner.view.state, "reset");
    }

    /// The "scan" control of the mobile layout: open the native camera.
    pub fn open_native_camera(&self) {
        info!("native camera chooser requested");
        self.notifier.request_file_chooser(true);
    }

    fn report(&self, err: &ClientError) {
        if let Some(notice) = err.user_notice() {
            self.notifier.notify(notice);
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.inner.lock().generation == ticket
    }

    async fn submit(
        &self,
        ticket: u64,
        image: NormalizedImage,
    ) -> ClientResult<Completion<PredictionResult>> {
        let payload = match self.transport.encode(image) {
            Ok(payload) => payload,
            Err(err) => {
                if self.is_current(ticket) {
                    self.report(&err);
                }
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.loading_owner = Some(ticket);
            inner.view.loading = true;
            inner.view.scanning = true;
            inner.view.result = None;
        }

        let outcome = self.transport.send(payload).await;

        let current = {
            let mut inner = self.inner.lock();
            if inner.loading_owner == Some(ticket) {
                inner.loading_owner = None;
                inner.view.loading = false;
                inner.view.scanning = false;
            }
            let current = inner.generation == ticket;
            if current {
                if let Ok(result) = &outcome {
                    inner.view.result = Some(result.view());
                }
            }
            current
        };

        match outcome {
            Ok(result) if current => Ok(Completion::Applied(result)),
            Ok(result) => {
                debug!(generation = ticket, "prediction arrived after a newer action, not shown");
                Ok(Completion::Stale(result))
            }
            Err(err) => {
                if current {
                    self.report(&err);
                }
                Err(err)
            }
        }
    }
}

/// Builder for [`AcquisitionController`].
pub struct ControllerBuilder {
    camera: Option<Arc<dyn CameraDevice>>,
    endpoint: Option<Arc<dyn PredictionEndpoint>>,
    notifier: Arc<dyn Notifier>,
    profile: DeviceProfile,
    policy: NormalizationPolicy,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            camera: None,
            endpoint: None,
            notifier: Arc::new(LogNotifier),
            profile: DeviceProfile::desktop(),
            policy: NormalizationPolicy::default(),
        }
    }

    pub fn with_camera<C: CameraDevice + 'static>(mut self, camera: C) -> Self {
        self.camera = Some(Arc::new(camera));
        self
    }

    pub fn with_endpoint<E: PredictionEndpoint + 'static>(mut self, endpoint: E) -> Self {
        self.endpoint = Some(Arc::new(endpoint));
        self
    }

    pub fn with_shared_endpoint(mut self, endpoint: Arc<dyn PredictionEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Capability descriptor computed once at startup.
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_policy(mut self, policy: NormalizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ClientResult<AcquisitionController> {
        self.policy.validate()?;
        let camera = self
            .camera
            .ok_or_else(|| ClientError::config("camera", "none", "no camera device specified"))?;
        let endpoint = self.endpoint.ok_or_else(|| {
            ClientError::config("endpoint", "none", "no prediction endpoint specified")
        })?;

        let mut profile = self.profile;
        if profile.has_camera_api && !camera.has_stream_api() {
            debug!("camera device has no stream API, narrowing the device profile");
            profile.has_camera_api = false;
        }

        let layout = profile.layout();
        info!(
            mobile = profile.is_mobile,
            secure = profile.is_secure_context,
            camera_api = profile.has_camera_api,
            camera_start_visible = layout.camera_start_visible,
            "acquisition controller ready"
        );

        Ok(AcquisitionController {
            camera,
            transport: SubmissionTransport::new(endpoint, self.policy),
            notifier: self.notifier,
            profile,
            policy: self.policy,
            inner: Mutex::new(Inner {
                generation: 0,
                next_session_id: 0,
                session: None,
                loading_owner: None,
                surface: Surface::new(),
                view: ViewState::default(),
            }),
        })
    }
}
