//! What the page shows, and how the controller talks to the user.

use std::fmt;

use tracing::{info, warn};

use crate::error::CameraFailureKind;
use crate::transport::ResultView;

/// Acquisition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No stream, no pending image
    Idle,
    /// A capture session is owned
    CameraActive,
    /// An image has been drawn and is (or was) being submitted
    Captured,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::Idle => write!(f, "idle"),
            AcquisitionState::CameraActive => write!(f, "camera_active"),
            AcquisitionState::Captured => write!(f, "captured"),
        }
    }
}

/// Snapshot of every piece of page state the controller drives.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub state: AcquisitionState,
    pub video_visible: bool,
    pub canvas_visible: bool,
    pub placeholder_visible: bool,
    pub start_visible: bool,
    pub stop_visible: bool,
    pub capture_enabled: bool,
    /// Scanning animation over the preview while a request is in flight.
    pub scanning: bool,
    /// Indeterminate progress indicator.
    pub loading: bool,
    pub result: Option<ResultView>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            state: AcquisitionState::Idle,
            video_visible: false,
            canvas_visible: false,
            placeholder_visible: true,
            start_visible: true,
            stop_visible: false,
            capture_enabled: false,
            scanning: false,
            loading: false,
            result: None,
        }
    }
}

impl ViewState {
    pub(crate) fn camera_started(&mut self) {
        self.state = AcquisitionState::CameraActive;
        self.video_visible = true;
        self.canvas_visible = false;
        self.placeholder_visible = false;
        self.start_visible = false;
        self.stop_visible = true;
        self.capture_enabled = true;
        self.scanning = false;
        self.result = None;
    }

    /// Camera controls back to "not running"; preview panes untouched.
    pub(crate) fn camera_controls_off(&mut self) {
        self.start_visible = true;
        self.stop_visible = false;
        self.capture_enabled = false;
    }

    pub(crate) fn camera_stopped(&mut self) {
        self.camera_controls_off();
        self.state = AcquisitionState::Idle;
        self.video_visible = false;
        self.placeholder_visible = true;
    }

    pub(crate) fn image_drawn(&mut self) {
        self.camera_controls_off();
        self.state = AcquisitionState::Captured;
        self.video_visible = false;
        self.canvas_visible = true;
        self.placeholder_visible = false;
    }

    pub(crate) fn idle(&mut self) {
        let loading = self.loading;
        let scanning = self.scanning;
        *self = Self::default();
        self.loading = loading;
        self.scanning = scanning;
    }
}

/// One-shot messages shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// No camera API; the system camera opens through the file chooser.
    CompatibilityMode,
    /// Both camera attempts failed.
    CameraFailed(CameraFailureKind),
    /// A picked file could not be decoded.
    LowMemory,
    /// Drawing or JPEG export failed.
    ImageProcessingFailed,
    /// The prediction exchange failed.
    PredictionFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::CompatibilityMode => {
                "Compatibility mode enabled. Without HTTPS the browser blocks direct camera access, so your system camera will open instead."
            }
            Notice::CameraFailed(CameraFailureKind::Denied) => {
                "Camera permission was refused. This is normal without HTTPS. Use the 'Upload image' button to take a photo directly."
            }
            Notice::CameraFailed(CameraFailureKind::Hardware) => {
                "Could not access the camera. Use the 'Upload image' button to take a photo directly."
            }
            Notice::LowMemory => {
                "Your device is low on free memory. Close other apps or take the photo at a lower resolution."
            }
            Notice::ImageProcessingFailed => "Memory error while processing the image.",
            Notice::PredictionFailed => "An error occurred while processing the image.",
        }
    }
}

/// User-facing side effects the controller cannot perform itself.
pub trait Notifier: Send + Sync {
    /// Show a one-shot message.
    fn notify(&self, notice: Notice);

    /// Open the file picker; `native_camera` asks for the camera-capture variant.
    fn request_file_chooser(&self, native_camera: bool);
}

/// Notifier that writes to the log; used by the command line driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        warn!(?notice, "{}", notice.message());
    }

    fn request_file_chooser(&self, native_camera: bool) {
        info!(native_camera, "file chooser requested");
    }
}
