//! Camera capability contracts.
//!
//! The controller never talks to camera hardware directly. It asks a
//! [`CameraDevice`] for a stream matching some [`VideoConstraints`] and then
//! owns the returned [`MediaStream`] until it stops its tracks.

use std::fmt;

use async_trait::async_trait;
use image::RgbaImage;

use crate::error::{CameraFailureKind, ClientResult};

/// Which camera the constraints ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    Environment,
    /// Front camera
    User,
}

/// Video constraints of a stream request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoConstraints {
    /// `None` lets the platform choose its default camera.
    pub facing_mode: Option<FacingMode>,
}

impl VideoConstraints {
    /// Prefer the rear camera.
    pub fn rear() -> Self {
        Self {
            facing_mode: Some(FacingMode::Environment),
        }
    }

    /// Any camera the platform picks.
    pub fn any() -> Self {
        Self { facing_mode: None }
    }
}

impl fmt::Display for VideoConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.facing_mode {
            Some(FacingMode::Environment) => write!(f, "video:{{facingMode:environment}}"),
            Some(FacingMode::User) => write!(f, "video:{{facingMode:user}}"),
            None => write!(f, "video:true"),
        }
    }
}

/// A rejected stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraOpenError {
    pub kind: CameraFailureKind,
    /// Platform error name, e.g. `NotAllowedError`.
    pub name: String,
    pub message: String,
}

impl CameraOpenError {
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            kind: CameraFailureKind::Denied,
            name: "NotAllowedError".to_string(),
            message: message.into(),
        }
    }

    pub fn hardware(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: CameraFailureKind::Hardware,
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CameraOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Camera-stream acquisition capability.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Whether the platform exposes a stream API at all. On insecure origins
    /// browsers hide it entirely.
    fn has_stream_api(&self) -> bool;

    /// Request a stream. Resolves once the user has answered the permission
    /// prompt and the hardware is running.
    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraOpenError>;
}

/// A running video stream and its tracks.
pub trait MediaStream: Send {
    /// Intrinsic frame size (`videoWidth` x `videoHeight`).
    fn video_size(&self) -> (u32, u32);

    /// Copy the current frame.
    fn grab_frame(&mut self) -> ClientResult<RgbaImage>;

    /// Stop every track, releasing the hardware. Must be safe to call twice.
    fn stop_tracks(&mut self);

    /// True until [`MediaStream::stop_tracks`] has been called.
    fn is_live(&self) -> bool;

    /// Human-readable track label for diagnostics.
    fn label(&self) -> String;
}
