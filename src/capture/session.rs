//! The capture session: exclusive ownership of one running camera stream.
//!
//! A session exists iff the camera is running. Releasing it stops every
//! track. Dropping an unreleased session stops the tracks as well, so a
//! session can never leave the hardware locked.

use image::RgbaImage;
use tracing::{debug, info};

use super::stream::{MediaStream, VideoConstraints};
use crate::error::{ClientError, ClientResult};

pub struct CaptureSession {
    id: u64,
    constraints: VideoConstraints,
    stream: Box<dyn MediaStream>,
}

impl CaptureSession {
    pub(crate) fn new(id: u64, constraints: VideoConstraints, stream: Box<dyn MediaStream>) -> Self {
        info!(
            session = id,
            %constraints,
            track = %stream.label(),
            "capture session opened"
        );
        Self {
            id,
            constraints,
            stream,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Constraints that the stream was finally granted with.
    pub fn constraints(&self) -> &VideoConstraints {
        &self.constraints
    }

    pub fn video_size(&self) -> (u32, u32) {
        self.stream.video_size()
    }

    /// Copy the frame currently shown by the stream.
    pub fn grab_frame(&mut self) -> ClientResult<RgbaImage> {
        if !self.stream.is_live() {
            return Err(ClientError::state(
                "ended",
                "grab_frame",
                "stream tracks already stopped",
            ));
        }
        self.stream.grab_frame()
    }

    /// Stop all tracks and give up ownership.
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stream.is_live() {
            self.stream.stop_tracks();
            info!(session = self.id, "capture session released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.stream.is_live() {
            debug!(session = self.id, "unreleased capture session dropped");
            self.stop();
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("constraints", &self.constraints)
            .field("live", &self.stream.is_live())
            .finish()
    }
}
