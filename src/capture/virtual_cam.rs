//! Virtual camera: plays a still raster as a live stream.
//!
//! Used by the `plantia capture` command to drive the live-capture path
//! from an image on disk, and by tests to script permission answers per
//! constraint set.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::Mutex;

use super::stream::{CameraDevice, CameraOpenError, MediaStream, VideoConstraints};
use crate::error::ClientResult;

/// How the virtual camera answers a stream request.
#[derive(Debug, Clone)]
pub enum OpenBehavior {
    Grant,
    Reject(CameraOpenError),
}

pub struct VirtualCamera {
    frame: Arc<RgbaImage>,
    has_api: bool,
    rear: OpenBehavior,
    fallback: OpenBehavior,
    open_delay: Option<Duration>,
    live_streams: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<VideoConstraints>>>,
}

impl VirtualCamera {
    /// A camera with both rear and default constraints granted.
    pub fn new(frame: RgbaImage) -> Self {
        Self {
            frame: Arc::new(frame),
            has_api: true,
            rear: OpenBehavior::Grant,
            fallback: OpenBehavior::Grant,
            open_delay: None,
            live_streams: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Behave like a platform without any camera-stream API.
    pub fn without_api(mut self) -> Self {
        self.has_api = false;
        self
    }

    /// Answer for requests that ask for a facing mode.
    pub fn with_rear(mut self, behavior: OpenBehavior) -> Self {
        self.rear = behavior;
        self
    }

    /// Answer for requests without a facing mode.
    pub fn with_fallback(mut self, behavior: OpenBehavior) -> Self {
        self.fallback = behavior;
        self
    }

    /// Delay every answer, simulating a permission prompt.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Number of streams whose tracks are still running.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    /// Shared counter of running streams, readable after the camera has been moved.
    pub fn live_stream_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_streams)
    }

    /// Log of constraint sets requested so far.
    pub fn request_log(&self) -> Arc<Mutex<Vec<VideoConstraints>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl CameraDevice for VirtualCamera {
    fn has_stream_api(&self) -> bool {
        self.has_api
    }

    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraOpenError> {
        self.requests.lock().push(constraints.clone());
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let behavior = if constraints.facing_mode.is_some() {
            &self.rear
        } else {
            &self.fallback
        };
        match behavior {
            OpenBehavior::Reject(err) => Err(err.clone()),
            OpenBehavior::Grant => {
                self.live_streams.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(VirtualStream {
                    frame: Arc::clone(&self.frame),
                    live: true,
                    live_streams: Arc::clone(&self.live_streams),
                    label: format!("virtual camera ({})", constraints),
                }))
            }
        }
    }
}

struct VirtualStream {
    frame: Arc<RgbaImage>,
    live: bool,
    live_streams: Arc<AtomicUsize>,
    label: String,
}

impl MediaStream for VirtualStream {
    fn video_size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn grab_frame(&mut self) -> ClientResult<RgbaImage> {
        Ok(self.frame.as_ref().clone())
    }

    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
