// # Capture Module
//
// Camera capability contracts, the owned capture session, the device policy
// evaluated at startup, and a virtual camera that plays a still image as a
// live stream.

pub mod device;
pub mod session;
pub mod stream;
pub mod virtual_cam;

pub use device::{ControlLayout, DeviceProfile};
pub use session::CaptureSession;
pub use stream::{CameraDevice, CameraOpenError, FacingMode, MediaStream, VideoConstraints};
pub use virtual_cam::{OpenBehavior, VirtualCamera};
