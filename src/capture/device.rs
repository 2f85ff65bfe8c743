//! Device/environment policy.
//!
//! Evaluated once at startup. Mobile browsers on an insecure origin (plain
//! HTTP on a LAN address) never get a camera stream, so the live-camera
//! control is replaced by one that opens the platform's native camera
//! through the file-selection path.

use std::sync::OnceLock;

use regex::Regex;

/// Capabilities of the environment the client runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// The platform exposes a camera-stream API.
    pub has_camera_api: bool,
    /// The page was served over a secure transport (HTTPS or localhost).
    pub is_secure_context: bool,
    /// The user agent identifies a phone or tablet.
    pub is_mobile: bool,
}

impl DeviceProfile {
    /// Build a profile from a user agent string and the two platform flags.
    pub fn detect(user_agent: &str, is_secure_context: bool, has_camera_api: bool) -> Self {
        Self {
            has_camera_api,
            is_secure_context,
            is_mobile: is_mobile_user_agent(user_agent),
        }
    }

    /// A secure desktop browser with a camera API.
    pub fn desktop() -> Self {
        Self {
            has_camera_api: true,
            is_secure_context: true,
            is_mobile: false,
        }
    }

    /// True when only the native camera chooser can take photos.
    pub fn needs_native_camera(&self) -> bool {
        self.is_mobile && !self.is_secure_context
    }

    /// Which controls to expose.
    pub fn layout(&self) -> ControlLayout {
        if self.needs_native_camera() {
            ControlLayout {
                camera_start_visible: false,
                desktop_upload_visible: false,
                mobile_scan_visible: true,
                mobile_banner: Some(MOBILE_BANNER),
            }
        } else {
            ControlLayout {
                camera_start_visible: true,
                desktop_upload_visible: true,
                mobile_scan_visible: false,
                mobile_banner: None,
            }
        }
    }
}

const MOBILE_BANNER: &str = "Mobile mode enabled";

/// Control visibility derived from a [`DeviceProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    pub camera_start_visible: bool,
    /// Start-camera / upload button group used on desktops.
    pub desktop_upload_visible: bool,
    /// Single "scan" button that opens the native camera chooser.
    pub mobile_scan_visible: bool,
    pub mobile_banner: Option<&'static str>,
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini")
            .expect("mobile user-agent pattern is valid")
    })
}

/// Recognise phone and tablet user agents.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    mobile_pattern().is_match(user_agent)
}
