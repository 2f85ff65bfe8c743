//! # Error Handling
//!
//! One error type covers every failure domain of the client: camera
//! acquisition, bitmap decode/encode, the prediction exchange, and offline
//! cache installation. Each variant carries an [`ErrorContext`] with the
//! operation being performed, free-form context, a recovery suggestion that
//! is safe to show to the user, and a severity.
//!
//! ## Propagation Policy
//!
//! Every failure is terminal for the action that triggered it. Nothing in
//! this crate retries: errors are caught at the asynchronous boundary,
//! turned into a single user notice by the controller, and the controls
//! that let the user try an alternative path are re-enabled.
//!
//! ## Usage
//!
//! ```rust
//! use plantia_client::error::{ClientError, HasRecoverySuggestion};
//!
//! let error = ClientError::transport("predict", "connection refused")
//!     .with_context("POST http://127.0.0.1:5000/predict");
//!
//! assert_eq!(error.category(), "transport");
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use crate::controller::Notice;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational; the action took an alternative path
    Info,
    /// The action failed but the user has an obvious alternative
    Warning,
    /// The action failed
    Error,
    /// The component cannot continue (e.g. worker not activated)
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action, phrased for the end user
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::BTreeMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::BTreeMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn suggesting(suggestion: &str, severity: ErrorSeverity) -> Self {
        Self {
            recovery_suggestion: Some(suggestion.to_string()),
            severity,
            ..Self::default()
        }
    }
}

/// Whether a camera failure came from a permission refusal or from anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFailureKind {
    /// The user or the platform refused permission
    Denied,
    /// Hardware missing, busy, or constraints not satisfiable
    Hardware,
}

/// Base error type for the client
#[derive(Debug)]
pub enum ClientError {
    /// The platform has no camera-stream capability at all
    CameraUnavailable { context: ErrorContext },
    /// Both constraint attempts were refused by permission policy
    CameraDenied { reason: String, context: ErrorContext },
    /// Both constraint attempts failed for a non-permission reason
    Camera { reason: String, context: ErrorContext },
    /// A picked file could not be decoded into a bitmap
    Decode { reason: String, context: ErrorContext },
    /// The drawn surface could not be exported as JPEG
    Encode { reason: String, context: ErrorContext },
    /// Network failure, non-success status, or malformed response body
    Transport {
        operation: String,
        status: Option<u16>,
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// A manifest URL could not be cached; the install was rolled back
    CacheInstall {
        cache: String,
        url: String,
        reason: String,
        context: ErrorContext,
    },
    /// Operation not valid in the current state
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl ClientError {
    /// Create a camera-unavailable error
    pub fn camera_unavailable() -> Self {
        Self::CameraUnavailable {
            context: ErrorContext::suggesting(
                "Direct camera access is blocked without HTTPS; use the system camera through the file picker.",
                ErrorSeverity::Info,
            ),
        }
    }

    /// Create a camera error from the last failed attempt
    pub fn camera(kind: CameraFailureKind, reason: impl Into<String>) -> Self {
        let context = ErrorContext::suggesting(
            "Use the 'Upload image' button to take a photo directly.",
            ErrorSeverity::Warning,
        );
        match kind {
            CameraFailureKind::Denied => Self::CameraDenied {
                reason: reason.into(),
                context,
            },
            CameraFailureKind::Hardware => Self::Camera {
                reason: reason.into(),
                context,
            },
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
            context: ErrorContext::suggesting(
                "Close other apps or take the photo at a lower resolution.",
                ErrorSeverity::Warning,
            ),
        }
    }

    /// Create an encode error
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
            context: ErrorContext::suggesting(
                "Try again with a smaller image.",
                ErrorSeverity::Warning,
            ),
        }
    }

    /// Create a transport error
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            status: None,
            reason: reason.into(),
            source: None,
            context: ErrorContext::suggesting(
                "Check the connection to the prediction service and try again.",
                ErrorSeverity::Error,
            ),
        }
    }

    /// Create a transport error for a non-success HTTP status
    pub fn http_status(operation: impl Into<String>, status: u16) -> Self {
        match Self::transport(operation, format!("server answered with status {}", status)) {
            Self::Transport {
                operation,
                reason,
                source,
                context,
                ..
            } => Self::Transport {
                operation,
                status: Some(status),
                reason,
                source,
                context,
            },
            other => other,
        }
    }

    /// Create a transport error wrapping a lower-level cause
    pub fn transport_source(
        operation: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        let reason = source.to_string();
        match Self::transport(operation, reason) {
            Self::Transport {
                operation,
                status,
                reason,
                context,
                ..
            } => Self::Transport {
                operation,
                status,
                reason,
                source: Some(Box::new(source)),
                context,
            },
            other => other,
        }
    }

    /// Create a cache install error
    pub fn cache_install(
        cache: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CacheInstall {
            cache: cache.into(),
            url: url.into(),
            reason: reason.into(),
            context: ErrorContext::suggesting(
                "Offline mode is unavailable until every asset can be fetched.",
                ErrorSeverity::Fatal,
            ),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error on a specific path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Replace the recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::CameraUnavailable { context } => context,
            Self::CameraDenied { context, .. } => context,
            Self::Camera { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Transport { context, .. } => context,
            Self::CacheInstall { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::CameraUnavailable { context } => context,
            Self::CameraDenied { context, .. } => context,
            Self::Camera { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Transport { context, .. } => context,
            Self::CacheInstall { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::CameraUnavailable { .. } => "camera_unavailable",
            Self::CameraDenied { .. } => "camera_denied",
            Self::Camera { .. } => "camera",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Transport { .. } => "transport",
            Self::CacheInstall { .. } => "cache_install",
            Self::State { .. } => "state",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }

    /// HTTP status for transport failures caused by a non-success answer.
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// One-shot message the page shows for this failure, if any.
    pub fn user_notice(&self) -> Option<Notice> {
        match self {
            Self::CameraUnavailable { .. } => Some(Notice::CompatibilityMode),
            Self::CameraDenied { .. } => Some(Notice::CameraFailed(CameraFailureKind::Denied)),
            Self::Camera { .. } => Some(Notice::CameraFailed(CameraFailureKind::Hardware)),
            Self::Decode { .. } => Some(Notice::LowMemory),
            Self::Encode { .. } => Some(Notice::ImageProcessingFailed),
            Self::Transport { .. } => Some(Notice::PredictionFailed),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::CameraUnavailable { .. } => {
                write!(f, "Camera stream API is not available on this platform")
            }
            ClientError::CameraDenied { reason, .. } => {
                write!(f, "Camera access denied: {}", reason)
            }
            ClientError::Camera { reason, .. } => write!(f, "Camera failed to start: {}", reason),
            ClientError::Decode { reason, .. } => write!(f, "Image decode failed: {}", reason),
            ClientError::Encode { reason, .. } => write!(f, "JPEG export failed: {}", reason),
            ClientError::Transport {
                operation,
                status,
                reason,
                ..
            } => {
                if let Some(status) = status {
                    write!(f, "Transport error during {} (HTTP {}): {}", operation, status, reason)
                } else {
                    write!(f, "Transport error during {}: {}", operation, reason)
                }
            }
            ClientError::CacheInstall {
                cache, url, reason, ..
            } => {
                write!(f, "Cache '{}' install aborted at {}: {}", cache, url, reason)
            }
            ClientError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Invalid operation '{}' in state '{}': {}",
                    attempted_operation, current_state, reason
                )
            }
            ClientError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            ClientError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(f, "I/O error during {} on '{}': {}", operation, path, source)
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            ClientError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Transport {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type ClientResult<T> = Result<T, ClientError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ClientError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for ClientError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for ClientError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<plantia_scale::cpu::ScaleError> for ClientError {
    fn from(error: plantia_scale::cpu::ScaleError) -> Self {
        Self::external("plantia-scale", error)
    }
}
