use crate::types::CameraId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors surfaced to the view layer through `ViewListener::on_error`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera permission denied: capture permission has not been granted")]
    PermissionDenied,
    #[error("No camera device selected")]
    NoCameraSelected,
    #[error("Camera {0} has been disconnected")]
    CameraDisconnected(CameraId),
    #[error("Camera {identity} could not be opened: {reason}")]
    CameraOpenFailed {
        identity: CameraId,
        reason: DeviceErrorCode,
    },
    #[error("Capture session configuration rejected: {0}")]
    ConfigurationRejected(String),
    #[error("Unrecognized orientation value: {0}")]
    UnrecognizedOrientationValue(String),
    #[error("No usable output format: {0}")]
    FormatUnavailable(String),
    #[error("Capture session error: {0}")]
    SessionFailed(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::PermissionDenied => ErrorKind::PermissionDenied,
            CameraError::NoCameraSelected => ErrorKind::NoCameraSelected,
            CameraError::CameraDisconnected(_) => ErrorKind::CameraDisconnected,
            CameraError::CameraOpenFailed { .. } => ErrorKind::CameraOpenFailed,
            CameraError::ConfigurationRejected(_) => ErrorKind::ConfigurationRejected,
            CameraError::UnrecognizedOrientationValue(_) => ErrorKind::UnrecognizedOrientationValue,
            CameraError::FormatUnavailable(_) => ErrorKind::FormatUnavailable,
            CameraError::SessionFailed(_) => ErrorKind::SessionFailed,
            CameraError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Only a rejected output combination may be retried, and only once
    pub fn is_retryable(&self) -> bool {
        matches!(self, CameraError::ConfigurationRejected(_))
    }
}

/// Structured error category reported alongside the error detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    NoCameraSelected,
    CameraDisconnected,
    CameraOpenFailed,
    ConfigurationRejected,
    UnrecognizedOrientationValue,
    FormatUnavailable,
    SessionFailed,
    InvalidConfig,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission/camera-permission-denied",
            ErrorKind::NoCameraSelected => "device/no-device",
            ErrorKind::CameraDisconnected => "device/camera-disconnected",
            ErrorKind::CameraOpenFailed => "device/camera-cannot-be-opened",
            ErrorKind::ConfigurationRejected => "session/configuration-rejected",
            ErrorKind::UnrecognizedOrientationValue => "parameter/invalid-orientation",
            ErrorKind::FormatUnavailable => "format/unavailable",
            ErrorKind::SessionFailed => "session/unknown",
            ErrorKind::InvalidConfig => "system/invalid-config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error codes a camera device reports when it fails to open or dies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceErrorCode {
    CameraInUse,
    MaxCamerasInUse,
    CameraDisabled,
    DeviceError,
    ServiceError,
    Unknown(i32),
}

impl DeviceErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DeviceErrorCode::CameraInUse,
            2 => DeviceErrorCode::MaxCamerasInUse,
            3 => DeviceErrorCode::CameraDisabled,
            4 => DeviceErrorCode::DeviceError,
            5 => DeviceErrorCode::ServiceError,
            other => DeviceErrorCode::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceErrorCode::CameraInUse => "camera-already-in-use",
            DeviceErrorCode::MaxCamerasInUse => "too-many-open-cameras",
            DeviceErrorCode::CameraDisabled => "camera-is-disabled-by-android",
            DeviceErrorCode::DeviceError => "unknown-camera-device-error",
            DeviceErrorCode::ServiceError => "unknown-fatal-camera-service-error",
            DeviceErrorCode::Unknown(_) => "unknown-error",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceErrorCode::Unknown(code) => write!(f, "{} ({})", self.as_str(), code),
            _ => f.write_str(self.as_str()),
        }
    }
}
