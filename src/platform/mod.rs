//! Hardware seams.
//!
//! The orchestrator never talks to a camera stack directly. A host supplies a
//! `CameraProvider`; everything the provider opens is driven through the
//! `CameraDevice` and `PlatformSession` traits. `crate::testing` ships a
//! synthetic implementation.

use crate::errors::CameraError;
use crate::orientation::Rotation;
use crate::session::ImageWriter;
use crate::types::{CameraId, DeviceCapabilities, OutputDescriptor, SurfaceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::oneshot;

pub use crate::errors::DeviceErrorCode;

/// Result of asking the provider to open a camera
pub enum OpenOutcome {
    Opened(Box<dyn CameraDevice>),
    /// The device went away before it finished opening
    Disconnected,
    OpenFailed(DeviceErrorCode),
}

impl std::fmt::Debug for OpenOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenOutcome::Opened(device) => write!(f, "Opened({})", device.id()),
            OpenOutcome::Disconnected => write!(f, "Disconnected"),
            OpenOutcome::OpenFailed(code) => write!(f, "OpenFailed({})", code),
        }
    }
}

/// How an open device stopped working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceLoss {
    Disconnected,
    Error(DeviceErrorCode),
}

/// One-shot channel a provider uses to report that an opened device died.
///
/// Dropping the notifier without reporting means the device closed normally.
#[derive(Debug)]
pub struct DeviceStateNotifier {
    tx: Mutex<Option<oneshot::Sender<DeviceLoss>>>,
}

impl DeviceStateNotifier {
    pub fn channel() -> (Self, oneshot::Receiver<DeviceLoss>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn disconnected(&self) {
        self.report(DeviceLoss::Disconnected);
    }

    pub fn error(&self, code: DeviceErrorCode) {
        self.report(DeviceLoss::Error(code));
    }

    /// Only the first report is delivered
    pub fn report(&self, loss: DeviceLoss) {
        let sender = self.tx.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(loss);
        }
    }
}

#[async_trait]
pub trait CameraProvider: Send + Sync {
    fn camera_ids(&self) -> Vec<CameraId>;

    /// Fresh capabilities for one camera; callers never cache these across opens
    fn capabilities(&self, id: &CameraId) -> Result<DeviceCapabilities, CameraError>;

    async fn open(&self, id: &CameraId, notifier: DeviceStateNotifier) -> OpenOutcome;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn id(&self) -> &CameraId;

    /// Create a session over exactly these outputs. All or nothing: on failure
    /// no output is kept.
    async fn create_capture_session(
        &self,
        outputs: Vec<PlatformOutput>,
    ) -> Result<Box<dyn PlatformSession>, SessionFailure>;

    fn close(&self);
}

pub trait PlatformSession: Send + Sync {
    /// Replace the continuous request
    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), CameraError>;

    fn close(&self);
}

/// Why a session could not be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The device cannot stream this combination of outputs
    Rejected(String),
    Failed(String),
}

impl From<SessionFailure> for CameraError {
    fn from(failure: SessionFailure) -> Self {
        match failure {
            SessionFailure::Rejected(reason) => CameraError::ConfigurationRejected(reason),
            SessionFailure::Failed(reason) => CameraError::SessionFailed(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId(pub u32);

#[derive(Debug, Clone)]
pub enum OutputTarget {
    Surface(SurfaceId),
    Images(ImageWriter),
}

/// An output as handed to the platform
#[derive(Debug, Clone)]
pub struct PlatformOutput {
    pub id: OutputId,
    pub descriptor: OutputDescriptor,
    pub target: OutputTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTemplate {
    Preview,
    Record,
    /// Caller controls every parameter
    Manual,
}

/// Continuous capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<OutputId>,
    pub zoom: f32,
    pub torch: bool,
    pub output_rotation: Rotation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_reports_once() {
        let (notifier, mut rx) = DeviceStateNotifier::channel();
        notifier.error(DeviceErrorCode::CameraInUse);
        notifier.disconnected();
        assert_eq!(rx.try_recv().unwrap(), DeviceLoss::Error(DeviceErrorCode::CameraInUse));
    }

    #[test]
    fn test_dropped_notifier_closes_channel() {
        let (notifier, mut rx) = DeviceStateNotifier::channel();
        drop(notifier);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_session_failure_maps_to_error() {
        let rejected: CameraError = SessionFailure::Rejected("combo".into()).into();
        assert!(rejected.is_retryable());
        let failed: CameraError = SessionFailure::Failed("gone".into()).into();
        assert!(!failed.is_retryable());
    }
}
