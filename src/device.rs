//! Device handle management.
//!
//! Opens cameras through the provider, turns open outcomes into typed errors
//! and forwards runtime loss of an opened device to whoever asked for it.
//! Each open gets a generation number so late loss reports from a device
//! that has since been replaced can be recognised and ignored.

use crate::assert_invariant;
use crate::errors::CameraError;
use crate::permissions::PermissionGate;
use crate::platform::{CameraDevice, CameraProvider, DeviceLoss, DeviceStateNotifier, OpenOutcome};
use crate::types::{CameraId, DeviceCapabilities};
use std::sync::Arc;

/// An opened camera. Closed exactly once, explicitly or on drop.
pub struct DeviceHandle {
    id: CameraId,
    generation: u64,
    device: Box<dyn CameraDevice>,
    closed: bool,
}

impl DeviceHandle {
    pub fn id(&self) -> &CameraId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn device(&self) -> &dyn CameraDevice {
        self.device.as_ref()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::info!("Closing camera device {}", self.id);
        self.device.close();
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .finish()
    }
}

pub struct DeviceHandleManager {
    provider: Arc<dyn CameraProvider>,
    permissions: Arc<dyn PermissionGate>,
    generation: u64,
    in_flight: Option<CameraId>,
}

impl DeviceHandleManager {
    pub fn new(provider: Arc<dyn CameraProvider>, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            provider,
            permissions,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn capabilities(&self, id: &CameraId) -> Result<DeviceCapabilities, CameraError> {
        self.provider.capabilities(id)
    }

    /// Open `id`, failing fast on missing permission or a missing camera id.
    ///
    /// `on_lost` runs at most once, on a tokio task, if the device dies after
    /// opening. It receives the generation of the handle it belongs to.
    pub async fn open<F>(&mut self, id: Option<&CameraId>, on_lost: F) -> Result<DeviceHandle, CameraError>
    where
        F: FnOnce(u64, DeviceLoss) + Send + 'static,
    {
        if !self.permissions.has_capture_permission() {
            return Err(CameraError::PermissionDenied);
        }
        let id = id.ok_or(CameraError::NoCameraSelected)?;

        assert_invariant!(
            self.in_flight.is_none(),
            "at most one device open attempt in flight",
            "device"
        );
        self.in_flight = Some(id.clone());
        self.generation += 1;
        let generation = self.generation;

        log::info!("Opening Camera {}...", id);
        let (notifier, lost) = DeviceStateNotifier::channel();
        let outcome = self.provider.open(id, notifier).await;
        self.in_flight = None;

        match outcome {
            OpenOutcome::Opened(device) => {
                log::info!("Successfully opened Camera {} (generation {})", id, generation);
                tokio::spawn(async move {
                    if let Ok(loss) = lost.await {
                        on_lost(generation, loss);
                    }
                });
                Ok(DeviceHandle {
                    id: id.clone(),
                    generation,
                    device,
                    closed: false,
                })
            }
            OpenOutcome::Disconnected => {
                log::warn!("Camera {} disconnected while opening", id);
                Err(CameraError::CameraDisconnected(id.clone()))
            }
            OpenOutcome::OpenFailed(code) => {
                log::error!("Failed to open Camera {}: {}", id, code);
                Err(CameraError::CameraOpenFailed {
                    identity: id.clone(),
                    reason: code,
                })
            }
        }
    }
}

/// Error surfaced when an opened device is lost
pub fn loss_error(id: &CameraId, loss: DeviceLoss) -> CameraError {
    match loss {
        DeviceLoss::Disconnected => CameraError::CameraDisconnected(id.clone()),
        DeviceLoss::Error(code) => CameraError::CameraOpenFailed {
            identity: id.clone(),
            reason: code,
        },
    }
}
