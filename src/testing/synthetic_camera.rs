//! In-memory camera stack.
//!
//! `SyntheticCameraProvider` implements the platform traits and records every
//! hardware-level call in a `HardwareLog`, so tests can assert on ordering
//! (session closed before the next one is created, and so on). Frames and
//! photos are produced on demand with `push_frames` and `capture_photo`.

use super::synthetic_data::{synthetic_capabilities, synthetic_image};
use crate::errors::{CameraError, DeviceErrorCode};
use crate::platform::{
    CameraDevice, CameraProvider, CaptureRequest, DeviceStateNotifier, OpenOutcome, OutputTarget,
    PlatformOutput, PlatformSession, SessionFailure,
};
use crate::session::ImageWriteError;
use crate::types::{CameraId, DeviceCapabilities, OutputDescriptor, OutputPurpose};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    Open,
    Disconnect,
    Fail(DeviceErrorCode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBehavior {
    Accept,
    /// Reject sessions whose video and photo outputs differ in resolution
    RejectMixedResolutions,
    AlwaysReject,
    Fail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    DeviceOpened { camera: CameraId, device: u64 },
    DeviceClosed { device: u64 },
    SessionCreated { device: u64, session: u64, outputs: Vec<OutputDescriptor> },
    SessionRejected { device: u64, reason: String },
    RepeatingRequest { session: u64, request: CaptureRequest },
    SessionClosed { session: u64 },
}

/// Ordered record of hardware calls, shared by every clone
#[derive(Debug, Clone, Default)]
pub struct HardwareLog {
    events: Arc<Mutex<Vec<HardwareEvent>>>,
}

impl HardwareLog {
    fn record(&self, event: HardwareEvent) {
        log::debug!("hardware: {:?}", event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<HardwareEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&HardwareEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(*e)).count()
    }

    /// Index of the first event matching `predicate`
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&HardwareEvent) -> bool,
    {
        self.events().iter().position(|e| predicate(e))
    }

    pub fn sessions_created(&self) -> Vec<Vec<OutputDescriptor>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HardwareEvent::SessionCreated { outputs, .. } => Some(outputs),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

struct CameraEntry {
    id: CameraId,
    capabilities: DeviceCapabilities,
    open: OpenBehavior,
    session: SessionBehavior,
}

struct DeviceSlot {
    camera: CameraId,
    serial: u64,
    notifier: Mutex<Option<DeviceStateNotifier>>,
    closed: AtomicBool,
}

struct SessionSlot {
    serial: u64,
    device: u64,
    outputs: Vec<PlatformOutput>,
    request: Mutex<Option<CaptureRequest>>,
    closed: AtomicBool,
}

impl SessionSlot {
    fn close(&self, log: &HardwareLog) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log.record(HardwareEvent::SessionClosed { session: self.serial });
        }
    }

    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Inner {
    cameras: Mutex<Vec<CameraEntry>>,
    devices: Mutex<Vec<Arc<DeviceSlot>>>,
    sessions: Mutex<Vec<Arc<SessionSlot>>>,
    log: HardwareLog,
    serials: AtomicU64,
    sequence: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn next_serial(&self) -> u64 {
        self.serials.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn camera<R>(&self, id: &CameraId, read: impl FnOnce(&CameraEntry) -> R) -> Option<R> {
        let cameras = self.cameras.lock().ok()?;
        cameras.iter().find(|c| &c.id == id).map(read)
    }

    fn live_sessions(&self) -> Vec<Arc<SessionSlot>> {
        self.sessions
            .lock()
            .map(|sessions| sessions.iter().filter(|s| s.is_live()).cloned().collect())
            .unwrap_or_default()
    }

    fn live_device(&self, camera: &str) -> Option<Arc<DeviceSlot>> {
        let devices = self.devices.lock().ok()?;
        devices
            .iter()
            .rev()
            .find(|d| d.camera.as_str() == camera && !d.closed.load(Ordering::Acquire))
            .cloned()
    }
}

#[derive(Clone, Default)]
pub struct SyntheticCameraProvider {
    inner: Arc<Inner>,
}

impl SyntheticCameraProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// One back camera with id "0"
    pub fn with_default_camera() -> Self {
        Self::new().with_camera("0", synthetic_capabilities())
    }

    pub fn with_camera(self, id: &str, capabilities: DeviceCapabilities) -> Self {
        if let Ok(mut cameras) = self.inner.cameras.lock() {
            cameras.push(CameraEntry {
                id: CameraId::new(id),
                capabilities,
                open: OpenBehavior::Open,
                session: SessionBehavior::Accept,
            });
        }
        self
    }

    pub fn set_open_behavior(&self, id: &str, behavior: OpenBehavior) {
        self.update_camera(id, |camera| camera.open = behavior);
    }

    pub fn set_session_behavior(&self, id: &str, behavior: SessionBehavior) {
        self.update_camera(id, move |camera| camera.session = behavior);
    }

    fn update_camera(&self, id: &str, update: impl FnOnce(&mut CameraEntry)) {
        if let Ok(mut cameras) = self.inner.cameras.lock() {
            if let Some(camera) = cameras.iter_mut().find(|c| c.id.as_str() == id) {
                update(camera);
            }
        }
    }

    pub fn capabilities_of(&self, id: &str) -> Option<DeviceCapabilities> {
        self.inner.camera(&CameraId::new(id), |c| c.capabilities.clone())
    }

    pub fn log(&self) -> HardwareLog {
        self.inner.log.clone()
    }

    /// Simulate unplugging an open camera. Returns false if it was not open.
    pub fn disconnect(&self, id: &str) -> bool {
        self.notify_device(id, |notifier| notifier.disconnected())
    }

    /// Simulate a fatal device error on an open camera
    pub fn fail_device(&self, id: &str, code: DeviceErrorCode) -> bool {
        self.notify_device(id, |notifier| notifier.error(code))
    }

    fn notify_device(&self, id: &str, notify: impl FnOnce(&DeviceStateNotifier)) -> bool {
        let Some(device) = self.inner.live_device(id) else {
            return false;
        };
        let notifier = device.notifier.lock().ok().and_then(|mut n| n.take());
        match notifier {
            Some(notifier) => {
                notify(&notifier);
                true
            }
            None => false,
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.live_sessions().len()
    }

    pub fn open_devices(&self) -> usize {
        self.inner
            .devices
            .lock()
            .map(|d| d.iter().filter(|d| !d.closed.load(Ordering::Acquire)).count())
            .unwrap_or(0)
    }

    /// Frames rejected because every buffer of an output was in use
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Produce `count` rounds of images into every output targeted by a live
    /// continuous request. Returns how many images were accepted.
    pub fn push_frames(&self, count: usize) -> usize {
        let mut accepted = 0;
        for _ in 0..count {
            for session in self.inner.live_sessions() {
                let targets = session
                    .request
                    .lock()
                    .ok()
                    .and_then(|r| r.as_ref().map(|r| r.targets.clone()))
                    .unwrap_or_default();
                for output in session.outputs.iter().filter(|o| targets.contains(&o.id)) {
                    if self.emit(output) {
                        accepted += 1;
                    }
                }
            }
        }
        accepted
    }

    /// Produce one image into every photo output of the live sessions
    pub fn capture_photo(&self) -> bool {
        let mut captured = false;
        for session in self.inner.live_sessions() {
            for output in session
                .outputs
                .iter()
                .filter(|o| o.descriptor.purpose == OutputPurpose::Photo)
            {
                captured |= self.emit(output);
            }
        }
        captured
    }

    fn emit(&self, output: &PlatformOutput) -> bool {
        let (OutputTarget::Images(writer), Some(size)) = (&output.target, output.descriptor.size()) else {
            return false;
        };
        let format = match output.descriptor.surface {
            crate::types::SurfaceRef::Image { format, .. } => format,
            crate::types::SurfaceRef::Preview(_) => return false,
        };

        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        match writer.queue_image(synthetic_image(sequence, size, format)) {
            Ok(()) => true,
            Err(ImageWriteError::BufferFull) => {
                log::warn!(
                    "All buffers of {} output {:?} are in use, dropping a frame",
                    output.descriptor.purpose,
                    output.id
                );
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(ImageWriteError::Closed) => false,
        }
    }
}

#[async_trait]
impl CameraProvider for SyntheticCameraProvider {
    fn camera_ids(&self) -> Vec<CameraId> {
        self.inner
            .cameras
            .lock()
            .map(|cameras| cameras.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default()
    }

    fn capabilities(&self, id: &CameraId) -> Result<DeviceCapabilities, CameraError> {
        self.inner
            .camera(id, |c| c.capabilities.clone())
            .ok_or_else(|| CameraError::CameraDisconnected(id.clone()))
    }

    async fn open(&self, id: &CameraId, notifier: DeviceStateNotifier) -> OpenOutcome {
        // Opening completes on a later callback, never inline
        tokio::task::yield_now().await;

        let Some(behavior) = self.inner.camera(id, |c| c.open) else {
            return OpenOutcome::Disconnected;
        };

        match behavior {
            OpenBehavior::Open => {
                let slot = Arc::new(DeviceSlot {
                    camera: id.clone(),
                    serial: self.inner.next_serial(),
                    notifier: Mutex::new(Some(notifier)),
                    closed: AtomicBool::new(false),
                });
                self.inner.log.record(HardwareEvent::DeviceOpened {
                    camera: id.clone(),
                    device: slot.serial,
                });
                if let Ok(mut devices) = self.inner.devices.lock() {
                    devices.retain(|d| !d.closed.load(Ordering::Acquire));
                    devices.push(Arc::clone(&slot));
                }
                OpenOutcome::Opened(Box::new(SyntheticDevice {
                    slot,
                    inner: Arc::clone(&self.inner),
                }))
            }
            OpenBehavior::Disconnect => OpenOutcome::Disconnected,
            OpenBehavior::Fail(code) => OpenOutcome::OpenFailed(code),
        }
    }
}

struct SyntheticDevice {
    slot: Arc<DeviceSlot>,
    inner: Arc<Inner>,
}

impl SyntheticDevice {
    fn check_combination(&self, behavior: &SessionBehavior, outputs: &[PlatformOutput]) -> Result<(), SessionFailure> {
        match behavior {
            SessionBehavior::Accept => Ok(()),
            SessionBehavior::AlwaysReject => {
                Err(SessionFailure::Rejected("output combination not supported".to_string()))
            }
            SessionBehavior::Fail(reason) => Err(SessionFailure::Failed(reason.clone())),
            SessionBehavior::RejectMixedResolutions => {
                let size_of = |purpose: OutputPurpose| {
                    outputs
                        .iter()
                        .find(|o| o.descriptor.purpose == purpose)
                        .and_then(|o| o.descriptor.size())
                };
                match (size_of(OutputPurpose::Video), size_of(OutputPurpose::Photo)) {
                    (Some(video), Some(photo)) if video != photo => Err(SessionFailure::Rejected(format!(
                        "video {} cannot stream alongside photo {}",
                        video, photo
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }
}

#[async_trait]
impl CameraDevice for SyntheticDevice {
    fn id(&self) -> &CameraId {
        &self.slot.camera
    }

    async fn create_capture_session(
        &self,
        outputs: Vec<PlatformOutput>,
    ) -> Result<Box<dyn PlatformSession>, SessionFailure> {
        tokio::task::yield_now().await;

        if self.slot.closed.load(Ordering::Acquire) {
            return Err(SessionFailure::Failed(format!("Camera {} is closed", self.slot.camera)));
        }

        let behavior = self
            .inner
            .camera(&self.slot.camera, |c| c.session.clone())
            .unwrap_or(SessionBehavior::Accept);

        if let Err(failure) = self.check_combination(&behavior, &outputs) {
            let reason = match &failure {
                SessionFailure::Rejected(reason) | SessionFailure::Failed(reason) => reason.clone(),
            };
            self.inner.log.record(HardwareEvent::SessionRejected {
                device: self.slot.serial,
                reason,
            });
            return Err(failure);
        }

        let slot = Arc::new(SessionSlot {
            serial: self.inner.next_serial(),
            device: self.slot.serial,
            outputs,
            request: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        self.inner.log.record(HardwareEvent::SessionCreated {
            device: self.slot.serial,
            session: slot.serial,
            outputs: slot.outputs.iter().map(|o| o.descriptor).collect(),
        });
        if let Ok(mut sessions) = self.inner.sessions.lock() {
            sessions.retain(|s| s.is_live());
            sessions.push(Arc::clone(&slot));
        }

        Ok(Box::new(SyntheticSession {
            slot,
            log: self.inner.log.clone(),
        }))
    }

    fn close(&self) {
        if self.slot.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Closing a device tears down whatever session is still running on it
        for session in self.inner.live_sessions() {
            if session.device == self.slot.serial {
                session.close(&self.inner.log);
            }
        }
        if let Ok(mut notifier) = self.slot.notifier.lock() {
            notifier.take();
        }
        self.inner.log.record(HardwareEvent::DeviceClosed {
            device: self.slot.serial,
        });
    }
}

struct SyntheticSession {
    slot: Arc<SessionSlot>,
    log: HardwareLog,
}

impl PlatformSession for SyntheticSession {
    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        if !self.slot.is_live() {
            return Err(CameraError::SessionFailed(format!(
                "Capture session {} is closed",
                self.slot.serial
            )));
        }
        self.log.record(HardwareEvent::RepeatingRequest {
            session: self.slot.serial,
            request: request.clone(),
        });
        if let Ok(mut current) = self.slot.request.lock() {
            *current = Some(request.clone());
        }
        Ok(())
    }

    fn close(&self) {
        self.slot.close(&self.log);
    }
}
