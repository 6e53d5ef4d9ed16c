//! Camera view orchestration.
//!
//! `CameraView` is the host-facing handle. It owns the property bag and turns
//! every change batch, surface event and device callback into a command for
//! the lifecycle worker, which processes them strictly one at a time.

mod props;
mod worker;

pub use props::{CameraProps, ChangePlan, FormatProps, PreviewType, TorchMode, SESSION_PROPS};

use crate::config::NegotiationConfig;
use crate::delivery::{FrameDispatcher, FrameSink, PhotoDispatcher, SerialQueue, FRAME_QUEUE_NAME};
use crate::device::DeviceHandleManager;
use crate::errors::CameraError;
use crate::orientation::Rotation;
use crate::permissions::PermissionGate;
use crate::platform::{CameraProvider, DeviceLoss};
use crate::session::{ConfigurationState, ImageReader, SessionBuilder};
use crate::types::{CameraId, OutputDescriptor, SurfaceId};
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use worker::LifecycleWorker;

/// Outcome notifications for the view layer.
///
/// Called from the lifecycle worker; each configuration pass produces at most
/// one call.
pub trait ViewListener: Send + Sync {
    fn on_initialized(&self);
    fn on_error(&self, error: &CameraError);
}

/// Listener that only logs, for hosts that poll `status()` instead
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ViewListener for LoggingListener {
    fn on_initialized(&self) {
        log::info!("Camera view initialized");
    }

    fn on_error(&self, error: &CameraError) {
        log::error!("Camera view error [{}]: {}", error.kind(), error);
    }
}

/// Observable state of a view, published by the lifecycle worker
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewStatus {
    pub state: ConfigurationState,
    /// States visited by the most recent configuration pass
    pub last_pass: Vec<ConfigurationState>,
    pub passes: u64,
    /// Build attempts made by the most recent pass (1 or 2)
    pub build_attempts: u32,
    pub camera_id: Option<CameraId>,
    pub session_id: Option<Uuid>,
    pub outputs: Vec<OutputDescriptor>,
    pub repeating_outputs: usize,
    pub output_rotation: Rotation,
    pub zoom: f32,
    pub torch: bool,
    pub preview_surface: Option<SurfaceId>,
}

pub(crate) enum Command {
    Update {
        props: CameraProps,
        changed: Vec<String>,
    },
    SurfaceCreated {
        surface: SurfaceId,
        props: CameraProps,
    },
    SurfaceDestroyed,
    DisplayRotation(Rotation),
    DeviceLost {
        generation: u64,
        loss: DeviceLoss,
    },
    PhotoAvailable(Weak<ImageReader>),
    Barrier(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

pub struct CameraView {
    commands: mpsc::UnboundedSender<Command>,
    props: Mutex<CameraProps>,
    status: Arc<RwLock<ViewStatus>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CameraView {
    /// Create a view and start its lifecycle worker. Must be called from
    /// within a tokio runtime.
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionGate>,
        sink: Arc<dyn FrameSink>,
        listener: Arc<dyn ViewListener>,
        negotiation: NegotiationConfig,
    ) -> Result<Self, CameraError> {
        Self::with_props(provider, permissions, sink, listener, negotiation, CameraProps::default())
    }

    /// Like `new`, starting from an initial property bag (usually from config)
    pub fn with_props(
        provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionGate>,
        sink: Arc<dyn FrameSink>,
        listener: Arc<dyn ViewListener>,
        negotiation: NegotiationConfig,
        props: CameraProps,
    ) -> Result<Self, CameraError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let frame_queue = Arc::new(SerialQueue::new(FRAME_QUEUE_NAME)?);

        let photo_commands = tx.downgrade();
        let photos = PhotoDispatcher::new(move |reader| {
            if let Some(commands) = photo_commands.upgrade() {
                let _ = commands.send(Command::PhotoAvailable(reader));
            }
        });
        let builder = SessionBuilder::new(FrameDispatcher::new(frame_queue, sink), photos);

        let status = Arc::new(RwLock::new(ViewStatus {
            zoom: props.zoom,
            ..Default::default()
        }));

        let worker = LifecycleWorker::new(
            DeviceHandleManager::new(provider, permissions),
            builder,
            listener,
            negotiation,
            Arc::clone(&status),
            tx.downgrade(),
        );
        let handle = tokio::spawn(worker.run(rx));

        Ok(Self {
            commands: tx,
            props: Mutex::new(props),
            status,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Current property values
    pub fn props(&self) -> CameraProps {
        self.props
            .lock()
            .map(|props| props.clone())
            .unwrap_or_default()
    }

    /// Mutate properties without applying them
    pub fn set_props<F>(&self, update: F)
    where
        F: FnOnce(&mut CameraProps),
    {
        if let Ok(mut props) = self.props.lock() {
            update(&mut props);
        }
    }

    /// Apply a batch of changed property names.
    ///
    /// The properties are snapshotted now; later mutations do not affect the
    /// queued work.
    pub fn apply_changes<I, S>(&self, changed: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changed: Vec<String> = changed.into_iter().map(Into::into).collect();
        log::debug!("Props changed: {:?}", changed);
        self.send(Command::Update {
            props: self.props(),
            changed,
        });
    }

    /// The preview surface is ready; configures a session if a camera is selected
    pub fn preview_surface_created(&self, surface: SurfaceId) {
        self.send(Command::SurfaceCreated {
            surface,
            props: self.props(),
        });
    }

    pub fn preview_surface_destroyed(&self) {
        self.send(Command::SurfaceDestroyed);
    }

    /// Display rotation used when no explicit orientation is set
    pub fn set_display_rotation(&self, rotation: Rotation) {
        self.send(Command::DisplayRotation(rotation));
    }

    pub async fn status(&self) -> ViewStatus {
        self.status.read().await.clone()
    }

    /// Wait until every command queued before this call has been processed
    pub async fn wait_idle(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Close any session and device, then stop the worker
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Lifecycle worker ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::warn!("Camera view has shut down, ignoring command");
        }
    }
}
