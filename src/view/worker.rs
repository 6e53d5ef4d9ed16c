use super::props::{CameraProps, ChangePlan, TorchMode};
use super::{Command, ViewListener, ViewStatus};
use crate::assert_invariant;
use crate::config::NegotiationConfig;
use crate::delivery::consume_photo;
use crate::device::{loss_error, DeviceHandle, DeviceHandleManager};
use crate::errors::CameraError;
use crate::negotiation::plan_outputs;
use crate::orientation::{output_rotation, Rotation};
use crate::platform::DeviceLoss;
use crate::session::{ActiveSession, Attempt, ConfigurationState, PassEvent, SessionBuilder, SessionControls};
use crate::types::{CameraId, DeviceCapabilities, SurfaceId};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Owns the device and session of one view. Runs every command to completion
/// before taking the next, so configuration passes never overlap.
pub(super) struct LifecycleWorker {
    devices: DeviceHandleManager,
    builder: SessionBuilder,
    listener: Arc<dyn ViewListener>,
    negotiation: NegotiationConfig,
    status: Arc<RwLock<ViewStatus>>,
    commands: mpsc::WeakUnboundedSender<Command>,

    props: CameraProps,
    state: ConfigurationState,
    pass: Vec<ConfigurationState>,
    passes: u64,
    build_attempts: u32,
    device: Option<DeviceHandle>,
    session: Option<ActiveSession>,
    capabilities: Option<DeviceCapabilities>,
    preview_surface: Option<SurfaceId>,
    display_rotation: Rotation,
    output_rotation: Rotation,
}

impl LifecycleWorker {
    pub(super) fn new(
        devices: DeviceHandleManager,
        builder: SessionBuilder,
        listener: Arc<dyn ViewListener>,
        negotiation: NegotiationConfig,
        status: Arc<RwLock<ViewStatus>>,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            devices,
            builder,
            listener,
            negotiation,
            status,
            commands,
            props: CameraProps::default(),
            state: ConfigurationState::Idle,
            pass: Vec::new(),
            passes: 0,
            build_attempts: 0,
            device: None,
            session: None,
            capabilities: None,
            preview_surface: None,
            display_rotation: Rotation::Rotation0,
            output_rotation: Rotation::Rotation0,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        log::debug!("Lifecycle worker started");

        while let Some(command) = commands.recv().await {
            match command {
                Command::Update { props, changed } => self.handle_update(props, &changed).await,
                Command::SurfaceCreated { surface, props } => {
                    log::info!("Preview surface {:?} created", surface);
                    self.preview_surface = Some(surface);
                    self.props = props;
                    if self.props.camera_id.is_some() {
                        let result = self.configure_session().await;
                        self.report(result);
                    }
                }
                Command::SurfaceDestroyed => {
                    log::info!("Preview surface destroyed");
                    self.preview_surface = None;
                }
                Command::DisplayRotation(rotation) => self.handle_display_rotation(rotation),
                Command::DeviceLost { generation, loss } => self.handle_device_lost(generation, loss),
                Command::PhotoAvailable(reader) => {
                    let _ = consume_photo(&reader);
                }
                Command::Barrier(done) => {
                    let _ = done.send(());
                }
                Command::Shutdown(done) => {
                    self.teardown();
                    self.publish().await;
                    let _ = done.send(());
                    break;
                }
            }
            self.publish().await;
        }

        self.teardown();
        self.publish().await;
        log::debug!("Lifecycle worker stopped");
    }

    async fn handle_update(&mut self, props: CameraProps, changed: &[String]) {
        let plan = ChangePlan::classify(changed);
        self.props = props;

        let rotation = if plan.update_orientation {
            Some(self.resolve_output_rotation())
        } else {
            None
        };
        let rotation_changed = match rotation {
            Some(Ok(rotation)) if rotation != self.output_rotation => {
                self.output_rotation = rotation;
                true
            }
            _ => false,
        };

        if plan.reconfigure_session {
            let result = self.configure_session().await;
            self.report(result);
        } else if plan.update_zoom || plan.update_torch || rotation_changed {
            if let Err(e) = self.apply_controls() {
                self.report(Err(e));
            }
        }

        if let Some(Err(e)) = rotation {
            self.report(Err(e));
        }
    }

    fn handle_display_rotation(&mut self, rotation: Rotation) {
        self.display_rotation = rotation;
        if self.props.orientation.is_some() {
            return;
        }
        if self.output_rotation != rotation {
            self.output_rotation = rotation;
            if let Err(e) = self.apply_controls() {
                self.report(Err(e));
            }
        }
    }

    fn handle_device_lost(&mut self, generation: u64, loss: DeviceLoss) {
        let id = match &self.device {
            Some(device) if device.generation() == generation => device.id().clone(),
            _ => {
                log::debug!("Ignoring {:?} from stale device generation {}", loss, generation);
                return;
            }
        };

        log::error!("Camera {} lost: {:?}", id, loss);
        self.close_current();
        self.transition(PassEvent::DeviceLost);
        self.report(Err(loss_error(&id, loss)));
    }

    /// Run one full configuration pass: close, open, negotiate, build.
    async fn configure_session(&mut self) -> Result<(), CameraError> {
        log::info!("Configuring session...");
        self.close_current();
        self.pass.clear();
        self.passes += 1;
        self.build_attempts = 0;
        self.transition(PassEvent::ConfigurationChanged);

        let camera_id = self.props.camera_id.as_deref().map(CameraId::new);
        let commands = self.commands.clone();
        let opened = self
            .devices
            .open(camera_id.as_ref(), move |generation, loss| {
                if let Some(commands) = commands.upgrade() {
                    let _ = commands.send(Command::DeviceLost { generation, loss });
                }
            })
            .await;

        let device = match opened {
            Ok(device) => device,
            Err(e) => {
                self.transition(PassEvent::DeviceUnavailable);
                return Err(e);
            }
        };
        self.transition(PassEvent::DeviceOpened);

        let capabilities = match self.devices.capabilities(device.id()) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                self.transition(PassEvent::Error);
                return Err(e);
            }
        };
        log::info!(
            "Device {} supports {} output formats: {:?}",
            device.id(),
            capabilities.formats.len(),
            capabilities.output_formats()
        );

        let request = self.props.stream_request(self.preview_surface);
        let controls = self.controls_for(&capabilities);
        let mut attempt = Attempt::First;

        loop {
            let plan = match plan_outputs(&capabilities, &request, &self.negotiation, attempt) {
                Ok(plan) => plan,
                Err(e) => {
                    self.transition(PassEvent::Error);
                    return Err(e);
                }
            };
            self.transition(PassEvent::Negotiated);
            self.build_attempts += 1;
            assert_invariant!(
                self.build_attempts <= 2,
                "a configuration pass retries at most once",
                "view"
            );

            match self.builder.build(&device, &plan, &controls).await {
                Ok(session) => {
                    self.transition(PassEvent::SessionReady);
                    assert_invariant!(
                        self.session.is_none(),
                        "at most one active capture session per view",
                        "view"
                    );
                    self.session = Some(session);
                    self.device = Some(device);
                    self.capabilities = Some(capabilities);
                    log::info!("Successfully configured Camera Session!");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt == Attempt::First => {
                    log::error!(
                        "Failed to configure camera: {}! Retrying once with the video resolution for photos...",
                        e
                    );
                    self.transition(PassEvent::ConfigurationRejected);
                    self.transition(PassEvent::RetryScheduled);
                    attempt = Attempt::Retry;
                }
                Err(e) => {
                    let event = if e.is_retryable() {
                        PassEvent::ConfigurationRejected
                    } else {
                        PassEvent::Error
                    };
                    self.transition(event);
                    return Err(e);
                }
            }
        }
    }

    fn resolve_output_rotation(&self) -> Result<Rotation, CameraError> {
        output_rotation(self.props.orientation.as_deref(), self.display_rotation)
    }

    fn controls_for(&self, capabilities: &DeviceCapabilities) -> SessionControls {
        SessionControls {
            zoom: capabilities.clamp_zoom(self.props.zoom),
            torch: self.props.torch == TorchMode::On,
            output_rotation: self.output_rotation,
            input_rotation: self.display_rotation,
        }
    }

    /// Re-submit zoom, torch and rotation to the active session, if any
    fn apply_controls(&mut self) -> Result<(), CameraError> {
        let Some(controls) = self.capabilities.as_ref().map(|caps| self.controls_for(caps)) else {
            log::debug!("No active session, controls will apply on the next configuration");
            return Ok(());
        };
        match self.session.as_mut() {
            Some(session) => session.update_controls(&controls),
            None => Ok(()),
        }
    }

    fn close_current(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        if let Some(mut device) = self.device.take() {
            device.close();
        }
        self.capabilities = None;
    }

    fn teardown(&mut self) {
        self.close_current();
        if self.state != ConfigurationState::Idle && self.state.is_settled() {
            self.transition(PassEvent::SessionClosed);
        }
    }

    fn transition(&mut self, event: PassEvent) {
        let next = self.state.next(event);
        assert_invariant!(
            next.is_some(),
            "configuration passes follow the state table",
            "view"
        );
        if let Some(next) = next {
            log::debug!("Configuration state {} -> {} ({:?})", self.state, next, event);
            self.state = next;
            self.pass.push(next);
        }
    }

    fn report(&self, result: Result<(), CameraError>) {
        match result {
            Ok(()) => self.listener.on_initialized(),
            Err(e) => {
                log::error!("Camera error [{}]: {}", e.kind(), e);
                self.listener.on_error(&e);
            }
        }
    }

    async fn publish(&self) {
        let session = self.session.as_ref();
        let request = session.and_then(|s| s.request());
        let mut status = self.status.write().await;

        *status = ViewStatus {
            state: self.state,
            last_pass: self.pass.clone(),
            passes: self.passes,
            build_attempts: self.build_attempts,
            camera_id: self.device.as_ref().map(|d| d.id().clone()),
            session_id: session.map(|s| s.id()),
            outputs: session.map(|s| s.descriptors()).unwrap_or_default(),
            repeating_outputs: request.map_or(0, |r| r.targets.len()),
            output_rotation: self.output_rotation,
            zoom: request.map_or(self.props.zoom, |r| r.zoom),
            torch: request.map_or(self.props.torch == TorchMode::On, |r| r.torch),
            preview_surface: self.preview_surface,
        };
    }
}
