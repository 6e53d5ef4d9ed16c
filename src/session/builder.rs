//! Capture session construction.
//!
//! Turns an `OutputPlan` into platform outputs, asks the device for a session
//! over all of them at once and submits the continuous request. A session that
//! fails to build leaves nothing behind: readers created for it are closed.

use super::image_reader::ImageReader;
use crate::assert_invariant;
use crate::delivery::{FrameDispatcher, FrameSnapshot, PhotoDispatcher};
use crate::device::DeviceHandle;
use crate::errors::CameraError;
use crate::negotiation::OutputPlan;
use crate::orientation::Rotation;
use crate::platform::{CaptureRequest, OutputId, OutputTarget, PlatformOutput, PlatformSession, RequestTemplate};
use crate::types::{CameraId, OutputDescriptor, OutputPurpose, SurfaceRef};
use std::sync::Arc;
use uuid::Uuid;

/// Parameters applied to the continuous request without rebuilding the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionControls {
    /// Already clamped to the device's range
    pub zoom: f32,
    pub torch: bool,
    pub output_rotation: Rotation,
    /// Display rotation frames are tagged with
    pub input_rotation: Rotation,
}

impl Default for SessionControls {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            torch: false,
            output_rotation: Rotation::Rotation0,
            input_rotation: Rotation::Rotation0,
        }
    }
}

pub struct SessionBuilder {
    frames: FrameDispatcher,
    photos: PhotoDispatcher,
}

impl SessionBuilder {
    pub fn new(frames: FrameDispatcher, photos: PhotoDispatcher) -> Self {
        Self { frames, photos }
    }

    pub async fn build(
        &self,
        device: &DeviceHandle,
        plan: &OutputPlan,
        controls: &SessionControls,
    ) -> Result<ActiveSession, CameraError> {
        let snapshot = FrameSnapshot {
            rotation: controls.input_rotation,
            is_mirrored: plan.is_mirrored,
        };

        let mut readers = Vec::new();
        let mut outputs = Vec::with_capacity(plan.descriptors.len());

        for (index, descriptor) in plan.descriptors.iter().enumerate() {
            let id = OutputId(index as u32);
            let target = match descriptor.surface {
                SurfaceRef::Preview(surface) => OutputTarget::Surface(surface),
                SurfaceRef::Image { format, size } => {
                    let reader = ImageReader::new(size, format, descriptor.buffer_depth());
                    self.attach_listener(&reader, descriptor.purpose, snapshot);
                    let writer = reader.writer();
                    readers.push(reader);
                    OutputTarget::Images(writer)
                }
            };
            log::info!("Adding {} output {:?}: {:?}", descriptor.purpose, id, descriptor.surface);
            outputs.push(PlatformOutput {
                id,
                descriptor: *descriptor,
                target,
            });
        }

        let descriptors: Vec<(OutputId, OutputDescriptor)> =
            outputs.iter().map(|o| (o.id, o.descriptor)).collect();

        log::info!("Creating capture session with {} outputs...", outputs.len());
        let session = match device.device().create_capture_session(outputs).await {
            Ok(session) => session,
            Err(failure) => {
                for reader in &readers {
                    reader.close();
                }
                return Err(failure.into());
            }
        };

        let mut active = ActiveSession {
            id: Uuid::new_v4(),
            camera: device.id().clone(),
            session,
            descriptors,
            readers,
            snapshot,
            request: None,
            closed: false,
        };

        if let Err(e) = active.update_controls(controls) {
            active.close();
            return Err(e);
        }

        log::info!("Capture session {} configured on Camera {}", active.id, active.camera);
        Ok(active)
    }

    fn attach_listener(&self, reader: &Arc<ImageReader>, purpose: OutputPurpose, snapshot: FrameSnapshot) {
        let weak = Arc::downgrade(reader);
        match purpose {
            OutputPurpose::Photo => {
                let photos = self.photos.clone();
                reader.set_on_image_available(move || photos.image_available(weak.clone()));
            }
            _ => {
                let frames = self.frames.clone();
                reader.set_on_image_available(move || frames.image_available(weak.clone(), snapshot));
            }
        }
    }
}

/// A configured capture session together with the readers feeding from it
pub struct ActiveSession {
    id: Uuid,
    camera: CameraId,
    session: Box<dyn PlatformSession>,
    descriptors: Vec<(OutputId, OutputDescriptor)>,
    readers: Vec<Arc<ImageReader>>,
    snapshot: FrameSnapshot,
    request: Option<CaptureRequest>,
    closed: bool,
}

impl ActiveSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn descriptors(&self) -> Vec<OutputDescriptor> {
        self.descriptors.iter().map(|(_, d)| *d).collect()
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        self.snapshot
    }

    /// The continuous request currently submitted, if any
    pub fn request(&self) -> Option<&CaptureRequest> {
        self.request.as_ref()
    }

    pub fn repeating_targets(&self) -> Vec<OutputId> {
        self.descriptors
            .iter()
            .filter(|(_, d)| d.is_repeating)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Re-submit the continuous request with new zoom, torch and rotation.
    ///
    /// Does nothing when the session has no repeating outputs.
    pub fn update_controls(&mut self, controls: &SessionControls) -> Result<(), CameraError> {
        if self.closed {
            return Err(CameraError::SessionFailed(format!("Capture session {} is closed", self.id)));
        }

        let targets = self.repeating_targets();
        if targets.is_empty() {
            log::debug!("Capture session {} has no repeating outputs, not starting a request", self.id);
            return Ok(());
        }

        assert_invariant!(
            targets.iter().all(|target| self
                .descriptors
                .iter()
                .any(|(id, d)| id == target && d.purpose != OutputPurpose::Photo)),
            "continuous request never targets single-shot outputs",
            "session"
        );

        let request = CaptureRequest {
            template: RequestTemplate::Manual,
            targets,
            zoom: controls.zoom,
            torch: controls.torch,
            output_rotation: controls.output_rotation,
        };
        self.session.set_repeating_request(&request)?;
        self.request = Some(request);
        Ok(())
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::info!("Closing capture session {}", self.id);
        self.session.close();
        for reader in &self.readers {
            reader.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("camera", &self.camera)
            .field("outputs", &self.descriptors)
            .field("request", &self.request)
            .field("closed", &self.closed)
            .finish()
    }
}
